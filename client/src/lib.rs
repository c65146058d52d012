//! HTTP transport to the weft chat backend.
//!
//! Both endpoints stream their answer. The transport only turns the response
//! body into a sequence of text fragments; framing and decoding happen in
//! `weft-stream`.
//!
//! | Call | Endpoint | Body framing |
//! |------|----------|--------------|
//! | [`Transport::chat`] | `POST {url}/chat_streaming` | concatenated JSON objects |
//! | [`Transport::approve`] | `POST {url}/mcp/approve_tool_calls_streaming` | `text/event-stream` |
//!
//! # Error Handling
//!
//! Failures arrive as an `Err` item in the [`FragmentStream`], after which
//! the stream ends. Fragments already delivered stay valid.

mod request;
mod utf8;

use std::pin::Pin;
use std::time::Duration;

use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt, TryStreamExt};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderValue};
use serde::Serialize;
use thiserror::Error;

pub use request::{ApprovalRequest, ChatRequest};
pub use utf8::Utf8Decoder;

pub const CHAT_PATH: &str = "chat_streaming";
pub const APPROVE_PATH: &str = "mcp/approve_tool_calls_streaming";

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Decoded text fragments of one streamed response, in arrival order.
pub type FragmentStream = BoxStream<'static, Result<String, TransportError>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("no response body (streaming unsupported)")]
    NoBody,
    #[error("stream idle timeout")]
    IdleTimeout,
    #[error("response exceeded {limit} bytes")]
    TooLarge { limit: usize },
    #[error("error reading response body: {0}")]
    Body(#[source] reqwest::Error),
}

impl TransportError {
    /// HTTP status of a non-OK response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request(e) | Self::Body(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Source of streamed backend responses.
///
/// Calls never block: the returned stream performs the request when first
/// polled. Dropping it closes the connection.
pub trait Transport: Send + Sync {
    fn chat(&self, request: ChatRequest) -> FragmentStream;
    fn approve(&self, request: ApprovalRequest) -> FragmentStream;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Backend base URL, without the endpoint path.
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Longest gap between body chunks; `None` waits forever.
    pub idle_timeout: Option<Duration>,
    pub max_response_bytes: usize,
}

impl ClientSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            idle_timeout: None,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Clone, Copy)]
struct BodyLimits {
    idle_timeout: Option<Duration>,
    max_bytes: usize,
}

/// [`Transport`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    settings: ClientSettings,
}

impl HttpTransport {
    pub fn new(settings: ClientSettings) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
            .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
            .build()
            .map_err(TransportError::Request)?;
        Ok(Self { client, settings })
    }

    #[must_use]
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn open<B: Serialize>(&self, path: &str, body: &B, accept: &'static str) -> FragmentStream {
        let url = self.settings.endpoint(path);
        let request = self
            .client
            .post(&url)
            .header(ACCEPT, HeaderValue::from_static(accept))
            .json(body);
        let limits = BodyLimits {
            idle_timeout: self.settings.idle_timeout,
            max_bytes: self.settings.max_response_bytes,
        };

        stream::once(async move {
            tracing::debug!(%url, "Opening backend stream");
            let response = request.send().await.map_err(|e| {
                tracing::warn!(%e, %url, "Backend request failed");
                TransportError::Request(e)
            })?;
            let response = check_response(response).await?;
            Ok::<_, TransportError>(body_fragments(response.bytes_stream(), limits))
        })
        .try_flatten()
        .boxed()
    }
}

impl Transport for HttpTransport {
    fn chat(&self, request: ChatRequest) -> FragmentStream {
        self.open(CHAT_PATH, &request, "application/json")
    }

    fn approve(&self, request: ApprovalRequest) -> FragmentStream {
        self.open(APPROVE_PATH, &request, "text/event-stream")
    }
}

async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if !status.is_success() {
        let body = read_capped_error_body(response).await;
        tracing::warn!(%status, body_bytes = body.len(), "Backend returned an error status");
        return Err(TransportError::Status {
            status: status.as_u16(),
            body,
        });
    }
    if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
        tracing::warn!(%status, "Backend response has no body");
        return Err(TransportError::NoBody);
    }
    Ok(response)
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

struct BodyState<S> {
    body: Pin<Box<S>>,
    decoder: Utf8Decoder,
    received: usize,
    limits: BodyLimits,
    finished: bool,
}

/// Decode a byte stream into text fragments, enforcing idle and size limits.
fn body_fragments<S, B>(body: S, limits: BodyLimits) -> FragmentStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = BodyState {
        body: Box::pin(body),
        decoder: Utf8Decoder::new(),
        received: 0,
        limits,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }
        loop {
            let next = match state.limits.idle_timeout {
                Some(idle) => {
                    if let Ok(next) = tokio::time::timeout(idle, state.body.next()).await {
                        next
                    } else {
                        tracing::warn!(idle_secs = idle.as_secs(), "Backend stream idle timeout");
                        state.finished = true;
                        return Some((Err(TransportError::IdleTimeout), state));
                    }
                }
                None => state.body.next().await,
            };

            match next {
                Some(Ok(chunk)) => {
                    let chunk = chunk.as_ref();
                    state.received = state.received.saturating_add(chunk.len());
                    if state.received > state.limits.max_bytes {
                        tracing::warn!(limit = state.limits.max_bytes, "Backend response too large");
                        state.finished = true;
                        let limit = state.limits.max_bytes;
                        return Some((Err(TransportError::TooLarge { limit }), state));
                    }
                    let text = state.decoder.decode(chunk);
                    if !text.is_empty() {
                        return Some((Ok(text), state));
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(%e, "Backend stream read failed");
                    state.finished = true;
                    return Some((Err(TransportError::Body(e)), state));
                }
                None => {
                    state.finished = true;
                    let tail = state.decoder.finish();
                    if tail.is_empty() {
                        return None;
                    }
                    return Some((Ok(tail), state));
                }
            }
        }
    })
    .boxed()
}
