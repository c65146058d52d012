//! Typed envelopes decoded from reassembled JSON objects.
//!
//! Two shapes matter:
//!
//! - **delta**: `{ choices: [ { delta: { content?, image?, images? } } ] }`
//!   (a non-streamed `message` in place of `delta` is accepted too)
//! - **control**: `{ type: "tool_calls_pending", tool_calls: [...] }`, or an
//!   `{ error: ... }` object the backend writes when a request fails mid-stream
//!
//! Anything else is unrecognized and dropped. Decoding never fails loudly:
//! a malformed object is logged and skipped so the rest of the turn survives.

use serde::Deserialize;
use serde_json::Value;
use weft_types::{ImageArtifact, ToolCall};

pub const TOOL_CALLS_PENDING: &str = "tool_calls_pending";

#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Delta(DeltaEnvelope),
    Control(ControlEnvelope),
}

/// Incremental model output for the current turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeltaEnvelope {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    image: Option<ImageArtifact>,
    #[serde(default)]
    images: Option<Vec<ImageRef>>,
}

/// Entry of the plural `images` field: `{ type, image_url: { url } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImageRef {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub image_url: Option<ImageUrl>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImageUrl {
    #[serde(default)]
    pub url: String,
}

impl DeltaEnvelope {
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_image(mut self, image: ImageArtifact) -> Self {
        self.image = Some(image);
        self
    }

    #[must_use]
    pub fn with_image_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.images = Some(
            urls.into_iter()
                .map(|url| ImageRef {
                    kind: Some("image_url".to_string()),
                    image_url: Some(ImageUrl { url: url.into() }),
                })
                .collect(),
        );
        self
    }

    /// Text increment; absent content contributes nothing.
    #[must_use]
    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn image(&self) -> Option<&ImageArtifact> {
        self.image.as_ref()
    }

    /// Nested URL of the first entry of a non-empty `images` list.
    #[must_use]
    pub fn first_image_url(&self) -> Option<&str> {
        let first = self.images.as_deref()?.first()?;
        let url = first.image_url.as_ref()?.url.as_str();
        (!url.is_empty()).then_some(url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEnvelope {
    /// The model asked to run tools; a human must decide.
    ToolCallsPending(PendingToolCalls),
    /// The backend reported a failure inside the stream.
    StreamError(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PendingToolCalls {
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Prompt text to show next to the approval request.
    #[serde(default)]
    pub message: Option<String>,
    /// Text the model produced before asking for tools.
    #[serde(default)]
    pub assistant_message: Option<String>,
}

/// Decode one reassembled object. `None` means "skip it".
#[must_use]
pub fn decode(object: &str) -> Option<Envelope> {
    match serde_json::from_str::<Value>(object) {
        Ok(value) => classify(value),
        Err(e) => {
            tracing::warn!(%e, payload_bytes = object.len(), "Skipping malformed JSON object");
            None
        }
    }
}

/// Classify an already-parsed object.
#[must_use]
pub fn classify(value: Value) -> Option<Envelope> {
    if value.get("type").and_then(Value::as_str) == Some(TOOL_CALLS_PENDING) {
        return match serde_json::from_value::<PendingToolCalls>(value) {
            Ok(pending) => Some(Envelope::Control(ControlEnvelope::ToolCallsPending(pending))),
            Err(e) => {
                tracing::warn!(%e, "Skipping malformed tool_calls_pending envelope");
                None
            }
        };
    }

    let delta = value
        .pointer("/choices/0/delta")
        .or_else(|| value.pointer("/choices/0/message"));
    if let Some(delta) = delta {
        return match DeltaEnvelope::deserialize(delta) {
            Ok(delta) => Some(Envelope::Delta(delta)),
            Err(e) => {
                tracing::warn!(%e, "Skipping malformed delta envelope");
                None
            }
        };
    }

    if let Some(error) = value.get("error") {
        return Some(Envelope::Control(ControlEnvelope::StreamError(
            error_text(error),
        )));
    }

    tracing::debug!("Skipping unrecognized envelope");
    None
}

fn error_text(error: &Value) -> String {
    match error {
        Value::String(text) => text.clone(),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| other.to_string(), ToString::to_string),
    }
}
