//! Shared test utilities and fixtures
//!
//! A wiremock backend speaking the chat and tool-approval endpoints, and a
//! session wired to it over real HTTP.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{Value, json};
use weft_client::{APPROVE_PATH, CHAT_PATH, ClientSettings, HttpTransport};
use weft_engine::{ChatSession, SessionSettings};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn settings() -> SessionSettings {
    SessionSettings {
        model_id: "test-model".to_string(),
        use_mcp: true,
        mcp_server_type: "cmu_api".to_string(),
        mcp_auto_approve: false,
    }
}

/// A session talking to `server` over HTTP.
pub fn session_for(server: &MockServer) -> ChatSession {
    let transport = HttpTransport::new(ClientSettings::new(server.uri())).unwrap();
    ChatSession::new(settings(), Arc::new(transport))
}

/// One streamed text delta as the backend writes it.
pub fn delta(text: &str) -> String {
    json!({ "choices": [ { "delta": { "content": text } } ] }).to_string()
}

/// A `tool_calls_pending` envelope asking for one `search` call.
pub fn tool_calls_pending(query: &str) -> String {
    json!({
        "type": "tool_calls_pending",
        "tool_calls": [{
            "id": "call_1",
            "type": "function",
            "function": {
                "name": "search",
                "arguments": json!({ "q": query }).to_string(),
            }
        }],
        "message": "Run search?",
    })
    .to_string()
}

/// Event-stream body: one `data:` event per payload, then `[DONE]`.
pub fn event_stream(payloads: &[String]) -> String {
    let mut body = String::new();
    for payload in payloads {
        body.push_str(&format!("data: {payload}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

/// Mount the chat endpoint with a raw body of concatenated JSON objects.
pub async fn mount_chat(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path(format!("/{CHAT_PATH}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "application/json"),
        )
        .mount(server)
        .await;
}

pub async fn mount_approve(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(format!("/{APPROVE_PATH}")))
        .respond_with(response)
        .mount(server)
        .await;
}

pub fn event_stream_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/event-stream")
}

/// JSON bodies the server received on `endpoint`, in order.
pub async fn received_bodies(server: &MockServer, endpoint: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == format!("/{endpoint}"))
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}
