//! User-facing text for failed streams.

use serde_json::Value;
use weft_client::TransportError;

const STREAM_ERROR_BADGE: &str = "[Stream error]";
const MAX_DETAIL_CHARS: usize = 200;

/// Human-readable message inside a JSON error body, if there is one.
#[must_use]
pub fn extract_error_message(body: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(body.trim()).ok()?;
    ["/error/message", "/error", "/message", "/detail"]
        .iter()
        .find_map(|pointer| payload.pointer(pointer).and_then(Value::as_str))
        .or_else(|| payload.as_str())
        .map(ToString::to_string)
}

/// Format a stream failure as the content of an assistant message.
#[must_use]
pub fn format_stream_error(status: Option<u16>, raw: &str) -> String {
    let trimmed = raw.trim();
    let extracted = extract_error_message(trimmed).unwrap_or_else(|| trimmed.to_string());
    let detail = if extracted.trim().is_empty() {
        "unknown error".to_string()
    } else {
        truncate_with_ellipsis(extracted.trim(), MAX_DETAIL_CHARS)
    };

    let mut content = String::from(STREAM_ERROR_BADGE);
    content.push_str("\n\n");
    match status {
        Some(status) => {
            content.push_str("Request failed (HTTP ");
            content.push_str(&status.to_string());
            content.push_str(").");
        }
        None => content.push_str("Request failed."),
    }
    content.push_str("\n\nDetails: ");
    content.push_str(&detail);
    content
}

#[must_use]
pub fn format_transport_error(error: &TransportError) -> String {
    match error {
        TransportError::Status { status, body } => format_stream_error(Some(*status), body),
        other => format_stream_error(other.status(), &other.to_string()),
    }
}

fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
