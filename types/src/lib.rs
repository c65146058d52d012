//! Core domain types for weft.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod ids;
mod message;
mod model;
mod sanitize;

pub use ids::MessageId;
pub use message::{
    Attachments, AudioClip, HistoryEntry, InlineImage, Message, PdfDocument, Role,
};
pub use model::{Architecture, Modality, ModelInfo};
pub use sanitize::sanitize_terminal_text;

use serde::{Deserialize, Serialize};

// ============================================================================
// Generated images
// ============================================================================

/// A generated image resolved from a streamed answer.
///
/// `data` is empty when the image is known only by a remote URL. `format` is
/// never empty; it falls back to [`ImageArtifact::DEFAULT_FORMAT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawImageArtifact")]
pub struct ImageArtifact {
    url: String,
    data: String,
    format: String,
}

#[derive(Deserialize)]
struct RawImageArtifact {
    #[serde(default)]
    url: String,
    #[serde(default)]
    data: String,
    #[serde(default)]
    format: String,
}

impl From<RawImageArtifact> for ImageArtifact {
    fn from(raw: RawImageArtifact) -> Self {
        Self::new(raw.url, raw.data, raw.format)
    }
}

impl ImageArtifact {
    pub const DEFAULT_FORMAT: &'static str = "jpg";

    #[must_use]
    pub fn new(url: impl Into<String>, data: impl Into<String>, format: impl Into<String>) -> Self {
        let format = format.into();
        let format = if format.trim().is_empty() {
            Self::DEFAULT_FORMAT.to_string()
        } else {
            format
        };
        Self {
            url: url.into(),
            data: data.into(),
            format,
        }
    }

    /// An image carried inline as base64; the URL is the equivalent `data:` URI.
    #[must_use]
    pub fn inline(format: impl Into<String>, data: impl Into<String>) -> Self {
        let data = data.into();
        let mut artifact = Self::new(String::new(), data, format);
        artifact.url = format!("data:image/{};base64,{}", artifact.format, artifact.data);
        artifact
    }

    /// An image known only by a remote URL.
    #[must_use]
    pub fn remote(url: impl Into<String>, format: impl Into<String>) -> Self {
        Self::new(url, String::new(), format)
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn data(&self) -> &str {
        &self.data
    }

    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }
}

// ============================================================================
// Tool Calling Types
// ============================================================================

fn default_tool_kind() -> String {
    "function".to_string()
}

/// A tool invocation proposed by the model and awaiting a human decision.
///
/// Forwarded verbatim to the approval endpoint, so unknown-but-present
/// fields such as `type` round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call (used to match results).
    pub id: String,
    #[serde(rename = "type", default = "default_tool_kind")]
    pub kind: String,
    pub function: ToolFunction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON-encoded argument object, exactly as streamed by the model.
    #[serde(default)]
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: default_tool_kind(),
            function: ToolFunction {
                name: name.into(),
                description: None,
                arguments: arguments.into(),
            },
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Decode the argument string. An empty string is treated as `{}`.
    pub fn parsed_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.function.arguments.trim().is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.function.arguments)
    }
}
