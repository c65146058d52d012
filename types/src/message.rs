//! Conversation message domain model.
//!
//! Contains the `Message` record, its attachments, and the `HistoryEntry`
//! projection sent back to the backend as chat history.
//! Constructors take `SystemTime` explicitly; callers own the clock.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::ImageArtifact;
use crate::ids::MessageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Base64 audio clip attached to a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioClip {
    pub data: String,
    pub format: String,
}

/// Base64 PDF document attached to a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfDocument {
    pub data: String,
    pub filename: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioClip>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf: Option<PdfDocument>,
}

impl Attachments {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_image(mut self, image: ImageArtifact) -> Self {
        self.image = Some(image);
        self
    }

    #[must_use]
    pub fn with_audio(mut self, audio: AudioClip) -> Self {
        self.audio = Some(audio);
        self
    }

    #[must_use]
    pub fn with_pdf(mut self, pdf: PdfDocument) -> Self {
        self.pdf = Some(pdf);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.audio.is_none() && self.pdf.is_none()
    }
}

/// One entry of the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    #[serde(default, skip_serializing_if = "Attachments::is_empty")]
    attachments: Attachments,
    timestamp: SystemTime,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>, attachments: Attachments, timestamp: SystemTime) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::User,
            content: content.into(),
            attachments,
            timestamp,
        }
    }

    #[must_use]
    pub fn assistant(
        content: impl Into<String>,
        image: Option<ImageArtifact>,
        timestamp: SystemTime,
    ) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Assistant,
            content: content.into(),
            attachments: Attachments {
                image,
                ..Attachments::default()
            },
            timestamp,
        }
    }

    /// A copy of this message carrying new content and image.
    ///
    /// Identity, role, timestamp and the other attachments are preserved.
    #[must_use]
    pub fn rewritten(&self, content: impl Into<String>, image: Option<ImageArtifact>) -> Self {
        Self {
            id: self.id,
            role: self.role,
            content: content.into(),
            attachments: Attachments {
                image,
                ..self.attachments.clone()
            },
            timestamp: self.timestamp,
        }
    }

    #[must_use]
    pub fn id(&self) -> MessageId {
        self.id
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn image(&self) -> Option<&ImageArtifact> {
        self.attachments.image.as_ref()
    }

    #[must_use]
    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    #[must_use]
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.content.is_empty() && self.attachments.is_empty()
    }

    /// Project this message into the shape the backend accepts as history.
    #[must_use]
    pub fn to_history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            role: self.role,
            content: self.content.clone(),
            image: self
                .attachments
                .image
                .as_ref()
                .and_then(InlineImage::from_artifact),
            audio: self.attachments.audio.clone(),
            pdf: self.attachments.pdf.clone(),
        }
    }
}

/// Image payload as the backend expects it in history: raw base64 plus format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    pub data: String,
    pub format: String,
}

impl InlineImage {
    /// Artifacts discovered only as a bare URL carry no payload and are skipped.
    #[must_use]
    pub fn from_artifact(artifact: &ImageArtifact) -> Option<Self> {
        if !artifact.has_data() {
            return None;
        }
        Some(Self {
            data: artifact.data().to_string(),
            format: artifact.format().to_string(),
        })
    }
}

/// `{ role, content, attachments }` projection of a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<InlineImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioClip>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf: Option<PdfDocument>,
}
