//! Fold of a turn's delta envelopes into accumulated text and an image.
//!
//! [`extract`] is pure and always runs over the full envelope list of the
//! turn, so re-running it on a longer list extends the text and never loses
//! an image the shorter list already resolved.
//!
//! Image resolution tries these in order; the first hit wins:
//!
//! 1. the first envelope with a non-empty `images` list (its first URL;
//!    `data:` URIs are split into format and payload)
//! 2. the first envelope with a singular `image` object, verbatim
//! 3. the first `http(s)` image URL in the accumulated text
//! 4. the first inline `data:image/...;base64,` URI in the accumulated text

use std::sync::LazyLock;

use regex::Regex;
use url::Url;
use weft_types::ImageArtifact;

use crate::envelope::DeltaEnvelope;

/// The extension (plus optional query) must end the URL: end of text,
/// whitespace, a quote or bracket, or sentence punctuation before one of those.
static TEXT_IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(https?://[^\s"'<>]+?\.(jpe?g|png|webp|gif)(?:\?[^\s"'<>)]*)?)[.,;:!?]?(?:$|[\s"'<>)\]])"#,
    )
    .expect("valid image URL regex")
});

static TEXT_DATA_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data:image/([A-Za-z0-9.+-]+);base64,([^"'\s)]+)"#)
        .expect("valid data URI regex")
});

/// Accumulated state of one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub image: Option<ImageArtifact>,
}

impl Extracted {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.image.is_none()
    }
}

#[must_use]
pub fn extract(deltas: &[DeltaEnvelope]) -> Extracted {
    let text: String = deltas.iter().map(DeltaEnvelope::content).collect();
    let image = resolve_image(deltas, &text);
    Extracted { text, image }
}

/// Run the image strategy chain over `deltas` and their concatenated `text`.
#[must_use]
pub fn resolve_image(deltas: &[DeltaEnvelope], text: &str) -> Option<ImageArtifact> {
    from_image_list(deltas)
        .or_else(|| from_singular_image(deltas))
        .or_else(|| from_text_url(text))
        .or_else(|| from_text_data_uri(text))
}

fn from_image_list(deltas: &[DeltaEnvelope]) -> Option<ImageArtifact> {
    let url = deltas.iter().find_map(DeltaEnvelope::first_image_url)?;
    Some(match parse_data_uri(url) {
        Some((format, payload)) => ImageArtifact::new(url, payload, format),
        None => ImageArtifact::remote(url, format_from_url(url)),
    })
}

fn from_singular_image(deltas: &[DeltaEnvelope]) -> Option<ImageArtifact> {
    deltas.iter().find_map(DeltaEnvelope::image).cloned()
}

fn from_text_url(text: &str) -> Option<ImageArtifact> {
    let captures = TEXT_IMAGE_URL.captures(text)?;
    let url = captures.get(1)?.as_str();
    let extension = captures.get(2)?.as_str().to_ascii_lowercase();
    Some(ImageArtifact::remote(url, extension))
}

fn from_text_data_uri(text: &str) -> Option<ImageArtifact> {
    let captures = TEXT_DATA_URI.captures(text)?;
    let uri = captures.get(0)?.as_str();
    let format = captures.get(1)?.as_str();
    let payload = captures.get(2)?.as_str();
    Some(ImageArtifact::new(uri, payload, format))
}

/// Split `data:image/<fmt>;base64,<payload>` into `(fmt, payload)`.
#[must_use]
pub fn parse_data_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("data:image/")?;
    rest.split_once(";base64,")
}

/// File extension of a URL's last path segment, ignoring query and fragment.
///
/// Falls back to [`ImageArtifact::DEFAULT_FORMAT`].
#[must_use]
pub fn format_from_url(raw: &str) -> String {
    let last_segment = match Url::parse(raw) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(ToString::to_string)),
        Err(_) => {
            let path = raw.split(['?', '#']).next().unwrap_or_default();
            path.rsplit('/').next().map(ToString::to_string)
        }
    };

    last_segment
        .as_deref()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, extension)| extension)
        .filter(|extension| {
            !extension.is_empty()
                && extension.len() <= 5
                && extension.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map_or_else(
            || ImageArtifact::DEFAULT_FORMAT.to_string(),
            str::to_ascii_lowercase,
        )
}
