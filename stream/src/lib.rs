//! Streaming response reconstruction for weft.
//!
//! Pure decoders, no IO. Text fragments from the transport go through a
//! [`FrameDecoder`] that yields complete JSON object strings, [`decode`] turns
//! each into an [`Envelope`], and [`extract`] folds the turn's deltas into
//! text plus at most one image.
//!
//! Two framings exist. Main chat turns send [`Framing::ConcatenatedJson`]:
//! objects written back to back with no delimiter and split anywhere. The
//! approval resume sends [`Framing::EventStream`]: `data:` lines ending with
//! `data: [DONE]`.

mod envelope;
mod extract;
mod reassembler;
mod sse;

pub use envelope::{
    ControlEnvelope, DeltaEnvelope, Envelope, ImageRef, ImageUrl, PendingToolCalls,
    TOOL_CALLS_PENDING, classify, decode,
};
pub use extract::{Extracted, extract, format_from_url, parse_data_uri, resolve_image};
pub use reassembler::{IncompleteObject, ObjectReassembler, split_objects};
pub use sse::{DONE_MARKER, EventStreamDecoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Raw concatenated JSON objects.
    ConcatenatedJson,
    /// `text/event-stream` with a `[DONE]` terminator.
    EventStream,
}

/// How a stream ended short of its natural end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Truncation {
    /// An object was still open when the transport completed.
    IncompleteObject(IncompleteObject),
    /// The event stream closed without `[DONE]`.
    MissingDoneMarker,
}

/// Result of closing a [`FrameDecoder`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameEnd {
    /// Objects only complete once the stream closed.
    pub trailing: Vec<String>,
    pub truncation: Option<Truncation>,
}

#[derive(Debug)]
enum Inner {
    Json(ObjectReassembler),
    Events(EventStreamDecoder),
}

/// Framing-aware splitter from text fragments to JSON object strings.
#[derive(Debug)]
pub struct FrameDecoder {
    inner: Inner,
}

impl FrameDecoder {
    #[must_use]
    pub fn new(framing: Framing) -> Self {
        let inner = match framing {
            Framing::ConcatenatedJson => Inner::Json(ObjectReassembler::new()),
            Framing::EventStream => Inner::Events(EventStreamDecoder::new()),
        };
        Self { inner }
    }

    #[must_use]
    pub fn framing(&self) -> Framing {
        match self.inner {
            Inner::Json(_) => Framing::ConcatenatedJson,
            Inner::Events(_) => Framing::EventStream,
        }
    }

    pub fn feed(&mut self, fragment: &str) -> Vec<String> {
        match &mut self.inner {
            Inner::Json(reassembler) => reassembler.feed(fragment),
            Inner::Events(events) => events.feed(fragment),
        }
    }

    /// True once the stream signalled its own end (`[DONE]`).
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        match &self.inner {
            Inner::Json(_) => false,
            Inner::Events(events) => events.is_done(),
        }
    }

    /// Close the stream after the transport reported completion.
    pub fn finish(&mut self) -> FrameEnd {
        match &mut self.inner {
            Inner::Json(reassembler) => FrameEnd {
                trailing: Vec::new(),
                truncation: reassembler.finish().map(Truncation::IncompleteObject),
            },
            Inner::Events(events) => {
                let trailing = events.finish();
                let truncation = if events.is_done() {
                    None
                } else {
                    tracing::warn!("Event stream closed without [DONE]; response may be truncated");
                    Some(Truncation::MissingDoneMarker)
                };
                FrameEnd {
                    trailing,
                    truncation,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameDecoder, FrameEnd, Framing, IncompleteObject, Truncation};

    #[test]
    fn concatenated_json_reports_open_object() {
        let mut decoder = FrameDecoder::new(Framing::ConcatenatedJson);
        assert_eq!(decoder.feed(r#"{"a":1}{"b":"#), vec![r#"{"a":1}"#]);
        assert!(!decoder.is_terminated());
        assert_eq!(
            decoder.finish(),
            FrameEnd {
                trailing: Vec::new(),
                truncation: Some(Truncation::IncompleteObject(IncompleteObject {
                    pending_bytes: 5,
                    depth: 1,
                })),
            }
        );
    }

    #[test]
    fn event_stream_clean_end() {
        let mut decoder = FrameDecoder::new(Framing::EventStream);
        assert_eq!(decoder.framing(), Framing::EventStream);
        assert_eq!(
            decoder.feed("data: {\"a\":1}\n\ndata: [DONE]\n\n"),
            vec![r#"{"a":1}"#]
        );
        assert!(decoder.is_terminated());
        assert_eq!(decoder.finish(), FrameEnd::default());
    }

    #[test]
    fn event_stream_one_payload_per_line() {
        let mut decoder = FrameDecoder::new(Framing::EventStream);
        let payloads = decoder.feed(
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\
             data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\
             data: [DONE]\n",
        );
        assert_eq!(payloads.len(), 2);
        assert!(payloads[1].contains("\"b\""));
        assert!(decoder.is_terminated());
        assert_eq!(decoder.finish(), FrameEnd::default());
    }

    #[test]
    fn event_stream_without_done_is_truncated() {
        let mut decoder = FrameDecoder::new(Framing::EventStream);
        assert!(decoder.feed("data: {\"a\":1}").is_empty());
        let end = decoder.finish();
        assert_eq!(end.trailing, vec![r#"{"a":1}"#]);
        assert_eq!(end.truncation, Some(Truncation::MissingDoneMarker));
    }
}
