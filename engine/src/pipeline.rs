//! Fragment-to-extraction pipeline for one streamed response.

use weft_stream::{
    ControlEnvelope, DeltaEnvelope, Envelope, Extracted, FrameDecoder, Framing, Truncation,
    decode, extract,
};

/// Result of feeding the pipeline.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Progress {
    /// New deltas arrived; [`TurnPipeline::extracted`] has moved on.
    pub deltas_changed: bool,
    /// Control envelope that halted the pipeline, if one arrived.
    pub control: Option<ControlEnvelope>,
    /// Set only by [`TurnPipeline::finish`].
    pub truncation: Option<Truncation>,
}

/// Frame decoder, envelope decoder and delta history of one response.
///
/// Deltas decoded before a control envelope count; once a control envelope
/// arrives the pipeline is halted and later objects are ignored.
#[derive(Debug)]
pub struct TurnPipeline {
    frames: FrameDecoder,
    deltas: Vec<DeltaEnvelope>,
    halted: bool,
}

impl TurnPipeline {
    #[must_use]
    pub fn new(framing: Framing) -> Self {
        Self {
            frames: FrameDecoder::new(framing),
            deltas: Vec::new(),
            halted: false,
        }
    }

    pub fn feed(&mut self, fragment: &str) -> Progress {
        if self.halted {
            return Progress::default();
        }
        let objects = self.frames.feed(fragment);
        self.absorb(objects)
    }

    /// Close the response after the transport completed.
    pub fn finish(&mut self) -> Progress {
        if self.halted {
            return Progress::default();
        }
        let end = self.frames.finish();
        let mut progress = self.absorb(end.trailing);
        progress.truncation = end.truncation;
        progress
    }

    /// Fold of every delta received so far.
    #[must_use]
    pub fn extracted(&self) -> Extracted {
        extract(&self.deltas)
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    #[must_use]
    pub fn delta_count(&self) -> usize {
        self.deltas.len()
    }

    fn absorb(&mut self, objects: Vec<String>) -> Progress {
        let mut progress = Progress::default();
        let mut objects = objects.into_iter();

        for object in objects.by_ref() {
            match decode(&object) {
                Some(Envelope::Delta(delta)) => {
                    self.deltas.push(delta);
                    progress.deltas_changed = true;
                }
                Some(Envelope::Control(control)) => {
                    self.halted = true;
                    progress.control = Some(control);
                    break;
                }
                None => {}
            }
        }

        let ignored = objects.len();
        if ignored > 0 {
            tracing::debug!(ignored, "Ignoring objects after a control envelope");
        }
        progress
    }
}

#[cfg(test)]
mod tests {
    use super::TurnPipeline;
    use weft_stream::{ControlEnvelope, Framing, Truncation};

    #[test]
    fn deltas_accumulate_across_fragments() {
        let mut pipeline = TurnPipeline::new(Framing::ConcatenatedJson);
        let first = pipeline.feed(r#"{"choices":[{"delta":{"content":"Hel"#);
        assert!(!first.deltas_changed);

        let second = pipeline.feed(r#"lo"}}]}{"choices":[{"delta":{"content":" world"}}]}"#);
        assert!(second.deltas_changed);
        assert_eq!(pipeline.extracted().text, "Hello world");
        assert_eq!(pipeline.delta_count(), 2);
    }

    #[test]
    fn malformed_and_unknown_objects_do_not_stop_the_turn() {
        let mut pipeline = TurnPipeline::new(Framing::ConcatenatedJson);
        let progress = pipeline.feed(concat!(
            r#"{"choices":[{"delta":{"content":"a"}}]}"#,
            r#"{"choices":[{"delta":{"content":}}]}"#,
            r#"{"status":"ok"}"#,
            r#"{"choices":[{"delta":{"content":"b"}}]}"#,
        ));
        assert!(progress.deltas_changed);
        assert!(progress.control.is_none());
        assert_eq!(pipeline.extracted().text, "ab");
    }

    #[test]
    fn control_halts_after_earlier_deltas() {
        let mut pipeline = TurnPipeline::new(Framing::ConcatenatedJson);
        let progress = pipeline.feed(concat!(
            r#"{"choices":[{"delta":{"content":"Let me check."}}]}"#,
            r#"{"type":"tool_calls_pending","tool_calls":[]}"#,
            r#"{"choices":[{"delta":{"content":" ignored"}}]}"#,
        ));
        assert!(progress.deltas_changed);
        assert!(matches!(
            progress.control,
            Some(ControlEnvelope::ToolCallsPending(_))
        ));
        assert!(pipeline.is_halted());
        assert_eq!(pipeline.extracted().text, "Let me check.");

        assert!(!pipeline.feed(r#"{"choices":[{"delta":{"content":"x"}}]}"#).deltas_changed);
        assert_eq!(pipeline.finish().truncation, None);
    }

    #[test]
    fn trailing_incomplete_object_contributes_nothing() {
        let mut pipeline = TurnPipeline::new(Framing::ConcatenatedJson);
        pipeline.feed(r#"{"choices":[{"delta":{"content":"kept"}}]}{"choices":[{"delta":{"content":"lost"#);
        let end = pipeline.finish();

        assert!(!end.deltas_changed);
        assert!(matches!(end.truncation, Some(Truncation::IncompleteObject(_))));
        assert_eq!(pipeline.extracted().text, "kept");
    }

    #[test]
    fn event_stream_framing() {
        let mut pipeline = TurnPipeline::new(Framing::EventStream);
        pipeline.feed("data: {\"choices\":[{\"delta\":{\"content\":\"Found \"}}]}\n\n");
        pipeline.feed("data: {\"choices\":[{\"delta\":{\"content\":\"3 results\"}}]}\n\ndata: [DONE]\n\n");
        let end = pipeline.finish();

        assert_eq!(end.truncation, None);
        assert_eq!(pipeline.extracted().text, "Found 3 results");
    }
}
