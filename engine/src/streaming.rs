//! Streaming response handling for the session.
//!
//! Each response is read by a spawned task that forwards fragments over a
//! channel. The session drains that channel synchronously in
//! [`ChatSession::process_stream_events`], so every log mutation happens on
//! the caller's thread in arrival order. Stopping a stream aborts the reader
//! and drops the receiver; nothing it read afterwards can reach the log.

use futures_util::StreamExt;
use futures_util::future::{AbortHandle, Abortable};
use tokio::sync::mpsc;
use weft_client::{FragmentStream, TransportError};
use weft_stream::{ControlEnvelope, Framing, Truncation};

use crate::accumulator::TurnAccumulator;
use crate::errors::{format_stream_error, format_transport_error};
use crate::pipeline::{Progress, TurnPipeline};
use crate::session::{ChatSession, TurnOutcome};

const STREAM_EVENT_CHANNEL_CAPACITY: usize = 256;
/// Upper bound on events handled per [`ChatSession::process_stream_events`] call.
pub const DEFAULT_STREAM_EVENT_BUDGET: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamKind {
    /// Main turn: concatenated JSON objects.
    Chat,
    /// Approval resume: event stream.
    Approval,
}

#[derive(Debug)]
pub(crate) enum StreamMessage {
    Fragment(String),
    Failed(TransportError),
    Finished,
}

/// A stream being read. Existence means a reader task is running.
pub(crate) struct ActiveStream {
    kind: StreamKind,
    receiver: mpsc::Receiver<StreamMessage>,
    abort_handle: AbortHandle,
    pipeline: TurnPipeline,
    /// Message received by [`ChatSession::next_activity`] but not yet handled.
    peeked: Option<StreamMessage>,
}

impl ActiveStream {
    pub(crate) fn kind(&self) -> StreamKind {
        self.kind
    }

    fn next_message(&mut self) -> Option<StreamMessage> {
        if let Some(message) = self.peeked.take() {
            return Some(message);
        }
        match self.receiver.try_recv() {
            Ok(message) => Some(message),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                tracing::warn!("Stream channel disconnected");
                Some(StreamMessage::Finished)
            }
        }
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}

impl ChatSession {
    pub(crate) fn start_stream(
        &mut self,
        kind: StreamKind,
        mut fragments: FragmentStream,
        framing: Framing,
    ) {
        self.stop_stream();

        let (tx, rx) = mpsc::channel(STREAM_EVENT_CHANNEL_CAPACITY);
        let (abort_handle, abort_registration) = AbortHandle::new_pair();

        let task = async move {
            while let Some(item) = fragments.next().await {
                let message = match item {
                    Ok(fragment) => StreamMessage::Fragment(fragment),
                    Err(e) => {
                        let _ = tx.send(StreamMessage::Failed(e)).await;
                        return;
                    }
                };
                if tx.send(message).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(StreamMessage::Finished).await;
        };

        tokio::spawn(async move {
            let _ = Abortable::new(task, abort_registration).await;
        });

        tracing::debug!(?kind, "Stream started");
        self.active = Some(ActiveStream {
            kind,
            receiver: rx,
            abort_handle,
            pipeline: TurnPipeline::new(framing),
            peeked: None,
        });
    }

    /// Abort the reader task and forget the stream. Returns whether one was open.
    pub(crate) fn stop_stream(&mut self) -> bool {
        self.active.take().is_some()
    }

    /// Handle every transport event available right now.
    ///
    /// Never blocks. Returns true when the log changed.
    pub fn process_stream_events(&mut self) -> bool {
        let mut changed = false;

        for _ in 0..DEFAULT_STREAM_EVENT_BUDGET {
            let Some(active) = self.active.as_mut() else {
                break;
            };
            let Some(message) = active.next_message() else {
                break;
            };
            let kind = active.kind;

            match message {
                StreamMessage::Fragment(fragment) => {
                    let progress = active.pipeline.feed(&fragment);
                    changed |= self.apply_progress(kind, progress);
                }
                StreamMessage::Finished => {
                    let progress = active.pipeline.finish();
                    let truncation = progress.truncation.clone();
                    changed |= self.apply_progress(kind, progress);
                    if self.active.is_some() {
                        self.finish_stream(kind, truncation);
                    }
                }
                StreamMessage::Failed(error) => {
                    let text = format_transport_error(&error);
                    tracing::warn!(%error, ?kind, "Stream failed");
                    self.fail_stream(kind, text);
                    changed = true;
                }
            }
        }

        changed
    }

    /// Wait until the open stream has something to process.
    ///
    /// Returns false immediately when no stream is open.
    pub async fn next_activity(&mut self) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        if active.peeked.is_some() {
            return true;
        }
        active.peeked = Some(
            active
                .receiver
                .recv()
                .await
                .unwrap_or(StreamMessage::Finished),
        );
        true
    }

    /// Process events until no stream is open.
    pub async fn settle(&mut self) {
        while self.next_activity().await {
            self.process_stream_events();
        }
    }

    fn apply_progress(&mut self, kind: StreamKind, progress: Progress) -> bool {
        let mut changed = false;

        if progress.deltas_changed
            && let Some(active) = self.active.as_ref()
        {
            let extracted = active.pipeline.extracted();
            changed |= TurnAccumulator::new(&mut self.log)
                .apply(&extracted)
                .changed();
        }

        match progress.control {
            None => {}
            Some(ControlEnvelope::ToolCallsPending(pending)) => {
                self.stop_stream();
                match self.gate.request(&mut self.log, pending) {
                    Ok(()) => {
                        self.last_outcome = Some(TurnOutcome::AwaitingApproval);
                    }
                    Err(e) => {
                        tracing::warn!(%e, "Ignoring tool call request");
                        self.finish_outcome(kind, None);
                    }
                }
                changed = true;
            }
            Some(ControlEnvelope::StreamError(error)) => {
                tracing::warn!(%error, ?kind, "Backend reported an error in the stream");
                self.fail_stream(kind, format_stream_error(None, &error));
                changed = true;
            }
        }

        changed
    }

    fn finish_stream(&mut self, kind: StreamKind, truncation: Option<Truncation>) {
        self.stop_stream();
        tracing::debug!(?kind, truncated = truncation.is_some(), "Stream finished");
        self.finish_outcome(kind, truncation);
    }

    fn finish_outcome(&mut self, kind: StreamKind, truncation: Option<Truncation>) {
        if kind == StreamKind::Approval {
            self.gate.complete();
        }
        self.last_outcome = Some(match truncation {
            Some(truncation) => TurnOutcome::Truncated(truncation),
            None => TurnOutcome::Completed,
        });
    }

    fn fail_stream(&mut self, kind: StreamKind, text: String) {
        self.stop_stream();
        match kind {
            StreamKind::Chat => {
                TurnAccumulator::new(&mut self.log).fail(&text);
            }
            StreamKind::Approval => self.gate.fail(&mut self.log, &text),
        }
        self.last_outcome = Some(TurnOutcome::Failed(text));
    }
}
