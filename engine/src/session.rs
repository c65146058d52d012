//! The chat session: one conversation, at most one open stream.

use std::sync::Arc;
use std::time::SystemTime;

use thiserror::Error;
use weft_client::{ApprovalRequest, ChatRequest, Transport};
use weft_stream::{Framing, Truncation};
use weft_types::{Attachments, HistoryEntry, Message, MessageId, ToolCall};

use crate::accumulator::TurnAccumulator;
use crate::gate::{ApprovalGate, GateError, GateState, PendingApproval};
use crate::log::ConversationLog;
use crate::streaming::{ActiveStream, StreamKind};

/// Request parameters that stay fixed for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub model_id: String,
    pub use_mcp: bool,
    pub mcp_server_type: String,
    pub mcp_auto_approve: bool,
}

/// What the user typed, plus anything attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserInput {
    pub text: String,
    pub attachments: Attachments,
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Attachments::none(),
        }
    }

    pub fn with_attachments(mut self, attachments: Attachments) -> Self {
        self.attachments = attachments;
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachments.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// A chat turn is streaming.
    Streaming,
    /// Waiting for [`ChatSession::approve`] or [`ChatSession::decline`].
    AwaitingApproval,
    /// Approved tool calls are running and their answer is streaming.
    Resuming,
}

/// How the most recent stream or decision ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    /// Finished, but the tail of the response was lost.
    Truncated(Truncation),
    AwaitingApproval,
    Declined,
    Failed(String),
    Cancelled,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is busy: decide on the pending tool calls first")]
    Busy,
    #[error("input is empty")]
    EmptyInput,
    #[error(transparent)]
    Gate(#[from] GateError),
}

pub struct ChatSession {
    pub(crate) settings: SessionSettings,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) log: ConversationLog,
    pub(crate) gate: ApprovalGate,
    pub(crate) active: Option<ActiveStream>,
    pub(crate) last_outcome: Option<TurnOutcome>,
}

impl ChatSession {
    pub fn new(settings: SessionSettings, transport: Arc<dyn Transport>) -> Self {
        Self {
            settings,
            transport,
            log: ConversationLog::new(),
            gate: ApprovalGate::default(),
            active: None,
            last_outcome: None,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    #[must_use]
    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        match (&self.active, self.gate.state()) {
            (Some(active), _) if active.kind() == StreamKind::Chat => SessionState::Streaming,
            (Some(_), _) | (None, GateState::Approved) => SessionState::Resuming,
            (None, GateState::AwaitingApproval) => SessionState::AwaitingApproval,
            (None, GateState::Idle) => SessionState::Idle,
        }
    }

    #[must_use]
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        self.gate.pending_tool_calls()
    }

    /// Pending calls together with the backend's prompt.
    #[must_use]
    pub fn pending_approval(&self) -> Option<&PendingApproval> {
        self.gate.pending()
    }

    #[must_use]
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.log.history()
    }

    #[must_use]
    pub fn last_outcome(&self) -> Option<&TurnOutcome> {
        self.last_outcome.as_ref()
    }

    /// Start a new turn.
    ///
    /// Any open stream is stopped before the user message is appended, so two
    /// turns never write into the same assistant message.
    pub fn submit(&mut self, input: UserInput) -> Result<MessageId, SessionError> {
        if input.is_empty() {
            return Err(SessionError::EmptyInput);
        }
        if self.gate.state() == GateState::AwaitingApproval {
            return Err(SessionError::Busy);
        }

        if self.stop_stream() {
            tracing::info!("New turn submitted; previous stream stopped");
        }
        self.gate.complete();

        let UserInput { text, attachments } = input;
        let id = TurnAccumulator::new(&mut self.log).begin_turn(Message::user(
            text,
            attachments,
            SystemTime::now(),
        ));

        let request = ChatRequest {
            model_id: self.settings.model_id.clone(),
            chat_history: self.log.history(),
            use_mcp: self.settings.use_mcp,
            mcp_server_type: self.settings.mcp_server_type.clone(),
            mcp_auto_approve: self.settings.mcp_auto_approve,
        };
        let fragments = self.transport.chat(request);
        self.start_stream(StreamKind::Chat, fragments, Framing::ConcatenatedJson);
        Ok(id)
    }

    /// Run the pending tool calls and stream the resumed answer.
    pub fn approve(&mut self) -> Result<(), SessionError> {
        let approved = self.gate.approve(&mut self.log)?;

        let request = ApprovalRequest {
            tool_calls: approved.tool_calls,
            approved: true,
            chat_history: approved.chat_history,
            model_id: self.settings.model_id.clone(),
            mcp_server_type: self.settings.mcp_server_type.clone(),
        };
        let fragments = self.transport.approve(request);
        self.start_stream(StreamKind::Approval, fragments, Framing::EventStream);
        Ok(())
    }

    /// Drop the pending tool calls. No request is made.
    pub fn decline(&mut self) -> Result<(), SessionError> {
        self.gate.decline(&mut self.log)?;
        self.last_outcome = Some(TurnOutcome::Declined);
        Ok(())
    }

    /// Stop the open stream and drop pending tool calls.
    ///
    /// Returns false when there was nothing to cancel.
    pub fn cancel(&mut self) -> bool {
        let stopped = self.stop_stream();
        let discarded = self.gate.cancel();
        let cancelled = stopped || !discarded.is_empty();
        if cancelled {
            tracing::info!(
                stream_stopped = stopped,
                tool_calls_discarded = discarded.len(),
                "Cancelled"
            );
            self.last_outcome = Some(TurnOutcome::Cancelled);
        }
        cancelled
    }
}
