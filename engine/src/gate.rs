//! Human approval of tool calls proposed mid-stream.
//!
//! ```text
//! Idle ── request ──> AwaitingApproval ── approve ──> Approved ── complete/fail ──> Idle
//!                            │
//!                            └──────── decline ────────────────────────────────────> Idle
//! ```
//!
//! Pending calls are consumed exactly once: `approve` moves them into the
//! resume request, `decline`, `fail` and `cancel` drop them.

use std::time::SystemTime;

use thiserror::Error;
use weft_stream::PendingToolCalls;
use weft_types::{HistoryEntry, Message, MessageId, ToolCall};

use crate::log::ConversationLog;

pub const DEFAULT_APPROVAL_PROMPT: &str = "The assistant wants to use tools. Approve?";
pub const DECLINED_NOTICE: &str = "Tool calls were declined. No tools were used.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("no tool calls are awaiting approval")]
    NotAwaitingApproval,
    #[error("tool calls are already awaiting approval")]
    AlreadyAwaitingApproval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    AwaitingApproval,
    /// Approved calls are running; their answer is streaming back.
    Approved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApproval {
    tool_calls: Vec<ToolCall>,
    prompt: Option<String>,
}

impl PendingApproval {
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    /// Backend-supplied question to show next to the calls.
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }
}

/// Everything the resume request needs, taken out of the gate on approval.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovedCalls {
    pub tool_calls: Vec<ToolCall>,
    /// History as it stood before the resume placeholder was added.
    pub chat_history: Vec<HistoryEntry>,
    /// Empty assistant message the resumed stream writes into.
    pub placeholder: MessageId,
}

#[derive(Debug, Default)]
pub enum ApprovalGate {
    #[default]
    Idle,
    AwaitingApproval(PendingApproval),
    Approved,
}

impl ApprovalGate {
    #[must_use]
    pub fn state(&self) -> GateState {
        match self {
            Self::Idle => GateState::Idle,
            Self::AwaitingApproval(_) => GateState::AwaitingApproval,
            Self::Approved => GateState::Approved,
        }
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingApproval> {
        match self {
            Self::AwaitingApproval(pending) => Some(pending),
            _ => None,
        }
    }

    #[must_use]
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        self.pending()
            .map(PendingApproval::tool_calls)
            .unwrap_or_default()
    }

    /// Suspend the turn on a `tool_calls_pending` control envelope.
    ///
    /// When the turn has no assistant output yet a summary message is
    /// appended, using the model's own preamble when it sent one.
    pub fn request(
        &mut self,
        log: &mut ConversationLog,
        request: PendingToolCalls,
    ) -> Result<(), GateError> {
        if matches!(self, Self::AwaitingApproval(_)) {
            return Err(GateError::AlreadyAwaitingApproval);
        }

        let PendingToolCalls {
            tool_calls,
            message,
            assistant_message,
        } = request;

        if log.assistant_tail().is_none_or(Message::is_blank) {
            let summary = assistant_message
                .filter(|text| !text.trim().is_empty())
                .or_else(|| message.clone().filter(|text| !text.trim().is_empty()))
                .unwrap_or_else(|| DEFAULT_APPROVAL_PROMPT.to_string());
            let summary = Message::assistant(summary, None, SystemTime::now());
            if log.assistant_tail().is_some() {
                log.replace_last(summary);
            } else {
                log.push(summary);
            }
        }

        tracing::info!(
            tool_calls = tool_calls.len(),
            names = ?tool_calls.iter().map(ToolCall::name).collect::<Vec<_>>(),
            "Tool calls awaiting approval"
        );
        *self = Self::AwaitingApproval(PendingApproval {
            tool_calls,
            prompt: message,
        });
        Ok(())
    }

    /// Approve the pending calls and open a placeholder for the resumed answer.
    pub fn approve(&mut self, log: &mut ConversationLog) -> Result<ApprovedCalls, GateError> {
        let pending = match std::mem::replace(self, Self::Approved) {
            Self::AwaitingApproval(pending) => pending,
            other => {
                *self = other;
                return Err(GateError::NotAwaitingApproval);
            }
        };

        let chat_history = log.history();
        let placeholder = log.push(Message::assistant("", None, SystemTime::now()));
        tracing::info!(tool_calls = pending.tool_calls.len(), "Tool calls approved");

        Ok(ApprovedCalls {
            tool_calls: pending.tool_calls,
            chat_history,
            placeholder,
        })
    }

    /// Discard the pending calls without running them.
    pub fn decline(&mut self, log: &mut ConversationLog) -> Result<Vec<ToolCall>, GateError> {
        let pending = match std::mem::take(self) {
            Self::AwaitingApproval(pending) => pending,
            other => {
                *self = other;
                return Err(GateError::NotAwaitingApproval);
            }
        };

        log.push(Message::assistant(DECLINED_NOTICE, None, SystemTime::now()));
        tracing::info!(tool_calls = pending.tool_calls.len(), "Tool calls declined");
        Ok(pending.tool_calls)
    }

    /// The resumed stream finished.
    pub fn complete(&mut self) {
        if matches!(self, Self::Approved) {
            tracing::info!("Approved tool calls completed");
            *self = Self::Idle;
        }
    }

    /// The resume transport failed; record the error and return to idle.
    pub fn fail(&mut self, log: &mut ConversationLog, error: &str) {
        let was = self.state();
        *self = Self::Idle;

        let notice = Message::assistant(error, None, SystemTime::now());
        if log.assistant_tail().is_some_and(Message::is_blank) {
            log.replace_last(notice);
        } else {
            log.push(notice);
        }
        tracing::info!(from = ?was, "Approval gate failed; back to idle");
    }

    /// Drop any pending or running approval. Returns the discarded calls.
    pub fn cancel(&mut self) -> Vec<ToolCall> {
        match std::mem::take(self) {
            Self::AwaitingApproval(pending) => {
                tracing::info!(tool_calls = pending.tool_calls.len(), "Pending tool calls cancelled");
                pending.tool_calls
            }
            Self::Approved | Self::Idle => Vec::new(),
        }
    }
}
