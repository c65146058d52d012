//! Conversation engine for weft.
//!
//! [`ChatSession`] owns the [`ConversationLog`] and at most one open stream.
//! Transport fragments flow through a [`TurnPipeline`] (frame decoding,
//! envelope decoding, delta folding) and land in the log through the two
//! writers allowed to touch it:
//!
//! - [`TurnAccumulator`] appends the turn's assistant message on first output
//!   and rewrites it in place after that.
//! - [`ApprovalGate`] suspends the turn when the model asks to run tools and
//!   records the decision.
//!
//! The session is driven by the caller: `submit`, then alternate
//! [`ChatSession::next_activity`] and [`ChatSession::process_stream_events`]
//! until [`ChatSession::state`] is idle or awaiting approval.

mod accumulator;
mod config;
pub mod errors;
mod gate;
mod log;
mod pipeline;
mod session;
mod streaming;

pub use accumulator::{Applied, TurnAccumulator};
pub use config::{
    BackendConfig, ConfigError, DEFAULT_BACKEND_URL, DEFAULT_MCP_SERVER, DEFAULT_MODEL,
    McpConfig, StreamConfig, WeftConfig, config_path,
};
pub use gate::{
    ApprovalGate, ApprovedCalls, DECLINED_NOTICE, DEFAULT_APPROVAL_PROMPT, GateError, GateState,
    PendingApproval,
};
pub use log::ConversationLog;
pub use pipeline::{Progress, TurnPipeline};
pub use session::{
    ChatSession, SessionError, SessionSettings, SessionState, TurnOutcome, UserInput,
};
pub use streaming::DEFAULT_STREAM_EVENT_BUDGET;

pub use weft_client::{
    ApprovalRequest, ChatRequest, FragmentStream, Transport, TransportError,
};
pub use weft_stream::Truncation;
pub use weft_types;
