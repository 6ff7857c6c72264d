//! Error taxonomy for the interaction controller.

use crate::types::{BatchStatus, InteractionMode, StreamId};
use thiserror::Error;

/// A streaming request failed. Partial content stays on the message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    #[error("Agent error on {stream_id}: {message}")]
    Agent { stream_id: StreamId, message: String },

    #[error("Transport error on {stream_id}: {message}")]
    Transport { stream_id: StreamId, message: String },

    #[error("Stream {0} aborted")]
    Aborted(StreamId),

    #[error("Stream {0} closed without a terminal event")]
    Dropped(StreamId),
}

/// A confirmed or auto-dispatched action failed to execute.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Tool '{tool}' failed: {message}")]
pub struct ExecutionError {
    pub tool: String,
    pub message: String,
}

impl ExecutionError {
    pub fn new(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// One or more compensating actions failed. The batch is discarded anyway.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Undo of batch {batch_id} incomplete: {} of {attempted} compensations failed", .failures.len())]
pub struct UndoError {
    pub batch_id: String,
    pub attempted: usize,
    pub failures: Vec<ExecutionError>,
}

/// Which single-slot request was already occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    PendingAction,
    Clarification,
}

impl std::fmt::Display for GateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateKind::PendingAction => f.write_str("pending action"),
            GateKind::Clarification => f.write_str("clarification"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("Protocol violation: {rejected} arrived while a {open} is open")]
    ProtocolViolation { open: GateKind, rejected: String },

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Undo(#[from] UndoError),

    #[error("No pending action to resolve")]
    NothingPending,

    #[error("Pending action is for '{pending}', not '{requested}'")]
    ToolMismatch { pending: String, requested: String },

    #[error("No clarification prompt is open")]
    NoClarification,

    #[error("Invalid clarification answer: {0}")]
    InvalidAnswer(String),

    #[error("Unknown auto-action batch: {0}")]
    UnknownBatch(String),

    #[error("Batch {batch_id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        batch_id: String,
        from: BatchStatus,
        to: BatchStatus,
    },

    #[error("Batch {batch_id} is {status:?}; only executed batches can be undone")]
    NotUndoable { batch_id: String, status: BatchStatus },

    #[error("Message text is empty")]
    EmptyMessage,

    #[error("Unknown message: {0}")]
    UnknownMessage(String),

    #[error("Message {0} did not fail and cannot be retried")]
    NotRetryable(String),

    #[error("Mode {0} is not available in this session")]
    ModeUnavailable(InteractionMode),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_violation_display() {
        let err = ControllerError::ProtocolViolation {
            open: GateKind::PendingAction,
            rejected: "tool call 'sendEmail'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Protocol violation: tool call 'sendEmail' arrived while a pending action is open"
        );
    }

    #[test]
    fn test_undo_error_counts_failures() {
        let err = UndoError {
            batch_id: "b1".to_string(),
            attempted: 3,
            failures: vec![ExecutionError::new("navigate", "timeout")],
        };
        assert_eq!(err.to_string(), "Undo of batch b1 incomplete: 1 of 3 compensations failed");
    }

    #[test]
    fn test_stream_error_converts() {
        let err: ControllerError = StreamError::Aborted(StreamId(2)).into();
        assert!(matches!(err, ControllerError::Stream(StreamError::Aborted(StreamId(2)))));
        assert_eq!(err.to_string(), "Stream stream-2 aborted");
    }
}
