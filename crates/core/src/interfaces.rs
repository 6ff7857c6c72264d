//! Seams to the collaborators the controller drives but does not own.

use crate::error::{ControllerError, ExecutionError};
use crate::events::{ChatRequest, EventSink};
use crate::types::{ApprovedCall, AutoAction, StreamId, Thread};
use async_trait::async_trait;

/// Tool execution interface.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    /// Execute an approved call and return its output.
    async fn execute(
        &self,
        call: &ApprovedCall,
        session_key: &str,
    ) -> Result<serde_json::Value, ExecutionError>;

    /// Request the compensating action for one auto-executed action.
    async fn compensate(
        &self,
        batch_id: &str,
        action: &AutoAction,
        session_key: &str,
    ) -> Result<(), ExecutionError>;
}

/// Streaming connection to the agent backend.
///
/// `open` must not block: implementations start the request and push every
/// event for it into `sink`, stamped with `request.stream_id`.
pub trait AgentTransport: Send + Sync {
    fn open(&self, request: ChatRequest, sink: EventSink) -> Result<(), ControllerError>;

    /// Stop delivering events for `stream_id`. Default is a no-op.
    fn abort(&self, _stream_id: StreamId) {}
}

/// Thread listing backend used by the debounced search.
#[async_trait]
pub trait ThreadSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Thread>, ControllerError>;
}
