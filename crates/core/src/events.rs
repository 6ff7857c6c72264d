//! Wire-level events exchanged with the agent backend and the host.

use crate::error::{ExecutionError, GateKind};
use crate::types::{AutoAction, BatchStatus, InteractionMode, Message, StreamId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Inbound agent event. The transport wraps each one in an [`Envelope`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    MessageDelta {
        delta: String,
    },
    MessageCompleted {
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        metadata: Option<serde_json::Value>,
    },
    /// Agent-reported failure of the current turn.
    Error {
        message: String,
    },
    /// The connection dropped before a terminal event.
    Disconnected {
        reason: String,
    },
    ToolCallRequested {
        tool: String,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        args: serde_json::Value,
        #[serde(default)]
        call_id: Option<String>,
    },
    ClarificationRequested {
        id: String,
        question: String,
        #[serde(default)]
        options: Vec<String>,
    },
    AutoActions {
        batch_id: String,
        actions: Vec<AutoAction>,
        status: BatchStatus,
        #[serde(default)]
        error: Option<String>,
    },
}

impl AgentEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::MessageDelta { .. } => "message_delta",
            AgentEvent::MessageCompleted { .. } => "message_completed",
            AgentEvent::Error { .. } => "error",
            AgentEvent::Disconnected { .. } => "disconnected",
            AgentEvent::ToolCallRequested { .. } => "tool_call_requested",
            AgentEvent::ClarificationRequested { .. } => "clarification_requested",
            AgentEvent::AutoActions { .. } => "auto_actions",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub stream_id: StreamId,
    pub event: AgentEvent,
}

impl Envelope {
    pub fn new(stream_id: StreamId, event: AgentEvent) -> Self {
        Self { stream_id, event }
    }
}

/// Sending half handed to transports; all inbound events funnel through it.
pub type EventSink = mpsc::UnboundedSender<Envelope>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnInput {
    Text {
        text: String,
    },
    ToolResult {
        tool: String,
        #[serde(default)]
        call_id: Option<String>,
        output: serde_json::Value,
    },
}

/// One agent-side streaming request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub stream_id: StreamId,
    pub session_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub input: TurnInput,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub history: Vec<Message>,
}

/// Outbound notification published on the host broker.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    ToolExecuted {
        tool: String,
        args: serde_json::Value,
    },
    ExecutionFailed(ExecutionError),
    ActionRejected {
        tool: String,
    },
    /// A gated request was refused because another one is still open.
    RequestRejected {
        open: GateKind,
        rejected: String,
    },
    AutoActionsUndone {
        batch_id: String,
    },
    BroadcastRead {
        namespace: String,
        id: String,
    },
    ModeChanged {
        mode: InteractionMode,
        automatic: bool,
    },
}
