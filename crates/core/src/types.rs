use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one agent-side streaming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    System,
}

/// Tool invocation attached to the agent message that requested it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRef {
    pub id: String,
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<StreamId>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: content.into(),
            streaming: false,
            tool_call: None,
            error: None,
            stream_id: None,
            created_at: Utc::now(),
        }
    }

    /// Open agent message bound to `stream_id`, still receiving deltas.
    pub fn agent_streaming(id: impl Into<String>, stream_id: StreamId) -> Self {
        Self {
            id: id.into(),
            role: Role::Agent,
            content: String::new(),
            streaming: true,
            tool_call: None,
            error: None,
            stream_id: Some(stream_id),
            created_at: Utc::now(),
        }
    }

    pub fn has_tool_intent(&self) -> bool {
        self.tool_call.is_some()
    }
}

/// A gated tool call awaiting the operator's decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingAction {
    pub tool: String,
    pub message: String,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

/// A tool call cleared for execution, handed to the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovedCall {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClarificationPrompt {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Operator's answer to a clarification prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum ClarificationAnswer {
    /// Index into the prompt's options.
    Choice(usize),
    Freeform(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoAction {
    pub action: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Running,
    Executed,
    Error,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BatchStatus::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoActionBatch {
    pub id: String,
    pub actions: Vec<AutoAction>,
    pub status: BatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InteractionMode {
    #[default]
    Command,
    Copilot,
    Insight,
}

impl InteractionMode {
    pub const ALL: [InteractionMode; 3] = [
        InteractionMode::Command,
        InteractionMode::Copilot,
        InteractionMode::Insight,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InteractionMode::Command => "command",
            InteractionMode::Copilot => "copilot",
            InteractionMode::Insight => "insight",
        }
    }
}

impl fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "command" => Ok(InteractionMode::Command),
            "copilot" | "co-pilot" => Ok(InteractionMode::Copilot),
            "insight" => Ok(InteractionMode::Insight),
            other => Err(format!("Unknown interaction mode: {}", other)),
        }
    }
}

/// Conversation thread as listed by the search surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thread {
    pub id: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_message_preview: String,
}
