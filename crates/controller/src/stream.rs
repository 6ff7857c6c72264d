//! Message log and per-stream delta accumulation.

use mira_core::{ControllerError, Message, Role, StreamError, StreamId, ToolCallRef, TurnInput};
use std::collections::{HashMap, HashSet};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// What a finished stream resolved to: the id of the agent message it
/// produced, if any.
pub type StreamOutcome = Result<Option<String>, StreamError>;

/// Resolves once the stream reaches a terminal event.
#[derive(Debug)]
pub struct StreamHandle {
    stream_id: StreamId,
    rx: oneshot::Receiver<StreamOutcome>,
}

impl StreamHandle {
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub async fn finished(self) -> StreamOutcome {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(StreamError::Dropped(self.stream_id)),
        }
    }
}

struct OpenStream {
    message: Option<usize>,
    waiter: Option<oneshot::Sender<StreamOutcome>>,
}

/// Result of applying one delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOutcome {
    Started(String),
    Appended(String),
    /// The stream already terminated.
    Dropped,
}

/// Owns the message log. Each stream id maps to at most one agent message,
/// so two concurrent streams never write into the same record.
pub struct MessageStreamManager {
    messages: Vec<Message>,
    next_id: u64,
    next_stream: u64,
    open: HashMap<StreamId, OpenStream>,
    /// Terminated streams, kept across `clear` so late events stay dropped.
    finished: HashSet<StreamId>,
    /// Input behind each stream that may still need a retry.
    inputs: HashMap<StreamId, TurnInput>,
    last_error: Option<StreamError>,
    conversation_id: Option<String>,
}

impl Default for MessageStreamManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStreamManager {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            next_id: 0,
            next_stream: 0,
            open: HashMap::new(),
            finished: HashSet::new(),
            inputs: HashMap::new(),
            last_error: None,
            conversation_id: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn is_streaming(&self) -> bool {
        !self.open.is_empty()
    }

    pub fn open_streams(&self) -> Vec<StreamId> {
        let mut ids: Vec<StreamId> = self.open.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn last_error(&self) -> Option<&StreamError> {
        self.last_error.as_ref()
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn has_tool_intent(&self) -> bool {
        self.messages.iter().any(Message::has_tool_intent)
    }

    pub fn push_user(&mut self, text: &str) -> String {
        let id = self.allocate_id(Role::User);
        self.messages.push(Message::user(id.clone(), text));
        id
    }

    /// Register a new stream and return its handle.
    pub fn open_stream(&mut self, input: TurnInput) -> StreamHandle {
        self.next_stream += 1;
        let stream_id = StreamId(self.next_stream);
        let (tx, rx) = oneshot::channel();
        self.open.insert(
            stream_id,
            OpenStream {
                message: None,
                waiter: Some(tx),
            },
        );
        self.inputs.insert(stream_id, input);
        debug!("Opened {}", stream_id);
        StreamHandle { stream_id, rx }
    }

    pub fn apply_delta(&mut self, stream_id: StreamId, delta: &str) -> DeltaOutcome {
        let Some((index, created)) = self.ensure_message(stream_id) else {
            warn!("Dropping late delta for terminated {}", stream_id);
            return DeltaOutcome::Dropped;
        };
        let message = &mut self.messages[index];
        message.content.push_str(delta);
        if created {
            DeltaOutcome::Started(message.id.clone())
        } else {
            DeltaOutcome::Appended(message.id.clone())
        }
    }

    /// Attach a tool call to the stream's agent message.
    pub fn attach_tool_call(&mut self, stream_id: StreamId, call: ToolCallRef) -> Option<String> {
        let Some((index, _)) = self.ensure_message(stream_id) else {
            warn!("Tool call {} arrived after {} terminated", call.tool, stream_id);
            return None;
        };
        let message = &mut self.messages[index];
        message.tool_call = Some(call);
        Some(message.id.clone())
    }

    /// Terminal success. `content` is used only when no deltas arrived.
    pub fn complete(
        &mut self,
        stream_id: StreamId,
        content: Option<&str>,
        metadata: Option<&serde_json::Value>,
    ) -> Option<String> {
        if let Some(conversation_id) = metadata.and_then(conversation_id_from) {
            if self.conversation_id.as_deref() != Some(conversation_id.as_str()) {
                debug!("Conversation id is now {}", conversation_id);
                self.conversation_id = Some(conversation_id);
            }
        }

        let has_content = content.map(|c| !c.is_empty()).unwrap_or(false);
        let index = if has_content {
            self.ensure_message(stream_id).map(|(index, _)| index)
        } else {
            self.open.get(&stream_id).and_then(|s| s.message)
        };
        if let (Some(index), Some(content)) = (index, content) {
            let message = &mut self.messages[index];
            if message.content.is_empty() {
                message.content = content.to_string();
            }
        }

        let Some(slot) = self.terminate(stream_id) else {
            warn!("Ignoring completion for terminated {}", stream_id);
            return None;
        };
        self.inputs.remove(&stream_id);
        let message_id = slot.message.map(|i| self.messages[i].id.clone());
        if let Some(waiter) = slot.waiter {
            let _ = waiter.send(Ok(message_id.clone()));
        }
        message_id
    }

    /// Terminal failure. Partial content is left as is; the error is
    /// recorded on the message. A stream that failed before producing any
    /// content still gets an (empty) agent message so the failure is
    /// visible and retryable.
    pub fn fail(&mut self, stream_id: StreamId, error: StreamError) -> Option<String> {
        let index = self.ensure_message(stream_id).map(|(index, _)| index);
        let Some(slot) = self.terminate(stream_id) else {
            warn!("Ignoring failure for terminated {}: {}", stream_id, error);
            return None;
        };
        let message_id = index.map(|i| {
            let message = &mut self.messages[i];
            message.error = Some(error.to_string());
            message.id.clone()
        });
        warn!("{}", error);
        self.last_error = Some(error.clone());
        if let Some(waiter) = slot.waiter {
            let _ = waiter.send(Err(error));
        }
        message_id
    }

    /// Operator abort. The message keeps its content and no error field.
    pub fn abort(&mut self, stream_id: StreamId) -> bool {
        match self.terminate(stream_id) {
            Some(slot) => {
                self.inputs.remove(&stream_id);
                if let Some(waiter) = slot.waiter {
                    let _ = waiter.send(Err(StreamError::Aborted(stream_id)));
                }
                debug!("Aborted {}", stream_id);
                true
            }
            None => false,
        }
    }

    /// Input to resend for a failed agent message.
    pub fn retry_input(&self, message_id: &str) -> Result<TurnInput, ControllerError> {
        let message = self
            .message(message_id)
            .ok_or_else(|| ControllerError::UnknownMessage(message_id.to_string()))?;
        if message.role != Role::Agent || message.error.is_none() {
            return Err(ControllerError::NotRetryable(message_id.to_string()));
        }
        message
            .stream_id
            .and_then(|s| self.inputs.get(&s))
            .cloned()
            .ok_or_else(|| ControllerError::NotRetryable(message_id.to_string()))
    }

    /// Drop every message and stream. Open handles resolve as dropped and
    /// their stream ids count as terminated.
    pub fn clear(&mut self) {
        self.messages.clear();
        let open: Vec<StreamId> = self.open.drain().map(|(stream_id, _)| stream_id).collect();
        self.finished.extend(open);
        self.inputs.clear();
        self.last_error = None;
        self.conversation_id = None;
    }

    fn allocate_id(&mut self, role: Role) -> String {
        self.next_id += 1;
        let prefix = match role {
            Role::User => "user",
            Role::Agent => "agent",
            Role::System => "system",
        };
        format!("{}-{}", prefix, self.next_id)
    }

    /// Index of the stream's agent message, and whether this call created
    /// it. Unknown stream ids are adopted as agent-initiated streams;
    /// streams that already terminated yield `None`.
    fn ensure_message(&mut self, stream_id: StreamId) -> Option<(usize, bool)> {
        if self.finished.contains(&stream_id) {
            return None;
        }
        if let Some(index) = self.open.get(&stream_id).and_then(|s| s.message) {
            return Some((index, false));
        }
        let id = self.allocate_id(Role::Agent);
        self.messages.push(Message::agent_streaming(id, stream_id));
        let index = self.messages.len() - 1;
        self.open
            .entry(stream_id)
            .or_insert(OpenStream {
                message: None,
                waiter: None,
            })
            .message = Some(index);
        Some((index, true))
    }

    fn terminate(&mut self, stream_id: StreamId) -> Option<OpenStream> {
        let slot = self.open.remove(&stream_id)?;
        self.finished.insert(stream_id);
        if let Some(index) = slot.message {
            self.messages[index].streaming = false;
        }
        Some(slot)
    }
}

fn conversation_id_from(metadata: &serde_json::Value) -> Option<String> {
    metadata
        .get("conversation_id")
        .or_else(|| metadata.get("conversationId"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
