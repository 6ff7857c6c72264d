#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]
//! Shared mocks for controller integration tests.

use async_trait::async_trait;
use mira_controller::*;
use mira_core::*;
use mira_memory::Storage;
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Records every request; optionally replays canned events into the sink.
#[derive(Default)]
pub struct RecordingTransport {
    pub requests: Mutex<Vec<ChatRequest>>,
    pub aborted: Mutex<Vec<StreamId>>,
    pub replies: Mutex<Vec<Vec<AgentEvent>>>,
    pub refuse: Mutex<bool>,
}

impl RecordingTransport {
    pub fn request(&self, index: usize) -> ChatRequest {
        self.requests.lock().unwrap()[index].clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_stream(&self) -> StreamId {
        self.requests.lock().unwrap().last().unwrap().stream_id
    }

    /// Queue events to emit on the next `open`.
    pub fn reply_with(&self, events: Vec<AgentEvent>) {
        self.replies.lock().unwrap().push(events);
    }
}

impl AgentTransport for RecordingTransport {
    fn open(&self, request: ChatRequest, sink: EventSink) -> Result<(), ControllerError> {
        if *self.refuse.lock().unwrap() {
            return Err(ControllerError::Transport("connection refused".to_string()));
        }
        let stream_id = request.stream_id;
        self.requests.lock().unwrap().push(request);
        let mut replies = self.replies.lock().unwrap();
        if !replies.is_empty() {
            for event in replies.remove(0) {
                let _ = sink.send(Envelope::new(stream_id, event));
            }
        }
        Ok(())
    }

    fn abort(&self, stream_id: StreamId) {
        self.aborted.lock().unwrap().push(stream_id);
    }
}

#[derive(Default)]
pub struct RecordingDispatcher {
    pub executed: Mutex<Vec<ApprovedCall>>,
    pub compensated: Mutex<Vec<(String, String)>>,
    pub failing: Mutex<HashSet<String>>,
}

impl RecordingDispatcher {
    pub fn fail_on(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn executed_tools(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.tool.clone())
            .collect()
    }

    pub fn compensation_count(&self) -> usize {
        self.compensated.lock().unwrap().len()
    }
}

#[async_trait]
impl ToolDispatcher for RecordingDispatcher {
    async fn execute(
        &self,
        call: &ApprovedCall,
        _session_key: &str,
    ) -> Result<serde_json::Value, ExecutionError> {
        self.executed.lock().unwrap().push(call.clone());
        if self.failing.lock().unwrap().contains(&call.tool) {
            return Err(ExecutionError::new(&call.tool, "backend rejected the call"));
        }
        Ok(json!({"status": "success", "tool": call.tool}))
    }

    async fn compensate(
        &self,
        batch_id: &str,
        action: &AutoAction,
        _session_key: &str,
    ) -> Result<(), ExecutionError> {
        self.compensated
            .lock()
            .unwrap()
            .push((batch_id.to_string(), action.action.clone()));
        if self.failing.lock().unwrap().contains(&action.action) {
            return Err(ExecutionError::new(&action.action, "cannot revert"));
        }
        Ok(())
    }
}

pub struct Harness {
    pub controller: AgentController,
    pub broker: EventBroker,
    pub transport: Arc<RecordingTransport>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub storage: Storage,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_storage(Storage::in_memory())
    }

    pub fn with_storage(storage: Storage) -> Self {
        Self::with_config(ControllerConfig::default(), storage)
    }

    pub fn with_config(config: ControllerConfig, storage: Storage) -> Self {
        let broker = EventBroker::new();
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let controller = AgentController::new(
            config,
            storage.clone(),
            transport.clone(),
            dispatcher.clone(),
            &broker,
        )
        .unwrap();
        Self {
            controller,
            broker,
            transport,
            dispatcher,
            storage,
        }
    }

    pub async fn emit(&mut self, stream_id: StreamId, event: AgentEvent) -> Result<(), ControllerError> {
        self.controller
            .handle_event(Envelope::new(stream_id, event))
            .await
    }

    /// Drain whatever transports pushed into the broker.
    pub async fn pump(&mut self) -> Vec<ControllerError> {
        let mut errors = Vec::new();
        while let Some(envelope) = self.broker.try_next_event() {
            if let Err(e) = self.controller.handle_event(envelope).await {
                errors.push(e);
            }
        }
        errors
    }
}

pub fn tool_call(tool: &str, args: serde_json::Value) -> AgentEvent {
    AgentEvent::ToolCallRequested {
        tool: tool.to_string(),
        message: Some(format!("Allow Mira to run {}?", tool)),
        args,
        call_id: None,
    }
}

pub fn delta(text: &str) -> AgentEvent {
    AgentEvent::MessageDelta {
        delta: text.to_string(),
    }
}

pub fn completed() -> AgentEvent {
    AgentEvent::MessageCompleted {
        content: None,
        metadata: None,
    }
}

pub fn batch(id: &str, actions: &[&str], status: BatchStatus) -> AgentEvent {
    AgentEvent::AutoActions {
        batch_id: id.to_string(),
        actions: actions
            .iter()
            .map(|a| AutoAction {
                action: a.to_string(),
                params: json!({}),
            })
            .collect(),
        status,
        error: None,
    }
}

pub fn clarification(id: &str) -> AgentEvent {
    AgentEvent::ClarificationRequested {
        id: id.to_string(),
        question: "Which policy did you mean?".to_string(),
        options: vec!["Life - P-100".to_string(), "Home - P-200".to_string()],
    }
}
