//! The interaction controller: one object the host drives with operator
//! operations and inbound agent events.

use crate::auto_actions::AutoActionTracker;
use crate::broker::{EventBroker, NoticePublisher};
use crate::clarification::{Cancelled, ClarificationResolver};
use crate::config::ControllerConfig;
use crate::gate::PendingActionGate;
use crate::mode::{ModeDeriver, ModeSignals};
use crate::receipts::ReadReceipts;
use crate::search::{DebouncedSearch, SearchState};
use crate::stream::{MessageStreamManager, StreamHandle};
use mira_core::{
    AgentEvent, AgentTransport, ApprovedCall, AutoAction, AutoActionBatch, BatchStatus,
    ChatRequest, ClarificationAnswer, ClarificationPrompt, ControllerError, Envelope, EventSink,
    ExecutionError, GateKind, InteractionMode, Message, Metrics, MetricsSnapshot, Notice,
    PendingAction, StreamError, StreamId, ThreadSearch, ToolCallRef, ToolDispatcher, TurnInput,
    UndoError,
};
use mira_memory::Storage;
use mira_policy::{SessionTrust, ToolDecision};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of running an approved tool call.
#[derive(Debug)]
pub struct Dispatched {
    pub call: ApprovedCall,
    pub result: Result<Value, ExecutionError>,
    /// Stream carrying the tool output back to the agent. `None` on failure.
    pub continuation: Option<StreamHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    Undone { batch_id: String, compensated: usize },
    /// The batch was already undone; nothing was dispatched.
    AlreadyDiscarded,
}

pub struct AgentController {
    config: ControllerConfig,
    transport: Arc<dyn AgentTransport>,
    dispatcher: Arc<dyn ToolDispatcher>,
    sink: EventSink,
    notices: NoticePublisher,
    metrics: Arc<Metrics>,
    stream: MessageStreamManager,
    gate: PendingActionGate,
    clarification: ClarificationResolver,
    auto_actions: AutoActionTracker,
    trust: SessionTrust,
    mode: ModeDeriver,
    receipts: ReadReceipts,
    search: Option<DebouncedSearch>,
    next_call: u64,
}

impl AgentController {
    /// Build a controller and hydrate session trust and mode from `storage`.
    pub fn new(
        config: ControllerConfig,
        storage: Storage,
        transport: Arc<dyn AgentTransport>,
        dispatcher: Arc<dyn ToolDispatcher>,
        broker: &EventBroker,
    ) -> Result<Self, ControllerError> {
        config.validate()?;

        let trust = SessionTrust::hydrate(storage.session.clone());
        let mode = ModeDeriver::hydrate(storage.clone(), config.available_modes.clone());
        let receipts = ReadReceipts::new(storage.session.clone(), broker.publisher());
        let auto_actions = AutoActionTracker::new(config.auto_action_dedupe_window);

        info!(
            "Controller ready for session {} (mode: {}, {} trusted tools)",
            config.session_key,
            mode.mode(),
            trust.len()
        );

        Ok(Self {
            config,
            transport,
            dispatcher,
            sink: broker.sink(),
            notices: broker.publisher(),
            metrics: Metrics::new(),
            stream: MessageStreamManager::new(),
            gate: PendingActionGate::new(),
            clarification: ClarificationResolver::new(),
            auto_actions,
            trust,
            mode,
            receipts,
            search: None,
            next_call: 0,
        })
    }

    /// Enable thread search, debounced by `search_debounce_ms`. Requires a
    /// tokio runtime when queries are issued.
    pub fn with_search(mut self, backend: Arc<dyn ThreadSearch>) -> Self {
        self.search = Some(DebouncedSearch::new(backend, self.config.search_debounce()));
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn messages(&self) -> &[Message] {
        self.stream.messages()
    }

    pub fn pending_action(&self) -> Option<&PendingAction> {
        self.gate.current()
    }

    pub fn clarification_prompt(&self) -> Option<&ClarificationPrompt> {
        self.clarification.current()
    }

    pub fn auto_action_state(&self) -> &[AutoActionBatch] {
        self.auto_actions.batches()
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode.mode()
    }

    pub fn has_mode_override(&self) -> bool {
        self.mode.has_override()
    }

    pub fn available_modes(&self) -> &[InteractionMode] {
        self.mode.available()
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_streaming()
    }

    pub fn open_streams(&self) -> Vec<StreamId> {
        self.stream.open_streams()
    }

    pub fn last_error(&self) -> Option<&StreamError> {
        self.stream.last_error()
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.stream.conversation_id()
    }

    pub fn is_trusted(&self, tool: &str) -> bool {
        self.trust.contains(tool)
    }

    pub fn trusted_tools(&self) -> Vec<String> {
        self.trust.tools().map(|t| t.to_string()).collect()
    }

    pub fn receipts(&self) -> &ReadReceipts {
        &self.receipts
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // --- Operator operations ---

    /// Append a user message and open a stream for it. A prior stream may
    /// still be open; a pending action stays pending.
    pub fn send_message(&mut self, text: &str) -> Result<StreamHandle, ControllerError> {
        self.send_text(text, json!({}))
    }

    /// Re-open a stream for the input behind a failed agent message. The
    /// user message is not duplicated.
    pub fn retry(&mut self, message_id: &str) -> Result<StreamHandle, ControllerError> {
        let input = self.stream.retry_input(message_id)?;
        info!("Retrying {}", message_id);
        Ok(self.open_stream(input, json!({ "retry_of": message_id })))
    }

    /// Stop an open stream. Returns `false` if it already terminated.
    pub fn abort(&mut self, stream_id: StreamId) -> bool {
        if !self.stream.abort(stream_id) {
            return false;
        }
        self.transport.abort(stream_id);
        info!("Aborted {}", stream_id);
        true
    }

    pub async fn confirm_pending(&mut self) -> Result<Dispatched, ControllerError> {
        let call = self.gate.confirm_once()?;
        self.metrics.inc_confirmations();
        info!("Confirmed {} once", call.tool);
        Ok(self.dispatch(call).await)
    }

    pub fn reject_pending(&mut self) -> Result<PendingAction, ControllerError> {
        let action = self.gate.reject()?;
        self.metrics.inc_rejections();
        info!("Rejected {}", action.tool);
        self.notices.publish(Notice::ActionRejected {
            tool: action.tool.clone(),
        });
        Ok(action)
    }

    /// Trust `tool` for the rest of the session and run the pending call.
    pub async fn trust_skill_in_session(&mut self, tool: &str) -> Result<Dispatched, ControllerError> {
        let call = self.gate.trust_and_confirm(tool, &mut self.trust)?;
        self.metrics.inc_confirmations();
        self.metrics.inc_trust_grants();
        Ok(self.dispatch(call).await)
    }

    /// Answer the open clarification. The answer is sent as the operator's
    /// next message.
    pub fn confirm_clarification(
        &mut self,
        answer: ClarificationAnswer,
    ) -> Result<StreamHandle, ControllerError> {
        let answered = self.clarification.confirm(answer)?;
        self.send_text(
            &answered.answer,
            json!({
                "clarification_confirmed": true,
                "clarification_id": answered.prompt_id,
            }),
        )
    }

    pub fn dismiss_clarification(&mut self) -> Result<Cancelled, ControllerError> {
        self.clarification.dismiss()
    }

    /// Compensate every action of an executed batch and discard it.
    ///
    /// Compensation is best effort: every action is attempted and the batch
    /// is discarded even when some fail.
    pub async fn undo_auto_actions(&mut self, batch_id: &str) -> Result<UndoOutcome, ControllerError> {
        let Some(batch) = self.auto_actions.undo(batch_id)? else {
            return Ok(UndoOutcome::AlreadyDiscarded);
        };

        let mut failures = Vec::new();
        for action in batch.actions.iter().rev() {
            self.metrics.inc_compensations();
            if let Err(e) = self
                .dispatcher
                .compensate(&batch.id, action, &self.config.session_key)
                .await
            {
                warn!("Compensation for {} in batch {} failed: {}", action.action, batch.id, e);
                failures.push(e);
            }
        }

        self.notices.publish(Notice::AutoActionsUndone {
            batch_id: batch.id.clone(),
        });

        if failures.is_empty() {
            Ok(UndoOutcome::Undone {
                batch_id: batch.id,
                compensated: batch.actions.len(),
            })
        } else {
            Err(UndoError {
                batch_id: batch.id,
                attempted: batch.actions.len(),
                failures,
            }
            .into())
        }
    }

    /// Feed the thread search box. The query runs once input settles.
    pub fn search_threads(&mut self, query: &str) -> Result<(), ControllerError> {
        let search = self
            .search
            .as_mut()
            .ok_or_else(|| ControllerError::Config("thread search is not configured".to_string()))?;
        search.input(query.trim());
        Ok(())
    }

    /// Latest applied search result. `None` without a search backend.
    pub fn search_state(&self) -> Option<SearchState> {
        self.search.as_ref().map(DebouncedSearch::snapshot)
    }

    /// Whether the newest search input has been answered.
    pub fn search_settled(&self) -> bool {
        self.search.as_ref().map_or(true, DebouncedSearch::is_settled)
    }

    pub fn set_mode(&mut self, mode: InteractionMode) -> Result<(), ControllerError> {
        self.mode.set_mode(mode)?;
        self.notices.publish(Notice::ModeChanged {
            mode,
            automatic: false,
        });
        Ok(())
    }

    pub fn mark_read(&self, namespace: &str, id: &str) -> Result<bool, ControllerError> {
        self.receipts.mark_read(namespace, id)
    }

    /// Start a fresh conversation. Session trust and mode are kept.
    pub fn clear_conversation(&mut self) {
        for stream_id in self.stream.open_streams() {
            self.transport.abort(stream_id);
        }
        self.stream.clear();
        self.gate.clear();
        self.clarification.clear();
        self.auto_actions.clear();
        info!("Conversation cleared");
    }

    /// Tear down session-scoped state. The durable mode is kept.
    pub fn end_session(&mut self) -> Result<(), ControllerError> {
        self.clear_conversation();
        self.trust
            .reset()
            .map_err(|e| ControllerError::Storage(e.to_string()))?;
        self.mode.end_session()?;
        info!("Session {} ended", self.config.session_key);
        Ok(())
    }

    // --- Inbound events ---

    /// Apply one agent event. Errors are already logged and leave the
    /// controller usable; the host may surface them.
    pub async fn handle_event(&mut self, envelope: Envelope) -> Result<(), ControllerError> {
        let Envelope { stream_id, event } = envelope;
        debug!("{} <- {}", stream_id, event.kind());

        let mut batch_executed = false;
        let result = match event {
            AgentEvent::MessageDelta { delta } => {
                self.stream.apply_delta(stream_id, &delta);
                Ok(())
            }
            AgentEvent::MessageCompleted { content, metadata } => {
                self.stream
                    .complete(stream_id, content.as_deref(), metadata.as_ref());
                Ok(())
            }
            AgentEvent::Error { message } => {
                self.fail_stream(StreamError::Agent { stream_id, message });
                Ok(())
            }
            AgentEvent::Disconnected { reason } => {
                self.fail_stream(StreamError::Transport {
                    stream_id,
                    message: reason,
                });
                Ok(())
            }
            AgentEvent::ToolCallRequested {
                tool,
                message,
                args,
                call_id,
            } => self.on_tool_call(stream_id, tool, message, args, call_id).await,
            AgentEvent::ClarificationRequested {
                id,
                question,
                options,
            } => self.on_clarification(ClarificationPrompt {
                id,
                question,
                options,
            }),
            AgentEvent::AutoActions {
                batch_id,
                actions,
                status,
                error,
            } => match self.on_auto_actions(&batch_id, actions, status, error) {
                Ok(executed) => {
                    batch_executed = executed;
                    Ok(())
                }
                Err(e) => Err(e),
            },
        };

        self.refresh_mode(batch_executed);
        result
    }

    async fn on_tool_call(
        &mut self,
        stream_id: StreamId,
        tool: String,
        message: Option<String>,
        args: Value,
        call_id: Option<String>,
    ) -> Result<(), ControllerError> {
        if let Some(prompt) = self.clarification.current() {
            return Err(self.reject_request(ControllerError::ProtocolViolation {
                open: GateKind::Clarification,
                rejected: format!("tool call '{}' (holding clarification '{}')", tool, prompt.id),
            }));
        }

        let gated = self.config.tool_policy.check(&tool) == ToolDecision::RequiresApproval
            && !self.trust.contains(&tool);
        if gated {
            if let Some(open) = self.gate.current() {
                return Err(self.reject_request(ControllerError::ProtocolViolation {
                    open: GateKind::PendingAction,
                    rejected: format!("tool call '{}' (holding '{}')", tool, open.tool),
                }));
            }
        }

        let call_id = call_id.unwrap_or_else(|| self.next_call_id());
        self.stream.attach_tool_call(
            stream_id,
            ToolCallRef {
                id: call_id.clone(),
                tool: tool.clone(),
                args: args.clone(),
            },
        );

        if !gated {
            debug!("Dispatching {} without confirmation", tool);
            self.dispatch(ApprovedCall {
                tool,
                args,
                call_id: Some(call_id),
            })
            .await;
            return Ok(());
        }

        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("Allow Mira to run {}?", tool));
        let offered = self.gate.offer(PendingAction {
            tool,
            message,
            args,
            call_id: Some(call_id),
        });
        offered.map_err(|e| self.reject_request(e))
    }

    fn on_clarification(&mut self, prompt: ClarificationPrompt) -> Result<(), ControllerError> {
        if let Some(action) = self.gate.current() {
            return Err(self.reject_request(ControllerError::ProtocolViolation {
                open: GateKind::PendingAction,
                rejected: format!("clarification '{}' (holding '{}')", prompt.id, action.tool),
            }));
        }
        let opened = self.clarification.open(prompt);
        opened.map_err(|e| self.reject_request(e))
    }

    /// Returns whether the batch just became executed.
    fn on_auto_actions(
        &mut self,
        batch_id: &str,
        actions: Vec<AutoAction>,
        status: BatchStatus,
        error: Option<String>,
    ) -> Result<bool, ControllerError> {
        match self.auto_actions.get(batch_id).map(|b| b.status) {
            Some(current) if current == status => {
                debug!("Duplicate {:?} notice for batch {}", status, batch_id);
                return Ok(false);
            }
            Some(_) => {}
            None => {
                if !self.auto_actions.record(batch_id, actions) {
                    return Ok(false);
                }
            }
        }

        match status {
            BatchStatus::Running => Ok(false),
            BatchStatus::Executed => {
                self.auto_actions.mark_executed(batch_id)?;
                Ok(true)
            }
            BatchStatus::Error => {
                let message = error.unwrap_or_else(|| "auto-actions failed".to_string());
                self.auto_actions.mark_error(batch_id, message)?;
                Ok(false)
            }
        }
    }

    // --- Internals ---

    fn send_text(&mut self, text: &str, metadata: Value) -> Result<StreamHandle, ControllerError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ControllerError::EmptyMessage);
        }
        let message_id = self.stream.push_user(text);
        debug!("Appended {}", message_id);
        let handle = self.open_stream(
            TurnInput::Text {
                text: text.to_string(),
            },
            metadata,
        );
        self.refresh_mode(false);
        Ok(handle)
    }

    fn open_stream(&mut self, input: TurnInput, metadata: Value) -> StreamHandle {
        let handle = self.stream.open_stream(input.clone());
        let stream_id = handle.stream_id();
        self.metrics.inc_agent_requests();

        let request = ChatRequest {
            stream_id,
            session_key: self.config.session_key.clone(),
            conversation_id: self.stream.conversation_id().map(|s| s.to_string()),
            input,
            metadata,
            history: self.stream.messages().to_vec(),
        };
        if let Err(e) = self.transport.open(request, self.sink.clone()) {
            self.fail_stream(StreamError::Transport {
                stream_id,
                message: e.to_string(),
            });
        }
        handle
    }

    fn fail_stream(&mut self, error: StreamError) {
        let stream_id = match &error {
            StreamError::Agent { stream_id, .. } | StreamError::Transport { stream_id, .. } => {
                *stream_id
            }
            StreamError::Aborted(stream_id) | StreamError::Dropped(stream_id) => *stream_id,
        };
        if self.stream.fail(stream_id, error).is_some() {
            self.metrics.inc_stream_failures();
        }
    }

    async fn dispatch(&mut self, call: ApprovedCall) -> Dispatched {
        self.metrics.inc_tool_executions();
        info!("Executing {}", call.tool);

        match self.dispatcher.execute(&call, &self.config.session_key).await {
            Ok(output) => {
                self.notices.publish(Notice::ToolExecuted {
                    tool: call.tool.clone(),
                    args: call.args.clone(),
                });
                let continuation = self.open_stream(
                    TurnInput::ToolResult {
                        tool: call.tool.clone(),
                        call_id: call.call_id.clone(),
                        output: output.clone(),
                    },
                    json!({}),
                );
                Dispatched {
                    call,
                    result: Ok(output),
                    continuation: Some(continuation),
                }
            }
            Err(e) => {
                warn!("{}", e);
                self.metrics.inc_tool_failures();
                self.notices.publish(Notice::ExecutionFailed(e.clone()));
                Dispatched {
                    call,
                    result: Err(e),
                    continuation: None,
                }
            }
        }
    }

    fn reject_request(&self, err: ControllerError) -> ControllerError {
        if let ControllerError::ProtocolViolation { open, rejected } = &err {
            warn!("Rejected {}: a {} is already open", rejected, open);
            self.metrics.inc_protocol_violations();
            self.notices.publish(Notice::RequestRejected {
                open: *open,
                rejected: rejected.clone(),
            });
        }
        err
    }

    fn refresh_mode(&mut self, batch_executed: bool) {
        let signals = ModeSignals {
            pending_action: self.gate.is_open(),
            tool_intent: self.stream.has_tool_intent(),
            batch_executed,
        };
        if let Some(mode) = self.mode.observe(signals) {
            self.notices.publish(Notice::ModeChanged {
                mode,
                automatic: true,
            });
        }
    }

    fn next_call_id(&mut self) -> String {
        self.next_call += 1;
        format!("call-{}", self.next_call)
    }
}
