//! Operator console: reads commands, drives the controller, and renders
//! messages, prompts and notices.

use crate::bootstrap::Runtime;
use anyhow::Result;
use mira_core::{BatchStatus, InteractionMode, Notice, Role};
use mira_interfaces::{ApprovalChoice, Interface};
use mira_memory::keys;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Empty,
    Exit,
    Help,
    Status,
    Clear,
    Retry,
    Undo(Option<String>),
    Mode(InteractionMode),
    Read(String),
    Threads(String),
    Invalid(String),
    Message(String),
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    match (head, rest) {
        ("", _) => Command::Empty,
        ("exit" | "quit", "") => Command::Exit,
        ("help", "") => Command::Help,
        ("status", "") => Command::Status,
        ("clear", "") => Command::Clear,
        ("retry", "") => Command::Retry,
        ("undo", "") => Command::Undo(None),
        ("undo", id) if !id.contains(char::is_whitespace) => Command::Undo(Some(id.to_string())),
        ("mode", name) if !name.is_empty() => match name.parse() {
            Ok(mode) => Command::Mode(mode),
            Err(e) => Command::Invalid(e),
        },
        ("read", id) if !id.is_empty() => Command::Read(id.to_string()),
        ("threads", query) => Command::Threads(query.to_string()),
        _ => Command::Message(line.to_string()),
    }
}

const HELP: &str = "\
Commands:
  exit, quit        - end the session
  status            - mode, trusted tools and counters
  mode <name>       - switch to command, copilot or insight
  undo [batch]      - revert the latest (or given) auto-action batch
  retry             - resend the last failed request
  read <id>         - mark a broadcast as read
  threads [text]    - search conversation threads
  clear             - start a fresh conversation
Anything else is sent to Mira.";

pub struct Repl {
    runtime: Runtime,
    interface: Box<dyn Interface>,
    notices: broadcast::Receiver<Notice>,
    shown: usize,
    turn_timeout: Duration,
}

impl Repl {
    pub fn new(runtime: Runtime, interface: Box<dyn Interface>) -> Self {
        let notices = runtime.broker.subscribe();
        Self {
            runtime,
            interface,
            notices,
            shown: 0,
            turn_timeout: Duration::from_secs(30),
        }
    }

    /// Give up on a stream that stays silent this long.
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub async fn run(&mut self) -> Result<()> {
        self.interface
            .send_output("Mira operator console. Type 'help' for commands.")
            .await;

        loop {
            let prompt = format!("mira [{}]>", self.runtime.controller.mode());
            self.interface.send_output(&prompt).await;
            let Some(line) = self.interface.receive_input().await else {
                break;
            };

            match parse_command(&line) {
                Command::Empty => continue,
                Command::Exit => break,
                Command::Help => self.interface.send_output(HELP).await,
                Command::Status => self.show_status().await,
                Command::Clear => {
                    self.runtime.controller.clear_conversation();
                    self.shown = 0;
                    self.interface.show_status("Conversation cleared").await;
                }
                Command::Retry => self.retry().await,
                Command::Undo(batch_id) => self.undo(batch_id).await,
                Command::Mode(mode) => match self.runtime.controller.set_mode(mode) {
                    Ok(()) => self.interface.show_status(&format!("Mode: {}", mode)).await,
                    Err(e) => self.interface.show_status(&format!("❌ {}", e)).await,
                },
                Command::Read(id) => {
                    match self
                        .runtime
                        .controller
                        .mark_read(keys::BROADCAST_READ_NAMESPACE, &id)
                    {
                        Ok(true) => {}
                        Ok(false) => self.interface.show_status("Already read").await,
                        Err(e) => self.interface.show_status(&format!("❌ {}", e)).await,
                    }
                }
                Command::Threads(query) => self.search_threads(&query).await,
                Command::Invalid(reason) => self.interface.show_status(&format!("❌ {}", reason)).await,
                Command::Message(text) => match self.runtime.controller.send_message(&text) {
                    Ok(_) => self.settle().await,
                    Err(e) => self.interface.show_status(&format!("❌ {}", e)).await,
                },
            }
            self.report_notices().await;
        }

        self.runtime.controller.end_session()?;
        self.interface.send_output("Goodbye.").await;
        Ok(())
    }

    /// Pump agent events and resolve prompts until nothing is in flight.
    async fn settle(&mut self) {
        loop {
            while let Some(envelope) = self.runtime.broker.try_next_event() {
                if let Err(e) = self.runtime.controller.handle_event(envelope).await {
                    self.interface.show_status(&format!("⚠️  {}", e)).await;
                }
            }
            self.render_messages().await;

            if let Some(action) = self.runtime.controller.pending_action().cloned() {
                let choice = self.interface.request_approval(&action).await;
                self.resolve_action(choice, &action.tool).await;
                continue;
            }

            if let Some(prompt) = self.runtime.controller.clarification_prompt().cloned() {
                let outcome = match self.interface.request_clarification(&prompt).await {
                    Some(answer) => self
                        .runtime
                        .controller
                        .confirm_clarification(answer)
                        .map(|_| ()),
                    None => self.runtime.controller.dismiss_clarification().map(|_| ()),
                };
                if let Err(e) = outcome {
                    self.interface.show_status(&format!("❌ {}", e)).await;
                }
                continue;
            }

            if !self.runtime.controller.is_streaming() {
                break;
            }

            match tokio::time::timeout(self.turn_timeout, self.runtime.broker.next_event()).await {
                Ok(Some(envelope)) => {
                    if let Err(e) = self.runtime.controller.handle_event(envelope).await {
                        self.interface.show_status(&format!("⚠️  {}", e)).await;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!("Agent silent for {:?}, aborting open streams", self.turn_timeout);
                    for stream_id in self.runtime.controller.open_streams() {
                        self.runtime.controller.abort(stream_id);
                    }
                    self.interface.show_status("Agent did not respond; request aborted").await;
                    break;
                }
            }
        }
        self.render_messages().await;
    }

    async fn resolve_action(&mut self, choice: ApprovalChoice, tool: &str) {
        let controller = &mut self.runtime.controller;
        let result = match choice {
            ApprovalChoice::AllowOnce => controller.confirm_pending().await.map(Some),
            ApprovalChoice::AlwaysAllow => controller.trust_skill_in_session(tool).await.map(Some),
            ApprovalChoice::Deny => controller.reject_pending().map(|_| None),
        };
        let status = match result {
            Ok(Some(dispatched)) => match dispatched.result {
                Ok(_) => format!("✅ Ran {}", dispatched.call.tool),
                Err(e) => format!("❌ {}", e),
            },
            Ok(None) => format!("🚫 Denied {}", tool),
            Err(e) => format!("❌ {}", e),
        };
        self.interface.show_status(&status).await;
    }

    async fn retry(&mut self) {
        let failed = self
            .runtime
            .controller
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == Role::Agent && m.error.is_some())
            .map(|m| m.id.clone());
        let Some(message_id) = failed else {
            self.interface.show_status("Nothing to retry").await;
            return;
        };
        match self.runtime.controller.retry(&message_id) {
            Ok(_) => self.settle().await,
            Err(e) => self.interface.show_status(&format!("❌ {}", e)).await,
        }
    }

    async fn undo(&mut self, batch_id: Option<String>) {
        let batch_id = batch_id.or_else(|| {
            self.runtime
                .controller
                .auto_action_state()
                .iter()
                .rev()
                .find(|b| b.status == BatchStatus::Executed)
                .map(|b| b.id.clone())
        });
        let Some(batch_id) = batch_id else {
            self.interface.show_status("No executed auto-actions to undo").await;
            return;
        };
        let status = match self.runtime.controller.undo_auto_actions(&batch_id).await {
            Ok(mira_controller::UndoOutcome::Undone { compensated, .. }) => {
                format!("↩️  Reverted {} actions from {}", compensated, batch_id)
            }
            Ok(mira_controller::UndoOutcome::AlreadyDiscarded) => {
                format!("Batch {} was already undone", batch_id)
            }
            Err(e) => format!("❌ {}", e),
        };
        self.interface.show_status(&status).await;
    }

    async fn search_threads(&mut self, query: &str) {
        if let Err(e) = self.runtime.controller.search_threads(query) {
            self.interface.show_status(&format!("❌ {}", e)).await;
            return;
        }
        let deadline = tokio::time::Instant::now() + self.turn_timeout;
        while !self.runtime.controller.search_settled() {
            if tokio::time::Instant::now() >= deadline {
                self.interface.show_status("Thread search timed out").await;
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        let Some(state) = self.runtime.controller.search_state() else {
            return;
        };
        if let Some(error) = state.error {
            self.interface.show_status(&format!("❌ {}", error)).await;
            return;
        }
        if state.results.is_empty() {
            self.interface.show_status("No matching threads").await;
            return;
        }
        for thread in state.results {
            let line = format!(
                "  {} {} ({})",
                thread.id,
                thread.title,
                thread.updated_at.format("%Y-%m-%d")
            );
            self.interface.send_output(&line).await;
        }
    }

    async fn show_status(&self) {
        let controller = &self.runtime.controller;
        let metrics = controller.metrics();
        let trusted = controller.trusted_tools();
        let lines = [
            format!(
                "Mode: {}{}",
                controller.mode(),
                if controller.has_mode_override() {
                    " (chosen)"
                } else {
                    ""
                }
            ),
            format!(
                "Trusted tools: {}",
                if trusted.is_empty() {
                    "none".to_string()
                } else {
                    trusted.join(", ")
                }
            ),
            format!(
                "Requests: {} ({} failed), tools run: {} ({} failed), approval rate: {:.0}%",
                metrics.agent_requests,
                metrics.stream_failures,
                metrics.tool_executions,
                metrics.tool_failures,
                metrics.approval_rate() * 100.0
            ),
        ];
        for line in lines {
            self.interface.send_output(&line).await;
        }
    }

    async fn render_messages(&mut self) {
        let mut lines = Vec::new();
        let messages = self.runtime.controller.messages();
        while self.shown < messages.len() {
            let message = &messages[self.shown];
            if message.streaming {
                break;
            }
            match message.role {
                Role::Agent => {
                    if !message.content.is_empty() {
                        lines.push(format!("mira: {}", message.content));
                    }
                    if let Some(error) = &message.error {
                        lines.push(format!("❌ {} (type 'retry' to resend)", error));
                    }
                }
                Role::System => lines.push(format!("ℹ️  {}", message.content)),
                Role::User => {}
            }
            self.shown += 1;
        }
        for line in lines {
            self.interface.send_output(&line).await;
        }
    }

    async fn report_notices(&mut self) {
        loop {
            let notice = match self.notices.try_recv() {
                Ok(notice) => notice,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Skipped {} notices", skipped);
                    continue;
                }
                Err(_) => break,
            };
            let line = match notice {
                Notice::ModeChanged {
                    mode,
                    automatic: true,
                } => format!("Switched to {} mode", mode),
                Notice::AutoActionsUndone { batch_id } => format!("Auto-actions {} undone", batch_id),
                Notice::ExecutionFailed(e) => format!("❌ {}", e),
                Notice::RequestRejected { open, rejected } => {
                    format!("⚠️  Ignored {} while a {} is open", rejected, open)
                }
                _ => continue,
            };
            self.interface.show_status(&line).await;
        }
    }
}
