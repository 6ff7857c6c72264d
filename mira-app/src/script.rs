//! Scripted agent backend.
//!
//! Each non-empty line of the script is a JSON array of agent events: the
//! complete reply to one request. Requests consume lines in order. Lines
//! starting with `#` are comments.

use anyhow::{Context, Result};
use mira_core::{AgentEvent, AgentTransport, ChatRequest, ControllerError, Envelope, EventSink, StreamId};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct ScriptTransport {
    replies: Mutex<VecDeque<Vec<AgentEvent>>>,
    pace: Duration,
    tasks: Mutex<HashMap<StreamId, JoinHandle<()>>>,
}

impl ScriptTransport {
    pub fn from_replies(replies: Vec<Vec<AgentEvent>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            pace: Duration::ZERO,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read agent script {}", path.display()))?;
        let replies = parse_script(&content)
            .with_context(|| format!("Invalid agent script {}", path.display()))?;
        tracing::info!("Loaded {} scripted replies from {}", replies.len(), path.display());
        Ok(Self::from_replies(replies))
    }

    /// Emit events with `pace` between them from a background task.
    /// Requires a tokio runtime.
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }
}

pub fn parse_script(content: &str) -> Result<Vec<Vec<AgentEvent>>> {
    let mut replies = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let events: Vec<AgentEvent> = serde_json::from_str(line)
            .with_context(|| format!("line {}", number + 1))?;
        replies.push(events);
    }
    Ok(replies)
}

impl AgentTransport for ScriptTransport {
    fn open(&self, request: ChatRequest, sink: EventSink) -> Result<(), ControllerError> {
        let stream_id = request.stream_id;
        let events = match self.replies.lock().pop_front() {
            Some(events) => events,
            None => {
                warn!("Agent script exhausted at {}", stream_id);
                vec![AgentEvent::Error {
                    message: "agent script exhausted".to_string(),
                }]
            }
        };
        debug!("{} -> {} scripted events", stream_id, events.len());

        if self.pace.is_zero() {
            for event in events {
                sink.send(Envelope::new(stream_id, event))
                    .map_err(|_| ControllerError::Transport("event broker closed".to_string()))?;
            }
            return Ok(());
        }

        let pace = self.pace;
        let task = tokio::spawn(async move {
            for event in events {
                tokio::time::sleep(pace).await;
                if sink.send(Envelope::new(stream_id, event)).is_err() {
                    break;
                }
            }
        });
        let mut tasks = self.tasks.lock();
        tasks.retain(|_, t| !t.is_finished());
        tasks.insert(stream_id, task);
        Ok(())
    }

    fn abort(&self, stream_id: StreamId) {
        if let Some(task) = self.tasks.lock().remove(&stream_id) {
            task.abort();
        }
    }
}
