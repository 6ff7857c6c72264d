use async_trait::async_trait;
use mira_core::{ApprovedCall, AutoAction, ExecutionError, ToolDispatcher};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashSet;
use tracing::info;

/// Stand-in executor for the console: records calls and reports success,
/// except for tools configured to fail.
#[derive(Default)]
pub struct ConsoleDispatcher {
    failing: HashSet<String>,
    log: Mutex<Vec<String>>,
}

impl ConsoleDispatcher {
    pub fn failing<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failing: tools.into_iter().map(Into::into).collect(),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Executed and compensated calls, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl ToolDispatcher for ConsoleDispatcher {
    async fn execute(
        &self,
        call: &ApprovedCall,
        session_key: &str,
    ) -> Result<serde_json::Value, ExecutionError> {
        info!("[{}] executing {} {}", session_key, call.tool, call.args);
        self.log.lock().push(format!("execute {}", call.tool));
        if self.failing.contains(&call.tool) {
            return Err(ExecutionError::new(&call.tool, "rejected by backend"));
        }
        Ok(json!({"status": "success", "tool": call.tool, "args": call.args}))
    }

    async fn compensate(
        &self,
        batch_id: &str,
        action: &AutoAction,
        session_key: &str,
    ) -> Result<(), ExecutionError> {
        info!("[{}] reverting {} from batch {}", session_key, action.action, batch_id);
        self.log.lock().push(format!("revert {}", action.action));
        if self.failing.contains(&action.action) {
            return Err(ExecutionError::new(&action.action, "cannot be reverted"));
        }
        Ok(())
    }
}
