//! Controller configuration.

use mira_core::{ControllerError, InteractionMode};
use mira_policy::ToolPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerConfig {
    /// Identifies this session to the agent backend and the dispatcher.
    #[serde(default = "default_session_key")]
    pub session_key: String,
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
    #[serde(default = "default_available_modes")]
    pub available_modes: Vec<InteractionMode>,
    /// How many recent batch ids are remembered for duplicate suppression.
    #[serde(default = "default_dedupe_window")]
    pub auto_action_dedupe_window: usize,
    #[serde(default)]
    pub tool_policy: ToolPolicy,
}

fn default_session_key() -> String {
    "mira:advisor".to_string()
}

fn default_search_debounce_ms() -> u64 {
    300
}

fn default_available_modes() -> Vec<InteractionMode> {
    InteractionMode::ALL.to_vec()
}

fn default_dedupe_window() -> usize {
    40
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            session_key: default_session_key(),
            search_debounce_ms: default_search_debounce_ms(),
            available_modes: default_available_modes(),
            auto_action_dedupe_window: default_dedupe_window(),
            tool_policy: ToolPolicy::default(),
        }
    }
}

impl ControllerConfig {
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.session_key.trim().is_empty() {
            return Err(ControllerError::Config(
                "session_key must not be empty".to_string(),
            ));
        }
        if self.available_modes.is_empty() {
            return Err(ControllerError::Config(
                "available_modes must list at least one mode".to_string(),
            ));
        }
        if self.auto_action_dedupe_window == 0 {
            return Err(ControllerError::Config(
                "auto_action_dedupe_window must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
