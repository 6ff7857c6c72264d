use anyhow::{Context, Result};
use mira_controller::ControllerConfig;
use mira_core::InteractionMode;
use mira_policy::ToolPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Directory holding durable preferences.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    #[serde(default = "default_session_key")]
    pub session_key: String,
    /// JSONL file of scripted agent replies, one reply per line.
    #[serde(default = "default_script")]
    pub script: PathBuf,
    /// Optional YAML tool policy; the built-in policy applies otherwise.
    #[serde(default)]
    pub policy: Option<PathBuf>,
    #[serde(default)]
    pub available_modes: Option<Vec<InteractionMode>>,
    /// Optional JSON thread list backing the `threads` command.
    #[serde(default)]
    pub threads: Option<PathBuf>,
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
    /// Delay between scripted events, to make streaming visible.
    #[serde(default)]
    pub pace_ms: u64,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_session_key() -> String {
    "mira:advisor".to_string()
}

fn default_script() -> PathBuf {
    PathBuf::from("./demos/script.jsonl")
}

fn default_search_debounce_ms() -> u64 {
    ControllerConfig::default().search_debounce_ms
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            session_key: default_session_key(),
            script: default_script(),
            policy: None,
            available_modes: None,
            threads: None,
            search_debounce_ms: default_search_debounce_ms(),
            pace_ms: 0,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// `MIRA_STORAGE_DIR` and `MIRA_SCRIPT` win over the file.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var("MIRA_STORAGE_DIR").ok(),
            std::env::var("MIRA_SCRIPT").ok(),
        )
    }

    fn with_overrides(mut self, storage_dir: Option<String>, script: Option<String>) -> Self {
        if let Some(dir) = storage_dir.filter(|s| !s.trim().is_empty()) {
            self.storage_dir = PathBuf::from(dir);
        }
        if let Some(script) = script.filter(|s| !s.trim().is_empty()) {
            self.script = PathBuf::from(script);
        }
        self
    }

    pub fn controller_config(&self, tool_policy: ToolPolicy) -> ControllerConfig {
        let defaults = ControllerConfig::default();
        ControllerConfig {
            session_key: self.session_key.clone(),
            available_modes: self
                .available_modes
                .clone()
                .unwrap_or(defaults.available_modes),
            search_debounce_ms: self.search_debounce_ms,
            tool_policy,
            ..defaults
        }
    }
}
