use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Decides which tool calls need the operator's confirmation.
///
/// A tool is gated when its lowercased name contains one of
/// `sensitive_keywords` and does not start with one of `exempt_prefixes`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolPolicy {
    #[serde(default = "default_exempt_prefixes")]
    pub exempt_prefixes: Vec<String>,
    #[serde(default = "default_sensitive_keywords")]
    pub sensitive_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolDecision {
    /// Dispatch immediately.
    Allowed,
    /// Hold for the operator.
    RequiresApproval,
}

fn default_exempt_prefixes() -> Vec<String> {
    ["todo__", "broadcast__", "visualizer__"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_sensitive_keywords() -> Vec<String> {
    ["navigate", "update", "task", "delete", "submit", "log"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ToolPolicy {
    fn default() -> Self {
        Self {
            exempt_prefixes: default_exempt_prefixes(),
            sensitive_keywords: default_sensitive_keywords(),
        }
    }
}

impl ToolPolicy {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, PolicyError> {
        let content = tokio::fs::read_to_string(&path).await?;
        let policy: ToolPolicy = serde_yaml::from_str(&content)?;
        Ok(policy)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PolicyError> {
        let content = serde_yaml::to_string(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn is_sensitive(&self, tool: &str) -> bool {
        let name = normalize_tool(tool);
        if name.is_empty() {
            return false;
        }
        if self
            .exempt_prefixes
            .iter()
            .any(|prefix| name.starts_with(&prefix.to_lowercase()))
        {
            return false;
        }
        self.sensitive_keywords
            .iter()
            .any(|keyword| name.contains(&keyword.to_lowercase()))
    }

    pub fn check(&self, tool: &str) -> ToolDecision {
        if self.is_sensitive(tool) {
            ToolDecision::RequiresApproval
        } else {
            ToolDecision::Allowed
        }
    }
}

/// Canonical form used for policy and trust comparisons.
pub fn normalize_tool(tool: &str) -> String {
    tool.trim().to_lowercase()
}
