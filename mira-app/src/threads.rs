//! File-backed thread listing for the console's search command.

use anyhow::{Context, Result};
use async_trait::async_trait;
use mira_core::{ControllerError, Thread, ThreadSearch};
use std::path::Path;

/// Threads loaded from a JSON array, matched by case-insensitive substring
/// on title and preview. Newest first.
pub struct ThreadIndex {
    threads: Vec<Thread>,
}

impl ThreadIndex {
    pub fn new(mut threads: Vec<Thread>) -> Self {
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Self { threads }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read thread list {}", path.display()))?;
        let threads: Vec<Thread> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid thread list {}", path.display()))?;
        tracing::info!("Loaded {} threads from {}", threads.len(), path.display());
        Ok(Self::new(threads))
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

#[async_trait]
impl ThreadSearch for ThreadIndex {
    async fn search(&self, query: &str) -> Result<Vec<Thread>, ControllerError> {
        let needle = query.trim().to_lowercase();
        Ok(self
            .threads
            .iter()
            .filter(|t| {
                needle.is_empty()
                    || t.title.to_lowercase().contains(&needle)
                    || t.last_message_preview.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }
}
