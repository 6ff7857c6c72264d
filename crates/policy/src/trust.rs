use crate::tool_policy::normalize_tool;
use mira_memory::{keys, KeyValueStore, StoreError};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Tools the operator allowed for the rest of the session.
///
/// Grows monotonically until [`SessionTrust::reset`]. Backed by the
/// session-scoped store only, so it never outlives the session.
pub struct SessionTrust {
    store: Arc<dyn KeyValueStore>,
    tools: BTreeSet<String>,
}

impl SessionTrust {
    /// Hydrate from the session store. Unreadable entries start empty.
    pub fn hydrate(store: Arc<dyn KeyValueStore>) -> Self {
        let tools = match store.get(keys::TRUSTED_SKILLS) {
            Some(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(list) => list.iter().map(|t| normalize_tool(t)).collect(),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable trusted tool list: {}", e);
                    BTreeSet::new()
                }
            },
            None => BTreeSet::new(),
        };
        tracing::debug!("Session trust hydrated with {} tools", tools.len());
        Self { store, tools }
    }

    pub fn contains(&self, tool: &str) -> bool {
        self.tools.contains(&normalize_tool(tool))
    }

    /// Add `tool`; returns whether it was newly trusted.
    pub fn grant(&mut self, tool: &str) -> Result<bool, StoreError> {
        let name = normalize_tool(tool);
        if name.is_empty() || self.tools.contains(&name) {
            return Ok(false);
        }
        self.tools.insert(name.clone());
        self.persist()?;
        tracing::info!("Trusted tool for session: {}", name);
        Ok(true)
    }

    pub fn tools(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Session end.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.tools.clear();
        self.store.remove(keys::TRUSTED_SKILLS)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let list: Vec<&str> = self.tools().collect();
        let json = serde_json::to_string(&list)?;
        self.store.set(keys::TRUSTED_SKILLS, &json)
    }
}
