use mira_core::{ControllerError, InteractionMode};
use mira_memory::{keys, Storage};
use tracing::{debug, info, warn};

/// Aggregate state the deriver looks at after every update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeSignals {
    pub pending_action: bool,
    pub tool_intent: bool,
    pub batch_executed: bool,
}

impl ModeSignals {
    fn wants_copilot(&self) -> bool {
        self.pending_action || self.tool_intent || self.batch_executed
    }
}

/// Chooses the interaction mode.
///
/// The last explicit choice is kept in durable storage. The override marker
/// lives in session storage: once the operator picks a mode, automatic
/// switching stops until the session ends.
pub struct ModeDeriver {
    storage: Storage,
    available: Vec<InteractionMode>,
    mode: InteractionMode,
    user_override: bool,
}

impl ModeDeriver {
    pub fn hydrate(storage: Storage, available: Vec<InteractionMode>) -> Self {
        let fallback = available.first().copied().unwrap_or_default();
        let mode = match storage.durable.get(keys::MODE) {
            Some(raw) => match raw.parse::<InteractionMode>() {
                Ok(mode) if available.contains(&mode) => mode,
                Ok(mode) => {
                    debug!("Persisted mode {} not available, using {}", mode, fallback);
                    fallback
                }
                Err(e) => {
                    warn!("Ignoring persisted mode: {}", e);
                    fallback
                }
            },
            None => fallback,
        };
        let user_override = storage.session.get(keys::MODE_OVERRIDE).as_deref() == Some("1");
        debug!("Mode hydrated: {} (override: {})", mode, user_override);
        Self {
            storage,
            available,
            mode,
            user_override,
        }
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn has_override(&self) -> bool {
        self.user_override
    }

    pub fn available(&self) -> &[InteractionMode] {
        &self.available
    }

    /// Re-evaluate. Returns the new mode when it changed.
    ///
    /// Only ever promotes to copilot; automatic switches are not persisted.
    pub fn observe(&mut self, signals: ModeSignals) -> Option<InteractionMode> {
        if self.user_override || !signals.wants_copilot() {
            return None;
        }
        if self.mode == InteractionMode::Copilot
            || !self.available.contains(&InteractionMode::Copilot)
        {
            return None;
        }
        info!("Switching to copilot ({:?})", signals);
        self.mode = InteractionMode::Copilot;
        Some(self.mode)
    }

    /// Explicit operator choice: persist it and stop automatic switching.
    pub fn set_mode(&mut self, mode: InteractionMode) -> Result<(), ControllerError> {
        if !self.available.contains(&mode) {
            return Err(ControllerError::ModeUnavailable(mode));
        }
        self.storage
            .durable
            .set(keys::MODE, mode.as_str())
            .map_err(|e| ControllerError::Storage(e.to_string()))?;
        self.storage
            .session
            .set(keys::MODE_OVERRIDE, "1")
            .map_err(|e| ControllerError::Storage(e.to_string()))?;
        self.mode = mode;
        self.user_override = true;
        info!("Mode set to {}", mode);
        Ok(())
    }

    /// Session end: forget the override, keep the persisted mode.
    pub fn end_session(&mut self) -> Result<(), ControllerError> {
        self.user_override = false;
        self.storage
            .session
            .remove(keys::MODE_OVERRIDE)
            .map_err(|e| ControllerError::Storage(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use mira_memory::{FileStore, MemoryStore};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn tool_intent() -> ModeSignals {
        ModeSignals {
            tool_intent: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_tool_intent_promotes_copilot() {
        let mut deriver = ModeDeriver::hydrate(Storage::in_memory(), InteractionMode::ALL.to_vec());
        assert_eq!(deriver.mode(), InteractionMode::Command);

        assert_eq!(deriver.observe(tool_intent()), Some(InteractionMode::Copilot));
        assert_eq!(deriver.observe(tool_intent()), None);
    }

    #[test]
    fn test_no_signal_no_change() {
        let mut deriver = ModeDeriver::hydrate(Storage::in_memory(), InteractionMode::ALL.to_vec());
        assert_eq!(deriver.observe(ModeSignals::default()), None);
        assert_eq!(deriver.mode(), InteractionMode::Command);
    }

    #[test]
    fn test_override_blocks_automatic_switch() {
        let mut deriver = ModeDeriver::hydrate(Storage::in_memory(), InteractionMode::ALL.to_vec());
        deriver.set_mode(InteractionMode::Insight).unwrap();

        assert_eq!(deriver.observe(tool_intent()), None);
        assert_eq!(deriver.mode(), InteractionMode::Insight);
    }

    #[test]
    fn test_automatic_switch_not_persisted() {
        let storage = Storage::in_memory();
        let mut deriver = ModeDeriver::hydrate(storage.clone(), InteractionMode::ALL.to_vec());
        deriver.observe(tool_intent());
        assert!(storage.durable.get(keys::MODE).is_none());
    }

    #[test]
    fn test_set_mode_persists_and_marks_session() {
        let storage = Storage::in_memory();
        let mut deriver = ModeDeriver::hydrate(storage.clone(), InteractionMode::ALL.to_vec());
        deriver.set_mode(InteractionMode::Insight).unwrap();

        assert_eq!(storage.durable.get(keys::MODE).as_deref(), Some("insight"));
        assert_eq!(storage.session.get(keys::MODE_OVERRIDE).as_deref(), Some("1"));

        let rehydrated = ModeDeriver::hydrate(storage, InteractionMode::ALL.to_vec());
        assert_eq!(rehydrated.mode(), InteractionMode::Insight);
        assert!(rehydrated.has_override());
    }

    #[test]
    fn test_unavailable_mode_rejected() {
        let mut deriver = ModeDeriver::hydrate(
            Storage::in_memory(),
            vec![InteractionMode::Command, InteractionMode::Insight],
        );
        assert!(matches!(
            deriver.set_mode(InteractionMode::Copilot),
            Err(ControllerError::ModeUnavailable(InteractionMode::Copilot))
        ));
        assert_eq!(deriver.observe(tool_intent()), None);
    }

    #[test]
    fn test_durable_mode_survives_new_session() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.json");
        {
            let storage = Storage::new(
                Arc::new(FileStore::open(&path).unwrap()),
                Arc::new(MemoryStore::new()),
            );
            let mut deriver = ModeDeriver::hydrate(storage, InteractionMode::ALL.to_vec());
            deriver.set_mode(InteractionMode::Insight).unwrap();
        }

        let storage = Storage::new(
            Arc::new(FileStore::open(&path).unwrap()),
            Arc::new(MemoryStore::new()),
        );
        let mut deriver = ModeDeriver::hydrate(storage, InteractionMode::ALL.to_vec());
        assert_eq!(deriver.mode(), InteractionMode::Insight);
        // Fresh session: no override, so tool intent may switch again.
        assert!(!deriver.has_override());
        assert_eq!(deriver.observe(tool_intent()), Some(InteractionMode::Copilot));
    }
}
