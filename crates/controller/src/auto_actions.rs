use mira_core::{AutoAction, AutoActionBatch, BatchStatus, ControllerError};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

/// Record of batches the agent executed without asking.
///
/// Batches move `running -> executed` or `running -> error` and are
/// discarded on undo. Recently seen ids live in a bounded window for
/// dedupe; undone ids are kept for the whole session so a re-delivered
/// notification never resurrects a batch that was already compensated.
/// At most `window` terminal batches are retained.
pub struct AutoActionTracker {
    batches: Vec<AutoActionBatch>,
    seen: VecDeque<String>,
    discarded: HashSet<String>,
    window: usize,
}

impl AutoActionTracker {
    pub fn new(window: usize) -> Self {
        Self {
            batches: Vec::new(),
            seen: VecDeque::new(),
            discarded: HashSet::new(),
            window: window.max(1),
        }
    }

    pub fn batches(&self) -> &[AutoActionBatch] {
        &self.batches
    }

    pub fn get(&self, batch_id: &str) -> Option<&AutoActionBatch> {
        self.batches.iter().find(|b| b.id == batch_id)
    }

    pub fn has_seen(&self, batch_id: &str) -> bool {
        self.seen.iter().any(|id| id == batch_id)
    }

    /// Start tracking a batch as running. Returns `false` for duplicates and
    /// empty batches.
    pub fn record(&mut self, batch_id: &str, actions: Vec<AutoAction>) -> bool {
        if actions.is_empty() {
            debug!("Ignoring empty auto-action batch {}", batch_id);
            return false;
        }
        if self.discarded.contains(batch_id) {
            debug!("Ignoring re-delivered batch {} that was undone", batch_id);
            return false;
        }
        if self.has_seen(batch_id) || self.get(batch_id).is_some() {
            debug!("Ignoring duplicate auto-action batch {}", batch_id);
            return false;
        }
        self.remember(batch_id);
        info!("Tracking auto-action batch {} ({} actions)", batch_id, actions.len());
        self.batches.push(AutoActionBatch {
            id: batch_id.to_string(),
            actions,
            status: BatchStatus::Running,
            error: None,
        });
        true
    }

    pub fn mark_executed(&mut self, batch_id: &str) -> Result<(), ControllerError> {
        self.transition(batch_id, BatchStatus::Executed, None)?;
        self.evict_terminal();
        Ok(())
    }

    pub fn mark_error(&mut self, batch_id: &str, error: impl Into<String>) -> Result<(), ControllerError> {
        self.transition(batch_id, BatchStatus::Error, Some(error.into()))?;
        self.evict_terminal();
        Ok(())
    }

    /// Discard an executed batch and hand it back for compensation.
    ///
    /// `Ok(None)` when the batch was already undone, so a second undo is
    /// a no-op.
    pub fn undo(&mut self, batch_id: &str) -> Result<Option<AutoActionBatch>, ControllerError> {
        if self.discarded.contains(batch_id) {
            debug!("Batch {} already discarded", batch_id);
            return Ok(None);
        }
        let Some(index) = self.batches.iter().position(|b| b.id == batch_id) else {
            return Err(ControllerError::UnknownBatch(batch_id.to_string()));
        };
        let status = self.batches[index].status;
        if status != BatchStatus::Executed {
            return Err(ControllerError::NotUndoable {
                batch_id: batch_id.to_string(),
                status,
            });
        }
        info!("Undoing auto-action batch {}", batch_id);
        self.discarded.insert(batch_id.to_string());
        Ok(Some(self.batches.remove(index)))
    }

    /// Forget tracked batches. Seen and undone ids survive, so events still
    /// in flight for a cleared conversation stay deduplicated.
    pub fn clear(&mut self) {
        self.batches.clear();
    }

    fn transition(
        &mut self,
        batch_id: &str,
        to: BatchStatus,
        error: Option<String>,
    ) -> Result<(), ControllerError> {
        let batch = self
            .batches
            .iter_mut()
            .find(|b| b.id == batch_id)
            .ok_or_else(|| ControllerError::UnknownBatch(batch_id.to_string()))?;
        if batch.status != BatchStatus::Running {
            return Err(ControllerError::InvalidTransition {
                batch_id: batch_id.to_string(),
                from: batch.status,
                to,
            });
        }
        if let Some(message) = &error {
            warn!("Auto-action batch {} failed: {}", batch_id, message);
        }
        batch.status = to;
        batch.error = error;
        Ok(())
    }

    /// Drop the oldest terminal batches beyond the window. Running batches
    /// are never evicted.
    fn evict_terminal(&mut self) {
        let terminal = self.batches.iter().filter(|b| b.status.is_terminal()).count();
        let mut excess = terminal.saturating_sub(self.window);
        while excess > 0 {
            let Some(index) = self.batches.iter().position(|b| b.status.is_terminal()) else {
                break;
            };
            let evicted = self.batches.remove(index);
            debug!("Evicted auto-action batch {} ({:?})", evicted.id, evicted.status);
            excess -= 1;
        }
    }

    fn remember(&mut self, batch_id: &str) {
        self.seen.push_back(batch_id.to_string());
        while self.seen.len() > self.window {
            self.seen.pop_front();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn actions() -> Vec<AutoAction> {
        vec![
            AutoAction {
                action: "navigate".to_string(),
                params: json!({"page": "Customers"}),
            },
            AutoAction {
                action: "filterCustomers".to_string(),
                params: json!({"status": "lapsed"}),
            },
        ]
    }

    #[test]
    fn test_lifecycle_to_executed() {
        let mut tracker = AutoActionTracker::new(40);
        assert!(tracker.record("b1", actions()));
        assert_eq!(tracker.get("b1").unwrap().status, BatchStatus::Running);

        tracker.mark_executed("b1").unwrap();
        assert_eq!(tracker.batches().last().unwrap().status, BatchStatus::Executed);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut tracker = AutoActionTracker::new(40);
        tracker.record("b1", actions());
        tracker.mark_error("b1", "navigation blocked").unwrap();

        let err = tracker.mark_executed("b1").unwrap_err();
        assert!(matches!(
            err,
            ControllerError::InvalidTransition {
                from: BatchStatus::Error,
                to: BatchStatus::Executed,
                ..
            }
        ));
        assert_eq!(tracker.get("b1").unwrap().error.as_deref(), Some("navigation blocked"));
    }

    #[test]
    fn test_duplicate_record_ignored() {
        let mut tracker = AutoActionTracker::new(40);
        assert!(tracker.record("b1", actions()));
        assert!(!tracker.record("b1", actions()));
        assert_eq!(tracker.batches().len(), 1);
    }

    #[test]
    fn test_empty_batch_ignored() {
        let mut tracker = AutoActionTracker::new(40);
        assert!(!tracker.record("b1", vec![]));
        assert!(tracker.batches().is_empty());
    }

    #[test]
    fn test_undo_requires_executed() {
        let mut tracker = AutoActionTracker::new(40);
        tracker.record("b1", actions());
        assert!(matches!(
            tracker.undo("b1"),
            Err(ControllerError::NotUndoable {
                status: BatchStatus::Running,
                ..
            })
        ));
    }

    #[test]
    fn test_undo_twice_is_noop() {
        let mut tracker = AutoActionTracker::new(40);
        tracker.record("b1", actions());
        tracker.mark_executed("b1").unwrap();

        let batch = tracker.undo("b1").unwrap().unwrap();
        assert_eq!(batch.actions.len(), 2);
        assert!(tracker.undo("b1").unwrap().is_none());
        assert!(tracker.get("b1").is_none());
        // Re-delivery after undo does not resurrect the batch.
        assert!(!tracker.record("b1", actions()));
    }

    #[test]
    fn test_undo_unknown_batch() {
        let mut tracker = AutoActionTracker::new(40);
        assert!(matches!(tracker.undo("nope"), Err(ControllerError::UnknownBatch(_))));
    }

    #[test]
    fn test_undo_stays_idempotent_past_the_window() {
        let mut tracker = AutoActionTracker::new(40);
        tracker.record("b1", actions());
        tracker.mark_executed("b1").unwrap();
        assert!(tracker.undo("b1").unwrap().is_some());

        for n in 2..=45 {
            let id = format!("b{}", n);
            tracker.record(&id, actions());
            tracker.mark_executed(&id).unwrap();
        }
        assert!(!tracker.has_seen("b1"));

        assert!(tracker.undo("b1").unwrap().is_none());
        assert!(!tracker.record("b1", actions()));
        assert!(tracker.undo("b1").unwrap().is_none());
    }

    #[test]
    fn test_terminal_batches_are_bounded() {
        let mut tracker = AutoActionTracker::new(2);
        tracker.record("b1", actions());
        tracker.mark_executed("b1").unwrap();
        tracker.record("b2", actions());
        tracker.mark_error("b2", "blocked").unwrap();
        tracker.record("running", actions());
        tracker.record("b3", actions());
        tracker.mark_executed("b3").unwrap();

        let ids: Vec<&str> = tracker.batches().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b2", "running", "b3"]);
        assert!(matches!(tracker.undo("b1"), Err(ControllerError::UnknownBatch(_))));
    }

    #[test]
    fn test_clear_keeps_undone_ids() {
        let mut tracker = AutoActionTracker::new(40);
        tracker.record("b1", actions());
        tracker.mark_executed("b1").unwrap();
        tracker.undo("b1").unwrap();
        tracker.record("b2", actions());

        tracker.clear();
        assert!(tracker.batches().is_empty());
        assert!(!tracker.record("b1", actions()));
        assert!(!tracker.record("b2", actions()));
        assert!(tracker.undo("b1").unwrap().is_none());
    }

    #[test]
    fn test_seen_window_is_bounded() {
        let mut tracker = AutoActionTracker::new(2);
        tracker.record("b1", actions());
        tracker.record("b2", actions());
        tracker.record("b3", actions());
        assert!(!tracker.has_seen("b1"));
        assert!(tracker.has_seen("b3"));
    }
}
