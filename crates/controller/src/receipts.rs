use crate::broker::NoticePublisher;
use mira_core::{ControllerError, Notice};
use mira_memory::{keys, KeyValueStore};
use std::sync::Arc;
use tracing::debug;

const READ: &str = "1";

/// Session-scoped "seen" markers, e.g. for broadcasts.
pub struct ReadReceipts {
    store: Arc<dyn KeyValueStore>,
    notices: NoticePublisher,
}

impl ReadReceipts {
    pub fn new(store: Arc<dyn KeyValueStore>, notices: NoticePublisher) -> Self {
        Self { store, notices }
    }

    pub fn is_read(&self, namespace: &str, id: &str) -> bool {
        self.store.get(&keys::read_receipt(namespace, id)).as_deref() == Some(READ)
    }

    /// Returns whether the item was unread before.
    pub fn mark_read(&self, namespace: &str, id: &str) -> Result<bool, ControllerError> {
        if self.is_read(namespace, id) {
            return Ok(false);
        }
        self.store
            .set(&keys::read_receipt(namespace, id), READ)
            .map_err(|e| ControllerError::Storage(e.to_string()))?;
        debug!("Marked {}:{} read", namespace, id);
        self.notices.publish(Notice::BroadcastRead {
            namespace: namespace.to_string(),
            id: id.to_string(),
        });
        Ok(true)
    }

    pub fn unread_count<'a>(&self, namespace: &str, ids: impl IntoIterator<Item = &'a str>) -> usize {
        ids.into_iter().filter(|id| !self.is_read(namespace, id)).count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::broker::EventBroker;
    use mira_memory::MemoryStore;

    #[tokio::test]
    async fn test_mark_read_publishes_once() {
        let broker = EventBroker::new();
        let mut notices = broker.subscribe();
        let store = Arc::new(MemoryStore::new());
        let receipts = ReadReceipts::new(store.clone(), broker.publisher());
        let ns = keys::BROADCAST_READ_NAMESPACE;

        assert!(receipts.mark_read(ns, "17").unwrap());
        assert!(!receipts.mark_read(ns, "17").unwrap());
        assert_eq!(
            store.get("advisorhub:broadcast-read:17").as_deref(),
            Some("1")
        );
        assert_eq!(
            notices.recv().await.unwrap(),
            Notice::BroadcastRead {
                namespace: ns.to_string(),
                id: "17".to_string(),
            }
        );
        assert!(notices.try_recv().is_err());
    }

    #[test]
    fn test_unread_count() {
        let broker = EventBroker::new();
        let receipts = ReadReceipts::new(Arc::new(MemoryStore::new()), broker.publisher());
        let ns = keys::BROADCAST_READ_NAMESPACE;
        receipts.mark_read(ns, "1").unwrap();
        assert_eq!(receipts.unread_count(ns, ["1", "2", "3"]), 2);
    }
}
