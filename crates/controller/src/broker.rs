//! Host-owned event broker.
//!
//! Inbound agent events from every transport funnel into one queue that the
//! host drains in order; outbound notices fan out to any number of
//! subscribers.

use mira_core::{Envelope, EventSink, Notice};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

const NOTICE_CAPACITY: usize = 256;

/// Cloneable publishing half of the notice channel.
#[derive(Clone)]
pub struct NoticePublisher {
    tx: broadcast::Sender<Notice>,
}

impl NoticePublisher {
    /// Returns the number of subscribers that received the notice.
    pub fn publish(&self, notice: Notice) -> usize {
        match self.tx.send(notice) {
            Ok(count) => count,
            Err(broadcast::error::SendError(notice)) => {
                debug!("No notice subscribers for {:?}", notice);
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

pub struct EventBroker {
    sink: EventSink,
    inbox: mpsc::UnboundedReceiver<Envelope>,
    notices: NoticePublisher,
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroker {
    pub fn new() -> Self {
        let (sink, inbox) = mpsc::unbounded_channel();
        let (tx, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            sink,
            inbox,
            notices: NoticePublisher { tx },
        }
    }

    /// Sending half for transports.
    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    pub fn publisher(&self) -> NoticePublisher {
        self.notices.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Next inbound event in arrival order. Pending forever while the
    /// broker is alive, since it holds a sink itself.
    pub async fn next_event(&mut self) -> Option<Envelope> {
        self.inbox.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<Envelope> {
        self.inbox.try_recv().ok()
    }
}
