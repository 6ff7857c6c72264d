//! Debounced thread search.

use mira_core::{Thread, ThreadSearch};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Latest applied search result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query: String,
    /// Sequence number of the input that produced `results`.
    pub seq: u64,
    pub results: Vec<Thread>,
    pub error: Option<String>,
}

/// Restarts a fixed delay on every input and queries only once input
/// settles. Results are applied last-write-wins by input sequence, so a
/// slow superseded query never overwrites a newer one.
///
/// Must be driven from inside a tokio runtime.
pub struct DebouncedSearch {
    backend: Arc<dyn ThreadSearch>,
    delay: Duration,
    issued: u64,
    pending: Option<JoinHandle<()>>,
    state: Arc<Mutex<SearchState>>,
}

impl DebouncedSearch {
    pub fn new(backend: Arc<dyn ThreadSearch>, delay: Duration) -> Self {
        Self {
            backend,
            delay,
            issued: 0,
            pending: None,
            state: Arc::new(Mutex::new(SearchState::default())),
        }
    }

    pub fn input(&mut self, text: impl Into<String>) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        self.issued += 1;
        let seq = self.issued;
        let query = text.into();
        let backend = self.backend.clone();
        let state = self.state.clone();
        let delay = self.delay;

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("Searching threads for {:?} (#{})", query, seq);
            let outcome = backend.search(&query).await;

            let mut state = state.lock();
            if seq <= state.seq {
                debug!("Discarding superseded search #{}", seq);
                return;
            }
            state.seq = seq;
            state.query = query;
            match outcome {
                Ok(results) => {
                    state.results = results;
                    state.error = None;
                }
                Err(e) => state.error = Some(e.to_string()),
            }
        }));
    }

    /// Drop the pending query, if any.
    pub fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }

    pub fn snapshot(&self) -> SearchState {
        self.state.lock().clone()
    }

    /// True once the newest input produced a result or an error.
    pub fn is_settled(&self) -> bool {
        self.state.lock().seq >= self.issued
    }
}

impl Drop for DebouncedSearch {
    fn drop(&mut self) {
        self.cancel();
    }
}
