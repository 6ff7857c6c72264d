use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct Metrics {
    agent_requests: AtomicU64,
    stream_failures: AtomicU64,
    confirmations: AtomicU64,
    rejections: AtomicU64,
    trust_grants: AtomicU64,
    protocol_violations: AtomicU64,
    tool_executions: AtomicU64,
    tool_failures: AtomicU64,
    compensations: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_agent_requests(&self) {
        self.agent_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_stream_failures(&self) {
        self.stream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_confirmations(&self) {
        self.confirmations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejections(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_trust_grants(&self) {
        self.trust_grants.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_protocol_violations(&self) {
        self.protocol_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tool_executions(&self) {
        self.tool_executions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tool_failures(&self) {
        self.tool_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_compensations(&self) {
        self.compensations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            agent_requests: self.agent_requests.load(Ordering::Relaxed),
            stream_failures: self.stream_failures.load(Ordering::Relaxed),
            confirmations: self.confirmations.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            trust_grants: self.trust_grants.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
            tool_executions: self.tool_executions.load(Ordering::Relaxed),
            tool_failures: self.tool_failures.load(Ordering::Relaxed),
            compensations: self.compensations.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub agent_requests: u64,
    pub stream_failures: u64,
    pub confirmations: u64,
    pub rejections: u64,
    pub trust_grants: u64,
    pub protocol_violations: u64,
    pub tool_executions: u64,
    pub tool_failures: u64,
    pub compensations: u64,
}

impl MetricsSnapshot {
    pub fn stream_success_rate(&self) -> f64 {
        if self.agent_requests == 0 {
            return 1.0;
        }
        1.0 - (self.stream_failures as f64 / self.agent_requests as f64)
    }

    pub fn tool_success_rate(&self) -> f64 {
        if self.tool_executions == 0 {
            return 1.0;
        }
        1.0 - (self.tool_failures as f64 / self.tool_executions as f64)
    }

    /// Share of gated actions the operator approved (once or via trust).
    pub fn approval_rate(&self) -> f64 {
        let approved = self.confirmations + self.trust_grants;
        let decided = approved + self.rejections;
        if decided == 0 {
            return 1.0;
        }
        approved as f64 / decided as f64
    }
}
