//! Orchestrator-wide failure counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by every worker and task
#[derive(Debug, Default)]
pub struct ErrorStats {
    timeout_errors: AtomicU64,
    connection_errors: AtomicU64,
    general_errors: AtomicU64,
    cancelled_tasks: AtomicU64,
    circuit_breaker_blocked: AtomicU64,
}

impl ErrorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_timeout(&self) {
        self.timeout_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_general_error(&self) {
        self.general_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled_task(&self) {
        self.cancelled_tasks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_circuit_blocked(&self) {
        self.circuit_breaker_blocked.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads every counter
    ///
    /// Counters are read one by one, so a snapshot taken while workers are
    /// running may mix values from slightly different instants.
    pub fn snapshot(&self) -> ErrorStatistics {
        ErrorStatistics {
            timeout_errors: self.timeout_errors.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            general_errors: self.general_errors.load(Ordering::Relaxed),
            cancelled_tasks: self.cancelled_tasks.load(Ordering::Relaxed),
            circuit_breaker_blocked: self.circuit_breaker_blocked.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`ErrorStats`] for reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorStatistics {
    pub timeout_errors: u64,
    pub connection_errors: u64,
    pub general_errors: u64,
    pub cancelled_tasks: u64,
    pub circuit_breaker_blocked: u64,
}

impl ErrorStatistics {
    pub fn total(&self) -> u64 {
        self.timeout_errors
            + self.connection_errors
            + self.general_errors
            + self.cancelled_tasks
            + self.circuit_breaker_blocked
    }

    /// Errors per submitted task
    pub fn error_rate(&self, total_tasks: usize) -> f64 {
        self.total() as f64 / total_tasks.max(1) as f64
    }
}
