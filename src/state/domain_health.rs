use std::time::Duration;
use tokio::time::Instant;

/// Tracks the failure history of one domain for the circuit breaker
///
/// Instants come from `tokio::time` so cooldowns follow the runtime clock
/// (and can be advanced in tests with a paused clock).
#[derive(Debug, Clone, Default)]
pub struct DomainHealth {
    /// Failures not yet offset by successes
    pub failure_count: u32,

    /// When the most recent failure was recorded
    pub last_failure_time: Option<Instant>,

    /// Whether requests to this domain are currently refused
    pub blocked: bool,
}

impl DomainHealth {
    /// Creates a healthy domain record
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failed fetch
    ///
    /// Returns `true` if this failure is the one that blocks the domain.
    pub fn record_failure(&mut self, now: Instant, threshold: u32) -> bool {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_time = Some(now);

        if self.failure_count >= threshold && !self.blocked {
            self.blocked = true;
            return true;
        }
        false
    }

    /// Records a successful fetch
    ///
    /// Each success offsets one failure. Returns `true` if the domain was
    /// blocked and this success brought the count back to zero.
    pub fn record_success(&mut self) -> bool {
        self.failure_count = self.failure_count.saturating_sub(1);

        if self.failure_count == 0 && self.blocked {
            self.blocked = false;
            return true;
        }
        false
    }

    /// Checks whether more than `cooldown` has passed since the last failure
    pub fn cooldown_elapsed(&self, now: Instant, cooldown: Duration) -> bool {
        match self.last_failure_time {
            Some(last) => now.saturating_duration_since(last) > cooldown,
            None => true,
        }
    }

    /// Blocked and still inside the cooldown window, without mutating anything
    pub fn is_blocking(&self, now: Instant, cooldown: Duration) -> bool {
        self.blocked && !self.cooldown_elapsed(now, cooldown)
    }

    /// Clears the failure history after a cooldown
    pub fn reset(&mut self) {
        self.failure_count = 0;
        self.blocked = false;
    }
}
