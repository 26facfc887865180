//! Per-domain circuit breaker
//!
//! Shared by every article worker of every task. A domain is blocked after
//! `failure-threshold` failures and heals itself the first time it is checked
//! more than `cooldown-seconds` after its last failure; there is no
//! background sweep.

use crate::config::CircuitBreakerConfig;
use crate::state::DomainHealth;
use crate::url::domain_key;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// Point-in-time view of the breaker for health reporting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BreakerStatus {
    pub blocked_domains: Vec<String>,
    pub domain_failure_counts: BTreeMap<String, u32>,
    pub total_blocked_domains: usize,
}

/// Blocks domains that keep failing
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    domains: Mutex<HashMap<String, DomainHealth>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            domains: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Records a failure against the domain of `url`
    ///
    /// The domain's record is created on its first failure.
    pub fn record_failure(&self, url: &str) {
        let domain = domain_key(url);
        let mut domains = self.lock();
        let health = domains.entry(domain.clone()).or_default();

        if health.record_failure(Instant::now(), self.config.failure_threshold) {
            tracing::warn!(
                "Circuit breaker: domain {} blocked after {} failures",
                domain,
                health.failure_count
            );
        }
    }

    /// Records a success against the domain of `url`
    pub fn record_success(&self, url: &str) {
        let domain = domain_key(url);
        let mut domains = self.lock();

        if let Some(health) = domains.get_mut(&domain) {
            if health.record_success() {
                tracing::info!("Circuit breaker: domain {} unblocked after success", domain);
            }
        }
    }

    /// Checks whether requests to the domain of `url` are currently refused
    ///
    /// A blocked domain whose cooldown has elapsed is reset here and reported
    /// as not blocked.
    pub fn is_blocked(&self, url: &str) -> bool {
        let domain = domain_key(url);
        let mut domains = self.lock();

        let Some(health) = domains.get_mut(&domain) else {
            return false;
        };
        if !health.blocked {
            return false;
        }

        if health.cooldown_elapsed(Instant::now(), self.config.cooldown()) {
            health.reset();
            tracing::info!("Circuit breaker: domain {} reset after cooldown", domain);
            return false;
        }

        true
    }

    /// Domains currently refusing requests, sorted
    pub fn blocked_domains(&self) -> Vec<String> {
        let now = Instant::now();
        let cooldown = self.config.cooldown();
        let mut blocked: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, health)| health.is_blocking(now, cooldown))
            .map(|(domain, _)| domain.clone())
            .collect();
        blocked.sort();
        blocked
    }

    /// Snapshot for the health report
    pub fn status(&self) -> BreakerStatus {
        let blocked_domains = self.blocked_domains();
        let domain_failure_counts = self
            .lock()
            .iter()
            .map(|(domain, health)| (domain.clone(), health.failure_count))
            .collect();

        BreakerStatus {
            total_blocked_domains: blocked_domains.len(),
            blocked_domains,
            domain_failure_counts,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DomainHealth>> {
        self.domains.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
