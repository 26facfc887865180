//! Single-article fetching with bounded retries
//!
//! An [`ArticleWorker`] turns one URL into one [`ArticleWorkOutcome`]. Every
//! failure mode is reported as a variant of that enum; nothing here returns
//! an error or aborts sibling workers.

use crate::crawler::{FetchError, PageFetcher};
use crate::state::{CircuitBreaker, ErrorStats, ScrapedItem, TaskId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Per-attempt timeouts never shrink below this after a timed-out attempt
const TIMEOUT_FLOOR: Duration = Duration::from_secs(60);

/// Pause after a timed-out attempt
const TIMEOUT_BACKOFF: Duration = Duration::from_secs(1);

/// Result of fetching one article
#[derive(Debug, Clone, PartialEq)]
pub enum ArticleWorkOutcome {
    Success(ScrapedItem),
    /// Every attempt ran out of time
    Timeout { attempts: u32, timeout_seconds: u64 },
    ConnectionError { attempts: u32, message: String },
    /// The domain's circuit was open; no attempt was made
    CircuitBlocked,
    /// The task was cancelled; not a fetch failure
    Cancelled,
    Other { attempts: u32, message: String },
}

impl ArticleWorkOutcome {
    /// Error line recorded on the task for a failed article
    ///
    /// `None` for successes and cancellations.
    pub fn error_message(&self, url: &str) -> Option<String> {
        match self {
            Self::Success(_) | Self::Cancelled => None,
            Self::Timeout {
                attempts,
                timeout_seconds,
            } => Some(format!(
                "Article {} timed out after {} attempts (last timeout {}s)",
                url, attempts, timeout_seconds
            )),
            Self::ConnectionError { attempts, message } => Some(format!(
                "Connection error for article {} after {} attempts: {}",
                url, attempts, message
            )),
            Self::CircuitBlocked => Some(format!(
                "Article {} skipped: circuit breaker open for its domain",
                url
            )),
            Self::Other { attempts, message } => Some(format!(
                "Article {} failed after {} attempts: {}",
                url, attempts, message
            )),
        }
    }
}

/// Fetches articles on behalf of every task
///
/// Cheap to clone; all clones share the fetcher, the circuit breaker and the
/// error counters.
#[derive(Clone)]
pub struct ArticleWorker {
    fetcher: Arc<dyn PageFetcher>,
    breaker: Arc<CircuitBreaker>,
    stats: Arc<ErrorStats>,
    preview_chars: usize,
}

impl ArticleWorker {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        breaker: Arc<CircuitBreaker>,
        stats: Arc<ErrorStats>,
        preview_chars: usize,
    ) -> Self {
        Self {
            fetcher,
            breaker,
            stats,
            preview_chars,
        }
    }

    /// Fetches `url` with up to `max_retries` retries
    ///
    /// The per-task article permit is held for the whole retry loop. Each
    /// attempt runs under `timeout`; a timed-out attempt halves the timeout
    /// for the next one (never below 60s), connection errors back off
    /// `min(5 + 2 * attempt, 15)` seconds and anything else backs off
    /// `min(2^attempt, 5)` seconds. Exhausting the retries counts as one
    /// failure against the domain's circuit. Cancellation is observed while
    /// waiting for the permit, during an attempt and during backoff.
    ///
    /// # Arguments
    ///
    /// * `task_id` - Task the article belongs to, for logging
    /// * `url` - The article to fetch
    /// * `depth` - Crawl depth recorded on the scraped item
    /// * `max_retries` - Retries after the first attempt
    /// * `timeout` - Timeout of the first attempt
    /// * `permits` - The task's article concurrency limit
    /// * `cancel` - The task's cancellation token
    ///
    /// # Returns
    ///
    /// The outcome of the article; failures are variants, never errors.
    #[allow(clippy::too_many_arguments)]
    pub async fn fetch_with_retry(
        &self,
        task_id: TaskId,
        url: &str,
        depth: u32,
        max_retries: u32,
        timeout: Duration,
        permits: &Semaphore,
        cancel: &CancellationToken,
    ) -> ArticleWorkOutcome {
        if self.breaker.is_blocked(url) {
            self.stats.record_circuit_blocked();
            tracing::debug!("Task {}: skipping {}, circuit open", task_id, url);
            return ArticleWorkOutcome::CircuitBlocked;
        }

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ArticleWorkOutcome::Cancelled,
            permit = permits.acquire() => match permit {
                Ok(permit) => permit,
                // Closed semaphore: the task is being torn down
                Err(_) => return ArticleWorkOutcome::Cancelled,
            },
        };

        let mut attempt_timeout = timeout;
        let mut attempt: u32 = 0;

        loop {
            let attempts = attempt + 1;
            let exhausted = attempt >= max_retries;

            tracing::trace!(
                "Task {}: fetching {} (attempt {}, timeout {}s)",
                task_id,
                url,
                attempts,
                attempt_timeout.as_secs()
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return ArticleWorkOutcome::Cancelled,
                result = tokio::time::timeout(attempt_timeout, self.fetcher.fetch_one(url)) => result,
            };

            let error = match result {
                Ok(Ok(page)) => {
                    self.breaker.record_success(url);
                    if attempt > 0 {
                        tracing::info!(
                            "Task {}: {} succeeded on attempt {}",
                            task_id,
                            url,
                            attempts
                        );
                    }
                    let item = ScrapedItem::new(url, page.text, depth, self.preview_chars)
                        .with_attempt(attempts, attempt_timeout.as_secs());
                    return ArticleWorkOutcome::Success(item);
                }
                Ok(Err(error)) => error,
                Err(_) => FetchError::Timeout {
                    url: url.to_string(),
                },
            };

            let backoff = if error.is_timeout() {
                tracing::warn!(
                    "Task {}: {} timed out after {}s (attempt {}/{})",
                    task_id,
                    url,
                    attempt_timeout.as_secs(),
                    attempts,
                    max_retries + 1
                );
                if exhausted {
                    self.breaker.record_failure(url);
                    self.stats.record_timeout();
                    return ArticleWorkOutcome::Timeout {
                        attempts,
                        timeout_seconds: attempt_timeout.as_secs(),
                    };
                }
                attempt_timeout = (attempt_timeout / 2).max(TIMEOUT_FLOOR);
                TIMEOUT_BACKOFF
            } else if error.is_connection_class() {
                tracing::warn!(
                    "Task {}: connection error for {} (attempt {}/{}): {}",
                    task_id,
                    url,
                    attempts,
                    max_retries + 1,
                    error
                );
                if exhausted {
                    self.breaker.record_failure(url);
                    self.stats.record_connection_error();
                    return ArticleWorkOutcome::ConnectionError {
                        attempts,
                        message: error.to_string(),
                    };
                }
                Duration::from_secs(u64::from((5 + 2 * attempt).min(15)))
            } else {
                tracing::warn!(
                    "Task {}: error fetching {} (attempt {}/{}): {}",
                    task_id,
                    url,
                    attempts,
                    max_retries + 1,
                    error
                );
                if exhausted {
                    self.breaker.record_failure(url);
                    self.stats.record_general_error();
                    return ArticleWorkOutcome::Other {
                        attempts,
                        message: error.to_string(),
                    };
                }
                Duration::from_secs(2u64.saturating_pow(attempt).min(5))
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return ArticleWorkOutcome::Cancelled,
                _ = tokio::time::sleep(backoff) => {}
            }

            attempt += 1;
        }
    }
}
