use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Scout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(rename = "circuit-breaker", default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

/// Scheduling limits and timing of the task orchestrator
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum number of tasks executing at the same time; further submissions queue
    #[serde(rename = "max-concurrent-tasks")]
    pub max_concurrent_tasks: u32,

    /// Default per-task limit on in-flight article fetches
    #[serde(rename = "max-concurrent-articles")]
    pub max_concurrent_articles: u32,

    /// Hard ceiling on link discovery for the submitted page (seconds)
    #[serde(rename = "discovery-timeout-seconds")]
    pub discovery_timeout_seconds: u64,

    /// Upper bound of a single article fetch attempt (seconds)
    #[serde(rename = "article-timeout-ceiling-seconds")]
    pub article_timeout_ceiling_seconds: u64,

    /// Largest number of articles dispatched together in one batch
    #[serde(rename = "max-batch-size")]
    pub max_batch_size: u32,

    /// Minimum remaining budget required before a batch is dispatched (seconds)
    #[serde(rename = "min-item-budget-seconds")]
    pub min_item_budget_seconds: u64,

    /// Floor of the batch-level wait timeout (seconds)
    #[serde(rename = "min-batch-wait-seconds")]
    pub min_batch_wait_seconds: u64,

    /// Number of characters kept in the preview text of a scraped item
    #[serde(rename = "preview-chars")]
    pub preview_chars: usize,

    /// Content shorter than this is not sent to the classifier
    #[serde(rename = "min-classify-chars")]
    pub min_classify_chars: usize,
}

impl OrchestratorConfig {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_seconds)
    }

    pub fn article_timeout_ceiling(&self) -> Duration {
        Duration::from_secs(self.article_timeout_ceiling_seconds)
    }

    pub fn min_item_budget(&self) -> Duration {
        Duration::from_secs(self.min_item_budget_seconds)
    }

    pub fn min_batch_wait(&self) -> Duration {
        Duration::from_secs(self.min_batch_wait_seconds)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 5,
            max_concurrent_articles: 10,
            discovery_timeout_seconds: 300,
            article_timeout_ceiling_seconds: 180,
            max_batch_size: 10,
            min_item_budget_seconds: 60,
            min_batch_wait_seconds: 30,
            preview_chars: 2000,
            min_classify_chars: 50,
        }
    }
}

/// Per-domain failure tracking policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures on one domain before it is blocked
    #[serde(rename = "failure-threshold")]
    pub failure_threshold: u32,

    /// Seconds after the last failure before a blocked domain heals itself
    #[serde(rename = "cooldown-seconds")]
    pub cooldown_seconds: u64,
}

impl CircuitBreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_seconds: 300,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// HTTP page fetcher configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Client-side timeout of a whole request (seconds)
    #[serde(rename = "request-timeout-seconds")]
    pub request_timeout_seconds: u64,

    /// Timeout for establishing a connection (seconds)
    #[serde(rename = "connect-timeout-seconds")]
    pub connect_timeout_seconds: u64,

    /// Maximum number of links returned by discovery
    #[serde(rename = "max-links")]
    pub max_links: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 60,
            connect_timeout_seconds: 10,
            max_links: 25,
        }
    }
}
