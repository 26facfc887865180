//! Scout: a fault-tolerant scrape-and-classify task orchestrator
//!
//! This crate accepts long-running crawl jobs (discover links on a page, fetch
//! the discovered articles concurrently, classify their content), runs them in
//! the background under global and per-task concurrency limits, and exposes
//! live progress to polling callers. Per-domain failures are contained by a
//! circuit breaker and overall deadlines degrade to partial results.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Scout operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid scrape request: {0}")]
    InvalidRequest(String),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Failed to scrape main page: {0}")]
    Discovery(#[source] crawler::FetchError),

    #[error("Main page scraping timed out after {seconds} seconds")]
    DiscoveryTimeout { seconds: u64 },

    #[error("Task execution failed: {0}")]
    Execution(String),

    #[error("Orchestrator is shutting down")]
    ShuttingDown,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Scout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{
    ArticleWorkOutcome, ArticleWorker, ContentClassifier, Detection, KeywordClassifier,
    PageFetcher, ScrapeJob, TaskOrchestrator,
};
pub use state::{CircuitBreaker, TaskId, TaskRecord, TaskStatus};
pub use url::{domain_key, extract_domain, normalize_url};
