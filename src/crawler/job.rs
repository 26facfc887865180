//! Scrape job requests

use crate::config::MAX_ARTICLE_CONCURRENCY;
use crate::url::parse_target_url;
use crate::ScoutError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Deepest crawl a job may ask for
pub const MAX_DEPTH: u32 = 5;

/// Longest soft deadline a job may ask for
pub const MAX_TIMEOUT_MINUTES: u64 = 120;

/// Most retries a job may ask for per article
pub const MAX_RETRY_ATTEMPTS: u32 = 5;

/// A caller's request to scrape one page and the articles it links to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub url: String,
    /// 1 scrapes only the submitted page; 2 and above also fetch its articles
    pub max_depth: u32,
    /// In-flight article fetches allowed for this job
    pub max_concurrent_articles: u32,
    /// Soft deadline for the whole job
    pub timeout_minutes: u64,
    /// Retries after the first attempt of each article
    pub retry_attempts: u32,
    pub question: Option<String>,
    pub categories: Vec<String>,
}

impl ScrapeJob {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_depth: 2,
            max_concurrent_articles: 10,
            timeout_minutes: 30,
            retry_attempts: 3,
            question: None,
            categories: Vec::new(),
        }
    }

    /// Checks the request and returns a cleaned-up copy
    ///
    /// The question is trimmed (blank becomes `None`) and categories are
    /// trimmed and de-duplicated, keeping their first occurrence.
    pub fn validate(&self) -> Result<ScrapeJob, ScoutError> {
        let url = parse_target_url(self.url.trim())?;

        if !(1..=MAX_DEPTH).contains(&self.max_depth) {
            return Err(ScoutError::InvalidRequest(format!(
                "max_depth must be between 1 and {}, got {}",
                MAX_DEPTH, self.max_depth
            )));
        }

        if !(1..=MAX_ARTICLE_CONCURRENCY).contains(&self.max_concurrent_articles) {
            return Err(ScoutError::InvalidRequest(format!(
                "max_concurrent_articles must be between 1 and {}, got {}",
                MAX_ARTICLE_CONCURRENCY, self.max_concurrent_articles
            )));
        }

        if !(1..=MAX_TIMEOUT_MINUTES).contains(&self.timeout_minutes) {
            return Err(ScoutError::InvalidRequest(format!(
                "timeout_minutes must be between 1 and {}, got {}",
                MAX_TIMEOUT_MINUTES, self.timeout_minutes
            )));
        }

        if self.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ScoutError::InvalidRequest(format!(
                "retry_attempts must be at most {}, got {}",
                MAX_RETRY_ATTEMPTS, self.retry_attempts
            )));
        }

        let mut categories: Vec<String> = Vec::with_capacity(self.categories.len());
        for category in self.categories.iter().map(|c| c.trim()) {
            if !category.is_empty() && !categories.iter().any(|c| c == category) {
                categories.push(category.to_string());
            }
        }

        let question = self
            .question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);

        Ok(ScrapeJob {
            url: url.to_string(),
            question,
            categories,
            ..self.clone()
        })
    }

    pub fn timeout_budget(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes.saturating_mul(60))
    }

    /// Initial metadata of the task created for this job
    pub fn metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("task_type".to_string(), json!("multi_depth_scrape"));
        metadata.insert("url".to_string(), json!(self.url));
        metadata.insert("max_depth".to_string(), json!(self.max_depth));
        metadata.insert("timeout_minutes".to_string(), json!(self.timeout_minutes));
        metadata.insert(
            "max_concurrent_articles".to_string(),
            json!(self.max_concurrent_articles),
        );
        metadata.insert("retry_attempts".to_string(), json!(self.retry_attempts));
        metadata.insert("question".to_string(), json!(self.question));
        metadata.insert("categories".to_string(), json!(self.categories));
        metadata
    }
}
