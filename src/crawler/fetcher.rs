//! Page fetching collaborator
//!
//! The orchestrator only depends on the [`PageFetcher`] trait. This module
//! also ships [`HttpPageFetcher`], a plain HTTP implementation that:
//! - Builds a client with a proper user agent string
//! - GETs the page and checks the status code
//! - Parses visible text and links from the HTML
//! - Classifies failures into timeout / connection / status / other

use crate::config::{FetcherConfig, UserAgentConfig};
use crate::crawler::parser::parse_html;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;

/// Failure of a single fetch round-trip
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection error for {url}: {message}")]
    Connection { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Fetch failed for {url}: {message}")]
    Other { url: String, message: String },
}

impl FetchError {
    /// Transient unavailability: retried after a longer pause with the same timeout
    pub fn is_connection_class(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// The attempt itself was too slow: retried with a shorter timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Content of one fetched page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,
    pub title: Option<String>,
    /// Visible text of the page
    pub text: String,
    pub html: String,
}

/// A fetched page plus the article links found on it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredPage {
    pub page: FetchedPage,
    pub links: Vec<String>,
}

/// Single network round-trip abstraction used by the orchestrator
///
/// Implementations must not impose retries of their own; timeouts are
/// applied from the outside.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches the submitted page and returns its text and outgoing links
    async fn discover(&self, url: &str) -> Result<DiscoveredPage, FetchError>;

    /// Fetches one article
    async fn fetch_one(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use scout_crawler::config::{FetcherConfig, UserAgentConfig};
/// use scout_crawler::crawler::build_http_client;
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "ScoutBot".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&user_agent, &FetcherConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    config: &FetcherConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`PageFetcher`] backed by `reqwest` and the HTML parser
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    max_links: usize,
}

impl HttpPageFetcher {
    pub fn new(user_agent: &UserAgentConfig, config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(user_agent, config)?, config.max_links))
    }

    pub fn with_client(client: Client, max_links: usize) -> Self {
        Self { client, max_links }
    }

    /// GETs `url` and returns the page with every link found on it
    async fn get(&self, url: &str) -> Result<(FetchedPage, Vec<String>), FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let parsed = parse_html(&html, &final_url);
        let page = FetchedPage {
            url: final_url.to_string(),
            title: parsed.title,
            text: parsed.text,
            html,
        };
        Ok((page, parsed.links))
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn discover(&self, url: &str) -> Result<DiscoveredPage, FetchError> {
        let (page, mut links) = self.get(url).await?;
        links.truncate(self.max_links);
        tracing::debug!("Discovered {} links on {}", links.len(), url);

        Ok(DiscoveredPage { page, links })
    }

    async fn fetch_one(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.get(url).await.map(|(page, _)| page)
    }
}

/// Maps a transport error onto the fetch error taxonomy
fn classify_reqwest_error(url: &str, error: reqwest::Error) -> FetchError {
    let url = url.to_string();
    if error.is_timeout() {
        FetchError::Timeout { url }
    } else if error.is_connect() {
        FetchError::Connection {
            url,
            message: error.to_string(),
        }
    } else {
        FetchError::Other {
            url,
            message: error.to_string(),
        }
    }
}
