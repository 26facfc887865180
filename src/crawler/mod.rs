//! Crawler module: collaborators, workers and the task orchestrator
//!
//! This module contains the core scraping logic, including:
//! - The page fetching contract and its HTTP implementation
//! - HTML parsing and link extraction
//! - The content classification contract and a keyword fallback
//! - Single-article fetching with retries
//! - Task orchestration

mod classifier;
mod fetcher;
mod job;
mod orchestrator;
mod parser;
mod worker;

pub use classifier::{
    extract_relevant_excerpt, BehaviorReport, ClassifierError, ContentClassifier, Detection,
    KeywordClassifier,
};
pub use fetcher::{
    build_http_client, DiscoveredPage, FetchError, FetchedPage, HttpPageFetcher, PageFetcher,
};
pub use job::{ScrapeJob, MAX_DEPTH, MAX_RETRY_ATTEMPTS, MAX_TIMEOUT_MINUTES};
pub use orchestrator::TaskOrchestrator;
pub use parser::{parse_html, ParsedPage};
pub use worker::{ArticleWorkOutcome, ArticleWorker};
