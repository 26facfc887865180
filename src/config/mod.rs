//! Configuration module for Scout
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use scout_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("scout.toml")).unwrap();
//! println!("Running at most {} tasks", config.orchestrator.max_concurrent_tasks);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{CircuitBreakerConfig, Config, FetcherConfig, OrchestratorConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

/// Hard upper bound on per-task article concurrency accepted from a request
pub const MAX_ARTICLE_CONCURRENCY: u32 = 25;
