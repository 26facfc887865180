//! State module for tracking task progress
//!
//! # Components
//!
//! - `TaskStatus`: lifecycle of an orchestrated task
//! - `TaskRecord`: counters, results, errors and metadata of one task
//! - `DomainHealth`: per-domain failure history
//! - `ErrorStats`: orchestrator-wide failure counters
//! - `CircuitBreaker`: shared domain map built on `DomainHealth`

mod circuit_breaker;
mod domain_health;
mod error_stats;
mod task_record;
mod task_status;

// Re-export main types
pub use circuit_breaker::{BreakerStatus, CircuitBreaker};
pub use domain_health::DomainHealth;
pub use error_stats::{ErrorStatistics, ErrorStats};
pub use task_record::{ScrapedItem, TaskId, TaskRecord};
pub use task_status::TaskStatus;
