//! Output module for task views and reports
//!
//! This module handles:
//! - Building serializable snapshots of task status and results
//! - Assembling the orchestrator health report
//! - Printing summaries to the console

pub mod stats;
mod views;

pub use stats::{print_health, print_task_summary};
pub(crate) use views::round3;
pub use views::{HealthReport, HealthStatus, ResultSummary, TaskResultsView, TaskStatusView};
