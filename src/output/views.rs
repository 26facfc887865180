//! Serializable read models handed to callers
//!
//! Every view is a copy taken while the task record is locked, so callers
//! never observe a half-applied update.

use crate::state::{BreakerStatus, ErrorStatistics, ScrapedItem, TaskId, TaskRecord, TaskStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Progress snapshot of one task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatusView {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub progress: f64,
    pub total_items: usize,
    pub completed_items: usize,
    pub failed_items: usize,
    pub results_count: usize,
    pub errors_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub metadata: Map<String, Value>,
    /// The final verdict has been written and the record no longer changes
    pub finished: bool,
}

impl TaskStatusView {
    pub fn from_record(record: &TaskRecord, now: DateTime<Utc>) -> Self {
        Self {
            task_id: record.id(),
            status: record.status(),
            progress: record.progress(),
            total_items: record.total_items(),
            completed_items: record.completed_items(),
            failed_items: record.failed_items(),
            results_count: record.results().len(),
            errors_count: record.errors().len(),
            created_at: record.created_at(),
            updated_at: record.updated_at(),
            completed_at: record.completed_at(),
            duration_seconds: record.duration_seconds(now),
            metadata: record.metadata().clone(),
            finished: record.is_sealed(),
        }
    }
}

/// Counters attached to a results view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSummary {
    pub total_items: usize,
    pub completed_items: usize,
    pub failed_items: usize,
    pub success_rate: f64,
    pub duration_seconds: f64,
}

/// Scraped items of one task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskResultsView {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub results: Vec<ScrapedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    pub metadata: Map<String, Value>,
    pub summary: ResultSummary,
}

impl TaskResultsView {
    pub fn from_record(record: &TaskRecord, include_errors: bool, now: DateTime<Utc>) -> Self {
        Self {
            task_id: record.id(),
            status: record.status(),
            results: record.results().to_vec(),
            errors: include_errors.then(|| record.errors().to_vec()),
            metadata: record.metadata().clone(),
            summary: ResultSummary {
                total_items: record.total_items(),
                completed_items: record.completed_items(),
                failed_items: record.failed_items(),
                success_rate: record.success_rate(),
                duration_seconds: record.duration_seconds(now),
            },
        }
    }
}

/// Overall verdict of a health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    /// Error rate above 0.5 or more than five blocked domains
    Degraded,
    /// Every task slot is taken; new submissions queue
    AtCapacity,
}

impl HealthStatus {
    /// Degradation wins over capacity
    pub fn evaluate(
        error_rate: f64,
        blocked_domains: usize,
        active_tasks: usize,
        max_concurrent_tasks: usize,
    ) -> Self {
        if error_rate > 0.5 || blocked_domains > 5 {
            Self::Degraded
        } else if active_tasks >= max_concurrent_tasks {
            Self::AtCapacity
        } else {
            Self::Healthy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::AtCapacity => "at_capacity",
        }
    }
}

/// Orchestrator diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub active_tasks: usize,
    pub total_tasks: usize,
    pub max_concurrent_tasks: usize,
    pub max_concurrent_articles: usize,
    pub available_task_slots: usize,
    pub task_status_distribution: BTreeMap<String, usize>,
    pub error_statistics: ErrorStatistics,
    /// Errors per task, rounded to three decimals
    pub error_rate: f64,
    pub circuit_breaker: BreakerStatus,
    pub timestamp: DateTime<Utc>,
}

/// Rounds to three decimal places
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
