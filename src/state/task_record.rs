//! The mutable aggregate describing one orchestrated task
//!
//! All writes go through the methods on [`TaskRecord`]; fields are private so
//! counters, progress and status can never drift apart. A record is *sealed*
//! once its execution routine has decided the final verdict (or the task was
//! cancelled); sealed records ignore every further write.

use crate::state::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Opaque task identifier handed back by `submit`
pub type TaskId = Uuid;

/// One successfully scraped page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedItem {
    pub url: String,
    /// Leading slice of the text, for listings
    pub text: String,
    pub full_text: String,
    /// `main_page` or `article-depth-<n>`
    pub source: String,
    pub depth: u32,
    pub word_count: usize,
    pub char_count: usize,
    /// 1-based attempt that succeeded
    pub retry_attempt: u32,
    /// True when earlier attempts failed before this one succeeded
    pub error_recovery: bool,
    /// Per-attempt timeout in force for the successful attempt
    pub timeout_seconds: Option<u64>,
    pub scraped_at: DateTime<Utc>,
}

impl ScrapedItem {
    /// Builds an item from extracted page text
    ///
    /// `text` keeps the first `preview_chars` characters (not bytes) of the
    /// full text.
    pub fn new(url: &str, full_text: String, depth: u32, preview_chars: usize) -> Self {
        let source = if depth == 0 {
            "main_page".to_string()
        } else {
            format!("article-depth-{}", depth)
        };

        Self {
            url: url.to_string(),
            text: full_text.chars().take(preview_chars).collect(),
            word_count: full_text.split_whitespace().count(),
            char_count: full_text.chars().count(),
            full_text,
            source,
            depth,
            retry_attempt: 1,
            error_recovery: false,
            timeout_seconds: None,
            scraped_at: Utc::now(),
        }
    }

    /// Annotates the item with the attempt that produced it
    pub fn with_attempt(mut self, attempt: u32, timeout_seconds: u64) -> Self {
        self.retry_attempt = attempt;
        self.error_recovery = attempt > 1;
        self.timeout_seconds = Some(timeout_seconds);
        self
    }
}

/// Progress and result aggregate of one task
#[derive(Debug, Clone)]
pub struct TaskRecord {
    id: TaskId,
    status: TaskStatus,
    total_items: usize,
    completed_items: usize,
    failed_items: usize,
    results: Vec<ScrapedItem>,
    errors: Vec<String>,
    metadata: Map<String, Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    sealed: bool,
}

impl TaskRecord {
    /// Creates a pending record
    pub fn new(id: TaskId, metadata: Map<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: TaskStatus::Pending,
            total_items: 0,
            completed_items: 0,
            failed_items: 0,
            results: Vec::new(),
            errors: Vec::new(),
            metadata,
            created_at: now,
            updated_at: now,
            completed_at: None,
            sealed: false,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn completed_items(&self) -> usize {
        self.completed_items
    }

    pub fn failed_items(&self) -> usize {
        self.failed_items
    }

    pub fn results(&self) -> &[ScrapedItem] {
        &self.results
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Whether the final verdict has been written
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Percentage of items accounted for, derived from the counters
    pub fn progress(&self) -> f64 {
        (self.completed_items + self.failed_items) as f64 / self.total_items.max(1) as f64 * 100.0
    }

    /// Successful items as a percentage of the total
    pub fn success_rate(&self) -> f64 {
        self.completed_items as f64 / self.total_items.max(1) as f64 * 100.0
    }

    /// Seconds from creation until completion (or until `now` while running)
    pub fn duration_seconds(&self, now: DateTime<Utc>) -> f64 {
        let end = self.completed_at.unwrap_or(now);
        (end - self.created_at).num_milliseconds() as f64 / 1000.0
    }

    /// Moves a pending task to running
    ///
    /// Returns `false` if the task is no longer pending (e.g. it was cancelled
    /// while queued).
    pub fn mark_running(&mut self) -> bool {
        if self.sealed || !self.status.can_transition_to(TaskStatus::Running) {
            return false;
        }
        self.status = TaskStatus::Running;
        self.touch();
        true
    }

    /// Sets the number of items once discovery has finished
    pub fn set_total_items(&mut self, total: usize) {
        if self.sealed {
            return;
        }
        self.total_items = total;
        self.touch();
    }

    /// Records the latest counters and derives status when every item is accounted for
    ///
    /// Counters never move backwards and never exceed the total. Once
    /// `completed + failed` reaches the total, `completed_at` is stamped and
    /// the status follows the counters: no failures means `Completed`, a mix
    /// means `Partial`, no successes means `Failed`. The execution routine
    /// may still refine that status when it seals the record.
    ///
    /// # Arguments
    ///
    /// * `completed` - Items scraped so far, main page included
    /// * `failed` - Items given up on so far
    ///
    /// Ignored once the record is sealed.
    pub fn update_progress(&mut self, completed: usize, failed: usize) {
        if self.sealed {
            return;
        }

        let completed = completed.max(self.completed_items);
        let failed = failed.max(self.failed_items);
        let (completed, failed) = if self.total_items > 0 {
            let completed = completed.min(self.total_items);
            (completed, failed.min(self.total_items - completed))
        } else {
            (completed, failed)
        };

        self.completed_items = completed;
        self.failed_items = failed;
        self.touch();

        if self.total_items > 0 && completed + failed >= self.total_items {
            self.completed_at = Some(self.updated_at);
            self.status = if failed == 0 {
                TaskStatus::Completed
            } else if completed > 0 {
                TaskStatus::Partial
            } else {
                TaskStatus::Failed
            };
        }
    }

    /// Appends a scraped item
    pub fn add_result(&mut self, item: ScrapedItem) {
        if self.sealed {
            return;
        }
        self.results.push(item);
        self.touch();
    }

    /// Appends an error message
    pub fn add_error(&mut self, message: impl Into<String>) {
        if self.sealed {
            return;
        }
        self.errors.push(message.into());
        self.touch();
    }

    /// Stores a metadata entry, replacing any previous value
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: Value) {
        if self.sealed {
            return;
        }
        self.metadata.insert(key.into(), value);
        self.touch();
    }

    /// Writes the final verdict and seals the record
    ///
    /// Returns `false` (and changes nothing) if the record was already sealed.
    pub fn finalize(&mut self, status: TaskStatus) -> bool {
        if self.sealed || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.touch();
        self.completed_at = Some(self.updated_at);
        self.sealed = true;
        true
    }

    /// Records `message` and seals the record as `Failed`
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.sealed {
            return false;
        }
        self.add_error(message);
        self.finalize(TaskStatus::Failed)
    }

    /// Marks the task cancelled and seals it
    ///
    /// Returns `false` if the task already has a final verdict.
    pub fn cancel(&mut self) -> bool {
        self.finalize(TaskStatus::Cancelled)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
