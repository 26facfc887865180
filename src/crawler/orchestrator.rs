//! Task orchestration
//!
//! The [`TaskOrchestrator`] owns the task registry and runs every submitted
//! job in the background:
//!
//! 1. Wait for a global task slot (submission itself never blocks)
//! 2. Discover links on the submitted page under a hard ceiling
//! 3. Fetch the discovered articles in bounded batches, watching the job's
//!    soft deadline
//! 4. Decide the verdict from results, errors and elapsed time
//! 5. Optionally classify the scraped content
//! 6. Seal the record
//!
//! Callers poll the registry through the query methods while a job runs.

use crate::config::{CircuitBreakerConfig, Config, OrchestratorConfig};
use crate::crawler::classifier::{extract_relevant_excerpt, BehaviorReport, ContentClassifier};
use crate::crawler::{ArticleWorkOutcome, ArticleWorker, PageFetcher, ScrapeJob};
use crate::output::{round3, HealthReport, HealthStatus, TaskResultsView, TaskStatusView};
use crate::state::{CircuitBreaker, ErrorStats, ScrapedItem, TaskId, TaskRecord, TaskStatus};
use crate::ScoutError;
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

/// Content containing one of these is an error page, not an article
const ERROR_MARKERS: &[&str] = &["Too Many Requests", "Error:"];

/// Registry entry of one task
struct TaskSlot {
    record: Mutex<TaskRecord>,
    cancel: CancellationToken,
    /// Flips to `true` when the execution routine exits
    done: watch::Receiver<bool>,
}

impl TaskSlot {
    fn record(&self) -> MutexGuard<'_, TaskRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Inner {
    config: OrchestratorConfig,
    fetcher: Arc<dyn PageFetcher>,
    classifier: Arc<dyn ContentClassifier>,
    worker: ArticleWorker,
    breaker: Arc<CircuitBreaker>,
    stats: Arc<ErrorStats>,
    task_permits: Semaphore,
    tasks: RwLock<HashMap<TaskId, Arc<TaskSlot>>>,
    /// Tasks whose execution routine has not exited yet
    active: Mutex<HashSet<TaskId>>,
}

impl Inner {
    fn slot(&self, id: TaskId) -> Option<Arc<TaskSlot>> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    fn active(&self) -> MutexGuard<'_, HashSet<TaskId>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seals `slot` as cancelled; counts it once
    fn mark_cancelled(&self, slot: &TaskSlot) -> bool {
        let cancelled = slot.record().cancel();
        if cancelled {
            self.stats.record_cancelled_task();
        }
        cancelled
    }
}

/// Runs scrape jobs in the background and answers queries about them
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct TaskOrchestrator {
    inner: Arc<Inner>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl TaskOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        breaker_config: CircuitBreakerConfig,
        fetcher: Arc<dyn PageFetcher>,
        classifier: Arc<dyn ContentClassifier>,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(breaker_config));
        let stats = Arc::new(ErrorStats::new());
        let worker = ArticleWorker::new(
            fetcher.clone(),
            breaker.clone(),
            stats.clone(),
            config.preview_chars,
        );

        let inner = Inner {
            task_permits: Semaphore::new(config.max_concurrent_tasks as usize),
            config,
            fetcher,
            classifier,
            worker,
            breaker,
            stats,
            tasks: RwLock::new(HashMap::new()),
            active: Mutex::new(HashSet::new()),
        };

        Self {
            inner: Arc::new(inner),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn from_config(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        classifier: Arc<dyn ContentClassifier>,
    ) -> Self {
        Self::new(
            config.orchestrator.clone(),
            config.circuit_breaker.clone(),
            fetcher,
            classifier,
        )
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.inner.breaker
    }

    pub fn stats(&self) -> &ErrorStats {
        &self.inner.stats
    }

    /// Registers a job and starts it in the background
    ///
    /// Returns as soon as the task is registered; the task waits for a free
    /// slot if `max-concurrent-tasks` jobs are already executing. Must be
    /// called from within a Tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `job` - The scrape request; validated before anything is registered
    ///
    /// # Returns
    ///
    /// * `Ok(TaskId)` - The id to poll the task with
    /// * `Err(ScoutError::InvalidRequest)` / `Err(ScoutError::UrlError)` - The request was rejected
    /// * `Err(ScoutError::ShuttingDown)` - The orchestrator no longer accepts work
    pub fn submit(&self, job: ScrapeJob) -> Result<TaskId, ScoutError> {
        if self.shutdown.is_cancelled() || self.tracker.is_closed() {
            return Err(ScoutError::ShuttingDown);
        }

        let job = job.validate()?;
        let id = Uuid::new_v4();
        let (done_tx, done_rx) = watch::channel(false);
        let slot = Arc::new(TaskSlot {
            record: Mutex::new(TaskRecord::new(id, job.metadata())),
            cancel: self.shutdown.child_token(),
            done: done_rx,
        });

        self.inner
            .tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, slot.clone());
        self.inner.active().insert(id);

        tracing::info!(
            "Task {} submitted for {} (depth {}, {} concurrent articles, {} min)",
            id,
            job.url,
            job.max_depth,
            job.max_concurrent_articles,
            job.timeout_minutes
        );

        self.tracker.spawn(execute(self.inner.clone(), slot, job, done_tx));

        Ok(id)
    }

    /// Latest progress of a task
    pub fn get_status(&self, id: TaskId) -> Option<TaskStatusView> {
        let slot = self.inner.slot(id)?;
        let record = slot.record();
        Some(TaskStatusView::from_record(&record, Utc::now()))
    }

    /// Scraped items of a task, optionally with its error lines
    pub fn get_results(&self, id: TaskId, include_errors: bool) -> Option<TaskResultsView> {
        let slot = self.inner.slot(id)?;
        let record = slot.record();
        Some(TaskResultsView::from_record(
            &record,
            include_errors,
            Utc::now(),
        ))
    }

    /// Cancels a task
    ///
    /// In-flight article fetches observe the signal at their next check and
    /// their results are discarded.
    ///
    /// # Arguments
    ///
    /// * `id` - The task to cancel
    ///
    /// # Returns
    ///
    /// * `true` - The task was sealed as cancelled by this call
    /// * `false` - The task is unknown or already has a final verdict
    pub fn cancel(&self, id: TaskId) -> bool {
        let Some(slot) = self.inner.slot(id) else {
            return false;
        };

        let cancelled = self.inner.mark_cancelled(&slot);
        slot.cancel.cancel();

        if cancelled {
            tracing::info!("Task {} cancelled", id);
        }
        cancelled
    }

    /// Tasks newest first, optionally filtered by status
    ///
    /// # Arguments
    ///
    /// * `status` - Only return tasks currently in this status
    /// * `limit` - Maximum number of views returned
    pub fn list_tasks(&self, status: Option<TaskStatus>, limit: usize) -> Vec<TaskStatusView> {
        let now = Utc::now();
        let mut views: Vec<TaskStatusView> = {
            let tasks = self.inner.tasks.read().unwrap_or_else(PoisonError::into_inner);
            let views = tasks
                .values()
                .filter_map(|slot| {
                    let record = slot.record();
                    match status {
                        Some(wanted) if record.status() != wanted => None,
                        _ => Some(TaskStatusView::from_record(&record, now)),
                    }
                })
                .collect();
            views
        };

        views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        views.truncate(limit);
        views
    }

    pub fn health_check(&self) -> HealthReport {
        let mut distribution: BTreeMap<String, usize> = BTreeMap::new();
        let total_tasks = {
            let tasks = self.inner.tasks.read().unwrap_or_else(PoisonError::into_inner);
            for slot in tasks.values() {
                let status = slot.record().status();
                *distribution.entry(status.as_str().to_string()).or_insert(0) += 1;
            }
            tasks.len()
        };

        let active_tasks = self.inner.active().len();
        let max_concurrent_tasks = self.inner.config.max_concurrent_tasks as usize;
        let error_statistics = self.inner.stats.snapshot();
        let error_rate = round3(error_statistics.error_rate(total_tasks));
        let circuit_breaker = self.inner.breaker.status();

        HealthReport {
            status: HealthStatus::evaluate(
                error_rate,
                circuit_breaker.total_blocked_domains,
                active_tasks,
                max_concurrent_tasks,
            ),
            active_tasks,
            total_tasks,
            max_concurrent_tasks,
            max_concurrent_articles: self.inner.config.max_concurrent_articles as usize,
            available_task_slots: max_concurrent_tasks.saturating_sub(active_tasks),
            task_status_distribution: distribution,
            error_statistics,
            error_rate,
            circuit_breaker,
            timestamp: Utc::now(),
        }
    }

    /// Drops finished tasks whose verdict is older than `max_age`
    ///
    /// Returns the number of tasks removed.
    pub fn cleanup_completed_tasks(&self, max_age: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut tasks = self.inner.tasks.write().unwrap_or_else(PoisonError::into_inner);
        let before = tasks.len();

        tasks.retain(|id, slot| {
            let record = slot.record();
            let expired = record.is_sealed()
                && record.status().is_terminal()
                && record.completed_at().is_some_and(|at| at < cutoff);
            if expired {
                tracing::debug!("Cleaned up old task {}", id);
            }
            !expired
        });

        let removed = before - tasks.len();
        if removed > 0 {
            tracing::info!("Cleaned up {} completed tasks", removed);
        }
        removed
    }

    /// Waits for a task's execution routine to exit and returns its final status
    pub async fn wait(&self, id: TaskId) -> Option<TaskStatusView> {
        let mut done = self.inner.slot(id)?.done.clone();
        // An error means the sender is gone, i.e. the routine has exited
        let _ = done.wait_for(|finished| *finished).await;
        self.get_status(id)
    }

    /// Cancels every running task and waits for all of them to exit
    ///
    /// Further submissions are rejected.
    pub async fn shutdown(&self) {
        tracing::info!(
            "Shutting down orchestrator ({} active tasks)",
            self.inner.active().len()
        );
        self.tracker.close();
        self.shutdown.cancel();
        self.tracker.wait().await;
    }
}

/// Execution routine of one task
///
/// Whatever happens inside, the record ends up sealed and the task leaves the
/// active set.
async fn execute(
    inner: Arc<Inner>,
    slot: Arc<TaskSlot>,
    job: ScrapeJob,
    done: watch::Sender<bool>,
) {
    let id = slot.record().id();

    let outcome = AssertUnwindSafe(run_task(&inner, &slot, &job))
        .catch_unwind()
        .await;

    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(error)) => Some(error),
        Err(panic) => Some(ScoutError::Execution(panic_message(panic.as_ref()))),
    };

    if let Some(error) = failure {
        tracing::error!("Task {} failed with error: {}", id, error);
        slot.record().fail(error.to_string());
    }

    // The routine may have returned early on cancellation before sealing
    if slot.cancel.is_cancelled() {
        inner.mark_cancelled(&slot);
    }

    inner.active().remove(&id);
    let _ = done.send(true);
}

async fn run_task(inner: &Inner, slot: &TaskSlot, job: &ScrapeJob) -> Result<(), ScoutError> {
    let id = slot.record().id();
    let cancel = &slot.cancel;

    // Wait for a global task slot
    let _task_permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(()),
        permit = inner.task_permits.acquire() => permit.map_err(|_| ScoutError::ShuttingDown)?,
    };

    if !slot.record().mark_running() {
        return Ok(());
    }

    let start = Instant::now();
    let budget = job.timeout_budget();
    tracing::info!("Task {}: phase 1, discovering links on {}", id, job.url);

    // Phase 1: discovery
    let discovery_timeout = inner.config.discovery_timeout();
    let discovered = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(()),
        result = tokio::time::timeout(discovery_timeout, inner.fetcher.discover(&job.url)) => result,
    };
    let discovered = match discovered {
        Ok(Ok(discovered)) => discovered,
        Ok(Err(error)) => return Err(ScoutError::Discovery(error)),
        Err(_) => {
            return Err(ScoutError::DiscoveryTimeout {
                seconds: discovery_timeout.as_secs(),
            })
        }
    };

    // Record the main page as the first item
    let links = discovered.links;
    {
        let mut record = slot.record();
        record.insert_metadata("links_discovered", links.len().into());
        record.set_total_items(1 + links.len());
        record.add_result(ScrapedItem::new(
            &job.url,
            discovered.page.text,
            0,
            inner.config.preview_chars,
        ));
        record.update_progress(1, 0);
    }

    // Phase 2: articles
    if job.max_depth > 1 && !links.is_empty() {
        tracing::info!(
            "Task {}: phase 2, scraping {} articles concurrently",
            id,
            links.len()
        );
        fetch_articles(inner, slot, job, &links, start).await;
    }

    if cancel.is_cancelled() {
        return Ok(());
    }

    // Verdict, decided before classification can add errors
    let elapsed = start.elapsed();
    let verdict = {
        let mut record = slot.record();
        if record.results().is_empty() {
            TaskStatus::Failed
        } else if elapsed >= budget {
            record.add_error(format!(
                "Task timed out after {} minutes, returning partial results",
                job.timeout_minutes
            ));
            TaskStatus::Partial
        } else if !record.errors().is_empty() {
            TaskStatus::Partial
        } else {
            TaskStatus::Completed
        }
    };

    // Phase 3: classification
    if let Some(question) = job.question.as_deref() {
        let items = slot.record().results().to_vec();
        if !items.is_empty() {
            tracing::info!(
                "Task {}: phase 3, analyzing {} items for {} categories",
                id,
                items.len(),
                job.categories.len()
            );
            let reports = classify_items(inner, slot, &items, &job.categories, question).await;
            if cancel.is_cancelled() {
                return Ok(());
            }

            let count = reports.len();
            let mut record = slot.record();
            record.insert_metadata("ai_reports", serde_json::to_value(&reports)?);
            record.insert_metadata("ai_reports_count", count.into());
            tracing::info!("Task {}: generated {} behavior reports", id, count);
        }
    }

    // Seal the record
    let mut record = slot.record();
    if record.finalize(verdict) {
        tracing::info!(
            "Task {} finished as {}: {} results, {} errors, duration: {:.1}s",
            id,
            verdict,
            record.results().len(),
            record.errors().len(),
            elapsed.as_secs_f64()
        );
    }
    Ok(())
}

/// Fetches `links` in batches until they run out or the deadline approaches
async fn fetch_articles(
    inner: &Inner,
    slot: &TaskSlot,
    job: &ScrapeJob,
    links: &[String],
    start: Instant,
) {
    let id = slot.record().id();
    let cancel = &slot.cancel;
    let config = &inner.config;
    let budget = job.timeout_budget();
    let batch_size = job.max_concurrent_articles.min(config.max_batch_size).max(1) as usize;
    let article_permits = Arc::new(Semaphore::new(job.max_concurrent_articles as usize));

    // The main page counts as the first completed item
    let mut completed = 1;
    let mut failed = 0;

    for (index, batch) in links.chunks(batch_size).enumerate() {
        if cancel.is_cancelled() {
            return;
        }

        // Check the deadline before dispatching

        let elapsed = start.elapsed();
        if elapsed >= budget {
            tracing::warn!(
                "Task {}: timeout reached, stopping with partial results",
                id
            );
            return;
        }

        let remaining = budget - elapsed;
        if remaining < config.min_item_budget() {
            let skipped = links.len() - index * batch_size;
            tracing::warn!(
                "Task {}: timeout approaching, skipping {} remaining articles",
                id,
                skipped
            );
            slot.record().add_error(format!(
                "Time budget nearly exhausted, skipped {} remaining articles",
                skipped
            ));
            return;
        }

        let per_article = config
            .article_timeout_ceiling()
            .min(remaining / batch.len() as u32);

        // Spawn one worker per article in the batch
        let mut set = JoinSet::new();
        for link in batch {
            let worker = inner.worker.clone();
            let permits = article_permits.clone();
            let cancel = cancel.clone();
            let link = link.clone();
            let retries = job.retry_attempts;
            set.spawn(async move {
                let outcome = worker
                    .fetch_with_retry(id, &link, 1, retries, per_article, &permits, &cancel)
                    .await;
                (link, outcome)
            });
        }

        // Wait for the batch
        let wait = remaining.max(config.min_batch_wait());
        let deadline = Instant::now().checked_add(wait);
        let mut pending = batch.len();

        loop {
            let joined = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, set.join_next()).await,
                None => Ok(set.join_next().await),
            };
            match joined {
                Ok(Some(joined)) => {
                    pending -= 1;
                    let mut record = slot.record();
                    match joined {
                        Ok((_, ArticleWorkOutcome::Success(item))) => {
                            completed += 1;
                            record.add_result(item);
                        }
                        Ok((_, ArticleWorkOutcome::Cancelled)) => {}
                        Ok((link, outcome)) => {
                            failed += 1;
                            if let Some(message) = outcome.error_message(&link) {
                                record.add_error(message);
                            }
                        }
                        Err(join_error) => {
                            failed += 1;
                            inner.stats.record_general_error();
                            record.add_error(format!("Article scraping failed: {}", join_error));
                        }
                    }
                    record.update_progress(completed, failed);
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        "Task {}: batch {} timed out, cancelling {} remaining articles",
                        id,
                        index + 1,
                        pending
                    );
                    set.abort_all();
                    failed += pending;
                    let mut record = slot.record();
                    record.add_error(format!(
                        "Batch {} did not finish within {}s, abandoned {} articles",
                        index + 1,
                        wait.as_secs(),
                        pending
                    ));
                    record.update_progress(completed, failed);
                    return;
                }
            }
        }
    }
}

/// Runs the classifier over every (item, category) pair
///
/// Classifier failures are logged and recorded on the task; they never
/// abort the phase.
async fn classify_items(
    inner: &Inner,
    slot: &TaskSlot,
    items: &[ScrapedItem],
    categories: &[String],
    question: &str,
) -> Vec<BehaviorReport> {
    let min_chars = inner.config.min_classify_chars;
    let mut reports = Vec::new();

    for item in items {
        let content = &item.full_text;
        if content.chars().count() < min_chars
            || ERROR_MARKERS.iter().any(|marker| content.contains(marker))
        {
            tracing::debug!("Skipping {} for classification: too short or error page", item.url);
            continue;
        }

        for category in categories {
            let result = tokio::select! {
                biased;
                _ = slot.cancel.cancelled() => return reports,
                result = inner.classifier.classify(content, category, question) => result,
            };

            match result {
                Ok(detection) if detection.detected => {
                    reports.push(BehaviorReport {
                        url: item.url.clone(),
                        excerpt: extract_relevant_excerpt(content, category),
                        full_text: content.clone(),
                        categories: vec![category.clone()],
                        source: item.source.clone(),
                        confidence: detection.confidence.clamp(1, 100),
                        keywords: detection.keywords,
                        reasoning: detection.reasoning,
                        stance: "concerning".to_string(),
                        tone: "analytical".to_string(),
                        date: item.scraped_at.to_rfc3339(),
                    });
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(
                        "Classification of {} for '{}' failed: {}",
                        item.url,
                        category,
                        error
                    );
                    slot.record().add_error(format!(
                        "AI behavior analysis failed for {} ({}): {}",
                        item.url, category, error
                    ));
                }
            }
        }
    }

    reports
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
