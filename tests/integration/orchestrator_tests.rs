//! End-to-end scenarios for the task orchestrator
//!
//! Every test runs on paused virtual time, so multi-minute deadlines
//! complete instantly and elapsed times are exact.

use crate::fakes::{keyword_classifier, Article, Discover, FailingClassifier, ScriptedFetcher};
use scout_crawler::config::{CircuitBreakerConfig, OrchestratorConfig};
use scout_crawler::crawler::{ContentClassifier, FetchError, ScrapeJob};
use scout_crawler::output::HealthStatus;
use scout_crawler::{ScoutError, TaskOrchestrator, TaskStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const FRONT: &str = "https://news.example.com/front";

fn article(n: usize) -> String {
    format!("https://news.example.com/story-{}", n)
}

fn links(count: usize) -> Vec<String> {
    (1..=count).map(article).collect()
}

fn connection_error(url: &str) -> FetchError {
    FetchError::Connection {
        url: url.to_string(),
        message: "connection refused".to_string(),
    }
}

fn orchestrator_with(
    config: OrchestratorConfig,
    fetcher: Arc<ScriptedFetcher>,
    classifier: Arc<dyn ContentClassifier>,
) -> TaskOrchestrator {
    TaskOrchestrator::new(config, CircuitBreakerConfig::default(), fetcher, classifier)
}

fn orchestrator(fetcher: Arc<ScriptedFetcher>) -> TaskOrchestrator {
    orchestrator_with(OrchestratorConfig::default(), fetcher, keyword_classifier())
}

fn job(url: &str) -> ScrapeJob {
    ScrapeJob {
        retry_attempts: 2,
        ..ScrapeJob::new(url)
    }
}

#[tokio::test(start_paused = true)]
async fn test_all_articles_succeed() {
    let fetcher = ScriptedFetcher::new()
        .discover(FRONT, Discover::Links(links(3)))
        .into_arc();
    let orchestrator = orchestrator(fetcher.clone());

    let id = orchestrator.submit(job(FRONT)).unwrap();
    let status = orchestrator.wait(id).await.unwrap();

    assert_eq!(status.status, TaskStatus::Completed);
    assert_eq!(status.total_items, 4);
    assert_eq!(status.completed_items, 4);
    assert_eq!(status.failed_items, 0);
    assert_eq!(status.progress, 100.0);
    assert!(status.finished);
    assert!(status.completed_at.is_some());
    assert_eq!(status.metadata["links_discovered"], 3);
    assert_eq!(status.metadata["task_type"], "multi_depth_scrape");
    assert_eq!(fetcher.fetch_count(), 3);

    let results = orchestrator.get_results(id, true).unwrap();
    assert_eq!(results.results.len(), 4);
    assert_eq!(results.results[0].source, "main_page");
    assert!(results.results[1..]
        .iter()
        .all(|item| item.source == "article-depth-1"));
    assert_eq!(results.errors, Some(vec![]));
    assert_eq!(results.summary.success_rate, 100.0);
}

#[tokio::test(start_paused = true)]
async fn test_one_connection_failure_is_partial() {
    let failing = article(2);
    let fetcher = ScriptedFetcher::new()
        .discover(FRONT, Discover::Links(links(3)))
        .article(&failing, Article::Fail(connection_error(&failing)))
        .into_arc();
    let orchestrator = orchestrator(fetcher.clone());

    let id = orchestrator.submit(job(FRONT)).unwrap();
    let status = orchestrator.wait(id).await.unwrap();

    assert_eq!(status.status, TaskStatus::Partial);
    assert_eq!(status.total_items, 4);
    assert_eq!(status.completed_items, 3);
    assert_eq!(status.failed_items, 1);

    let results = orchestrator.get_results(id, true).unwrap();
    let errors = results.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains(&failing));

    // Two successes plus three attempts on the failing article
    assert_eq!(fetcher.fetch_count(), 5);
    assert_eq!(orchestrator.stats().snapshot().connection_errors, 1);
    assert_eq!(
        orchestrator
            .breaker()
            .status()
            .domain_failure_counts
            .get("news.example.com"),
        Some(&1)
    );
}

#[tokio::test(start_paused = true)]
async fn test_discovery_failure_fails_task() {
    let fetcher = ScriptedFetcher::new()
        .discover(FRONT, Discover::Fail(connection_error(FRONT)))
        .into_arc();
    let orchestrator = orchestrator(fetcher.clone());

    let id = orchestrator.submit(job(FRONT)).unwrap();
    let status = orchestrator.wait(id).await.unwrap();

    assert_eq!(status.status, TaskStatus::Failed);
    assert_eq!(status.total_items, 0);
    assert_eq!(status.results_count, 0);
    assert_eq!(fetcher.fetch_count(), 0);

    let errors = orchestrator.get_results(id, true).unwrap().errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Failed to scrape main page"));
}

#[tokio::test(start_paused = true)]
async fn test_discovery_ceiling() {
    let fetcher = ScriptedFetcher::new()
        .discover(FRONT, Discover::Hang)
        .into_arc();
    let orchestrator = orchestrator(fetcher);

    let start = Instant::now();
    let id = orchestrator.submit(job(FRONT)).unwrap();
    let status = orchestrator.wait(id).await.unwrap();

    assert_eq!(status.status, TaskStatus::Failed);
    assert_eq!(start.elapsed().as_secs(), 300);
    let errors = orchestrator.get_results(id, true).unwrap().errors.unwrap();
    assert_eq!(
        errors,
        vec!["Main page scraping timed out after 300 seconds".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_deadline_yields_partial_results() {
    let fetcher = ScriptedFetcher::new()
        .discover(FRONT, Discover::Links(links(3)))
        .article(&article(2), Article::Hang)
        .article(&article(3), Article::Hang)
        .into_arc();
    let orchestrator = orchestrator(fetcher);

    let start = Instant::now();
    let id = orchestrator
        .submit(ScrapeJob {
            timeout_minutes: 1,
            max_concurrent_articles: 3,
            ..job(FRONT)
        })
        .unwrap();
    let status = orchestrator.wait(id).await.unwrap();

    // The batch wait gives up at the one minute deadline
    let elapsed = start.elapsed().as_secs();
    assert!((60..62).contains(&elapsed), "elapsed {}s", elapsed);

    assert_eq!(status.status, TaskStatus::Partial);
    assert_eq!(status.completed_items, 2);
    assert_eq!(status.failed_items, 2);
    assert!(status.completed_items < status.total_items);

    let errors = orchestrator.get_results(id, true).unwrap().errors.unwrap();
    assert!(errors
        .iter()
        .any(|e| e.contains("timed out after 1 minutes")));
}

#[tokio::test(start_paused = true)]
async fn test_stops_dispatching_when_budget_runs_low() {
    let fetcher = ScriptedFetcher::new()
        .discover(FRONT, Discover::Links(links(3)))
        .article(&article(1), Article::Delay(Duration::from_secs(70)))
        .into_arc();
    let orchestrator = orchestrator(fetcher.clone());

    let start = Instant::now();
    let id = orchestrator
        .submit(ScrapeJob {
            timeout_minutes: 2,
            max_concurrent_articles: 1,
            ..job(FRONT)
        })
        .unwrap();
    let status = orchestrator.wait(id).await.unwrap();

    // 50s left after the first batch, below the 60s needed for another
    assert_eq!(start.elapsed().as_secs(), 70);
    assert_eq!(fetcher.fetch_count(), 1);

    assert_eq!(status.status, TaskStatus::Partial);
    assert_eq!(status.total_items, 4);
    assert_eq!(status.completed_items, 2);
    assert_eq!(status.failed_items, 0);
    assert!(status.progress < 100.0);

    let errors = orchestrator.get_results(id, true).unwrap().errors.unwrap();
    assert_eq!(
        errors,
        vec!["Time budget nearly exhausted, skipped 2 remaining articles".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_batch_wait_abandons_stuck_articles() {
    let fetcher = ScriptedFetcher::new()
        .discover(FRONT, Discover::Links(links(2)))
        .article(&article(1), Article::Hang)
        .article(&article(2), Article::Hang)
        .into_arc();
    let orchestrator = orchestrator(fetcher);

    let start = Instant::now();
    let id = orchestrator
        .submit(ScrapeJob {
            timeout_minutes: 1,
            max_concurrent_articles: 2,
            retry_attempts: 1,
            ..job(FRONT)
        })
        .unwrap();
    let status = orchestrator.wait(id).await.unwrap();

    // First attempts time out at 30s; the retries outlive the 60s batch wait
    assert_eq!(start.elapsed().as_secs(), 60);
    assert_eq!(status.status, TaskStatus::Partial);
    assert_eq!(status.completed_items, 1);
    assert_eq!(status.failed_items, 2);

    let errors = orchestrator.get_results(id, true).unwrap().errors.unwrap();
    assert_eq!(
        errors,
        vec![
            "Batch 1 did not finish within 60s, abandoned 2 articles".to_string(),
            "Task timed out after 1 minutes, returning partial results".to_string(),
        ]
    );

    // Abandoned articles never finished, so nothing was charged to the domain
    assert_eq!(orchestrator.stats().snapshot().timeout_errors, 0);
    assert!(orchestrator
        .breaker()
        .status()
        .domain_failure_counts
        .get("news.example.com")
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn test_circuit_breaker_skips_failing_domain() {
    let fetcher = ScriptedFetcher::new()
        .discover(FRONT, Discover::Links(links(4)))
        .article(&article(1), Article::Fail(connection_error(&article(1))))
        .article(&article(2), Article::Fail(connection_error(&article(2))))
        .into_arc();
    let breaker = CircuitBreakerConfig {
        failure_threshold: 2,
        ..CircuitBreakerConfig::default()
    };
    let orchestrator = TaskOrchestrator::new(
        OrchestratorConfig::default(),
        breaker,
        fetcher.clone(),
        keyword_classifier(),
    );
    let sequential = ScrapeJob {
        max_concurrent_articles: 1,
        retry_attempts: 0,
        ..job(FRONT)
    };

    let first = orchestrator.submit(sequential.clone()).unwrap();
    let status = orchestrator.wait(first).await.unwrap();

    // Two failures open the circuit; the last two articles are never fetched
    assert_eq!(fetcher.fetch_count(), 2);
    assert_eq!(status.status, TaskStatus::Partial);
    assert_eq!(status.total_items, 5);
    assert_eq!(status.completed_items, 1);
    assert_eq!(status.failed_items, 4);

    let errors = orchestrator.get_results(first, true).unwrap().errors.unwrap();
    assert_eq!(errors.len(), 4);
    assert_eq!(
        errors
            .iter()
            .filter(|e| e.contains("circuit breaker open"))
            .count(),
        2
    );
    assert_eq!(orchestrator.stats().snapshot().circuit_breaker_blocked, 2);
    assert_eq!(
        orchestrator.breaker().blocked_domains(),
        vec!["news.example.com".to_string()]
    );

    // A later task on the same domain is blocked from the start
    let second = orchestrator.submit(sequential).unwrap();
    let status = orchestrator.wait(second).await.unwrap();

    assert_eq!(fetcher.fetch_count(), 2);
    assert_eq!(status.status, TaskStatus::Partial);
    assert_eq!(status.failed_items, 4);
    assert_eq!(orchestrator.stats().snapshot().circuit_breaker_blocked, 6);
}

#[tokio::test(start_paused = true)]
async fn test_oversized_timeout_is_rejected() {
    let fetcher = ScriptedFetcher::new()
        .discover(FRONT, Discover::Links(links(3)))
        .into_arc();
    let orchestrator = orchestrator(fetcher);

    let result = orchestrator.submit(ScrapeJob {
        timeout_minutes: u64::MAX / 60,
        ..job(FRONT)
    });
    assert!(matches!(result, Err(ScoutError::InvalidRequest(_))));

    let result = orchestrator.submit(ScrapeJob {
        retry_attempts: 50,
        ..job(FRONT)
    });
    assert!(matches!(result, Err(ScoutError::InvalidRequest(_))));
    assert!(orchestrator.list_tasks(None, 10).is_empty());

    // The largest accepted budget runs normally
    let id = orchestrator
        .submit(ScrapeJob {
            timeout_minutes: 120,
            retry_attempts: 5,
            ..job(FRONT)
        })
        .unwrap();
    let status = orchestrator.wait(id).await.unwrap();
    assert_eq!(status.status, TaskStatus::Completed);
    assert_eq!(status.completed_items, 4);
    assert_eq!(status.errors_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_progress_is_monotonic() {
    let fetcher = ScriptedFetcher::new()
        .discover(FRONT, Discover::Links(links(6)))
        .article(&article(1), Article::Delay(Duration::from_secs(10)))
        .article(&article(2), Article::Delay(Duration::from_secs(25)))
        .article(&article(3), Article::Delay(Duration::from_secs(40)))
        .article(&article(4), Article::Delay(Duration::from_secs(15)))
        .article(&article(5), Article::Fail(connection_error(&article(5))))
        .into_arc();
    let orchestrator = orchestrator(fetcher);

    let id = orchestrator
        .submit(ScrapeJob {
            max_concurrent_articles: 2,
            retry_attempts: 0,
            ..job(FRONT)
        })
        .unwrap();

    let mut last_progress = 0.0;
    let mut snapshots = 0;
    loop {
        let status = orchestrator.get_status(id).unwrap();
        assert!(status.completed_items + status.failed_items <= status.total_items.max(1));
        assert!(status.progress >= last_progress);
        last_progress = status.progress;
        snapshots += 1;

        if status.finished {
            assert_eq!(status.status, TaskStatus::Partial);
            assert_eq!(status.completed_items, 6);
            assert_eq!(status.failed_items, 1);
            break;
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
    assert!(snapshots > 3);
}

#[tokio::test(start_paused = true)]
async fn test_depth_one_skips_articles() {
    let fetcher = ScriptedFetcher::new()
        .discover(FRONT, Discover::Links(links(3)))
        .into_arc();
    let orchestrator = orchestrator(fetcher.clone());

    let id = orchestrator
        .submit(ScrapeJob {
            max_depth: 1,
            ..job(FRONT)
        })
        .unwrap();
    let status = orchestrator.wait(id).await.unwrap();

    assert_eq!(status.status, TaskStatus::Completed);
    assert_eq!(status.total_items, 4);
    assert_eq!(status.results_count, 1);
    assert_eq!(fetcher.fetch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_updates() {
    let fetcher = ScriptedFetcher::new()
        .discover(FRONT, Discover::Links(links(2)))
        .article(&article(1), Article::Hang)
        .article(&article(2), Article::Hang)
        .into_arc();
    let orchestrator = orchestrator(fetcher);

    let id = orchestrator.submit(job(FRONT)).unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    let running = orchestrator.get_status(id).unwrap();
    assert_eq!(running.status, TaskStatus::Running);
    assert_eq!(running.completed_items, 1);

    assert!(orchestrator.cancel(id));
    let cancelled = orchestrator.get_status(id).unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);
    assert!(cancelled.completed_at.is_some());

    let settled = orchestrator.wait(id).await.unwrap();
    assert_eq!(settled.status, TaskStatus::Cancelled);
    assert_eq!(settled.completed_items, cancelled.completed_items);
    assert_eq!(settled.failed_items, cancelled.failed_items);
    assert_eq!(settled.errors_count, 0);

    // A second cancel has nothing to do
    assert!(!orchestrator.cancel(id));
    assert!(!orchestrator.cancel(uuid::Uuid::new_v4()));
    assert_eq!(orchestrator.stats().snapshot().cancelled_tasks, 1);
}

#[tokio::test(start_paused = true)]
async fn test_tasks_queue_behind_global_limit() {
    let slow = "https://slow.example.com/front";
    let fetcher = ScriptedFetcher::new()
        .discover(slow, Discover::Hang)
        .discover(FRONT, Discover::Links(links(1)))
        .into_arc();
    let config = OrchestratorConfig {
        max_concurrent_tasks: 1,
        ..OrchestratorConfig::default()
    };
    let orchestrator = orchestrator_with(config, fetcher, keyword_classifier());

    let first = orchestrator.submit(job(slow)).unwrap();
    let second = orchestrator.submit(job(FRONT)).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(
        orchestrator.get_status(first).unwrap().status,
        TaskStatus::Running
    );
    assert_eq!(
        orchestrator.get_status(second).unwrap().status,
        TaskStatus::Pending
    );

    let health = orchestrator.health_check();
    assert_eq!(health.status, HealthStatus::AtCapacity);
    assert_eq!(health.active_tasks, 2);
    assert_eq!(health.available_task_slots, 0);

    assert!(orchestrator.cancel(first));
    let status = orchestrator.wait(second).await.unwrap();
    assert_eq!(status.status, TaskStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_queued() {
    let slow = "https://slow.example.com/front";
    let fetcher = ScriptedFetcher::new()
        .discover(slow, Discover::Hang)
        .into_arc();
    let config = OrchestratorConfig {
        max_concurrent_tasks: 1,
        ..OrchestratorConfig::default()
    };
    let orchestrator = orchestrator_with(config, fetcher.clone(), keyword_classifier());

    let first = orchestrator.submit(job(slow)).unwrap();
    let queued = orchestrator.submit(job(FRONT)).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(orchestrator.cancel(queued));
    let status = orchestrator.wait(queued).await.unwrap();
    assert_eq!(status.status, TaskStatus::Cancelled);
    assert_eq!(status.total_items, 0);
    assert_eq!(fetcher.discover_calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    orchestrator.cancel(first);
}

#[tokio::test(start_paused = true)]
async fn test_classification_reports() {
    let fetcher = ScriptedFetcher::new()
        .discover(FRONT, Discover::Links(links(2)))
        .into_arc();
    let orchestrator = orchestrator(fetcher);

    let id = orchestrator
        .submit(ScrapeJob {
            question: Some("Does the model deceive its users?".to_string()),
            categories: vec!["Deceptive Behaviour".to_string(), "Collusion".to_string()],
            ..job(FRONT)
        })
        .unwrap();
    let status = orchestrator.wait(id).await.unwrap();

    assert_eq!(status.status, TaskStatus::Completed);
    assert_eq!(status.metadata["ai_reports_count"], 3);

    let reports = status.metadata["ai_reports"].as_array().unwrap();
    assert_eq!(reports[0]["categories"][0], "Deceptive Behaviour");
    assert_eq!(reports[0]["keywords"][0], "deceive (from question)");
    assert_eq!(reports[0]["stance"], "concerning");
    assert_eq!(reports[0]["confidence"], 45);
}

#[tokio::test(start_paused = true)]
async fn test_classifier_failure_keeps_status() {
    let fetcher = ScriptedFetcher::new()
        .discover(FRONT, Discover::Links(links(1)))
        .into_arc();
    let orchestrator = orchestrator_with(
        OrchestratorConfig::default(),
        fetcher,
        Arc::new(FailingClassifier),
    );

    let id = orchestrator
        .submit(ScrapeJob {
            question: Some("Anything odd?".to_string()),
            categories: vec!["Sycophancy".to_string()],
            ..job(FRONT)
        })
        .unwrap();
    let status = orchestrator.wait(id).await.unwrap();

    assert_eq!(status.status, TaskStatus::Completed);
    assert_eq!(status.errors_count, 2);
    assert_eq!(status.metadata["ai_reports_count"], 0);
}

#[tokio::test(start_paused = true)]
async fn test_panic_is_contained() {
    let fetcher = ScriptedFetcher::new()
        .discover(FRONT, Discover::Panic)
        .into_arc();
    let orchestrator = orchestrator(fetcher);

    let id = orchestrator.submit(job(FRONT)).unwrap();
    let status = orchestrator.wait(id).await.unwrap();

    assert_eq!(status.status, TaskStatus::Failed);
    let errors = orchestrator.get_results(id, true).unwrap().errors.unwrap();
    assert_eq!(
        errors,
        vec!["Task execution failed: scripted discovery panic".to_string()]
    );
    assert_eq!(orchestrator.health_check().active_tasks, 0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_request_is_rejected() {
    let orchestrator = orchestrator(ScriptedFetcher::new().into_arc());

    let result = orchestrator.submit(ScrapeJob {
        max_depth: 0,
        ..job(FRONT)
    });

    assert!(matches!(result, Err(ScoutError::InvalidRequest(_))));
    assert!(orchestrator.list_tasks(None, 10).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_list_and_cleanup() {
    let broken = "https://broken.example.com/front";
    let fetcher = ScriptedFetcher::new()
        .discover(broken, Discover::Fail(connection_error(broken)))
        .into_arc();
    let orchestrator = orchestrator(fetcher);

    let failed = orchestrator.submit(job(broken)).unwrap();
    orchestrator.wait(failed).await;
    // Creation timestamps come from the wall clock
    std::thread::sleep(Duration::from_millis(5));
    let completed = orchestrator.submit(job(FRONT)).unwrap();
    orchestrator.wait(completed).await;

    let all = orchestrator.list_tasks(None, 10);
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].task_id, completed);
    assert_eq!(all[1].task_id, failed);

    let only_failed = orchestrator.list_tasks(Some(TaskStatus::Failed), 10);
    assert_eq!(only_failed.len(), 1);
    assert_eq!(only_failed[0].task_id, failed);
    assert_eq!(orchestrator.list_tasks(None, 1).len(), 1);

    let health = orchestrator.health_check();
    assert_eq!(health.total_tasks, 2);
    assert_eq!(health.task_status_distribution["failed"], 1);
    assert_eq!(health.task_status_distribution["completed"], 1);

    assert_eq!(orchestrator.cleanup_completed_tasks(chrono::Duration::hours(24)), 0);
    assert_eq!(orchestrator.cleanup_completed_tasks(chrono::Duration::seconds(-1)), 2);
    assert!(orchestrator.get_status(completed).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_health_degrades_with_errors() {
    let fetcher = ScriptedFetcher::new()
        .discover(FRONT, Discover::Links(links(2)))
        .article(&article(1), Article::Fail(connection_error(&article(1))))
        .article(&article(2), Article::Fail(connection_error(&article(2))))
        .into_arc();
    let orchestrator = orchestrator(fetcher);

    let id = orchestrator.submit(job(FRONT)).unwrap();
    orchestrator.wait(id).await;

    let health = orchestrator.health_check();
    assert_eq!(health.error_statistics.connection_errors, 2);
    assert_eq!(health.error_rate, 2.0);
    assert_eq!(health.status, HealthStatus::Degraded);
    assert_eq!(health.active_tasks, 0);
    assert_eq!(health.available_task_slots, 5);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_running_tasks() {
    let fetcher = ScriptedFetcher::new()
        .discover(FRONT, Discover::Hang)
        .into_arc();
    let orchestrator = orchestrator(fetcher);

    let id = orchestrator.submit(job(FRONT)).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    orchestrator.shutdown().await;

    let status = orchestrator.get_status(id).unwrap();
    assert_eq!(status.status, TaskStatus::Cancelled);
    assert!(status.finished);
    assert!(matches!(
        orchestrator.submit(job(FRONT)),
        Err(ScoutError::ShuttingDown)
    ));
}
