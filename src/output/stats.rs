//! Console printing of task results and orchestrator health

use crate::output::{HealthReport, TaskResultsView};

/// Prints a task's outcome to stdout in a formatted manner
pub fn print_task_summary(view: &TaskResultsView) {
    println!("=== Task {} ===\n", view.task_id);

    println!("Overview:");
    println!("  Status: {}", view.status);
    println!("  Total items: {}", view.summary.total_items);
    println!("  Completed: {}", view.summary.completed_items);
    println!("  Failed: {}", view.summary.failed_items);
    println!("  Duration: {:.1}s", view.summary.duration_seconds);
    if let Some(links) = view.metadata.get("links_discovered") {
        println!("  Links discovered: {}", links);
    }
    println!();

    // Largest pages first
    let mut items: Vec<_> = view.results.iter().collect();
    items.sort_by(|a, b| b.word_count.cmp(&a.word_count));

    if !items.is_empty() {
        println!("Results ({}):", items.len());
        for item in items {
            println!(
                "  [{}] {} ({} words, attempt {})",
                item.source, item.url, item.word_count, item.retry_attempt
            );
        }
        println!();
    }

    if let Some(errors) = view.errors.as_ref().filter(|errors| !errors.is_empty()) {
        println!("Errors ({}):", errors.len());
        for error in errors {
            println!("  - {}", error);
        }
        println!();
    }

    if let Some(count) = view.metadata.get("ai_reports_count") {
        println!("Behavior reports: {}", count);
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} items successfully processed)",
        view.summary.success_rate, view.summary.completed_items, view.summary.total_items
    );
}

/// Prints a health report to stdout
pub fn print_health(report: &HealthReport) {
    println!("=== Orchestrator Health ===\n");

    println!("Status: {}", report.status.as_str());
    println!(
        "  Active tasks: {} / {} ({} slots free)",
        report.active_tasks, report.max_concurrent_tasks, report.available_task_slots
    );
    println!("  Total tasks: {}", report.total_tasks);
    println!("  Error rate: {:.3}", report.error_rate);
    println!();

    if !report.task_status_distribution.is_empty() {
        println!("Tasks by Status:");
        let mut counts: Vec<_> = report.task_status_distribution.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1));
        for (status, count) in counts {
            println!("  {}: {}", status, count);
        }
        println!();
    }

    let errors = &report.error_statistics;
    println!("Error Statistics:");
    println!("  Timeouts: {}", errors.timeout_errors);
    println!("  Connection errors: {}", errors.connection_errors);
    println!("  General errors: {}", errors.general_errors);
    println!("  Cancelled tasks: {}", errors.cancelled_tasks);
    println!("  Circuit breaker skips: {}", errors.circuit_breaker_blocked);

    if !report.circuit_breaker.blocked_domains.is_empty() {
        println!();
        println!(
            "Blocked Domains ({}):",
            report.circuit_breaker.total_blocked_domains
        );
        for domain in &report.circuit_breaker.blocked_domains {
            println!("  - {}", domain);
        }
    }
}
