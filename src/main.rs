//! Scout main entry point
//!
//! This is the command-line interface for the Scout task orchestrator.

use anyhow::{bail, Context};
use clap::Parser;
use scout_crawler::config::{load_config_with_hash, Config};
use scout_crawler::crawler::{HttpPageFetcher, KeywordClassifier, ScrapeJob};
use scout_crawler::output::{print_health, print_task_summary};
use scout_crawler::{TaskId, TaskOrchestrator, TaskStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Scout: a fault-tolerant scrape-and-classify orchestrator
///
/// Scout fetches a page, follows the articles it links to under per-task
/// concurrency and time limits, and optionally scans the collected text for
/// behavior categories. Results are written as JSON.
#[derive(Parser, Debug)]
#[command(name = "scout")]
#[command(version = "1.0.0")]
#[command(about = "A fault-tolerant scrape-and-classify orchestrator", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Page to scrape
    #[arg(long)]
    url: String,

    /// Crawl depth (1 = only the page itself)
    #[arg(long, default_value_t = 2)]
    depth: u32,

    /// Concurrent article fetches (defaults to the configured value)
    #[arg(long)]
    concurrency: Option<u32>,

    /// Soft deadline for the whole task
    #[arg(long, default_value_t = 30)]
    timeout_minutes: u64,

    /// Retries per article after the first attempt
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Question used to analyze the scraped content
    #[arg(long)]
    question: Option<String>,

    /// Behavior category to look for (repeatable)
    #[arg(long = "category", value_name = "CATEGORY")]
    categories: Vec<String>,

    /// Write the results JSON here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Seconds between progress reports
    #[arg(long, default_value_t = 5)]
    poll_seconds: u64,

    /// Print orchestrator health once the task has settled
    #[arg(long)]
    health: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and request without scraping anything
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn job(&self, config: &Config) -> ScrapeJob {
        ScrapeJob {
            url: self.url.clone(),
            max_depth: self.depth,
            max_concurrent_articles: self
                .concurrency
                .unwrap_or(config.orchestrator.max_concurrent_articles),
            timeout_minutes: self.timeout_minutes,
            retry_attempts: self.retries,
            question: self.question.clone(),
            categories: self.categories.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let job = cli
        .job(&config)
        .validate()
        .context("Invalid scrape request")?;

    if cli.dry_run {
        handle_dry_run(&config, &job);
        return Ok(());
    }

    handle_run(&cli, &config, job).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("scout_crawler=info,scout=info,warn"),
            1 => EnvFilter::new("scout_crawler=debug,scout=debug,info"),
            2 => EnvFilter::new("scout_crawler=trace,scout=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles the --dry-run mode: shows the effective settings
fn handle_dry_run(config: &Config, job: &ScrapeJob) {
    println!("=== Scout Dry Run ===\n");

    let orchestrator = &config.orchestrator;
    println!("Orchestrator Configuration:");
    println!("  Max concurrent tasks: {}", orchestrator.max_concurrent_tasks);
    println!(
        "  Max concurrent articles: {}",
        orchestrator.max_concurrent_articles
    );
    println!(
        "  Discovery timeout: {}s",
        orchestrator.discovery_timeout_seconds
    );
    println!(
        "  Article timeout ceiling: {}s",
        orchestrator.article_timeout_ceiling_seconds
    );
    println!("  Max batch size: {}", orchestrator.max_batch_size);

    println!("\nCircuit Breaker:");
    println!(
        "  Failure threshold: {}",
        config.circuit_breaker.failure_threshold
    );
    println!("  Cooldown: {}s", config.circuit_breaker.cooldown_seconds);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nRequest:");
    println!("  URL: {}", job.url);
    println!("  Depth: {}", job.max_depth);
    println!("  Concurrent articles: {}", job.max_concurrent_articles);
    println!("  Timeout: {} min", job.timeout_minutes);
    println!("  Retries: {}", job.retry_attempts);
    if let Some(question) = &job.question {
        println!("  Question: {}", question);
    }
    if !job.categories.is_empty() {
        println!("  Categories ({}):", job.categories.len());
        for category in &job.categories {
            println!("    - {}", category);
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Request is valid");
}

/// Submits the job, reports progress until it settles and writes the results
async fn handle_run(cli: &Cli, config: &Config, job: ScrapeJob) -> anyhow::Result<()> {
    let fetcher = HttpPageFetcher::new(&config.user_agent, &config.fetcher)
        .context("Failed to build HTTP client")?;
    let orchestrator =
        TaskOrchestrator::from_config(config, Arc::new(fetcher), Arc::new(KeywordClassifier::new()));

    let id = orchestrator.submit(job).context("Failed to submit task")?;
    let status = watch_task(&orchestrator, id, Duration::from_secs(cli.poll_seconds.max(1))).await;

    let results = orchestrator
        .get_results(id, true)
        .context("Task disappeared from the registry")?;

    match &cli.output {
        Some(path) => {
            write_results(path, &results)?;
            if !cli.quiet {
                print_task_summary(&results);
                println!("\n✓ Results written to: {}", path.display());
            }
        }
        None => println!("{}", serde_json::to_string_pretty(&results)?),
    }

    if cli.health {
        print_health(&orchestrator.health_check());
    }

    orchestrator.shutdown().await;

    if status == TaskStatus::Failed {
        bail!("Task {} failed", id);
    }
    Ok(())
}

/// Logs progress every `poll` until the task settles; Ctrl-C cancels it
async fn watch_task(orchestrator: &TaskOrchestrator, id: TaskId, poll: Duration) -> TaskStatus {
    let wait = orchestrator.wait(id);
    tokio::pin!(wait);

    let mut ticker = tokio::time::interval(poll);
    let mut interrupted = false;

    loop {
        tokio::select! {
            finished = &mut wait => {
                return finished.map_or(TaskStatus::Failed, |view| view.status);
            }
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                tracing::warn!("Interrupted, cancelling task {}", id);
                orchestrator.cancel(id);
            }
            _ = ticker.tick() => {
                if let Some(view) = orchestrator.get_status(id) {
                    tracing::info!(
                        "Task {}: {} {:.1}% ({} completed, {} failed of {})",
                        id,
                        view.status,
                        view.progress,
                        view.completed_items,
                        view.failed_items,
                        view.total_items
                    );
                }
            }
        }
    }
}

fn write_results(path: &Path, results: &scout_crawler::output::TaskResultsView) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write results to {}", path.display()))
}
