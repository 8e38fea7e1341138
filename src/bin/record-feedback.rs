//! Record the outcome of a routed task
//!
//! Appends a feedback record to the date-partitioned feedback log consumed
//! by the offline learning job.

use clap::{CommandFactory, Parser};
use moe_router::config::RouterConfig;
use moe_router::observability::init_default_logging;
use moe_router::protocol::Outcome;
use moe_router::routing::{Expert, ExpertRouter, EVENT_FLUSH_TIMEOUT};
use std::path::PathBuf;
use std::process;
use tracing::error;

/// Record the outcome of a routed task
#[derive(Parser)]
#[command(name = "record-feedback")]
#[command(about = "Append routing outcome feedback for the learning job")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Task identifier used when routing
    task_id: Option<String>,

    /// Expert that handled the task
    expert: Option<String>,

    /// success or failure
    outcome: Option<String>,

    /// Outcome score reported by the worker
    score: Option<f64>,

    /// Keywords that contributed to the routing decision
    matched_keywords: Vec<String>,
}

fn exit_with(message: &str) -> ! {
    error!("{}", message);
    eprintln!("error: {message}");
    process::exit(1);
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_default_logging();

    let (Some(task_id), Some(expert), Some(outcome), Some(score)) = (
        args.task_id.as_deref(),
        args.expert.as_deref(),
        args.outcome.as_deref(),
        args.score,
    ) else {
        eprintln!(
            "Usage: record-feedback [--config FILE] <task_id> <expert> <success|failure> <score> [keywords...]"
        );
        let _ = Args::command().print_help();
        process::exit(1);
    };

    let outcome: Outcome = match outcome.parse() {
        Ok(outcome) => outcome,
        Err(e) => exit_with(&e.to_string()),
    };

    let config = match RouterConfig::load_or_default(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => exit_with(&format!("failed to load configuration: {e}")),
    };

    let router = match ExpertRouter::from_config(&config) {
        Ok(router) => router,
        Err(e) => exit_with(&e.sanitized_message()),
    };

    let recorded = router
        .record_feedback(
            task_id,
            Expert::from(expert),
            outcome,
            score,
            args.matched_keywords.clone(),
        )
        .await;
    router.flush_events(EVENT_FLUSH_TIMEOUT).await;

    match recorded {
        Ok(record) => match serde_json::to_string(&record) {
            Ok(json) => println!("{json}"),
            Err(e) => exit_with(&format!("failed to serialize feedback: {e}")),
        },
        Err(e) => exit_with(&e.sanitized_message()),
    }
}
