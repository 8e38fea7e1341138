//! MoE Router - command line entry point
//!
//! Routes one task and prints the compact decision record to stdout. When
//! stderr is a terminal, a readable summary is printed there as well.

use clap::{CommandFactory, Parser};
use moe_router::config::RouterConfig;
use moe_router::observability::init_default_logging;
use moe_router::protocol::{RoutingDecision, Task};
use moe_router::routing::{CallerIdentity, ExpertRouter, Router, EVENT_FLUSH_TIMEOUT};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

/// Route a task description to the best suited expert
#[derive(Parser)]
#[command(name = "moe-router")]
#[command(about = "Mixture-of-experts task router")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Identity the routing request is made for
    #[arg(long, env = "MOE_ROUTER_CALLER", default_value = "local")]
    caller: String,

    /// Task identifier
    task_id: Option<String>,

    /// Task description, optionally prefixed with `type:`
    task_description: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_default_logging();

    let (Some(task_id), Some(description)) = (cli.task_id.clone(), cli.task_description.clone())
    else {
        eprintln!("Usage: moe-router [--config FILE] [--caller ID] <task_id> <task_description>");
        let _ = Cli::command().print_help();
        process::exit(1);
    };

    let config = match RouterConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => {
            info!(patterns = %config.stores.patterns.display(), "Configuration loaded");
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    let router = match ExpertRouter::from_config(&config) {
        Ok(router) => router,
        Err(e) => {
            error!(error = %e.sanitized_message(), "Router startup failed");
            eprintln!("error: {}", e.sanitized_message());
            process::exit(1);
        }
    };

    let task = Task::new(task_id, description);
    let decision = match router.route(&task, &CallerIdentity::new(cli.caller)).await {
        Ok(decision) => decision,
        Err(e) => {
            error!(error = %e.sanitized_message(), "Routing failed");
            eprintln!("error: {}", e.sanitized_message());
            process::exit(1);
        }
    };

    router.flush_events(EVENT_FLUSH_TIMEOUT).await;

    match serde_json::to_string(&decision.to_record()) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("error: failed to serialize decision: {e}");
            process::exit(1);
        }
    }

    if std::io::stderr().is_terminal() {
        print_summary(&decision);
    }
}

fn print_summary(decision: &RoutingDecision) {
    let activated: Vec<String> = decision
        .activated_experts
        .iter()
        .map(|expert| {
            let confidence = decision.scores.get(expert).copied().unwrap_or_default();
            format!("{expert} ({:.0}%)", confidence * 100.0)
        })
        .collect();

    let pretty = serde_json::to_string_pretty(&decision.to_record()).unwrap_or_default();
    eprintln!("{pretty}");
    eprintln!();
    eprintln!(
        "Primary expert:    {} ({:.0}%)",
        decision.primary_expert,
        decision.primary_confidence * 100.0
    );
    eprintln!("Strategy:          {}", decision.strategy);
    eprintln!("Routing method:    {}", decision.routing_method);
    if activated.is_empty() {
        eprintln!("Activated experts: none");
    } else {
        eprintln!("Activated experts: {}", activated.join(", "));
    }
    eprintln!(
        "Model:             {} via {} ({} tier)",
        decision.model_recommendation.model,
        decision.model_recommendation.provider,
        decision.model_recommendation.tier
    );
}
