//! Beacon Server
//!
//! HTTP front door and CLI for the disaster-response coordinator.
//! `beacon serve` exposes the session API; `beacon run` executes one
//! request locally and prints progress as it streams.

mod api;
mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use beacon_core::pipeline::WorkUnitId;
use beacon_core::workers::{default_workers, RadkitEngine, ScriptedEngine};
use beacon_core::{Coordinator, CoordinatorConfig, Dataset, OverallStatus, ProgressEvent, ReasoningEngine};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::api::AppState;
use crate::config::{PersistedConfig, DEFAULT_CONFIG_PATH};

const DEFAULT_LOG_FILTER: &str = "beacon=info";

#[derive(Parser, Clone)]
#[command(author, version, about = "Beacon - Disaster Response Coordinator")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,

    /// Category dataset (JSON object keyed by category)
    #[arg(long, global = true, default_value = "data/disaster-data.json")]
    dataset: PathBuf,

    /// Optional JSON config overrides
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// LLM provider (anthropic, openai, gemini, openrouter, grok, deepseek)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model name for every worker
    #[arg(long, global = true)]
    model: Option<String>,

    /// Use the built-in scripted engine instead of a live provider
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the HTTP server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: std::net::IpAddr,
    },
    /// Run one request locally and print its progress
    Run {
        /// Dataset category, e.g. flood
        #[arg(short, long, default_value = "flood")]
        category: String,
        /// Session id (random when omitted)
        #[arg(long)]
        session_id: Option<String>,
        /// The request text
        query: String,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Defaults, then the config file, then CLI flags
async fn load_config(args: &Args) -> Result<CoordinatorConfig> {
    let mut persisted = PersistedConfig::load(&args.config).await?;
    persisted.merge(PersistedConfig {
        provider: args.provider.clone(),
        model: args.model.clone(),
        ..Default::default()
    });
    persisted.into_coordinator_config()
}

async fn build_coordinator(args: &Args) -> Result<Coordinator> {
    let config = load_config(args).await?;
    let dataset = Dataset::load(&args.dataset)
        .await
        .with_context(|| format!("Failed to load dataset {}", args.dataset.display()))?;

    let engine: Arc<dyn ReasoningEngine> = if args.offline {
        tracing::warn!("Offline mode: workers reply from the scripted engine");
        Arc::new(ScriptedEngine::new().with_notes(["Reviewing the request", "Drafting a reply"]))
    } else {
        config.model.ensure_credentials()?;
        for (worker, provider) in &config.per_worker_providers {
            config
                .model_config_for(worker)
                .ensure_credentials()
                .with_context(|| format!("Worker '{}' uses {}", worker, provider.display_name()))?;
        }
        Arc::new(RadkitEngine::new())
    };

    tracing::info!(
        provider = config.model.provider.display_name(),
        model = %config.model.model,
        categories = dataset.len(),
        mode = ?config.execution_mode,
        "Coordinator ready"
    );
    Ok(Coordinator::new(config, default_workers(), dataset, engine))
}

async fn serve(coordinator: Coordinator, addr: SocketAddr) -> Result<()> {
    let config = coordinator.config();
    let _sweeper = coordinator
        .registry()
        .spawn_sweeper(config.retention(), config.sweep_interval());

    let app = api::router(AppState::shared(coordinator));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "Beacon server listening");
    println!("Beacon server running at http://{}", addr);
    println!("   Sessions: POST /api/v1/sessions, GET /api/v1/sessions/:id[/events|/messages]");
    println!("   Workers:  GET /api/v1/workers");
    println!("   OpenAPI:  GET /api/v1/openapi.json");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_local(
    coordinator: Coordinator,
    category: &str,
    session_id: Option<String>,
    query: &str,
) -> Result<()> {
    let session_id = session_id.unwrap_or_else(|| format!("cli-{}", WorkUnitId::new()));
    let submission = coordinator.submit(&session_id, category, query).await?;
    println!("Session {} started ({} workers)", session_id, submission.work_units.len());

    let mut events = coordinator.subscribe(&session_id);
    while let Some(event) = events.next().await {
        match &event {
            ProgressEvent::Worker {
                worker,
                status,
                thinking_note,
                ..
            } => {
                if thinking_note.is_empty() {
                    println!("  [{}] {:?}", worker, status);
                } else {
                    println!("  [{}] {:?}: {}", worker, status, thinking_note);
                }
            }
            ProgressEvent::Terminal { status, error } => match error {
                Some(error) => println!("Session {:?}: {}", status, error),
                None => println!("Session {:?}", status),
            },
            ProgressEvent::Error { error } => println!("{}", error),
        }
    }
    submission.wait().await;

    let snapshot = coordinator
        .get_status(&session_id)
        .await
        .context("Session disappeared before it could be read")?;
    for message in snapshot.messages() {
        println!("\n## {}\n{}", message.sender, message.text);
    }

    if snapshot.status == OverallStatus::Failed {
        bail!(
            "session failed: {}",
            snapshot.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = Args::parse();
    let coordinator = build_coordinator(&args).await?;

    match args.command.clone() {
        Some(CliCommand::Run {
            category,
            session_id,
            query,
        }) => run_local(coordinator, &category, session_id, &query).await,
        Some(CliCommand::Serve { port, host }) => serve(coordinator, SocketAddr::new(host, port)).await,
        None => serve(coordinator, SocketAddr::from(([127, 0, 0, 1], 8000))).await,
    }
}
