//! Sandlot CLI - binary entry point.
//!
//! `sandlot serve` runs the HTTP API. The remaining subcommands run one
//! lifecycle operation against the configured store and substrates and print
//! the result as JSON:
//!
//! ```text
//! sandlot status <id>
//! sandlot verify <id> [--name owner/repo]
//! sandlot launch <id>
//! sandlot runtime-status <id> <task-handle>
//! sandlot stop <id> <task-handle>
//! ```

mod wiring;

use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use sandlot_config::{SandlotConfig, Settings, data_dir};

#[derive(Debug, Parser)]
#[command(name = "sandlot", version, about = "Sandbox workload lifecycle reconciler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Listen address; overrides `server.addr`.
        #[arg(long)]
        addr: Option<std::net::SocketAddr>,
    },
    /// Reconcile a workload with its substrate and print its status.
    Status { id: String },
    /// Start a verification pipeline.
    Verify {
        id: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Launch a runtime instance of a verified workload.
    Launch { id: String },
    /// Print the state and endpoint of a runtime instance.
    RuntimeStatus { id: String, task_handle: String },
    /// Stop a runtime instance.
    Stop { id: String, task_handle: String },
}

fn init_tracing(log_to_stderr: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    if log_to_stderr {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
        return;
    }

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let primary = data_dir().join("logs").join("sandlot.log");
    let fallback = PathBuf::from(".sandlot").join("logs").join("sandlot.log");
    if primary == fallback {
        vec![primary]
    } else {
        vec![primary, fallback]
    }
}

fn load_settings() -> Result<Settings> {
    let config = SandlotConfig::load()
        .context("failed to load config")?
        .unwrap_or_default();
    config.resolve().context("invalid config")
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}

async fn serve(settings: &Settings, addr: Option<std::net::SocketAddr>) -> Result<()> {
    let service = Arc::new(wiring::build_service(settings)?);
    let router = sandlot_api::build_router(service);
    let addr = addr.unwrap_or(settings.server_addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, store = %settings.store_path.display(), "Serving");
    eprintln!("sandlot listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for shutdown signal: {e}");
            }
        })
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings();
    init_tracing(settings.as_ref().is_ok_and(|s| s.log_to_stderr));
    let settings = settings?;

    if let Command::Serve { addr } = cli.command {
        return serve(&settings, addr).await;
    }

    let service = wiring::build_service(&settings)?;
    match cli.command {
        Command::Serve { .. } => Ok(()),
        Command::Status { id } => print_json(&service.get_status(&id).await?),
        Command::Verify { id, name } => {
            print_json(&service.start_verification(&id, name.as_deref()).await?)
        }
        Command::Launch { id } => print_json(&service.launch_runtime(&id).await?),
        Command::RuntimeStatus { id, task_handle } => {
            print_json(&service.get_runtime_status(&id, &task_handle).await?)
        }
        Command::Stop { id, task_handle } => {
            print_json(&service.stop_runtime(&id, &task_handle).await?)
        }
    }
}
