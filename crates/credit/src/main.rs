//! Credit proposal service launcher.
//!
//! Usage:
//!     credit serve --bucket-input propostas
//!     credit decide ./proposta.json

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use credit::config::{load_file_config, ServeArgs, ServiceConfig};
use credit::service;
use credit_decision::DecisionEngine;
use credit_logging::{credit_home, init_logging, LogConfig};
use credit_protocol::{parse, serialize_pretty};
use credit_store::FsStore;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "credit", about = "Credit proposal intake and decision service")]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API and the decision worker
    Serve(ServeArgs),

    /// Decide a proposal file locally and print the decision
    Decide {
        /// Proposal JSON file
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match init_logging(LogConfig {
        app_name: "credit",
        verbose: cli.verbose,
    }) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {err:#}");
            None
        }
    };

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::from(1)
        }
    }
}

fn run_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve(args) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to build tokio runtime")?;
            runtime.block_on(serve(args))
        }
        Commands::Decide { path } => decide(&path),
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let home = credit_home()?;
    let file = load_file_config(args.config.as_deref(), &home)?;
    let config = ServiceConfig::resolve(&args, file, &home)?;

    let store = Arc::new(FsStore::new(&config.store_root));
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;

    info!("Starting credit service");
    info!("  Store: {}", store.root().display());
    info!("  Worker concurrency: {}", config.worker.concurrency);

    let stats = service::run(config, store, listener, shutdown_signal()).await?;
    info!(
        persisted = stats.persisted,
        failed = stats.failed,
        dead_lettered = stats.dead_lettered,
        abandoned = stats.abandoned,
        "Shutdown complete"
    );
    Ok(())
}

fn decide(path: &Path) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let proposal =
        parse(&bytes).with_context(|| format!("Failed to parse proposal {}", path.display()))?;
    let decision = DecisionEngine::default().decide(&proposal);

    let mut out = serialize_pretty(&decision).context("Failed to encode decision")?;
    out.push(b'\n');
    std::io::stdout()
        .write_all(&out)
        .context("Failed to write decision")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
