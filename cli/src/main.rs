//! devup binary
//!
//! One command to bring up a local development environment: probe the
//! required toolchains, start the backend, wait until it answers its health
//! endpoint, start the frontend dev server if the project has one, then
//! keep everything running until Ctrl+C or the backend exits.

#![allow(unused_crate_dependencies)]

use clap::{Parser, Subcommand};
use devup_core::{
    load_config_from_toml_path, toolchain, HttpProbe, LaunchConfig, LaunchOutcome, LaunchPhase,
    Supervisor, UnixProcessAdapter,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::error;

#[derive(Parser)]
#[command(name = "devup")]
#[command(about = "Start a local backend and frontend dev environment with one command")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the backend and, if present, the frontend dev server
    Up {
        /// Path to a devup.toml config; defaults apply without one
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Skip the frontend dev server even if its directory exists
        #[arg(long)]
        backend_only: bool,
    },
    /// Probe required toolchains and exit
    Check {
        /// Path to a devup.toml config; defaults apply without one
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = devup_core::utils::init_tracing(&cli.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::from(1);
    }

    match cli.command {
        Commands::Check { config } => run_check(config).await,
        Commands::Up {
            config,
            backend_only,
        } => run_up(config, backend_only).await,
    }
}

fn load_config(path: Option<PathBuf>) -> devup_core::Result<LaunchConfig> {
    match path {
        Some(path) => load_config_from_toml_path(path),
        None => Ok(LaunchConfig::default()),
    }
}

async fn run_check(config_path: Option<PathBuf>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{} ({})", e, e.code());
            return ExitCode::from(1);
        }
    };

    if toolchain::probe_and_report(&config.toolchains).await {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

async fn run_up(config_path: Option<PathBuf>, backend_only: bool) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{} ({})", e, e.code());
            return ExitCode::from(1);
        }
    };

    println!("devup - local dev environment launcher");
    println!("======================================");

    let probe = Arc::new(HttpProbe::new(
        config.backend.health_url.clone(),
        config.readiness.timeout(),
    ));
    let adapter = Arc::new(UnixProcessAdapter::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        println!("\nStopping...");
        let _ = shutdown_tx.send(true);
        // Keep the sender alive so a dropped channel is never mistaken
        // for an interrupt
        std::future::pending::<()>().await;
    });

    let api_url = config.backend.api_url.clone();
    let serve_url = config.frontend.serve_url.clone();

    let mut supervisor = Supervisor::new(config, adapter, probe, shutdown_rx)
        .with_frontend(!backend_only);

    // Print the addresses once everything is up
    let mut phase_rx = supervisor.subscribe_phase();
    tokio::spawn(async move {
        if phase_rx
            .wait_for(|p| *p == LaunchPhase::Running)
            .await
            .is_ok()
        {
            println!();
            println!("Environment is up!");
            println!("  Backend API: {}", api_url);
            if !backend_only {
                println!("  Frontend:    {}", serve_url);
            }
            println!();
            println!("Press Ctrl+C to stop");
        }
    });

    match supervisor.run().await {
        Ok(LaunchOutcome::Interrupted) => {
            println!("Stopped.");
            ExitCode::SUCCESS
        }
        Ok(LaunchOutcome::BackendExited(exit)) => {
            let code = exit.exit_code.unwrap_or(1);
            println!("Backend exited with {:?}", exit.exit_code);
            // ExitCode is a u8; clamp anything out of range
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
        Err(e) => {
            error!("{} ({})", e, e.code());
            ExitCode::from(1)
        }
    }
}
