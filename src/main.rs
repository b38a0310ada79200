//! Request Gate (v1)
//!
//! Rate-limiting HTTP front built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                   REQUEST GATE                   │
//!                         │                                                  │
//!   Client Request        │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!   ──────────────────────┼─▶│  http   │──▶│ admission│──▶│   limiter    │   │
//!                         │  │ server  │   │ pipeline │   │ global/scope │   │
//!                         │  └─────────┘   └────┬─────┘   └──────┬───────┘   │
//!                         │                     │                │           │
//!                         │           admitted  ▼                ▼           │
//!   Client Response       │             ┌──────────────┐   ┌──────────┐      │
//!   ◀─────────────────────┼─────────────│ route handler│   │  store   │◀─────┼──── Redis
//!                         │             └──────────────┘   └──────────┘      │
//!                         │                                                  │
//!                         │  Cross-cutting: config, observability,           │
//!                         │  security headers, lifecycle                     │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use request_gate::config::load_config;
use request_gate::lifecycle::{wait_for_signal, Gate, Shutdown};
use request_gate::observability::init_logging;

#[derive(Parser, Debug)]
#[command(name = "request-gate", version, about = "Rate-limiting HTTP gate")]
struct Cli {
    /// Path to a TOML config file; built-in defaults when omitted
    #[arg(short, long, env = "GATE_CONFIG")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to read .env file: {e}");
            return ExitCode::FAILURE;
        }
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.check {
        println!("Configuration OK");
        return ExitCode::SUCCESS;
    }

    let log_guards = match init_logging(&config.observability, config.environment) {
        Ok(guards) => Arc::new(guards),
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    {
        let log_guards = log_guards.clone();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(panic = %info, "Unhandled panic, exiting");
            log_guards.flush();
            std::process::exit(1);
        }));
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "request-gate starting");

    let gate = match Gate::bootstrap(&config).await {
        Ok(gate) => gate,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Arc::new(Shutdown::new());
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let signal = wait_for_signal().await;
            tracing::info!(signal = ?signal, "Stopping");
            shutdown.trigger();
        });
    }

    match gate.run(&shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}
