// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! omc-bridge: per-worker bridge daemon.
//!
//! Invoked as `omc-bridge --config <path>` inside the worker's tmux
//! session, usually by the team lead. Loads and validates the config,
//! wires process signal handlers, and runs the poll loop until a
//! shutdown or drain signal ends it.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config_loader;

use config_loader::{discover_project_root, load_bridge_config};
use omc_adapters::{ProcessCliRunner, TmuxSessionHost};
use omc_core::{BridgeConfig, SystemClock};
use omc_engine::Bridge;
use omc_store::{ensure_dir_with_mode, HeartbeatStore, Registry, TeamPaths, DIR_MODE};
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!("omc-bridge {}", env!("CARGO_PKG_VERSION"));
    println!("MCP team bridge - per-worker daemon polling the shared task queue");
    println!();
    println!("USAGE:");
    println!("    omc-bridge --config <path>");
    println!();
    println!("The config file must live under your home directory, inside a");
    println!(".claude/ or .omc/ subtree. The daemon is normally spawned by the");
    println!("team lead inside a tmux session and should not need to be run");
    println!("by hand.");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
}

/// Parse `--config <path>` from argv; `None` for help/version exits.
fn parse_args() -> Result<Option<PathBuf>, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("--help") | Some("-h") | Some("help") => {
            print_help();
            Ok(None)
        }
        Some("--version") | Some("-V") | Some("-v") => {
            println!("omc-bridge {}", env!("CARGO_PKG_VERSION"));
            Ok(None)
        }
        Some("--config") => match args.get(1) {
            Some(path) if args.len() == 2 => Ok(Some(PathBuf::from(path))),
            Some(_) => Err("unexpected extra arguments".to_string()),
            None => Err("--config requires a path".to_string()),
        },
        Some(other) => Err(format!("unexpected argument '{}'", other)),
        None => Err("missing required --config <path>".to_string()),
    }
}

fn init_tracing(paths: &TeamPaths, config: &BridgeConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_dir = paths.logs_dir();
    if ensure_dir_with_mode(&log_dir, DIR_MODE).is_err() {
        // Fall back to stderr-only logging.
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
        return None;
    }

    let file_appender = tracing_appender::rolling::never(
        &log_dir,
        format!("bridge-{}-{}.log", config.team_name, config.worker_name),
    );
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();
    Some(guard)
}

/// Best-effort cleanup on SIGINT/SIGTERM: the worker disappears from the
/// registry and its heartbeat goes away, then we exit cleanly.
fn spawn_signal_handlers(paths: TeamPaths, team: String, worker: String) {
    tokio::spawn(async move {
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGINT handler");
                return;
            }
        };
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };

        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }

        tracing::info!(team, worker, "termination signal received, cleaning up");
        let registry = Registry::new(paths.clone());
        if let Err(e) = registry.unregister_mcp_worker(&team, &worker) {
            tracing::warn!(error = %e, "unregister on signal failed");
        }
        let heartbeats = HeartbeatStore::new(paths);
        if let Err(e) = heartbeats.delete(&team, &worker) {
            tracing::warn!(error = %e, "heartbeat delete on signal failed");
        }
        std::process::exit(0);
    });
}

async fn run() -> i32 {
    let config_path = match parse_args() {
        Ok(Some(path)) => path,
        Ok(None) => return 0,
        Err(message) => {
            eprintln!("error: {}", message);
            eprintln!("Usage: omc-bridge --config <path>");
            return 1;
        }
    };

    let Some(home) = dirs::home_dir() else {
        eprintln!("error: cannot determine the home directory");
        return 1;
    };

    let config = match load_bridge_config(&config_path, &home) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };

    let project_root = match discover_project_root(&config.working_directory) {
        Ok(root) => root,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };

    let paths = TeamPaths::new(home, project_root);
    let _log_guard = init_tracing(&paths, &config);
    spawn_signal_handlers(
        paths.clone(),
        config.team_name.clone(),
        config.worker_name.clone(),
    );

    tracing::info!(
        team = %config.team_name,
        worker = %config.worker_name,
        provider = %config.provider,
        cwd = %config.working_directory.display(),
        "starting bridge"
    );

    let mut bridge = Bridge::new(
        config,
        paths,
        TmuxSessionHost::new(),
        ProcessCliRunner::new(),
        SystemClock,
    );
    match bridge.run().await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "bridge terminated with a fatal error");
            eprintln!("error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    std::process::exit(run().await);
}
