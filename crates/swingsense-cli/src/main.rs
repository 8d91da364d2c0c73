//! `swingsense`: keep a SwingSense sensor connected and record every swing
//! it reports to a numbered CSV file.

mod config;
mod intake;

use std::io::{self, BufReader, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use swingsense_core::session::DEFAULT_BASE;
use swingsense_core::{
    BleTransport, EventReceiver, SessionManager, Supervisor, SupervisorEvent,
};

use crate::config::Config;
use crate::intake::spawn_command_intake;

#[derive(Parser)]
#[command(name = "swingsense")]
#[command(author, version, about = "Recording agent for SwingSense IMU sensors", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Config file (default: <config dir>/swingsense/config.toml)
    #[arg(short, long, env = "SWINGSENSE_CONFIG")]
    config: Option<PathBuf>,

    /// Base filename for recordings; skips the prompt
    #[arg(short, long, env = "SWINGSENSE_BASE")]
    base: Option<String>,

    /// Directory the <base>/ folder is created in
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();
    let cli = Cli::parse();

    // Initialize tracing
    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => {
            if !path.exists() {
                warn!("Config file {} not found, using defaults", path.display());
            }
            Config::load_from(path)
        }
        None => Config::load(),
    };
    let supervisor_config = config.supervisor_config()?;
    let connection_config = config.connection_config()?;

    let interactive = io::stdin().is_terminal() && io::stderr().is_terminal();
    let base = match cli.base {
        Some(base) => base,
        None if interactive => prompt_base()?,
        None => DEFAULT_BASE.to_string(),
    };
    let root = config.output_root(cli.output_dir);
    let sessions = SessionManager::new(&root, base);
    info!("Recordings go to {}", sessions.directory().display());

    let transport = BleTransport::with_config(connection_config)
        .await
        .context("Failed to open Bluetooth adapter")?;
    let mut supervisor = Supervisor::new(Arc::new(transport), sessions, supervisor_config)
        .context("Invalid configuration")?;

    let color = io::stderr().is_terminal();
    if !cli.quiet {
        tokio::spawn(report_sessions(supervisor.subscribe(), color));
    }

    spawn_command_intake(
        supervisor.session_handle(),
        BufReader::new(io::stdin()),
        color,
    )
    .context("Failed to start command intake")?;
    if !cli.quiet {
        eprintln!("Type 'd' and Enter to delete the last recording. Ctrl-C to quit.");
    }

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
        }
        token.cancel();
    });

    supervisor.run(shutdown).await;
    Ok(())
}

fn prompt_base() -> Result<String> {
    let base: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Base filename")
        .default(DEFAULT_BASE.to_string())
        .allow_empty(true)
        .interact_text()
        .context("Failed to read base filename")?;
    Ok(base)
}

/// Print recording starts and stops for the operator.
async fn report_sessions(mut events: EventReceiver, color: bool) {
    use tokio::sync::broadcast::error::RecvError;

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };
        let line = match event {
            SupervisorEvent::SessionOpened { path, .. } => {
                format!("● Recording {}", path.display())
            }
            SupervisorEvent::SessionClosed {
                path,
                lines,
                inferred,
                ..
            } => {
                let suffix = if inferred { ", link lost" } else { "" };
                format!("■ Saved {} ({} samples{})", path.display(), lines, suffix)
            }
            _ => continue,
        };
        if color {
            eprintln!("{}", line.bold());
        } else {
            eprintln!("{}", line);
        }
    }
}
