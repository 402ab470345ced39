//! NRPE agent binary.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use nrpe_agent::config::init_logging;
use nrpe_agent::{Agent, AgentConfig, Result};

/// Minimal NRPE agent with a liveness watchdog.
#[derive(Parser, Debug)]
#[command(name = "nrpe-agent", version, about)]
struct Args {
    /// Configuration file (TOML). Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listening port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("nrpe-agent: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_logging(&config.logging)?;
    info!(version = env!("CARGO_PKG_VERSION"), "nrpe-agent starting");

    let agent = Agent::from_config(config);

    // Handle Ctrl+C
    let stop = agent.stop_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            stop.request_stop();
        }
    });

    agent.run().await.map_err(|e| {
        error!("Agent exited: {}", e);
        e
    })
}
