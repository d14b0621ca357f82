use clap::Parser;
use serp_relay::config::{load_config, RelayConfig};
use serp_relay::daemon;
use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// The SERP relay daemon.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// UDP port to listen on (overrides the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Path to a JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "serp_relay=debug"
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let filter = match &args.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &args.config {
        Some(path) => load_config(path),
        None => RelayConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }

    // Supervision (daemonization, signals, PID files) is the wrapper's
    // business; the flag is only ever set by embedders.
    let shutdown = Arc::new(AtomicBool::new(false));
    daemon::run(config, shutdown)?;
    Ok(())
}
