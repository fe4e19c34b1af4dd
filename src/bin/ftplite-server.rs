//! ftplite-server: serve one directory to one client.
//!
//! Features:
//! - Control connection on a configurable IPv4 address and port
//! - Per-command ephemeral data connections
//! - Configuration via CLI arguments or TOML file

use ftplite::{Server, ServerConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = ServerConfig::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if !config.root.is_dir() {
        return Err(format!("Root path is not a directory: {}", config.root.display()).into());
    }

    info!(
        host = %config.host,
        port = config.port,
        root = %config.root.display(),
        buffer_size = config.buffer_size,
        program_name = %config.program_name,
        "Starting ftplite server"
    );

    let server = Server::bind(config)?;
    if let Err(e) = server.run() {
        error!(error = %e, "Session ended with an error");
        return Err(e.into());
    }
    Ok(())
}
