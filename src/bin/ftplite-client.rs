//! ftplite-client: interactive client for an ftplite server.

use std::io::{self, Write};

use ftplite::client::shell::{self, PROMPT};
use ftplite::{Client, ClientConfig};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::load()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    // Ctrl-C never exits; it redraws the prompt only while waiting for input
    ctrlc::set_handler(|| {
        if !shell::at_prompt() {
            return;
        }
        let mut stdout = io::stdout();
        let _ = write!(stdout, "\n{}", PROMPT);
        let _ = stdout.flush();
    })?;

    let mut client = match Client::connect(config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}. Make sure the server is online.", e);
            std::process::exit(1);
        }
    };
    info!(server = %client.server(), "Session started");

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    shell::run(&mut client, &mut input, &mut output)?;

    debug!("Client exiting");
    Ok(())
}
