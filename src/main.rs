//! line-echo: a line-delimited TCP echo server
//!
//! Clients send newline-terminated lines and get each one back with an
//! `Echo: ` prefix; `quit` ends the session.
//!
//! Features:
//! - Demand-driven reads: bytes leave the kernel only when a line is wanted
//! - Pipelined lines answered in order without extra reads
//! - Bounded line length and connection count
//! - Configuration via CLI arguments or TOML file

mod config;
mod protocols;
mod runtime;
mod server;

use config::Config;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        max_line_length = config.max_line_length,
        max_connections = config.max_connections,
        workers = ?config.workers,
        "Starting line-echo server"
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(workers) = config.workers {
        builder.worker_threads(workers);
    }
    let runtime = builder.enable_all().build()?;

    runtime.block_on(Server::new(config).run())?;
    Ok(())
}
