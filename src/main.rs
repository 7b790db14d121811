use std::env;
use std::process;

use mdmath_server::server::{self, ExitReason};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse arguments
    let args: Vec<String> = env::args().collect();
    let verbose = args.iter().any(|arg| arg == "--verbose" || arg == "-v");
    let debug = args.iter().any(|arg| arg == "--debug");
    let version = args.iter().any(|arg| arg == "--version" || arg == "-V");

    if version {
        eprintln!("mdmath-server version {}", env!("CARGO_PKG_VERSION"));
        process::exit(0);
    }

    let log_level = if debug {
        tracing::Level::DEBUG
    } else if verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    // Stdout carries the wire protocol; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting mdmath-server version {}", env!("CARGO_PKG_VERSION"));

    match server::run().await {
        Ok(ExitReason::StreamClosed) => {
            tracing::info!("Server shutting down normally");
            Ok(())
        }
        Ok(ExitReason::Signal(signal)) => {
            tracing::info!("Server shutting down on signal {}", signal);
            process::exit(128 + signal);
        }
        Err(e) => {
            tracing::error!("Server error: {}", e);
            Err(e.into())
        }
    }
}
