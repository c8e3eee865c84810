//! webtty server
//!
//! Serves PTY-backed terminals to clients over newline-delimited JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use webtty::app::{self, Config};
use webtty::pty::UnixPtyProvider;
use webtty::server::{listener, ServerRegistry, SystemPaste};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "webtty", version, about = "Terminals in the browser")]
struct CliArgs {
    /// Path to a JSON configuration file (default: ~/.webtty/config.json)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Keep a client's terminals alive across reconnects
    #[arg(long)]
    resume: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    app::init_logging();

    match run(CliArgs::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.resume {
        config.resume = true;
    }
    tracing::info!(shell = %config.shell, term = %config.term_name, resume = config.resume, "starting webtty");

    let registry = ServerRegistry::new(
        config.server_options(),
        Arc::new(UnixPtyProvider),
        Arc::new(SystemPaste),
    );
    let tcp = tokio::net::TcpListener::bind(config.listen_addr()).await?;

    tokio::select! {
        result = listener::serve(tcp, registry.clone()) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted, shutting down"),
    }
    registry.shutdown();
    Ok(())
}
