//! nimbus - CLI tool for compute and object-storage cloud APIs.
//!
//! A thin wrapper over the `nimbus` library: flags and `NIMBUS_*`
//! environment variables become credentials, the session authenticates,
//! and commands run against the negotiated service endpoint.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json_logs, cli.connection.debug);

    commands::handle(cli.connection, cli.command).await
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing(verbosity: u8, json: bool, wire: bool) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let directives = if wire {
        format!("{},nimbus::wire=debug", level)
    } else {
        level.to_string()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(wire))
            .init();
    }
}
