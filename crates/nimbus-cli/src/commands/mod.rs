//! Subcommand implementations.

pub mod auth;
pub mod regions;
pub mod request;

use anyhow::{Context, Result};
use tracing::debug;

use nimbus::Session;

use crate::cli::{Commands, ConnectionArgs};

pub async fn handle(connection: ConnectionArgs, command: Commands) -> Result<()> {
    match command {
        Commands::Auth(args) => auth::run(&connection, args).await,
        Commands::Regions(args) => regions::run(&connection, args).await,
        Commands::Request(args) => request::run(&connection, args).await,
    }
}

/// Build a session from the connection settings and authenticate it.
async fn connect(connection: &ConnectionArgs) -> Result<Session> {
    let credentials = connection.credentials()?;
    debug!(auth = %credentials.auth_endpoint(), user = credentials.username(), "Connecting");
    Session::connect(credentials, connection.session_options())
        .await
        .context("Failed to authenticate")
}
