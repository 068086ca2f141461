//! Auth command implementation.

use anyhow::Result;
use clap::Args;

use crate::cli::ConnectionArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct AuthArgs {
    /// Also print the auth token
    #[arg(long)]
    pub show_token: bool,
}

pub async fn run(connection: &ConnectionArgs, args: AuthArgs) -> Result<()> {
    let session = super::connect(connection).await?;

    output::success("Authenticated successfully");
    println!();
    output::field("Auth", &session.auth_endpoint().to_string());
    output::field("Version", &format!("{:?}", session.auth_version()));
    output::field("Service type", session.credentials().service_type());
    if let Some(endpoint) = session.service_endpoint() {
        output::field("Endpoint", &endpoint.to_string());
    }
    if args.show_token
        && let Some(token) = session.token()
    {
        output::field("Token", token.as_str());
    }

    Ok(())
}
