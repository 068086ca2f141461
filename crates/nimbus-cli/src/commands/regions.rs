//! Regions command implementation.

use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::cli::ConnectionArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct RegionsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(connection: &ConnectionArgs, args: RegionsArgs) -> Result<()> {
    let session = super::connect(connection).await?;
    let regions = session.regions();

    if args.json {
        return output::json_pretty(&json!(regions));
    }

    if regions.is_empty() {
        output::warning("The auth endpoint did not return a service catalog");
        return Ok(());
    }

    for (region, services) in regions {
        output::field(region, &services.join(", "));
    }

    Ok(())
}
