//! CLI argument definitions.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use nimbus::{Credentials, SessionOptions, TransportOptions};

use crate::commands::{auth::AuthArgs, regions::RegionsArgs, request::RequestArgs};

/// Cloud API CLI tool for compute and object-storage endpoints.
#[derive(Parser, Debug)]
#[command(name = "nimbus")]
#[command(author, version = env!("NIMBUS_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate and show the negotiated service endpoint
    Auth(AuthArgs),

    /// List regions and the services offered in each (v2 auth only)
    Regions(RegionsArgs),

    /// Send a request to the service endpoint
    Request(RequestArgs),
}

/// Account and connection settings shared by every command.
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Auth endpoint URL (a path ending in v2.0 selects v2 auth)
    #[arg(long, env = "NIMBUS_AUTH_URL", global = true)]
    pub auth_url: Option<String>,

    /// Account username
    #[arg(long, env = "NIMBUS_USERNAME", global = true)]
    pub username: Option<String>,

    /// API key or password
    #[arg(long, env = "NIMBUS_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Tenant name (v2 auth)
    #[arg(long, env = "NIMBUS_TENANT", global = true)]
    pub tenant: Option<String>,

    /// Auth method: password or apikey (v2 auth)
    #[arg(long, env = "NIMBUS_AUTH_METHOD", global = true)]
    pub auth_method: Option<String>,

    /// Service type to use from the catalog
    #[arg(long, env = "NIMBUS_SERVICE_TYPE", global = true)]
    pub service_type: Option<String>,

    /// Service name to use from the catalog
    #[arg(long, env = "NIMBUS_SERVICE_NAME", global = true)]
    pub service_name: Option<String>,

    /// Region to use from the catalog
    #[arg(long, env = "NIMBUS_REGION", global = true)]
    pub region: Option<String>,

    /// Catalog URL field to use (publicURL, internalURL, ...)
    #[arg(long, env = "NIMBUS_ENDPOINT_TYPE", global = true)]
    pub endpoint_type: Option<String>,

    /// HTTP proxy as host:port
    #[arg(long, env = "NIMBUS_PROXY", global = true)]
    pub proxy: Option<String>,

    /// Fail instead of re-authenticating when the token expires
    #[arg(long, global = true)]
    pub no_retry_auth: bool,

    /// Give up after this many re-authentications of one request
    #[arg(long, global = true)]
    pub max_reauth: Option<u32>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 60, global = true)]
    pub timeout: u64,

    /// Accept invalid TLS certificates
    #[arg(long, env = "NIMBUS_INSECURE", global = true)]
    pub insecure: bool,

    /// Trace every HTTP exchange (shown with -vv)
    #[arg(long, env = "NIMBUS_DEBUG", global = true)]
    pub debug: bool,
}

impl ConnectionArgs {
    /// Build credentials; missing account settings are reported by the library.
    pub fn credentials(&self) -> Result<Credentials> {
        let mut builder = Credentials::builder().retry_auth(!self.no_retry_auth);

        if let Some(v) = &self.auth_url {
            builder = builder.auth_url(v);
        }
        if let Some(v) = &self.username {
            builder = builder.username(v);
        }
        if let Some(v) = &self.api_key {
            builder = builder.api_key(v);
        }
        if let Some(v) = &self.tenant {
            builder = builder.tenant(v);
        }
        if let Some(v) = &self.auth_method {
            builder = builder.auth_method(v);
        }
        if let Some(v) = &self.service_type {
            builder = builder.service_type(v);
        }
        if let Some(v) = &self.service_name {
            builder = builder.service_name(v);
        }
        if let Some(v) = &self.region {
            builder = builder.region(v);
        }
        if let Some(v) = &self.endpoint_type {
            builder = builder.endpoint_type(v);
        }
        if let Some(proxy) = &self.proxy {
            let (host, port) = parse_proxy(proxy)?;
            builder = builder.proxy(host, port);
        }

        builder.build().context("Invalid configuration")
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            transport: TransportOptions {
                timeout: Duration::from_secs(self.timeout),
                debug: self.debug,
                accept_invalid_certs: self.insecure,
                ..TransportOptions::default()
            },
            max_reauth_attempts: self.max_reauth,
        }
    }
}

fn parse_proxy(value: &str) -> Result<(String, u16)> {
    let (host, port) = value
        .rsplit_once(':')
        .context("Proxy must be given as host:port")?;
    let port = port.parse().context("Invalid proxy port")?;
    Ok((host.to_string(), port))
}
