//! Request command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use nimbus::{Method, RequestOptions};

use crate::cli::ConnectionArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, DELETE, HEAD, ...)
    pub method: String,

    /// Path relative to the service endpoint (e.g., /servers/detail)
    pub path: String,

    /// Request body, or @FILE to read it from a file
    #[arg(short, long)]
    pub data: Option<String>,

    /// Extra header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Print the body as received instead of pretty-printing JSON
    #[arg(long)]
    pub raw: bool,

    /// Print response headers
    #[arg(short, long)]
    pub include: bool,
}

pub async fn run(connection: &ConnectionArgs, args: RequestArgs) -> Result<()> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .context("Invalid HTTP method")?;

    let mut options = RequestOptions::new();
    for header in &args.headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("Header '{}' is not in Name: value form", header))?;
        options = options
            .try_header(name.trim(), value.trim())
            .context("Invalid header")?;
    }
    if let Some(data) = &args.data {
        options = options.body(read_body(data)?);
    }

    let mut session = super::connect(connection).await?;
    let response = session
        .request(method, &args.path, options)
        .await
        .context("Request failed")?;

    eprintln!("{}", response.status().to_string().dimmed());
    if args.include {
        for (name, value) in response.headers() {
            output::field(name.as_str(), value.to_str().unwrap_or("<binary>"));
        }
        println!();
    }

    if response.bytes().is_empty() {
        return Ok(());
    }

    match response.json::<serde_json::Value>() {
        Ok(value) if !args.raw => output::json_pretty(&value),
        _ => {
            println!("{}", response.text());
            Ok(())
        }
    }
}

fn read_body(data: &str) -> Result<Vec<u8>> {
    match data.strip_prefix('@') {
        Some(path) => std::fs::read(path).with_context(|| format!("Failed to read {}", path)),
        None => Ok(data.as_bytes().to_vec()),
    }
}
