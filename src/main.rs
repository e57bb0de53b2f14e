//! inkpost — a self-hosted multi-user blog server.
//!
//! Visitors read posts; registered users sign up, log in, write, like, and
//! comment. Sessions are stateless signed cookies — no server-side session
//! store. See `config.rs` for the knobs.

mod auth;
mod config;
mod server;
mod session;
mod store;
mod token;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "inkpost", version, about = "Self-hosted multi-user blog server")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "inkpost.toml")]
    config: PathBuf,

    /// Override the bind host from the config file.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port from the config file.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkpost=info,tower_http=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = config::Config::load(&cli.config)?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    server::run(config).await
}
