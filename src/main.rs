//! billrelay - Minimal JSON relay in front of the Anthropic Messages API
//!
//! Forwards a caller's payload to the upstream messages endpoint with either
//! the caller's key or a server-side key, and relays the answer back.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use billrelay::config::Config;
use billrelay::proxy::run_server;

#[derive(Parser)]
#[command(name = "billrelay")]
#[command(about = "Minimal JSON relay in front of the Anthropic Messages API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Optional path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration and print a redacted summary
    Check {
        /// Optional path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "billrelay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            tracing::info!(config = ?config, "Loading configuration");
            let (mut config, key_source) = Config::load(config.as_deref())?;
            tracing::info!(key_source = %key_source, "Resolved upstream key");

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }

            run_server(config).await
        }

        Commands::Check { config } => {
            let (config, key_source) = Config::load(config.as_deref())?;

            println!("Configuration OK");
            println!("  listen:        {}", config.server.listen);
            println!("  body limit:    {} bytes", config.server.body_limit_bytes);
            println!("  upstream:      {}", config.upstream.url);
            println!("  api version:   {}", config.upstream.api_version);
            println!("  key source:    {}", key_source);
            if config.upstream.key_prefix.is_empty() {
                println!("  key prefix:    (not checked)");
            } else {
                println!("  key prefix:    {}", config.upstream.key_prefix);
            }
            if config.cors.allows_any_origin() {
                println!("  cors origins:  * (any)");
            } else {
                println!("  cors origins:  {}", config.cors.allowed_origins.join(", "));
            }
            Ok(())
        }
    }
}
