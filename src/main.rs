//! metalquote - Serve current gold and silver quotes over HTTP
//!
//! Runs the quote API by default, or fetches quotes once with `fetch`.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use metalquote::cli::{AppConfig, Cli, Mode};
use metalquote::data::SourceId;
use metalquote::pipeline::QuoteService;
use metalquote::server;

/// Initialize tracing, honouring `RUST_LOG` on top of the default directive
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("metalquote=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Fetches the given quotes concurrently and prints them as pretty JSON
async fn fetch_once(service: &QuoteService, sources: &[SourceId]) -> anyhow::Result<()> {
    let lookups = sources
        .iter()
        .map(|source| async move { (*source, service.get_quote(*source).await) });

    let mut failed = false;
    for (source, result) in futures::future::join_all(lookups).await {
        match result {
            Ok(quote) => println!("{}", serde_json::to_string_pretty(&quote)?),
            Err(e) => {
                eprintln!("{} ({}): {}", source, source.host(), e);
                failed = true;
            }
        }
    }

    if failed {
        anyhow::bail!("one or more sources failed");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::from_cli(&cli)?;

    init_tracing();

    let service = config
        .build_service()
        .context("failed to build HTTP clients")?;

    match &config.mode {
        Mode::Serve => {
            info!(
                "starting metalquote v{} (cache ttl {:?}, timeout {:?})",
                env!("CARGO_PKG_VERSION"),
                config.cache_ttl,
                config.timeout
            );
            server::serve(config.bind, Arc::new(service)).await
        }
        Mode::Fetch(sources) => fetch_once(&service, sources).await,
    }
}
