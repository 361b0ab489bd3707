//! Command-line interface parsing for metalquote
//!
//! This module handles parsing of CLI arguments (and their environment
//! variable counterparts) using clap, and turns them into the `AppConfig`
//! the binary starts from.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::cache::QuoteCache;
use crate::data::gold::{GOLD_API_URL, GOLD_PAGE_URL};
use crate::data::silver::SILVER_PAGE_URL;
use crate::data::{GoldClient, SilverClient, SourceId};
use crate::notify::{Notifier, DEFAULT_NOTIFY_URL};
use crate::pipeline::QuoteService;

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// A zero request timeout would fail every fetch
    #[error("Invalid timeout: must be at least 1 second")]
    InvalidTimeout,
}

/// metalquote - Serve current gold and silver quotes over HTTP
#[derive(Parser, Debug)]
#[command(name = "metalquote")]
#[command(about = "Serve current gold (mihong.vn) and silver (giabac.vn) quotes over HTTP")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Address the HTTP server listens on
    #[arg(long, env = "METALQUOTE_BIND", default_value = "0.0.0.0:3000", global = true)]
    pub bind: SocketAddr,

    /// Seconds a fetched quote is served from cache
    #[arg(long, env = "METALQUOTE_CACHE_TTL_SECS", default_value_t = 60, global = true)]
    pub cache_ttl_secs: u64,

    /// Deadline in seconds for each upstream request
    #[arg(long, env = "METALQUOTE_TIMEOUT_SECS", default_value_t = 10, global = true)]
    pub timeout_secs: u64,

    /// Topic URL receiving a notification for every fresh quote
    #[arg(long, env = "METALQUOTE_NOTIFY_URL", default_value = DEFAULT_NOTIFY_URL, global = true)]
    pub notify_url: String,

    /// Do not send notifications
    #[arg(long, global = true)]
    pub no_notify: bool,

    #[arg(
        long,
        env = "METALQUOTE_GOLD_PAGE_URL",
        default_value = GOLD_PAGE_URL,
        hide = true,
        global = true
    )]
    pub gold_page_url: String,

    #[arg(
        long,
        env = "METALQUOTE_GOLD_API_URL",
        default_value = GOLD_API_URL,
        hide = true,
        global = true
    )]
    pub gold_api_url: String,

    #[arg(
        long,
        env = "METALQUOTE_SILVER_PAGE_URL",
        default_value = SILVER_PAGE_URL,
        hide = true,
        global = true
    )]
    pub silver_page_url: String,
}

/// Subcommands of the binary
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Fetch quotes once and print them as JSON
    ///
    /// Examples:
    ///   metalquote fetch          # Both sources
    ///   metalquote fetch gold     # Gold only
    Fetch {
        /// Source to fetch; both when omitted
        #[arg(value_enum)]
        source: Option<SourceId>,
    },
}

/// What the binary should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Serve the HTTP API
    Serve,
    /// Print the quotes of these sources and exit
    Fetch(Vec<SourceId>),
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: Mode,
    pub bind: SocketAddr,
    pub cache_ttl: Duration,
    pub timeout: Duration,
    /// Notification topic, `None` when notifications are off or in fetch mode
    pub notify_url: Option<String>,
    pub gold_page_url: String,
    pub gold_api_url: String,
    pub silver_page_url: String,
}

impl AppConfig {
    /// Creates an AppConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(AppConfig)` with appropriate settings
    /// * `Err(CliError)` if a setting is out of range
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.timeout_secs == 0 {
            return Err(CliError::InvalidTimeout);
        }

        let mode = match &cli.command {
            None | Some(Command::Serve) => Mode::Serve,
            Some(Command::Fetch { source: Some(source) }) => Mode::Fetch(vec![*source]),
            Some(Command::Fetch { source: None }) => {
                Mode::Fetch(vec![SourceId::Gold, SourceId::Silver])
            }
        };

        let notify_url =
            (!cli.no_notify && mode == Mode::Serve).then(|| cli.notify_url.clone());

        Ok(AppConfig {
            mode,
            bind: cli.bind,
            cache_ttl: Duration::from_secs(cli.cache_ttl_secs),
            timeout: Duration::from_secs(cli.timeout_secs),
            notify_url,
            gold_page_url: cli.gold_page_url.clone(),
            gold_api_url: cli.gold_api_url.clone(),
            silver_page_url: cli.silver_page_url.clone(),
        })
    }

    /// Builds the quote service described by this configuration
    pub fn build_service(&self) -> Result<QuoteService, reqwest::Error> {
        let gold = GoldClient::with_urls(self.timeout, &self.gold_page_url, &self.gold_api_url)?;
        let silver = SilverClient::with_url(self.timeout, &self.silver_page_url)?;
        let notifier = match &self.notify_url {
            Some(url) => Notifier::new(url)?,
            None => Notifier::disabled(),
        };

        Ok(QuoteService::from_sources(
            Arc::new(gold),
            Arc::new(silver),
            Arc::new(QuoteCache::new(self.cache_ttl)),
            notifier,
        ))
    }
}
