//! Push notifications for freshly fetched quotes
//!
//! Each successful fetch is posted to an ntfy-style topic. Delivery is best
//! effort: it runs on its own task with its own timeout, and failures are
//! only logged.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::data::{Quote, SourceId};

/// Default topic receiving quote notifications
pub const DEFAULT_NOTIFY_URL: &str = "https://ntfy.sh/bang-gia-0909";

/// Deadline for a single notification request
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur when posting a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// Posts quotes to a notification topic
#[derive(Debug, Clone)]
pub struct Notifier {
    http_client: Client,
    /// Topic URL, `None` when notifications are disabled
    endpoint: Option<String>,
}

impl Notifier {
    /// Creates a notifier posting to the given topic URL
    pub fn new(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(NOTIFY_TIMEOUT).build()?;

        Ok(Self {
            http_client,
            endpoint: Some(endpoint.into()),
        })
    }

    /// Creates a notifier that never sends anything
    pub fn disabled() -> Self {
        Self {
            http_client: Client::new(),
            endpoint: None,
        }
    }

    /// Returns whether this notifier sends anything
    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Sends the notification on a background task and returns immediately
    pub fn notify(&self, source: SourceId, quote: &Quote) {
        if !self.is_enabled() {
            return;
        }

        let notifier = self.clone();
        let quote = quote.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send(source, &quote).await {
                warn!(%source, error = %e, "failed to send notification");
            }
        });
    }

    /// Posts a quote and waits for the topic to accept it
    pub async fn send(&self, source: SourceId, quote: &Quote) -> Result<(), NotifyError> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(());
        };

        self.http_client
            .post(endpoint)
            .query(&[("Title", title(source))])
            .json(quote)
            .send()
            .await?
            .error_for_status()?;

        debug!(%source, "notification sent");
        Ok(())
    }
}

/// Notification title for a source
fn title(source: SourceId) -> &'static str {
    match source {
        SourceId::Gold => "Giá vàng 999 Mi Hồng",
        SourceId::Silver => "Giá bạc hiện tại",
    }
}
