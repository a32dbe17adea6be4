use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry as reported by a feed, before it is given an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Provider-assigned id (`<guid>` / `<id>`), empty when the feed omits it.
    pub identifier: String,
    pub link: String,
    pub title: String,
    pub authors: String,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("Feed size exceeds limit: {size_mb}MB")]
    TooLarge { size_mb: usize },

    #[error("Invalid feed URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipients {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
}

impl Recipients {
    pub fn is_empty(&self) -> bool {
        self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty()
    }
}

/// A fully rendered message ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub recipients: Recipients,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Transport(String),
}

// Both collaborators are awaited one call at a time by the cycle; neither is
// expected to be re-entered while a call is in flight.

/// Retrieves a feed document and parses it into entries.
///
/// A document that cannot be parsed yields `Ok(vec![])` (logged by the
/// implementation). Only a failure to retrieve the document is an `Err`.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>, FeedError>;
}

/// Sends one composed message. Empty `to` is accepted; it is the caller's job
/// to make sure at least one of to/cc/bcc has an address.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryError>;
}
