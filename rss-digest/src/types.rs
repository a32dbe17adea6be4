use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use interfaces::defs::{
    DeliveryError, FeedEntry, FeedError, FeedSource, MailTransport, OutgoingMail, Recipients,
};

/// Name of the implicit group that collects items whose source feed is no
/// longer owned by any configured group.
pub const DEFAULT_GROUP: &str = "Default";

/// A persisted feed item. `id` is the fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub authors: String,
    pub summary: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
    pub sent: bool,
    pub created_at: DateTime<Utc>,
    pub inserted_at: DateTime<Utc>,
}

impl Item {
    /// Builds the row for a freshly fetched entry. The caller supplies the
    /// fingerprint so that identity stays in one place.
    pub fn from_entry(fingerprint: String, entry: FeedEntry, source: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: fingerprint,
            title: entry.title,
            authors: entry.authors,
            summary: entry.summary,
            link: entry.link,
            published_at: entry.published_at,
            source: source.to_string(),
            sent: false,
            created_at: now,
            inserted_at: now,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "RSS-Digest/1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_delay_seconds: 2,
            max_feed_size_mb: 10,
            max_redirects: 5,
        }
    }
}

/// Counts returned by one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleResult {
    pub ingested: usize,
    pub sent: usize,
    pub groups: usize,
}

/// Result of fetching a single feed URL during ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedOutcome {
    pub group: String,
    pub url: String,
    pub result: std::result::Result<usize, String>,
}

impl FeedOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// What happened to one group's message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    /// The group's recipient entry is present but all three lists are empty;
    /// nothing was handed to the transport.
    NoRecipients,
    Failed(String),
}

/// Result of delivering one group's message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupOutcome {
    pub group: String,
    pub items: usize,
    pub status: DeliveryStatus,
}

impl GroupOutcome {
    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Sent
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub feeds: Vec<FeedOutcome>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryReport {
    pub sent: usize,
    pub groups: Vec<GroupOutcome>,
}

/// Everything a cycle did, for callers that want more than the counts.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub result: CycleResult,
    pub feeds: Vec<FeedOutcome>,
    pub groups: Vec<GroupOutcome>,
}

impl CycleReport {
    pub fn failed_feeds(&self) -> impl Iterator<Item = &FeedOutcome> {
        self.feeds.iter().filter(|f| !f.is_success())
    }

    pub fn failed_groups(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.groups
            .iter()
            .filter(|g| matches!(g.status, DeliveryStatus::Failed(_)))
    }

    pub fn skipped_groups(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.groups
            .iter()
            .filter(|g| g.status == DeliveryStatus::NoRecipients)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{kind} file not found: {path}")]
    FileNotFound { kind: &'static str, path: String },

    #[error("{kind} file {path} is not valid JSON: {source}")]
    Json {
        kind: &'static str,
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Invalid(String),

    #[error("Group '{group}' has an empty feed URL entry")]
    EmptyUrl { group: String },

    #[error("No recipient configuration for group '{group}'")]
    MissingRecipients { group: String },

    #[error("Environment variable {name} is invalid: {value}")]
    BadEnv { name: &'static str, value: String },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that abort a whole cycle. Per-feed and per-group failures never
/// surface here; they are recorded in the cycle report instead.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DigestError>;
