#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rss_digest::{
    DeliveryError, DigestCycle, DigestOptions, FeedEntry, FeedError, FeedSource, Group, GroupTable,
    ItemStore, MailTransport, OutgoingMail, RecipientResolver, Recipients, Settings,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub async fn memory_store() -> ItemStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    ItemStore::from_pool(pool).await.expect("migrations")
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 8, 30, 0).unwrap()
}

pub fn entry(id: &str, title: &str, day: u32) -> FeedEntry {
    FeedEntry {
        identifier: id.to_string(),
        link: format!("https://example.org/{}", id),
        title: title.to_string(),
        authors: "Ada Lovelace".to_string(),
        summary: format!("Summary of {}", title),
        published_at: Some(Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap()),
    }
}

pub fn entries(prefix: &str, count: usize) -> Vec<FeedEntry> {
    (0..count)
        .map(|i| FeedEntry {
            published_at: Some(base_time() - Duration::hours(i as i64 + 1)),
            ..entry(&format!("{}-{}", prefix, i), &format!("{} paper {}", prefix, i), 1)
        })
        .collect()
}

/// Serves canned entries per URL and counts fetches.
#[derive(Default)]
pub struct FakeFeedSource {
    feeds: Mutex<HashMap<String, Vec<FeedEntry>>>,
    failing: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl FakeFeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, entries: Vec<FeedEntry>) {
        self.feeds.lock().unwrap().insert(url.to_string(), entries);
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for FakeFeedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(url) {
            return Err(FeedError::Status {
                status: 503,
                reason: "Service Unavailable".to_string(),
            });
        }
        Ok(self.feeds.lock().unwrap().get(url).cloned().unwrap_or_default())
    }
}

/// Records every message; subjects containing a failing marker are rejected.
#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    failing: Mutex<Vec<String>>,
}

impl FakeMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects messages for `group`.
    pub fn fail_group(&self, group: &str) {
        self.failing.lock().unwrap().push(format!("[{}]", group));
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, group: &str) -> Vec<OutgoingMail> {
        let marker = format!("[{}]", group);
        self.sent()
            .into_iter()
            .filter(|m| m.subject.contains(&marker))
            .collect()
    }
}

#[async_trait]
impl MailTransport for FakeMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryError> {
        if self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|marker| mail.subject.contains(marker.as_str()))
        {
            return Err(DeliveryError::Transport("connection refused".to_string()));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

pub fn group(name: &str, feeds: &[&str]) -> Group {
    Group {
        name: name.to_string(),
        feeds: feeds.iter().map(|f| f.to_string()).collect(),
    }
}

pub fn recipients_for(groups: &[&str]) -> RecipientResolver {
    RecipientResolver::new(
        groups
            .iter()
            .map(|g| {
                (
                    g.to_string(),
                    Recipients {
                        to: vec![format!("{}@example.org", g)],
                        cc: vec![],
                        bcc: vec![],
                    },
                )
            })
            .collect(),
    )
}

pub fn settings(groups: Vec<Group>) -> Settings {
    let names: Vec<String> = groups.iter().map(|g| g.name.clone()).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    Settings::new(
        GroupTable::new(groups),
        recipients_for(&names),
        DigestOptions::default(),
    )
    .expect("valid settings")
}

pub struct Harness {
    pub cycle: DigestCycle,
    pub source: Arc<FakeFeedSource>,
    pub mailer: Arc<FakeMailer>,
}

impl Harness {
    pub async fn new(settings: Settings) -> Self {
        let source = Arc::new(FakeFeedSource::new());
        let mailer = Arc::new(FakeMailer::new());
        let cycle = DigestCycle::new(
            Arc::new(settings),
            memory_store().await,
            source.clone(),
            mailer.clone(),
        );
        Self {
            cycle,
            source,
            mailer,
        }
    }

    pub fn store(&self) -> &ItemStore {
        self.cycle.store()
    }
}
