use crate::config::GroupTable;
use crate::fingerprint::fingerprint_entry;
use crate::store::ItemStore;
use crate::types::{FeedEntry, FeedOutcome, FeedSource, IngestReport, Item, Result};
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{error, info};

/// Fetches every configured feed and stores entries whose fingerprint has
/// not been seen before.
pub struct Ingestor<'a> {
    groups: &'a GroupTable,
    source: &'a dyn FeedSource,
}

impl<'a> Ingestor<'a> {
    pub fn new(groups: &'a GroupTable, source: &'a dyn FeedSource) -> Self {
        Self { groups, source }
    }

    /// Walks groups and their feeds in configuration order, fetching every
    /// feed before the store is touched, then inserts into one transaction.
    /// No transaction is open while a fetch is in flight.
    ///
    /// A feed that fails to fetch contributes nothing and is recorded in the
    /// report; only store errors are returned.
    pub async fn run(&self, store: &ItemStore, now: DateTime<Utc>) -> Result<IngestReport> {
        let mut fetched = Vec::new();
        for group in self.groups.groups() {
            for url in &group.feeds {
                let result = self.source.fetch(url).await;
                if let Err(e) = &result {
                    error!("Failed to ingest feed {} ({}): {}", url, group.name, e);
                }
                fetched.push((group.name.as_str(), url.as_str(), result));
            }
        }

        let mut tx = store.pool().begin().await?;
        let mut report = IngestReport::default();

        for (group, url, result) in fetched {
            let result = match result {
                Ok(entries) => {
                    let inserted = Self::store_entries(&mut tx, url, entries, now).await?;
                    info!("Feed {} ({}): {} new items", url, group, inserted);
                    report.inserted += inserted;
                    Ok(inserted)
                }
                Err(e) => Err(e.to_string()),
            };

            report.feeds.push(FeedOutcome {
                group: group.to_string(),
                url: url.to_string(),
                result,
            });
        }

        tx.commit().await?;
        info!(
            "Ingestion committed: {} new items from {} feeds",
            report.inserted,
            report.feeds.len()
        );
        Ok(report)
    }

    async fn store_entries(
        conn: &mut SqliteConnection,
        url: &str,
        entries: Vec<FeedEntry>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut inserted = 0;
        for entry in entries {
            let fingerprint = fingerprint_entry(&entry);
            if ItemStore::lookup_by_id(conn, &fingerprint).await?.is_some() {
                continue;
            }
            let item = Item::from_entry(fingerprint, entry, url, now);
            ItemStore::insert(conn, &item).await?;
            inserted += 1;
        }
        Ok(inserted)
    }
}
