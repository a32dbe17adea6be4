use crate::config::Settings;
use crate::delivery::DeliveryExecutor;
use crate::ingest::Ingestor;
use crate::planner::DispatchPlanner;
use crate::store::ItemStore;
use crate::types::{CycleReport, CycleResult, FeedSource, MailTransport, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Runs ingest then dispatch against one store.
///
/// Not reentrant: callers must make sure at most one cycle runs against a
/// store at a time. Running cycles back to back is always safe.
pub struct DigestCycle {
    settings: Arc<Settings>,
    store: ItemStore,
    source: Arc<dyn FeedSource>,
    transport: Arc<dyn MailTransport>,
}

impl DigestCycle {
    pub fn new(
        settings: Arc<Settings>,
        store: ItemStore,
        source: Arc<dyn FeedSource>,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        Self {
            settings,
            store,
            source,
            transport,
        }
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    pub async fn run_once(&self) -> Result<CycleReport> {
        self.run_at(Utc::now()).await
    }

    /// One full cycle as of `now`. Ingestion commits before dispatch starts,
    /// so a dispatch failure never loses newly stored items.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let settings = &self.settings;
        settings.validate()?;

        let ingest = Ingestor::new(&settings.groups, self.source.as_ref())
            .run(&self.store, now)
            .await?;

        let plan = DispatchPlanner::new(&settings.groups, &settings.options)
            .plan(&self.store, now)
            .await?;

        let delivery = DeliveryExecutor::new(&settings.recipients, self.transport.as_ref())
            .execute(&self.store, &plan)
            .await?;

        let report = CycleReport {
            result: CycleResult {
                ingested: ingest.inserted,
                sent: delivery.sent,
                groups: delivery.groups.len(),
            },
            feeds: ingest.feeds,
            groups: delivery.groups,
        };

        let failed_feeds = report.failed_feeds().count();
        let failed_groups = report.failed_groups().count();
        if failed_feeds > 0 || failed_groups > 0 {
            warn!(
                "Cycle finished with {} failed feeds and {} failed groups",
                failed_feeds, failed_groups
            );
        }
        info!(
            "Ingested {} new items; sent {} papers across {} groups.",
            report.result.ingested, report.result.sent, report.result.groups
        );
        Ok(report)
    }
}
