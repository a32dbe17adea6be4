//! Selects undelivered items, groups them by owning feed group, caps each
//! group's batch and renders the message for it.

use crate::config::{DigestOptions, GroupTable};
use crate::digest::{DigestRenderer, RenderedDigest};
use crate::store::ItemStore;
use crate::types::{Item, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

/// One group's share of a cycle: the capped batch and its rendered message.
#[derive(Debug, Clone)]
pub struct GroupBatch {
    pub group: String,
    pub items: Vec<Item>,
    /// Selected items left for a later cycle because of the batch cap.
    pub deferred: usize,
    pub digest: RenderedDigest,
}

impl GroupBatch {
    pub fn item_ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.id.clone()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DispatchPlan {
    pub batches: Vec<GroupBatch>,
}

impl DispatchPlan {
    pub fn total_items(&self) -> usize {
        self.batches.iter().map(|b| b.items.len()).sum()
    }

    pub fn batch(&self, group: &str) -> Option<&GroupBatch> {
        self.batches.iter().find(|b| b.group == group)
    }
}

pub struct DispatchPlanner<'a> {
    groups: &'a GroupTable,
    options: &'a DigestOptions,
    renderer: DigestRenderer,
}

impl<'a> DispatchPlanner<'a> {
    pub fn new(groups: &'a GroupTable, options: &'a DigestOptions) -> Self {
        Self {
            groups,
            options,
            renderer: DigestRenderer::new(options.subject_prefix.clone()),
        }
    }

    pub async fn plan(&self, store: &ItemStore, now: DateTime<Utc>) -> Result<DispatchPlan> {
        let cutoff = now - Duration::days(i64::from(self.options.lookback_days));
        let unsent = store.select_unsent_since(cutoff).await?;
        Ok(self.plan_items(unsent, now))
    }

    /// Builds the plan from an already ordered selection.
    ///
    /// Every configured group gets a batch, even an empty one, followed by any
    /// other group that received items (in practice the default group).
    pub fn plan_items(&self, unsent: Vec<Item>, now: DateTime<Utc>) -> DispatchPlan {
        let mut grouped: HashMap<String, Vec<Item>> = HashMap::new();
        let mut order: Vec<String> = self.groups.names().map(str::to_string).collect();

        for item in unsent {
            let group = self.groups.group_for_source(&item.source);
            if !order.iter().any(|g| g == group) {
                order.push(group.to_string());
            }
            grouped.entry(group.to_string()).or_default().push(item);
        }

        let batches: Vec<GroupBatch> = order
            .into_iter()
            .map(|group| {
                let mut items = grouped.remove(&group).unwrap_or_default();
                let deferred = items.len().saturating_sub(self.options.batch_limit);
                items.truncate(self.options.batch_limit);
                if deferred > 0 {
                    debug!("Group {}: {} items deferred by batch cap", group, deferred);
                }

                let digest = self.renderer.render(&group, &items, now);
                GroupBatch {
                    group,
                    items,
                    deferred,
                    digest,
                }
            })
            .collect();

        let plan = DispatchPlan { batches };
        info!(
            "Planned {} groups with {} items",
            plan.batches.len(),
            plan.total_items()
        );
        plan
    }
}
