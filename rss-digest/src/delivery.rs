use crate::planner::DispatchPlan;
use crate::recipients::RecipientResolver;
use crate::store::ItemStore;
use crate::types::{
    DeliveryReport, DeliveryStatus, GroupOutcome, MailTransport, OutgoingMail, Recipients, Result,
};
use tracing::{error, info, warn};

/// Sends each planned group's message and, once every group has been
/// attempted, marks the items of the successful groups as sent in one
/// transaction.
pub struct DeliveryExecutor<'a> {
    recipients: &'a RecipientResolver,
    transport: &'a dyn MailTransport,
}

impl<'a> DeliveryExecutor<'a> {
    pub fn new(recipients: &'a RecipientResolver, transport: &'a dyn MailTransport) -> Self {
        Self {
            recipients,
            transport,
        }
    }

    pub async fn execute(&self, store: &ItemStore, plan: &DispatchPlan) -> Result<DeliveryReport> {
        // Resolve everything up front: a group without recipients aborts the
        // dispatch before any message leaves.
        let resolved = plan
            .batches
            .iter()
            .map(|batch| self.recipients.resolve(&batch.group).map(|r| (batch, r)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut report = DeliveryReport::default();
        let mut delivered_ids = Vec::new();

        for (batch, recipients) in resolved {
            info!(
                "[Mail Plan] Group={} To={} CC={} BCC={} Items={}",
                batch.group,
                show(&recipients.to),
                show(&recipients.cc),
                show(&recipients.bcc),
                batch.items.len()
            );

            if recipients.is_empty() {
                warn!(
                    "Group {} has an empty recipient entry; skipping {} items",
                    batch.group,
                    batch.items.len()
                );
                report.groups.push(GroupOutcome {
                    group: batch.group.clone(),
                    items: batch.items.len(),
                    status: DeliveryStatus::NoRecipients,
                });
                continue;
            }

            let mail = OutgoingMail {
                recipients: Recipients::clone(recipients),
                subject: batch.digest.subject.clone(),
                html_body: batch.digest.html_body.clone(),
                text_body: batch.digest.text_body.clone(),
            };

            let status = match self.transport.send(&mail).await {
                Ok(()) => {
                    delivered_ids.extend(batch.item_ids());
                    DeliveryStatus::Sent
                }
                Err(e) => {
                    error!(
                        "Delivery failed for group {} ({} items kept for retry): {}",
                        batch.group,
                        batch.items.len(),
                        e
                    );
                    DeliveryStatus::Failed(e.to_string())
                }
            };

            report.groups.push(GroupOutcome {
                group: batch.group.clone(),
                items: batch.items.len(),
                status,
            });
        }

        let mut tx = store.pool().begin().await?;
        let marked = ItemStore::mark_sent(&mut tx, &delivered_ids).await?;
        tx.commit().await?;

        report.sent = marked as usize;
        info!(
            "Delivery committed: {} items marked sent across {} groups",
            report.sent,
            report.groups.len()
        );
        Ok(report)
    }
}

fn show(addresses: &[String]) -> String {
    if addresses.is_empty() {
        "(none)".to_string()
    } else {
        addresses.join(", ")
    }
}
