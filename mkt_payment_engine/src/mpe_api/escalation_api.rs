//! Time-driven state escalation.
//!
//! Two sweeps move orders along without anyone having to act:
//! * **auto-complete** closes orders that were delivered more than `auto_complete_after` ago and never disputed.
//! * **auto-review** leaves a five-star review on orders completed more than `auto_review_after` ago that the buyer
//!   never reviewed.
//!
//! Both are safe to re-run at any time. Each is bounded by a batch size and a wall-clock budget; whatever a run does
//! not get to is picked up by the next one.
use std::{fmt::Debug, sync::Arc, time::Instant};

use chrono::Duration;
use log::*;

use crate::{
    clock::Clock,
    db_types::NewReview,
    events::{EventProducers, EventType, OrderCompletedEvent, ReviewCreatedEvent},
    mpe_api::{
        errors::OrderFlowError,
        order_objects::{SweepItem, SweepItemStatus, SweepReport},
    },
    traits::EscalationStore,
};

#[derive(Debug, Clone)]
pub struct SweepPolicy {
    pub auto_complete_after: Duration,
    pub auto_review_after: Duration,
    pub batch_limit: i64,
    pub time_budget: std::time::Duration,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            auto_complete_after: Duration::hours(48),
            auto_review_after: Duration::hours(48),
            batch_limit: 500,
            time_budget: std::time::Duration::from_secs(50),
        }
    }
}

pub struct EscalationApi<B> {
    db: B,
    producers: EventProducers,
    clock: Arc<dyn Clock>,
    policy: SweepPolicy,
}

impl<B> Debug for EscalationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EscalationApi({:?})", self.policy)
    }
}

impl<B> EscalationApi<B> {
    pub fn new(db: B, producers: EventProducers, clock: Arc<dyn Clock>, policy: SweepPolicy) -> Self {
        Self { db, producers, clock, policy }
    }

    pub fn policy(&self) -> &SweepPolicy {
        &self.policy
    }
}

impl<B> EscalationApi<B>
where B: EscalationStore
{
    fn completion_message(&self) -> String {
        format!(
            "This order was automatically marked as completed because no issue was reported within {} hours of \
             delivery.",
            self.policy.auto_complete_after.num_hours()
        )
    }

    /// Completes every delivered order whose `delivered_at` is older than the auto-complete threshold.
    ///
    /// Fails only if the candidate orders cannot be fetched. Per-order failures are recorded in the report.
    pub async fn auto_complete(&self) -> Result<SweepReport, OrderFlowError> {
        let started = Instant::now();
        let now = self.clock.now();
        let cutoff = now - self.policy.auto_complete_after;
        let candidates = self.db.fetch_orders_delivered_before(cutoff, self.policy.batch_limit).await?;
        debug!("🕰️ Auto-complete: {} orders delivered before {cutoff}", candidates.len());
        let truncated = candidates.len() as i64 >= self.policy.batch_limit;
        let mut report = SweepReport { truncated, ..Default::default() };
        let message = self.completion_message();
        for order in candidates {
            if started.elapsed() > self.policy.time_budget {
                warn!("🕰️ Auto-complete ran out of time. The remaining orders will be picked up on the next run.");
                report.truncated = true;
                break;
            }
            match self.db.complete_delivered_order(&order.id, &message, now).await {
                Ok(Some(completed)) => {
                    debug!("🕰️ Order {} auto-completed", completed.id);
                    report.push(SweepItem::new(completed.id.clone(), SweepItemStatus::Completed));
                    self.producers.publish(EventType::OrderCompleted(OrderCompletedEvent::new(completed)));
                },
                Ok(None) => {
                    info!("🕰️ Order {} changed state before it could be auto-completed. Skipping it.", order.id);
                    report.push(SweepItem::new(order.id, SweepItemStatus::Skipped).with_detail("no longer delivered"));
                },
                Err(e) => {
                    error!("🕰️ Could not auto-complete order {}: {e}", order.id);
                    report.push(SweepItem::new(order.id, SweepItemStatus::Error).with_detail(e.to_string()));
                },
            }
        }
        info!(
            "🕰️ Auto-complete finished: {} completed, {} skipped, {} errors{}",
            report.completed(),
            report.skipped(),
            report.errors(),
            if report.truncated { " (truncated)" } else { "" }
        );
        Ok(report)
    }

    /// Creates an automatic five-star review for every completed order older than the auto-review threshold that has
    /// not been reviewed.
    pub async fn auto_review(&self) -> Result<SweepReport, OrderFlowError> {
        let started = Instant::now();
        let now = self.clock.now();
        let cutoff = now - self.policy.auto_review_after;
        let candidates = self.db.fetch_unreviewed_orders_completed_before(cutoff, self.policy.batch_limit).await?;
        debug!("🕰️ Auto-review: {} unreviewed orders completed before {cutoff}", candidates.len());
        let truncated = candidates.len() as i64 >= self.policy.batch_limit;
        let mut report = SweepReport { truncated, ..Default::default() };
        for order in candidates {
            if started.elapsed() > self.policy.time_budget {
                warn!("🕰️ Auto-review ran out of time. The remaining orders will be picked up on the next run.");
                report.truncated = true;
                break;
            }
            let review = NewReview::automatic(&order, now);
            match self.db.insert_review_if_absent(review).await {
                Ok(Some(review)) => {
                    debug!("🕰️ Automatic review #{} left for order {}", review.id, order.id);
                    report.push(SweepItem::new(order.id, SweepItemStatus::ReviewCreated));
                    self.producers.publish(EventType::ReviewCreated(ReviewCreatedEvent::new(review)));
                },
                Ok(None) => {
                    debug!("🕰️ Order {} was reviewed in the meantime. Skipping it.", order.id);
                    report.push(SweepItem::new(order.id, SweepItemStatus::Skipped).with_detail("already reviewed"));
                },
                Err(e) => {
                    error!("🕰️ Could not create automatic review for order {}: {e}", order.id);
                    report.push(SweepItem::new(order.id, SweepItemStatus::Error).with_detail(e.to_string()));
                },
            }
        }
        info!(
            "🕰️ Auto-review finished: {} reviews created, {} skipped, {} errors{}",
            report.reviews_created(),
            report.skipped(),
            report.errors(),
            if report.truncated { " (truncated)" } else { "" }
        );
        Ok(report)
    }
}
