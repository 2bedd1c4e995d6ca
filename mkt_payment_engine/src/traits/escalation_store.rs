use chrono::{DateTime, Utc};

use crate::{
    db_types::{NewReview, Order, OrderId, Review},
    traits::PaymentGatewayError,
};

/// Storage behaviour needed by the time-driven escalation sweeps.
#[allow(async_fn_in_trait)]
pub trait EscalationStore: Clone {
    /// Delivered orders with `delivered_at` strictly before `cutoff`, oldest first.
    async fn fetch_orders_delivered_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Order>, PaymentGatewayError>;

    /// Guarded `delivered -> completed`. In the same transaction, posts `system_message` to the buyer-seller
    /// conversation for the listing, creating the conversation if needed.
    ///
    /// Returns `None` if the order was no longer `delivered`, e.g. because a dispute was raised in the meantime.
    async fn complete_delivered_order(
        &self,
        order_id: &OrderId,
        system_message: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, PaymentGatewayError>;

    /// Completed orders with `completed_at` strictly before `cutoff` that have no review yet, oldest first.
    async fn fetch_unreviewed_orders_completed_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Order>, PaymentGatewayError>;

    /// Inserts the review unless the order already has one, in which case `None` is returned.
    async fn insert_review_if_absent(&self, review: NewReview) -> Result<Option<Review>, PaymentGatewayError>;
}
