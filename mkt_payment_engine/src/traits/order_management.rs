use chrono::{DateTime, Utc};

use crate::{
    db_types::{Order, OrderId, PaymentProvider},
    traits::PaymentGatewayError,
};

/// Order queries, and the marketplace-driven transitions that happen after payment.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    async fn fetch_order_by_payment_id(
        &self,
        provider: PaymentProvider,
        payment_id: &str,
    ) -> Result<Option<Order>, PaymentGatewayError>;

    /// `paid -> delivered`, setting `delivered_at`. Returns `None` if the order was not `paid`.
    async fn mark_order_delivered(&self, order_id: &OrderId, now: DateTime<Utc>)
        -> Result<Option<Order>, PaymentGatewayError>;

    /// `delivered -> dispute_raised`. Returns `None` if the order was not `delivered`.
    async fn raise_dispute(&self, order_id: &OrderId, now: DateTime<Utc>) -> Result<Option<Order>, PaymentGatewayError>;
}
