use chrono::{DateTime, Utc};

use crate::{
    db_types::{
        CheckoutSession,
        Listing,
        NewCheckoutSession,
        NewListing,
        NewOrder,
        Order,
        OrderId,
        SessionId,
        StockDecrement,
    },
    traits::PaymentGatewayError,
};

/// Listings and their stock.
#[allow(async_fn_in_trait)]
pub trait ListingManagement: Clone {
    async fn fetch_listing(&self, listing_id: &str) -> Result<Option<Listing>, PaymentGatewayError>;

    async fn insert_listing(&self, listing: NewListing, now: DateTime<Utc>) -> Result<Listing, PaymentGatewayError>;

    /// A single atomic conditional update. Stock never goes negative.
    async fn decrement_stock(
        &self,
        listing_id: &str,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<StockDecrement, PaymentGatewayError>;
}

/// The state created before a payment exists: checkout sessions for invoice flows, and pending orders for charge
/// flows.
#[allow(async_fn_in_trait)]
pub trait CheckoutManagement: Clone + ListingManagement {
    async fn insert_session(&self, session: NewCheckoutSession) -> Result<CheckoutSession, PaymentGatewayError>;

    async fn fetch_session(&self, session_id: &SessionId) -> Result<Option<CheckoutSession>, PaymentGatewayError>;

    /// Returns `false` if the session did not exist, or if a payment has been seen for it. Those sessions are only
    /// ever removed by the provider's final status.
    async fn delete_session(&self, session_id: &SessionId) -> Result<bool, PaymentGatewayError>;

    /// Deletes every session whose `expires_at` is at or before `now` and that has no payment in flight. Returns the
    /// number removed.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, PaymentGatewayError>;

    async fn insert_pending_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError>;

    /// Stores the provider's payment reference on a pending order that does not have one yet.
    async fn attach_payment_id(
        &self,
        order_id: &OrderId,
        payment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, PaymentGatewayError>;

    /// `pending -> cancelled` for an order whose payment never started. Returns `None` if the order had moved on.
    async fn cancel_unpaid_order(&self, order_id: &OrderId, now: DateTime<Utc>)
        -> Result<Option<Order>, PaymentGatewayError>;
}
