use std::{fmt::Debug, sync::Arc};

use chrono::Duration;
use log::*;

use crate::{
    clock::Clock,
    db_types::{
        CheckoutDetails,
        CheckoutSession,
        ListingStatus,
        NewCheckoutSession,
        NewOrder,
        Order,
        OrderId,
        PaymentProvider,
        SessionId,
    },
    mpe_api::{errors::OrderFlowError, order_objects::CheckoutRequest},
    traits::CheckoutManagement,
};

/// `CheckoutApi` creates the state that has to exist before a buyer is sent to a payment provider: a pending order
/// for hosted-charge flows, or a checkout session for invoice flows.
///
/// Nothing here ever marks anything as paid. Only webhook ingestion, through [`crate::OrderFlowApi`], can do that.
pub struct CheckoutApi<B> {
    db: B,
    clock: Arc<dyn Clock>,
    session_ttl: Option<Duration>,
}

impl<B> Debug for CheckoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B> CheckoutApi<B> {
    pub fn new(db: B, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock, session_ttl: None }
    }

    /// Sessions created by this API expire after `ttl`.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = Some(ttl);
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

fn required(name: &str, value: &str) -> Result<String, OrderFlowError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(OrderFlowError::ValidationError(format!("{name} is required")));
    }
    Ok(value.to_string())
}

impl<B> CheckoutApi<B>
where B: CheckoutManagement
{
    /// Checks the request fields and the listing, and returns the purchase details that a session or order is built
    /// from.
    pub async fn validate(&self, request: &CheckoutRequest) -> Result<CheckoutDetails, OrderFlowError> {
        let listing_id = required("listing_id", &request.listing_id)?;
        let buyer_id = required("buyer_id", &request.buyer_id)?;
        let seller_id = required("seller_id", &request.seller_id)?;
        if !request.amount.is_positive() {
            return Err(OrderFlowError::ValidationError("amount must be greater than zero".to_string()));
        }
        if request.quantity <= 0 {
            return Err(OrderFlowError::ValidationError("quantity must be greater than zero".to_string()));
        }
        if request.amount.checked_mul(request.quantity).and_then(|s| s.checked_with_service_fee()).is_none() {
            return Err(OrderFlowError::ValidationError("amount x quantity is too large".to_string()));
        }
        if buyer_id == seller_id {
            return Err(OrderFlowError::ValidationError("buyers cannot purchase their own listings".to_string()));
        }
        let listing = self
            .db
            .fetch_listing(&listing_id)
            .await?
            .ok_or_else(|| OrderFlowError::NotFound(format!("Listing {listing_id}")))?;
        if listing.seller_id != seller_id {
            return Err(OrderFlowError::ValidationError(format!("listing {listing_id} is not sold by {seller_id}")));
        }
        if listing.status != ListingStatus::Active || listing.stock < request.quantity {
            return Err(OrderFlowError::InsufficientStock {
                listing_id,
                requested: request.quantity,
                available: listing.stock,
            });
        }
        let billing_email = request.billing_email.as_ref().map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
        let (amount, quantity) = (request.amount, request.quantity);
        Ok(CheckoutDetails { listing_id, buyer_id, seller_id, amount, quantity, billing_email })
    }

    /// Validates the request and persists a checkout session for an invoice-based payment flow.
    pub async fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, OrderFlowError> {
        let details = self.validate(request).await?;
        let now = self.clock.now();
        let mut session = NewCheckoutSession::new(details, now);
        if let Some(ttl) = self.session_ttl {
            session = session.with_expiry(now + ttl);
        }
        let session = self.db.insert_session(session).await?;
        info!(
            "🛒 Checkout session {} created for {} x {} of listing {} ({} total)",
            session.id, session.quantity, session.amount, session.listing_id, session.total_amount
        );
        Ok(session)
    }

    /// Deletes the session. Deleting a session that does not exist (any more) is not an error, but a session the
    /// provider has reported a payment for cannot be cancelled.
    pub async fn expire_or_cancel(&self, session_id: &SessionId) -> Result<bool, OrderFlowError> {
        if self.db.delete_session(session_id).await? {
            info!("🛒 Checkout session {session_id} cancelled");
            return Ok(true);
        }
        match self.db.fetch_session(session_id).await? {
            Some(session) if session.has_payment_in_flight() => {
                warn!("🛒 Checkout session {session_id} has a payment in flight and was not cancelled");
                Err(OrderFlowError::Conflict(format!(
                    "Checkout session {session_id} has a payment in progress and cannot be cancelled"
                )))
            },
            _ => {
                debug!("🛒 Checkout session {session_id} was already gone");
                Ok(false)
            },
        }
    }

    /// Validates the request and persists a pending order for a hosted-charge payment flow.
    pub async fn create_pending_order(
        &self,
        request: &CheckoutRequest,
        provider: PaymentProvider,
    ) -> Result<Order, OrderFlowError> {
        let details = self.validate(request).await?;
        let order = NewOrder::pending(&details, provider, self.clock.now());
        let order = self.db.insert_pending_order(order).await?;
        info!("🛒 Pending order {} created for listing {} ({} total)", order.id, order.listing_id, order.total_amount);
        Ok(order)
    }

    /// Records the provider's charge id against the pending order.
    pub async fn attach_payment_reference(&self, order_id: &OrderId, payment_id: &str) -> Result<Order, OrderFlowError> {
        self.db.attach_payment_id(order_id, payment_id, self.clock.now()).await?.ok_or_else(|| {
            OrderFlowError::Conflict(format!("Order {order_id} is no longer pending or already has a payment reference"))
        })
    }

    /// Cleans up after a checkout whose provider call failed. The order is cancelled if no payment activity has been
    /// seen for it.
    pub async fn abandon_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let order = self.db.cancel_unpaid_order(order_id, self.clock.now()).await?;
        match &order {
            Some(_) => info!("🛒 Pending order {order_id} abandoned"),
            None => warn!("🛒 Order {order_id} could not be abandoned. It is no longer pending."),
        }
        Ok(order)
    }

    /// Deletes every session past its `expires_at`, except those with a payment in flight. Returns how many were
    /// removed.
    pub async fn expire_stale_sessions(&self) -> Result<u64, OrderFlowError> {
        let count = self.db.delete_expired_sessions(self.clock.now()).await?;
        if count > 0 {
            info!("🛒 {count} expired checkout sessions removed");
        }
        Ok(count)
    }
}
