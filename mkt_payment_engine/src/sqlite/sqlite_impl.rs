//! `SqliteDatabase` is a concrete implementation of a payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{db_url, listings, messages, new_pool, orders, reviews, sessions, webhook_events};
use crate::{
    db_types::{
        CheckoutSession,
        Listing,
        Message,
        NewCheckoutSession,
        NewListing,
        NewOrder,
        NewReview,
        Order,
        OrderId,
        OrderStatusType,
        PaymentProvider,
        PaymentStatus,
        Review,
        SessionId,
        StockDecrement,
        WebhookEvent,
    },
    order_state::{plan, Target, Transition, REASON_OUT_OF_STOCK},
    providers::NormalizedEvent,
    traits::{
        CheckoutManagement,
        EscalationStore,
        ListingManagement,
        OrderManagement,
        PaymentGatewayDatabase,
        PaymentGatewayError,
        TransitionOutcome,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

enum ResolvedTarget {
    Order(Order),
    Session(CheckoutSession),
    Unknown,
}

/// Finds the record an event refers to. An order already carrying the provider's payment id wins, so a redelivered
/// confirmation for a session that has since been materialized lands on the order, not on a missing session.
async fn resolve_target(
    event: &NormalizedEvent,
    conn: &mut SqliteConnection,
) -> Result<ResolvedTarget, PaymentGatewayError> {
    if let Some(payment_id) = event.payment_id.as_deref() {
        if let Some(order) = orders::fetch_order_by_payment_id(event.provider, payment_id, conn).await? {
            return Ok(ResolvedTarget::Order(order));
        }
    }
    let order_id = OrderId::from(event.reference.clone());
    match orders::fetch_order_by_id(&order_id, conn).await? {
        Some(order) if order.payment_provider == event.provider => return Ok(ResolvedTarget::Order(order)),
        Some(order) => {
            warn!(
                "🔄 {} event {} refers to order {} which is paid through {}. Ignoring the reference.",
                event.provider, event.event_key, order.id, order.payment_provider
            );
        },
        None => {},
    }
    let session_id = SessionId::from(event.reference.clone());
    match sessions::fetch_session(&session_id, conn).await? {
        Some(session) => Ok(ResolvedTarget::Session(session)),
        None => Ok(ResolvedTarget::Unknown),
    }
}

fn conflict(what: &str, id: &str) -> TransitionOutcome {
    info!("🔄 {what} {id} changed under a concurrent update. This delivery lost the race and is a no-op.");
    TransitionOutcome::Ignored { reason: format!("{what} {id} was changed by a concurrent update") }
}

async fn apply_to_order(
    event: &NormalizedEvent,
    order: &Order,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<TransitionOutcome, PaymentGatewayError> {
    let transition = plan(event.kind, Target::Order(order));
    trace!("🔄 {:?} on order {} plans {transition:?}", event.kind, order.id);
    let outcome = match transition {
        Transition::PayOrder { expected } => {
            let payment_id = event.payment_id.as_deref();
            let Some(paid) = orders::pay_order(&order.id, expected, payment_id, now, conn).await? else {
                return Ok(conflict("Order", order.id.as_str()));
            };
            match listings::decrement_stock(&paid.listing_id, paid.quantity, now, conn).await? {
                StockDecrement::Decremented { .. } => TransitionOutcome::Paid { order: paid, materialized_from: None },
                StockDecrement::InsufficientStock | StockDecrement::ListingNotFound => {
                    match orders::revert_payment_for_stock(&paid.id, REASON_OUT_OF_STOCK, now, conn).await? {
                        Some(order) => TransitionOutcome::OutOfStock { order },
                        None => return Ok(conflict("Order", paid.id.as_str())),
                    }
                },
            }
        },
        Transition::SetPaymentStatus { to, expected } => {
            match orders::set_payment_status(&order.id, to, expected, now, conn).await? {
                Some(order) => TransitionOutcome::PaymentStatusChanged { order },
                None => conflict("Order", order.id.as_str()),
            }
        },
        Transition::AnnulOrder { expected } => match orders::annul_order(&order.id, expected, now, conn).await? {
            Some(order) => TransitionOutcome::Annulled { order },
            None => conflict("Order", order.id.as_str()),
        },
        Transition::FlagForReview { reason } => {
            let flagged = orders::flag_for_review(&order.id, reason, now, conn).await?;
            TransitionOutcome::FlaggedForReview { order: flagged, reason: reason.to_string() }
        },
        Transition::Ignore { reason } => TransitionOutcome::Ignored { reason },
        Transition::MaterializeSession | Transition::DiscardSession | Transition::HoldSession => {
            TransitionOutcome::Ignored { reason: "session transition planned for an order".to_string() }
        },
    };
    Ok(outcome)
}

async fn apply_to_session(
    event: &NormalizedEvent,
    session: &CheckoutSession,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<TransitionOutcome, PaymentGatewayError> {
    let transition = plan(event.kind, Target::Session(session));
    trace!("🔄 {:?} on checkout session {} plans {transition:?}", event.kind, session.id);
    let outcome = match transition {
        Transition::MaterializeSession => {
            let Some(session) = sessions::take_session(&session.id, conn).await? else {
                return Ok(conflict("Checkout session", session.id.as_str()));
            };
            let payment_id = event.payment_id.clone().unwrap_or_else(|| session.id.to_string());
            let new_order = NewOrder::from_session(&session, event.provider, &payment_id, now);
            match listings::decrement_stock(&session.listing_id, session.quantity, now, conn).await? {
                StockDecrement::Decremented { .. } => {
                    let (status, payment_status) = (OrderStatusType::Paid, PaymentStatus::Paid);
                    let order = orders::insert_order(&new_order, status, payment_status, Some(now), None, conn).await?;
                    TransitionOutcome::Paid { order, materialized_from: Some(session.id) }
                },
                StockDecrement::InsufficientStock | StockDecrement::ListingNotFound => {
                    let order = orders::insert_order(
                        &new_order,
                        OrderStatusType::Cancelled,
                        PaymentStatus::Failed,
                        None,
                        Some(REASON_OUT_OF_STOCK),
                        conn,
                    )
                    .await?;
                    TransitionOutcome::OutOfStock { order }
                },
            }
        },
        Transition::DiscardSession => match sessions::take_session(&session.id, conn).await? {
            Some(session) => TransitionOutcome::SessionDiscarded { session_id: session.id },
            None => conflict("Checkout session", session.id.as_str()),
        },
        Transition::HoldSession => {
            match sessions::mark_payment_seen(&session.id, event.payment_id.as_deref(), now, conn).await? {
                Some(session) => TransitionOutcome::PaymentInFlight { session_id: session.id },
                None => conflict("Checkout session", session.id.as_str()),
            }
        },
        Transition::FlagForReview { reason } => {
            // Part of the money has arrived, so the session has to outlive its expiry too
            sessions::mark_payment_seen(&session.id, event.payment_id.as_deref(), now, conn).await?;
            TransitionOutcome::FlaggedForReview { order: None, reason: reason.to_string() }
        },
        Transition::Ignore { reason } => TransitionOutcome::Ignored { reason },
        Transition::PayOrder { .. } | Transition::SetPaymentStatus { .. } | Transition::AnnulOrder { .. } => {
            TransitionOutcome::Ignored { reason: "order transition planned for a checkout session".to_string() }
        },
    };
    Ok(outcome)
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn apply_payment_event(
        &self,
        event: &NormalizedEvent,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, PaymentGatewayError> {
        // The ledger insert is the first statement, so the transaction takes the write lock before reading any state.
        let mut tx = self.pool.begin().await?;
        if !webhook_events::record_event(event, now, &mut tx).await? {
            debug!("🗃️ {} event {} has been seen before. Skipping it.", event.provider, event.event_key);
            return Ok(TransitionOutcome::Duplicate);
        }
        let outcome = match resolve_target(event, &mut tx).await? {
            ResolvedTarget::Order(order) => apply_to_order(event, &order, now, &mut tx).await?,
            ResolvedTarget::Session(session) => apply_to_session(event, &session, now, &mut tx).await?,
            ResolvedTarget::Unknown => {
                tx.rollback().await?;
                return Ok(TransitionOutcome::UnknownReference);
            },
        };
        webhook_events::set_outcome(event.provider, &event.event_key, outcome.label(), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ {} event {} applied: {}", event.provider, event.event_key, outcome.label());
        Ok(outcome)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_payment_id(
        &self,
        provider: PaymentProvider,
        payment_id: &str,
    ) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_payment_id(provider, payment_id, &mut conn).await?;
        Ok(order)
    }

    async fn mark_order_delivered(
        &self,
        order_id: &OrderId,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::mark_delivered(order_id, now, &mut conn).await
    }

    async fn raise_dispute(&self, order_id: &OrderId, now: DateTime<Utc>) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::raise_dispute(order_id, now, &mut conn).await
    }
}

impl ListingManagement for SqliteDatabase {
    async fn fetch_listing(&self, listing_id: &str) -> Result<Option<Listing>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let listing = listings::fetch_listing(listing_id, &mut conn).await?;
        Ok(listing)
    }

    async fn insert_listing(&self, listing: NewListing, now: DateTime<Utc>) -> Result<Listing, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let listing = listings::insert_listing(listing, now, &mut conn).await?;
        Ok(listing)
    }

    async fn decrement_stock(
        &self,
        listing_id: &str,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<StockDecrement, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let result = listings::decrement_stock(listing_id, quantity, now, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }
}

impl CheckoutManagement for SqliteDatabase {
    async fn insert_session(&self, session: NewCheckoutSession) -> Result<CheckoutSession, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let session = sessions::insert_session(session, &mut conn).await?;
        Ok(session)
    }

    async fn fetch_session(&self, session_id: &SessionId) -> Result<Option<CheckoutSession>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let session = sessions::fetch_session(session_id, &mut conn).await?;
        Ok(session)
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let deleted = sessions::cancel_session(session_id, &mut conn).await?;
        Ok(deleted.is_some())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let count = sessions::delete_expired_sessions(now, &mut conn).await?;
        Ok(count)
    }

    async fn insert_pending_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_order(&order, OrderStatusType::Pending, PaymentStatus::Pending, None, None, &mut conn).await
    }

    async fn attach_payment_id(
        &self,
        order_id: &OrderId,
        payment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::attach_payment_id(order_id, payment_id, now, &mut conn).await
    }

    async fn cancel_unpaid_order(
        &self,
        order_id: &OrderId,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::cancel_unpaid_order(order_id, now, &mut conn).await
    }
}

impl EscalationStore for SqliteDatabase {
    async fn fetch_orders_delivered_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_delivered_before(cutoff, limit, &mut conn).await?;
        Ok(orders)
    }

    async fn complete_delivered_order(
        &self,
        order_id: &OrderId,
        system_message: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::complete_delivered(order_id, now, &mut tx).await? else {
            return Ok(None);
        };
        let conversation_id = messages::fetch_or_create_conversation(&order, now, &mut tx).await?;
        messages::insert_system_message(conversation_id, system_message, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} completed and conversation #{conversation_id} notified");
        Ok(Some(order))
    }

    async fn fetch_unreviewed_orders_completed_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_unreviewed_completed_before(cutoff, limit, &mut conn).await?;
        Ok(orders)
    }

    async fn insert_review_if_absent(&self, review: NewReview) -> Result<Option<Review>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let review = reviews::insert_review_if_absent(review, &mut conn).await?;
        Ok(review)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs the embedded migrations. Safe to call on every start.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    pub async fn fetch_webhook_event(
        &self,
        provider: PaymentProvider,
        event_key: &str,
    ) -> Result<Option<WebhookEvent>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let event = webhook_events::fetch_event(provider, event_key, &mut conn).await?;
        Ok(event)
    }

    pub async fn fetch_reviews_for_order(&self, order_id: &OrderId) -> Result<Vec<Review>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let reviews = reviews::fetch_reviews_for_order(order_id, &mut conn).await?;
        Ok(reviews)
    }

    pub async fn fetch_messages_for_order(&self, order: &Order) -> Result<Vec<Message>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let messages = messages::fetch_messages_for_order(order, &mut conn).await?;
        Ok(messages)
    }
}
