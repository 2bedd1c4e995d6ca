use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{OrderId, SessionId},
    providers::NormalizedEvent,
    traits::{data_objects::TransitionOutcome, OrderManagement},
};

/// This trait defines the highest level of behaviour for backends supporting the payment engine: turning a normalized
/// provider event into exactly one change of order state.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone + OrderManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Applies a payment event in a single atomic transaction:
    /// * records `(provider, event_key)` in the webhook ledger. If it is already there, nothing further is done and
    ///   [`TransitionOutcome::Duplicate`] is returned.
    /// * resolves the event to an order (by provider payment id, then by order id) or to a checkout session.
    /// * plans the transition with [`crate::order_state::plan`] and executes it with guarded updates. A confirmed
    ///   payment decrements stock in the same transaction.
    /// * stores the outcome against the ledger entry.
    ///
    /// If the reference is unknown the transaction is rolled back, so a later redelivery is processed afresh.
    async fn apply_payment_event(
        &self,
        event: &NormalizedEvent,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, PaymentGatewayError>;
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested checkout session {0} does not exist")]
    SessionNotFound(SessionId),
    #[error("The requested listing {0} does not exist")]
    ListingNotFound(String),
    #[error("Another order already carries the payment reference {0}")]
    PaymentReferenceInUse(String),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}
