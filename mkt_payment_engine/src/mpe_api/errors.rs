use thiserror::Error;

use crate::traits::PaymentGatewayError;

/// Errors surfaced by the engine's public API. The server maps each variant onto an HTTP status.
#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("{0} does not exist")]
    NotFound(String),
    #[error("Conflicting update. {0}")]
    Conflict(String),
    #[error("Listing {listing_id} has {available} units available, but {requested} were requested")]
    InsufficientStock { listing_id: String, requested: i64, available: i64 },
    #[error("The payment provider could not complete the request. {0}")]
    UpstreamError(String),
    #[error("Database error: {0}")]
    PersistenceError(String),
    #[error("The {0} payment provider is not configured")]
    ConfigurationError(String),
}

impl From<PaymentGatewayError> for OrderFlowError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::DatabaseError(s) => Self::PersistenceError(s),
            PaymentGatewayError::OrderNotFound(id) => Self::NotFound(format!("Order {id}")),
            PaymentGatewayError::SessionNotFound(id) => Self::NotFound(format!("Checkout session {id}")),
            PaymentGatewayError::ListingNotFound(id) => Self::NotFound(format!("Listing {id}")),
            PaymentGatewayError::PaymentReferenceInUse(r) => {
                Self::Conflict(format!("Payment reference {r} is already attached to another order"))
            },
        }
    }
}
