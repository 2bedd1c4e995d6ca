//! Payment provider adapters.
//!
//! Each provider calls back with its own signature scheme and its own event vocabulary. An adapter authenticates the
//! raw request body and translates it into a [`NormalizedEvent`], which is all the order state machine ever sees. No
//! business rules live here.
mod coinbase;
mod nowpayments;

pub use coinbase::CoinbaseAdapter;
pub use nowpayments::NowPaymentsAdapter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::PaymentProvider;

/// What a provider event means for the order it refers to, independent of which provider sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventKind {
    /// The payment is final and complete.
    Confirmed,
    /// The provider has seen the payment but it is not final yet.
    Processing,
    /// Less than the full amount was received.
    PartiallyPaid,
    /// The payment failed or the payment window expired.
    Failed,
    /// The provider returned the funds to the buyer.
    Refunded,
    /// The payment arrived late or short and is waiting on the provider.
    Delayed,
    /// A previously delayed payment was accepted after all.
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub provider: PaymentProvider,
    /// Unique per provider. Used as the idempotency key in the webhook ledger.
    pub event_key: String,
    /// The provider's own name for the event, kept for the ledger and for logging.
    pub event_type: String,
    pub kind: PaymentEventKind,
    /// Our identifier, echoed back by the provider: an order id or a checkout session id.
    pub reference: String,
    /// The provider's identifier for the payment.
    pub payment_id: Option<String>,
    /// The amount the provider reports, formatted as the provider sends it. Informational only.
    pub amount_hint: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("No signature was provided with the request")]
    Missing,
    #[error("The signature is not valid hex")]
    Malformed,
    #[error("The signature does not match the request body")]
    Mismatch,
    #[error("The signing key is invalid")]
    InvalidKey,
    #[error("The request body cannot be canonicalized for verification: {0}")]
    InvalidBody(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("The webhook body is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("The webhook body is missing the required field {0}")]
    MissingField(&'static str),
    #[error("The {event_type} event does not carry an order or session reference")]
    MissingReference { event_type: String },
}

pub trait PaymentProviderAdapter: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// The request header carrying the hex-encoded HMAC signature.
    fn signature_header(&self) -> &'static str;

    /// Verifies the hex-encoded `signature` over the raw request `body`. Comparison is constant time.
    fn verify_signature(&self, secret: &str, body: &[u8], signature: &str) -> Result<(), SignatureError>;

    /// Translates the raw request body into a provider-agnostic event.
    ///
    /// Returns `Ok(None)` for event types that have no bearing on order state. These are acknowledged and ignored.
    fn normalize(&self, body: &[u8]) -> Result<Option<NormalizedEvent>, NormalizeError>;
}

/// Provider payloads are inconsistent about whether identifiers are strings or numbers.
pub(crate) fn json_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn decode_signature(signature: &str) -> Result<Vec<u8>, SignatureError> {
    let signature = signature.trim();
    if signature.is_empty() {
        return Err(SignatureError::Missing);
    }
    hex::decode(signature).map_err(|_| SignatureError::Malformed)
}
