use mkt_payment_engine::{
    db_types::{OrderId, SessionId},
    order_objects::{SweepItem, SweepReport},
};
use serde::{Deserialize, Serialize};

/// The acknowledgement sent to payment providers for every webhook that was accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self { received: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeCheckoutResponse {
    pub success: bool,
    pub charge_id: String,
    pub hosted_url: String,
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceCheckoutResponse {
    pub success: bool,
    pub invoice_id: String,
    pub invoice_url: String,
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCancelResponse {
    pub success: bool,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoCompleteResponse {
    pub completed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub truncated: bool,
    pub results: Vec<SweepItem>,
}

impl From<SweepReport> for AutoCompleteResponse {
    fn from(report: SweepReport) -> Self {
        Self {
            completed: report.completed(),
            skipped: report.skipped(),
            errors: report.errors(),
            truncated: report.truncated,
            results: report.results,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoReviewResponse {
    pub created: usize,
    pub skipped: usize,
    pub errors: usize,
    pub truncated: bool,
    pub results: Vec<SweepItem>,
}

impl From<SweepReport> for AutoReviewResponse {
    fn from(report: SweepReport) -> Self {
        Self {
            created: report.reviews_created(),
            skipped: report.skipped(),
            errors: report.errors(),
            truncated: report.truncated,
            results: report.results,
        }
    }
}
