use serde::{Deserialize, Serialize};

use crate::db_types::{Cents, OrderId};

/// A buyer's request to pay for a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub listing_id: String,
    /// Shown on the provider's hosted payment page.
    #[serde(default)]
    pub listing_title: Option<String>,
    /// The unit amount, in cents.
    pub amount: Cents,
    pub quantity: i64,
    pub buyer_id: String,
    pub seller_id: String,
    #[serde(default)]
    pub billing_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepItemStatus {
    Completed,
    ReviewCreated,
    Skipped,
    Error,
}

/// The result of one order within an escalation sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepItem {
    pub order_id: OrderId,
    pub status: SweepItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SweepItem {
    pub fn new(order_id: OrderId, status: SweepItemStatus) -> Self {
        Self { order_id, status, detail: None }
    }

    pub fn with_detail<S: Into<String>>(mut self, detail: S) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Accumulated per-order results of an escalation sweep. A single order failing never aborts the sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub results: Vec<SweepItem>,
    /// True if the batch limit or time budget cut the sweep short. The next run picks up where this one stopped.
    pub truncated: bool,
}

impl SweepReport {
    pub fn push(&mut self, item: SweepItem) {
        self.results.push(item);
    }

    fn count(&self, status: SweepItemStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn completed(&self) -> usize {
        self.count(SweepItemStatus::Completed)
    }

    pub fn reviews_created(&self) -> usize {
        self.count(SweepItemStatus::ReviewCreated)
    }

    pub fn skipped(&self) -> usize {
        self.count(SweepItemStatus::Skipped)
    }

    pub fn errors(&self) -> usize {
        self.count(SweepItemStatus::Error)
    }
}
