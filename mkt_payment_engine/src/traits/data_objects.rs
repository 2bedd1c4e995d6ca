use serde::{Deserialize, Serialize};

use crate::db_types::{Order, SessionId};

/// What applying a payment event did. Stored (as [`TransitionOutcome::label`]) in the webhook ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// The event was already in the ledger. Nothing was changed.
    Duplicate,
    /// Neither an order nor a checkout session matches the event's reference.
    UnknownReference,
    /// The event is valid but has no effect on the current state, or a concurrent delivery already applied it.
    Ignored { reason: String },
    /// The order is now paid and its stock has been reserved.
    Paid { order: Order, materialized_from: Option<SessionId> },
    /// The payment was confirmed but the listing had already sold out. The order is cancelled and flagged.
    OutOfStock { order: Order },
    PaymentStatusChanged { order: Order },
    Annulled { order: Order },
    SessionDiscarded { session_id: SessionId },
    /// The provider reported a payment under way for a checkout session. The session is now pinned.
    PaymentInFlight { session_id: SessionId },
    FlaggedForReview { order: Option<Order>, reason: String },
}

impl TransitionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::UnknownReference => "unknown_reference",
            Self::Ignored { .. } => "ignored",
            Self::Paid { .. } => "paid",
            Self::OutOfStock { .. } => "out_of_stock",
            Self::PaymentStatusChanged { .. } => "payment_status_changed",
            Self::Annulled { .. } => "annulled",
            Self::SessionDiscarded { .. } => "session_discarded",
            Self::PaymentInFlight { .. } => "payment_in_flight",
            Self::FlaggedForReview { .. } => "flagged_for_review",
        }
    }

    /// The order the event touched, if any.
    pub fn order(&self) -> Option<&Order> {
        match self {
            Self::Paid { order, .. }
            | Self::OutOfStock { order }
            | Self::PaymentStatusChanged { order }
            | Self::Annulled { order } => Some(order),
            Self::FlaggedForReview { order, .. } => order.as_ref(),
            _ => None,
        }
    }
}
