//! The provider-agnostic order state machine.
//!
//! [`plan`] decides what a normalized payment event should do to the record it refers to. It is pure: the backend
//! executes the returned [`Transition`] inside the same transaction that records the event in the webhook ledger, and
//! every write it performs is guarded on the `expected` payment statuses, so a concurrent delivery that got there first
//! turns the write into a no-op instead of a double application.
use crate::{
    db_types::{CheckoutSession, Order, OrderStatusType, PaymentStatus},
    providers::PaymentEventKind,
};

pub const PAYABLE: &[PaymentStatus] = &[PaymentStatus::Pending, PaymentStatus::Processing];
pub const DELAYED: &[PaymentStatus] = &[PaymentStatus::Delayed];
pub const AWAITING_FUNDS: &[PaymentStatus] = &[PaymentStatus::Pending];
pub const UNPAID: &[PaymentStatus] = &[PaymentStatus::Pending, PaymentStatus::Processing, PaymentStatus::Delayed];

pub const REASON_PARTIALLY_PAID: &str = "partially paid";
pub const REASON_OUT_OF_STOCK: &str = "insufficient stock after payment";
pub const REASON_REFUND_AFTER_PAYMENT: &str = "refund reported after payment";
pub const REASON_PAID_AFTER_CANCEL: &str = "payment confirmed for a cancelled order";
pub const REASON_UNMATCHED_PAYMENT: &str = "confirmed payment matches no order or checkout session";

/// The record a payment event refers to.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Order(&'a Order),
    Session(&'a CheckoutSession),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Move an existing order to `paid` and reserve its stock.
    PayOrder { expected: &'static [PaymentStatus] },
    /// Consume the checkout session and create a paid order from it.
    MaterializeSession,
    SetPaymentStatus { to: PaymentStatus, expected: &'static [PaymentStatus] },
    /// Cancel an order whose payment failed before it was ever paid.
    AnnulOrder { expected: &'static [PaymentStatus] },
    /// Delete a checkout session whose payment failed.
    DiscardSession,
    /// Record that buyer funds are in flight for a checkout session, which pins it until a final status arrives.
    HoldSession,
    FlagForReview { reason: &'static str },
    Ignore { reason: String },
}

pub fn plan(kind: PaymentEventKind, target: Target<'_>) -> Transition {
    match target {
        Target::Order(order) => plan_for_order(kind, order),
        Target::Session(_) => plan_for_session(kind),
    }
}

fn plan_for_order(kind: PaymentEventKind, order: &Order) -> Transition {
    use PaymentEventKind::*;
    let status = order.payment_status;
    match kind {
        Confirmed if PAYABLE.contains(&status) => Transition::PayOrder { expected: PAYABLE },
        Confirmed if order.status == OrderStatusType::Cancelled => {
            Transition::FlagForReview { reason: REASON_PAID_AFTER_CANCEL }
        },
        Resolved if status == PaymentStatus::Delayed => Transition::PayOrder { expected: DELAYED },
        Processing if status == PaymentStatus::Pending => {
            Transition::SetPaymentStatus { to: PaymentStatus::Processing, expected: AWAITING_FUNDS }
        },
        Delayed if PAYABLE.contains(&status) => {
            Transition::SetPaymentStatus { to: PaymentStatus::Delayed, expected: PAYABLE }
        },
        PartiallyPaid => Transition::FlagForReview { reason: REASON_PARTIALLY_PAID },
        Failed | Refunded if UNPAID.contains(&status) && order.status == OrderStatusType::Pending => {
            Transition::AnnulOrder { expected: UNPAID }
        },
        Refunded if status == PaymentStatus::Paid => Transition::FlagForReview { reason: REASON_REFUND_AFTER_PAYMENT },
        _ => Transition::Ignore {
            reason: format!("{kind:?} does not apply to an order that is {} with payment {status}", order.status),
        },
    }
}

fn plan_for_session(kind: PaymentEventKind) -> Transition {
    use PaymentEventKind::*;
    match kind {
        Confirmed | Resolved => Transition::MaterializeSession,
        Failed | Refunded => Transition::DiscardSession,
        PartiallyPaid => Transition::FlagForReview { reason: REASON_PARTIALLY_PAID },
        Processing | Delayed => Transition::HoldSession,
    }
}
