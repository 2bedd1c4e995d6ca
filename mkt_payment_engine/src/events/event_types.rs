use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, PaymentProvider, Review};

/// Emitted once, when a payment confirmation turns an order (or a checkout session) into a paid order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted when an order is cancelled because its payment failed or expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}

/// Emitted when the auto-complete sweep closes a delivered order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompletedEvent {
    pub order: Order,
}

impl OrderCompletedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewCreatedEvent {
    pub review: Review,
}

impl ReviewCreatedEvent {
    pub fn new(review: Review) -> Self {
        Self { review }
    }
}

/// Something happened that an operator needs to look at, e.g. a partial payment, or a payment for stock that has
/// already sold out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualReviewEvent {
    pub provider: PaymentProvider,
    pub reference: String,
    pub order: Option<Order>,
    pub reason: String,
}

impl ManualReviewEvent {
    pub fn new(provider: PaymentProvider, reference: &str, order: Option<Order>, reason: &str) -> Self {
        Self { provider, reference: reference.to_string(), order, reason: reason.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventType {
    OrderPaid(OrderPaidEvent),
    OrderAnnulled(OrderAnnulledEvent),
    OrderCompleted(OrderCompletedEvent),
    ReviewCreated(ReviewCreatedEvent),
    ManualReview(ManualReviewEvent),
}

impl EventType {
    pub fn name(&self) -> &'static str {
        match self {
            EventType::OrderPaid(_) => "order_paid",
            EventType::OrderAnnulled(_) => "order_annulled",
            EventType::OrderCompleted(_) => "order_completed",
            EventType::ReviewCreated(_) => "review_created",
            EventType::ManualReview(_) => "manual_review",
        }
    }
}
