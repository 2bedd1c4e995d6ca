use std::{fmt::Debug, sync::Arc};

use log::*;

use crate::{
    clock::Clock,
    db_types::{Order, OrderId},
    events::{EventProducers, EventType, ManualReviewEvent, OrderAnnulledEvent, OrderPaidEvent},
    mpe_api::errors::OrderFlowError,
    order_state::{REASON_OUT_OF_STOCK, REASON_UNMATCHED_PAYMENT},
    providers::{NormalizedEvent, PaymentEventKind},
    traits::{PaymentGatewayDatabase, TransitionOutcome},
};

/// `OrderFlowApi` is the primary API for driving orders through their lifecycle in response to payment provider
/// events, and to the marketplace's own delivery and dispute actions.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    clock: Arc<dyn Clock>,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers, clock: Arc<dyn Clock>) -> Self {
        Self { db, producers, clock }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: PaymentGatewayDatabase
{
    /// Applies a normalized provider event to the order or checkout session it refers to.
    ///
    /// The call is idempotent. Replaying the same event returns [`TransitionOutcome::Duplicate`] and has no effect, and
    /// events are only published the first time a transition is applied.
    pub async fn process_event(&self, event: &NormalizedEvent) -> Result<TransitionOutcome, OrderFlowError> {
        let now = self.clock.now();
        let outcome = self.db.apply_payment_event(event, now).await?;
        match &outcome {
            TransitionOutcome::Duplicate => {
                debug!("🔄 {} event {} is a redelivery. Acknowledged.", event.provider, event.event_key);
            },
            TransitionOutcome::UnknownReference if event.kind == PaymentEventKind::Confirmed => {
                error!(
                    "🔄 {} confirmed payment {:?} for {}, which matches no order or checkout session. The payment \
                     needs to be reconciled by hand.",
                    event.provider, event.payment_id, event.reference
                );
                let ev = ManualReviewEvent::new(event.provider, &event.reference, None, REASON_UNMATCHED_PAYMENT);
                self.producers.publish(EventType::ManualReview(ev));
            },
            TransitionOutcome::UnknownReference => {
                info!("🔄 {} event {} refers to unknown {}. Ignored.", event.provider, event.event_key, event.reference);
            },
            TransitionOutcome::Ignored { reason } => {
                debug!("🔄 {} event {} had no effect. {reason}", event.provider, event.event_key);
            },
            TransitionOutcome::Paid { order, materialized_from } => {
                match materialized_from {
                    Some(session) => info!("🔄 Checkout session {session} paid. Order {} created.", order.id),
                    None => info!("🔄 Order {} paid", order.id),
                }
                self.producers.publish(EventType::OrderPaid(OrderPaidEvent::new(order.clone())));
            },
            TransitionOutcome::OutOfStock { order } => {
                error!(
                    "🔄📦 Payment {:?} for order {} was confirmed, but listing {} does not have {} units left. The order \
                     has been cancelled and flagged for manual review.",
                    order.payment_id, order.id, order.listing_id, order.quantity
                );
                let ev = ManualReviewEvent::new(event.provider, &event.reference, Some(order.clone()), REASON_OUT_OF_STOCK);
                self.producers.publish(EventType::ManualReview(ev));
            },
            TransitionOutcome::PaymentStatusChanged { order } => {
                info!("🔄 Order {} payment is now {}", order.id, order.payment_status);
            },
            TransitionOutcome::Annulled { order } => {
                info!("🔄 Order {} cancelled after {}", order.id, event.event_type);
                self.producers.publish(EventType::OrderAnnulled(OrderAnnulledEvent::new(order.clone())));
            },
            TransitionOutcome::PaymentInFlight { session_id } => {
                info!("🔄 Payment {:?} in flight for checkout session {session_id}", event.payment_id);
            },
            TransitionOutcome::SessionDiscarded { session_id } => {
                info!("🔄 Checkout session {session_id} discarded after {}", event.event_type);
            },
            TransitionOutcome::FlaggedForReview { order, reason } => {
                warn!("🔄 {} {} flagged for manual review: {reason}", event.provider, event.reference);
                let ev = ManualReviewEvent::new(event.provider, &event.reference, order.clone(), reason);
                self.producers.publish(EventType::ManualReview(ev));
            },
        }
        Ok(outcome)
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::NotFound(format!("Order {order_id}")))
    }

    /// The seller has handed the goods over. `paid -> delivered`.
    pub async fn mark_delivered(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        match self.db.mark_order_delivered(order_id, self.clock.now()).await? {
            Some(order) => {
                info!("🔄 Order {order_id} delivered");
                Ok(order)
            },
            None => Err(self.explain_rejection(order_id, "marked as delivered").await),
        }
    }

    /// The buyer reports a problem with a delivered order. `delivered -> dispute_raised`.
    pub async fn raise_dispute(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        match self.db.raise_dispute(order_id, self.clock.now()).await? {
            Some(order) => {
                info!("🔄 Dispute raised on order {order_id}");
                Ok(order)
            },
            None => Err(self.explain_rejection(order_id, "disputed").await),
        }
    }

    async fn explain_rejection(&self, order_id: &OrderId, action: &str) -> OrderFlowError {
        match self.db.fetch_order(order_id).await {
            Ok(Some(order)) => {
                OrderFlowError::Conflict(format!("Order {order_id} is {} and cannot be {action}", order.status))
            },
            Ok(None) => OrderFlowError::NotFound(format!("Order {order_id}")),
            Err(e) => e.into(),
        }
    }
}
