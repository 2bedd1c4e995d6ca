use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{
    EventHandler,
    EventProducer,
    EventType,
    Handler,
    ManualReviewEvent,
    OrderAnnulledEvent,
    OrderCompletedEvent,
    OrderPaidEvent,
    ReviewCreatedEvent,
};

type BoxedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The producer side of the hooks. Cheap to clone; every API that emits events holds a copy.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_paid_producer: Vec<EventProducer<OrderPaidEvent>>,
    pub order_annulled_producer: Vec<EventProducer<OrderAnnulledEvent>>,
    pub order_completed_producer: Vec<EventProducer<OrderCompletedEvent>>,
    pub review_created_producer: Vec<EventProducer<ReviewCreatedEvent>>,
    pub manual_review_producer: Vec<EventProducer<ManualReviewEvent>>,
}

impl EventProducers {
    pub fn publish(&self, event: EventType) {
        trace!("📬️ Publishing {} event", event.name());
        match event {
            EventType::OrderPaid(ev) => self.order_paid_producer.iter().for_each(|p| {
                p.publish_event(ev.clone());
            }),
            EventType::OrderAnnulled(ev) => self.order_annulled_producer.iter().for_each(|p| {
                p.publish_event(ev.clone());
            }),
            EventType::OrderCompleted(ev) => self.order_completed_producer.iter().for_each(|p| {
                p.publish_event(ev.clone());
            }),
            EventType::ReviewCreated(ev) => self.review_created_producer.iter().for_each(|p| {
                p.publish_event(ev.clone());
            }),
            EventType::ManualReview(ev) => self.manual_review_producer.iter().for_each(|p| {
                p.publish_event(ev.clone());
            }),
        }
    }
}

pub struct EventHandlers {
    pub on_order_paid: Option<EventHandler<OrderPaidEvent>>,
    pub on_order_annulled: Option<EventHandler<OrderAnnulledEvent>>,
    pub on_order_completed: Option<EventHandler<OrderCompletedEvent>>,
    pub on_review_created: Option<EventHandler<ReviewCreatedEvent>>,
    pub on_manual_review: Option<EventHandler<ManualReviewEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_paid: hooks.on_order_paid.map(|f| EventHandler::new("order_paid", buffer_size, f)),
            on_order_annulled: hooks.on_order_annulled.map(|f| EventHandler::new("order_annulled", buffer_size, f)),
            on_order_completed: hooks
                .on_order_completed
                .map(|f| EventHandler::new("order_completed", buffer_size, f)),
            on_review_created: hooks.on_review_created.map(|f| EventHandler::new("review_created", buffer_size, f)),
            on_manual_review: hooks.on_manual_review.map(|f| EventHandler::new("manual_review", buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_paid {
            result.order_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_annulled {
            result.order_annulled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_completed {
            result.order_completed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_review_created {
            result.review_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_manual_review {
            result.manual_review_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task for every configured handler. Each task lives until all producers for that event are dropped.
    pub fn start_handlers(self) {
        if let Some(handler) = self.on_order_paid {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_annulled {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_completed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_review_created {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_manual_review {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_paid: Option<Handler<OrderPaidEvent>>,
    pub on_order_annulled: Option<Handler<OrderAnnulledEvent>>,
    pub on_order_completed: Option<Handler<OrderCompletedEvent>>,
    pub on_review_created: Option<Handler<ReviewCreatedEvent>>,
    pub on_manual_review: Option<Handler<ManualReviewEvent>>,
}

impl EventHooks {
    pub fn on_order_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPaidEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_paid = Some(Arc::new(f));
        self
    }

    pub fn on_order_annulled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderAnnulledEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_annulled = Some(Arc::new(f));
        self
    }

    pub fn on_order_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCompletedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_completed = Some(Arc::new(f));
        self
    }

    pub fn on_review_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ReviewCreatedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_review_created = Some(Arc::new(f));
        self
    }

    pub fn on_manual_review<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ManualReviewEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_manual_review = Some(Arc::new(f));
        self
    }
}
