//! Forwards engine events to an external notification service.
//!
//! Every event is POSTed as JSON to `MKT_NOTIFY_URL`. Delivery is best-effort: failures are logged and never retried,
//! and nothing here can hold up a webhook response since handlers run on their own tasks. Without a URL, events are
//! only logged.
use std::sync::Arc;

use futures::future::BoxFuture;
use log::*;
use mkt_payment_engine::events::{
    EventHandlers,
    EventHooks,
    EventType,
    ManualReviewEvent,
    OrderAnnulledEvent,
    OrderCompletedEvent,
    OrderPaidEvent,
    ReviewCreatedEvent,
};
use reqwest::Client;

use crate::errors::ServerError;

pub const NOTIFICATION_EVENT_BUFFER_SIZE: usize = 64;

#[derive(Clone)]
struct Notifier {
    client: Client,
    url: Option<Arc<String>>,
}

impl Notifier {
    fn send(&self, event: EventType) -> BoxFuture<'static, ()> {
        let Some(url) = self.url.clone() else {
            return Box::pin(async move {
                info!("📬️ {} event: {}", event.name(), serde_json::to_string(&event).unwrap_or_default());
            });
        };
        let client = self.client.clone();
        Box::pin(async move {
            let name = event.name();
            match client.post(url.as_str()).json(&event).send().await {
                Ok(res) if res.status().is_success() => debug!("📬️ {name} notification delivered"),
                Ok(res) => warn!("📬️ {name} notification was rejected with status {}", res.status()),
                Err(e) => warn!("📬️ Could not deliver {name} notification. {e}"),
            }
        })
    }
}

/// Builds event handlers that forward every engine event to `notify_url`, or log it if there is none.
pub fn create_notification_handlers(notify_url: Option<String>) -> Result<EventHandlers, ServerError> {
    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(|e| ServerError::InitializeError(format!("Could not create notification client. {e}")))?;
    match &notify_url {
        Some(url) => info!("📬️ Event notifications will be sent to {url}"),
        None => info!("📬️ MKT_NOTIFY_URL is not set. Event notifications will only be logged."),
    }
    let notifier = Notifier { client, url: notify_url.map(Arc::new) };
    let mut hooks = EventHooks::default();
    let n = notifier.clone();
    hooks.on_order_paid(move |ev: OrderPaidEvent| n.send(EventType::OrderPaid(ev)));
    let n = notifier.clone();
    hooks.on_order_annulled(move |ev: OrderAnnulledEvent| n.send(EventType::OrderAnnulled(ev)));
    let n = notifier.clone();
    hooks.on_order_completed(move |ev: OrderCompletedEvent| n.send(EventType::OrderCompleted(ev)));
    let n = notifier.clone();
    hooks.on_review_created(move |ev: ReviewCreatedEvent| n.send(EventType::ReviewCreated(ev)));
    hooks.on_manual_review(move |ev: ManualReviewEvent| {
        warn!("📬️ Manual review needed for {} {}: {}", ev.provider, ev.reference, ev.reason);
        notifier.send(EventType::ManualReview(ev))
    });
    Ok(EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks))
}
