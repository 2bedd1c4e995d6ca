//! Bounded pub-sub channel for engine events.
//!
//! Handlers are stateless: all they receive is the event itself. They may be async, and each event is handled on its
//! own task so that a slow subscriber never holds up the others.
//!
//! Publishing never blocks the caller. Webhook handlers must acknowledge quickly, so when a subscriber falls behind and
//! its buffer is full, the event is dropped with a warning instead of applying back-pressure to the payment flow.
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use log::*;
use tokio::sync::mpsc::{self, error::TrySendError};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    name: &'static str,
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(name: &'static str, buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        Self { name, listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.name, self.sender.clone())
    }

    /// Runs until every producer has been dropped, then waits for in-flight handler jobs to finish.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting {} event handler", self.name);
        // The handler shuts down once the last external producer goes away
        drop(self.sender);
        let jobs = Arc::new(AtomicI64::new(0));
        while let Some(ev) = self.listener.recv().await {
            trace!("📬️ Handling {} event", self.name);
            let handler = Arc::clone(&self.handler);
            jobs.fetch_add(1, Ordering::SeqCst);
            let job = jobs.clone();
            tokio::spawn(async move {
                (handler)(ev).await;
                job.fetch_sub(1, Ordering::SeqCst);
            });
        }
        while jobs.load(Ordering::SeqCst) > 0 {
            trace!("📬️ Waiting for {} {} jobs to complete", jobs.load(Ordering::SeqCst), self.name);
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }
        debug!("📬️ {} event handler has shut down", self.name);
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    name: &'static str,
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(name: &'static str, sender: mpsc::Sender<E>) -> Self {
        Self { name, sender }
    }

    /// Hands the event to the subscriber without waiting. Returns `false` if the event was dropped.
    pub fn publish_event(&self, event: E) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("📬️ The {} event buffer is full. The event has been dropped.", self.name);
                false
            },
            Err(TrySendError::Closed(_)) => {
                error!("📬️ The {} event handler has shut down. The event has been dropped.", self.name);
                false
            },
        }
    }
}
