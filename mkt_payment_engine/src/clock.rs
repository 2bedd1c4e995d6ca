//! Injected time source.
//!
//! Every timestamp the engine writes, and every cutoff the escalation sweeps compute, comes from a [`Clock`]. The server
//! uses [`SystemClock`]; tests use [`FixedClock`] and move it around explicitly.
use std::{
    fmt::Debug,
    sync::{Arc, RwLock},
};

use chrono::{DateTime, Duration, Utc};

pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self { time: Arc::new(RwLock::new(time)) }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        if let Ok(mut t) = self.time.write() {
            *t = time;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut t) = self.time.write() {
            *t += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.time.read() {
            Ok(t) => *t,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}
