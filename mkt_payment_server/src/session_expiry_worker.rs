use std::time::Duration;

use log::*;
use mkt_payment_engine::{clock::system_clock, CheckoutApi, SqliteDatabase};
use tokio::task::JoinHandle;

const SESSION_EXPIRY_INTERVAL: Duration = Duration::from_secs(60);

/// Starts the session expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Sessions only carry an expiry time if a session TTL is configured, so the worker is harmless without one.
pub fn start_session_expiry_worker(db: SqliteDatabase) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(SESSION_EXPIRY_INTERVAL);
        let api = CheckoutApi::new(db, system_clock());
        info!("🕰️ Checkout session expiry worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running checkout session expiry job");
            match api.expire_stale_sessions().await {
                Ok(0) => trace!("🕰️ No checkout sessions expired"),
                Ok(count) => info!("🕰️ {count} checkout sessions expired"),
                Err(e) => error!("🕰️ Error running checkout session expiry job: {e}"),
            }
        }
    })
}
