//! The idempotency ledger. One row per `(provider, event_key)`.
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{PaymentProvider, WebhookEvent},
    providers::NormalizedEvent,
};

/// Records the event. Returns `false` if it was already recorded, in which case nothing was written.
pub async fn record_event(
    event: &NormalizedEvent,
    received_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO webhook_events (provider, event_key, event_type, reference, payment_id, received_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (provider, event_key) DO NOTHING;
        "#,
    )
    .bind(event.provider)
    .bind(&event.event_key)
    .bind(&event.event_type)
    .bind(&event.reference)
    .bind(event.payment_id.as_deref())
    .bind(received_at)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_outcome(
    provider: PaymentProvider,
    event_key: &str,
    outcome: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE webhook_events SET outcome = $1 WHERE provider = $2 AND event_key = $3")
        .bind(outcome)
        .bind(provider)
        .bind(event_key)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_event(
    provider: PaymentProvider,
    event_key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<WebhookEvent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM webhook_events WHERE provider = $1 AND event_key = $2")
        .bind(provider)
        .bind(event_key)
        .fetch_optional(conn)
        .await
}
