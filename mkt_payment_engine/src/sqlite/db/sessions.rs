use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{CheckoutSession, NewCheckoutSession, SessionId};

pub async fn insert_session(
    session: NewCheckoutSession,
    conn: &mut SqliteConnection,
) -> Result<CheckoutSession, sqlx::Error> {
    let details = &session.details;
    let total_amount = details.total_amount();
    let session: CheckoutSession = sqlx::query_as(
        r#"
            INSERT INTO checkout_sessions (
                id,
                listing_id,
                buyer_id,
                seller_id,
                amount,
                quantity,
                total_amount,
                billing_email,
                created_at,
                expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(&session.id)
    .bind(&details.listing_id)
    .bind(&details.buyer_id)
    .bind(&details.seller_id)
    .bind(details.amount)
    .bind(details.quantity)
    .bind(total_amount)
    .bind(details.billing_email.as_deref())
    .bind(session.created_at)
    .bind(session.expires_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Checkout session [{}] saved for listing {}", session.id, session.listing_id);
    Ok(session)
}

pub async fn fetch_session(
    session_id: &SessionId,
    conn: &mut SqliteConnection,
) -> Result<Option<CheckoutSession>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM checkout_sessions WHERE id = $1").bind(session_id).fetch_optional(conn).await
}

/// Deletes the session and returns it. Only one caller can ever get `Some` for a given session, which is what makes
/// session consumption exactly-once.
pub async fn take_session(
    session_id: &SessionId,
    conn: &mut SqliteConnection,
) -> Result<Option<CheckoutSession>, sqlx::Error> {
    sqlx::query_as("DELETE FROM checkout_sessions WHERE id = $1 RETURNING *")
        .bind(session_id)
        .fetch_optional(conn)
        .await
}

/// Deletes the session unless a payment has been seen for it. Returns `None` if the session does not exist or is
/// pinned by a payment in flight.
pub async fn cancel_session(
    session_id: &SessionId,
    conn: &mut SqliteConnection,
) -> Result<Option<CheckoutSession>, sqlx::Error> {
    sqlx::query_as("DELETE FROM checkout_sessions WHERE id = $1 AND payment_seen_at IS NULL RETURNING *")
        .bind(session_id)
        .fetch_optional(conn)
        .await
}

/// Records the first sighting of a payment for the session. Later sightings keep the original timestamp and id.
pub async fn mark_payment_seen(
    session_id: &SessionId,
    payment_id: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<CheckoutSession>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE checkout_sessions SET
                payment_seen_at = COALESCE(payment_seen_at, $2),
                payment_id = COALESCE(payment_id, $3)
            WHERE id = $1
            RETURNING *;
        "#,
    )
    .bind(session_id)
    .bind(now)
    .bind(payment_id)
    .fetch_optional(conn)
    .await
}

/// Sessions with a payment in flight are never expired.
pub async fn delete_expired_sessions(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            DELETE FROM checkout_sessions
            WHERE expires_at IS NOT NULL AND expires_at <= $1 AND payment_seen_at IS NULL
        "#,
    )
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

