use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::{Message, Order};

/// Returns the id of the buyer-seller conversation about the order's listing, creating it if needed.
pub async fn fetch_or_create_conversation(
    order: &Order,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO conversations (listing_id, buyer_id, seller_id, created_at) VALUES ($1, $2, $3, $4)
            ON CONFLICT (listing_id, buyer_id, seller_id) DO NOTHING;
        "#,
    )
    .bind(&order.listing_id)
    .bind(&order.buyer_id)
    .bind(&order.seller_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    sqlx::query_scalar("SELECT id FROM conversations WHERE listing_id = $1 AND buyer_id = $2 AND seller_id = $3")
        .bind(&order.listing_id)
        .bind(&order.buyer_id)
        .bind(&order.seller_id)
        .fetch_one(conn)
        .await
}

/// Posts a message with no sender, flagged as a system message.
pub async fn insert_system_message(
    conversation_id: i64,
    body: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Message, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO messages (conversation_id, sender_id, body, is_system, created_at)
            VALUES ($1, NULL, $2, TRUE, $3)
            RETURNING *;
        "#,
    )
    .bind(conversation_id)
    .bind(body)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn fetch_messages_for_order(order: &Order, conn: &mut SqliteConnection) -> Result<Vec<Message>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT m.* FROM messages m JOIN conversations c ON m.conversation_id = c.id
            WHERE c.listing_id = $1 AND c.buyer_id = $2 AND c.seller_id = $3
            ORDER BY m.id ASC
        "#,
    )
    .bind(&order.listing_id)
    .bind(&order.buyer_id)
    .bind(&order.seller_id)
    .fetch_all(conn)
    .await
}
