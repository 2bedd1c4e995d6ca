use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{NewReview, OrderId, Review};

/// Inserts the review, unless the order already has one. The unique index on `order_id` makes this exactly-once even
/// if two sweeps race.
pub async fn insert_review_if_absent(
    review: NewReview,
    conn: &mut SqliteConnection,
) -> Result<Option<Review>, sqlx::Error> {
    let review: Option<Review> = sqlx::query_as(
        r#"
            INSERT INTO reviews (order_id, listing_id, reviewer_id, seller_id, rating, comment, is_auto_generated,
                created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (order_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(review.order_id)
    .bind(review.listing_id)
    .bind(review.reviewer_id)
    .bind(review.seller_id)
    .bind(review.rating)
    .bind(review.comment)
    .bind(review.is_auto_generated)
    .bind(review.created_at)
    .fetch_optional(conn)
    .await?;
    if let Some(r) = &review {
        debug!("🗃️ Review #{} saved for order {}", r.id, r.order_id);
    }
    Ok(review)
}

pub async fn fetch_reviews_for_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<Review>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM reviews WHERE order_id = $1").bind(order_id).fetch_all(conn).await
}
