use chrono::{DateTime, Utc};
use log::{debug, warn};
use sqlx::SqliteConnection;

use crate::db_types::{Listing, NewListing, StockDecrement};

pub async fn insert_listing(
    listing: NewListing,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Listing, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO listings (id, seller_id, title, price, stock, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, CASE WHEN $5 > 0 THEN 'active' ELSE 'sold' END, $6, $6)
            RETURNING *;
        "#,
    )
    .bind(listing.id)
    .bind(listing.seller_id)
    .bind(listing.title)
    .bind(listing.price)
    .bind(listing.stock)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn fetch_listing(listing_id: &str, conn: &mut SqliteConnection) -> Result<Option<Listing>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM listings WHERE id = $1").bind(listing_id).fetch_optional(conn).await
}

/// Removes `quantity` units from the listing's stock in a single conditional update. The listing is marked `sold` when
/// the last unit goes.
pub async fn decrement_stock(
    listing_id: &str,
    quantity: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<StockDecrement, sqlx::Error> {
    let remaining: Option<i64> = sqlx::query_scalar(
        r#"
            UPDATE listings SET
                stock = stock - $1,
                status = CASE WHEN stock - $1 = 0 THEN 'sold' ELSE 'active' END,
                updated_at = $2
            WHERE id = $3 AND stock >= $1
            RETURNING stock;
        "#,
    )
    .bind(quantity)
    .bind(now)
    .bind(listing_id)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(remaining) = remaining {
        debug!("📦 Listing {listing_id} stock reduced by {quantity}. {remaining} left.");
        return Ok(StockDecrement::Decremented { remaining });
    }
    let exists: Option<i64> =
        sqlx::query_scalar("SELECT stock FROM listings WHERE id = $1").bind(listing_id).fetch_optional(conn).await?;
    match exists {
        Some(stock) => {
            warn!("📦 Listing {listing_id} has {stock} units. Cannot take {quantity}.");
            Ok(StockDecrement::InsufficientStock)
        },
        None => {
            warn!("📦 Listing {listing_id} does not exist. Cannot take {quantity} units.");
            Ok(StockDecrement::ListingNotFound)
        },
    }
}
