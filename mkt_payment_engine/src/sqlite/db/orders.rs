//! Order persistence.
//!
//! Every function that changes an order carries a guard on the state it expects to find, and returns `None` when the
//! guard does not match. A `None` means another writer got there first; callers treat it as a conflict, not an error.
use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType, PaymentProvider, PaymentStatus},
    traits::PaymentGatewayError,
};

/// Inserts a new order in the given state. A clash on `(payment_provider, payment_id)` is reported as
/// [`PaymentGatewayError::PaymentReferenceInUse`].
pub async fn insert_order(
    order: &NewOrder,
    status: OrderStatusType,
    payment_status: PaymentStatus,
    paid_at: Option<DateTime<Utc>>,
    review_reason: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let result = sqlx::query_as::<_, Order>(
        r#"
            INSERT INTO orders (
                id,
                listing_id,
                buyer_id,
                seller_id,
                amount,
                quantity,
                total_amount,
                status,
                payment_status,
                payment_provider,
                payment_id,
                review_reason,
                created_at,
                updated_at,
                paid_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13, $14)
            RETURNING *;
        "#,
    )
    .bind(&order.id)
    .bind(&order.listing_id)
    .bind(&order.buyer_id)
    .bind(&order.seller_id)
    .bind(order.amount)
    .bind(order.quantity)
    .bind(order.total_amount)
    .bind(status)
    .bind(payment_status)
    .bind(order.payment_provider)
    .bind(order.payment_id.as_deref())
    .bind(review_reason)
    .bind(order.created_at)
    .bind(paid_at)
    .fetch_one(conn)
    .await;
    match result {
        Ok(order) => {
            debug!("🗃️ Order [{}] inserted as {}/{}", order.id, order.status, order.payment_status);
            Ok(order)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(PaymentGatewayError::PaymentReferenceInUse(order.payment_id.clone().unwrap_or_default()))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_order_by_id(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_payment_id(
    provider: PaymentProvider,
    payment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE payment_provider = $1 AND payment_id = $2")
        .bind(provider)
        .bind(payment_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

fn push_status_guard(builder: &mut QueryBuilder<'_, Sqlite>, expected: &[PaymentStatus]) {
    builder.push(" AND payment_status IN (");
    let mut list = builder.separated(", ");
    for status in expected {
        list.push_bind(*status);
    }
    builder.push(")");
}

/// `pending -> paid`, provided the payment status is one of `expected`. The provider's payment id is stored if the
/// order does not have one yet.
pub async fn pay_order(
    order_id: &OrderId,
    expected: &[PaymentStatus],
    payment_id: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let mut builder = QueryBuilder::new("UPDATE orders SET status = 'paid', payment_status = 'paid', paid_at = ");
    builder.push_bind(now);
    builder.push(", updated_at = ");
    builder.push_bind(now);
    builder.push(", payment_id = COALESCE(payment_id, ");
    builder.push_bind(payment_id.map(String::from));
    builder.push(") WHERE id = ");
    builder.push_bind(order_id.as_str().to_string());
    builder.push(" AND status = 'pending'");
    push_status_guard(&mut builder, expected);
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    Ok(order)
}

pub async fn set_payment_status(
    order_id: &OrderId,
    to: PaymentStatus,
    expected: &[PaymentStatus],
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let mut builder = QueryBuilder::new("UPDATE orders SET payment_status = ");
    builder.push_bind(to);
    builder.push(", updated_at = ");
    builder.push_bind(now);
    builder.push(" WHERE id = ");
    builder.push_bind(order_id.as_str().to_string());
    builder.push(" AND status = 'pending'");
    push_status_guard(&mut builder, expected);
    builder.push(" RETURNING *");
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    Ok(order)
}

/// `pending -> cancelled` with `payment_status = failed`, provided the payment status is one of `expected`.
pub async fn annul_order(
    order_id: &OrderId,
    expected: &[PaymentStatus],
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let mut builder =
        QueryBuilder::new("UPDATE orders SET status = 'cancelled', payment_status = 'failed', updated_at = ");
    builder.push_bind(now);
    builder.push(" WHERE id = ");
    builder.push_bind(order_id.as_str().to_string());
    builder.push(" AND status = 'pending'");
    push_status_guard(&mut builder, expected);
    builder.push(" RETURNING *");
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    Ok(order)
}

/// Reverts a payment applied earlier in the same transaction because the stock could not be reserved. The order ends
/// up cancelled and flagged for manual review.
pub async fn revert_payment_for_stock(
    order_id: &OrderId,
    reason: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let order = sqlx::query_as(
        r#"UPDATE orders SET status = 'cancelled', payment_status = 'failed', paid_at = NULL, review_reason = $1,
        updated_at = $2 WHERE id = $3 AND status = 'paid' RETURNING *"#,
    )
    .bind(reason)
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Sets the manual review reason. The first reason recorded is kept.
pub async fn flag_for_review(
    order_id: &OrderId,
    reason: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let order = sqlx::query_as(
        "UPDATE orders SET review_reason = COALESCE(review_reason, $1), updated_at = $2 WHERE id = $3 RETURNING *",
    )
    .bind(reason)
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn attach_payment_id(
    order_id: &OrderId,
    payment_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let result = sqlx::query_as(
        r#"UPDATE orders SET payment_id = $1, updated_at = $2
        WHERE id = $3 AND payment_id IS NULL AND status = 'pending' RETURNING *"#,
    )
    .bind(payment_id)
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await;
    match result {
        Ok(order) => Ok(order),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(PaymentGatewayError::PaymentReferenceInUse(payment_id.to_string()))
        },
        Err(e) => Err(e.into()),
    }
}

/// Cancels an order for which no payment activity has been seen at all.
pub async fn cancel_unpaid_order(
    order_id: &OrderId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let order = sqlx::query_as(
        r#"UPDATE orders SET status = 'cancelled', payment_status = 'failed', updated_at = $1
        WHERE id = $2 AND status = 'pending' AND payment_status = 'pending' RETURNING *"#,
    )
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn mark_delivered(
    order_id: &OrderId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let order = sqlx::query_as(
        r#"UPDATE orders SET status = 'delivered', delivered_at = $1, updated_at = $1
        WHERE id = $2 AND status = 'paid' RETURNING *"#,
    )
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn raise_dispute(
    order_id: &OrderId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let order = sqlx::query_as(
        r#"UPDATE orders SET status = 'dispute_raised', updated_at = $1
        WHERE id = $2 AND status = 'delivered' RETURNING *"#,
    )
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn complete_delivered(
    order_id: &OrderId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let order = sqlx::query_as(
        r#"UPDATE orders SET status = 'completed', completed_at = $1, updated_at = $1
        WHERE id = $2 AND status = 'delivered' RETURNING *"#,
    )
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_delivered_before(
    cutoff: DateTime<Utc>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"SELECT * FROM orders WHERE status = 'delivered' AND delivered_at < $1
        ORDER BY delivered_at ASC LIMIT $2"#,
    )
    .bind(cutoff)
    .bind(limit)
    .fetch_all(conn)
    .await
}

pub async fn fetch_unreviewed_completed_before(
    cutoff: DateTime<Utc>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"SELECT * FROM orders o WHERE o.status = 'completed' AND o.completed_at < $1
        AND NOT EXISTS (SELECT 1 FROM reviews r WHERE r.order_id = o.id)
        ORDER BY o.completed_at ASC LIMIT $2"#,
    )
    .bind(cutoff)
    .bind(limit)
    .fetch_all(conn)
    .await
}
