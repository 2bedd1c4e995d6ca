#![allow(dead_code)]
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use mkt_payment_engine::{
    clock::FixedClock,
    db_types::{Cents, Listing, NewListing},
    events::EventProducers,
    order_objects::CheckoutRequest,
    providers::{CoinbaseAdapter, NormalizedEvent, NowPaymentsAdapter, PaymentProviderAdapter},
    test_utils::prepare_env::new_test_db,
    CheckoutApi,
    ListingManagement,
    OrderFlowApi,
    SqliteDatabase,
};
use serde_json::json;

pub const SELLER: &str = "seller_1";
pub const BUYER: &str = "buyer_1";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap()
}

pub struct Harness {
    pub db: SqliteDatabase,
    pub clock: FixedClock,
    pub checkout: CheckoutApi<SqliteDatabase>,
    pub flow: OrderFlowApi<SqliteDatabase>,
}

pub async fn setup() -> Harness {
    setup_with_producers(EventProducers::default()).await
}

pub async fn setup_with_producers(producers: EventProducers) -> Harness {
    let db = new_test_db().await;
    let clock = FixedClock::new(t0());
    let checkout = CheckoutApi::new(db.clone(), Arc::new(clock.clone()));
    let flow = OrderFlowApi::new(db.clone(), producers, Arc::new(clock.clone()));
    Harness { db, clock, checkout, flow }
}

pub async fn add_listing(db: &SqliteDatabase, id: &str, price: i64, stock: i64) -> Listing {
    let listing = NewListing::new(id, SELLER, Cents::from(price), stock).with_title("Vintage camera");
    db.insert_listing(listing, t0()).await.expect("Error inserting listing")
}

pub fn checkout_request(listing_id: &str, amount: i64, quantity: i64) -> CheckoutRequest {
    CheckoutRequest {
        listing_id: listing_id.to_string(),
        listing_title: Some("Vintage camera".to_string()),
        amount: Cents::from(amount),
        quantity,
        buyer_id: BUYER.to_string(),
        seller_id: SELLER.to_string(),
        billing_email: Some("buyer@example.com".to_string()),
    }
}

/// A Coinbase Commerce charge event, run through the real adapter.
pub fn coinbase_event(event_id: &str, event_type: &str, order_id: &str, charge_id: &str) -> NormalizedEvent {
    let body = json!({
        "id": event_id,
        "type": event_type,
        "data": { "id": charge_id, "code": "CODE1", "metadata": { "order_id": order_id } }
    });
    CoinbaseAdapter
        .normalize(body.to_string().as_bytes())
        .expect("valid coinbase body")
        .expect("relevant coinbase event")
}

/// A NOWPayments IPN callback, run through the real adapter.
pub fn nowpayments_event(session_id: &str, payment_id: u64, status: &str) -> NormalizedEvent {
    let body = json!({
        "payment_id": payment_id,
        "payment_status": status,
        "order_id": session_id,
        "price_amount": 105.0,
        "pay_currency": "btc"
    });
    NowPaymentsAdapter
        .normalize(body.to_string().as_bytes())
        .expect("valid nowpayments body")
        .expect("relevant nowpayments event")
}
