use std::sync::Arc;

use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test,
    web,
};
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use log::debug;
use mkt_payment_engine::{
    clock::FixedClock,
    db_types::{Cents, NewListing, Order, PaymentProvider},
    events::EventProducers,
    order_objects::CheckoutRequest,
    providers::{CoinbaseAdapter, PaymentProviderAdapter},
    test_utils::prepare_env::new_test_db,
    CheckoutApi,
    EscalationApi,
    ListingManagement,
    OrderFlowApi,
    SqliteDatabase,
    SweepPolicy,
};
use serde_json::json;
use sha2::{Sha256, Sha512};

use crate::config::ServerOptions;

pub const SELLER: &str = "seller_1";
pub const BUYER: &str = "buyer_1";
pub const PUBLIC_URL: &str = "https://market.example";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap()
}

/// A fresh database and a clock that only moves when told to.
pub struct TestEnv {
    pub db: SqliteDatabase,
    pub clock: FixedClock,
}

impl TestEnv {
    pub async fn new() -> Self {
        let db = new_test_db().await;
        Self { db, clock: FixedClock::new(t0()) }
    }

    pub async fn add_listing(&self, id: &str, price: i64, stock: i64) {
        let listing = NewListing::new(id, SELLER, Cents::from(price), stock).with_title("Vintage camera");
        self.db.insert_listing(listing, t0()).await.expect("Error inserting listing");
    }

    pub fn checkout_api(&self) -> CheckoutApi<SqliteDatabase> {
        CheckoutApi::new(self.db.clone(), Arc::new(self.clock.clone()))
    }

    pub fn flow_api(&self) -> OrderFlowApi<SqliteDatabase> {
        OrderFlowApi::new(self.db.clone(), EventProducers::default(), Arc::new(self.clock.clone()))
    }

    pub fn escalation_api(&self) -> EscalationApi<SqliteDatabase> {
        EscalationApi::new(
            self.db.clone(),
            EventProducers::default(),
            Arc::new(self.clock.clone()),
            SweepPolicy::default(),
        )
    }

    /// A paid Coinbase order, driven through the engine directly.
    pub async fn paid_order(&self, listing_id: &str, charge_id: &str) -> Order {
        let request = checkout_request(listing_id, 2_000, 1);
        let order = self.checkout_api().create_pending_order(&request, PaymentProvider::Coinbase).await.unwrap();
        let body = coinbase_body(&format!("evt_{charge_id}"), "charge:confirmed", order.id.as_str(), charge_id);
        let event = CoinbaseAdapter.normalize(body.as_bytes()).unwrap().unwrap();
        self.flow_api().process_event(&event).await.unwrap();
        self.flow_api().fetch_order(&order.id).await.unwrap()
    }
}

pub fn options() -> web::Data<ServerOptions> {
    web::Data::new(ServerOptions { public_url: PUBLIC_URL.to_string() })
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

pub fn coinbase_body(event_id: &str, event_type: &str, order_id: &str, charge_id: &str) -> String {
    json!({
        "id": event_id,
        "type": event_type,
        "data": { "id": charge_id, "code": "CODE1", "metadata": { "order_id": order_id } }
    })
    .to_string()
}

pub fn coinbase_signature(secret: &str, body: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// NOWPayments signs the IPN body re-serialized with sorted keys, so the signature is taken over `canonical` rather
/// than the bytes on the wire.
pub fn nowpayments_signature(secret: &str, canonical: &str) -> String {
    let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(canonical.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// An IPN body with its keys out of order, and the sorted form the signature is computed over.
pub fn nowpayments_ipn(session_id: &str, payment_id: u64, status: &str) -> (String, String) {
    let body = format!(
        r#"{{ "payment_status": "{status}", "price_amount": 21, "payment_id": {payment_id}, "pay_currency": "btc", "order_id": "{session_id}" }}"#
    );
    let canonical = format!(
        r#"{{"order_id":"{session_id}","pay_currency":"btc","payment_id":{payment_id},"payment_status":"{status}","price_amount":21}}"#
    );
    (body, canonical)
}

/// Sends the request and returns the status and body, whether the response came from a handler or a middleware
/// rejected the request.
pub async fn call<S, B>(service: &S, req: Request) -> (StatusCode, String)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    match test::try_call_service(service, req).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            let body = String::from_utf8_lossy(&body).into_owned();
            debug!("Response: {status} {body}");
            (status, body)
        },
        Err(e) => {
            debug!("Request was rejected: {e}");
            (e.as_response_error().status_code(), e.to_string())
        },
    }
}
