use std::sync::{Arc, Mutex};

use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use mkt_payment_engine::{
    db_types::{OrderId, OrderStatusType, PaymentProvider, SessionId},
    CheckoutManagement,
    ListingManagement,
    OrderManagement,
    SqliteDatabase,
};
use pay_provider_tools::{CoinbaseCharge, NowPaymentsInvoice, ProviderApiError};
use serde_json::{json, Value};

use super::{
    helpers::{call, options, TestEnv, BUYER, SELLER},
    mocks::{MockChargeClient, MockInvoiceClient},
};
use crate::{
    checkout_routes::{CancelSessionRoute, CoinbaseCheckoutRoute, NowpaymentsCheckoutRoute},
    server::json_config,
};

fn checkout_body(quantity: i64) -> Value {
    json!({
        "listing_id": "cam",
        "listing_title": "Vintage camera",
        "amount": 2_000,
        "quantity": quantity,
        "buyer_id": BUYER,
        "seller_id": SELLER,
        "billing_email": "buyer@example.com"
    })
}

fn charge_app(
    env: &TestEnv,
    client: Option<MockChargeClient>,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let mut app = App::new()
        .app_data(json_config())
        .app_data(web::Data::new(env.checkout_api()))
        .app_data(options());
    if let Some(client) = client {
        app = app.app_data(web::Data::new(client));
    }
    app.service(web::scope("/checkout").service(CoinbaseCheckoutRoute::<SqliteDatabase, MockChargeClient>::new()))
}

fn invoice_app(
    env: &TestEnv,
    client: Option<MockInvoiceClient>,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let mut app = App::new()
        .app_data(json_config())
        .app_data(web::Data::new(env.checkout_api()))
        .app_data(options());
    if let Some(client) = client {
        app = app.app_data(web::Data::new(client));
    }
    app.service(
        web::scope("/checkout")
            .service(NowpaymentsCheckoutRoute::<SqliteDatabase, MockInvoiceClient>::new())
            .service(CancelSessionRoute::<SqliteDatabase>::new()),
    )
}

#[actix_web::test]
async fn coinbase_checkout_links_the_charge_to_a_pending_order() {
    let env = TestEnv::new().await;
    env.add_listing("cam", 2_000, 5).await;
    let mut client = MockChargeClient::new();
    client
        .expect_create_charge()
        .withf(|req| {
            req.amount == "63.00"
                && req.currency == "USD"
                && req.name == "Vintage camera"
                && req.order_id.starts_with("ord_")
                && req.redirect_url.starts_with("https://market.example/")
        })
        .times(1)
        .returning(|_| {
            Ok(CoinbaseCharge {
                id: "chg_1".into(),
                code: "CODE1".into(),
                hosted_url: "https://commerce.coinbase.com/pay/CODE1".into(),
                expires_at: None,
            })
        });
    let app = test::init_service(charge_app(&env, Some(client))).await;
    let req = TestRequest::post().uri("/checkout/coinbase").set_json(checkout_body(3)).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let res: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(res["success"], true);
    assert_eq!(res["charge_id"], "chg_1");
    assert_eq!(res["hosted_url"], "https://commerce.coinbase.com/pay/CODE1");

    let order = env.db.fetch_order_by_payment_id(PaymentProvider::Coinbase, "chg_1").await.unwrap().unwrap();
    assert_eq!(res["order_id"], order.id.as_str());
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.total_amount.value(), 6_300);
    // Stock is only taken once the payment is confirmed
    assert_eq!(env.db.fetch_listing("cam").await.unwrap().unwrap().stock, 5);
}

#[actix_web::test]
async fn coinbase_failure_abandons_the_order() {
    let env = TestEnv::new().await;
    env.add_listing("cam", 2_000, 5).await;
    let seen = Arc::new(Mutex::new(None::<String>));
    let seen_in_mock = Arc::clone(&seen);
    let mut client = MockChargeClient::new();
    client.expect_create_charge().times(1).returning(move |req| {
        *seen_in_mock.lock().unwrap() = Some(req.order_id.clone());
        Err(ProviderApiError::QueryError { status: 401, message: "Invalid API key cb_secret_123".into() })
    });
    let app = test::init_service(charge_app(&env, Some(client))).await;
    let req = TestRequest::post().uri("/checkout/coinbase").set_json(checkout_body(1)).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!body.contains("cb_secret_123"));

    let order_id = seen.lock().unwrap().clone().unwrap();
    let order = env.db.fetch_order(&OrderId(order_id)).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Cancelled);
}

#[actix_web::test]
async fn unconfigured_provider_creates_nothing() {
    let env = TestEnv::new().await;
    env.add_listing("cam", 2_000, 5).await;
    let app = test::init_service(charge_app(&env, None)).await;
    let req = TestRequest::post().uri("/checkout/coinbase").set_json(checkout_body(1)).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, r#"{"error":"Coinbase Commerce payments are not available on this server."}"#);

    let app = test::init_service(invoice_app(&env, None)).await;
    let req = TestRequest::post().uri("/checkout/nowpayments").set_json(checkout_body(1)).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn invalid_checkouts_never_reach_the_provider() {
    let env = TestEnv::new().await;
    env.add_listing("cam", 2_000, 5).await;
    let mut client = MockChargeClient::new();
    client.expect_create_charge().never();
    let app = test::init_service(charge_app(&env, Some(client))).await;

    let req = TestRequest::post().uri("/checkout/coinbase").set_json(checkout_body(0)).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = TestRequest::post().uri("/checkout/coinbase").set_json(checkout_body(6)).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = TestRequest::post()
        .uri("/checkout/coinbase")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"listing_id\": ")
        .to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with(r#"{"error":"#));
}

#[actix_web::test]
async fn nowpayments_checkout_creates_a_session() {
    let env = TestEnv::new().await;
    env.add_listing("cam", 2_000, 5).await;
    let mut client = MockInvoiceClient::new();
    client
        .expect_create_invoice()
        .withf(|req| {
            (req.price_amount - 63.0).abs() < f64::EPSILON
                && req.price_currency == "usd"
                && req.order_id.starts_with("cs_")
                && req.ipn_callback_url == "https://market.example/webhooks/nowpayments"
        })
        .times(1)
        .returning(|_| {
            Ok(NowPaymentsInvoice {
                id: "5077125051".into(),
                invoice_url: "https://nowpayments.io/payment/?iid=5077125051".into(),
            })
        });
    let app = test::init_service(invoice_app(&env, Some(client))).await;
    let req = TestRequest::post().uri("/checkout/nowpayments").set_json(checkout_body(3)).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let res: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(res["invoice_id"], "5077125051");
    let session_id = SessionId(res["session_id"].as_str().unwrap().to_string());
    let session = env.db.fetch_session(&session_id).await.unwrap().unwrap();
    assert_eq!(session.total_amount.value(), 6_300);

    // The buyer backs out
    let uri = format!("/checkout/sessions/{session_id}");
    let (status, body) = call(&app, TestRequest::delete().uri(&uri).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"deleted":true}"#);
    let (status, body) = call(&app, TestRequest::delete().uri(&uri).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"deleted":false}"#);
}

#[actix_web::test]
async fn nowpayments_failure_removes_the_session() {
    let env = TestEnv::new().await;
    env.add_listing("cam", 2_000, 5).await;
    let seen = Arc::new(Mutex::new(None::<String>));
    let seen_in_mock = Arc::clone(&seen);
    let mut client = MockInvoiceClient::new();
    client.expect_create_invoice().times(1).returning(move |req| {
        *seen_in_mock.lock().unwrap() = Some(req.order_id.clone());
        Err(ProviderApiError::RestRequestError("connection reset".into()))
    });
    let app = test::init_service(invoice_app(&env, Some(client))).await;
    let req = TestRequest::post().uri("/checkout/nowpayments").set_json(checkout_body(1)).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let session_id = SessionId(seen.lock().unwrap().clone().unwrap());
    assert!(env.db.fetch_session(&session_id).await.unwrap().is_none());
}
