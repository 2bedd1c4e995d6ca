use std::sync::Arc;

use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use mkt_common::Secret;
use mkt_payment_engine::{
    db_types::{OrderStatusType, PaymentProvider},
    providers::{CoinbaseAdapter, NowPaymentsAdapter},
    CheckoutManagement,
    ListingManagement,
    OrderManagement,
    SqliteDatabase,
};

use super::helpers::{
    call,
    checkout_request,
    coinbase_body,
    coinbase_signature,
    nowpayments_ipn,
    nowpayments_signature,
    TestEnv,
};
use crate::{
    checkout_routes::CancelSessionRoute,
    middleware::SignatureMiddlewareFactory,
    webhook_routes::{CoinbaseWebhookRoute, NowpaymentsWebhookRoute},
};

const SECRET: &str = "whsec_test";

macro_rules! coinbase_app {
    ($env:expr, $secret:expr, $required:expr) => {
        test::init_service(
            App::new().app_data(web::Data::new($env.flow_api())).service(
                web::scope("/webhooks/coinbase")
                    .wrap(SignatureMiddlewareFactory::new(Arc::new(CoinbaseAdapter), $secret, $required))
                    .service(CoinbaseWebhookRoute::<SqliteDatabase>::new()),
            ),
        )
        .await
    };
}

const IPN_SECRET: &str = "ipn_test";

macro_rules! nowpayments_app {
    ($env:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($env.flow_api()))
                .app_data(web::Data::new($env.checkout_api()))
                .service(
                    web::scope("/webhooks/nowpayments")
                        .wrap(SignatureMiddlewareFactory::new(
                            Arc::new(NowPaymentsAdapter),
                            Some(Secret::new(IPN_SECRET.to_string())),
                            true,
                        ))
                        .service(NowpaymentsWebhookRoute::<SqliteDatabase>::new()),
                )
                .service(web::scope("/checkout").service(CancelSessionRoute::<SqliteDatabase>::new())),
        )
        .await
    };
}

fn ipn(body: &str, signature: &str) -> actix_http::Request {
    TestRequest::post()
        .uri("/webhooks/nowpayments")
        .insert_header(("content-type", "application/json"))
        .insert_header(("x-nowpayments-sig", signature))
        .set_payload(body.to_string())
        .to_request()
}

fn webhook(body: &str, signature: Option<&str>) -> actix_http::Request {
    let mut req = TestRequest::post().uri("/webhooks/coinbase").insert_header(("content-type", "application/json"));
    if let Some(sig) = signature {
        req = req.insert_header(("x-cc-webhook-signature", sig));
    }
    req.set_payload(body.to_string()).to_request()
}

#[actix_web::test]
async fn signed_confirmation_pays_the_order() {
    let env = TestEnv::new().await;
    env.add_listing("cam", 2_000, 3).await;
    let req = checkout_request("cam", 2_000, 1);
    let order = env.checkout_api().create_pending_order(&req, PaymentProvider::Coinbase).await.unwrap();
    let app = coinbase_app!(env, Some(Secret::new(SECRET.to_string())), true);

    let body = coinbase_body("evt_1", "charge:confirmed", order.id.as_str(), "chg_1");
    let sig = coinbase_signature(SECRET, &body);
    let (status, res) = call(&app, webhook(&body, Some(&sig))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res, r#"{"received":true}"#);
    let paid = env.db.fetch_order(&order.id).await.unwrap().unwrap();
    assert_eq!(paid.status, OrderStatusType::Paid);
    assert_eq!(env.db.fetch_listing("cam").await.unwrap().unwrap().stock, 2);

    // A redelivery is acknowledged without another decrement
    let (status, _) = call(&app, webhook(&body, Some(&sig))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(env.db.fetch_listing("cam").await.unwrap().unwrap().stock, 2);
}

#[actix_web::test]
async fn bad_signatures_never_touch_the_database() {
    let env = TestEnv::new().await;
    env.add_listing("cam", 2_000, 3).await;
    let req = checkout_request("cam", 2_000, 1);
    let order = env.checkout_api().create_pending_order(&req, PaymentProvider::Coinbase).await.unwrap();
    let app = coinbase_app!(env, Some(Secret::new(SECRET.to_string())), false);

    let body = coinbase_body("evt_1", "charge:confirmed", order.id.as_str(), "chg_1");
    let forged = coinbase_signature("not_the_secret", &body);
    let (status, _) = call(&app, webhook(&body, Some(&forged))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, webhook(&body, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, webhook(&body, Some("not hex"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let order = env.db.fetch_order(&order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(env.db.fetch_listing("cam").await.unwrap().unwrap().stock, 3);
    assert!(env.db.fetch_webhook_event(PaymentProvider::Coinbase, "evt_1").await.unwrap().is_none());
}

#[actix_web::test]
async fn missing_secret_is_rejected_when_signatures_are_required() {
    let env = TestEnv::new().await;
    env.add_listing("cam", 2_000, 3).await;
    let req = checkout_request("cam", 2_000, 1);
    let order = env.checkout_api().create_pending_order(&req, PaymentProvider::Coinbase).await.unwrap();
    let app = coinbase_app!(env, None, true);
    let body = coinbase_body("evt_1", "charge:confirmed", order.id.as_str(), "chg_1");
    let (status, _) = call(&app, webhook(&body, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(env.db.fetch_order(&order.id).await.unwrap().unwrap().status, OrderStatusType::Pending);
}

#[actix_web::test]
async fn missing_secret_is_processed_when_signatures_are_optional() {
    let env = TestEnv::new().await;
    env.add_listing("cam", 2_000, 3).await;
    let req = checkout_request("cam", 2_000, 1);
    let order = env.checkout_api().create_pending_order(&req, PaymentProvider::Coinbase).await.unwrap();
    let app = coinbase_app!(env, None, false);
    let body = coinbase_body("evt_1", "charge:confirmed", order.id.as_str(), "chg_1");
    let (status, _) = call(&app, webhook(&body, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(env.db.fetch_order(&order.id).await.unwrap().unwrap().status, OrderStatusType::Paid);
}

#[actix_web::test]
async fn inactionable_events_are_acknowledged() {
    let env = TestEnv::new().await;
    let app = coinbase_app!(env, Some(Secret::new(SECRET.to_string())), true);

    // No order or session with this reference
    let body = coinbase_body("evt_1", "charge:confirmed", "ord_does_not_exist", "chg_1");
    let (status, res) = call(&app, webhook(&body, Some(&coinbase_signature(SECRET, &body)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res, r#"{"received":true}"#);

    // An event type that has no bearing on orders
    let body = coinbase_body("evt_2", "charge:created", "ord_does_not_exist", "chg_1");
    let (status, _) = call(&app, webhook(&body, Some(&coinbase_signature(SECRET, &body)))).await;
    assert_eq!(status, StatusCode::OK);

    // No reference at all
    let body = r#"{"id":"evt_3","type":"charge:confirmed","data":{"id":"chg_1","metadata":{}}}"#;
    let (status, _) = call(&app, webhook(body, Some(&coinbase_signature(SECRET, body)))).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn unparseable_bodies_are_rejected() {
    let env = TestEnv::new().await;
    let app = coinbase_app!(env, Some(Secret::new(SECRET.to_string())), true);
    let body = "this is not json";
    let (status, res) = call(&app, webhook(body, Some(&coinbase_signature(SECRET, body)))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(res.contains("error"));
}

#[actix_web::test]
async fn ipn_signed_over_sorted_keys_pays_the_session() {
    let env = TestEnv::new().await;
    env.add_listing("cam", 2_000, 3).await;
    let session = env.checkout_api().create_session(&checkout_request("cam", 2_000, 1)).await.unwrap();
    let app = nowpayments_app!(env);

    let (body, canonical) = nowpayments_ipn(session.id.as_str(), 5077, "finished");
    let (status, res) = call(&app, ipn(&body, &nowpayments_signature(IPN_SECRET, &canonical))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res, r#"{"received":true}"#);
    let order = env.db.fetch_order_by_payment_id(PaymentProvider::NowPayments, "5077").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    assert!(env.db.fetch_session(&session.id).await.unwrap().is_none());
    assert_eq!(env.db.fetch_listing("cam").await.unwrap().unwrap().stock, 2);
}

#[actix_web::test]
async fn ipn_with_a_bad_signature_is_rejected() {
    let env = TestEnv::new().await;
    env.add_listing("cam", 2_000, 3).await;
    let session = env.checkout_api().create_session(&checkout_request("cam", 2_000, 1)).await.unwrap();
    let app = nowpayments_app!(env);

    let (body, canonical) = nowpayments_ipn(session.id.as_str(), 5077, "finished");
    let forged = nowpayments_signature("not_the_secret", &canonical);
    let (status, _) = call(&app, ipn(&body, &forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // Signing the wire bytes instead of the sorted form does not verify either
    let (status, _) = call(&app, ipn(&body, &nowpayments_signature(IPN_SECRET, &body))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(env.db.fetch_session(&session.id).await.unwrap().is_some());
    assert_eq!(env.db.fetch_listing("cam").await.unwrap().unwrap().stock, 3);
    assert!(env.db.fetch_order_by_payment_id(PaymentProvider::NowPayments, "5077").await.unwrap().is_none());
}

#[actix_web::test]
async fn unparseable_ipn_is_rejected() {
    let env = TestEnv::new().await;
    let app = nowpayments_app!(env);
    let body = "{ not json";
    let (status, _) = call(&app, ipn(body, &nowpayments_signature(IPN_SECRET, body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn sessions_with_a_payment_in_flight_cannot_be_cancelled() {
    let env = TestEnv::new().await;
    env.add_listing("cam", 2_000, 3).await;
    let session = env.checkout_api().create_session(&checkout_request("cam", 2_000, 1)).await.unwrap();
    let app = nowpayments_app!(env);

    let (body, canonical) = nowpayments_ipn(session.id.as_str(), 5078, "confirming");
    let (status, _) = call(&app, ipn(&body, &nowpayments_signature(IPN_SECRET, &canonical))).await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/checkout/sessions/{}", session.id);
    let (status, res) = call(&app, TestRequest::delete().uri(&uri).to_request()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(res.contains("payment in progress"));
    assert!(env.db.fetch_session(&session.id).await.unwrap().is_some());

    // The confirmation still finds the session
    let (body, canonical) = nowpayments_ipn(session.id.as_str(), 5078, "finished");
    let (status, _) = call(&app, ipn(&body, &nowpayments_signature(IPN_SECRET, &canonical))).await;
    assert_eq!(status, StatusCode::OK);
    let order = env.db.fetch_order_by_payment_id(PaymentProvider::NowPayments, "5078").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
}
