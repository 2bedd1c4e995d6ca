use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use chrono::Duration;
use mkt_common::Secret;
use mkt_payment_engine::{db_types::OrderStatusType, OrderManagement, SqliteDatabase};
use serde_json::Value;

use super::helpers::{call, TestEnv};
use crate::{
    middleware::BearerAuthMiddlewareFactory,
    routes::{AutoCompleteRoute, AutoReviewRoute, MarkDeliveredRoute, OrderByIdRoute, RaiseDisputeRoute, SweepLocks},
};

const CRON_SECRET: &str = "cron_s3cret";

macro_rules! operator_app {
    ($env:expr, $locks:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($env.flow_api()))
                .app_data(web::Data::new($env.escalation_api()))
                .app_data($locks.clone())
                .service(
                    web::scope("/cron")
                        .wrap(BearerAuthMiddlewareFactory::new(Some(Secret::new(CRON_SECRET.to_string()))))
                        .service(AutoCompleteRoute::<SqliteDatabase>::new())
                        .service(AutoReviewRoute::<SqliteDatabase>::new()),
                )
                .service(
                    web::scope("/orders")
                        .wrap(BearerAuthMiddlewareFactory::new(Some(Secret::new(CRON_SECRET.to_string()))))
                        .service(OrderByIdRoute::<SqliteDatabase>::new())
                        .service(MarkDeliveredRoute::<SqliteDatabase>::new())
                        .service(RaiseDisputeRoute::<SqliteDatabase>::new()),
                ),
        )
        .await
    };
}

fn authorized(req: TestRequest) -> actix_http::Request {
    req.insert_header(("Authorization", format!("Bearer {CRON_SECRET}"))).to_request()
}

#[actix_web::test]
async fn sweeps_report_their_results() {
    let env = TestEnv::new().await;
    env.add_listing("cam", 2_000, 5).await;
    let order = env.paid_order("cam", "chg_1").await;
    env.flow_api().mark_delivered(&order.id).await.unwrap();
    let locks = web::Data::new(SweepLocks::default());
    let app = operator_app!(env, locks);

    env.clock.advance(Duration::hours(49));
    let (status, body) = call(&app, authorized(TestRequest::get().uri("/cron/auto-complete"))).await;
    assert_eq!(status, StatusCode::OK);
    let res: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(res["completed"], 1);
    assert_eq!(res["errors"], 0);
    assert_eq!(res["truncated"], false);
    assert_eq!(res["results"][0]["order_id"], order.id.as_str());
    assert_eq!(res["results"][0]["status"], "completed");

    env.clock.advance(Duration::hours(49));
    let (status, body) = call(&app, authorized(TestRequest::get().uri("/cron/auto-review"))).await;
    assert_eq!(status, StatusCode::OK);
    let res: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(res["created"], 1);
    assert_eq!(res["results"][0]["status"], "review_created");

    // Both sweeps are safe to re-run
    let (_, body) = call(&app, authorized(TestRequest::get().uri("/cron/auto-review"))).await;
    let res: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(res["created"], 0);
    assert_eq!(res["results"].as_array().map(Vec::len), Some(0));
}

#[actix_web::test]
async fn sweeps_require_the_cron_secret() {
    let env = TestEnv::new().await;
    let locks = web::Data::new(SweepLocks::default());
    let app = operator_app!(env, locks);
    let (status, _) = call(&app, TestRequest::get().uri("/cron/auto-complete").to_request()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let req = TestRequest::get().uri("/cron/auto-review").insert_header(("Authorization", "Bearer wrong")).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // A prefix of the secret is not the secret
    let req = TestRequest::get()
        .uri("/cron/auto-review")
        .insert_header(("Authorization", format!("Bearer {}", &CRON_SECRET[..CRON_SECRET.len() - 1])))
        .to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, TestRequest::get().uri("/orders/ord_x").to_request()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn overlapping_sweeps_are_turned_away() {
    let env = TestEnv::new().await;
    let locks = web::Data::new(SweepLocks::default());
    let app = operator_app!(env, locks);
    let _running = locks.auto_complete.lock().await;
    let (status, _) = call(&app, authorized(TestRequest::get().uri("/cron/auto-complete"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    // The other sweep has its own lock
    let (status, _) = call(&app, authorized(TestRequest::get().uri("/cron/auto-review"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn operators_drive_delivery_and_disputes() {
    let env = TestEnv::new().await;
    env.add_listing("cam", 2_000, 5).await;
    let order = env.paid_order("cam", "chg_1").await;
    let locks = web::Data::new(SweepLocks::default());
    let app = operator_app!(env, locks);

    let uri = format!("/orders/{}", order.id);
    let (status, body) = call(&app, authorized(TestRequest::get().uri(&uri))).await;
    assert_eq!(status, StatusCode::OK);
    let res: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(res["status"], "paid");

    // Only delivered orders can be disputed
    let (status, _) = call(&app, authorized(TestRequest::post().uri(&format!("{uri}/dispute")))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&app, authorized(TestRequest::post().uri(&format!("{uri}/delivered")))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, authorized(TestRequest::post().uri(&format!("{uri}/dispute")))).await;
    assert_eq!(status, StatusCode::OK);
    let order = env.db.fetch_order(&order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::DisputeRaised);

    let (status, _) = call(&app, authorized(TestRequest::get().uri("/orders/ord_missing"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
