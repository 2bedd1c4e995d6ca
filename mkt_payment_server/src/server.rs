use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use mkt_payment_engine::{
    clock::system_clock,
    events::EventProducers,
    providers::{CoinbaseAdapter, NowPaymentsAdapter},
    CheckoutApi,
    EscalationApi,
    OrderFlowApi,
    SqliteDatabase,
};
use pay_provider_tools::{CoinbaseCommerceApi, NowPaymentsApi};

use crate::{
    checkout_routes::{CancelSessionRoute, CoinbaseCheckoutRoute, NowpaymentsCheckoutRoute},
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::notifications::create_notification_handlers,
    middleware::{BearerAuthMiddlewareFactory, SignatureMiddlewareFactory},
    routes::{
        health,
        AutoCompleteRoute,
        AutoReviewRoute,
        MarkDeliveredRoute,
        OrderByIdRoute,
        RaiseDisputeRoute,
        SweepLocks,
    },
    session_expiry_worker::start_session_expiry_worker,
    webhook_routes::{CoinbaseWebhookRoute, NowpaymentsWebhookRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(format!("Migrations failed. {e}")))?;
    let handlers = create_notification_handlers(config.notify_url.clone())?;
    let producers = handlers.producers();
    handlers.start_handlers();
    // The worker runs for the lifetime of the process
    let _expiry = start_session_expiry_worker(db.clone());
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Payload errors from the JSON extractor are reported in the same shape as every other error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into())
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let coinbase_client = config
        .coinbase
        .is_configured()
        .then(|| CoinbaseCommerceApi::new(&config.coinbase))
        .transpose()
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let nowpayments_client = config
        .nowpayments
        .is_configured()
        .then(|| NowPaymentsApi::new(&config.nowpayments))
        .transpose()
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.require_webhook_signatures {
        info!("🪛️ Webhooks from providers without a configured secret will be rejected");
    }
    // Shared by all workers, so that a sweep is only ever running once per process
    let sweep_locks = web::Data::new(SweepLocks::default());
    let bind_host = config.host.clone();
    let bind_port = config.port;
    let srv = HttpServer::new(move || {
        let clock = system_clock();
        let checkout_api = CheckoutApi::new(db.clone(), Arc::clone(&clock)).with_session_ttl(config.session_ttl);
        let flow_api = OrderFlowApi::new(db.clone(), producers.clone(), Arc::clone(&clock));
        let escalation_api = EscalationApi::new(db.clone(), producers.clone(), clock, config.sweep_policy.clone());
        let mut app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mkt::access_log"))
            .app_data(json_config())
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(escalation_api))
            .app_data(web::Data::new(ServerOptions::from_config(&config)))
            .app_data(sweep_locks.clone());
        if let Some(client) = &coinbase_client {
            app = app.app_data(web::Data::new(client.clone()));
        }
        if let Some(client) = &nowpayments_client {
            app = app.app_data(web::Data::new(client.clone()));
        }
        let require_signatures = config.require_webhook_signatures;
        let webhook_scope = web::scope("/webhooks")
            .service(
                web::scope("/coinbase")
                    .wrap(SignatureMiddlewareFactory::new(
                        Arc::new(CoinbaseAdapter),
                        config.coinbase.webhook_secret.clone(),
                        require_signatures,
                    ))
                    .service(CoinbaseWebhookRoute::<SqliteDatabase>::new()),
            )
            .service(
                web::scope("/nowpayments")
                    .wrap(SignatureMiddlewareFactory::new(
                        Arc::new(NowPaymentsAdapter),
                        config.nowpayments.ipn_secret.clone(),
                        require_signatures,
                    ))
                    .service(NowpaymentsWebhookRoute::<SqliteDatabase>::new()),
            );
        let checkout_scope = web::scope("/checkout")
            .service(CoinbaseCheckoutRoute::<SqliteDatabase, CoinbaseCommerceApi>::new())
            .service(NowpaymentsCheckoutRoute::<SqliteDatabase, NowPaymentsApi>::new())
            .service(CancelSessionRoute::<SqliteDatabase>::new());
        let cron_scope = web::scope("/cron")
            .wrap(BearerAuthMiddlewareFactory::new(config.cron_secret.clone()))
            .service(AutoCompleteRoute::<SqliteDatabase>::new())
            .service(AutoReviewRoute::<SqliteDatabase>::new());
        let orders_scope = web::scope("/orders")
            .wrap(BearerAuthMiddlewareFactory::new(config.cron_secret.clone()))
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(MarkDeliveredRoute::<SqliteDatabase>::new())
            .service(RaiseDisputeRoute::<SqliteDatabase>::new());
        app.service(health).service(webhook_scope).service(checkout_scope).service(cron_scope).service(orders_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((bind_host.as_str(), bind_port))?
    .run();
    Ok(srv)
}
