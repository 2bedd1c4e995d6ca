//! Payment provider webhooks.
//!
//! Signatures have already been checked by [`crate::middleware::SignatureMiddlewareFactory`] by the time a request gets
//! here. The handlers normalize the body with the provider's adapter and hand the result to the order flow API.
//!
//! Providers redeliver anything that is not acknowledged with a `2xx`. So everything that redelivery cannot fix is
//! acknowledged (unknown references, irrelevant event types, conflicts), and only persistence failures return `500`.
use actix_web::{web, HttpResponse};
use log::*;
use mkt_payment_engine::{
    providers::{CoinbaseAdapter, NormalizeError, NowPaymentsAdapter, PaymentProviderAdapter},
    OrderFlowApi,
    OrderFlowError,
    PaymentGatewayDatabase,
};

use crate::{data_objects::WebhookAck, errors::ServerError, route};

route!(coinbase_webhook => Post "" impl PaymentGatewayDatabase);
pub async fn coinbase_webhook<B: PaymentGatewayDatabase>(
    body: web::Bytes,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("🪝 Received Coinbase Commerce webhook");
    ingest(&CoinbaseAdapter, &body, api.as_ref()).await
}

route!(nowpayments_webhook => Post "" impl PaymentGatewayDatabase);
pub async fn nowpayments_webhook<B: PaymentGatewayDatabase>(
    body: web::Bytes,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("🪝 Received NOWPayments IPN callback");
    ingest(&NowPaymentsAdapter, &body, api.as_ref()).await
}

async fn ingest<A, B>(adapter: &A, body: &[u8], api: &OrderFlowApi<B>) -> Result<HttpResponse, ServerError>
where
    A: PaymentProviderAdapter,
    B: PaymentGatewayDatabase,
{
    let provider = adapter.provider();
    let event = match adapter.normalize(body) {
        Ok(Some(event)) => event,
        Ok(None) => {
            debug!("🪝 {provider} sent an event type that does not affect orders. Acknowledged.");
            return Ok(ack());
        },
        Err(e @ NormalizeError::MissingReference { .. }) => {
            warn!("🪝 {provider} webhook cannot be matched to anything. {e}");
            return Ok(ack());
        },
        Err(e) => {
            warn!("🪝 Could not read {provider} webhook. {e}");
            return Err(ServerError::InvalidRequestBody(e.to_string()));
        },
    };
    debug!("🪝 {provider} event {} ({}) for {}", event.event_key, event.event_type, event.reference);
    match api.process_event(&event).await {
        Ok(outcome) => {
            info!("🪝 {provider} event {} processed: {}", event.event_key, outcome.label());
            Ok(ack())
        },
        Err(OrderFlowError::PersistenceError(e)) => {
            error!("🪝 Could not store {provider} event {}. The provider will redeliver it. {e}", event.event_key);
            Err(ServerError::BackendError(e))
        },
        Err(e) => {
            warn!("🪝 {provider} event {} was not applied. {e}", event.event_key);
            Ok(ack())
        },
    }
}

fn ack() -> HttpResponse {
    HttpResponse::Ok().json(WebhookAck::received())
}
