//! Buyer-facing checkout.
//!
//! A checkout creates local state first (a pending order for Coinbase Commerce, a checkout session for NOWPayments),
//! and then asks the provider for a payment page that refers back to it. If the provider call fails, the local state is
//! removed again and the buyer gets a `502` with a generic message.
//!
//! A provider that is not configured on this server answers with `503` before anything is written.
use actix_web::{web, HttpResponse};
use log::*;
use mkt_common::DEFAULT_CURRENCY_CODE;
use mkt_payment_engine::{
    db_types::{PaymentProvider, SessionId},
    order_objects::CheckoutRequest,
    CheckoutApi,
    CheckoutManagement,
};
use pay_provider_tools::{ChargeRequest, InvoiceRequest};

use crate::{
    config::ServerOptions,
    data_objects::{ChargeCheckoutResponse, InvoiceCheckoutResponse, SessionCancelResponse},
    errors::ServerError,
    integrations::providers::{ChargeProvider, InvoiceProvider},
    route,
};

fn display_name(request: &CheckoutRequest) -> String {
    request
        .listing_title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .unwrap_or_else(|| format!("Listing {}", request.listing_id))
}

route!(coinbase_checkout => Post "/coinbase" impl CheckoutManagement, ChargeProvider);
pub async fn coinbase_checkout<B: CheckoutManagement, C: ChargeProvider>(
    body: web::Json<CheckoutRequest>,
    api: web::Data<CheckoutApi<B>>,
    client: Option<web::Data<C>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let Some(client) = client else {
        debug!("🛒 Coinbase Commerce checkout requested, but no API key is configured");
        return Err(ServerError::ProviderNotConfigured("Coinbase Commerce".to_string()));
    };
    let request = body.into_inner();
    let order = api.create_pending_order(&request, PaymentProvider::Coinbase).await?;
    let name = display_name(&request);
    let charge_request = ChargeRequest {
        order_id: order.id.to_string(),
        description: format!("{} x {name}", order.quantity),
        name,
        amount: order.total_amount.to_string(),
        currency: DEFAULT_CURRENCY_CODE.to_string(),
        redirect_url: options.url(&format!("/checkout/complete?order_id={}", order.id)),
        cancel_url: options.url(&format!("/checkout/cancelled?order_id={}", order.id)),
    };
    let charge = match client.create_charge(&charge_request).await {
        Ok(charge) => charge,
        Err(e) => {
            error!("🛒 Coinbase Commerce could not create a charge for order {}. {e}", order.id);
            if let Err(e) = api.abandon_order(&order.id).await {
                error!("🛒 Could not clean up pending order {} after the failed charge. {e}", order.id);
            }
            return Err(ServerError::UpstreamError);
        },
    };
    let order = match api.attach_payment_reference(&order.id, &charge.id).await {
        Ok(order) => order,
        Err(e) => {
            error!("🛒 Could not link charge {} to order {}. {e}", charge.id, order.id);
            if let Err(e) = api.abandon_order(&order.id).await {
                error!("🛒 Could not clean up pending order {}. {e}", order.id);
            }
            return Err(e.into());
        },
    };
    info!("🛒 Coinbase Commerce charge {} created for order {}", charge.id, order.id);
    Ok(HttpResponse::Ok().json(ChargeCheckoutResponse {
        success: true,
        charge_id: charge.id,
        hosted_url: charge.hosted_url,
        order_id: order.id,
    }))
}

route!(nowpayments_checkout => Post "/nowpayments" impl CheckoutManagement, InvoiceProvider);
pub async fn nowpayments_checkout<B: CheckoutManagement, C: InvoiceProvider>(
    body: web::Json<CheckoutRequest>,
    api: web::Data<CheckoutApi<B>>,
    client: Option<web::Data<C>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let Some(client) = client else {
        debug!("🛒 NOWPayments checkout requested, but no API key is configured");
        return Err(ServerError::ProviderNotConfigured("NOWPayments".to_string()));
    };
    let request = body.into_inner();
    let session = api.create_session(&request).await?;
    #[allow(clippy::cast_precision_loss)]
    let price_amount = session.total_amount.value() as f64 / 100.0;
    let invoice_request = InvoiceRequest {
        price_amount,
        price_currency: DEFAULT_CURRENCY_CODE.to_lowercase(),
        order_id: session.id.to_string(),
        order_description: format!("{} x {}", session.quantity, display_name(&request)),
        ipn_callback_url: options.url("/webhooks/nowpayments"),
        success_url: options.url(&format!("/checkout/complete?session_id={}", session.id)),
        cancel_url: options.url(&format!("/checkout/cancelled?session_id={}", session.id)),
    };
    let invoice = match client.create_invoice(&invoice_request).await {
        Ok(invoice) => invoice,
        Err(e) => {
            error!("🛒 NOWPayments could not create an invoice for session {}. {e}", session.id);
            if let Err(e) = api.expire_or_cancel(&session.id).await {
                error!("🛒 Could not clean up checkout session {} after the failed invoice. {e}", session.id);
            }
            return Err(ServerError::UpstreamError);
        },
    };
    info!("🛒 NOWPayments invoice {} created for session {}", invoice.id, session.id);
    Ok(HttpResponse::Ok().json(InvoiceCheckoutResponse {
        success: true,
        invoice_id: invoice.id,
        invoice_url: invoice.invoice_url,
        session_id: session.id,
    }))
}

route!(cancel_session => Delete "/sessions/{session_id}" impl CheckoutManagement);
pub async fn cancel_session<B: CheckoutManagement>(
    path: web::Path<SessionId>,
    api: web::Data<CheckoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let session_id = path.into_inner();
    let deleted = api.expire_or_cancel(&session_id).await?;
    Ok(HttpResponse::Ok().json(SessionCancelResponse { success: true, deleted }))
}
