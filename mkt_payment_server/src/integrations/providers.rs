//! The seams between the checkout routes and the payment provider HTTP clients.
//!
//! Route handlers are generic over these traits, so endpoint tests can swap in mocks for the real clients.
use pay_provider_tools::{
    ChargeRequest,
    CoinbaseCharge,
    CoinbaseCommerceApi,
    InvoiceRequest,
    NowPaymentsApi,
    NowPaymentsInvoice,
    ProviderApiError,
};

/// A provider that hosts a payment page for a single charge, linked to a pending order.
#[allow(async_fn_in_trait)]
pub trait ChargeProvider {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<CoinbaseCharge, ProviderApiError>;
}

/// A provider that issues an invoice for a checkout session, and calls back once it has been paid.
#[allow(async_fn_in_trait)]
pub trait InvoiceProvider {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<NowPaymentsInvoice, ProviderApiError>;
}

impl ChargeProvider for CoinbaseCommerceApi {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<CoinbaseCharge, ProviderApiError> {
        CoinbaseCommerceApi::create_charge(self, request).await
    }
}

impl InvoiceProvider for NowPaymentsApi {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<NowPaymentsInvoice, ProviderApiError> {
        NowPaymentsApi::create_invoice(self, request).await
    }
}
