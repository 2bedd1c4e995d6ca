use std::sync::Arc;

use log::*;
use reqwest::Client;

use crate::{
    client::{build_client, post_json},
    config::NowPaymentsConfig,
    data_objects::{InvoiceRequest, NowPaymentsInvoice},
    ProviderApiError,
};

pub const NOWPAYMENTS_INVOICE_URL: &str = "https://api.nowpayments.io/v1/invoice";

#[derive(Clone)]
pub struct NowPaymentsApi {
    client: Arc<Client>,
    url: String,
}

impl NowPaymentsApi {
    pub fn new(config: &NowPaymentsConfig) -> Result<Self, ProviderApiError> {
        Self::new_with_url(config, NOWPAYMENTS_INVOICE_URL)
    }

    pub fn new_with_url(config: &NowPaymentsConfig, url: &str) -> Result<Self, ProviderApiError> {
        let key = config.api_key.as_ref().ok_or(ProviderApiError::NotConfigured("NOWPayments"))?;
        let client = build_client(&[("x-api-key", key.reveal().as_str())])?;
        Ok(Self { client: Arc::new(client), url: url.to_string() })
    }

    pub async fn create_invoice(&self, request: &InvoiceRequest) -> Result<NowPaymentsInvoice, ProviderApiError> {
        debug!("Creating NOWPayments invoice for session {}", request.order_id);
        let invoice = post_json::<NowPaymentsInvoice, _>(&self.client, &self.url, request).await?;
        info!("NOWPayments invoice {} created for session {}", invoice.id, request.order_id);
        Ok(invoice)
    }
}
