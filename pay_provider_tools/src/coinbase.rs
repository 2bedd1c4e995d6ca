use std::sync::Arc;

use log::*;
use reqwest::Client;

use crate::{
    client::{build_client, post_json},
    config::CoinbaseConfig,
    data_objects::{ChargeBody, ChargeRequest, ChargeResponse, CoinbaseCharge},
    ProviderApiError,
};

pub const COINBASE_CHARGES_URL: &str = "https://api.commerce.coinbase.com/charges";
pub const COINBASE_API_VERSION: &str = "2018-03-22";

#[derive(Clone)]
pub struct CoinbaseCommerceApi {
    client: Arc<Client>,
    url: String,
}

impl CoinbaseCommerceApi {
    pub fn new(config: &CoinbaseConfig) -> Result<Self, ProviderApiError> {
        Self::new_with_url(config, COINBASE_CHARGES_URL)
    }

    /// Points the client at a different charges endpoint, e.g. a local stub.
    pub fn new_with_url(config: &CoinbaseConfig, url: &str) -> Result<Self, ProviderApiError> {
        let key = config.api_key.as_ref().ok_or(ProviderApiError::NotConfigured("Coinbase Commerce"))?;
        let headers = [("x-cc-api-key", key.reveal().as_str()), ("x-cc-version", COINBASE_API_VERSION)];
        let client = build_client(&headers)?;
        Ok(Self { client: Arc::new(client), url: url.to_string() })
    }

    pub async fn create_charge(&self, request: &ChargeRequest) -> Result<CoinbaseCharge, ProviderApiError> {
        debug!("Creating Coinbase charge for order {}", request.order_id);
        let body = ChargeBody::from(request);
        let response = post_json::<ChargeResponse, _>(&self.client, &self.url, &body).await?;
        info!("Coinbase charge {} created for order {}", response.data.code, request.order_id);
        Ok(response.data)
    }
}
