use log::*;
use mkt_common::Secret;

#[derive(Debug, Clone, Default)]
pub struct CoinbaseConfig {
    /// `None` means Coinbase Commerce checkouts are disabled.
    pub api_key: Option<Secret<String>>,
    pub webhook_secret: Option<Secret<String>>,
}

impl CoinbaseConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_key = Secret::from_env("MKT_COINBASE_API_KEY");
        if api_key.is_none() {
            info!("🪛️ MKT_COINBASE_API_KEY is not set. Coinbase Commerce checkouts are disabled.");
        }
        let webhook_secret = Secret::from_env("MKT_COINBASE_WEBHOOK_SECRET");
        if webhook_secret.is_none() {
            warn!("🪛️ MKT_COINBASE_WEBHOOK_SECRET is not set. Coinbase webhooks cannot be authenticated.");
        }
        Self { api_key, webhook_secret }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NowPaymentsConfig {
    /// `None` means NOWPayments checkouts are disabled.
    pub api_key: Option<Secret<String>>,
    pub ipn_secret: Option<Secret<String>>,
}

impl NowPaymentsConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_key = Secret::from_env("MKT_NOWPAYMENTS_API_KEY");
        if api_key.is_none() {
            info!("🪛️ MKT_NOWPAYMENTS_API_KEY is not set. NOWPayments checkouts are disabled.");
        }
        let ipn_secret = Secret::from_env("MKT_NOWPAYMENTS_IPN_SECRET");
        if ipn_secret.is_none() {
            warn!("🪛️ MKT_NOWPAYMENTS_IPN_SECRET is not set. NOWPayments IPN callbacks cannot be authenticated.");
        }
        Self { api_key, ipn_secret }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}
