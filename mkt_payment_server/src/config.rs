use std::{env, fmt::Display, str::FromStr};

use chrono::Duration;
use log::*;
use mkt_common::{parse_boolean_flag, Secret};
use mkt_payment_engine::SweepPolicy;
use pay_provider_tools::{CoinbaseConfig, NowPaymentsConfig};

const DEFAULT_MKT_HOST: &str = "127.0.0.1";
const DEFAULT_MKT_PORT: u16 = 8480;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/marketplace.db";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:8480";
const DEFAULT_AUTO_COMPLETE_HOURS: i64 = 48;
const DEFAULT_AUTO_REVIEW_HOURS: i64 = 48;
const DEFAULT_SWEEP_BATCH_LIMIT: i64 = 500;
const DEFAULT_SWEEP_TIME_BUDGET_SECS: u64 = 50;
const DEFAULT_SESSION_TTL_MINUTES: i64 = 60;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub coinbase: CoinbaseConfig,
    pub nowpayments: NowPaymentsConfig,
    /// If true, webhooks for a provider without a configured signing secret are rejected rather than processed
    /// unauthenticated.
    pub require_webhook_signatures: bool,
    /// The externally reachable base URL of this server. Used to build redirect and callback URLs for the providers.
    pub public_url: String,
    /// Bearer token for the `/cron` and `/orders` routes. If unset, those routes are open.
    pub cron_secret: Option<Secret<String>>,
    pub sweep_policy: SweepPolicy,
    pub session_ttl: Duration,
    /// Where event notifications are POSTed. If unset, events are only logged.
    pub notify_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MKT_HOST.to_string(),
            port: DEFAULT_MKT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            coinbase: CoinbaseConfig::default(),
            nowpayments: NowPaymentsConfig::default(),
            require_webhook_signatures: false,
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            cron_secret: None,
            sweep_policy: SweepPolicy::default(),
            session_ttl: Duration::minutes(DEFAULT_SESSION_TTL_MINUTES),
            notify_url: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MKT_HOST").ok().unwrap_or_else(|| DEFAULT_MKT_HOST.into());
        let port = env_or_default("MKT_PORT", DEFAULT_MKT_PORT);
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ MKT_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let coinbase = CoinbaseConfig::new_from_env_or_default();
        let nowpayments = NowPaymentsConfig::new_from_env_or_default();
        let require_webhook_signatures = parse_boolean_flag(env::var("MKT_REQUIRE_WEBHOOK_SIGNATURES").ok(), false);
        let public_url = env::var("MKT_PUBLIC_URL")
            .ok()
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| {
                info!("🪛️ MKT_PUBLIC_URL is not set. Provider callbacks will point at {DEFAULT_PUBLIC_URL}.");
                DEFAULT_PUBLIC_URL.to_string()
            });
        let cron_secret = Secret::from_env("MKT_CRON_SECRET");
        if cron_secret.is_none() {
            warn!("🪛️ MKT_CRON_SECRET is not set. Anyone can trigger the escalation sweeps and look up orders.");
        }
        let sweep_policy = SweepPolicy {
            auto_complete_after: Duration::hours(env_or_default(
                "MKT_AUTO_COMPLETE_AFTER_HOURS",
                DEFAULT_AUTO_COMPLETE_HOURS,
            )),
            auto_review_after: Duration::hours(env_or_default(
                "MKT_AUTO_REVIEW_AFTER_HOURS",
                DEFAULT_AUTO_REVIEW_HOURS,
            )),
            batch_limit: env_or_default("MKT_SWEEP_BATCH_LIMIT", DEFAULT_SWEEP_BATCH_LIMIT).max(1),
            time_budget: std::time::Duration::from_secs(env_or_default(
                "MKT_SWEEP_TIME_BUDGET_SECS",
                DEFAULT_SWEEP_TIME_BUDGET_SECS,
            )),
        };
        let session_ttl = Duration::minutes(env_or_default("MKT_SESSION_TTL_MINUTES", DEFAULT_SESSION_TTL_MINUTES));
        let notify_url = env::var("MKT_NOTIFY_URL").ok().filter(|s| !s.trim().is_empty());
        Self {
            host,
            port,
            database_url,
            coinbase,
            nowpayments,
            require_webhook_signatures,
            public_url,
            cron_secret,
            sweep_policy,
            session_ttl,
            notify_url,
        }
    }
}

/// Reads and parses `name`, falling back to `default` (with a log message) if it is unset or invalid.
fn env_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name} ({s}). {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// The part of the configuration that request handlers need. Secrets are deliberately excluded.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub public_url: String,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { public_url: config.public_url.clone() }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.public_url)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        env::set_var("MKT_TEST_PORT_VALUE", "not-a-port");
        assert_eq!(env_or_default("MKT_TEST_PORT_VALUE", 8480u16), 8480);
        env::set_var("MKT_TEST_PORT_VALUE", " 9000 ");
        assert_eq!(env_or_default("MKT_TEST_PORT_VALUE", 8480u16), 9000);
        assert_eq!(env_or_default("MKT_TEST_UNSET_VALUE", 48i64), 48);
    }

    #[test]
    fn option_urls() {
        let options = ServerOptions { public_url: "https://market.example".into() };
        assert_eq!(options.url("/webhooks/nowpayments"), "https://market.example/webhooks/nowpayments");
    }
}
