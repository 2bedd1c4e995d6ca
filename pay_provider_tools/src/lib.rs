//! HTTP clients for the payment providers the marketplace supports.
//!
//! * [`CoinbaseCommerceApi`] creates hosted charges. The buyer pays on Coinbase's page and the charge is
//!   linked back to a pending order through `metadata.order_id`.
//! * [`NowPaymentsApi`] creates invoices. The invoice's `order_id` is the checkout session id.
//!
//! Neither client knows anything about orders or sessions. That bookkeeping lives in the payment engine.
mod client;
mod coinbase;
mod config;
mod data_objects;
mod error;
mod nowpayments;

pub use coinbase::{CoinbaseCommerceApi, COINBASE_API_VERSION, COINBASE_CHARGES_URL};
pub use config::{CoinbaseConfig, NowPaymentsConfig};
pub use data_objects::{ChargeRequest, CoinbaseCharge, InvoiceRequest, NowPaymentsInvoice};
pub use error::ProviderApiError;
pub use nowpayments::{NowPaymentsApi, NOWPAYMENTS_INVOICE_URL};
