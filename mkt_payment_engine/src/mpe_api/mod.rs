//! # Marketplace payment engine public API
//!
//! The `mpe_api` module exposes the programmatic API of the engine. It is modular, so that clients can pick the parts
//! they need.
//!
//! * [`checkout_api`] creates checkout sessions and pending orders before a buyer is sent to a payment provider.
//! * [`order_flow_api`] applies normalized payment events to orders and sessions, and handles delivery and disputes.
//! * [`escalation_api`] runs the time-driven auto-complete and auto-review sweeps.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits the API needs,
//! plus the clock it should use:
//!
//! ```rust,ignore
//! use mkt_payment_engine::{clock::system_clock, events::EventProducers, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = OrderFlowApi::new(db, EventProducers::default(), system_clock());
//! let outcome = api.process_event(&normalized_event).await?;
//! ```
pub mod checkout_api;
pub mod errors;
pub mod escalation_api;
pub mod order_flow_api;
pub mod order_objects;
