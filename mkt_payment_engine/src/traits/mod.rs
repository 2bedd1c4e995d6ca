//! # Backend contracts
//!
//! This module defines the behaviour a database backend needs to expose to support the payment engine.
//!
//! * [`PaymentGatewayDatabase`] is the heart of it: applying a normalized payment event atomically, with the webhook
//!   ledger insert and the stock decrement in the same transaction as the order transition.
//! * [`OrderManagement`] provides order queries and the post-payment transitions (delivery, disputes).
//! * [`CheckoutManagement`] and [`ListingManagement`] cover the state that exists before a payment does.
//! * [`EscalationStore`] is what the auto-complete and auto-review sweeps need.
mod checkout_management;
mod data_objects;
mod escalation_store;
mod order_management;
mod payment_gateway_database;

pub use checkout_management::{CheckoutManagement, ListingManagement};
pub use data_objects::TransitionOutcome;
pub use escalation_store::EscalationStore;
pub use order_management::OrderManagement;
pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
