//! # Marketplace payment server
//! This crate hosts the HTTP server for the marketplace payment reconciler. It is responsible for:
//! * Receiving payment webhooks from Coinbase Commerce and NOWPayments, authenticating them and handing them to the
//!   payment engine.
//! * Starting buyer checkouts with either provider.
//! * Exposing the escalation sweeps (auto-complete and auto-review) to an external scheduler.
//! * Forwarding order events to a notification endpoint.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhooks/coinbase`, `/webhooks/nowpayments`: Provider webhooks.
//! * `/checkout/coinbase`, `/checkout/nowpayments`, `/checkout/sessions/{id}`: Buyer checkout.
//! * `/cron/auto-complete`, `/cron/auto-review`: Scheduler triggers. Guarded by `MKT_CRON_SECRET`.
//! * `/orders/{id}`, `/orders/{id}/delivered`, `/orders/{id}/dispute`: Operator routes. Guarded by `MKT_CRON_SECRET`.

pub mod checkout_routes;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod session_expiry_worker;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
