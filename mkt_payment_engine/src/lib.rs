//! Marketplace Payment Engine
//!
//! This library turns asynchronous, possibly duplicated and possibly out-of-order payment notifications from external
//! providers into exactly-once changes of order status and inventory, and drives the time-based escalation of orders
//! after delivery. It is independent of any web framework.
//!
//! The library is divided into these main sections:
//! 1. Database management and control ([`traits`] and the SQLite backend). You should never need to access the
//!    database directly. The exception is the data types used in the database, defined in [`db_types`].
//! 2. Provider adapters ([`providers`]). These authenticate webhook bodies and normalize them into a
//!    provider-agnostic [`providers::NormalizedEvent`].
//! 3. The order state machine ([`order_state`]). A pure function from an event and the current record to the
//!    transition that should be applied.
//! 4. The public API ([`CheckoutApi`], [`OrderFlowApi`], [`EscalationApi`]).
//!
//! The engine also emits events (order paid, order annulled, order completed, review created, manual review needed).
//! See [`events`] for how to subscribe to them.
pub mod clock;
pub mod db_types;
pub mod events;
pub mod order_state;
pub mod providers;
pub mod traits;

mod mpe_api;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use mpe_api::{
    checkout_api::CheckoutApi,
    errors::OrderFlowError,
    escalation_api::{EscalationApi, SweepPolicy},
    order_flow_api::OrderFlowApi,
    order_objects,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    CheckoutManagement,
    EscalationStore,
    ListingManagement,
    OrderManagement,
    PaymentGatewayDatabase,
    PaymentGatewayError,
    TransitionOutcome,
};
