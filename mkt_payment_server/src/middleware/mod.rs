mod bearer;
mod signature;

pub use bearer::{BearerAuthMiddlewareFactory, BearerAuthMiddlewareService};
pub use signature::{SignatureMiddlewareFactory, SignatureMiddlewareService};
