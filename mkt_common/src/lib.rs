mod cents;
mod helpers;

pub mod op;
mod secret;

pub use cents::{Cents, CentsConversionError, DEFAULT_CURRENCY_CODE, SERVICE_FEE_PERCENT};
pub use helpers::parse_boolean_flag;
pub use secret::Secret;
