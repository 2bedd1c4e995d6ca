pub mod notifications;
pub mod providers;
