pub mod auth;
pub mod config;
pub mod gateway;
pub mod store;

// Crate version exposed for runtime queries
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
