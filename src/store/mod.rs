//! SQLite-backed document persistence.

pub mod documents;

pub use documents::{Document, Store, StoreError};
