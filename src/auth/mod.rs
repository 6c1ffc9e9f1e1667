//! Shared-secret authentication gate.
//!
//! Provides:
//! - One-time password initialization (salted iterated SHA-256, 100k rounds)
//! - Credential verification with constant-time hash comparison
//! - A `CredentialVerifier` trait so route logic never depends on the
//!   shared-secret scheme directly; per-user auth can be swapped in later
//!   without touching the handlers.
//!
//! ## Design Decisions
//! - Password hashing uses iterated SHA-256 (100k rounds) + per-secret salt
//!   (existing `sha2` crate) to avoid new dependencies while maintaining
//!   security.
//! - The singleton record is enforced by the store's primary key, so two
//!   concurrent initializations cannot both succeed.

pub mod gate;

pub use gate::{CredentialVerifier, GateError, SecretGate};
