//! One-time secret initialization and per-request verification.

use crate::store::{Store, StoreError};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

/// Salt byte length for password hashing.
const SALT_BYTES: usize = 16;

/// Number of SHA-256 iterations for password stretching.
const HASH_ITERATIONS: u32 = 100_000;

/// Errors surfaced by the gate. The display strings double as the HTTP
/// error payloads for the init endpoint.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Password already set")]
    AlreadyInitialized,
    #[error("Password is required")]
    MissingCredential,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Credential verification capability composed in front of protected routes.
pub trait CredentialVerifier: Send + Sync {
    /// True iff the presented credential is valid. An absent or empty
    /// credential verifies false, never an error; store faults propagate.
    fn verify(&self, presented: &str) -> Result<bool, GateError>;
}

/// Shared-secret gate backed by the store's singleton Secret Record.
pub struct SecretGate {
    store: Arc<Store>,
}

impl SecretGate {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// One-time password setup. Persists the salted hash; never updates or
    /// deletes an existing record through this interface.
    pub fn initialize(&self, secret: &str) -> Result<(), GateError> {
        if self.store.secret()?.is_some() {
            return Err(GateError::AlreadyInitialized);
        }
        if secret.is_empty() {
            return Err(GateError::MissingCredential);
        }

        let salt = generate_salt();
        let hash = hash_password(secret, &salt);

        // A concurrent initialize may have won between the check above and
        // this insert; the store's conditional insert decides the race.
        if self.store.put_secret_if_absent(&hash, &salt)? {
            Ok(())
        } else {
            Err(GateError::AlreadyInitialized)
        }
    }
}

impl CredentialVerifier for SecretGate {
    fn verify(&self, presented: &str) -> Result<bool, GateError> {
        if presented.is_empty() {
            return Ok(false);
        }

        let Some((stored_hash, salt)) = self.store.secret()? else {
            // Perform dummy hash to prevent timing side-channel
            let _ = hash_password(presented, "0000000000000000");
            return Ok(false);
        };

        let attempt_hash = hash_password(presented, &salt);
        Ok(constant_time_eq(
            stored_hash.as_bytes(),
            attempt_hash.as_bytes(),
        ))
    }
}

// ── Cryptographic Helpers ───────────────────────────────────────────

/// Generate a random salt (hex-encoded).
fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a password with salt using iterated SHA-256.
fn hash_password(password: &str, salt: &str) -> String {
    let mut hash = Sha256::new();
    hash.update(salt.as_bytes());
    hash.update(password.as_bytes());
    let mut result = hash.finalize();

    // Iterated hashing for key stretching
    for _ in 1..HASH_ITERATIONS {
        let mut h = Sha256::new();
        h.update(result);
        h.update(salt.as_bytes());
        result = h.finalize();
    }

    hex::encode(result)
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// ── Tests ───────────────────────────────────────────────────────────
