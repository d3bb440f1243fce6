//! Password hashing and session tokens
//!
//! Passwords are stored as a hex SHA-256 digest of `salt || password`. Each
//! user gets a random 16-byte salt, stored next to the digest.
//!
//! # Pure Functions
//!
//! This module contains ONLY pure functions. Session persistence lives in the
//! portal's database layer.

use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Length of a generated salt in bytes (hex encoding doubles it)
pub const SALT_BYTES: usize = 16;

/// Generate a random salt as lowercase hex
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    to_hex(&bytes)
}

/// Hash a password with the given salt
///
/// # Examples
///
/// ```
/// use spm_common::auth::hash_password;
///
/// let hash = hash_password("secret", "00ff");
/// assert_eq!(hash.len(), 64); // SHA-256 is 64 hex chars
/// ```
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check a password against a stored salt and digest
pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    let calculated = hash_password(password, salt);
    // Compare every byte so the timing does not depend on the mismatch position
    calculated.len() == expected_hash.len()
        && calculated
            .bytes()
            .zip(expected_hash.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Generate an opaque session token
pub fn new_session_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
