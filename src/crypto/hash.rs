//! Hashing utilities for the engine
//!
//! Provides SHA-256 based hashing used for wallet identities
//! and ledger receipt references.

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Derive a 20-byte identifier from arbitrary seed data.
///
/// Takes the leading 20 bytes of the SHA-256 digest, the same width as an
/// account address.
pub fn derive_id20(seed: &[u8]) -> [u8; 20] {
    let hash = sha256(seed);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[..20]);
    out
}
