//! Cryptographic utilities
//!
//! This module provides SHA-256 hashing and identifier derivation.

pub mod hash;

pub use hash::{derive_id20, sha256, sha256_hex};
