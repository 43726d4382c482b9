//! Storage module for registry persistence

pub mod persistence;

pub use persistence::{Storage, StorageConfig, StorageError};
