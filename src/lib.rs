//! Multisig Factory: M-of-N wallets with a proposal state machine
//!
//! This crate provides:
//! - A factory that creates wallets from a signer set and threshold
//! - A signer index answering "which wallets does this address sign for?"
//! - Per-wallet proposals that collect confirmations before execution
//! - Deadlines enforced against a monotonic wallet clock
//! - Exactly-once execution through an asynchronous, fallible ledger
//! - Wallet and proposal lifecycle events
//! - JSON persistence with backups
//!
//! # Example
//!
//! ```rust
//! use multisig_factory::{
//!     Address, EngineConfig, InMemoryLedger, ManualClock, ProposalRequest, WalletRegistry,
//! };
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let ledger = Arc::new(InMemoryLedger::new());
//! let registry = WalletRegistry::new(
//!     Arc::new(ManualClock::new(1_000)),
//!     ledger.clone(),
//!     EngineConfig::default(),
//! );
//!
//! let alice = Address::derive(b"alice");
//! let bob = Address::derive(b"bob");
//! let wallet = registry
//!     .create_wallet(vec![alice.clone(), bob.clone()], 2)
//!     .await
//!     .unwrap();
//!
//! let request = ProposalRequest::transfer(Address::derive(b"shop"), 5, 4_600);
//! let nonce = registry.propose(&wallet, &alice, request).await.unwrap();
//! registry.confirm(&wallet, &alice, nonce).await.unwrap();
//! registry.confirm(&wallet, &bob, nonce).await.unwrap();
//! registry.execute(&wallet, &bob, nonce).await.unwrap();
//!
//! assert_eq!(ledger.len(), 1);
//! # });
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod ledger;
pub mod multisig;
pub mod storage;

// Re-export commonly used types
pub use config::EngineConfig;
pub use core::{
    format_ether, parse_ether, Address, Clock, ManualClock, SystemClock, Timestamp, WalletId,
};
pub use ledger::{InMemoryLedger, Ledger, LedgerError, LedgerReceipt};
pub use multisig::{
    EngineEvent, MultisigError, Nonce, ProposalRequest, ProposalStatus, ProposalView,
    SharedWallet, SignerSet, WalletRegistry,
};
pub use storage::{Storage, StorageConfig};
