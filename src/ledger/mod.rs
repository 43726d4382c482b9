//! Ledger / execution service
//!
//! The engine never moves value itself. Once a proposal is approved it asks a
//! [`Ledger`] to perform the transfer or call, and treats that request as
//! fallible and possibly slow.

pub mod memory;

use crate::core::{Address, WalletId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::{InMemoryLedger, LedgerEntry};

/// Ledger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
    #[error("Ledger did not respond within {0} ms")]
    TimedOut(u64),
}

/// Kind of external action performed for a proposal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Plain value transfer (empty call data)
    Transfer,
    /// Call with a data payload, forwarding any value
    Call,
}

/// Proof that the ledger accepted an action
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    /// Ledger-assigned reference for the action
    pub reference: String,
    pub kind: ActionKind,
}

/// External service that performs approved actions on behalf of a wallet
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Move `value` from `source` to `target`
    async fn transfer(
        &self,
        source: &WalletId,
        target: &Address,
        value: u128,
    ) -> Result<LedgerReceipt, LedgerError>;

    /// Invoke `target` with `data`, forwarding `value`
    async fn call(
        &self,
        source: &WalletId,
        target: &Address,
        value: u128,
        data: &[u8],
    ) -> Result<LedgerReceipt, LedgerError>;
}
