//! Errors raised by the authorization engine

use crate::core::{Address, AddressError, Timestamp, WalletId};
use crate::ledger::LedgerError;
use thiserror::Error;

/// Per-wallet proposal index
pub type Nonce = u64;

/// Errors related to multisig operations.
///
/// Every failure is per-operation and recoverable. Apart from the lazy
/// `Pending -> Expired` transition behind [`MultisigError::ProposalExpired`],
/// a failed operation leaves no state behind.
#[derive(Error, Debug)]
pub enum MultisigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Not a signer: {0}")]
    NotASigner(Address),
    #[error("Wallet not found: {0}")]
    UnknownWallet(WalletId),
    #[error("Unknown proposal: nonce {0}")]
    UnknownProposal(Nonce),
    #[error("Invalid deadline: {deadline} is not after {now}")]
    InvalidDeadline { deadline: Timestamp, now: Timestamp },
    #[error("Proposal {nonce} expired at {deadline}")]
    ProposalExpired { nonce: Nonce, deadline: Timestamp },
    #[error("Proposal {0} already executed")]
    AlreadyExecuted(Nonce),
    #[error("Threshold not met: have {have}, need {need}")]
    ThresholdNotMet { have: usize, need: usize },
    #[error("Execution failed: {0}")]
    ExecutionFailed(#[from] LedgerError),
    #[error("Inconsistent wallet state: {0}")]
    CorruptState(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressError),
}
