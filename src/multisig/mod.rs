//! Multi-signature wallets and proposal state machine
//!
//! Provides M-of-N wallets where a proposed action needs confirmations from
//! M of the N signers before any signer may execute it.
//!
//! # Example
//!
//! ```ignore
//! use multisig_factory::multisig::{ProposalRequest, WalletRegistry};
//!
//! // Create a 2-of-3 wallet
//! let wallet = registry.create_wallet(vec![alice, bob, carol], 2).await?;
//!
//! // Propose a transfer that must execute within the hour
//! let nonce = registry
//!     .propose(&wallet, &alice, ProposalRequest::transfer(recipient, amount, now + 3600))
//!     .await?;
//!
//! // Collect confirmations
//! registry.confirm(&wallet, &bob, nonce).await?;
//! registry.confirm(&wallet, &alice, nonce).await?;
//!
//! // Any signer may now execute
//! registry.execute(&wallet, &carol, nonce).await?;
//! ```

pub mod error;
pub mod events;
pub mod proposal;
pub mod registry;
pub mod shared;
pub mod signer_set;
pub mod wallet;

pub use error::{MultisigError, Nonce};
pub use events::{EngineEvent, EventBus};
pub use proposal::{Proposal, ProposalRequest, ProposalStatus, ProposalView, Stance};
pub use registry::{RegistrySnapshot, WalletRegistry};
pub use shared::{ExecutionResult, SharedWallet};
pub use signer_set::SignerSet;
pub use wallet::{ExecutionPlan, Wallet};
