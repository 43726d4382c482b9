//! Engine notifications
//!
//! Provides a broadcast channel for pushing wallet and proposal events to
//! whatever observers are subscribed.

use crate::core::{Address, WalletId};
use crate::multisig::error::Nonce;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default number of events to buffer per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Events emitted by the engine, at most once per transition
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum EngineEvent {
    /// A wallet was created by the registry
    WalletCreated {
        wallet_id: WalletId,
        signers: Vec<Address>,
        required_confirmations: usize,
    },
    /// A signer submitted a proposal
    ProposalCreated {
        wallet_id: WalletId,
        nonce: Nonce,
        proposer: Address,
    },
    /// The ledger performed a proposal's action
    ProposalExecuted { wallet_id: WalletId, nonce: Nonce },
}

/// Broadcaster for engine events
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: EngineEvent) {
        log::debug!("Event: {:?}", event);
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
