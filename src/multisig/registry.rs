//! Wallet factory and registry
//!
//! Creates wallets, assigns them deterministic identities and keeps an index
//! from each signer to the wallets it can act on.

use crate::config::EngineConfig;
use crate::core::{Address, Clock, WalletId};
use crate::ledger::Ledger;
use crate::multisig::error::{MultisigError, Nonce};
use crate::multisig::events::{EngineEvent, EventBus};
use crate::multisig::proposal::{ProposalRequest, ProposalView};
use crate::multisig::shared::{ExecutionResult, SharedWallet};
use crate::multisig::signer_set::SignerSet;
use crate::multisig::wallet::Wallet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

/// Serializable registry contents
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Factory counter feeding identity derivation
    pub wallets_created: u64,
    pub wallets: Vec<Wallet>,
}

#[derive(Default)]
struct RegistryState {
    wallets: HashMap<WalletId, Arc<SharedWallet>>,
    /// Signer address -> wallets it signs for
    by_signer: HashMap<Address, BTreeSet<WalletId>>,
    wallets_created: u64,
}

impl RegistryState {
    fn insert(&mut self, wallet: Arc<SharedWallet>, signers: &[Address]) {
        for signer in signers {
            self.by_signer
                .entry(signer.clone())
                .or_default()
                .insert(wallet.id().clone());
        }
        self.wallets.insert(wallet.id().clone(), wallet);
    }
}

/// Owner of every wallet in the engine
pub struct WalletRegistry {
    state: RwLock<RegistryState>,
    clock: Arc<dyn Clock>,
    ledger: Arc<dyn Ledger>,
    events: Arc<EventBus>,
    config: EngineConfig,
}

impl WalletRegistry {
    /// Create an empty registry
    pub fn new(clock: Arc<dyn Clock>, ledger: Arc<dyn Ledger>, config: EngineConfig) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            clock,
            ledger,
            events: Arc::new(EventBus::new(config.event_capacity)),
            config,
        }
    }

    /// Rebuild a registry, including the signer index, from a snapshot
    pub fn restore(
        snapshot: RegistrySnapshot,
        clock: Arc<dyn Clock>,
        ledger: Arc<dyn Ledger>,
        config: EngineConfig,
    ) -> Result<Self, MultisigError> {
        let registry = Self::new(clock, ledger, config);
        let mut state = RegistryState {
            wallets_created: snapshot.wallets_created,
            ..RegistryState::default()
        };

        for wallet in snapshot.wallets {
            if state.wallets.contains_key(wallet.id()) {
                return Err(MultisigError::InvalidConfiguration(format!(
                    "duplicate wallet {} in snapshot",
                    wallet.id()
                )));
            }
            let signers = wallet.signer_set().signers().to_vec();
            let shared = registry.share(wallet);
            state.insert(shared, &signers);
        }
        state.wallets_created = state.wallets_created.max(state.wallets.len() as u64);

        log::info!("Restored {} wallets", state.wallets.len());

        Ok(Self {
            state: RwLock::new(state),
            ..registry
        })
    }

    fn share(&self, wallet: Wallet) -> Arc<SharedWallet> {
        Arc::new(SharedWallet::new(
            wallet,
            self.clock.clone(),
            self.ledger.clone(),
            self.events.clone(),
        ))
    }

    /// Generate a wallet identity from the factory counter and configuration
    fn derive_id(counter: u64, signer_set: &SignerSet) -> WalletId {
        let signers: Vec<&str> = signer_set.signers().iter().map(|s| s.as_str()).collect();
        let seed = format!(
            "{}:{}:{}",
            counter,
            signer_set.required_confirmations(),
            signers.join(",")
        );
        Address::derive(seed.as_bytes())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Create a new wallet guarded by `signers` with an M-of-N threshold
    ///
    /// # Errors
    /// Returns [`MultisigError::InvalidConfiguration`] without registering
    /// anything if the signer set or threshold is invalid.
    pub async fn create_wallet(
        &self,
        signers: Vec<Address>,
        required_confirmations: usize,
    ) -> Result<WalletId, MultisigError> {
        let signer_set = SignerSet::new(signers, required_confirmations)?;

        let mut state = self.state.write().await;

        let mut id = Self::derive_id(state.wallets_created, &signer_set);
        while state.wallets.contains_key(&id) {
            state.wallets_created += 1;
            id = Self::derive_id(state.wallets_created, &signer_set);
        }
        state.wallets_created += 1;

        let wallet = Wallet::new(id.clone(), signer_set.clone(), self.clock.now());
        let shared = self.share(wallet);
        state.insert(shared, signer_set.signers());

        log::info!("Wallet created: {} ({})", id, signer_set.description());

        // Published under the registry lock so no proposal event for this
        // wallet can precede it
        self.events.publish(EngineEvent::WalletCreated {
            wallet_id: id.clone(),
            signers: signer_set.signers().to_vec(),
            required_confirmations: signer_set.required_confirmations(),
        });

        Ok(id)
    }

    /// Get a wallet by id
    pub async fn wallet(&self, id: &WalletId) -> Result<Arc<SharedWallet>, MultisigError> {
        self.state
            .read()
            .await
            .wallets
            .get(id)
            .cloned()
            .ok_or_else(|| MultisigError::UnknownWallet(id.clone()))
    }

    /// Wallets where `address` is a signer; empty if none
    pub async fn wallets_for_signer(&self, address: &Address) -> BTreeSet<WalletId> {
        self.state
            .read()
            .await
            .by_signer
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether `address` signs for at least one wallet
    pub async fn has_any_wallet(&self, address: &Address) -> bool {
        self.state
            .read()
            .await
            .by_signer
            .get(address)
            .map_or(false, |ids| !ids.is_empty())
    }

    /// All wallet ids, sorted
    pub async fn wallet_ids(&self) -> Vec<WalletId> {
        let mut ids: Vec<WalletId> = self.state.read().await.wallets.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn wallet_count(&self) -> usize {
        self.state.read().await.wallets.len()
    }

    pub async fn required_confirmations(&self, id: &WalletId) -> Result<usize, MultisigError> {
        Ok(self.wallet(id).await?.required_confirmations().await)
    }

    /// Count of proposals ever created on wallet `id`
    pub async fn nonce(&self, id: &WalletId) -> Result<Nonce, MultisigError> {
        Ok(self.wallet(id).await?.nonce().await)
    }

    pub async fn proposal_at(&self, id: &WalletId, nonce: Nonce) -> Result<ProposalView, MultisigError> {
        self.wallet(id).await?.proposal_view(nonce).await
    }

    pub async fn propose(
        &self,
        id: &WalletId,
        caller: &Address,
        request: ProposalRequest,
    ) -> Result<Nonce, MultisigError> {
        self.wallet(id).await?.propose(caller, request).await
    }

    pub async fn confirm(&self, id: &WalletId, caller: &Address, nonce: Nonce) -> Result<(), MultisigError> {
        self.wallet(id).await?.confirm(caller, nonce).await
    }

    pub async fn reject(&self, id: &WalletId, caller: &Address, nonce: Nonce) -> Result<(), MultisigError> {
        self.wallet(id).await?.reject(caller, nonce).await
    }

    /// Execute with the configured ledger timeout
    pub async fn execute(
        &self,
        id: &WalletId,
        caller: &Address,
        nonce: Nonce,
    ) -> Result<ExecutionResult, MultisigError> {
        self.execute_with_timeout(id, caller, nonce, self.config.execution_timeout())
            .await
    }

    pub async fn execute_with_timeout(
        &self,
        id: &WalletId,
        caller: &Address,
        nonce: Nonce,
        timeout: Duration,
    ) -> Result<ExecutionResult, MultisigError> {
        self.wallet(id).await?.execute(caller, nonce, timeout).await
    }

    /// Consistent-per-wallet copy of every wallet, for persistence
    pub async fn snapshot(&self) -> RegistrySnapshot {
        let (wallets, wallets_created) = {
            let state = self.state.read().await;
            let wallets: Vec<Arc<SharedWallet>> = state.wallets.values().cloned().collect();
            (wallets, state.wallets_created)
        };

        let mut wallets = futures::future::join_all(wallets.iter().map(|w| w.snapshot())).await;
        wallets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id().cmp(b.id())));

        RegistrySnapshot {
            wallets_created,
            wallets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;
    use crate::ledger::InMemoryLedger;

    const T0: u64 = 1_700_000_000;

    fn addr(tag: &str) -> Address {
        Address::derive(tag.as_bytes())
    }

    fn create_test_registry() -> WalletRegistry {
        WalletRegistry::new(
            Arc::new(ManualClock::new(T0)),
            Arc::new(InMemoryLedger::new()),
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_registry_creation() {
        let registry = create_test_registry();
        assert_eq!(registry.wallet_count().await, 0);
        assert!(!registry.has_any_wallet(&addr("alice")).await);
        assert!(registry.wallets_for_signer(&addr("alice")).await.is_empty());
    }

    #[tokio::test]
    async fn test_wallet_creation_indexes_signers() {
        let registry = create_test_registry();
        let mut rx = registry.subscribe();

        let id = registry
            .create_wallet(vec![addr("alice"), addr("bob")], 2)
            .await
            .unwrap();

        assert_eq!(registry.wallet_count().await, 1);
        assert_eq!(registry.required_confirmations(&id).await.unwrap(), 2);
        assert_eq!(registry.nonce(&id).await.unwrap(), 0);
        assert!(registry.has_any_wallet(&addr("alice")).await);
        assert!(registry.wallets_for_signer(&addr("bob")).await.contains(&id));
        assert!(!registry.has_any_wallet(&addr("carol")).await);

        match rx.recv().await.unwrap() {
            EngineEvent::WalletCreated {
                wallet_id,
                signers,
                required_confirmations,
            } => {
                assert_eq!(wallet_id, id);
                assert_eq!(signers, vec![addr("alice"), addr("bob")]);
                assert_eq!(required_confirmations, 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_same_signers_create_distinct_wallets() {
        let registry = create_test_registry();
        let signers = vec![addr("alice"), addr("bob")];

        let first = registry.create_wallet(signers.clone(), 1).await.unwrap();
        let second = registry.create_wallet(signers, 1).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(registry.wallets_for_signer(&addr("alice")).await.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_configuration_registers_nothing() {
        let registry = create_test_registry();
        let mut rx = registry.subscribe();

        for required in [0, 3] {
            assert!(matches!(
                registry
                    .create_wallet(vec![addr("alice"), addr("bob")], required)
                    .await,
                Err(MultisigError::InvalidConfiguration(_))
            ));
        }

        assert_eq!(registry.wallet_count().await, 0);
        assert!(!registry.has_any_wallet(&addr("alice")).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_wallet() {
        let registry = create_test_registry();
        assert!(matches!(
            registry.nonce(&addr("nowhere")).await,
            Err(MultisigError::UnknownWallet(_))
        ));
        assert!(matches!(
            registry.confirm(&addr("nowhere"), &addr("alice"), 0).await,
            Err(MultisigError::UnknownWallet(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_and_restore() {
        let registry = create_test_registry();
        let id = registry
            .create_wallet(vec![addr("alice"), addr("bob"), addr("carol")], 2)
            .await
            .unwrap();
        let nonce = registry
            .propose(&id, &addr("alice"), ProposalRequest::transfer(addr("x"), 5, T0 + 60))
            .await
            .unwrap();
        registry.confirm(&id, &addr("bob"), nonce).await.unwrap();

        let snapshot = registry.snapshot().await;
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored = WalletRegistry::restore(
            serde_json::from_str(&json).unwrap(),
            Arc::new(ManualClock::new(T0)),
            Arc::new(InMemoryLedger::new()),
            EngineConfig::default(),
        )
        .unwrap();

        assert!(restored.wallets_for_signer(&addr("carol")).await.contains(&id));
        assert_eq!(restored.nonce(&id).await.unwrap(), 1);
        assert_eq!(restored.proposal_at(&id, nonce).await.unwrap().confirmations, 1);

        // Factory counter survives, so new wallets get fresh identities
        let next = restored
            .create_wallet(vec![addr("alice"), addr("bob"), addr("carol")], 2)
            .await
            .unwrap();
        assert_ne!(next, id);
    }

    #[tokio::test]
    async fn test_restore_rejects_duplicate_wallets() {
        let registry = create_test_registry();
        registry.create_wallet(vec![addr("alice")], 1).await.unwrap();

        let mut snapshot = registry.snapshot().await;
        snapshot.wallets.push(snapshot.wallets[0].clone());

        assert!(WalletRegistry::restore(
            snapshot,
            Arc::new(ManualClock::new(T0)),
            Arc::new(InMemoryLedger::new()),
            EngineConfig::default(),
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_rewound_snapshot_cannot_overwrite_history() {
        let registry = create_test_registry();
        let id = registry
            .create_wallet(vec![addr("alice"), addr("bob")], 1)
            .await
            .unwrap();
        registry
            .propose(&id, &addr("alice"), ProposalRequest::transfer(addr("x"), 111, T0 + 60))
            .await
            .unwrap();

        let mut json = serde_json::to_value(registry.snapshot().await).unwrap();
        json["wallets"][0]["nonce"] = 0.into();

        // Loading fails outright instead of handing out nonce 0 again
        assert!(serde_json::from_value::<RegistrySnapshot>(json).is_err());
        assert_eq!(registry.proposal_at(&id, 0).await.unwrap().value, 111);
    }
}
