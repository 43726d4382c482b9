//! Concurrent access to a single wallet
//!
//! Writers (`propose`, `confirm`, `reject`, `execute`) are serialised by a
//! per-wallet gate. The wallet state itself sits behind a read/write lock that
//! is only held for short, non-blocking sections, so readers always see a
//! whole proposal and are never stuck behind a slow ledger call.

use crate::core::{Address, Clock, Timestamp, WalletId};
use crate::ledger::{Ledger, LedgerError, LedgerReceipt};
use crate::multisig::error::{MultisigError, Nonce};
use crate::multisig::events::{EngineEvent, EventBus};
use crate::multisig::proposal::{Proposal, ProposalRequest, ProposalView};
use crate::multisig::signer_set::SignerSet;
use crate::multisig::wallet::{ExecutionPlan, Wallet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Outcome of a successful execute
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionResult {
    pub wallet_id: WalletId,
    pub nonce: Nonce,
    pub receipt: LedgerReceipt,
    pub executed_at: Timestamp,
}

/// A wallet shared between concurrent callers
pub struct SharedWallet {
    id: WalletId,
    /// Held by a writer for its whole operation, including the ledger call
    writer: Mutex<()>,
    state: RwLock<Wallet>,
    clock: Arc<dyn Clock>,
    ledger: Arc<dyn Ledger>,
    events: Arc<EventBus>,
}

impl SharedWallet {
    pub fn new(
        wallet: Wallet,
        clock: Arc<dyn Clock>,
        ledger: Arc<dyn Ledger>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            id: wallet.id().clone(),
            writer: Mutex::new(()),
            state: RwLock::new(wallet),
            clock,
            ledger,
            events,
        }
    }

    pub fn id(&self) -> &WalletId {
        &self.id
    }

    /// Submit a proposal; returns its nonce
    pub async fn propose(&self, caller: &Address, request: ProposalRequest) -> Result<Nonce, MultisigError> {
        let _writer = self.writer.lock().await;

        let nonce = {
            let mut wallet = self.state.write().await;
            self.at_now(&mut wallet, |w, now| w.propose(caller, request, now))?
        };

        self.events.publish(EngineEvent::ProposalCreated {
            wallet_id: self.id.clone(),
            nonce,
            proposer: caller.clone(),
        });

        Ok(nonce)
    }

    /// Confirm proposal `nonce` as `caller`
    pub async fn confirm(&self, caller: &Address, nonce: Nonce) -> Result<(), MultisigError> {
        let _writer = self.writer.lock().await;
        let mut wallet = self.state.write().await;
        self.at_now(&mut wallet, |w, now| w.confirm(caller, nonce, now))
    }

    /// Reject proposal `nonce` as `caller`
    pub async fn reject(&self, caller: &Address, nonce: Nonce) -> Result<(), MultisigError> {
        let _writer = self.writer.lock().await;
        let mut wallet = self.state.write().await;
        self.at_now(&mut wallet, |w, now| w.reject(caller, nonce, now))
    }

    /// Execute proposal `nonce` once it has enough confirmations.
    ///
    /// The ledger action is bounded by `timeout`. If it fails or times out
    /// the proposal stays `Pending` and the call returns
    /// [`MultisigError::ExecutionFailed`].
    pub async fn execute(
        &self,
        caller: &Address,
        nonce: Nonce,
        timeout: Duration,
    ) -> Result<ExecutionResult, MultisigError> {
        let _writer = self.writer.lock().await;

        let (plan, now) = {
            let mut wallet = self.state.write().await;
            self.at_now(&mut wallet, |w, now| {
                Ok((w.prepare_execution(caller, nonce, now)?, now))
            })?
        };

        let receipt = match tokio::time::timeout(timeout, self.perform(&plan)).await {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                log::warn!("Wallet {} proposal {} execution failed: {}", self.id, nonce, e);
                return Err(MultisigError::ExecutionFailed(e));
            }
            Err(_) => {
                let ms = timeout.as_millis() as u64;
                log::warn!(
                    "Wallet {} proposal {} execution timed out after {} ms",
                    self.id,
                    nonce,
                    ms
                );
                return Err(MultisigError::ExecutionFailed(LedgerError::TimedOut(ms)));
            }
        };

        self.state
            .write()
            .await
            .complete_execution(nonce, now, receipt.reference.clone())?;

        log::info!(
            "Wallet {} executed proposal {} ({:?} {})",
            self.id,
            nonce,
            receipt.kind,
            receipt.reference
        );
        self.events.publish(EngineEvent::ProposalExecuted {
            wallet_id: self.id.clone(),
            nonce,
        });

        Ok(ExecutionResult {
            wallet_id: self.id.clone(),
            nonce,
            receipt,
            executed_at: now,
        })
    }

    /// Run `op` at the wallet's current instant.
    ///
    /// The instant only becomes the wallet's clock floor when the operation
    /// changed state: on success, or when it expired a stale proposal.
    fn at_now<T>(
        &self,
        wallet: &mut Wallet,
        op: impl FnOnce(&mut Wallet, Timestamp) -> Result<T, MultisigError>,
    ) -> Result<T, MultisigError> {
        let now = wallet.now_at(self.clock.now());
        let result = op(wallet, now);
        if matches!(result, Ok(_) | Err(MultisigError::ProposalExpired { .. })) {
            wallet.observe(now);
        }
        result
    }

    async fn perform(&self, plan: &ExecutionPlan) -> Result<LedgerReceipt, LedgerError> {
        if plan.call_data.is_empty() {
            self.ledger.transfer(&self.id, &plan.target, plan.value).await
        } else {
            self.ledger
                .call(&self.id, &plan.target, plan.value, &plan.call_data)
                .await
        }
    }

    /// Full proposal record at `nonce`
    pub async fn proposal_at(&self, nonce: Nonce) -> Result<Proposal, MultisigError> {
        self.state.read().await.proposal_at(nonce).cloned()
    }

    /// Observer view of the proposal at `nonce`
    pub async fn proposal_view(&self, nonce: Nonce) -> Result<ProposalView, MultisigError> {
        Ok(self.state.read().await.proposal_at(nonce)?.view())
    }

    /// Views of every proposal, in nonce order
    pub async fn proposal_views(&self) -> Vec<ProposalView> {
        self.state.read().await.proposals().map(|p| p.view()).collect()
    }

    pub async fn required_confirmations(&self) -> usize {
        self.state.read().await.required_confirmations()
    }

    /// Count of proposals ever created
    pub async fn nonce(&self) -> Nonce {
        self.state.read().await.nonce()
    }

    pub async fn signer_set(&self) -> SignerSet {
        self.state.read().await.signer_set().clone()
    }

    /// This wallet's current notion of now
    pub async fn now(&self) -> Timestamp {
        self.state.read().await.now_at(self.clock.now())
    }

    /// Copy of the full wallet state
    pub async fn snapshot(&self) -> Wallet {
        self.state.read().await.clone()
    }
}
