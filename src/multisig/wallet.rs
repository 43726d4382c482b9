//! Multi-signature wallet implementation
//!
//! The wallet owns a fixed [`SignerSet`] and an append-only ledger of
//! proposals keyed by nonce. Every operation receives the instant it runs at
//! and never reads a clock itself, so the state machine here is synchronous
//! and deterministic. Serialising access is the job of
//! [`SharedWallet`](crate::multisig::SharedWallet).

use crate::core::{Address, Timestamp, WalletId};
use crate::multisig::error::{MultisigError, Nonce};
use crate::multisig::proposal::{Proposal, ProposalRequest, ProposalStatus, Stance};
use crate::multisig::signer_set::SignerSet;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Everything the ledger needs to perform an approved proposal
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub nonce: Nonce,
    pub target: Address,
    pub value: u128,
    pub call_data: Vec<u8>,
}

/// A multi-signature wallet
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawWallet")]
pub struct Wallet {
    /// Unique wallet identity, assigned by the registry
    id: WalletId,
    signer_set: SignerSet,
    /// Next nonce to assign
    nonce: Nonce,
    proposals: BTreeMap<Nonce, Proposal>,
    /// Latest instant any operation on this wallet has observed
    clock_floor: Timestamp,
    pub created_at: Timestamp,
}

/// Unvalidated form used when loading persisted wallets
#[derive(Deserialize)]
struct RawWallet {
    id: WalletId,
    signer_set: SignerSet,
    nonce: Nonce,
    proposals: BTreeMap<Nonce, Proposal>,
    clock_floor: Timestamp,
    created_at: Timestamp,
}

impl TryFrom<RawWallet> for Wallet {
    type Error = MultisigError;

    /// Proposals must be exactly `0..nonce`, each stored under its own nonce,
    /// with every proposer and voter a signer.
    fn try_from(raw: RawWallet) -> Result<Self, Self::Error> {
        let corrupt =
            |reason: String| MultisigError::CorruptState(format!("wallet {}: {}", raw.id, reason));

        if raw.proposals.len() as u64 != raw.nonce {
            return Err(corrupt(format!(
                "nonce {} but {} proposals",
                raw.nonce,
                raw.proposals.len()
            )));
        }

        for (key, proposal) in &raw.proposals {
            if *key >= raw.nonce || proposal.nonce != *key {
                return Err(corrupt(format!(
                    "proposal {} stored under nonce {}",
                    proposal.nonce, key
                )));
            }

            let outsider = std::iter::once(&proposal.proposer)
                .chain(proposal.confirmations())
                .chain(proposal.rejections())
                .find(|a| !raw.signer_set.contains(*a));
            if let Some(address) = outsider {
                return Err(corrupt(format!(
                    "proposal {} references non-signer {}",
                    key, address
                )));
            }
        }

        Ok(Self {
            id: raw.id,
            signer_set: raw.signer_set,
            nonce: raw.nonce,
            proposals: raw.proposals,
            clock_floor: raw.clock_floor,
            created_at: raw.created_at,
        })
    }
}

impl Wallet {
    /// Create a new wallet with no proposals
    pub fn new(id: WalletId, signer_set: SignerSet, created_at: Timestamp) -> Self {
        Self {
            id,
            signer_set,
            nonce: 0,
            proposals: BTreeMap::new(),
            clock_floor: created_at,
            created_at,
        }
    }

    pub fn id(&self) -> &WalletId {
        &self.id
    }

    pub fn signer_set(&self) -> &SignerSet {
        &self.signer_set
    }

    pub fn is_signer(&self, address: &Address) -> bool {
        self.signer_set.contains(address)
    }

    pub fn required_confirmations(&self) -> usize {
        self.signer_set.required_confirmations()
    }

    /// Number of proposals ever created, which is also the next nonce
    pub fn nonce(&self) -> Nonce {
        self.nonce
    }

    /// Iterate proposals in nonce order
    pub fn proposals(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }

    /// Fold a clock reading into this wallet's notion of now.
    ///
    /// The returned instant never goes backwards, even if the clock does.
    pub fn observe(&mut self, clock_now: Timestamp) -> Timestamp {
        self.clock_floor = self.clock_floor.max(clock_now);
        self.clock_floor
    }

    /// The wallet's current notion of now, given a fresh clock reading
    pub fn now_at(&self, clock_now: Timestamp) -> Timestamp {
        self.clock_floor.max(clock_now)
    }

    /// Look up a proposal by nonce
    pub fn proposal_at(&self, nonce: Nonce) -> Result<&Proposal, MultisigError> {
        self.proposals
            .get(&nonce)
            .ok_or(MultisigError::UnknownProposal(nonce))
    }

    /// Submit a new proposal
    ///
    /// # Errors
    /// `NotASigner` if `caller` is not a signer, `InvalidDeadline` if the
    /// deadline is not strictly after `now`.
    pub fn propose(
        &mut self,
        caller: &Address,
        request: ProposalRequest,
        now: Timestamp,
    ) -> Result<Nonce, MultisigError> {
        self.require_signer(caller)?;

        if request.deadline <= now {
            return Err(MultisigError::InvalidDeadline {
                deadline: request.deadline,
                now,
            });
        }

        let nonce = self.nonce;
        match self.proposals.entry(nonce) {
            Entry::Occupied(_) => {
                return Err(MultisigError::CorruptState(format!(
                    "wallet {}: nonce {} already in use",
                    self.id, nonce
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(Proposal::new(nonce, caller.clone(), request, now));
            }
        }
        self.nonce += 1;

        log::debug!("Wallet {} proposal {} created by {}", self.id, nonce, caller);

        Ok(nonce)
    }

    /// Record a confirmation from `caller`, replacing a rejection if present
    pub fn confirm(&mut self, caller: &Address, nonce: Nonce, now: Timestamp) -> Result<(), MultisigError> {
        self.vote(caller, nonce, Stance::Confirmed, now)
    }

    /// Record a rejection from `caller`, withdrawing a confirmation if present
    pub fn reject(&mut self, caller: &Address, nonce: Nonce, now: Timestamp) -> Result<(), MultisigError> {
        self.vote(caller, nonce, Stance::Rejected, now)
    }

    fn vote(
        &mut self,
        caller: &Address,
        nonce: Nonce,
        stance: Stance,
        now: Timestamp,
    ) -> Result<(), MultisigError> {
        self.require_signer(caller)?;
        let proposal = self.open_proposal(nonce, now)?;
        let changed = proposal.set_stance(caller, stance);
        let confirmations = proposal.confirmation_count();

        if changed {
            log::debug!(
                "Wallet {} proposal {}: {} now {:?} ({} confirmations)",
                self.id,
                nonce,
                caller,
                stance,
                confirmations
            );
        }

        Ok(())
    }

    /// Validate that `nonce` may be executed by `caller` at `now`.
    ///
    /// Does not change the proposal unless its deadline has passed, in which
    /// case it is marked `Expired` before the error is returned.
    pub fn prepare_execution(
        &mut self,
        caller: &Address,
        nonce: Nonce,
        now: Timestamp,
    ) -> Result<ExecutionPlan, MultisigError> {
        self.require_signer(caller)?;
        let have = self.open_proposal(nonce, now)?.confirmation_count();
        if !self.signer_set.is_met(have) {
            return Err(MultisigError::ThresholdNotMet {
                have,
                need: self.signer_set.required_confirmations(),
            });
        }

        let proposal = self.proposal_at(nonce)?;
        Ok(ExecutionPlan {
            nonce,
            target: proposal.target.clone(),
            value: proposal.value,
            call_data: proposal.call_data.clone(),
        })
    }

    /// Mark a prepared proposal as executed once the ledger accepted it
    pub fn complete_execution(
        &mut self,
        nonce: Nonce,
        now: Timestamp,
        reference: String,
    ) -> Result<(), MultisigError> {
        let proposal = self
            .proposals
            .get_mut(&nonce)
            .ok_or(MultisigError::UnknownProposal(nonce))?;

        if proposal.status().is_terminal() {
            return Err(closed(proposal));
        }

        proposal.mark_executed(now, reference);
        Ok(())
    }

    fn require_signer(&self, caller: &Address) -> Result<(), MultisigError> {
        if self.signer_set.contains(caller) {
            Ok(())
        } else {
            Err(MultisigError::NotASigner(caller.clone()))
        }
    }

    /// Fetch a proposal that still accepts votes or execution at `now`.
    ///
    /// A pending proposal found past its deadline is expired here.
    fn open_proposal(&mut self, nonce: Nonce, now: Timestamp) -> Result<&mut Proposal, MultisigError> {
        let id = &self.id;
        let proposal = self
            .proposals
            .get_mut(&nonce)
            .ok_or(MultisigError::UnknownProposal(nonce))?;

        if proposal.status().is_terminal() {
            return Err(closed(proposal));
        }

        if proposal.is_past_deadline(now) {
            proposal.mark_expired();
            log::warn!(
                "Wallet {} proposal {} expired (deadline {}, now {})",
                id,
                nonce,
                proposal.deadline,
                now
            );
            return Err(MultisigError::ProposalExpired {
                nonce,
                deadline: proposal.deadline,
            });
        }

        Ok(proposal)
    }
}

/// Error for a proposal that reached a terminal state
fn closed(proposal: &Proposal) -> MultisigError {
    match proposal.status() {
        ProposalStatus::Executed => MultisigError::AlreadyExecuted(proposal.nonce),
        _ => MultisigError::ProposalExpired {
            nonce: proposal.nonce,
            deadline: proposal.deadline,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: Timestamp = 1_700_000_000;

    fn addr(tag: &str) -> Address {
        Address::derive(tag.as_bytes())
    }

    /// 2-of-3 wallet with signers alice, bob, carol
    fn create_test_wallet() -> Wallet {
        let signers = vec![addr("alice"), addr("bob"), addr("carol")];
        Wallet::new(addr("wallet"), SignerSet::new(signers, 2).unwrap(), T0)
    }

    fn transfer(deadline: Timestamp) -> ProposalRequest {
        ProposalRequest::transfer(addr("x"), 1_000, deadline)
    }

    #[test]
    fn test_nonces_start_at_zero_and_increase() {
        let mut wallet = create_test_wallet();

        for expected in 0..5 {
            let nonce = wallet
                .propose(&addr("alice"), transfer(T0 + 3_600), T0)
                .unwrap();
            assert_eq!(nonce, expected);
        }
        assert_eq!(wallet.nonce(), 5);
        assert_eq!(wallet.proposals().count(), 5);
    }

    #[test]
    fn test_propose_requires_signer_and_future_deadline() {
        let mut wallet = create_test_wallet();

        assert!(matches!(
            wallet.propose(&addr("mallory"), transfer(T0 + 10), T0),
            Err(MultisigError::NotASigner(_))
        ));
        assert!(matches!(
            wallet.propose(&addr("alice"), transfer(T0), T0),
            Err(MultisigError::InvalidDeadline { .. })
        ));
        assert!(matches!(
            wallet.propose(&addr("alice"), transfer(T0 - 1), T0),
            Err(MultisigError::InvalidDeadline { .. })
        ));

        // Failed proposals do not consume nonces
        assert_eq!(wallet.nonce(), 0);
    }

    #[test]
    fn test_confirm_then_reject_keeps_votes_disjoint() {
        let mut wallet = create_test_wallet();
        let nonce = wallet.propose(&addr("alice"), transfer(T0 + 60), T0).unwrap();

        wallet.confirm(&addr("bob"), nonce, T0).unwrap();
        wallet.reject(&addr("bob"), nonce, T0).unwrap();

        let p = wallet.proposal_at(nonce).unwrap();
        assert_eq!(p.confirmation_count(), 0);
        assert_eq!(p.rejections(), vec![&addr("bob")]);

        wallet.confirm(&addr("bob"), nonce, T0).unwrap();
        let p = wallet.proposal_at(nonce).unwrap();
        assert_eq!(p.confirmations(), vec![&addr("bob")]);
        assert_eq!(p.rejection_count(), 0);
    }

    #[test]
    fn test_double_confirm_is_idempotent() {
        let mut wallet = create_test_wallet();
        let nonce = wallet.propose(&addr("alice"), transfer(T0 + 60), T0).unwrap();

        wallet.confirm(&addr("bob"), nonce, T0).unwrap();
        let once = wallet.proposal_at(nonce).unwrap().clone();
        wallet.confirm(&addr("bob"), nonce, T0).unwrap();

        assert_eq!(wallet.proposal_at(nonce).unwrap(), &once);
    }

    #[test]
    fn test_vote_errors() {
        let mut wallet = create_test_wallet();
        let nonce = wallet.propose(&addr("alice"), transfer(T0 + 60), T0).unwrap();

        assert!(matches!(
            wallet.confirm(&addr("mallory"), nonce, T0),
            Err(MultisigError::NotASigner(_))
        ));
        assert!(matches!(
            wallet.reject(&addr("bob"), 7, T0),
            Err(MultisigError::UnknownProposal(7))
        ));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut wallet = create_test_wallet();
        let nonce = wallet.propose(&addr("alice"), transfer(T0 + 60), T0).unwrap();

        wallet.confirm(&addr("bob"), nonce, T0).unwrap();
        assert!(matches!(
            wallet.prepare_execution(&addr("carol"), nonce, T0),
            Err(MultisigError::ThresholdNotMet { have: 1, need: 2 })
        ));

        wallet.confirm(&addr("alice"), nonce, T0).unwrap();
        let plan = wallet.prepare_execution(&addr("carol"), nonce, T0).unwrap();
        assert_eq!(plan.nonce, nonce);
        assert_eq!(plan.value, 1_000);
        assert_eq!(plan.target, addr("x"));

        // Preparing alone does not execute
        assert!(wallet.proposal_at(nonce).unwrap().is_pending());
    }

    #[test]
    fn test_rejections_do_not_count_toward_threshold() {
        let mut wallet = create_test_wallet();
        let nonce = wallet.propose(&addr("alice"), transfer(T0 + 60), T0).unwrap();

        wallet.confirm(&addr("alice"), nonce, T0).unwrap();
        wallet.confirm(&addr("bob"), nonce, T0).unwrap();
        wallet.reject(&addr("bob"), nonce, T0).unwrap();

        assert!(matches!(
            wallet.prepare_execution(&addr("alice"), nonce, T0),
            Err(MultisigError::ThresholdNotMet { have: 1, need: 2 })
        ));
    }

    #[test]
    fn test_deadline_boundary_still_valid() {
        let mut wallet = create_test_wallet();
        let nonce = wallet.propose(&addr("alice"), transfer(T0 + 60), T0).unwrap();

        wallet.confirm(&addr("alice"), nonce, T0 + 60).unwrap();
        wallet.confirm(&addr("bob"), nonce, T0 + 60).unwrap();
        assert!(wallet.prepare_execution(&addr("bob"), nonce, T0 + 60).is_ok());
    }

    #[test]
    fn test_stale_vote_expires_proposal() {
        let mut wallet = create_test_wallet();
        let nonce = wallet.propose(&addr("alice"), transfer(T0 + 1), T0).unwrap();

        assert!(matches!(
            wallet.confirm(&addr("bob"), nonce, T0 + 2),
            Err(MultisigError::ProposalExpired { .. })
        ));

        let p = wallet.proposal_at(nonce).unwrap();
        assert_eq!(p.status(), ProposalStatus::Expired);
        assert_eq!(p.confirmation_count(), 0);
    }

    #[test]
    fn test_stale_execute_expires_proposal_even_with_votes() {
        let mut wallet = create_test_wallet();
        let nonce = wallet.propose(&addr("alice"), transfer(T0 + 1), T0).unwrap();
        wallet.confirm(&addr("alice"), nonce, T0).unwrap();
        wallet.confirm(&addr("bob"), nonce, T0).unwrap();

        assert!(matches!(
            wallet.prepare_execution(&addr("bob"), nonce, T0 + 2),
            Err(MultisigError::ProposalExpired { .. })
        ));
        assert_eq!(
            wallet.proposal_at(nonce).unwrap().status(),
            ProposalStatus::Expired
        );
    }

    #[test]
    fn test_terminal_states_absorb() {
        let mut wallet = create_test_wallet();

        // Executed
        let done = wallet.propose(&addr("alice"), transfer(T0 + 60), T0).unwrap();
        wallet.confirm(&addr("alice"), done, T0).unwrap();
        wallet.confirm(&addr("bob"), done, T0).unwrap();
        wallet.prepare_execution(&addr("alice"), done, T0).unwrap();
        wallet.complete_execution(done, T0, "ref".to_string()).unwrap();
        let executed = wallet.proposal_at(done).unwrap().clone();

        assert!(matches!(
            wallet.reject(&addr("carol"), done, T0),
            Err(MultisigError::AlreadyExecuted(_))
        ));
        assert!(matches!(
            wallet.prepare_execution(&addr("carol"), done, T0),
            Err(MultisigError::AlreadyExecuted(_))
        ));
        assert!(matches!(
            wallet.complete_execution(done, T0, "again".to_string()),
            Err(MultisigError::AlreadyExecuted(_))
        ));
        assert_eq!(wallet.proposal_at(done).unwrap(), &executed);

        // Expired
        let stale = wallet.propose(&addr("alice"), transfer(T0 + 1), T0).unwrap();
        let _ = wallet.confirm(&addr("alice"), stale, T0 + 5);
        let expired = wallet.proposal_at(stale).unwrap().clone();

        // Even if time were to go back, an expired proposal stays expired
        assert!(matches!(
            wallet.confirm(&addr("bob"), stale, T0),
            Err(MultisigError::ProposalExpired { .. })
        ));
        assert_eq!(wallet.proposal_at(stale).unwrap(), &expired);
    }

    #[test]
    fn test_observe_never_goes_backwards() {
        let mut wallet = create_test_wallet();
        assert_eq!(wallet.observe(T0 + 10), T0 + 10);
        assert_eq!(wallet.observe(T0 + 5), T0 + 10);
        assert_eq!(wallet.now_at(T0), T0 + 10);
        assert_eq!(wallet.observe(T0 + 20), T0 + 20);
    }

    #[test]
    fn test_wallet_serialization() {
        let mut wallet = create_test_wallet();
        let nonce = wallet
            .propose(
                &addr("alice"),
                transfer(T0 + 60).with_call_data(vec![0xca, 0xfe]),
                T0,
            )
            .unwrap();
        wallet.confirm(&addr("bob"), nonce, T0).unwrap();

        let json = serde_json::to_string(&wallet).unwrap();
        let back: Wallet = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id(), wallet.id());
        assert_eq!(back.nonce(), 1);
        assert_eq!(back.proposal_at(0).unwrap(), wallet.proposal_at(0).unwrap());
    }

    #[test]
    fn test_propose_never_overwrites_an_occupied_nonce() {
        let mut wallet = create_test_wallet();
        wallet.propose(&addr("alice"), transfer(T0 + 60), T0).unwrap();
        let original = wallet.proposal_at(0).unwrap().clone();

        // Counter pulled back behind an existing proposal
        wallet.nonce = 0;
        assert!(matches!(
            wallet.propose(&addr("bob"), transfer(T0 + 90), T0),
            Err(MultisigError::CorruptState(_))
        ));
        assert_eq!(wallet.proposal_at(0).unwrap(), &original);
        assert_eq!(wallet.nonce(), 0);
    }

    #[test]
    fn test_deserialize_rejects_inconsistent_wallets() {
        let mut wallet = create_test_wallet();
        wallet.propose(&addr("alice"), transfer(T0 + 60), T0).unwrap();
        wallet.confirm(&addr("bob"), 0, T0).unwrap();
        let json = serde_json::to_value(&wallet).unwrap();

        let tampered = |edit: &dyn Fn(&mut serde_json::Value)| {
            let mut value = json.clone();
            edit(&mut value);
            serde_json::from_value::<Wallet>(value)
        };

        assert!(tampered(&|_| {}).is_ok());

        // Nonce rewound below the stored proposals
        assert!(tampered(&|v| v["nonce"] = 0.into()).is_err());

        // Nonce ahead of the stored proposals
        assert!(tampered(&|v| v["nonce"] = 2.into()).is_err());

        // Proposal filed under the wrong key
        assert!(tampered(&|v| v["proposals"]["0"]["nonce"] = 5.into()).is_err());

        // Vote from an address outside the signer set
        let mallory = addr("mallory").to_string();
        assert!(tampered(&|v| {
            v["proposals"]["0"]["votes"][mallory.as_str()] = "Confirmed".into()
        })
        .is_err());

        // Proposer outside the signer set
        assert!(tampered(&|v| v["proposals"]["0"]["proposer"] = mallory.clone().into()).is_err());
    }
}
