//! Proposals awaiting signer approval
//!
//! A proposal is one requested action (transfer or call) plus the current
//! stance of every signer that has voted on it.

use crate::core::encoding::hex_bytes;
use crate::core::{Address, Timestamp};
use crate::multisig::error::Nonce;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A signer's current vote on a proposal
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Stance {
    /// Has not voted, or nothing recorded
    Unset,
    Confirmed,
    Rejected,
}

/// Lifecycle of a proposal. `Executed` and `Expired` are terminal.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProposalStatus {
    /// Collecting votes
    Pending,
    /// Action performed by the ledger
    Executed,
    /// Deadline passed before execution
    Expired,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalStatus::Pending)
    }
}

/// What a signer asks the wallet to do
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProposalRequest {
    pub target: Address,
    pub value: u128,
    pub call_data: Vec<u8>,
    pub deadline: Timestamp,
}

impl ProposalRequest {
    /// Plain value transfer with empty call data
    pub fn transfer(target: Address, value: u128, deadline: Timestamp) -> Self {
        Self {
            target,
            value,
            call_data: Vec::new(),
            deadline,
        }
    }

    /// Attach a call payload
    pub fn with_call_data(mut self, call_data: Vec<u8>) -> Self {
        self.call_data = call_data;
        self
    }
}

/// A proposal stored by a wallet
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Proposal {
    pub nonce: Nonce,
    pub proposer: Address,
    pub target: Address,
    pub value: u128,
    #[serde(with = "hex_bytes")]
    pub call_data: Vec<u8>,
    pub deadline: Timestamp,
    pub created_at: Timestamp,
    /// Current stance per signer; absent means `Unset`
    votes: BTreeMap<Address, Stance>,
    status: ProposalStatus,
    /// When the ledger action succeeded
    pub executed_at: Option<Timestamp>,
    /// Ledger reference of the performed action
    pub execution_ref: Option<String>,
}

impl Proposal {
    /// Create a new pending proposal with no votes
    pub fn new(nonce: Nonce, proposer: Address, request: ProposalRequest, created_at: Timestamp) -> Self {
        Self {
            nonce,
            proposer,
            target: request.target,
            value: request.value,
            call_data: request.call_data,
            deadline: request.deadline,
            created_at,
            votes: BTreeMap::new(),
            status: ProposalStatus::Pending,
            executed_at: None,
            execution_ref: None,
        }
    }

    pub fn status(&self) -> ProposalStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == ProposalStatus::Pending
    }

    pub fn is_executed(&self) -> bool {
        self.status == ProposalStatus::Executed
    }

    /// Deadline has passed at `now`. The deadline instant itself is still valid.
    pub fn is_past_deadline(&self, now: Timestamp) -> bool {
        now > self.deadline
    }

    /// Current stance of `signer`
    pub fn stance_of(&self, signer: &Address) -> Stance {
        self.votes.get(signer).copied().unwrap_or(Stance::Unset)
    }

    /// Record `stance` as the signer's current vote, replacing any earlier one.
    ///
    /// Returns `true` if the recorded stance changed.
    pub(crate) fn set_stance(&mut self, signer: &Address, stance: Stance) -> bool {
        let previous = self.stance_of(signer);
        match stance {
            Stance::Unset => {
                self.votes.remove(signer);
            }
            _ => {
                self.votes.insert(signer.clone(), stance);
            }
        }
        previous != stance
    }

    pub(crate) fn mark_expired(&mut self) {
        self.status = ProposalStatus::Expired;
    }

    pub(crate) fn mark_executed(&mut self, at: Timestamp, reference: String) {
        self.status = ProposalStatus::Executed;
        self.executed_at = Some(at);
        self.execution_ref = Some(reference);
    }

    /// Signers currently confirming
    pub fn confirmations(&self) -> Vec<&Address> {
        self.with_stance(Stance::Confirmed)
    }

    /// Signers currently rejecting
    pub fn rejections(&self) -> Vec<&Address> {
        self.with_stance(Stance::Rejected)
    }

    pub fn confirmation_count(&self) -> usize {
        self.votes.values().filter(|s| **s == Stance::Confirmed).count()
    }

    pub fn rejection_count(&self) -> usize {
        self.votes.values().filter(|s| **s == Stance::Rejected).count()
    }

    fn with_stance(&self, stance: Stance) -> Vec<&Address> {
        self.votes
            .iter()
            .filter(|(_, s)| **s == stance)
            .map(|(addr, _)| addr)
            .collect()
    }

    /// Read-only summary handed to observers
    pub fn view(&self) -> ProposalView {
        ProposalView {
            nonce: self.nonce,
            proposer: self.proposer.clone(),
            confirmations: self.confirmation_count(),
            rejections: self.rejection_count(),
            executed: self.is_executed(),
            status: self.status,
            deadline: self.deadline,
            target: self.target.clone(),
            value: self.value,
            call_data: self.call_data.clone(),
        }
    }
}

/// Snapshot of a proposal as exposed to the presentation layer
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProposalView {
    pub nonce: Nonce,
    pub proposer: Address,
    pub confirmations: usize,
    pub rejections: usize,
    pub executed: bool,
    pub status: ProposalStatus,
    pub deadline: Timestamp,
    pub target: Address,
    pub value: u128,
    #[serde(with = "hex_bytes")]
    pub call_data: Vec<u8>,
}

impl ProposalView {
    /// Seconds left until the deadline, `None` once it has passed
    pub fn remaining(&self, now: Timestamp) -> Option<u64> {
        self.deadline.checked_sub(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(tag: &str) -> Address {
        Address::derive(tag.as_bytes())
    }

    fn sample() -> Proposal {
        Proposal::new(
            0,
            addr("alice"),
            ProposalRequest::transfer(addr("target"), 100, 2_000),
            1_000,
        )
    }

    #[test]
    fn test_new_proposal_is_pending_without_votes() {
        let p = sample();
        assert!(p.is_pending());
        assert_eq!(p.confirmation_count(), 0);
        assert_eq!(p.rejection_count(), 0);
        assert_eq!(p.stance_of(&addr("alice")), Stance::Unset);
    }

    #[test]
    fn test_later_vote_replaces_earlier_one() {
        let mut p = sample();
        let bob = addr("bob");

        assert!(p.set_stance(&bob, Stance::Confirmed));
        assert_eq!(p.confirmations(), vec![&bob]);

        assert!(p.set_stance(&bob, Stance::Rejected));
        assert!(p.confirmations().is_empty());
        assert_eq!(p.rejections(), vec![&bob]);

        assert!(p.set_stance(&bob, Stance::Unset));
        assert_eq!(p.rejection_count(), 0);
    }

    #[test]
    fn test_repeated_vote_is_noop() {
        let mut p = sample();
        let bob = addr("bob");

        assert!(p.set_stance(&bob, Stance::Confirmed));
        let after_first = p.clone();
        assert!(!p.set_stance(&bob, Stance::Confirmed));
        assert_eq!(p, after_first);
    }

    #[test]
    fn test_deadline_boundary_is_inclusive() {
        let p = sample();
        assert!(!p.is_past_deadline(2_000));
        assert!(p.is_past_deadline(2_001));
    }

    #[test]
    fn test_view_and_remaining() {
        let mut p = sample();
        p.set_stance(&addr("bob"), Stance::Confirmed);
        p.set_stance(&addr("carol"), Stance::Rejected);

        let view = p.view();
        assert_eq!(view.confirmations, 1);
        assert_eq!(view.rejections, 1);
        assert!(!view.executed);
        assert_eq!(view.remaining(1_500), Some(500));
        assert_eq!(view.remaining(2_000), Some(0));
        assert_eq!(view.remaining(2_001), None);
    }

    #[test]
    fn test_terminal_status() {
        let mut p = sample();
        assert!(!p.status().is_terminal());

        p.mark_executed(1_500, "ref".to_string());
        assert!(p.status().is_terminal());
        assert!(p.view().executed);
        assert_eq!(p.executed_at, Some(1_500));
    }
}
