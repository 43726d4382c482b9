//! Signer set validation
//!
//! A wallet's signers and confirmation threshold are fixed when the wallet is
//! created and never change afterwards.

use crate::core::Address;
use crate::multisig::error::MultisigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Authorized signers of a wallet plus the confirmation threshold (M-of-N)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawSignerSet")]
pub struct SignerSet {
    /// Signers in the order they were supplied at creation
    signers: Vec<Address>,
    /// Minimum distinct confirmations needed to execute (M)
    required_confirmations: usize,
}

/// Unvalidated form used when loading persisted wallets
#[derive(Deserialize)]
struct RawSignerSet {
    signers: Vec<Address>,
    required_confirmations: usize,
}

impl TryFrom<RawSignerSet> for SignerSet {
    type Error = MultisigError;

    fn try_from(raw: RawSignerSet) -> Result<Self, Self::Error> {
        SignerSet::new(raw.signers, raw.required_confirmations)
    }
}

impl SignerSet {
    /// Create a new signer set
    ///
    /// # Errors
    /// Returns [`MultisigError::InvalidConfiguration`] if the list is empty,
    /// contains duplicates, or the threshold is outside `1..=signers.len()`.
    pub fn new(signers: Vec<Address>, required_confirmations: usize) -> Result<Self, MultisigError> {
        if signers.is_empty() {
            return Err(MultisigError::InvalidConfiguration(
                "at least one signer is required".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for signer in &signers {
            if !seen.insert(signer) {
                return Err(MultisigError::InvalidConfiguration(format!(
                    "duplicate signer {}",
                    signer
                )));
            }
        }

        if required_confirmations == 0 {
            return Err(MultisigError::InvalidConfiguration(
                "required confirmations must be at least 1".to_string(),
            ));
        }

        if required_confirmations > signers.len() {
            return Err(MultisigError::InvalidConfiguration(format!(
                "required confirmations {} exceeds signer count {}",
                required_confirmations,
                signers.len()
            )));
        }

        Ok(Self {
            signers,
            required_confirmations,
        })
    }

    pub fn signers(&self) -> &[Address] {
        &self.signers
    }

    pub fn required_confirmations(&self) -> usize {
        self.required_confirmations
    }

    /// Total signer count (N)
    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.signers.contains(address)
    }

    /// Whether `confirmations` reaches the threshold
    pub fn is_met(&self, confirmations: usize) -> bool {
        confirmations >= self.required_confirmations
    }

    /// Get description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.required_confirmations, self.signers.len())
    }
}
