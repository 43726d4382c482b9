//! In-process ledger that journals every accepted action

use crate::core::encoding::hex_bytes;
use crate::core::{Address, WalletId};
use crate::crypto::sha256_hex;
use crate::ledger::{ActionKind, Ledger, LedgerError, LedgerReceipt};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A single action accepted by the ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub reference: String,
    pub kind: ActionKind,
    pub source: WalletId,
    pub target: Address,
    pub value: u128,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    pub recorded_at: DateTime<Utc>,
}

/// Ledger that keeps its journal in memory.
///
/// Supports injected failures and latency so callers can exercise the
/// engine's failure and timeout paths.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    entries: Mutex<Vec<LedgerEntry>>,
    failures_pending: AtomicUsize,
    latency_ms: AtomicU64,
}

impl InMemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger seeded with a previously persisted journal
    pub fn with_entries(entries: Vec<LedgerEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    /// Make the next `count` actions fail with [`LedgerError::Unavailable`]
    pub fn fail_next(&self, count: usize) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    /// Delay every action by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Snapshot of the journal
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Entries originating from one wallet
    pub fn entries_for(&self, source: &WalletId) -> Vec<LedgerEntry> {
        self.entries()
            .into_iter()
            .filter(|e| &e.source == source)
            .collect()
    }

    /// Number of journaled actions
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_failure(&self) -> bool {
        self.failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn record(
        &self,
        kind: ActionKind,
        source: &WalletId,
        target: &Address,
        value: u128,
        data: &[u8],
    ) -> Result<LedgerReceipt, LedgerError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.take_failure() {
            return Err(LedgerError::Unavailable("injected failure".to_string()));
        }

        let mut entries = self
            .entries
            .lock()
            .map_err(|_| LedgerError::Unavailable("journal lock poisoned".to_string()))?;

        let recorded_at = Utc::now();
        let reference = sha256_hex(
            format!(
                "{}:{}:{}:{}:{}",
                source,
                target,
                value,
                hex::encode(data),
                entries.len()
            )
            .as_bytes(),
        );

        entries.push(LedgerEntry {
            reference: reference.clone(),
            kind,
            source: source.clone(),
            target: target.clone(),
            value,
            data: data.to_vec(),
            recorded_at,
        });

        log::debug!("Ledger recorded {:?} {} -> {} ({})", kind, source, target, value);

        Ok(LedgerReceipt { reference, kind })
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn transfer(
        &self,
        source: &WalletId,
        target: &Address,
        value: u128,
    ) -> Result<LedgerReceipt, LedgerError> {
        self.record(ActionKind::Transfer, source, target, value, &[])
            .await
    }

    async fn call(
        &self,
        source: &WalletId,
        target: &Address,
        value: u128,
        data: &[u8],
    ) -> Result<LedgerReceipt, LedgerError> {
        self.record(ActionKind::Call, source, target, value, data)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(tag: &str) -> Address {
        Address::derive(tag.as_bytes())
    }

    #[tokio::test]
    async fn test_transfer_is_journaled() {
        let ledger = InMemoryLedger::new();
        let receipt = ledger.transfer(&addr("w"), &addr("x"), 10).await.unwrap();

        assert_eq!(receipt.kind, ActionKind::Transfer);
        assert_eq!(ledger.len(), 1);

        let entry = &ledger.entries()[0];
        assert_eq!(entry.reference, receipt.reference);
        assert_eq!(entry.value, 10);
        assert!(entry.data.is_empty());
    }

    #[tokio::test]
    async fn test_call_keeps_payload() {
        let ledger = InMemoryLedger::new();
        ledger
            .call(&addr("w"), &addr("x"), 0, &[1, 2, 3])
            .await
            .unwrap();

        let entries = ledger.entries_for(&addr("w"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, ActionKind::Call);
        assert_eq!(entries[0].data, vec![1, 2, 3]);
        assert!(ledger.entries_for(&addr("other")).is_empty());
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let ledger = InMemoryLedger::new();
        ledger.fail_next(1);

        let first = ledger.transfer(&addr("w"), &addr("x"), 1).await;
        assert!(matches!(first, Err(LedgerError::Unavailable(_))));
        assert!(ledger.is_empty());

        ledger.transfer(&addr("w"), &addr("x"), 1).await.unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_entry_serialization() {
        let ledger = InMemoryLedger::with_entries(vec![LedgerEntry {
            reference: "ref".to_string(),
            kind: ActionKind::Call,
            source: addr("w"),
            target: addr("x"),
            value: 5,
            data: vec![0xab],
            recorded_at: Utc::now(),
        }]);

        let json = serde_json::to_string(&ledger.entries()).unwrap();
        assert!(json.contains("\"0xab\""));

        let back: Vec<LedgerEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ledger.entries());
    }
}
