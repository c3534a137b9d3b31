//! # Mock Ledger
//!
//! In-memory ledger for tests and local development. Simulates immediate
//! single-confirmation anchoring with deterministic transaction ids
//! derived from the fingerprint and monotonically increasing block
//! numbers.
//!
//! ## Warning
//!
//! This implementation provides NO durability or finality guarantees. It
//! is suitable only for tests and development deployments without a chain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use pneuma_core::ContentDigest;

use crate::{AnchorRequest, Ledger, LedgerEntry, LedgerError, LedgerReceipt, TxStatus};

/// Simulated gas cost of one anchor transaction.
const MOCK_GAS_USED: u64 = 64_000;

/// In-memory append-only ledger.
#[derive(Debug, Default)]
pub struct MockLedger {
    entries: RwLock<Vec<LedgerEntry>>,
    by_fingerprint: RwLock<HashMap<String, u64>>,
    next_block: AtomicU64,
    submits: AtomicU64,
    failing: AtomicBool,
}

impl MockLedger {
    /// Create an empty mock ledger.
    pub fn new() -> Self {
        Self {
            next_block: AtomicU64::new(1),
            ..Self::default()
        }
    }

    /// Number of `submit` calls that reached the ledger.
    pub fn submit_count(&self) -> u64 {
        self.submits.load(Ordering::SeqCst)
    }

    /// Switch every subsequent operation into failure mode.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn submit(&self, request: AnchorRequest) -> Result<LedgerReceipt, LedgerError> {
        self.check_available()?;
        self.submits.fetch_add(1, Ordering::SeqCst);

        let block = self.next_block.fetch_add(1, Ordering::SeqCst);
        let tx_id = format!(
            "mock-tx-{}",
            request.fingerprint.to_hex().get(..16).unwrap_or("unknown")
        );

        let index = {
            let mut entries = self.entries.write();
            entries.push(LedgerEntry {
                content_id: request.content_id,
                fingerprint: request.fingerprint.clone(),
                timestamp: request.timestamp,
                device_id: request.device_id,
            });
            (entries.len() - 1) as u64
        };
        self.by_fingerprint
            .write()
            .entry(request.fingerprint.to_hex())
            .or_insert(index);

        Ok(LedgerReceipt {
            transaction_id: tx_id,
            block_number: block,
            gas_used: MOCK_GAS_USED,
            status: TxStatus::Confirmed,
        })
    }

    async fn read(&self, index: u64) -> Result<Option<LedgerEntry>, LedgerError> {
        self.check_available()?;
        Ok(self.entries.read().get(index as usize).cloned())
    }

    async fn count(&self) -> Result<u64, LedgerError> {
        self.check_available()?;
        Ok(self.entries.read().len() as u64)
    }

    async fn find(&self, fingerprint: &ContentDigest) -> Result<Option<u64>, LedgerError> {
        self.check_available()?;
        Ok(self.by_fingerprint.read().get(&fingerprint.to_hex()).copied())
    }

    async fn health(&self) -> Result<(), LedgerError> {
        self.check_available()
    }
}
