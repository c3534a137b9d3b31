//! # Anchoring Workflow
//!
//! The store-then-anchor orchestration: validate the record, derive its
//! fingerprint, store the stamped payload, anchor the content id on the
//! ledger, return the receipt. Also the read side: count, positional get,
//! and full listing.
//!
//! ## Ordering Invariant
//!
//! The content id must exist in the store before the ledger transaction
//! referencing it is submitted. `anchor` enforces this by construction:
//! the ledger submit only happens after `store.put` returns.
//!
//! ## Idempotency
//!
//! Re-invoking `anchor` on the same upstream record is safe: the
//! fingerprint (canonical record minus the node-injected timestamp) is
//! checked against the ledger before any write, and a hit short-circuits
//! with zero store or ledger writes.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use pneuma_core::{AnalysisRecord, AnchorReceipt, CanonicalError, RecordError};
use pneuma_ledger::{AnchorRequest, Ledger, LedgerEntry, LedgerError};
use pneuma_store::{ContentStore, StoreError};

/// Errors from the anchoring workflow, tagged by the failing stage.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The record failed validation; nothing was written.
    #[error("validation error: {0}")]
    Validation(#[from] RecordError),

    /// The record could not be canonicalized; nothing was written.
    #[error("canonicalization error: {0}")]
    Canonical(#[from] CanonicalError),

    /// The content store rejected or failed the payload write.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// The ledger submit failed; the payload may already be stored
    /// (harmless — the store is content-addressed and a retry reuses it).
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Result of an anchor invocation.
#[derive(Debug, Clone)]
pub enum AnchorOutcome {
    /// The record was stored and anchored by this call.
    Anchored(AnchorReceipt),
    /// An anchor with the same fingerprint already existed; no writes
    /// were performed.
    AlreadyAnchored {
        /// Ledger position of the existing anchor.
        index: u64,
        /// The existing ledger entry.
        entry: LedgerEntry,
    },
}

impl AnchorOutcome {
    /// The device id recorded by this outcome.
    pub fn device_id(&self) -> &str {
        match self {
            Self::Anchored(receipt) => &receipt.device_id,
            Self::AlreadyAnchored { entry, .. } => &entry.device_id,
        }
    }
}

/// One anchored record hydrated with its stored payload.
#[derive(Debug, Clone)]
pub struct AnchoredRecord {
    /// Ledger position.
    pub index: u64,
    /// The ledger entry.
    pub entry: LedgerEntry,
    /// The payload resolved from the content store.
    pub payload: Value,
}

/// Store-then-anchor orchestration over injected collaborators.
pub struct AnchoringWorkflow {
    store: Arc<dyn ContentStore>,
    ledger: Arc<dyn Ledger>,
}

impl AnchoringWorkflow {
    /// Create a workflow over the given collaborators.
    pub fn new(store: Arc<dyn ContentStore>, ledger: Arc<dyn Ledger>) -> Self {
        Self { store, ledger }
    }

    /// Anchor one analysis record.
    ///
    /// Validates, fingerprints, checks for an existing anchor, stamps the
    /// node timestamp, stores the payload, submits the anchor transaction,
    /// and blocks until one confirmation.
    pub async fn anchor(&self, record: AnalysisRecord) -> Result<AnchorOutcome, WorkflowError> {
        let mut record = record;
        let device_id = record.device_id()?.to_string();
        let fingerprint = record.fingerprint()?;

        if let Some(index) = self.ledger.find(&fingerprint).await? {
            if let Some(entry) = self.ledger.read(index).await? {
                tracing::info!(
                    device_id = %device_id,
                    fingerprint = %fingerprint,
                    index,
                    "record already anchored, skipping"
                );
                return Ok(AnchorOutcome::AlreadyAnchored { index, entry });
            }
        }

        let timestamp = chrono::Utc::now().timestamp() as u64;
        record.stamp(timestamp);

        let content_id = self.store.put(&record.to_value()).await?;
        tracing::info!(
            device_id = %device_id,
            content_id = %content_id,
            "payload stored, submitting anchor transaction"
        );

        let receipt = self
            .ledger
            .submit(AnchorRequest {
                content_id: content_id.clone(),
                fingerprint: fingerprint.clone(),
                timestamp,
                device_id: device_id.clone(),
            })
            .await?;

        tracing::info!(
            device_id = %device_id,
            transaction_id = %receipt.transaction_id,
            block_number = receipt.block_number,
            "anchor confirmed"
        );

        Ok(AnchorOutcome::Anchored(AnchorReceipt {
            content_id,
            fingerprint,
            transaction_id: receipt.transaction_id,
            block_number: receipt.block_number,
            timestamp,
            device_id,
        }))
    }

    /// Total anchored records. Advisory: returns 0 on read failure rather
    /// than propagating the error.
    pub async fn count(&self) -> u64 {
        match self.ledger.count().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("ledger count unavailable, reporting 0: {e}");
                0
            }
        }
    }

    /// Read one anchored record by position, hydrated with its payload.
    ///
    /// Returns `None` if the ledger read fails, the index is out of
    /// range, or the payload cannot be resolved from the store.
    pub async fn get(&self, index: u64) -> Option<AnchoredRecord> {
        let entry = match self.ledger.read(index).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(index, "ledger read failed: {e}");
                return None;
            }
        };

        let payload = match self.store.get(&entry.content_id).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                tracing::warn!(
                    index,
                    content_id = %entry.content_id,
                    "anchored payload missing from content store"
                );
                return None;
            }
            Err(e) => {
                tracing::warn!(index, "content store read failed: {e}");
                return None;
            }
        };

        Some(AnchoredRecord {
            index,
            entry,
            payload,
        })
    }

    /// List every anchored record with its payload.
    ///
    /// Sequential positional reads — O(count) round trips, acceptable for
    /// the small record counts this node manages.
    pub async fn list_all(&self) -> Vec<AnchoredRecord> {
        let count = self.count().await;
        let mut records = Vec::with_capacity(count as usize);
        for index in 0..count {
            if let Some(record) = self.get(index).await {
                records.push(record);
            }
        }
        records
    }
}
