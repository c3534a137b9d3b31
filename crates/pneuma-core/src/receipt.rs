//! # Anchor Receipt
//!
//! The confirmation record returned after a ledger write is included in a
//! block. Created once per successful anchoring, never mutated, and never
//! persisted locally — the ledger and the content store are the system of
//! record.

use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;

/// Receipt for one successfully anchored analysis record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    /// Content id of the stored payload (stamped record).
    pub content_id: ContentDigest,
    /// Stable fingerprint of the record (idempotency key).
    pub fingerprint: ContentDigest,
    /// Ledger transaction identifier.
    pub transaction_id: String,
    /// Block number containing the anchor transaction.
    pub block_number: u64,
    /// Node timestamp stamped into the record (seconds since epoch).
    pub timestamp: u64,
    /// Device the record originated from.
    pub device_id: String,
}
