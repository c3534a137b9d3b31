//! # pneuma-ledger — Ledger Collaborator
//!
//! Anchors `(fingerprint, content_id, timestamp, device_id)` tuples on an
//! append-only smart-contract ledger and reads them back by index. This
//! crate defines the [`Ledger`] trait and two backends:
//!
//! - [`EvmLedger`] — an anchoring contract on an EVM-compatible chain,
//!   reached via JSON-RPC. Transaction signing is delegated to the RPC
//!   endpoint's key management; the node never holds a raw private key.
//! - [`MockLedger`] — an in-memory ledger for tests and development.
//!
//! ## Security Invariant
//!
//! Implementations must ensure that `submit()` only returns `Ok` when the
//! anchor has been durably recorded (one confirmation). Returning `Ok`
//! for an unconfirmed anchor would let the watcher mark a pending file as
//! processed before the ledger actually holds its record.
//!
//! The trait is deliberately open (not sealed): the node's workflow and
//! watcher take `Arc<dyn Ledger>` by constructor injection, and tests
//! substitute doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pneuma_core::ContentDigest;

mod abi;
mod evm;
mod mock;

pub use evm::{EvmLedger, EvmLedgerConfig};
pub use mock::MockLedger;

/// Errors from ledger operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The ledger rejected the anchor request before submission.
    #[error("anchor rejected: {0}")]
    Rejected(String),

    /// The ledger endpoint is unavailable.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The anchor transaction failed on-chain (signing failure, revert,
    /// out-of-gas).
    #[error("anchor transaction failed: {0}")]
    TransactionFailed(String),

    /// The transaction was submitted but not confirmed within the
    /// configured window.
    #[error("transaction {transaction_id} not confirmed within {waited_secs}s")]
    ConfirmationTimeout {
        /// The submitted transaction id.
        transaction_id: String,
        /// How long the node waited.
        waited_secs: u64,
    },

    /// The RPC endpoint returned a response the client cannot interpret.
    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),
}

/// A request to anchor one analysis record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorRequest {
    /// Content id of the stored payload.
    pub content_id: ContentDigest,
    /// Stable fingerprint of the record (idempotency key).
    pub fingerprint: ContentDigest,
    /// Node timestamp stamped into the record (seconds since epoch).
    pub timestamp: u64,
    /// Device the record originated from.
    pub device_id: String,
}

/// One anchored record as read back from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Content id of the stored payload.
    pub content_id: ContentDigest,
    /// Stable fingerprint of the record.
    pub fingerprint: ContentDigest,
    /// Timestamp recorded with the anchor.
    pub timestamp: u64,
    /// Device the record originated from.
    pub device_id: String,
}

/// Status of an anchor transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    /// Submitted but not yet confirmed.
    Pending,
    /// Confirmed in a block.
    Confirmed,
    /// Failed on-chain.
    Failed,
}

/// Receipt of a confirmed anchor transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReceipt {
    /// Transaction identifier (hash or reference).
    pub transaction_id: String,
    /// Block number containing the transaction.
    pub block_number: u64,
    /// Gas consumed by the transaction.
    pub gas_used: u64,
    /// Final status at return time.
    pub status: TxStatus,
}

/// Append-only anchoring ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Submit an anchor and block until one confirmation.
    async fn submit(&self, request: AnchorRequest) -> Result<LedgerReceipt, LedgerError>;

    /// Read one anchored record by position. `Ok(None)` if out of range.
    async fn read(&self, index: u64) -> Result<Option<LedgerEntry>, LedgerError>;

    /// Total number of anchored records.
    async fn count(&self) -> Result<u64, LedgerError>;

    /// Index of an existing anchor with this fingerprint, if any.
    async fn find(&self, fingerprint: &ContentDigest) -> Result<Option<u64>, LedgerError>;

    /// Connectivity probe. Used as a fatal startup check.
    async fn health(&self) -> Result<(), LedgerError>;
}
