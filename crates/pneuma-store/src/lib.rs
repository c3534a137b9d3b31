//! # pneuma-store — Content-Store Collaborator
//!
//! The node stores each analysis record's payload in a content-addressed
//! store and receives a content id (the SHA-256 digest of the canonical
//! payload) in return. This crate defines the [`ContentStore`] trait and
//! three backends:
//!
//! - [`HttpContentStore`] — a content-store daemon reached over HTTP
//!   (production deployment).
//! - [`FsContentStore`] — a filesystem CAS at `{root}/{digest}.json`,
//!   integrity-verified on read (local/edge deployment).
//! - [`MemoryContentStore`] — an in-memory double for tests.
//!
//! ## Integrity Invariant
//!
//! Every content id is the digest of the payload's canonical bytes. The
//! filesystem backend recomputes and verifies the digest at retrieval
//! time; corruption or substitution is detected at read time, not at use
//! time.
//!
//! ## Architecture
//!
//! Backends are `Send + Sync` and shared via `Arc<dyn ContentStore>`
//! across async tasks; the workflow and watcher receive them by
//! constructor injection.

use async_trait::async_trait;
use serde_json::Value;

use pneuma_core::ContentDigest;

mod fs;
mod http;
mod memory;
mod retry;

pub use fs::FsContentStore;
pub use http::{HttpContentStore, HttpStoreConfig};
pub use memory::MemoryContentStore;

/// Errors from content-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Canonicalization of the payload failed.
    #[error("canonicalization error: {0}")]
    Canonical(#[from] pneuma_core::CanonicalError),

    /// Filesystem I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        /// The endpoint that failed.
        endpoint: String,
        /// Underlying transport error.
        source: reqwest::Error,
    },

    /// The store daemon returned a non-2xx status.
    #[error("content store {endpoint} returned {status}: {body}")]
    Api {
        /// The endpoint that failed.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        body: String,
    },

    /// A stored payload failed integrity verification.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// The store is unreachable or misconfigured.
    #[error("content store unavailable: {0}")]
    Unavailable(String),
}

/// Content-addressed storage collaborator.
///
/// `put` is idempotent by construction: storing the same JSON document
/// twice yields the same content id and a single stored object.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a JSON document; returns its content id.
    async fn put(&self, value: &Value) -> Result<ContentDigest, StoreError>;

    /// Retrieve a document by content id. `Ok(None)` if absent.
    async fn get(&self, id: &ContentDigest) -> Result<Option<Value>, StoreError>;

    /// Connectivity probe. Used as a fatal startup check.
    async fn health(&self) -> Result<(), StoreError>;
}
