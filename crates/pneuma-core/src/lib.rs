//! # pneuma-core — Foundational Types for the Anchoring Node
//!
//! This crate is the bedrock of the pneuma workspace. It defines the types
//! shared by the content-store and ledger collaborators and by the node
//! itself. Every other crate in the workspace depends on `pneuma-core`; it
//! depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** ALL digest computation flows through
//!    `CanonicalBytes::new()`. No raw `serde_json::to_vec()` for digests.
//!    This prevents the canonicalization-split defect class by construction.
//!
//! 2. **`sha256_digest()` accepts only `&CanonicalBytes`.** Compile-time
//!    enforcement that every content id and fingerprint in the system is
//!    produced through the same canonical pipeline.
//!
//! 3. **Validated envelope for upstream data.** `AnalysisRecord` wraps the
//!    arbitrary JSON the edge devices produce and is the only place that
//!    knows where `device_id` lives and how the node's timestamp is stamped.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `pneuma-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - All public types derive `Debug`, `Clone`, and implement
//!   `Serialize`/`Deserialize` where they cross a wire or a file.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod receipt;
pub mod record;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, sha256_hex, ContentDigest, DigestAlgorithm};
pub use error::{CanonicalError, RecordError};
pub use receipt::AnchorReceipt;
pub use record::AnalysisRecord;
