//! # Error Types — Structured Error Hierarchy
//!
//! Errors for canonicalization and record validation. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//! Collaborator crates (`pneuma-store`, `pneuma-ledger`) define their own
//! error enums and wrap these where canonicalization is involved.

use thiserror::Error;

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalError {
    /// JSON serialization failed. Non-finite floats (NaN, ±Inf) land here
    /// because `serde_json` cannot represent them.
    #[error("canonical serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error validating or manipulating an analysis record.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The record is not a JSON object.
    #[error("analysis record must be a JSON object, got {kind}")]
    NotAnObject {
        /// JSON type name of the rejected value.
        kind: &'static str,
    },

    /// `metadata.device_id` is missing.
    #[error("analysis record is missing metadata.device_id")]
    MissingDeviceId,

    /// `metadata.device_id` is present but not a usable string.
    #[error("metadata.device_id must be a non-empty string")]
    InvalidDeviceId,

    /// A digest string could not be parsed back into a `ContentDigest`.
    #[error("invalid content digest {value:?}: {reason}")]
    InvalidDigest {
        /// The offending string.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}
