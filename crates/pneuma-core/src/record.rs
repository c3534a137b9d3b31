//! # Analysis Record — Validated Envelope for Upstream Data
//!
//! Edge devices produce breathing-analysis documents with an arbitrary
//! shape; the node only cares about two things: `metadata.device_id` must
//! identify the device, and the node stamps `blockchain_timestamp` exactly
//! once before storage.
//!
//! The fingerprint is the record's identity for idempotency purposes. It
//! is computed over the canonical bytes of the record *without* the
//! `blockchain_timestamp` field, because that field is injected by the
//! node itself — including it would turn every retry of the same upstream
//! document into a distinct identity.

use serde_json::{Map, Value};

use crate::canonical::CanonicalBytes;
use crate::digest::{sha256_digest, ContentDigest};
use crate::error::{CanonicalError, RecordError};

/// Top-level field stamped by the node before storage.
pub const TIMESTAMP_FIELD: &str = "blockchain_timestamp";

/// A validated breathing-analysis record.
///
/// Wraps the upstream JSON object. Construction validates the shape;
/// `device_id()` is guaranteed to succeed on a constructed record.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRecord {
    fields: Map<String, Value>,
}

impl AnalysisRecord {
    /// Validate an upstream JSON value as an analysis record.
    ///
    /// # Errors
    ///
    /// - `RecordError::NotAnObject` if the value is not a JSON object.
    /// - `RecordError::MissingDeviceId` / `InvalidDeviceId` if
    ///   `metadata.device_id` is absent or not a non-empty string.
    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        let fields = match value {
            Value::Object(map) => map,
            other => {
                return Err(RecordError::NotAnObject {
                    kind: json_kind(&other),
                })
            }
        };
        let record = Self { fields };
        record.device_id()?;
        Ok(record)
    }

    /// The device identifier from `metadata.device_id`.
    pub fn device_id(&self) -> Result<&str, RecordError> {
        let device_id = self
            .fields
            .get("metadata")
            .and_then(|m| m.get("device_id"))
            .ok_or(RecordError::MissingDeviceId)?;
        match device_id {
            Value::String(s) if !s.is_empty() => Ok(s),
            _ => Err(RecordError::InvalidDeviceId),
        }
    }

    /// The stable content fingerprint of this record.
    ///
    /// SHA-256 over the canonical bytes of the record with any top-level
    /// `blockchain_timestamp` removed. Stable across re-invocations on the
    /// same upstream document, stamped or not.
    pub fn fingerprint(&self) -> Result<ContentDigest, CanonicalError> {
        let mut stripped = self.fields.clone();
        stripped.remove(TIMESTAMP_FIELD);
        let canonical = CanonicalBytes::from_value(Value::Object(stripped))?;
        Ok(sha256_digest(&canonical))
    }

    /// Stamp the node timestamp (seconds since epoch).
    ///
    /// The record is stamped exactly once per anchoring; re-anchoring the
    /// same document short-circuits on the fingerprint before reaching
    /// this point.
    pub fn stamp(&mut self, timestamp: u64) {
        self.fields
            .insert(TIMESTAMP_FIELD.to_string(), Value::from(timestamp));
    }

    /// The stamped timestamp, if present.
    pub fn timestamp(&self) -> Option<u64> {
        self.fields.get(TIMESTAMP_FIELD).and_then(Value::as_u64)
    }

    /// View the record as a JSON value (for storage).
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
