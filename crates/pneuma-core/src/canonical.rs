//! # Canonical Serialization — JCS-Compatible Byte Production
//!
//! This module defines `CanonicalBytes`, the sole construction path for
//! bytes used in digest computation across the node.
//!
//! ## Security Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. The only way to
//! construct it is through `CanonicalBytes::new()` (or `from_value()`),
//! which serializes via RFC 8785 (JSON Canonicalization Scheme): sorted
//! keys, compact separators, ECMAScript number formatting, deterministic
//! byte sequence.
//!
//! This makes the "wrong serialization path" defect class structurally
//! impossible: any function computing a content id or fingerprint must
//! accept `&CanonicalBytes`, and the only way to produce one is through
//! the correct pipeline.
//!
//! Analysis records carry floating-point metrics (breathing rates,
//! amplitudes), so floats are permitted; JCS gives them a deterministic
//! rendering. Non-finite values (NaN, ±Inf) cannot appear in
//! `serde_json::Value` and are rejected at the serialization boundary.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalError;

/// Bytes produced exclusively by JCS canonicalization (RFC 8785).
///
/// # Invariants
///
/// - The only constructors are `new()` and `from_value()`.
/// - Object keys are sorted; separators are compact; output is UTF-8.
/// - Equal JSON documents always produce equal bytes.
///
/// These invariants are enforced by the constructors and cannot be violated
/// by downstream code because the inner `Vec<u8>` is private.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// This is the ONLY way to construct `CanonicalBytes`. All digest
    /// computation in the workspace must flow through this constructor.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalError::Serialization` if the value cannot be
    /// represented as JSON (e.g. non-finite floats) or JCS serialization
    /// fails.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalError> {
        let value = serde_json::to_value(obj)?;
        Self::from_value(value)
    }

    /// Construct canonical bytes from an already-parsed JSON value.
    ///
    /// Used on the read path, where stored bytes are parsed back to a
    /// `Value` and re-canonicalized for integrity verification.
    pub fn from_value(value: Value) -> Result<Self, CanonicalError> {
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_object_sorted_compact() {
        let data = serde_json::json!({"b": 2, "a": 1, "c": "hello"});
        let cb = CanonicalBytes::new(&data).expect("should canonicalize");
        let s = std::str::from_utf8(cb.as_bytes()).unwrap();
        assert_eq!(s, r#"{"a":1,"b":2,"c":"hello"}"#);
    }

    #[test]
    fn nested_objects_sorted() {
        let data = serde_json::json!({
            "outer": {"b": 2, "a": 1},
            "list": [3, 2, 1]
        });
        let cb = CanonicalBytes::new(&data).expect("should canonicalize");
        let s = std::str::from_utf8(cb.as_bytes()).unwrap();
        assert_eq!(s, r#"{"list":[3,2,1],"outer":{"a":1,"b":2}}"#);
    }

    #[test]
    fn floats_accepted_deterministically() {
        // Breathing metrics are floats; JCS renders them per ECMAScript.
        let data = serde_json::json!({"rate": 16.5});
        let a = CanonicalBytes::new(&data).unwrap();
        let b = CanonicalBytes::new(&data).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        let s = std::str::from_utf8(a.as_bytes()).unwrap();
        assert_eq!(s, r#"{"rate":16.5}"#);
    }

    #[test]
    fn integer_valued_float_renders_as_integer() {
        // JCS: 10.0 renders as "10".
        let data = serde_json::json!({"count": 10.0});
        let cb = CanonicalBytes::new(&data).unwrap();
        let s = std::str::from_utf8(cb.as_bytes()).unwrap();
        assert_eq!(s, r#"{"count":10}"#);
    }

    #[test]
    fn empty_object() {
        let cb = CanonicalBytes::new(&serde_json::json!({})).unwrap();
        assert_eq!(cb.as_bytes(), b"{}");
    }

    #[test]
    fn unicode_passes_through_utf8() {
        let data = serde_json::json!({"name": "\u{00e9}\u{00e8}\u{00ea}"});
        let cb = CanonicalBytes::new(&data).unwrap();
        let s = std::str::from_utf8(cb.as_bytes()).unwrap();
        assert!(s.contains('\u{00e9}'));
    }

    #[test]
    fn from_value_matches_new() {
        let data = serde_json::json!({"z": 1, "a": [true, null]});
        let via_new = CanonicalBytes::new(&data).unwrap();
        let via_value = CanonicalBytes::from_value(data).unwrap();
        assert_eq!(via_new, via_value);
    }

    #[test]
    fn len_and_is_empty() {
        let cb = CanonicalBytes::new(&serde_json::json!({"a": 1})).unwrap();
        assert!(!cb.is_empty());
        assert!(cb.len() > 0);
    }
}
