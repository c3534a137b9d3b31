//! # Content Digest — Content-Addressed Identifiers
//!
//! Defines `ContentDigest` and `DigestAlgorithm` for the content-addressed
//! identifiers that tie the store and the ledger together: the content id
//! a stored payload is retrieved by, and the fingerprint a record is
//! deduplicated by, are both SHA-256 digests of canonical bytes.
//!
//! ## Security Invariant
//!
//! `ContentDigest` can only be computed from `CanonicalBytes`, ensuring
//! that all digests in the system are produced through the correct
//! canonicalization pipeline. This is enforced by the function signature
//! of `sha256_digest()`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::RecordError;

/// The hash algorithm used to produce a content digest.
///
/// SHA-256 is the only algorithm in use; the tag exists so that stored
/// identifiers remain self-describing if the store ever migrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    /// SHA-256 — standard content addressing.
    Sha256,
}

impl DigestAlgorithm {
    /// Returns the algorithm identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A content-addressed digest with its algorithm tag.
///
/// Produced exclusively from `CanonicalBytes` via [`sha256_digest()`] or
/// parsed back from a 64-char hex string via [`ContentDigest::from_hex()`]
/// (content ids round-trip through the ledger as hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest {
    /// The hash algorithm that produced this digest.
    pub algorithm: DigestAlgorithm,
    /// The raw 32-byte digest value.
    pub bytes: [u8; 32],
}

impl ContentDigest {
    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Access the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Parse a 64-character hex string into a SHA-256 content digest.
    ///
    /// Accepts upper- or lower-case hex; the parsed digest always renders
    /// lowercase.
    pub fn from_hex(hex: &str) -> Result<Self, RecordError> {
        let trimmed = hex.trim();
        if trimmed.len() != 64 {
            return Err(RecordError::InvalidDigest {
                value: hex.to_string(),
                reason: format!("expected 64 hex chars, got {}", trimmed.len()),
            });
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in trimmed.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| RecordError::InvalidDigest {
                value: hex.to_string(),
                reason: "not valid UTF-8".to_string(),
            })?;
            bytes[i] = u8::from_str_radix(pair, 16).map_err(|_| RecordError::InvalidDigest {
                value: hex.to_string(),
                reason: format!("non-hex characters at position {}", i * 2),
            })?;
        }
        Ok(Self {
            algorithm: DigestAlgorithm::Sha256,
            bytes,
        })
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

/// Compute a SHA-256 content digest from canonical bytes.
///
/// # Security Invariant
///
/// Accepts only `&CanonicalBytes`, not raw `&[u8]`. This compile-time
/// constraint prevents any code path from computing a digest over
/// non-canonical bytes.
pub fn sha256_digest(data: &CanonicalBytes) -> ContentDigest {
    let hash = Sha256::digest(data.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    ContentDigest {
        algorithm: DigestAlgorithm::Sha256,
        bytes,
    }
}

/// Compute a SHA-256 hex string from canonical bytes.
///
/// Convenience wrapper around [`sha256_digest()`] for contexts that need
/// the digest as a hex string (store paths, RPC payloads).
pub fn sha256_hex(data: &CanonicalBytes) -> String {
    sha256_digest(data).to_hex()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_deterministic() {
        let cb = CanonicalBytes::new(&serde_json::json!({"a": 1, "b": 2})).unwrap();
        let d1 = sha256_digest(&cb);
        let d2 = sha256_digest(&cb);
        assert_eq!(d1, d2);
        assert_eq!(d1.algorithm, DigestAlgorithm::Sha256);
    }

    #[test]
    fn hex_format() {
        let cb = CanonicalBytes::new(&serde_json::json!({"key": "value"})).unwrap();
        let hex = sha256_hex(&cb);
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn display_self_describing() {
        let cb = CanonicalBytes::new(&serde_json::json!({"a": 1})).unwrap();
        let digest = sha256_digest(&cb);
        let s = format!("{digest}");
        assert!(s.starts_with("sha256:"));
        assert_eq!(s.len(), 7 + 64);
    }

    #[test]
    fn different_inputs_different_digests() {
        let cb1 = CanonicalBytes::new(&serde_json::json!({"a": 1})).unwrap();
        let cb2 = CanonicalBytes::new(&serde_json::json!({"a": 2})).unwrap();
        assert_ne!(sha256_digest(&cb1), sha256_digest(&cb2));
    }

    #[test]
    fn known_sha256_vector() {
        // SHA256 of the empty JSON object "{}" is a known value.
        let cb = CanonicalBytes::new(&serde_json::json!({})).unwrap();
        assert_eq!(cb.as_bytes(), b"{}");
        let digest = sha256_digest(&cb);
        assert_eq!(
            digest.to_hex(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn from_hex_roundtrip() {
        let cb = CanonicalBytes::new(&serde_json::json!({"x": true})).unwrap();
        let digest = sha256_digest(&cb);
        let parsed = ContentDigest::from_hex(&digest.to_hex()).unwrap();
        assert_eq!(parsed, digest);
    }

    #[test]
    fn from_hex_accepts_uppercase() {
        let cb = CanonicalBytes::new(&serde_json::json!({"x": 1})).unwrap();
        let digest = sha256_digest(&cb);
        let parsed = ContentDigest::from_hex(&digest.to_hex().to_uppercase()).unwrap();
        assert_eq!(parsed.to_hex(), digest.to_hex());
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert!(ContentDigest::from_hex("abc123").is_err());
        assert!(ContentDigest::from_hex("").is_err());
    }

    #[test]
    fn from_hex_rejects_non_hex() {
        let bad = "g".repeat(64);
        assert!(ContentDigest::from_hex(&bad).is_err());
    }
}
