//! Minimal ABI encoding for the anchoring contract.
//!
//! The contract surface is four functions over one tuple shape, so this
//! module hand-rolls exactly the head/tail encoding those calls need
//! instead of pulling in a full ABI library:
//!
//! ```solidity
//! function anchorRecord(bytes32 fingerprint, bytes32 contentId, uint64 timestamp, string deviceId) external;
//! function records(uint256 index) external view returns (bytes32, bytes32, uint64, string);
//! function recordCount() external view returns (uint256);
//! function indexOf(bytes32 fingerprint) external view returns (bool, uint256);
//! ```
//!
//! Static arguments occupy one 32-byte word each; the single dynamic
//! `string` is referenced by byte offset from the start of the argument
//! block and laid out as a length word followed by right-padded bytes.

use crate::LedgerError;

const WORD: usize = 32;

/// Encode a byte slice as lowercase hex.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decode a hex string (with or without `0x` prefix) into bytes.
pub(crate) fn from_hex(hex: &str) -> Result<Vec<u8>, LedgerError> {
    let stripped = hex.trim().trim_start_matches("0x");
    if stripped.len() % 2 != 0 {
        return Err(LedgerError::InvalidResponse(format!(
            "odd-length hex string ({} chars)",
            stripped.len()
        )));
    }
    (0..stripped.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&stripped[i..i + 2], 16).map_err(|_| {
                LedgerError::InvalidResponse(format!("non-hex characters in {stripped:?}"))
            })
        })
        .collect()
}

fn u64_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Encode `anchorRecord(bytes32,bytes32,uint64,string)` calldata
/// (0x-prefixed, selector included).
pub(crate) fn encode_anchor_record(
    selector: &str,
    fingerprint: &[u8; 32],
    content_id: &[u8; 32],
    timestamp: u64,
    device_id: &str,
) -> String {
    let mut data = Vec::with_capacity(WORD * 6);
    data.extend_from_slice(fingerprint);
    data.extend_from_slice(content_id);
    data.extend_from_slice(&u64_word(timestamp));
    // Offset of the string data from the start of the argument block:
    // four head words.
    data.extend_from_slice(&u64_word((WORD * 4) as u64));

    let bytes = device_id.as_bytes();
    data.extend_from_slice(&u64_word(bytes.len() as u64));
    data.extend_from_slice(bytes);
    let padding = (WORD - bytes.len() % WORD) % WORD;
    data.extend(std::iter::repeat(0u8).take(padding));

    format!("0x{selector}{}", to_hex(&data))
}

/// Encode a single-`uint256` argument call (0x-prefixed, selector included).
pub(crate) fn encode_uint_call(selector: &str, value: u64) -> String {
    format!("0x{selector}{}", to_hex(&u64_word(value)))
}

/// Encode a single-`bytes32` argument call (0x-prefixed, selector included).
pub(crate) fn encode_bytes32_call(selector: &str, value: &[u8; 32]) -> String {
    format!("0x{selector}{}", to_hex(value))
}

/// Split return data into 32-byte words.
fn words(data: &[u8]) -> Result<Vec<[u8; WORD]>, LedgerError> {
    if data.len() % WORD != 0 {
        return Err(LedgerError::InvalidResponse(format!(
            "return data length {} is not a multiple of 32",
            data.len()
        )));
    }
    Ok(data
        .chunks(WORD)
        .map(|chunk| {
            let mut word = [0u8; WORD];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

fn word_to_u64(word: &[u8; WORD]) -> Result<u64, LedgerError> {
    if word[..WORD - 8].iter().any(|&b| b != 0) {
        return Err(LedgerError::InvalidResponse(
            "integer return value exceeds u64 range".to_string(),
        ));
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(tail))
}

/// Decode a single `uint256` return value.
pub(crate) fn decode_uint(hex: &str) -> Result<u64, LedgerError> {
    let data = from_hex(hex)?;
    let words = words(&data)?;
    match words.first() {
        Some(word) => word_to_u64(word),
        None => Err(LedgerError::InvalidResponse(
            "empty return data for uint".to_string(),
        )),
    }
}

/// Decode an `(bool, uint256)` return tuple.
pub(crate) fn decode_index_of(hex: &str) -> Result<Option<u64>, LedgerError> {
    let data = from_hex(hex)?;
    let words = words(&data)?;
    if words.len() < 2 {
        return Err(LedgerError::InvalidResponse(format!(
            "indexOf returned {} words, expected 2",
            words.len()
        )));
    }
    let found = word_to_u64(&words[0])? != 0;
    if !found {
        return Ok(None);
    }
    Ok(Some(word_to_u64(&words[1])?))
}

/// A decoded `records(uint256)` tuple.
pub(crate) struct RecordTuple {
    pub fingerprint: [u8; 32],
    pub content_id: [u8; 32],
    pub timestamp: u64,
    pub device_id: String,
}

/// Decode the `(bytes32, bytes32, uint64, string)` return tuple.
pub(crate) fn decode_record(hex: &str) -> Result<RecordTuple, LedgerError> {
    let data = from_hex(hex)?;
    let words = words(&data)?;
    if words.len() < 5 {
        return Err(LedgerError::InvalidResponse(format!(
            "records returned {} words, expected at least 5",
            words.len()
        )));
    }

    let fingerprint = words[0];
    let content_id = words[1];
    let timestamp = word_to_u64(&words[2])?;

    let offset = word_to_u64(&words[3])? as usize;
    if offset % WORD != 0 || offset + WORD > data.len() {
        return Err(LedgerError::InvalidResponse(format!(
            "string offset {offset} out of range"
        )));
    }
    let len = word_to_u64(&words[offset / WORD])? as usize;
    let start = offset + WORD;
    if start + len > data.len() {
        return Err(LedgerError::InvalidResponse(format!(
            "string length {len} overruns return data"
        )));
    }
    let device_id = String::from_utf8(data[start..start + len].to_vec())
        .map_err(|_| LedgerError::InvalidResponse("device id is not UTF-8".to_string()))?;

    Ok(RecordTuple {
        fingerprint,
        content_id,
        timestamp,
        device_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEL: &str = "aabbccdd";

    #[test]
    fn anchor_record_calldata_shape() {
        let fingerprint = [0x11u8; 32];
        let content_id = [0x22u8; 32];
        let calldata = encode_anchor_record(SEL, &fingerprint, &content_id, 1_754_000_000, "dev-1");

        // 0x + 8 (selector) + 4 head words + length word + 1 padded data
        // word = 0x + 8 + 6 * 64 hex chars.
        assert_eq!(calldata.len(), 2 + 8 + 6 * 64);
        assert!(calldata.starts_with("0xaabbccdd"));
        assert!(calldata.contains(&"11".repeat(32)));
        assert!(calldata.contains(&"22".repeat(32)));
    }

    #[test]
    fn anchor_record_string_padding_at_word_boundary() {
        let calldata = encode_anchor_record(SEL, &[0u8; 32], &[0u8; 32], 0, &"x".repeat(32));
        // 32-byte device id needs no padding: 4 head + 1 length + 1 data word.
        assert_eq!(calldata.len(), 2 + 8 + 6 * 64);
    }

    #[test]
    fn uint_call_encoding() {
        let calldata = encode_uint_call(SEL, 7);
        assert_eq!(
            calldata,
            format!("0x{SEL}{}{}", "0".repeat(63), "7")
        );
    }

    #[test]
    fn record_roundtrip_through_decoder() {
        // Build the return blob the way the contract would.
        let calldata = encode_anchor_record(SEL, &[0xabu8; 32], &[0xcdu8; 32], 1_700_000_000, "edge-device-001");
        let return_blob = &calldata[2 + 8..]; // strip 0x + selector

        let tuple = decode_record(return_blob).unwrap();
        assert_eq!(tuple.fingerprint, [0xabu8; 32]);
        assert_eq!(tuple.content_id, [0xcdu8; 32]);
        assert_eq!(tuple.timestamp, 1_700_000_000);
        assert_eq!(tuple.device_id, "edge-device-001");
    }

    #[test]
    fn decode_uint_simple() {
        let hex = format!("0x{}2a", "0".repeat(62));
        assert_eq!(decode_uint(&hex).unwrap(), 42);
    }

    #[test]
    fn decode_uint_rejects_overflow() {
        let hex = format!("0x01{}", "0".repeat(62));
        assert!(decode_uint(&hex).is_err());
    }

    #[test]
    fn decode_index_of_found() {
        let hex = format!(
            "0x{}1{}5",
            "0".repeat(63),
            "0".repeat(63)
        );
        assert_eq!(decode_index_of(&hex).unwrap(), Some(5));
    }

    #[test]
    fn decode_index_of_not_found() {
        let hex = format!("0x{}", "0".repeat(128));
        assert_eq!(decode_index_of(&hex).unwrap(), None);
    }

    #[test]
    fn decode_record_rejects_truncated_blob() {
        assert!(decode_record("0x0000").is_err());
        let only_heads = "0".repeat(64 * 4);
        assert!(decode_record(&only_heads).is_err());
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(from_hex("0x123").is_err());
        assert!(from_hex("zz").is_err());
    }
}
