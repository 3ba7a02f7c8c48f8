//! Conversions between stack items and numbers/booleans.
//!
//! Integers are little-endian with trailing zero bytes trimmed; the
//! empty string is zero. Negative numbers always occupy eight bytes
//! (their high bytes are nonzero). Decoding accepts at most eight
//! bytes. Booleans: false is empty or all-zero, true is anything else;
//! canonical encodings are `[]` and `[1]`.

use crate::error::VmError;

/// Encode an int64 as a minimal little-endian stack item.
pub fn int64_bytes(n: i64) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }
    let mut bytes = n.to_le_bytes().to_vec();
    while let Some(&0) = bytes.last() {
        bytes.pop();
    }
    bytes
}

/// Decode a little-endian stack item into an int64.
pub fn as_int64(bytes: &[u8]) -> Result<i64, VmError> {
    if bytes.is_empty() {
        return Ok(0);
    }
    if bytes.len() > 8 {
        return Err(VmError::BadValue);
    }
    let mut padded = [0u8; 8];
    padded[..bytes.len()].copy_from_slice(bytes);
    Ok(i64::from_le_bytes(padded))
}

/// Truthiness of a stack item.
pub fn as_bool(bytes: &[u8]) -> bool {
    bytes.iter().any(|&b| b != 0)
}

/// Canonical boolean encoding.
pub fn bool_bytes(b: bool) -> Vec<u8> {
    if b {
        vec![1]
    } else {
        Vec::new()
    }
}
