//! Hex and base64 helpers shared by the document, certificate and attestation layers.

use crate::error::ParseError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

/// Text encoding used for byte fields in document JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteEncoding {
    #[default]
    Hex,
    Base64,
}

fn is_valid_hex_string(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

fn strip_hex_prefix(input: &str) -> &str {
    let trimmed = input.trim();
    trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
}

/// Validates and strips the hex prefix from a string.
///
/// # Arguments
///
/// * `input` - The hex string to validate (may include "0x" or "0X" prefix)
/// * `expected_len` - Expected length of the hex string after stripping prefix
///
/// # Errors
/// Returns an error if:
/// - The hex string has incorrect length
/// - The hex string contains non-hex characters
///
/// # Examples
///
/// ```
/// use passport_witness::utils::validate_and_strip_hex;
///
/// let result = validate_and_strip_hex("0x1234abcd", 8).unwrap();
/// assert_eq!(result, "1234abcd");
/// ```
pub fn validate_and_strip_hex(input: &str, expected_len: usize) -> Result<String, ParseError> {
    let stripped = strip_hex_prefix(input);

    if stripped.len() != expected_len {
        return Err(ParseError::Hex {
            field: input.to_string(),
            reason: format!(
                "must be {} characters (got {})",
                expected_len,
                stripped.len()
            ),
        });
    }

    if !is_valid_hex_string(stripped) {
        return Err(ParseError::Hex {
            field: input.to_string(),
            reason: "contains non-hex characters".into(),
        });
    }

    Ok(stripped.to_string())
}

/// Returns true for a non-empty string of hex digits, with or without a prefix.
#[must_use]
pub fn validate_hex_string(input: &str) -> bool {
    let stripped = strip_hex_prefix(input);

    if stripped.is_empty() {
        return false;
    }

    is_valid_hex_string(stripped)
}

/// Decodes a hex string, accepting an optional `0x` prefix.
pub fn decode_hex(field: &str, input: &str) -> Result<Vec<u8>, ParseError> {
    hex::decode(strip_hex_prefix(input)).map_err(|e| ParseError::Hex {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

pub fn decode_base64(field: &str, input: &str) -> Result<Vec<u8>, ParseError> {
    BASE64
        .decode(input.trim())
        .map_err(|e| ParseError::Base64 {
            field: field.to_string(),
            reason: e.to_string(),
        })
}

pub fn decode_bytes(field: &str, input: &str, encoding: ByteEncoding) -> Result<Vec<u8>, ParseError> {
    match encoding {
        ByteEncoding::Hex => decode_hex(field, input),
        ByteEncoding::Base64 => decode_base64(field, input),
    }
}

pub fn encode_bytes(bytes: &[u8], encoding: ByteEncoding) -> String {
    match encoding {
        ByteEncoding::Hex => hex::encode(bytes),
        ByteEncoding::Base64 => BASE64.encode(bytes),
    }
}

/// Seconds since the Unix epoch, or zero if the clock is before it.
pub fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Serializes `Vec<u8>` as a lowercase hex string.
pub mod serde_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::decode_hex("bytes", &s).map_err(serde::de::Error::custom)
    }
}
