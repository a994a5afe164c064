//! User-context encoding and the identifiers bound into disclosure proofs.
//!
//! The packed layout matches Solidity's
//! `abi.encodePacked(bytes32 chainId, bytes32 userId, bytes userDefinedData)`.

use crate::error::{ParseError, Result};
use crate::field::FieldElement;
use crate::hash::{digest, HashAlgorithm};
use crate::poseidon::{flexible_poseidon, poseidon2, MAX_POSEIDON_INPUTS};
use crate::utils::validate_hex_string;
use alloy_primitives::{Bytes, B256, U256};
use alloy_sol_types::SolValue;
use num_bigint::BigUint;
use std::str::FromStr;

/// A UUID without dashes.
pub const UUID_HEX_LENGTH: usize = 32;
/// An Ethereum address.
pub const ADDRESS_HEX_LENGTH: usize = 40;

const MAX_STRING_CHUNK: usize = 31;

/// Validates a UUID or hex address and left-pads it to 32 bytes.
///
/// ```
/// use passport_witness::user_id::normalize_user_id;
///
/// let id = normalize_user_id("0x742d35Cc6634C0532925a3b844Bc454e4438f44e").unwrap();
/// assert_eq!(&id[..12], &[0u8; 12]);
/// ```
pub fn normalize_user_id(user_id: &str) -> std::result::Result<[u8; 32], ParseError> {
    let stripped: String = user_id.trim().replace('-', "");
    let stripped = stripped
        .strip_prefix("0x")
        .or_else(|| stripped.strip_prefix("0X"))
        .unwrap_or(&stripped);
    if stripped.is_empty() || stripped.len() > 64 || !validate_hex_string(stripped) {
        return Err(ParseError::Hex {
            field: "user_id".to_string(),
            reason: format!("'{user_id}' is not a UUID or hex identifier"),
        });
    }
    let padded = format!("{stripped:0>64}");
    let bytes = hex::decode(&padded).map_err(|e| ParseError::Hex {
        field: "user_id".to_string(),
        reason: e.to_string(),
    })?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

pub fn get_solidity_packed_user_context_data(
    chain_id: u64,
    user_id: &str,
    user_defined_data: &str,
) -> std::result::Result<Vec<u8>, ParseError> {
    let chain = B256::from(U256::from(chain_id));
    let user = B256::from(normalize_user_id(user_id)?);
    let data = Bytes::copy_from_slice(user_defined_data.as_bytes());
    Ok((chain, user, data).abi_encode_packed())
}

/// `ripemd160(sha256(packed context))` read as a big-endian integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentifierHash {
    pub value: FieldElement,
    /// 20-byte digest, `0x`-prefixed.
    pub hex: String,
}

pub fn calculate_user_identifier_hash(
    chain_id: u64,
    user_id: &str,
    user_defined_data: &str,
) -> std::result::Result<UserIdentifierHash, ParseError> {
    let packed = get_solidity_packed_user_context_data(chain_id, user_id, user_defined_data)?;
    let ripemd = digest(HashAlgorithm::Ripemd160, &digest(HashAlgorithm::Sha256, &packed));
    Ok(UserIdentifierHash {
        value: FieldElement::from_be_bytes_mod_order(&ripemd),
        hex: format!("0x{}", hex::encode(&ripemd)),
    })
}

/// Encodes up to 31 characters as `1` followed by each char code in three digits.
pub fn string_to_field(s: &str) -> std::result::Result<FieldElement, ParseError> {
    if s.chars().count() > MAX_STRING_CHUNK {
        return Err(ParseError::FieldElement(format!(
            "'{s}' is longer than {MAX_STRING_CHUNK} characters"
        )));
    }
    let mut digits = String::from("1");
    for c in s.chars() {
        digits.push_str(&format!("{:03}", c as u32));
    }
    let value = BigUint::from_str(&digits).map_err(|e| ParseError::FieldElement(e.to_string()))?;
    Ok(FieldElement::from_biguint(&value))
}

/// Host part of an endpoint URL.
pub fn format_endpoint(endpoint: &str) -> &str {
    let rest = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint);
    rest.split('/').next().unwrap_or(rest)
}

/// Binds a verifier endpoint and scope into the disclosure `scope` input.
pub fn hash_endpoint_with_scope(endpoint: &str, scope: &str) -> Result<FieldElement> {
    let chars: Vec<char> = format_endpoint(endpoint).chars().collect();
    let chunks = chars
        .chunks(MAX_STRING_CHUNK)
        .map(|chunk| string_to_field(&chunk.iter().collect::<String>()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if chunks.is_empty() || chunks.len() > MAX_POSEIDON_INPUTS {
        return Err(ParseError::FieldElement(format!(
            "endpoint must be 1 to {} characters",
            MAX_STRING_CHUNK * MAX_POSEIDON_INPUTS
        ))
        .into());
    }
    let endpoint_hash = flexible_poseidon(&chunks)?;
    Ok(poseidon2(endpoint_hash, string_to_field(scope)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_context_layout() {
        let packed = get_solidity_packed_user_context_data(
            42220,
            "a1b2c3d4-e5f6-7890-abcd-ef1234567890",
            "hi",
        )
        .unwrap();
        assert_eq!(packed.len(), 32 + 32 + 2);
        assert_eq!(&packed[30..32], &42220u16.to_be_bytes());
        assert_eq!(&packed[32..48], &[0u8; 16]);
        assert_eq!(hex::encode(&packed[48..64]), "a1b2c3d4e5f67890abcdef1234567890");
        assert_eq!(&packed[64..], b"hi");
    }

    #[test]
    fn test_user_identifier_hash_fits_160_bits() {
        let id = calculate_user_identifier_hash(1, "0x742d35Cc6634C0532925a3b844Bc454e4438f44e", "")
            .unwrap();
        assert_eq!(id.hex.len(), 42);
        assert!(id.value.to_biguint().bits() <= 160);
        assert_eq!(
            id.value.to_biguint(),
            BigUint::parse_bytes(&id.hex.as_bytes()[2..], 16).unwrap()
        );
    }

    #[test]
    fn test_rejects_bad_user_ids() {
        assert!(normalize_user_id("not-hex").is_err());
        assert!(normalize_user_id("").is_err());
        assert!(normalize_user_id(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_string_to_field_encoding() {
        assert_eq!(string_to_field("A").unwrap(), FieldElement::from(1065u64));
        assert_eq!(string_to_field("").unwrap(), FieldElement::from(1u64));
        assert!(string_to_field(&"x".repeat(32)).is_err());
    }

    #[test]
    fn test_endpoint_scope_hash_ignores_scheme_and_path() {
        let a = hash_endpoint_with_scope("https://example.org/verify", "app").unwrap();
        let b = hash_endpoint_with_scope("example.org", "app").unwrap();
        let c = hash_endpoint_with_scope("example.org", "other").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(hash_endpoint_with_scope("", "app").is_err());
    }
}
