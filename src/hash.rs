//! Digest algorithms and byte packing into field elements.

use crate::error::{CryptoError, ParseError, UnsupportedAlgorithm};
use crate::field::FieldElement;
use crate::poseidon::custom_hasher;
use crate::utils::{decode_base64, decode_hex};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Number of bytes packed into one field element.
pub const PACK_CHUNK_BYTES: usize = 31;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HashAlgorithm {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Ripemd160,
}

/// Hash functions tried, in order, when locating a digest inside a signed structure.
pub const DOCUMENT_HASHES: [HashAlgorithm; 5] = [
    HashAlgorithm::Sha1,
    HashAlgorithm::Sha224,
    HashAlgorithm::Sha256,
    HashAlgorithm::Sha384,
    HashAlgorithm::Sha512,
];

impl HashAlgorithm {
    /// Parses names such as `SHA-256`, `sha_256` or `sha256`.
    pub fn from_name(name: &str) -> Result<Self, UnsupportedAlgorithm> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        HashAlgorithm::from_str(&normalized)
            .map_err(|_| UnsupportedAlgorithm::Hash(name.to_string()))
    }

    /// Maps a digest algorithm OID (as a dotted string) to a hash function.
    pub fn from_oid(oid: &str) -> Option<Self> {
        match oid {
            "1.3.14.3.2.26" => Some(HashAlgorithm::Sha1),
            "2.16.840.1.101.3.4.2.4" => Some(HashAlgorithm::Sha224),
            "2.16.840.1.101.3.4.2.1" => Some(HashAlgorithm::Sha256),
            "2.16.840.1.101.3.4.2.2" => Some(HashAlgorithm::Sha384),
            "2.16.840.1.101.3.4.2.3" => Some(HashAlgorithm::Sha512),
            "1.3.36.3.2.1" => Some(HashAlgorithm::Ripemd160),
            _ => None,
        }
    }

    pub fn oid(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "1.3.14.3.2.26",
            HashAlgorithm::Sha224 => "2.16.840.1.101.3.4.2.4",
            HashAlgorithm::Sha256 => "2.16.840.1.101.3.4.2.1",
            HashAlgorithm::Sha384 => "2.16.840.1.101.3.4.2.2",
            HashAlgorithm::Sha512 => "2.16.840.1.101.3.4.2.3",
            HashAlgorithm::Ripemd160 => "1.3.36.3.2.1",
        }
    }

    /// SHA-384 and SHA-512 use 128-byte blocks and a 128-bit length field.
    pub fn block_size(&self) -> usize {
        match self {
            HashAlgorithm::Sha384 | HashAlgorithm::Sha512 => 128,
            _ => 64,
        }
    }
}

/// Digest size in bytes.
pub fn get_hash_len(algorithm: HashAlgorithm) -> usize {
    match algorithm {
        HashAlgorithm::Sha1 | HashAlgorithm::Ripemd160 => 20,
        HashAlgorithm::Sha224 => 28,
        HashAlgorithm::Sha256 => 32,
        HashAlgorithm::Sha384 => 48,
        HashAlgorithm::Sha512 => 64,
    }
}

pub fn digest(algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    match algorithm {
        HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
        HashAlgorithm::Sha224 => Sha224::digest(data).to_vec(),
        HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
        HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        HashAlgorithm::Ripemd160 => Ripemd160::digest(data).to_vec(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashOutputFormat {
    #[default]
    Bytes,
    Hex,
    Base64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashOutput {
    Bytes(Vec<u8>),
    Hex(String),
    Base64(String),
}

impl HashOutput {
    /// Raw digest bytes regardless of the requested encoding.
    ///
    /// # Errors
    ///
    /// A hand-built `Hex` or `Base64` value that does not decode.
    pub fn into_bytes(self) -> Result<Vec<u8>, ParseError> {
        match self {
            HashOutput::Bytes(bytes) => Ok(bytes),
            HashOutput::Hex(s) => decode_hex("digest", &s),
            HashOutput::Base64(s) => decode_base64("digest", &s),
        }
    }
}

/// Hashes `data` and encodes the digest in the requested format.
///
/// # Examples
///
/// ```
/// use passport_witness::hash::{hash, HashAlgorithm, HashOutput, HashOutputFormat};
///
/// let out = hash(HashAlgorithm::Sha256, b"abc", HashOutputFormat::Hex);
/// assert_eq!(
///     out,
///     HashOutput::Hex("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad".into())
/// );
/// ```
pub fn hash(algorithm: HashAlgorithm, data: &[u8], format: HashOutputFormat) -> HashOutput {
    let bytes = digest(algorithm, data);
    match format {
        HashOutputFormat::Bytes => HashOutput::Bytes(bytes),
        HashOutputFormat::Hex => HashOutput::Hex(hex::encode(bytes)),
        HashOutputFormat::Base64 => HashOutput::Base64(BASE64.encode(bytes)),
    }
}

/// Same as [`hash`] but takes the algorithm by name.
pub fn hash_by_name(
    algorithm: &str,
    data: &[u8],
    format: HashOutputFormat,
) -> Result<HashOutput, UnsupportedAlgorithm> {
    Ok(hash(HashAlgorithm::from_name(algorithm)?, data, format))
}

/// Packs bytes into field elements, 31 bytes each, first byte least significant.
pub fn pack_bytes_array(bytes: &[u8]) -> Vec<FieldElement> {
    bytes
        .chunks(PACK_CHUNK_BYTES)
        .map(FieldElement::from_le_bytes_mod_order)
        .collect()
}

pub fn pack_bytes_and_poseidon(bytes: &[u8]) -> Result<FieldElement, CryptoError> {
    custom_hasher(&pack_bytes_array(bytes))
}

/// Position of `needle` inside `haystack`, if present.
pub fn find_subarray(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_hash_lengths_match_digests() {
        for algorithm in HashAlgorithm::iter() {
            assert_eq!(digest(algorithm, b"data").len(), get_hash_len(algorithm));
        }
    }

    #[test]
    fn test_hash_is_deterministic_and_encoded() {
        let a = hash(HashAlgorithm::Sha1, b"abc", HashOutputFormat::Hex);
        let b = hash(HashAlgorithm::Sha1, b"abc", HashOutputFormat::Hex);
        assert_eq!(a, b);
        assert_eq!(
            a,
            HashOutput::Hex("a9993e364706816aba3e25717850c26c9cd0d89d".into())
        );
        let encoded = hash(HashAlgorithm::Sha1, b"abc", HashOutputFormat::Base64);
        assert_eq!(encoded.into_bytes().unwrap(), a.into_bytes().unwrap());
    }

    #[test]
    fn test_undecodable_output_is_an_error() {
        assert!(matches!(
            HashOutput::Hex("zz".into()).into_bytes(),
            Err(ParseError::Hex { .. })
        ));
        assert!(matches!(
            HashOutput::Base64("***".into()).into_bytes(),
            Err(ParseError::Base64 { .. })
        ));
        assert_eq!(
            HashOutput::Bytes(vec![1, 2]).into_bytes().unwrap(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_from_name_normalizes() {
        assert_eq!(
            HashAlgorithm::from_name("SHA-256").unwrap(),
            HashAlgorithm::Sha256
        );
        assert_eq!(
            HashAlgorithm::from_name("sha_384").unwrap(),
            HashAlgorithm::Sha384
        );
        assert!(matches!(
            HashAlgorithm::from_name("md5"),
            Err(UnsupportedAlgorithm::Hash(_))
        ));
        assert!(hash_by_name("whirlpool", b"", HashOutputFormat::Bytes).is_err());
        assert_eq!(HashAlgorithm::Sha512.to_string(), "sha512");
    }

    #[test]
    fn test_oid_roundtrip() {
        for algorithm in HashAlgorithm::iter() {
            assert_eq!(HashAlgorithm::from_oid(algorithm.oid()), Some(algorithm));
        }
    }

    #[test]
    fn test_pack_bytes_little_endian() {
        let packed = pack_bytes_array(b"hello world");
        assert_eq!(packed.len(), 1);
        assert_eq!(
            packed[0],
            "121404708502361365413651816".parse::<FieldElement>().unwrap()
        );
        assert_eq!(pack_bytes_array(&[0u8; 62]).len(), 2);
        assert_eq!(pack_bytes_array(&[1u8; 63]).len(), 3);
    }

    #[test]
    fn test_pack_bytes_and_poseidon() {
        let expected: FieldElement =
            "2658054351604171941148206646159970742120423233873213573763663754096856491118"
                .parse()
                .unwrap();
        assert_eq!(pack_bytes_and_poseidon(b"hello world").unwrap(), expected);
    }

    #[test]
    fn test_find_subarray() {
        assert_eq!(find_subarray(b"abcdef", b"cde"), Some(2));
        assert_eq!(find_subarray(b"abc", b"x"), None);
        assert_eq!(find_subarray(b"ab", b"abc"), None);
    }
}
