//! SHA message padding for in-circuit hashing.

use crate::error::{ParseError, UnsupportedAlgorithm, WitnessError};
use crate::hash::HashAlgorithm;

/// Maximum padded eContent length each register circuit accepts.
pub fn max_padded_econtent_len(hash: HashAlgorithm) -> Result<usize, UnsupportedAlgorithm> {
    match hash {
        HashAlgorithm::Sha1 => Ok(384),
        HashAlgorithm::Sha224 | HashAlgorithm::Sha256 => Ok(512),
        HashAlgorithm::Sha384 => Ok(768),
        HashAlgorithm::Sha512 => Ok(896),
        HashAlgorithm::Ripemd160 => Err(UnsupportedAlgorithm::Hash(hash.to_string())),
    }
}

/// Maximum padded signed-attributes length each register circuit accepts.
pub fn max_padded_signed_attr_len(hash: HashAlgorithm) -> Result<usize, UnsupportedAlgorithm> {
    match hash {
        HashAlgorithm::Sha1 | HashAlgorithm::Sha224 | HashAlgorithm::Sha256 => Ok(128),
        HashAlgorithm::Sha384 | HashAlgorithm::Sha512 => Ok(256),
        HashAlgorithm::Ripemd160 => Err(UnsupportedAlgorithm::Hash(hash.to_string())),
    }
}

/// Pads `message` for `hash` and zero-fills to `max_len`.
///
/// Returns the filled buffer and the length of the real padded message.
pub fn sha_pad(
    hash: HashAlgorithm,
    message: &[u8],
    max_len: usize,
) -> Result<(Vec<u8>, usize), WitnessError> {
    let (block, length_bytes) = match hash {
        HashAlgorithm::Sha1 | HashAlgorithm::Sha224 | HashAlgorithm::Sha256 => (64, 8),
        HashAlgorithm::Sha384 | HashAlgorithm::Sha512 => (128, 16),
        HashAlgorithm::Ripemd160 => return Err(UnsupportedAlgorithm::Hash(hash.to_string()).into()),
    };

    let bit_len = (message.len() as u128) * 8;
    let mut padded = message.to_vec();
    padded.push(0x80);
    while (padded.len() + length_bytes) % block != 0 {
        padded.push(0);
    }
    padded.extend_from_slice(&bit_len.to_be_bytes()[16 - length_bytes..]);

    let padded_len = padded.len();
    if padded_len > max_len {
        return Err(ParseError::Document(format!(
            "padded length {padded_len} exceeds maximum {max_len}"
        ))
        .into());
    }
    padded.resize(max_len, 0);
    Ok((padded, padded_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_padding_layout() {
        let (padded, len) = sha_pad(HashAlgorithm::Sha256, b"abc", 128).unwrap();
        assert_eq!(len, 64);
        assert_eq!(padded.len(), 128);
        assert_eq!(&padded[..3], b"abc");
        assert_eq!(padded[3], 0x80);
        assert_eq!(padded[63], 24);
        assert!(padded[64..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_padding_spills_into_next_block() {
        let (_, len) = sha_pad(HashAlgorithm::Sha256, &[1u8; 56], 128).unwrap();
        assert_eq!(len, 128);
        let (padded, len) = sha_pad(HashAlgorithm::Sha512, &[1u8; 112], 256).unwrap();
        assert_eq!(len, 256);
        // 896 bits
        assert_eq!(padded[254], 0x03);
        assert_eq!(padded[255], 0x80);
        assert_eq!(padded[112], 0x80);
    }

    #[test]
    fn test_padding_over_max_is_rejected() {
        assert!(sha_pad(HashAlgorithm::Sha256, &[0u8; 100], 64).is_err());
        assert!(sha_pad(HashAlgorithm::Ripemd160, b"", 64).is_err());
    }
}
