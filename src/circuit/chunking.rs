//! Splitting keys and signatures into little-endian limbs for bigint circuits.

use crate::certificate::{Curve, PublicKeyDetails, SignatureAlgorithmKind};
use crate::error::CryptoError;
use crate::field::FieldElement;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use x509_parser::der_parser::parse_der;

const RSA_CHUNK_BITS: usize = 120;
const RSA_PKCS1_CHUNKS: usize = 35;

/// Limb width `n` and limb count `k` for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub n: usize,
    pub k: usize,
}

pub fn chunk_params(key: &PublicKeyDetails, kind: SignatureAlgorithmKind) -> ChunkParams {
    match key {
        PublicKeyDetails::Rsa { .. } => match kind {
            SignatureAlgorithmKind::RsaPss => ChunkParams {
                n: RSA_CHUNK_BITS,
                k: key.bit_length().div_ceil(RSA_CHUNK_BITS),
            },
            _ => ChunkParams {
                n: RSA_CHUNK_BITS,
                k: RSA_PKCS1_CHUNKS,
            },
        },
        PublicKeyDetails::Ec { curve, .. } => curve_chunk_params(*curve),
    }
}

pub fn curve_chunk_params(curve: Curve) -> ChunkParams {
    match curve {
        Curve::Secp224r1 | Curve::BrainpoolP224r1 => ChunkParams { n: 32, k: 7 },
        Curve::Secp521r1 => ChunkParams { n: 66, k: 8 },
        other => ChunkParams {
            n: 64,
            k: other.bits().div_ceil(64),
        },
    }
}

/// Splits `value` into `k` limbs of `n` bits, least significant first.
pub fn split_to_words(value: &BigUint, n: usize, k: usize) -> Result<Vec<FieldElement>, CryptoError> {
    if value.bits() as usize > n * k {
        return Err(CryptoError::MalformedKey(format!(
            "{}-bit value does not fit {k} limbs of {n} bits",
            value.bits()
        )));
    }
    let mask = (BigUint::one() << n) - BigUint::one();
    let mut rest = value.clone();
    let mut words = Vec::with_capacity(k);
    for _ in 0..k {
        words.push(FieldElement::from_biguint(&(&rest & &mask)));
        rest >>= n;
    }
    debug_assert!(rest.is_zero());
    Ok(words)
}

/// Public key limbs: the modulus for RSA, x then y for EC keys.
pub fn chunk_public_key(
    key: &PublicKeyDetails,
    kind: SignatureAlgorithmKind,
) -> Result<Vec<FieldElement>, CryptoError> {
    let ChunkParams { n, k } = chunk_params(key, kind);
    match key {
        PublicKeyDetails::Rsa { modulus, .. } => {
            split_to_words(&BigUint::from_bytes_be(modulus), n, k)
        }
        PublicKeyDetails::Ec { x, y, .. } => {
            let mut words = split_to_words(&BigUint::from_bytes_be(x), n, k)?;
            words.extend(split_to_words(&BigUint::from_bytes_be(y), n, k)?);
            Ok(words)
        }
    }
}

/// `(r, s)` from a DER `Ecdsa-Sig-Value` or a raw `r || s` concatenation.
pub fn ecdsa_signature_components(signature: &[u8]) -> Result<(BigUint, BigUint), CryptoError> {
    if let Ok((rest, obj)) = parse_der(signature) {
        if rest.is_empty() {
            if let Ok(seq) = obj.as_sequence() {
                if let [r, s] = seq.as_slice() {
                    if let (Ok(r), Ok(s)) = (r.as_slice(), s.as_slice()) {
                        return Ok((BigUint::from_bytes_be(r), BigUint::from_bytes_be(s)));
                    }
                }
            }
        }
    }
    if signature.is_empty() || signature.len() % 2 != 0 {
        return Err(CryptoError::MalformedSignature(format!(
            "{} bytes is neither DER nor r||s",
            signature.len()
        )));
    }
    let (r, s) = signature.split_at(signature.len() / 2);
    Ok((BigUint::from_bytes_be(r), BigUint::from_bytes_be(s)))
}

/// Signature limbs with the same layout as the signing key.
pub fn chunk_signature(
    key: &PublicKeyDetails,
    kind: SignatureAlgorithmKind,
    signature: &[u8],
) -> Result<Vec<FieldElement>, CryptoError> {
    let ChunkParams { n, k } = chunk_params(key, kind);
    match key {
        PublicKeyDetails::Rsa { .. } => split_to_words(&BigUint::from_bytes_be(signature), n, k),
        PublicKeyDetails::Ec { .. } => {
            let (r, s) = ecdsa_signature_components(signature)?;
            let mut words = split_to_words(&r, n, k)?;
            words.extend(split_to_words(&s, n, k)?);
            Ok(words)
        }
    }
}
