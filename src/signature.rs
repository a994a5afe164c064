//! Signature verification over RSA PKCS#1 v1.5, RSASSA-PSS and ECDSA, plus detection
//! of the scheme when a certificate does not declare it unambiguously.

use crate::certificate::{CertificateData, Curve, PublicKeyDetails, SignatureAlgorithmKind};
use crate::error::{CryptoError, Result, UnsupportedAlgorithm, ValidationMismatch};
use crate::hash::{digest, get_hash_len, HashAlgorithm};
use log::debug;
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use rsa::{Pkcs1v15Sign, Pss, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use std::fmt;

const MAX_RSA_BITS: usize = 8192;

/// Hash functions in the order brute-force detection tries them.
pub const BRUTE_FORCE_HASHES: [HashAlgorithm; 5] = [
    HashAlgorithm::Sha256,
    HashAlgorithm::Sha384,
    HashAlgorithm::Sha512,
    HashAlgorithm::Sha1,
    HashAlgorithm::Sha224,
];

const PSS_SALT_LENGTHS: [usize; 3] = [32, 48, 64];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum SignatureScheme {
    RsaPkcs1v15 { hash: HashAlgorithm },
    RsaPss { hash: HashAlgorithm, salt_length: usize },
    Ecdsa { hash: HashAlgorithm },
}

impl SignatureScheme {
    pub fn hash(&self) -> HashAlgorithm {
        match self {
            SignatureScheme::RsaPkcs1v15 { hash }
            | SignatureScheme::RsaPss { hash, .. }
            | SignatureScheme::Ecdsa { hash } => *hash,
        }
    }

    pub fn kind(&self) -> SignatureAlgorithmKind {
        match self {
            SignatureScheme::RsaPkcs1v15 { .. } => SignatureAlgorithmKind::Rsa,
            SignatureScheme::RsaPss { .. } => SignatureAlgorithmKind::RsaPss,
            SignatureScheme::Ecdsa { .. } => SignatureAlgorithmKind::Ecdsa,
        }
    }

    pub fn salt_length(&self) -> Option<usize> {
        match self {
            SignatureScheme::RsaPss { salt_length, .. } => Some(*salt_length),
            _ => None,
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureScheme::RsaPkcs1v15 { hash } => write!(f, "rsa/{hash}"),
            SignatureScheme::RsaPss { hash, salt_length } => {
                write!(f, "rsapss/{hash}/salt{salt_length}")
            }
            SignatureScheme::Ecdsa { hash } => write!(f, "ecdsa/{hash}"),
        }
    }
}

fn rsa_key(modulus: &[u8], exponent: u64) -> std::result::Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::new_with_max_size(
        rsa::BigUint::from_bytes_be(modulus),
        rsa::BigUint::from(exponent),
        MAX_RSA_BITS,
    )
    .map_err(|e| CryptoError::MalformedKey(e.to_string()))
}

pub(crate) fn pkcs1v15_padding(hash: HashAlgorithm) -> Option<Pkcs1v15Sign> {
    Some(match hash {
        HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
        HashAlgorithm::Sha224 => Pkcs1v15Sign::new::<Sha224>(),
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
        HashAlgorithm::Ripemd160 => return None,
    })
}

pub(crate) fn pss_padding(hash: HashAlgorithm, salt_length: usize) -> Option<Pss> {
    Some(match hash {
        HashAlgorithm::Sha1 => Pss::new_with_salt::<Sha1>(salt_length),
        HashAlgorithm::Sha224 => Pss::new_with_salt::<Sha224>(salt_length),
        HashAlgorithm::Sha256 => Pss::new_with_salt::<Sha256>(salt_length),
        HashAlgorithm::Sha384 => Pss::new_with_salt::<Sha384>(salt_length),
        HashAlgorithm::Sha512 => Pss::new_with_salt::<Sha512>(salt_length),
        HashAlgorithm::Ripemd160 => return None,
    })
}

fn verify_ecdsa(curve: Curve, point: &[u8], prehash: &[u8], signature: &[u8]) -> Result<bool> {
    let malformed = |e: p256::ecdsa::Error| CryptoError::MalformedKey(e.to_string());
    let valid = match curve {
        Curve::Secp256r1 => {
            let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(point).map_err(malformed)?;
            let sig = p256::ecdsa::Signature::from_der(signature)
                .or_else(|_| p256::ecdsa::Signature::from_slice(signature));
            sig.map(|s| key.verify_prehash(prehash, &s).is_ok())
                .unwrap_or(false)
        }
        Curve::Secp384r1 => {
            let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(point).map_err(malformed)?;
            let sig = p384::ecdsa::Signature::from_der(signature)
                .or_else(|_| p384::ecdsa::Signature::from_slice(signature));
            sig.map(|s| key.verify_prehash(prehash, &s).is_ok())
                .unwrap_or(false)
        }
        other => return Err(UnsupportedAlgorithm::Curve(other.to_string()).into()),
    };
    Ok(valid)
}

/// Verifies `signature` over `message` with `public_key` under `scheme`.
///
/// A signature that fails to decode counts as invalid rather than an error.
///
/// # Errors
///
/// - [`CryptoError::MalformedKey`] when the key cannot be loaded
/// - [`UnsupportedAlgorithm`] when the scheme does not fit the key, or the curve has no
///   verifier
pub fn verify_signature(
    public_key: &PublicKeyDetails,
    scheme: SignatureScheme,
    message: &[u8],
    signature: &[u8],
) -> Result<bool> {
    let hashed = digest(scheme.hash(), message);
    let unsupported =
        || UnsupportedAlgorithm::Signature(format!("{scheme} does not apply to this key"));
    match (public_key, scheme) {
        (PublicKeyDetails::Rsa { modulus, exponent }, SignatureScheme::RsaPkcs1v15 { hash }) => {
            let key = rsa_key(modulus, *exponent)?;
            let padding = pkcs1v15_padding(hash).ok_or_else(unsupported)?;
            Ok(key.verify(padding, &hashed, signature).is_ok())
        }
        (
            PublicKeyDetails::Rsa { modulus, exponent },
            SignatureScheme::RsaPss { hash, salt_length },
        ) => {
            let key = rsa_key(modulus, *exponent)?;
            let padding = pss_padding(hash, salt_length).ok_or_else(unsupported)?;
            Ok(key.verify(padding, &hashed, signature).is_ok())
        }
        (PublicKeyDetails::Ec { curve, .. }, SignatureScheme::Ecdsa { .. }) => {
            let point = public_key.sec1_point().ok_or_else(unsupported)?;
            verify_ecdsa(*curve, &point, &hashed, signature)
        }
        _ => Err(unsupported().into()),
    }
}

/// Whether signatures under this key can be checked at all. RSA always can; of the
/// curves only P-256 and P-384 have a verifier.
pub fn has_verifier(public_key: &PublicKeyDetails) -> bool {
    match public_key {
        PublicKeyDetails::Rsa { .. } => true,
        PublicKeyDetails::Ec { curve, .. } => {
            matches!(curve, Curve::Secp256r1 | Curve::Secp384r1)
        }
    }
}

/// Ordered, deduplicated list of schemes worth trying for a key.
///
/// RSA keys try PKCS#1 v1.5 first, then PSS with the digest length and the common
/// fixed salts. EC keys try ECDSA with each hash.
pub fn signature_candidates(public_key: &PublicKeyDetails) -> Vec<SignatureScheme> {
    let mut candidates = Vec::new();
    match public_key {
        PublicKeyDetails::Rsa { .. } => {
            for hash in BRUTE_FORCE_HASHES {
                candidates.push(SignatureScheme::RsaPkcs1v15 { hash });
            }
            for hash in BRUTE_FORCE_HASHES {
                let mut salts = vec![get_hash_len(hash)];
                salts.extend(PSS_SALT_LENGTHS);
                salts.push(0);
                for salt_length in salts {
                    let scheme = SignatureScheme::RsaPss { hash, salt_length };
                    if !candidates.contains(&scheme) {
                        candidates.push(scheme);
                    }
                }
            }
        }
        PublicKeyDetails::Ec { .. } => {
            for hash in BRUTE_FORCE_HASHES {
                candidates.push(SignatureScheme::Ecdsa { hash });
            }
        }
    }
    candidates
}

/// Tries each candidate scheme in order and returns the first that verifies.
pub fn brute_force_signature_algorithm(
    public_key: &PublicKeyDetails,
    message: &[u8],
    signature: &[u8],
) -> Result<Option<SignatureScheme>> {
    for scheme in signature_candidates(public_key) {
        if verify_signature(public_key, scheme, message, signature)? {
            debug!("Signature verified as {scheme}");
            return Ok(Some(scheme));
        }
    }
    debug!("No candidate scheme verified the signature");
    Ok(None)
}

/// The scheme a certificate declares for its own signature, when fully specified.
pub fn declared_scheme(cert: &CertificateData) -> Option<SignatureScheme> {
    let hash = cert.hash_algorithm?;
    match cert.signature_algorithm {
        SignatureAlgorithmKind::Rsa => Some(SignatureScheme::RsaPkcs1v15 { hash }),
        SignatureAlgorithmKind::RsaPss => Some(SignatureScheme::RsaPss {
            hash,
            salt_length: cert.salt_length? as usize,
        }),
        SignatureAlgorithmKind::Ecdsa => Some(SignatureScheme::Ecdsa { hash }),
    }
}

/// Checks that `csca` signed `dsc` and returns the scheme that verified.
///
/// The declared scheme is tried first; brute force covers missing or ambiguous OIDs.
///
/// # Errors
///
/// [`ValidationMismatch::CertificateChain`] when no scheme verifies.
pub fn verify_certificate_signature(
    dsc: &CertificateData,
    csca: &CertificateData,
) -> Result<SignatureScheme> {
    if let Some(scheme) = declared_scheme(dsc) {
        if verify_signature(&csca.public_key, scheme, &dsc.tbs_bytes, &dsc.signature)? {
            return Ok(scheme);
        }
    }
    brute_force_signature_algorithm(&csca.public_key, &dsc.tbs_bytes, &dsc.signature)?
        .ok_or_else(|| ValidationMismatch::CertificateChain.into())
}
