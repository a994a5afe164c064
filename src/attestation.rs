//! Verification of COSE_Sign1 attestation documents from the remote prover enclave.
//!
//! Only ECDSA over P-256 (SHA-256) and P-384 (SHA-384) is accepted. The signature is
//! the raw `r || s` concatenation COSE uses, over the `Signature1` structure with an
//! empty external AAD.

use crate::certificate::Curve;
use crate::error::AttestationError;
use crate::utils::validate_hex_string;
use ciborium::Value;
use log::{debug, warn};
use p256::ecdsa::signature::Verifier;
use serde::{Deserialize, Serialize};

/// CBOR tag of an explicitly tagged COSE_Sign1 message.
pub const COSE_SIGN1_TAG: u64 = 18;
/// COSE header label for the signing algorithm.
pub const HEADER_ALG: i64 = 1;

/// Public key the enclave signs with, as hex affine coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationKey {
    /// Curve name, e.g. `P-256` or `secp384r1`.
    pub curve: String,
    pub x: String,
    pub y: String,
}

/// A COSE_Sign1 whose signature verified.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedAttestation {
    pub protected: Value,
    pub unprotected: Value,
    pub payload: Vec<u8>,
}

impl VerifiedAttestation {
    /// The `alg` protected header, e.g. `-7` for ES256.
    pub fn algorithm(&self) -> Option<i64> {
        header_int(&self.protected, HEADER_ALG)
    }

    /// The payload decoded as CBOR.
    pub fn payload_value(&self) -> Result<Value, AttestationError> {
        ciborium::from_reader(self.payload.as_slice())
            .map_err(|e| AttestationError::InvalidCoseFormat(format!("payload: {e}")))
    }
}

fn header_int(map: &Value, label: i64) -> Option<i64> {
    map.as_map()?.iter().find_map(|(k, v)| {
        let key = i64::try_from(k.as_integer()?).ok()?;
        if key == label {
            i64::try_from(v.as_integer()?).ok()
        } else {
            None
        }
    })
}

fn format_error(reason: impl ToString) -> AttestationError {
    AttestationError::InvalidCoseFormat(reason.to_string())
}

struct CoseSign1 {
    protected: Vec<u8>,
    unprotected: Value,
    payload: Vec<u8>,
    signature: Vec<u8>,
}

fn take_bytes(item: Option<Value>, name: &str) -> Result<Vec<u8>, AttestationError> {
    match item {
        Some(Value::Bytes(bytes)) => Ok(bytes),
        _ => Err(format_error(format!("{name} is not a byte string"))),
    }
}

fn decode_cose_sign1(bytes: &[u8]) -> Result<CoseSign1, AttestationError> {
    let value: Value = ciborium::from_reader(bytes).map_err(format_error)?;
    let value = match value {
        Value::Tag(COSE_SIGN1_TAG, inner) => *inner,
        Value::Tag(tag, _) => return Err(format_error(format!("unexpected CBOR tag {tag}"))),
        other => other,
    };
    let items = match value {
        Value::Array(items) if items.len() == 4 => items,
        Value::Array(items) => {
            return Err(format_error(format!("expected 4 elements, got {}", items.len())))
        }
        _ => return Err(format_error("COSE_Sign1 is not an array")),
    };
    let mut items = items.into_iter();
    let protected = take_bytes(items.next(), "protected header")?;
    let unprotected = match items.next() {
        Some(map @ Value::Map(_)) => map,
        _ => return Err(format_error("unprotected header is not a map")),
    };
    let payload = match items.next() {
        Some(Value::Null) => return Err(format_error("detached payloads are not supported")),
        other => take_bytes(other, "payload")?,
    };
    let signature = take_bytes(items.next(), "signature")?;
    Ok(CoseSign1 {
        protected,
        unprotected,
        payload,
        signature,
    })
}

/// `["Signature1", protected, h'', payload]`, CBOR-encoded.
pub fn signature1_structure(protected: &[u8], payload: &[u8]) -> Result<Vec<u8>, AttestationError> {
    let structure = Value::Array(vec![
        Value::Text("Signature1".to_string()),
        Value::Bytes(protected.to_vec()),
        Value::Bytes(Vec::new()),
        Value::Bytes(payload.to_vec()),
    ]);
    let mut out = Vec::new();
    ciborium::into_writer(&structure, &mut out).map_err(format_error)?;
    Ok(out)
}

fn coordinate(value: &str, expected: usize) -> Result<Vec<u8>, AttestationError> {
    let stripped = value.trim().trim_start_matches("0x");
    if !validate_hex_string(stripped) {
        return Err(AttestationError::InvalidKeyCoordinates(format!(
            "'{value}' is not hex"
        )));
    }
    if stripped.len() != expected {
        return Err(AttestationError::InvalidKeyLength {
            expected,
            actual: stripped.len(),
        });
    }
    hex::decode(stripped).map_err(|e| AttestationError::InvalidKeyCoordinates(e.to_string()))
}

fn sec1_point(key: &AttestationKey, coordinate_len: usize) -> Result<Vec<u8>, AttestationError> {
    let mut point = vec![0x04];
    point.extend(coordinate(&key.x, coordinate_len * 2)?);
    point.extend(coordinate(&key.y, coordinate_len * 2)?);
    Ok(point)
}

/// Verifies a COSE_Sign1 attestation against the enclave key.
///
/// # Errors
///
/// * [`AttestationError::InvalidCoseFormat`] when the bytes are not a 4-element COSE_Sign1
/// * [`AttestationError::UnsupportedCurve`] for curves other than P-256 and P-384
/// * [`AttestationError::InvalidKeyCoordinates`] / [`AttestationError::InvalidKeyLength`]
///   for malformed coordinates
/// * [`AttestationError::InvalidSignatureLength`] when the signature is not `r || s`
/// * [`AttestationError::SignatureVerificationFailed`] when the signature does not verify
pub fn verify_attestation(
    cose: &[u8],
    key: &AttestationKey,
) -> Result<VerifiedAttestation, AttestationError> {
    let message = decode_cose_sign1(cose)?;
    let curve = Curve::from_name(&key.curve)
        .map_err(|_| AttestationError::UnsupportedCurve(key.curve.clone()))?;
    let coordinate_len = match curve {
        Curve::Secp256r1 | Curve::Secp384r1 => curve.coordinate_len(),
        other => return Err(AttestationError::UnsupportedCurve(other.to_string())),
    };
    let point = sec1_point(key, coordinate_len)?;

    let signature_len = message.signature.len();
    if signature_len % 2 != 0 || signature_len != coordinate_len * 2 {
        return Err(AttestationError::InvalidSignatureLength(signature_len));
    }

    let to_be_signed = signature1_structure(&message.protected, &message.payload)?;
    let bad_point = |reason: String| {
        AttestationError::InvalidKeyCoordinates(format!("point is not on {curve}: {reason}"))
    };
    let verified = match curve {
        Curve::Secp256r1 => {
            let verifying_key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                .map_err(|e| bad_point(e.to_string()))?;
            p256::ecdsa::Signature::from_slice(&message.signature)
                .map(|sig| verifying_key.verify(&to_be_signed, &sig).is_ok())
                .unwrap_or(false)
        }
        _ => {
            let verifying_key = p384::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                .map_err(|e| bad_point(e.to_string()))?;
            p384::ecdsa::Signature::from_slice(&message.signature)
                .map(|sig| verifying_key.verify(&to_be_signed, &sig).is_ok())
                .unwrap_or(false)
        }
    };
    if !verified {
        warn!("Attestation signature over {curve} did not verify");
        return Err(AttestationError::SignatureVerificationFailed);
    }

    let protected = if message.protected.is_empty() {
        Value::Map(Vec::new())
    } else {
        ciborium::from_reader(message.protected.as_slice())
            .map_err(|e| format_error(format!("protected header: {e}")))?
    };
    debug!(
        "Verified {curve} attestation with a {}-byte payload",
        message.payload.len()
    );
    Ok(VerifiedAttestation {
        protected,
        unprotected: message.unprotected,
        payload: message.payload,
    })
}
