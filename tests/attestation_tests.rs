use ciborium::Value;
use passport_witness::attestation::{verify_attestation, AttestationKey};
use passport_witness::error::{AttestationError, ErrorCategory, WitnessError};
use serde::Deserialize;

#[derive(Deserialize)]
struct Vector {
    curve: String,
    x: String,
    y: String,
    cose_hex: String,
    payload_hex: String,
}

fn load(name: &str) -> (Vec<u8>, AttestationKey, Vec<u8>) {
    let text = std::fs::read_to_string(format!(
        "{}/tests/fixtures/{name}",
        env!("CARGO_MANIFEST_DIR")
    ))
    .unwrap();
    let v: Vector = serde_json::from_str(&text).unwrap();
    (
        hex::decode(v.cose_hex).unwrap(),
        AttestationKey {
            curve: v.curve,
            x: v.x,
            y: v.y,
        },
        hex::decode(v.payload_hex).unwrap(),
    )
}

/// Decodes the COSE array, lets `edit` change it and re-encodes it untagged.
fn rewrite(cose: &[u8], edit: impl FnOnce(&mut Vec<Value>)) -> Vec<u8> {
    let value: Value = ciborium::from_reader(cose).unwrap();
    let mut items = match value {
        Value::Tag(_, inner) => inner.into_array().unwrap(),
        other => other.into_array().unwrap(),
    };
    edit(&mut items);
    let mut out = Vec::new();
    ciborium::into_writer(&Value::Array(items), &mut out).unwrap();
    out
}

#[test]
fn test_p256_attestation_verifies() {
    let (cose, key, payload) = load("attestation_p256.json");
    let verified = verify_attestation(&cose, &key).unwrap();
    assert_eq!(verified.payload, payload);
    assert_eq!(verified.algorithm(), Some(-7));

    let fields = verified.payload_value().unwrap().into_map().unwrap();
    assert!(fields
        .iter()
        .any(|(k, v)| k.as_text() == Some("user_data") && v.as_bytes().map(Vec::as_slice) == Some(&b"witness-prover"[..])));
}

#[test]
fn test_tagged_p384_attestation_verifies() {
    let (cose, key, payload) = load("attestation_p384.json");
    assert_eq!(cose[0], 0xd2);
    let verified = verify_attestation(&cose, &key).unwrap();
    assert_eq!(verified.payload, payload);
    assert_eq!(verified.algorithm(), Some(-35));
}

#[test]
fn test_flipped_signature_byte_fails() {
    let (mut cose, key, _) = load("attestation_p256.json");
    let last = cose.len() - 1;
    cose[last] ^= 0x01;
    let err = verify_attestation(&cose, &key).unwrap_err();
    assert!(matches!(err, AttestationError::SignatureVerificationFailed));
    assert_eq!(err.to_string(), "signature verification failed");

    let wrapped: WitnessError = err.into();
    assert_eq!(wrapped.category(), ErrorCategory::UntrustedBackend);
    assert!(!wrapped.is_retryable());
}

#[test]
fn test_tampered_payload_fails() {
    let (cose, key, _) = load("attestation_p384.json");
    let tampered = rewrite(&cose, |items| {
        items[2] = Value::Bytes(b"forged".to_vec());
    });
    assert!(matches!(
        verify_attestation(&tampered, &key),
        Err(AttestationError::SignatureVerificationFailed)
    ));
}

#[test]
fn test_odd_signature_length() {
    let (cose, key, _) = load("attestation_p256.json");
    let odd = rewrite(&cose, |items| {
        if let Value::Bytes(sig) = &mut items[3] {
            sig.pop();
        }
    });
    assert!(matches!(
        verify_attestation(&odd, &key),
        Err(AttestationError::InvalidSignatureLength(63))
    ));
}

#[test]
fn test_three_element_array_is_malformed() {
    let (cose, key, _) = load("attestation_p256.json");
    let short = rewrite(&cose, |items| {
        items.pop();
    });
    assert!(matches!(
        verify_attestation(&short, &key),
        Err(AttestationError::InvalidCoseFormat(_))
    ));
}

#[test]
fn test_bad_keys() {
    let (cose, key, _) = load("attestation_p256.json");

    let non_hex = AttestationKey {
        x: format!("g{}", &key.x[1..]),
        ..key.clone()
    };
    assert!(matches!(
        verify_attestation(&cose, &non_hex),
        Err(AttestationError::InvalidKeyCoordinates(_))
    ));

    let p384_sized = AttestationKey {
        curve: "P-384".to_string(),
        ..key.clone()
    };
    assert!(matches!(
        verify_attestation(&cose, &p384_sized),
        Err(AttestationError::InvalidKeyLength {
            expected: 96,
            actual: 64
        })
    ));

    let (_, other_key, _) = load("attestation_p384.json");
    let wrong_curve = AttestationKey {
        curve: "brainpoolP256r1".to_string(),
        ..other_key
    };
    assert!(matches!(
        verify_attestation(&cose, &wrong_curve),
        Err(AttestationError::UnsupportedCurve(_))
    ));
}
