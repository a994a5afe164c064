//! Self-consistent mock documents for development and tests.
//!
//! A mock document carries a real LDS security object, real signed attributes and a
//! real signature made with a caller-supplied key. Only the trust anchor is fake: its
//! signer certificate is not issued by any registered CSCA.

use crate::document::{DocumentCategory, DocumentRecord};
use crate::error::{CryptoError, ParseError, Result};
use crate::hash::{digest, HashAlgorithm};
use crate::mrz::{self, compute_check_digit};
use crate::signature::{pkcs1v15_padding, pss_padding};
use log::debug;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use std::collections::BTreeMap;
use std::str::FromStr;
use x509_parser::der_parser::Oid;

/// ICAO 9303 specimen passport.
pub const SAMPLE_TD3_MRZ: &str = "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<\
                                  L898902C36UTO7408122F1204159ZE184226B<<<<<10";

const OID_CONTENT_TYPE: &str = "1.2.840.113549.1.9.3";
const OID_MESSAGE_DIGEST: &str = "1.2.840.113549.1.9.4";
const OID_LDS_SECURITY_OBJECT: &str = "2.23.136.1.1.1";

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_SET: u8 = 0x31;

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes: Vec<u8> = len
            .to_be_bytes()
            .iter()
            .copied()
            .skip_while(|b| *b == 0)
            .collect();
        out.push(0x80 | bytes.len() as u8);
        out.extend(bytes);
    }
    out.extend_from_slice(content);
    out
}

fn oid(dotted: &str) -> Result<Vec<u8>> {
    let oid = Oid::from_str(dotted).map_err(|e| ParseError::Asn1 {
        context: "OID",
        reason: format!("{dotted}: {e:?}"),
    })?;
    Ok(tlv(TAG_OID, oid.as_bytes()))
}

fn small_integer(value: u8) -> Vec<u8> {
    if value < 0x80 {
        tlv(TAG_INTEGER, &[value])
    } else {
        tlv(TAG_INTEGER, &[0, value])
    }
}

fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

/// DER `LDSSecurityObject` (version 0) over the given data-group hashes.
pub fn build_lds_security_object(
    hash: HashAlgorithm,
    data_group_hashes: &BTreeMap<u8, Vec<u8>>,
) -> Result<Vec<u8>> {
    let algorithm = tlv(TAG_SEQUENCE, &concat(&[oid(hash.oid())?, tlv(TAG_NULL, &[])]));
    let entries: Vec<Vec<u8>> = data_group_hashes
        .iter()
        .map(|(dg, value)| {
            tlv(
                TAG_SEQUENCE,
                &concat(&[small_integer(*dg), tlv(TAG_OCTET_STRING, value)]),
            )
        })
        .collect();
    Ok(tlv(
        TAG_SEQUENCE,
        &concat(&[
            small_integer(0),
            algorithm,
            tlv(TAG_SEQUENCE, &entries.concat()),
        ]),
    ))
}

/// DER signed attributes: content type plus the message digest of eContent.
pub fn build_signed_attributes(e_content_digest: &[u8]) -> Result<Vec<u8>> {
    let content_type = tlv(
        TAG_SEQUENCE,
        &concat(&[
            oid(OID_CONTENT_TYPE)?,
            tlv(TAG_SET, &oid(OID_LDS_SECURITY_OBJECT)?),
        ]),
    );
    let message_digest = tlv(
        TAG_SEQUENCE,
        &concat(&[
            oid(OID_MESSAGE_DIGEST)?,
            tlv(TAG_SET, &tlv(TAG_OCTET_STRING, e_content_digest)),
        ]),
    );
    Ok(tlv(TAG_SET, &concat(&[content_type, message_digest])))
}

/// Private key a mock document is signed with.
pub enum MockSigner {
    Rsa(Box<RsaPrivateKey>),
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

impl MockSigner {
    /// Loads an unencrypted PKCS#8 key (PEM or DER) for RSA, P-256 or P-384.
    pub fn from_pkcs8(input: &[u8]) -> Result<Self> {
        let key_error = |reason: &str| CryptoError::MalformedKey(reason.to_string());
        if input.starts_with(b"-----BEGIN") {
            let pem = std::str::from_utf8(input).map_err(|_| key_error("PEM is not UTF-8"))?;
            if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(pem) {
                return Ok(MockSigner::Rsa(Box::new(key)));
            }
            if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_pem(pem) {
                return Ok(MockSigner::P256(key));
            }
            if let Ok(key) = p384::ecdsa::SigningKey::from_pkcs8_pem(pem) {
                return Ok(MockSigner::P384(key));
            }
        } else {
            if let Ok(key) = RsaPrivateKey::from_pkcs8_der(input) {
                return Ok(MockSigner::Rsa(Box::new(key)));
            }
            if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_der(input) {
                return Ok(MockSigner::P256(key));
            }
            if let Ok(key) = p384::ecdsa::SigningKey::from_pkcs8_der(input) {
                return Ok(MockSigner::P384(key));
            }
        }
        Err(key_error("not an RSA, P-256 or P-384 PKCS#8 key").into())
    }

    /// Signs `message` with PKCS#1 v1.5 (RSA) or DER-encoded ECDSA.
    pub fn sign(&self, hash: HashAlgorithm, message: &[u8]) -> Result<Vec<u8>> {
        let hashed = digest(hash, message);
        let signing = |e: String| CryptoError::Signing(e);
        let signature = match self {
            MockSigner::Rsa(key) => {
                let padding = pkcs1v15_padding(hash)
                    .ok_or_else(|| signing(format!("{hash} has no PKCS#1 encoding")))?;
                key.sign(padding, &hashed).map_err(|e| signing(e.to_string()))?
            }
            MockSigner::P256(key) => {
                let sig: p256::ecdsa::Signature =
                    key.sign_prehash(&hashed).map_err(|e| signing(e.to_string()))?;
                sig.to_der().as_bytes().to_vec()
            }
            MockSigner::P384(key) => {
                let sig: p384::ecdsa::Signature =
                    key.sign_prehash(&hashed).map_err(|e| signing(e.to_string()))?;
                sig.to_der().as_bytes().to_vec()
            }
        };
        Ok(signature)
    }

    /// Signs `message` with RSASSA-PSS and a random salt of `salt_length` bytes.
    pub fn sign_pss(
        &self,
        hash: HashAlgorithm,
        salt_length: usize,
        message: &[u8],
    ) -> Result<Vec<u8>> {
        let MockSigner::Rsa(key) = self else {
            return Err(CryptoError::Signing("PSS needs an RSA key".to_string()).into());
        };
        let padding = pss_padding(hash, salt_length)
            .ok_or_else(|| CryptoError::Signing(format!("{hash} has no PSS encoding")))?;
        let signature = key
            .sign_with_rng(&mut rand::thread_rng(), padding, &digest(hash, message))
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        Ok(signature)
    }
}

/// Hash choices for a mock document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockHashes {
    /// Data-group hashes and the LDS security object algorithm.
    pub data_groups: HashAlgorithm,
    /// Digest of eContent stored in the signed attributes.
    pub e_content: HashAlgorithm,
    /// Hash used by the signature over the signed attributes.
    pub signed_attributes: HashAlgorithm,
}

impl Default for MockHashes {
    fn default() -> Self {
        Self {
            data_groups: HashAlgorithm::Sha256,
            e_content: HashAlgorithm::Sha256,
            signed_attributes: HashAlgorithm::Sha256,
        }
    }
}

/// Builds a signed, internally consistent document with `mock = true`.
///
/// DG1 is derived from `mrz`. DG2 and DG14 get placeholder hashes so the LDS lists more
/// than one data group.
pub fn build_mock_document(
    mrz_text: &str,
    category: DocumentCategory,
    hashes: MockHashes,
    signer: &MockSigner,
    signer_certificate_der: &[u8],
) -> Result<DocumentRecord> {
    let dg1 = mrz::format_mrz(mrz_text)?;
    let mut data_group_hashes = BTreeMap::new();
    data_group_hashes.insert(1u8, digest(hashes.data_groups, &dg1));
    for dg in [2u8, 14] {
        data_group_hashes.insert(dg, digest(hashes.data_groups, &[dg; 32]));
    }

    let e_content = build_lds_security_object(hashes.data_groups, &data_group_hashes)?;
    let signed_attributes = build_signed_attributes(&digest(hashes.e_content, &e_content))?;
    let signature = signer.sign(hashes.signed_attributes, &signed_attributes)?;
    debug!(
        "Built mock {category} with eContent of {} bytes and a {}-byte signature",
        e_content.len(),
        signature.len()
    );

    Ok(DocumentRecord {
        document_category: category,
        mrz: mrz::normalize_mrz(mrz_text),
        data_group_hashes,
        e_content,
        signed_attributes: Some(signed_attributes),
        signature,
        signer_certificate: signer_certificate_der.to_vec(),
        mock: true,
    })
}

/// Holder fields for generating a mock MRZ with valid check digits.
#[derive(Debug, Clone)]
pub struct MockIdentity {
    pub issuing_country: String,
    pub nationality: String,
    pub document_number: String,
    pub surname: String,
    pub given_names: String,
    /// YYMMDD or YYYY-MM-DD
    pub date_of_birth: String,
    /// YYMMDD or YYYY-MM-DD
    pub date_of_expiry: String,
    pub sex: char,
}

fn filler(s: &str, width: usize) -> String {
    let mut out: String = s.to_uppercase().replace(' ', "<");
    out.truncate(width);
    format!("{out:<<width$}")
}

fn digit(field: &str) -> char {
    char::from_digit(compute_check_digit(field), 10).unwrap_or('0')
}

impl MockIdentity {
    fn names(&self, width: usize) -> String {
        filler(&format!("{}<<{}", self.surname, self.given_names), width)
    }

    /// Two 44-character lines, passport booklet layout.
    pub fn to_td3_mrz(&self) -> std::result::Result<String, ParseError> {
        let dob = mrz::format_date_to_yymmdd(&self.date_of_birth)?;
        let expiry = mrz::format_date_to_yymmdd(&self.date_of_expiry)?;
        let number = filler(&self.document_number, 9);
        let optional = filler("", 14);
        let line1 = format!(
            "P<{}{}",
            filler(&self.issuing_country, 3),
            self.names(39)
        );
        let mut line2 = format!(
            "{number}{}{}{dob}{}{}{expiry}{}{optional}{}",
            digit(&number),
            filler(&self.nationality, 3),
            digit(&dob),
            self.sex,
            digit(&expiry),
            digit(&optional),
        );
        let composite = [&line2[0..10], &line2[13..20], &line2[21..43]].concat();
        line2.push(digit(&composite));
        Ok(format!("{line1}{line2}"))
    }

    /// Three 30-character lines, ID card layout.
    pub fn to_td1_mrz(&self) -> std::result::Result<String, ParseError> {
        let dob = mrz::format_date_to_yymmdd(&self.date_of_birth)?;
        let expiry = mrz::format_date_to_yymmdd(&self.date_of_expiry)?;
        let number = filler(&self.document_number, 9);
        let line1 = format!(
            "I<{}{number}{}{}",
            filler(&self.issuing_country, 3),
            digit(&number),
            filler("", 15)
        );
        let mut line2 = format!(
            "{dob}{}{}{expiry}{}{}{}",
            digit(&dob),
            self.sex,
            digit(&expiry),
            filler(&self.nationality, 3),
            filler("", 11)
        );
        let composite = [&line1[5..30], &line2[0..7], &line2[8..15], &line2[18..29]].concat();
        line2.push(digit(&composite));
        Ok(format!("{line1}{line2}{}", self.names(30)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_lds_security_object;
    use crate::mrz::extract_mrz_info;

    fn identity() -> MockIdentity {
        MockIdentity {
            issuing_country: "FRA".into(),
            nationality: "FRA".into(),
            document_number: "15AA81234".into(),
            surname: "DUPONT".into(),
            given_names: "ALPHONSE HUGHUES".into(),
            date_of_birth: "1990-03-15".into(),
            date_of_expiry: "2031-10-19".into(),
            sex: 'M',
        }
    }

    #[test]
    fn test_long_lengths_are_encoded() {
        let content = vec![0u8; 300];
        let encoded = tlv(TAG_OCTET_STRING, &content);
        assert_eq!(&encoded[..4], &[0x04, 0x82, 0x01, 0x2c]);
        assert_eq!(encoded.len(), 304);
    }

    #[test]
    fn test_lds_roundtrip() {
        let mut hashes = BTreeMap::new();
        hashes.insert(1u8, vec![0xaa; 32]);
        hashes.insert(15u8, vec![0xbb; 32]);
        let lds = build_lds_security_object(HashAlgorithm::Sha256, &hashes).unwrap();
        let parsed = parse_lds_security_object(&lds).unwrap();
        assert_eq!(parsed.hash_algorithm, Some(HashAlgorithm::Sha256));
        assert_eq!(parsed.data_group_hashes, hashes);
    }

    #[test]
    fn test_signed_attributes_embed_digest() {
        let digest_bytes = vec![0x5a; 48];
        let attrs = build_signed_attributes(&digest_bytes).unwrap();
        assert_eq!(attrs[0], TAG_SET);
        assert!(crate::hash::find_subarray(&attrs, &digest_bytes).is_some());
    }

    #[test]
    fn test_generated_td3_has_valid_check_digits() {
        let mrz = identity().to_td3_mrz().unwrap();
        assert_eq!(mrz.len(), mrz::TD3_LENGTH);
        let info = extract_mrz_info(&mrz).unwrap();
        assert!(info.check_digits.all_valid());
        assert_eq!(info.document_number, "15AA81234");
        assert_eq!(info.date_of_birth, "900315");
        assert_eq!(info.given_names, "ALPHONSE HUGHUES");
    }

    #[test]
    fn test_generated_td1_has_valid_check_digits() {
        let mrz = identity().to_td1_mrz().unwrap();
        assert_eq!(mrz.len(), mrz::TD1_LENGTH);
        let info = extract_mrz_info(&mrz).unwrap();
        assert!(info.check_digits.all_valid());
        assert_eq!(info.nationality, "FRA");
        assert_eq!(info.surname, "DUPONT");
    }

    #[test]
    fn test_rejects_unknown_key() {
        assert!(MockSigner::from_pkcs8(b"garbage").is_err());
    }
}
