//! X.509 certificate decoding for document signer (DSC) and country signing (CSCA)
//! certificates.

use crate::error::{ParseError, UnsupportedAlgorithm};
use crate::hash::{digest, HashAlgorithm};
use crate::utils::serde_hex;
use log::{debug, info};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use strum::{Display, EnumIter, EnumString};
use x509_parser::der_parser::Oid;
use x509_parser::nom::Parser;
use x509_parser::prelude::*;
use x509_parser::public_key::{PublicKey, RSAPublicKey};
use x509_parser::signature_algorithm::RsaSsaPssParams;

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
pub(crate) const OID_RSASSA_PSS: &str = "1.2.840.113549.1.1.10";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_AUTHORITY_KEY_ID: &str = "2.5.29.35";
const OID_SUBJECT_KEY_ID: &str = "2.5.29.14";

/// Named curves accepted in document certificates.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum Curve {
    #[strum(serialize = "secp224r1")]
    #[serde(rename = "secp224r1")]
    Secp224r1,
    #[strum(serialize = "secp256r1")]
    #[serde(rename = "secp256r1")]
    Secp256r1,
    #[strum(serialize = "secp384r1")]
    #[serde(rename = "secp384r1")]
    Secp384r1,
    #[strum(serialize = "secp521r1")]
    #[serde(rename = "secp521r1")]
    Secp521r1,
    #[strum(serialize = "brainpoolP224r1")]
    #[serde(rename = "brainpoolP224r1")]
    BrainpoolP224r1,
    #[strum(serialize = "brainpoolP256r1")]
    #[serde(rename = "brainpoolP256r1")]
    BrainpoolP256r1,
    #[strum(serialize = "brainpoolP384r1")]
    #[serde(rename = "brainpoolP384r1")]
    BrainpoolP384r1,
    #[strum(serialize = "brainpoolP512r1")]
    #[serde(rename = "brainpoolP512r1")]
    BrainpoolP512r1,
}

impl Curve {
    pub fn from_oid(oid: &str) -> Option<Self> {
        match oid {
            "1.3.132.0.33" => Some(Curve::Secp224r1),
            "1.2.840.10045.3.1.7" => Some(Curve::Secp256r1),
            "1.3.132.0.34" => Some(Curve::Secp384r1),
            "1.3.132.0.35" => Some(Curve::Secp521r1),
            "1.3.36.3.3.2.8.1.1.5" => Some(Curve::BrainpoolP224r1),
            "1.3.36.3.3.2.8.1.1.7" => Some(Curve::BrainpoolP256r1),
            "1.3.36.3.3.2.8.1.1.11" => Some(Curve::BrainpoolP384r1),
            "1.3.36.3.3.2.8.1.1.13" => Some(Curve::BrainpoolP512r1),
            _ => None,
        }
    }

    /// Resolves SECG, NIST and OpenSSL spellings (`secp256r1`, `P-256`, `prime256v1`).
    pub fn from_name(name: &str) -> Result<Self, UnsupportedAlgorithm> {
        let key: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        let curve = match key.as_str() {
            "secp224r1" | "p224" | "nistp224" => Curve::Secp224r1,
            "secp256r1" | "p256" | "nistp256" | "prime256v1" => Curve::Secp256r1,
            "secp384r1" | "p384" | "nistp384" => Curve::Secp384r1,
            "secp521r1" | "p521" | "nistp521" => Curve::Secp521r1,
            "brainpoolp224r1" => Curve::BrainpoolP224r1,
            "brainpoolp256r1" => Curve::BrainpoolP256r1,
            "brainpoolp384r1" => Curve::BrainpoolP384r1,
            "brainpoolp512r1" => Curve::BrainpoolP512r1,
            _ => return Err(UnsupportedAlgorithm::Curve(name.to_string())),
        };
        Ok(curve)
    }

    pub fn bits(&self) -> usize {
        match self {
            Curve::Secp224r1 | Curve::BrainpoolP224r1 => 224,
            Curve::Secp256r1 | Curve::BrainpoolP256r1 => 256,
            Curve::Secp384r1 | Curve::BrainpoolP384r1 => 384,
            Curve::Secp521r1 => 521,
            Curve::BrainpoolP512r1 => 512,
        }
    }

    /// Length in bytes of one affine coordinate.
    pub fn coordinate_len(&self) -> usize {
        self.bits().div_ceil(8)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SignatureAlgorithmKind {
    Rsa,
    RsaPss,
    Ecdsa,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PublicKeyDetails {
    Rsa {
        /// Big-endian modulus without leading zeros.
        #[serde(with = "serde_hex")]
        modulus: Vec<u8>,
        exponent: u64,
    },
    Ec {
        curve: Curve,
        #[serde(with = "serde_hex")]
        x: Vec<u8>,
        #[serde(with = "serde_hex")]
        y: Vec<u8>,
    },
}

impl PublicKeyDetails {
    pub fn bit_length(&self) -> usize {
        match self {
            PublicKeyDetails::Rsa { modulus, .. } => BigUint::from_bytes_be(modulus).bits() as usize,
            PublicKeyDetails::Ec { curve, .. } => curve.bits(),
        }
    }

    /// SEC1 uncompressed point for EC keys.
    pub fn sec1_point(&self) -> Option<Vec<u8>> {
        match self {
            PublicKeyDetails::Ec { x, y, .. } => {
                let mut point = Vec::with_capacity(1 + x.len() + y.len());
                point.push(0x04);
                point.extend_from_slice(x);
                point.extend_from_slice(y);
                Some(point)
            }
            PublicKeyDetails::Rsa { .. } => None,
        }
    }
}

/// Fields only a full parse produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateDetails {
    pub serial_number: String,
    pub not_before: i64,
    pub not_after: i64,
    pub extension_oids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateData {
    pub public_key: PublicKeyDetails,
    pub public_key_algorithm_oid: String,
    pub signature_algorithm_oid: String,
    pub signature_algorithm: SignatureAlgorithmKind,
    /// `None` when the signature OID does not name a hash (bare rsaEncryption).
    pub hash_algorithm: Option<HashAlgorithm>,
    /// RSA exponent in decimal, or the curve name.
    pub curve_or_exponent: String,
    pub salt_length: Option<u32>,
    pub authority_key_identifier: Option<String>,
    pub subject_key_identifier: Option<String>,
    pub issuer_country_code: Option<String>,
    pub subject: String,
    pub issuer: String,
    pub bit_length: usize,
    #[serde(with = "serde_hex")]
    pub tbs_bytes: Vec<u8>,
    #[serde(with = "serde_hex")]
    pub signature: Vec<u8>,
    #[serde(with = "serde_hex")]
    pub raw: Vec<u8>,
    pub details: Option<CertificateDetails>,
}

impl CertificateData {
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.raw)
    }

    /// Offset of the public key bytes (modulus or x coordinate) inside the raw DER.
    pub fn public_key_offset(&self) -> Option<usize> {
        let needle = match &self.public_key {
            PublicKeyDetails::Rsa { modulus, .. } => modulus.as_slice(),
            PublicKeyDetails::Ec { x, .. } => x.as_slice(),
        };
        crate::hash::find_subarray(&self.raw, needle)
    }

    /// Number of public key bytes the DSC circuit extracts at [`Self::public_key_offset`].
    pub fn public_key_size(&self) -> usize {
        match &self.public_key {
            PublicKeyDetails::Rsa { modulus, .. } => modulus.len(),
            PublicKeyDetails::Ec { x, y, .. } => x.len() + y.len(),
        }
    }
}

/// SHA-256 of the DER encoding, lowercase hex.
pub fn fingerprint(der: &[u8]) -> String {
    hex::encode(digest(HashAlgorithm::Sha256, der))
}

/// Maps a certificate signature OID to its scheme and hash.
pub fn signature_algorithm_from_oid(
    oid: &str,
) -> Option<(SignatureAlgorithmKind, Option<HashAlgorithm>)> {
    use HashAlgorithm::*;
    use SignatureAlgorithmKind::*;
    let entry = match oid {
        "1.2.840.113549.1.1.5" => (Rsa, Some(Sha1)),
        "1.2.840.113549.1.1.14" => (Rsa, Some(Sha224)),
        "1.2.840.113549.1.1.11" => (Rsa, Some(Sha256)),
        "1.2.840.113549.1.1.12" => (Rsa, Some(Sha384)),
        "1.2.840.113549.1.1.13" => (Rsa, Some(Sha512)),
        OID_RSA_ENCRYPTION => (Rsa, None),
        OID_RSASSA_PSS => (RsaPss, None),
        "1.2.840.10045.4.1" => (Ecdsa, Some(Sha1)),
        "1.2.840.10045.4.3.1" => (Ecdsa, Some(Sha224)),
        "1.2.840.10045.4.3.2" => (Ecdsa, Some(Sha256)),
        "1.2.840.10045.4.3.3" => (Ecdsa, Some(Sha384)),
        "1.2.840.10045.4.3.4" => (Ecdsa, Some(Sha512)),
        _ => return None,
    };
    Some(entry)
}

fn strip_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

fn cert_error(reason: impl std::fmt::Display) -> ParseError {
    ParseError::Certificate(reason.to_string())
}

fn rsa_details(key: &RSAPublicKey) -> Result<PublicKeyDetails, ParseError> {
    Ok(PublicKeyDetails::Rsa {
        modulus: strip_leading_zeros(key.modulus),
        exponent: key.try_exponent().map_err(cert_error)?,
    })
}

fn public_key_details(spki: &SubjectPublicKeyInfo) -> Result<PublicKeyDetails, ParseError> {
    let algorithm = spki.algorithm.algorithm.to_id_string();
    match spki.parsed().map_err(cert_error)? {
        PublicKey::RSA(key) => rsa_details(&key),
        PublicKey::Unknown(bytes) if algorithm == OID_RSASSA_PSS => {
            let (_, key) = RSAPublicKey::from_der(bytes).map_err(cert_error)?;
            rsa_details(&key)
        }
        PublicKey::EC(point) => {
            let params = spki
                .algorithm
                .parameters
                .clone()
                .ok_or_else(|| cert_error("EC key without curve parameters"))?;
            let curve_oid = Oid::try_from(params)
                .map_err(|_| cert_error("EC key with explicit curve parameters"))?
                .to_id_string();
            let curve =
                Curve::from_oid(&curve_oid).ok_or_else(|| cert_error(format!("unknown curve {curve_oid}")))?;
            let data = point.data();
            let len = curve.coordinate_len();
            if data.len() != 1 + 2 * len || data[0] != 0x04 {
                return Err(cert_error("EC point is not an uncompressed point"));
            }
            Ok(PublicKeyDetails::Ec {
                curve,
                x: data[1..1 + len].to_vec(),
                y: data[1 + len..].to_vec(),
            })
        }
        _ => Err(cert_error(format!("unsupported public key algorithm {algorithm}"))),
    }
}

fn key_identifiers(x509: &X509Certificate) -> (Option<String>, Option<String>) {
    let mut authority = None;
    let mut subject = None;
    for ext in x509.extensions() {
        match ext.oid.to_id_string().as_str() {
            OID_AUTHORITY_KEY_ID => {
                if let Ok((_, aki)) = AuthorityKeyIdentifier::from_der(ext.value) {
                    authority = aki.key_identifier.map(|id| hex::encode(id.0));
                }
            }
            OID_SUBJECT_KEY_ID => {
                if let Ok((_, ski)) = KeyIdentifier::from_der(ext.value) {
                    subject = Some(hex::encode(ski.0));
                }
            }
            _ => {}
        }
    }
    (authority, subject)
}

fn to_der(input: &[u8]) -> Result<Vec<u8>, ParseError> {
    if input.starts_with(b"-----BEGIN") {
        let (_, pem) = x509_parser::pem::parse_x509_pem(input)
            .map_err(|e| cert_error(format!("invalid PEM: {e}")))?;
        Ok(pem.contents)
    } else {
        Ok(input.to_vec())
    }
}

fn build(der: &[u8], deep: bool) -> Result<CertificateData, ParseError> {
    let mut parser = X509CertificateParser::new().with_deep_parse_extensions(deep);
    let (_, x509) = parser.parse(der).map_err(cert_error)?;

    let public_key = public_key_details(x509.public_key())?;
    let signature_algorithm_oid = x509.signature_algorithm.algorithm.to_id_string();

    let (signature_algorithm, mut hash_algorithm) =
        match signature_algorithm_from_oid(&signature_algorithm_oid) {
            Some(entry) => entry,
            None => {
                debug!("Unknown signature OID {signature_algorithm_oid}, inferring from key");
                let kind = match public_key {
                    PublicKeyDetails::Rsa { .. } => SignatureAlgorithmKind::Rsa,
                    PublicKeyDetails::Ec { .. } => SignatureAlgorithmKind::Ecdsa,
                };
                (kind, None)
            }
        };

    let mut salt_length = None;
    if signature_algorithm == SignatureAlgorithmKind::RsaPss {
        if let Some(params) = x509.signature_algorithm.parameters.as_ref() {
            let pss = RsaSsaPssParams::try_from(params).map_err(cert_error)?;
            hash_algorithm = HashAlgorithm::from_oid(&pss.hash_algorithm_oid().to_id_string());
            salt_length = Some(pss.salt_length());
        }
    }

    let curve_or_exponent = match &public_key {
        PublicKeyDetails::Rsa { exponent, .. } => exponent.to_string(),
        PublicKeyDetails::Ec { curve, .. } => curve.to_string(),
    };

    let (authority_key_identifier, subject_key_identifier) = key_identifiers(&x509);
    let issuer_country_code = x509
        .issuer()
        .iter_country()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(str::to_string);

    let details = deep.then(|| CertificateDetails {
        serial_number: x509.raw_serial_as_string(),
        not_before: x509.validity().not_before.timestamp(),
        not_after: x509.validity().not_after.timestamp(),
        extension_oids: x509
            .extensions()
            .iter()
            .map(|ext| ext.oid.to_id_string())
            .collect(),
    });

    Ok(CertificateData {
        bit_length: public_key.bit_length(),
        public_key_algorithm_oid: x509.public_key().algorithm.algorithm.to_id_string(),
        public_key,
        signature_algorithm_oid,
        signature_algorithm,
        hash_algorithm,
        curve_or_exponent,
        salt_length,
        authority_key_identifier,
        subject_key_identifier,
        issuer_country_code,
        subject: x509.subject().to_string(),
        issuer: x509.issuer().to_string(),
        tbs_bytes: x509.tbs_certificate.as_ref().to_vec(),
        signature: x509.signature_value.data.to_vec(),
        raw: der.to_vec(),
        details,
    })
}

/// Parses a DER or PEM certificate, including validity, serial and extension list.
///
/// # Errors
///
/// Returns [`ParseError::Certificate`] for malformed input, unknown curves or key types
/// other than RSA and EC.
pub fn parse_certificate(input: &[u8]) -> Result<CertificateData, ParseError> {
    build(&to_der(input)?, true)
}

/// Like [`parse_certificate`] but skips the deep extension walk.
///
/// Key identifiers are still read.
pub fn parse_certificate_simple(input: &[u8]) -> Result<CertificateData, ParseError> {
    build(&to_der(input)?, false)
}

struct CscaEntry {
    subject: String,
    der: Vec<u8>,
}

/// Trusted country signing certificates indexed by subject key identifier.
#[derive(Default)]
pub struct CscaStore {
    by_key_id: HashMap<String, CscaEntry>,
    without_key_id: Vec<CscaEntry>,
}

impl CscaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a certificate and returns its fingerprint.
    pub fn insert(&mut self, input: &[u8]) -> Result<String, ParseError> {
        let cert = parse_certificate_simple(input)?;
        let entry = CscaEntry {
            subject: cert.subject.clone(),
            der: cert.raw.clone(),
        };
        match cert.subject_key_identifier {
            Some(ref ski) => {
                self.by_key_id.insert(ski.clone(), entry);
            }
            None => self.without_key_id.push(entry),
        }
        Ok(cert.fingerprint())
    }

    /// Loads every `.pem`, `.crt`, `.cer` and `.der` file in a directory.
    ///
    /// Files that fail to parse are skipped with a debug log.
    pub fn load_from_dir(dir: &Path) -> Result<Self, crate::error::WitnessError> {
        let mut store = CscaStore::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let known = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| matches!(e.to_lowercase().as_str(), "pem" | "crt" | "cer" | "der"))
                .unwrap_or(false);
            if !known {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            if let Err(e) = store.insert(&bytes) {
                debug!("Skipping {}: {e}", path.display());
            }
        }
        info!("Loaded {} CSCA certificates from {}", store.len(), dir.display());
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.by_key_id.len() + self.without_key_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, subject_key_identifier: &str) -> Option<&[u8]> {
        self.by_key_id
            .get(&subject_key_identifier.to_lowercase())
            .map(|e| e.der.as_slice())
    }

    /// DER of the CSCA that issued `dsc`: by key identifier, else by issuer name.
    pub fn find_issuer(&self, dsc: &CertificateData) -> Option<&[u8]> {
        if let Some(der) = dsc
            .authority_key_identifier
            .as_deref()
            .and_then(|aki| self.get(aki))
        {
            return Some(der);
        }
        self.by_key_id
            .values()
            .chain(self.without_key_id.iter())
            .find(|e| e.subject == dsc.issuer)
            .map(|e| e.der.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    const CSCA_PEM: &[u8] = include_bytes!("../tests/fixtures/csca_rsa2048.pem");
    const DSC_RSA_PEM: &[u8] = include_bytes!("../tests/fixtures/dsc_rsa2048.pem");
    const DSC_P256_PEM: &[u8] = include_bytes!("../tests/fixtures/dsc_p256.pem");

    const CSCA_SKI: &str = "0f96583ffb8d31f3332ebdd719a9b96d6d1f647e";

    #[test]
    fn test_parse_rsa_certificate_fields() {
        let dsc = parse_certificate(DSC_RSA_PEM).unwrap();
        match &dsc.public_key {
            PublicKeyDetails::Rsa { modulus, exponent } => {
                assert_eq!(*exponent, 65537);
                assert_eq!(modulus.len(), 256);
            }
            other => panic!("expected an RSA key, got {other:?}"),
        }
        assert_eq!(dsc.bit_length, 2048);
        assert_eq!(dsc.curve_or_exponent, "65537");
        assert_eq!(dsc.signature_algorithm, SignatureAlgorithmKind::Rsa);
        assert_eq!(dsc.hash_algorithm, Some(HashAlgorithm::Sha256));
        assert_eq!(dsc.salt_length, None);
        assert_eq!(dsc.issuer_country_code.as_deref(), Some("UT"));
        assert_eq!(dsc.authority_key_identifier.as_deref(), Some(CSCA_SKI));
        assert_eq!(
            dsc.subject_key_identifier.as_deref(),
            Some("e0c718671a8b03db6669335ae7d0a44d398fd907")
        );
        assert!(dsc.subject.contains("Utopia DS dsc_rsa2048"));
        assert!(dsc.issuer.contains("Utopia CSCA"));
        let details = dsc.details.as_ref().unwrap();
        assert!(details.not_before < details.not_after);
    }

    #[test]
    fn test_parse_ec_certificate_fields() {
        let dsc = parse_certificate(DSC_P256_PEM).unwrap();
        match &dsc.public_key {
            PublicKeyDetails::Ec { curve, x, y } => {
                assert_eq!(*curve, Curve::Secp256r1);
                assert_eq!(x.len(), 32);
                assert_eq!(y.len(), 32);
            }
            other => panic!("expected an EC key, got {other:?}"),
        }
        assert_eq!(dsc.bit_length, 256);
        assert_eq!(dsc.curve_or_exponent, "secp256r1");
        // signed by the RSA CSCA
        assert_eq!(dsc.signature_algorithm, SignatureAlgorithmKind::Rsa);
        assert_eq!(dsc.authority_key_identifier.as_deref(), Some(CSCA_SKI));
        assert_eq!(
            dsc.subject_key_identifier.as_deref(),
            Some("09b010d00a09cec2fe90a4e3f35b4b38ae201087")
        );
        assert_eq!(dsc.public_key_size(), 64);
        let offset = dsc.public_key_offset().unwrap();
        if let PublicKeyDetails::Ec { x, .. } = &dsc.public_key {
            assert_eq!(&dsc.raw[offset..offset + 32], x.as_slice());
        }
    }

    #[test]
    fn test_simple_mode_keeps_key_identifiers() {
        let full = parse_certificate(CSCA_PEM).unwrap();
        let simple = parse_certificate_simple(CSCA_PEM).unwrap();
        assert!(simple.details.is_none());
        assert_eq!(simple.subject_key_identifier.as_deref(), Some(CSCA_SKI));
        assert_eq!(simple.public_key, full.public_key);
        assert_eq!(simple.fingerprint(), full.fingerprint());
    }

    #[test]
    fn test_store_finds_issuer_by_key_identifier() {
        let mut store = CscaStore::new();
        store.insert(CSCA_PEM).unwrap();
        let dsc = parse_certificate(DSC_RSA_PEM).unwrap();
        let csca = parse_certificate(CSCA_PEM).unwrap();
        assert_eq!(store.find_issuer(&dsc), Some(csca.raw.as_slice()));
        assert_eq!(store.find_issuer(&csca), Some(csca.raw.as_slice()));
    }

    #[test]
    fn test_curve_aliases() {
        assert_eq!(Curve::from_name("P-256").unwrap(), Curve::Secp256r1);
        assert_eq!(Curve::from_name("prime256v1").unwrap(), Curve::Secp256r1);
        assert_eq!(Curve::from_name("secp384r1").unwrap(), Curve::Secp384r1);
        assert_eq!(
            Curve::from_name("brainpoolP512r1").unwrap(),
            Curve::BrainpoolP512r1
        );
        assert!(Curve::from_name("ed25519").is_err());
        assert_eq!(Curve::Secp521r1.coordinate_len(), 66);
        assert_eq!(Curve::BrainpoolP256r1.to_string(), "brainpoolP256r1");
    }

    #[test]
    fn test_curve_oids_are_distinct() {
        let oids = [
            "1.3.132.0.33",
            "1.2.840.10045.3.1.7",
            "1.3.132.0.34",
            "1.3.132.0.35",
            "1.3.36.3.3.2.8.1.1.5",
            "1.3.36.3.3.2.8.1.1.7",
            "1.3.36.3.3.2.8.1.1.11",
            "1.3.36.3.3.2.8.1.1.13",
        ];
        let curves: Vec<Curve> = oids.iter().filter_map(|o| Curve::from_oid(o)).collect();
        assert_eq!(curves, Curve::iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_signature_oid_table() {
        assert_eq!(
            signature_algorithm_from_oid("1.2.840.113549.1.1.11"),
            Some((SignatureAlgorithmKind::Rsa, Some(HashAlgorithm::Sha256)))
        );
        assert_eq!(
            signature_algorithm_from_oid("1.2.840.10045.4.3.3"),
            Some((SignatureAlgorithmKind::Ecdsa, Some(HashAlgorithm::Sha384)))
        );
        assert_eq!(
            signature_algorithm_from_oid(OID_RSA_ENCRYPTION),
            Some((SignatureAlgorithmKind::Rsa, None))
        );
        assert_eq!(signature_algorithm_from_oid("1.2.3"), None);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_certificate(b"not a certificate").is_err());
        assert!(parse_certificate(b"-----BEGIN CERTIFICATE-----\n!!\n-----END CERTIFICATE-----").is_err());
    }

    #[test]
    fn test_public_key_bit_length() {
        let key = PublicKeyDetails::Rsa {
            modulus: vec![0x80, 0, 0],
            exponent: 65537,
        };
        assert_eq!(key.bit_length(), 24);
        assert!(key.sec1_point().is_none());
    }
}
