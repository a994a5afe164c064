//! Circuit selection. Every circuit name the pipeline emits is produced here.

use crate::certificate::{
    CertificateData, Curve, PublicKeyDetails, SignatureAlgorithmKind, OID_RSASSA_PSS,
};
use crate::document::DocumentCategory;
use crate::error::UnsupportedAlgorithm;
use crate::hash::{HashAlgorithm, DOCUMENT_HASHES};
use crate::metadata::PassportMetadata;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoEnumIterator};

pub const RSA_EXPONENTS: [&str; 2] = ["65537", "3"];
pub const RSA_BITS: [usize; 3] = [2048, 3072, 4096];
pub const PSS_SALT_LENGTHS: [usize; 3] = [32, 48, 64];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CircuitKind {
    Register,
    Dsc,
    VcAndDisclose,
    Ofac,
}

/// How a key signs: the part of a circuit name after the hash functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureDescriptor {
    pub kind: SignatureAlgorithmKind,
    pub curve_or_exponent: String,
    pub salt_length: Option<usize>,
    pub bits: usize,
}

impl SignatureDescriptor {
    /// The DSC key as it signs the document's signed attributes.
    pub fn for_document(metadata: &PassportMetadata) -> Self {
        SignatureDescriptor {
            kind: metadata.signature_algorithm,
            curve_or_exponent: metadata.curve_or_exponent.clone(),
            salt_length: metadata.salt_length,
            bits: metadata.signature_algorithm_bits,
        }
    }

    /// The CSCA key as it signs the DSC, when a CSCA was found.
    pub fn for_csca(metadata: &PassportMetadata) -> Option<Self> {
        if !metadata.csca_found {
            return None;
        }
        Some(SignatureDescriptor {
            kind: metadata.csca_signature_algorithm?,
            curve_or_exponent: metadata.csca_curve_or_exponent.clone()?,
            salt_length: metadata.csca_salt_length,
            bits: metadata.csca_signature_algorithm_bits?,
        })
    }

    /// The scheme a certificate's own key is registered under.
    ///
    /// RSA keys count as PSS when the key is PSS-restricted or the certificate is
    /// self-signed with PSS.
    pub fn for_certificate(cert: &CertificateData) -> Self {
        let kind = match &cert.public_key {
            PublicKeyDetails::Ec { .. } => SignatureAlgorithmKind::Ecdsa,
            PublicKeyDetails::Rsa { .. }
                if cert.public_key_algorithm_oid == OID_RSASSA_PSS
                    || (cert.signature_algorithm == SignatureAlgorithmKind::RsaPss
                        && cert.subject == cert.issuer) =>
            {
                SignatureAlgorithmKind::RsaPss
            }
            PublicKeyDetails::Rsa { .. } => SignatureAlgorithmKind::Rsa,
        };
        let salt_length = match kind {
            SignatureAlgorithmKind::RsaPss => cert.salt_length.map(|s| s as usize),
            _ => None,
        };
        SignatureDescriptor {
            kind,
            curve_or_exponent: cert.curve_or_exponent.clone(),
            salt_length,
            bits: cert.bit_length,
        }
    }

    fn unsupported(&self) -> UnsupportedAlgorithm {
        UnsupportedAlgorithm::Signature(format!(
            "{} {} {} bits salt {:?}",
            self.kind, self.curve_or_exponent, self.bits, self.salt_length
        ))
    }

    /// Checks the descriptor against the supported matrix and returns the name suffix.
    pub fn circuit_suffix(&self) -> Result<String, UnsupportedAlgorithm> {
        match self.kind {
            SignatureAlgorithmKind::Rsa => {
                self.check_rsa()?;
                Ok(format!("rsa_{}_4096", self.curve_or_exponent))
            }
            SignatureAlgorithmKind::RsaPss => {
                self.check_rsa()?;
                let salt = self
                    .salt_length
                    .filter(|s| PSS_SALT_LENGTHS.contains(s))
                    .ok_or_else(|| self.unsupported())?;
                Ok(format!(
                    "rsapss_{}_{}_{}",
                    self.curve_or_exponent, salt, self.bits
                ))
            }
            SignatureAlgorithmKind::Ecdsa => {
                let curve = Curve::from_name(&self.curve_or_exponent)?;
                Ok(format!("ecdsa_{curve}"))
            }
        }
    }

    fn check_rsa(&self) -> Result<(), UnsupportedAlgorithm> {
        if RSA_EXPONENTS.contains(&self.curve_or_exponent.as_str()) && RSA_BITS.contains(&self.bits)
        {
            Ok(())
        } else {
            Err(self.unsupported())
        }
    }
}

/// Every supported signature configuration, in index order.
pub fn supported_signature_descriptors() -> Vec<SignatureDescriptor> {
    let mut all = Vec::new();
    for exponent in RSA_EXPONENTS {
        for bits in RSA_BITS {
            all.push(SignatureDescriptor {
                kind: SignatureAlgorithmKind::Rsa,
                curve_or_exponent: exponent.to_string(),
                salt_length: None,
                bits,
            });
        }
    }
    for exponent in RSA_EXPONENTS {
        for salt in PSS_SALT_LENGTHS {
            for bits in RSA_BITS {
                all.push(SignatureDescriptor {
                    kind: SignatureAlgorithmKind::RsaPss,
                    curve_or_exponent: exponent.to_string(),
                    salt_length: Some(salt),
                    bits,
                });
            }
        }
    }
    for curve in Curve::iter() {
        all.push(SignatureDescriptor {
            kind: SignatureAlgorithmKind::Ecdsa,
            curve_or_exponent: curve.to_string(),
            salt_length: None,
            bits: curve.bits(),
        });
    }
    all
}

/// 1-based position of a descriptor in [`supported_signature_descriptors`].
///
/// RSA PKCS#1 keys of every size share the 4096-bit circuit but keep distinct
/// indices, so the index distinguishes key sizes the circuit name does not.
pub fn signature_algorithm_index(
    descriptor: &SignatureDescriptor,
) -> Result<u64, UnsupportedAlgorithm> {
    descriptor.circuit_suffix()?;
    let curve = match descriptor.kind {
        SignatureAlgorithmKind::Ecdsa => Some(Curve::from_name(&descriptor.curve_or_exponent)?),
        _ => None,
    };
    supported_signature_descriptors()
        .iter()
        .position(|candidate| match curve {
            Some(curve) => candidate.kind == descriptor.kind && candidate.curve_or_exponent == curve.to_string(),
            None => candidate == descriptor,
        })
        .map(|p| p as u64 + 1)
        .ok_or_else(|| descriptor.unsupported())
}

fn hash_name(
    hash: Option<HashAlgorithm>,
    what: &str,
) -> Result<HashAlgorithm, UnsupportedAlgorithm> {
    match hash {
        Some(h) if DOCUMENT_HASHES.contains(&h) => Ok(h),
        Some(h) => Err(UnsupportedAlgorithm::Hash(format!("{what}: {h}"))),
        None => Err(UnsupportedAlgorithm::Hash(format!("{what}: not detected"))),
    }
}

/// `base` for passports, `base_id` for id cards.
pub(crate) fn category_circuit_name(base: &str, category: DocumentCategory) -> Result<String, UnsupportedAlgorithm> {
    match category {
        DocumentCategory::Passport => Ok(base.to_string()),
        DocumentCategory::IdCard => Ok(format!("{base}_id")),
        DocumentCategory::Aadhaar => Err(UnsupportedAlgorithm::Circuit(format!(
            "no {base} circuit for {category} documents"
        ))),
    }
}

/// Name of the circuit that proves `kind` for a document with this metadata.
///
/// # Errors
///
/// Any hash, signature or curve outside the supported matrix, a missing CSCA for the
/// DSC circuit, and categories without circuits.
pub fn get_circuit_name_from_passport_data(
    category: DocumentCategory,
    kind: CircuitKind,
    metadata: &PassportMetadata,
) -> Result<String, UnsupportedAlgorithm> {
    match kind {
        CircuitKind::Register => {
            let dg = hash_name(metadata.dg1_hash_function, "dg1")?;
            let ec = hash_name(metadata.e_content_hash_function, "eContent")?;
            let sa = hash_name(metadata.signed_attr_hash_function, "signed attributes")?;
            let sig = SignatureDescriptor::for_document(metadata).circuit_suffix()?;
            Ok(format!("{}_{dg}_{ec}_{sa}_{sig}", category_circuit_name("register", category)?))
        }
        CircuitKind::Dsc => {
            let descriptor = SignatureDescriptor::for_csca(metadata).ok_or_else(|| {
                UnsupportedAlgorithm::Circuit("dsc circuit requires a known CSCA".to_string())
            })?;
            let hash = hash_name(metadata.csca_hash_function, "dsc signature")?;
            let sig = descriptor.circuit_suffix()?;
            Ok(format!("{}_{hash}_{sig}", category_circuit_name("dsc", category)?))
        }
        CircuitKind::VcAndDisclose => category_circuit_name("vc_and_disclose", category),
        CircuitKind::Ofac => category_circuit_name("ofac", category),
    }
}
