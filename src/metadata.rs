//! Passport metadata: which hash and signature algorithms a document actually uses,
//! found by locating digests inside the signed structures and by trial verification.

use crate::certificate::{CertificateData, PublicKeyDetails, SignatureAlgorithmKind};
use crate::document::DocumentRecord;
use crate::error::{Result, WitnessError};
use crate::hash::{digest, find_subarray, HashAlgorithm, DOCUMENT_HASHES};
use crate::signature::{brute_force_signature_algorithm, declared_scheme, verify_certificate_signature, SignatureScheme};
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassportMetadata {
    pub data_groups: Vec<u8>,
    pub dg1_size: usize,
    pub dg1_hash_function: Option<HashAlgorithm>,
    /// Offset of the DG1 digest inside eContent.
    pub dg1_hash_offset: Option<usize>,
    pub e_content_size: usize,
    pub e_content_hash_function: Option<HashAlgorithm>,
    /// Offset of the eContent digest inside the signed attributes.
    pub e_content_hash_offset: Option<usize>,
    pub signed_attr_size: usize,
    pub signed_attr_hash_function: Option<HashAlgorithm>,
    pub signature_algorithm: SignatureAlgorithmKind,
    pub curve_or_exponent: String,
    pub salt_length: Option<usize>,
    pub signature_algorithm_bits: usize,
    pub csca_found: bool,
    /// Hash the CSCA used to sign the DSC.
    pub csca_hash_function: Option<HashAlgorithm>,
    pub csca_signature_algorithm: Option<SignatureAlgorithmKind>,
    pub csca_curve_or_exponent: Option<String>,
    pub csca_salt_length: Option<usize>,
    pub csca_signature_algorithm_bits: Option<usize>,
    pub country_code: String,
}

/// First algorithm whose digest of `data` appears in `container`, with its offset.
pub fn find_hash_in(data: &[u8], container: &[u8]) -> Option<(HashAlgorithm, usize)> {
    DOCUMENT_HASHES.iter().find_map(|alg| {
        find_subarray(container, &digest(*alg, data)).map(|offset| (*alg, offset))
    })
}

/// Unsupported curves cannot be trial-verified; that is a gap in detection, not a
/// failure of the document.
fn tolerate_unsupported<T>(result: Result<Option<T>>) -> Result<Option<T>> {
    match result {
        Err(WitnessError::Unsupported(e)) => {
            debug!("Skipping detection: {e}");
            Ok(None)
        }
        other => other,
    }
}

/// Derives [`PassportMetadata`] for a document, its DSC and, when known, its CSCA.
///
/// # Errors
///
/// Fails on malformed MRZ or key material, and when a supplied CSCA does not verify
/// the DSC.
pub fn derive_passport_metadata(
    document: &DocumentRecord,
    dsc: &CertificateData,
    csca: Option<&CertificateData>,
) -> Result<PassportMetadata> {
    let dg1 = document.dg1()?;
    let mrz_info = document.mrz_info()?;

    let dg1_match = find_hash_in(&dg1, &document.e_content);
    let e_content_match = document
        .signed_attributes
        .as_deref()
        .and_then(|sa| find_hash_in(&document.e_content, sa));

    let scheme = tolerate_unsupported(brute_force_signature_algorithm(
        &dsc.public_key,
        document.signed_bytes(),
        &document.signature,
    ))?;
    debug!("Document signature scheme: {scheme:?}");

    let signature_algorithm = match (&scheme, &dsc.public_key) {
        (Some(s), _) => s.kind(),
        (None, PublicKeyDetails::Ec { .. }) => SignatureAlgorithmKind::Ecdsa,
        (None, PublicKeyDetails::Rsa { .. }) => SignatureAlgorithmKind::Rsa,
    };

    let mut metadata = PassportMetadata {
        data_groups: document.data_groups(),
        dg1_size: dg1.len(),
        dg1_hash_function: dg1_match.map(|(alg, _)| alg),
        dg1_hash_offset: dg1_match.map(|(_, offset)| offset),
        e_content_size: document.e_content.len(),
        e_content_hash_function: e_content_match.map(|(alg, _)| alg),
        e_content_hash_offset: e_content_match.map(|(_, offset)| offset),
        signed_attr_size: document.signed_bytes().len(),
        signed_attr_hash_function: scheme.map(|s| s.hash()),
        signature_algorithm,
        curve_or_exponent: dsc.curve_or_exponent.clone(),
        salt_length: scheme.and_then(|s| s.salt_length()),
        signature_algorithm_bits: dsc.bit_length,
        csca_found: false,
        csca_hash_function: None,
        csca_signature_algorithm: None,
        csca_curve_or_exponent: None,
        csca_salt_length: None,
        csca_signature_algorithm_bits: None,
        country_code: if mrz_info.issuing_country.is_empty() {
            dsc.issuer_country_code.clone().unwrap_or_default()
        } else {
            mrz_info.issuing_country
        },
    };

    if let Some(csca) = csca {
        let chain = tolerate_unsupported(verify_certificate_signature(dsc, csca).map(Some))?;
        let csca_scheme: Option<SignatureScheme> = chain.or_else(|| declared_scheme(dsc));
        metadata.csca_found = true;
        metadata.csca_hash_function = csca_scheme.map(|s| s.hash()).or(dsc.hash_algorithm);
        metadata.csca_signature_algorithm = Some(
            csca_scheme
                .map(|s| s.kind())
                .unwrap_or(dsc.signature_algorithm),
        );
        metadata.csca_curve_or_exponent = Some(csca.curve_or_exponent.clone());
        metadata.csca_salt_length = csca_scheme.and_then(|s| s.salt_length());
        metadata.csca_signature_algorithm_bits = Some(csca.bit_length);
    }

    info!(
        "Derived metadata for {} document: dg1={:?} eContent={:?} signedAttr={:?} csca_found={}",
        metadata.country_code,
        metadata.dg1_hash_function,
        metadata.e_content_hash_function,
        metadata.signed_attr_hash_function,
        metadata.csca_found
    );
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_hash_in_reports_first_match() {
        let data = b"dg1 bytes";
        let sha1 = digest(HashAlgorithm::Sha1, data);
        let sha256 = digest(HashAlgorithm::Sha256, data);
        let mut container = vec![0u8; 7];
        container.extend(&sha256);
        container.extend(&sha1);
        assert_eq!(
            find_hash_in(data, &container),
            Some((HashAlgorithm::Sha1, 7 + sha256.len()))
        );
        assert_eq!(find_hash_in(b"other", &container), None);
    }
}
