//! Registration commitments and nullifiers.

use crate::document::DocumentRecord;
use crate::error::{CryptoError, Result, UnsupportedAlgorithm};
use crate::field::FieldElement;
use crate::hash::{digest, pack_bytes_and_poseidon, HashAlgorithm};
use crate::metadata::PassportMetadata;
use crate::poseidon::poseidon;
use log::debug;

/// Hash function the document used over eContent, as detected in its metadata.
pub fn e_content_hash_function(metadata: &PassportMetadata) -> Result<HashAlgorithm> {
    metadata
        .e_content_hash_function
        .ok_or_else(|| UnsupportedAlgorithm::Hash("eContent hash function not detected".to_string()).into())
}

/// `pack_bytes_and_poseidon(hash(eContent))`.
pub fn e_content_packed_hash(
    document: &DocumentRecord,
    hash: HashAlgorithm,
) -> std::result::Result<FieldElement, CryptoError> {
    pack_bytes_and_poseidon(&digest(hash, &document.e_content))
}

/// `poseidon5(secret, attestation_id, packed dg1, packed eContent digest, dsc_tree_leaf)`.
pub fn generate_commitment(
    secret: FieldElement,
    attestation_id: u64,
    document: &DocumentRecord,
    metadata: &PassportMetadata,
    dsc_tree_leaf: FieldElement,
) -> Result<FieldElement> {
    let dg1_packed = pack_bytes_and_poseidon(&document.dg1()?)?;
    let e_content_packed =
        e_content_packed_hash(document, e_content_hash_function(metadata)?)?;
    let commitment = poseidon([
        secret,
        FieldElement::from(attestation_id),
        dg1_packed,
        e_content_packed,
        dsc_tree_leaf,
    ])?;
    debug!("Commitment for attestation {attestation_id}: {commitment}");
    Ok(commitment)
}

/// `poseidon2(secret, attestation_id)`.
pub fn generate_nullifier(
    secret: FieldElement,
    attestation_id: u64,
) -> std::result::Result<FieldElement, CryptoError> {
    poseidon([secret, FieldElement::from(attestation_id)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentCategory;
    use crate::mock::SAMPLE_TD3_MRZ;
    use crate::mrz::normalize_mrz;
    use std::collections::BTreeMap;

    fn record() -> DocumentRecord {
        DocumentRecord {
            document_category: DocumentCategory::Passport,
            mrz: normalize_mrz(SAMPLE_TD3_MRZ),
            data_group_hashes: BTreeMap::new(),
            e_content: b"econtent".to_vec(),
            signed_attributes: None,
            signature: vec![],
            signer_certificate: vec![],
            mock: true,
        }
    }

    fn metadata(hash: HashAlgorithm) -> PassportMetadata {
        PassportMetadata {
            data_groups: vec![1],
            dg1_size: 93,
            dg1_hash_function: Some(hash),
            dg1_hash_offset: Some(0),
            e_content_size: 8,
            e_content_hash_function: Some(hash),
            e_content_hash_offset: Some(0),
            signed_attr_size: 8,
            signed_attr_hash_function: Some(hash),
            signature_algorithm: crate::certificate::SignatureAlgorithmKind::Rsa,
            curve_or_exponent: "65537".to_string(),
            salt_length: None,
            signature_algorithm_bits: 2048,
            csca_found: false,
            csca_hash_function: None,
            csca_signature_algorithm: None,
            csca_curve_or_exponent: None,
            csca_salt_length: None,
            csca_signature_algorithm_bits: None,
            country_code: "UTO".to_string(),
        }
    }

    #[test]
    fn test_nullifier_vector() {
        assert_eq!(
            generate_nullifier(123u64.into(), 1).unwrap().to_string(),
            "1825367215715080944898610730329185918884251567885580835209236772238472514878"
        );
    }

    #[test]
    fn test_commitment_is_deterministic_and_sensitive() {
        let doc = record();
        let m = metadata(HashAlgorithm::Sha256);
        let leaf = FieldElement::from(7u64);
        let c1 = generate_commitment(1u64.into(), 1, &doc, &m, leaf).unwrap();
        let c2 = generate_commitment(1u64.into(), 1, &doc, &m, leaf).unwrap();
        assert_eq!(c1, c2);

        assert_ne!(c1, generate_commitment(2u64.into(), 1, &doc, &m, leaf).unwrap());
        assert_ne!(c1, generate_commitment(1u64.into(), 2, &doc, &m, leaf).unwrap());
        assert_ne!(c1, generate_commitment(1u64.into(), 1, &doc, &m, 8u64.into()).unwrap());
        let sha1 = metadata(HashAlgorithm::Sha1);
        assert_ne!(c1, generate_commitment(1u64.into(), 1, &doc, &sha1, leaf).unwrap());

        let mut other = doc.clone();
        other.e_content.push(0);
        assert_ne!(c1, generate_commitment(1u64.into(), 1, &other, &m, leaf).unwrap());
    }

    #[test]
    fn test_commitment_needs_econtent_hash() {
        let mut m = metadata(HashAlgorithm::Sha256);
        m.e_content_hash_function = None;
        assert!(generate_commitment(1u64.into(), 1, &record(), &m, 0u64.into()).is_err());
    }
}
