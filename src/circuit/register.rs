//! Inputs for the register circuits, which prove a document was signed by a registered
//! DSC and output the holder's commitment.
//!
//! The id-card shape takes the same signals; only its DG1 is longer (TD1 MRZ) and the
//! circuit name carries the `_id` suffix.

use super::chunking::{chunk_public_key, chunk_signature};
use super::routing::{get_circuit_name_from_passport_data, CircuitKind};
use super::sha_pad::{max_padded_econtent_len, max_padded_signed_attr_len, sha_pad};
use super::{inclusion_path, CircuitInputs, CircuitParams};
use crate::certificate::CertificateData;
use crate::document::DocumentRecord;
use crate::error::{Result, UnsupportedAlgorithm, ValidationMismatch};
use crate::field::FieldElement;
use crate::hash::HashAlgorithm;
use crate::leaves::{get_leaf_csca_tree, get_leaf_dsc_tree};
use crate::merkle::MerkleTree;
use crate::metadata::PassportMetadata;
use log::debug;

/// Everything the register circuit binds together.
#[derive(Debug, Clone, Copy)]
pub struct RegisterArtifact<'a> {
    pub document: &'a DocumentRecord,
    pub metadata: &'a PassportMetadata,
    pub dsc: &'a CertificateData,
    /// Issuer of `dsc`. The DSC registry leaf is bound to it.
    pub csca: &'a CertificateData,
    pub secret: FieldElement,
}

fn required_hash(hash: Option<HashAlgorithm>, field: &str) -> Result<HashAlgorithm> {
    hash.ok_or_else(|| UnsupportedAlgorithm::Hash(format!("{field} hash function not detected")).into())
}

/// Builds the `register` (or `register_id`) inputs against a DSC registry snapshot.
///
/// # Errors
///
/// Undetected hash functions or offsets, messages too long for the circuit, key
/// material that does not chunk, and a DSC leaf missing from `dsc_tree`.
pub fn generate_circuit_inputs_register(
    artifact: RegisterArtifact<'_>,
    dsc_tree: &MerkleTree,
    params: &CircuitParams,
) -> Result<CircuitInputs> {
    let RegisterArtifact {
        document,
        metadata,
        dsc,
        csca,
        secret,
    } = artifact;
    let name = get_circuit_name_from_passport_data(
        document.document_category,
        CircuitKind::Register,
        metadata,
    )?;

    let dg1_hash = required_hash(metadata.dg1_hash_function, "dg1")?;
    let e_content_hash = required_hash(metadata.e_content_hash_function, "eContent")?;
    let signed_attr_hash = required_hash(metadata.signed_attr_hash_function, "signed attributes")?;
    let dg1_hash_offset = metadata.dg1_hash_offset.ok_or(ValidationMismatch::Dg1Hash)?;
    let e_content_hash_offset = metadata
        .e_content_hash_offset
        .ok_or(ValidationMismatch::EContentHash)?;

    let (e_content, e_content_len) = sha_pad(
        e_content_hash,
        &document.e_content,
        max_padded_econtent_len(dg1_hash)?,
    )?;
    let (signed_attr, signed_attr_len) = sha_pad(
        signed_attr_hash,
        document.signed_bytes(),
        max_padded_signed_attr_len(e_content_hash)?,
    )?;

    let kind = metadata.signature_algorithm;
    let pub_key = chunk_public_key(&dsc.public_key, kind)?;
    let signature = chunk_signature(&dsc.public_key, kind, &document.signature)?;

    let dsc_leaf = get_leaf_dsc_tree(dsc, csca)?;
    let (proof, path) = inclusion_path(dsc_tree, &dsc_leaf, params.dsc_tree_depth, "dsc leaf")?;

    let mut inputs = CircuitInputs::new(name);
    inputs
        .push("dg1", document.dg1()?.as_slice())
        .push("dg1_hash_offset", dg1_hash_offset)
        .push("eContent", e_content.as_slice())
        .push("eContent_padded_length", e_content_len)
        .push("signed_attr", signed_attr.as_slice())
        .push("signed_attr_padded_length", signed_attr_len)
        .push("signed_attr_econtent_hash_offset", e_content_hash_offset)
        .push("pubKey_dsc", pub_key)
        .push("signature_passport", signature)
        .push("merkle_root", proof.root)
        .push("leaf_depth", path.leaf_depth)
        .push("path", path.path)
        .push("siblings", path.siblings)
        .push("csca_tree_leaf", get_leaf_csca_tree(csca)?)
        .push("secret", secret);

    debug!(
        "Built {} inputs for {} (eContent {e_content_len} of {}, signed attributes {signed_attr_len} of {})",
        inputs.len(),
        inputs.circuit_name,
        e_content.len(),
        signed_attr.len()
    );
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::parse_certificate;
    use crate::circuit::CircuitValue;
    use crate::document::DocumentCategory;
    use crate::error::{TreeError, WitnessError};
    use crate::metadata::derive_passport_metadata;
    use crate::mock::{build_mock_document, MockHashes, MockSigner, SAMPLE_TD3_MRZ};

    const CSCA_PEM: &[u8] = include_bytes!("../../tests/fixtures/csca_rsa2048.pem");
    const DSC_PEM: &[u8] = include_bytes!("../../tests/fixtures/dsc_rsa2048.pem");
    const DSC_KEY: &[u8] = include_bytes!("../../tests/fixtures/dsc_rsa2048_key.pem");

    struct Fixture {
        document: DocumentRecord,
        metadata: PassportMetadata,
        dsc: CertificateData,
        csca: CertificateData,
    }

    fn fixture() -> Fixture {
        let dsc = parse_certificate(DSC_PEM).unwrap();
        let csca = parse_certificate(CSCA_PEM).unwrap();
        let signer = MockSigner::from_pkcs8(DSC_KEY).unwrap();
        let document = build_mock_document(
            SAMPLE_TD3_MRZ,
            DocumentCategory::Passport,
            MockHashes::default(),
            &signer,
            &dsc.raw,
        )
        .unwrap();
        let metadata = derive_passport_metadata(&document, &dsc, Some(&csca)).unwrap();
        Fixture {
            document,
            metadata,
            dsc,
            csca,
        }
    }

    fn array_len(inputs: &CircuitInputs, name: &str) -> usize {
        match inputs.get(name) {
            Some(CircuitValue::Array(values)) => values.len(),
            other => panic!("{name} is not an array: {other:?}"),
        }
    }

    #[test]
    fn test_register_inputs_shape() {
        let f = fixture();
        let leaf = get_leaf_dsc_tree(&f.dsc, &f.csca).unwrap();
        let tree = MerkleTree::new(vec![1u64.into(), leaf, 3u64.into()]).unwrap();
        let params = CircuitParams::default();
        let artifact = RegisterArtifact {
            document: &f.document,
            metadata: &f.metadata,
            dsc: &f.dsc,
            csca: &f.csca,
            secret: 42u64.into(),
        };

        let inputs = generate_circuit_inputs_register(artifact, &tree, &params).unwrap();
        assert_eq!(inputs.circuit_name, "register_sha256_sha256_sha256_rsa_65537_4096");
        assert_eq!(
            inputs.names().collect::<Vec<_>>(),
            vec![
                "dg1",
                "dg1_hash_offset",
                "eContent",
                "eContent_padded_length",
                "signed_attr",
                "signed_attr_padded_length",
                "signed_attr_econtent_hash_offset",
                "pubKey_dsc",
                "signature_passport",
                "merkle_root",
                "leaf_depth",
                "path",
                "siblings",
                "csca_tree_leaf",
                "secret",
            ]
        );
        assert_eq!(array_len(&inputs, "dg1"), 93);
        assert_eq!(array_len(&inputs, "eContent"), 512);
        assert_eq!(array_len(&inputs, "signed_attr"), 128);
        assert_eq!(array_len(&inputs, "pubKey_dsc"), 35);
        assert_eq!(array_len(&inputs, "signature_passport"), 35);
        assert_eq!(array_len(&inputs, "siblings"), params.dsc_tree_depth);
        assert_eq!(
            inputs.get("merkle_root"),
            Some(&CircuitValue::Single(tree.root()))
        );
        assert_eq!(
            inputs.get("leaf_depth"),
            Some(&CircuitValue::from(tree.depth()))
        );
        assert_eq!(
            inputs.get("dg1_hash_offset"),
            Some(&CircuitValue::from(f.metadata.dg1_hash_offset.unwrap()))
        );
    }

    #[test]
    fn test_register_requires_dsc_in_tree() {
        let f = fixture();
        let tree = MerkleTree::new(vec![1u64.into(), 2u64.into()]).unwrap();
        let artifact = RegisterArtifact {
            document: &f.document,
            metadata: &f.metadata,
            dsc: &f.dsc,
            csca: &f.csca,
            secret: 1u64.into(),
        };
        let err = generate_circuit_inputs_register(artifact, &tree, &CircuitParams::default())
            .unwrap_err();
        assert!(matches!(err, WitnessError::Tree(TreeError::LeafNotFound(_))));
    }

    #[test]
    fn test_register_requires_detected_offsets() {
        let f = fixture();
        let mut metadata = f.metadata.clone();
        metadata.dg1_hash_offset = None;
        let leaf = get_leaf_dsc_tree(&f.dsc, &f.csca).unwrap();
        let tree = MerkleTree::new(vec![leaf]).unwrap();
        let artifact = RegisterArtifact {
            document: &f.document,
            metadata: &metadata,
            dsc: &f.dsc,
            csca: &f.csca,
            secret: 1u64.into(),
        };
        let err = generate_circuit_inputs_register(artifact, &tree, &CircuitParams::default())
            .unwrap_err();
        assert!(matches!(
            err,
            WitnessError::Mismatch(ValidationMismatch::Dg1Hash)
        ));
    }
}
