//! Inputs for the DSC circuits, which prove a DSC was issued by a registered CSCA.

use super::chunking::{chunk_public_key, chunk_signature};
use super::routing::{get_circuit_name_from_passport_data, CircuitKind};
use super::sha_pad::sha_pad;
use super::{inclusion_path, CircuitInputs, CircuitParams};
use crate::certificate::CertificateData;
use crate::document::DocumentCategory;
use crate::error::{CryptoError, ParseError, Result, UnsupportedAlgorithm};
use crate::leaves::get_leaf_csca_tree;
use crate::merkle::MerkleTree;
use crate::metadata::PassportMetadata;
use log::debug;

/// Builds the `dsc` (or `dsc_id`) inputs against a CSCA registry snapshot.
///
/// `raw_csca` is the CSCA DER zero-filled to `max_csca_bytes`; the circuit reads the
/// key at `csca_pubKey_offset` inside it. `raw_dsc` is the DSC's TBS bytes SHA-padded
/// with the hash the CSCA signed with.
///
/// # Errors
///
/// A metadata record without CSCA fields, certificates larger than the circuit
/// accepts, and a CSCA leaf missing from `csca_tree`.
pub fn generate_circuit_inputs_dsc(
    category: DocumentCategory,
    metadata: &PassportMetadata,
    dsc: &CertificateData,
    csca: &CertificateData,
    csca_tree: &MerkleTree,
    params: &CircuitParams,
) -> Result<CircuitInputs> {
    let name = get_circuit_name_from_passport_data(category, CircuitKind::Dsc, metadata)?;
    let hash = metadata
        .csca_hash_function
        .ok_or_else(|| UnsupportedAlgorithm::Hash("CSCA signature hash not detected".to_string()))?;
    let kind = metadata
        .csca_signature_algorithm
        .ok_or_else(|| UnsupportedAlgorithm::Signature("CSCA signature algorithm not detected".to_string()))?;

    if csca.raw.len() > params.max_csca_bytes {
        return Err(ParseError::Certificate(format!(
            "CSCA is {} bytes, at most {} allowed",
            csca.raw.len(),
            params.max_csca_bytes
        ))
        .into());
    }
    let mut raw_csca = csca.raw.clone();
    raw_csca.resize(params.max_csca_bytes, 0);
    let key_offset = csca
        .public_key_offset()
        .ok_or_else(|| CryptoError::MalformedKey("CSCA key bytes not found in its DER".to_string()))?;

    let (raw_dsc, raw_dsc_len) = sha_pad(hash, &dsc.tbs_bytes, params.max_dsc_bytes)?;
    let csca_key = chunk_public_key(&csca.public_key, kind)?;
    let signature = chunk_signature(&csca.public_key, kind, &dsc.signature)?;

    let csca_leaf = get_leaf_csca_tree(csca)?;
    let (proof, path) = inclusion_path(csca_tree, &csca_leaf, params.csca_tree_depth, "csca leaf")?;

    let mut inputs = CircuitInputs::new(name);
    inputs
        .push("raw_csca", raw_csca.as_slice())
        .push("raw_csca_actual_length", csca.raw.len())
        .push("csca_pubKey_offset", key_offset)
        .push("csca_pubKey_actual_size", csca.public_key_size())
        .push("raw_dsc", raw_dsc.as_slice())
        .push("raw_dsc_padded_length", raw_dsc_len)
        .push("csca_pubKey", csca_key)
        .push("signature", signature)
        .push("merkle_root", proof.root)
        .push("path", path.path)
        .push("siblings", path.siblings);

    debug!(
        "Built {} inputs for {}: CSCA key at {key_offset}, DSC padded to {raw_dsc_len}",
        inputs.len(),
        inputs.circuit_name
    );
    Ok(inputs)
}
