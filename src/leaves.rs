//! Leaf derivation for the certificate registries and the OFAC sanctions trees.

use crate::certificate::CertificateData;
use crate::circuit::chunking::chunk_public_key;
use crate::circuit::disclose::{attribute_range, Attribute};
use crate::circuit::routing::{signature_algorithm_index, SignatureDescriptor};
use crate::error::{CryptoError, ParseError, Result};
use crate::field::FieldElement;
use crate::mrz::MrzLayout;
use crate::poseidon::{custom_hasher, flexible_poseidon, poseidon2, to_small_key};
use log::debug;

/// `poseidon2(signature_algorithm_index, custom_hasher(key limbs))` for a certificate key.
pub fn get_leaf(cert: &CertificateData) -> Result<FieldElement> {
    let descriptor = SignatureDescriptor::for_certificate(cert);
    let index = signature_algorithm_index(&descriptor)?;
    let key = chunk_public_key(&cert.public_key, descriptor.kind)?;
    let leaf = poseidon2(index.into(), custom_hasher(&key)?)?;
    debug!(
        "Leaf for {} key (index {index}): {leaf}",
        descriptor.kind
    );
    Ok(leaf)
}

/// Leaf of a CSCA in the CSCA registry.
pub fn get_leaf_csca_tree(csca: &CertificateData) -> Result<FieldElement> {
    get_leaf(csca)
}

/// Leaf of a DSC in the DSC registry, bound to the CSCA that issued it.
pub fn get_leaf_dsc_tree(dsc: &CertificateData, csca: &CertificateData) -> Result<FieldElement> {
    Ok(poseidon2(get_leaf(dsc)?, get_leaf_csca_tree(csca)?)?)
}

fn ascii(bytes: &[u8]) -> Vec<FieldElement> {
    bytes.iter().map(|b| FieldElement::from(*b)).collect()
}

/// `poseidon3` over the Poseidon hashes of three equal name chunks.
pub fn get_name_leaf(name: &[u8]) -> std::result::Result<FieldElement, CryptoError> {
    if name.is_empty() || name.len() % 3 != 0 {
        return Err(CryptoError::PoseidonArity {
            got: name.len(),
            max: 3 * crate::poseidon::MAX_POSEIDON_INPUTS,
        });
    }
    let chunks = name
        .chunks(name.len() / 3)
        .map(|chunk| flexible_poseidon(&ascii(chunk)))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    flexible_poseidon(&chunks)
}

pub fn get_dob_leaf(dob: &[u8]) -> std::result::Result<FieldElement, CryptoError> {
    flexible_poseidon(&ascii(dob))
}

pub fn get_passport_number_and_nationality_leaf(
    number: &[u8],
    nationality: &[u8],
) -> std::result::Result<FieldElement, CryptoError> {
    let mut inputs = ascii(number);
    inputs.extend(ascii(nationality));
    Ok(to_small_key(&flexible_poseidon(&inputs)?))
}

pub fn get_name_dob_leaf(name: &[u8], dob: &[u8]) -> std::result::Result<FieldElement, CryptoError> {
    Ok(to_small_key(&poseidon2(get_dob_leaf(dob)?, get_name_leaf(name)?)?))
}

pub fn get_name_yob_leaf(name: &[u8], yob: &[u8]) -> std::result::Result<FieldElement, CryptoError> {
    let yob = flexible_poseidon(&ascii(yob))?;
    Ok(to_small_key(&poseidon2(yob, get_name_leaf(name)?)?))
}

/// Keys a document is looked up under in each sanctions tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfacKeys {
    /// Absent for id cards, which have no passport-number tree.
    pub passport_number: Option<FieldElement>,
    pub name_dob: FieldElement,
    pub name_yob: FieldElement,
}

/// Derives the sanctions-tree keys from formatted DG1 bytes.
pub fn ofac_keys(dg1: &[u8], layout: MrzLayout) -> Result<OfacKeys> {
    let header = layout.dg1_header().len();
    if dg1.len() != header + layout.mrz_length() {
        return Err(ParseError::Document(format!(
            "dg1 is {} bytes, expected {}",
            dg1.len(),
            header + layout.mrz_length()
        ))
        .into());
    }
    let field = |attribute: Attribute| {
        let range = attribute_range(layout, attribute);
        &dg1[range.start() + header..=range.end() + header]
    };

    let name = field(Attribute::Name);
    let dob = field(Attribute::DateOfBirth);
    let passport_number = match layout {
        MrzLayout::Td3 => Some(get_passport_number_and_nationality_leaf(
            field(Attribute::PassportNumber),
            field(Attribute::Nationality),
        )?),
        MrzLayout::Td1 => None,
    };
    Ok(OfacKeys {
        passport_number,
        name_dob: get_name_dob_leaf(name, dob)?,
        name_yob: get_name_yob_leaf(name, &dob[..2])?,
    })
}
