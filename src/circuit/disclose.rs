//! Selective-disclosure inputs and decoding of revealed attributes.

use super::routing::{get_circuit_name_from_passport_data, CircuitKind};
use super::{inclusion_path, CircuitInputs, CircuitParams};
use crate::commitment::{e_content_hash_function, e_content_packed_hash, generate_commitment};
use crate::document::DocumentRecord;
use crate::error::{ParseError, Result, TreeError};
use crate::field::FieldElement;
use crate::hash::pack_bytes_array;
use crate::leaves::ofac_keys;
use crate::merkle::MerkleTree;
use crate::metadata::PassportMetadata;
use crate::mrz::MrzLayout;
use crate::smt::{generate_smt_proof, SparseMerkleTree};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use strum::{Display, EnumIter, EnumString};

const COUNTRY_CODE_LEN: usize = 3;
const DEFAULT_MAJORITY: u8 = 18;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Attribute {
    IssuingState,
    Name,
    PassportNumber,
    Nationality,
    DateOfBirth,
    Gender,
    ExpiryDate,
    OlderThan,
    Ofac,
}

impl Attribute {
    /// Whether the attribute lies in the MRZ, as opposed to the appended result bytes.
    pub fn in_mrz(&self) -> bool {
        !matches!(self, Attribute::OlderThan | Attribute::Ofac)
    }
}

/// Inclusive byte positions of an attribute in the revealed-data layout: the MRZ,
/// then two age digits, then one flag per sanctions tree.
pub fn attribute_range(layout: MrzLayout, attribute: Attribute) -> RangeInclusive<usize> {
    match (layout, attribute) {
        (MrzLayout::Td3, Attribute::IssuingState) => 2..=4,
        (MrzLayout::Td3, Attribute::Name) => 5..=43,
        (MrzLayout::Td3, Attribute::PassportNumber) => 44..=52,
        (MrzLayout::Td3, Attribute::Nationality) => 54..=56,
        (MrzLayout::Td3, Attribute::DateOfBirth) => 57..=62,
        (MrzLayout::Td3, Attribute::Gender) => 64..=64,
        (MrzLayout::Td3, Attribute::ExpiryDate) => 65..=70,
        (MrzLayout::Td3, Attribute::OlderThan) => 88..=89,
        (MrzLayout::Td3, Attribute::Ofac) => 90..=92,
        (MrzLayout::Td1, Attribute::IssuingState) => 2..=4,
        (MrzLayout::Td1, Attribute::Name) => 60..=89,
        (MrzLayout::Td1, Attribute::PassportNumber) => 5..=13,
        (MrzLayout::Td1, Attribute::Nationality) => 45..=47,
        (MrzLayout::Td1, Attribute::DateOfBirth) => 30..=35,
        (MrzLayout::Td1, Attribute::Gender) => 37..=37,
        (MrzLayout::Td1, Attribute::ExpiryDate) => 38..=43,
        (MrzLayout::Td1, Attribute::OlderThan) => 90..=91,
        (MrzLayout::Td1, Attribute::Ofac) => 92..=93,
    }
}

/// Length of the revealed-data layout.
pub fn revealed_data_len(layout: MrzLayout) -> usize {
    attribute_range(layout, Attribute::Ofac).end() + 1
}

/// What the holder agrees to reveal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosePolicy {
    #[serde(default)]
    pub revealed: BTreeSet<Attribute>,
    #[serde(default)]
    pub minimum_age: Option<u8>,
    #[serde(default)]
    pub ofac: bool,
    #[serde(default)]
    pub forbidden_countries: Vec<String>,
    pub scope: FieldElement,
    pub user_identifier: FieldElement,
    /// `YYMMDD`.
    pub current_date: String,
}

/// Document-side values the disclosure circuit binds to.
#[derive(Debug, Clone, Copy)]
pub struct DiscloseArtifact<'a> {
    pub document: &'a DocumentRecord,
    pub metadata: &'a PassportMetadata,
    pub secret: FieldElement,
    pub dsc_tree_leaf: FieldElement,
}

/// The sanctions trees for a document category. Id cards have no passport-number tree.
#[derive(Debug, Clone, Default)]
pub struct OfacTrees {
    pub passport_number: Option<SparseMerkleTree>,
    pub name_dob: SparseMerkleTree,
    pub name_yob: SparseMerkleTree,
}

/// Trees the disclosure proof is made against.
#[derive(Debug, Clone, Copy)]
pub struct DiscloseProofs<'a> {
    pub commitment_tree: &'a MerkleTree,
    pub ofac: &'a OfacTrees,
}

/// MRZ-length selector with ones over every revealed MRZ attribute.
pub fn selector_dg1(layout: MrzLayout, revealed: &BTreeSet<Attribute>) -> Vec<FieldElement> {
    let mut selector = vec![FieldElement::zero(); layout.mrz_length()];
    for attribute in revealed.iter().filter(|a| a.in_mrz()) {
        for i in attribute_range(layout, *attribute) {
            selector[i] = FieldElement::from(1u64);
        }
    }
    selector
}

/// `A-Z` with `<` filler after the first letter, as in `D<<`.
fn is_mrz_country_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == COUNTRY_CODE_LEN
        && bytes[0].is_ascii_uppercase()
        && bytes[1..].iter().all(|b| b.is_ascii_uppercase() || *b == b'<')
}

/// Three-letter codes concatenated and NUL-padded to `max_countries` entries.
pub fn format_forbidden_countries_list(
    countries: &[String],
    max_countries: usize,
) -> std::result::Result<Vec<u8>, ParseError> {
    if countries.len() > max_countries {
        return Err(ParseError::Document(format!(
            "{} forbidden countries, at most {max_countries} allowed",
            countries.len()
        )));
    }
    let mut list = Vec::with_capacity(max_countries * COUNTRY_CODE_LEN);
    for code in countries {
        if !is_mrz_country_code(code) {
            return Err(ParseError::Document(format!("'{code}' is not a 3-letter country code")));
        }
        list.extend_from_slice(code.as_bytes());
    }
    list.resize(max_countries * COUNTRY_CODE_LEN, 0);
    Ok(list)
}

/// The two ASCII digits of the `majority` signal. Defaults to 18.
pub fn majority_digits(minimum_age: Option<u8>) -> std::result::Result<String, ParseError> {
    match minimum_age.unwrap_or(DEFAULT_MAJORITY) {
        age @ 0..=99 => Ok(format!("{age:02}")),
        age => Err(ParseError::Document(format!(
            "minimum age {age} does not fit the two-digit majority field"
        ))),
    }
}

/// Packed form of the forbidden-countries list as the circuit exposes it.
pub fn pack_forbidden_countries(list: &[u8]) -> Vec<FieldElement> {
    pack_bytes_array(list)
}

fn date_digits(date: &str) -> std::result::Result<Vec<FieldElement>, ParseError> {
    if date.len() != 6 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::Date(format!("'{date}' is not YYMMDD")));
    }
    Ok(date.bytes().map(|b| FieldElement::from(b - b'0')).collect())
}

pub(crate) fn push_smt_inputs(
    inputs: &mut CircuitInputs,
    prefix: &str,
    tree: &SparseMerkleTree,
    key: &FieldElement,
) -> Result<()> {
    let proof = generate_smt_proof(tree, key)?;
    inputs
        .push(&format!("{prefix}_smt_leaf_key"), proof.closest_leaf)
        .push(&format!("{prefix}_smt_root"), proof.root)
        .push(&format!("{prefix}_smt_siblings"), proof.siblings);
    Ok(())
}

pub(crate) fn push_ofac_inputs(
    inputs: &mut CircuitInputs,
    dg1: &[u8],
    layout: MrzLayout,
    trees: &OfacTrees,
) -> Result<()> {
    let keys = ofac_keys(dg1, layout)?;
    if let Some(number_key) = keys.passport_number {
        let tree = trees.passport_number.as_ref().ok_or_else(|| {
            TreeError::InvalidTreeData("passport number tree is required for passports".to_string())
        })?;
        push_smt_inputs(inputs, "passport_no", tree, &number_key)?;
    }
    push_smt_inputs(inputs, "name_dob", &trees.name_dob, &keys.name_dob)?;
    push_smt_inputs(inputs, "name_yob", &trees.name_yob, &keys.name_yob)?;
    Ok(())
}

/// Builds the `vc_and_disclose` inputs.
///
/// # Errors
///
/// The document's commitment is not in the commitment tree, or the policy is malformed.
pub fn generate_circuit_inputs_vc_and_disclose(
    artifact: DiscloseArtifact<'_>,
    policy: &DisclosePolicy,
    proofs: DiscloseProofs<'_>,
    params: &CircuitParams,
) -> Result<CircuitInputs> {
    let document = artifact.document;
    let layout = document.layout()?;
    let attestation_id = document.document_category.attestation_id();
    let name = get_circuit_name_from_passport_data(
        document.document_category,
        CircuitKind::VcAndDisclose,
        artifact.metadata,
    )?;

    let commitment = generate_commitment(
        artifact.secret,
        attestation_id,
        document,
        artifact.metadata,
        artifact.dsc_tree_leaf,
    )?;
    let (proof, path) = inclusion_path(
        proofs.commitment_tree,
        &commitment,
        params.commitment_tree_depth,
        "commitment",
    )?;

    let dg1 = document.dg1()?;
    let e_content_packed =
        e_content_packed_hash(document, e_content_hash_function(artifact.metadata)?)?;
    let majority = majority_digits(policy.minimum_age)?;
    let forbidden = format_forbidden_countries_list(&policy.forbidden_countries, params.max_forbidden_countries)?;

    let mut inputs = CircuitInputs::new(name);
    inputs
        .push("secret", artifact.secret)
        .push("attestation_id", FieldElement::from(attestation_id))
        .push("dg1", dg1.as_slice())
        .push("eContent_shaBytes_packed_hash", e_content_packed)
        .push("dsc_tree_leaf", artifact.dsc_tree_leaf)
        .push("merkle_root", proof.root)
        .push("leaf_depth", path.leaf_depth)
        .push("path", path.path)
        .push("siblings", path.siblings)
        .push("selector_dg1", selector_dg1(layout, &policy.revealed))
        .push(
            "selector_older_than",
            FieldElement::from(policy.minimum_age.is_some()),
        )
        .push("scope", policy.scope)
        .push("current_date", date_digits(&policy.current_date)?)
        .push("majority", majority.as_bytes())
        .push("user_identifier", policy.user_identifier)
        .push("selector_ofac", FieldElement::from(policy.ofac))
        .push("forbidden_countries_list", forbidden.as_slice())
        .push(
            "forbidden_countries_list_packed",
            pack_forbidden_countries(&forbidden),
        );
    push_ofac_inputs(&mut inputs, &dg1, layout, proofs.ofac)?;

    debug!(
        "Built {} inputs for {} revealing {:?}",
        inputs.len(),
        inputs.circuit_name,
        policy.revealed
    );
    Ok(inputs)
}

/// Attributes decoded from revealed bytes. Unrevealed attributes are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedAttributes {
    pub issuing_state: Option<String>,
    pub name: Option<String>,
    pub passport_number: Option<String>,
    pub nationality: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub expiry_date: Option<String>,
    pub older_than: Option<u8>,
    /// One flag per sanctions tree, true when the holder is absent from it.
    pub ofac: Vec<bool>,
}

/// Maps revealed bytes back to named attributes.
pub fn extract_revealed_attributes(
    layout: MrzLayout,
    revealed: &[u8],
) -> std::result::Result<RevealedAttributes, ParseError> {
    let expected = revealed_data_len(layout);
    if revealed.len() != expected {
        return Err(ParseError::Document(format!(
            "revealed data is {} bytes, expected {expected}",
            revealed.len()
        )));
    }
    let filler = Regex::new("<+").map_err(|e| ParseError::Document(e.to_string()))?;
    let text = |attribute: Attribute| -> Option<String> {
        let bytes = &revealed[attribute_range(layout, attribute)];
        if bytes.iter().all(|b| *b == 0) {
            return None;
        }
        let raw: String = bytes.iter().map(|b| char::from(*b)).collect();
        Some(filler.replace_all(&raw, " ").trim().to_string())
    };

    let age = &revealed[attribute_range(layout, Attribute::OlderThan)];
    let older_than = std::str::from_utf8(age)
        .ok()
        .and_then(|digits| digits.parse::<u8>().ok())
        .filter(|age| *age > 0);

    Ok(RevealedAttributes {
        issuing_state: text(Attribute::IssuingState),
        name: text(Attribute::Name),
        passport_number: text(Attribute::PassportNumber),
        nationality: text(Attribute::Nationality),
        date_of_birth: text(Attribute::DateOfBirth),
        gender: text(Attribute::Gender),
        expiry_date: text(Attribute::ExpiryDate),
        older_than,
        ofac: revealed[attribute_range(layout, Attribute::Ofac)]
            .iter()
            .map(|b| *b == 1)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::SAMPLE_TD3_MRZ;
    use crate::mrz::normalize_mrz;
    use strum::IntoEnumIterator;

    #[test]
    fn test_attribute_ranges_fit_layout() {
        for layout in [MrzLayout::Td3, MrzLayout::Td1] {
            for attribute in Attribute::iter() {
                let range = attribute_range(layout, attribute);
                assert!(*range.end() < revealed_data_len(layout));
                assert_eq!(attribute.in_mrz(), *range.end() < layout.mrz_length());
            }
        }
        assert_eq!(revealed_data_len(MrzLayout::Td3), 93);
        assert_eq!(revealed_data_len(MrzLayout::Td1), 94);
    }

    #[test]
    fn test_forbidden_countries_pack_to_four_elements() {
        let list =
            format_forbidden_countries_list(&["AAA".to_string(), "PRK".to_string()], 40).unwrap();
        assert_eq!(list.len(), 120);
        assert_eq!(&list[..6], b"AAAPRK");
        assert!(list[6..].iter().all(|b| *b == 0));
        assert_eq!(pack_forbidden_countries(&list).len(), 4);

        let too_many = vec!["AAA".to_string(); 41];
        assert!(format_forbidden_countries_list(&too_many, 40).is_err());
        assert!(format_forbidden_countries_list(&["AB".to_string()], 40).is_err());
    }

    #[test]
    fn test_forbidden_countries_must_be_uppercase_letters() {
        for code in ["prk", "1$_", "PR1", "Prk"] {
            assert!(
                format_forbidden_countries_list(&[code.to_string()], 40).is_err(),
                "{code} accepted"
            );
        }
        assert!(format_forbidden_countries_list(&["<DE".to_string()], 40).is_err());
        let germany = format_forbidden_countries_list(&["D<<".to_string()], 40).unwrap();
        assert_eq!(&germany[..3], b"D<<");
    }

    #[test]
    fn test_majority_is_two_digits() {
        assert_eq!(majority_digits(None).unwrap(), "18");
        assert_eq!(majority_digits(Some(7)).unwrap(), "07");
        assert_eq!(majority_digits(Some(99)).unwrap(), "99");
        assert!(matches!(
            majority_digits(Some(100)),
            Err(ParseError::Document(_))
        ));
        assert!(majority_digits(Some(255)).is_err());
    }

    #[test]
    fn test_selector_covers_revealed_fields() {
        let revealed: BTreeSet<_> = [Attribute::Nationality, Attribute::OlderThan].into();
        let selector = selector_dg1(MrzLayout::Td3, &revealed);
        assert_eq!(selector.len(), 88);
        let ones: Vec<usize> = selector
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_zero())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(ones, vec![54, 55, 56]);
    }

    #[test]
    fn test_extract_revealed_attributes() {
        let mrz = normalize_mrz(SAMPLE_TD3_MRZ);
        let mut revealed = vec![0u8; 93];
        for attribute in [Attribute::Name, Attribute::Nationality, Attribute::DateOfBirth] {
            let range = attribute_range(MrzLayout::Td3, attribute);
            revealed[range.clone()].copy_from_slice(&mrz.as_bytes()[range]);
        }
        revealed[88..90].copy_from_slice(b"18");
        revealed[90..93].copy_from_slice(&[1, 1, 0]);

        let attrs = extract_revealed_attributes(MrzLayout::Td3, &revealed).unwrap();
        assert_eq!(attrs.name.as_deref(), Some("ERIKSSON ANNA MARIA"));
        assert_eq!(attrs.nationality.as_deref(), Some("UTO"));
        assert_eq!(attrs.date_of_birth.as_deref(), Some("740812"));
        assert_eq!(attrs.passport_number, None);
        assert_eq!(attrs.older_than, Some(18));
        assert_eq!(attrs.ofac, vec![true, true, false]);

        assert!(extract_revealed_attributes(MrzLayout::Td1, &revealed).is_err());
    }

    #[test]
    fn test_date_digits() {
        assert_eq!(
            date_digits("261019").unwrap(),
            [2u64, 6, 1, 0, 1, 9].map(FieldElement::from).to_vec()
        );
        assert!(date_digits("2026-10-19").is_err());
    }
}
