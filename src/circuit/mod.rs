//! Circuit input generation.
//!
//! Each generator returns [`CircuitInputs`]: the circuit name plus named values in the
//! order the circuit declares its signals. Values serialize as decimal strings.

pub mod chunking;
pub mod disclose;
pub mod dsc;
pub mod ofac;
pub mod register;
pub mod routing;
pub mod sha_pad;

use crate::error::{Result as WitnessResult, TreeError};
use crate::field::FieldElement;
use crate::merkle::{CircuitMerklePath, MerkleProof, MerkleTree};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub use routing::{get_circuit_name_from_passport_data, CircuitKind};

pub const DSC_TREE_DEPTH: usize = 21;
pub const CSCA_TREE_DEPTH: usize = 12;
pub const COMMITMENT_TREE_DEPTH: usize = 33;
pub const MAX_DSC_BYTES: usize = 1792;
pub const MAX_CSCA_BYTES: usize = 1792;
pub const MAX_FORBIDDEN_COUNTRIES: usize = 40;

fn default_dsc_tree_depth() -> usize {
    DSC_TREE_DEPTH
}

fn default_csca_tree_depth() -> usize {
    CSCA_TREE_DEPTH
}

fn default_commitment_tree_depth() -> usize {
    COMMITMENT_TREE_DEPTH
}

fn default_max_dsc_bytes() -> usize {
    MAX_DSC_BYTES
}

fn default_max_csca_bytes() -> usize {
    MAX_CSCA_BYTES
}

fn default_max_forbidden_countries() -> usize {
    MAX_FORBIDDEN_COUNTRIES
}

/// Fixed dimensions of the compiled circuits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitParams {
    #[serde(default = "default_dsc_tree_depth")]
    pub dsc_tree_depth: usize,
    #[serde(default = "default_csca_tree_depth")]
    pub csca_tree_depth: usize,
    #[serde(default = "default_commitment_tree_depth")]
    pub commitment_tree_depth: usize,
    #[serde(default = "default_max_dsc_bytes")]
    pub max_dsc_bytes: usize,
    #[serde(default = "default_max_csca_bytes")]
    pub max_csca_bytes: usize,
    #[serde(default = "default_max_forbidden_countries")]
    pub max_forbidden_countries: usize,
}

impl Default for CircuitParams {
    fn default() -> Self {
        CircuitParams {
            dsc_tree_depth: DSC_TREE_DEPTH,
            csca_tree_depth: CSCA_TREE_DEPTH,
            commitment_tree_depth: COMMITMENT_TREE_DEPTH,
            max_dsc_bytes: MAX_DSC_BYTES,
            max_csca_bytes: MAX_CSCA_BYTES,
            max_forbidden_countries: MAX_FORBIDDEN_COUNTRIES,
        }
    }
}

/// Inclusion proof of `leaf` in `tree`, padded to `depth` for the circuit.
pub(crate) fn inclusion_path(
    tree: &MerkleTree,
    leaf: &FieldElement,
    depth: usize,
    what: &str,
) -> WitnessResult<(MerkleProof, CircuitMerklePath)> {
    let index = tree
        .index_of(leaf)
        .ok_or_else(|| TreeError::LeafNotFound(format!("{what} {leaf}")))?;
    let proof = tree
        .generate_proof(index)
        .ok_or_else(|| TreeError::LeafNotFound(format!("{what} index {index}")))?;
    let path = proof.to_circuit_path(depth)?;
    Ok((proof, path))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CircuitValue {
    Single(FieldElement),
    Array(Vec<FieldElement>),
}

impl From<FieldElement> for CircuitValue {
    fn from(value: FieldElement) -> Self {
        CircuitValue::Single(value)
    }
}

impl From<Vec<FieldElement>> for CircuitValue {
    fn from(values: Vec<FieldElement>) -> Self {
        CircuitValue::Array(values)
    }
}

impl From<usize> for CircuitValue {
    fn from(value: usize) -> Self {
        CircuitValue::Single(value.into())
    }
}

impl From<&[u8]> for CircuitValue {
    fn from(bytes: &[u8]) -> Self {
        CircuitValue::Array(bytes.iter().map(|b| FieldElement::from(*b)).collect())
    }
}

/// Named inputs for one circuit, kept in signal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitInputs {
    pub circuit_name: String,
    inputs: Vec<(String, CircuitValue)>,
}

impl CircuitInputs {
    pub fn new(circuit_name: impl Into<String>) -> Self {
        CircuitInputs {
            circuit_name: circuit_name.into(),
            inputs: Vec::new(),
        }
    }

    /// Appends a signal. A repeated name replaces the earlier value in place.
    pub fn push(&mut self, name: &str, value: impl Into<CircuitValue>) -> &mut Self {
        let value = value.into();
        match self.inputs.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.inputs.push((name.to_string(), value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&CircuitValue> {
        self.inputs.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// The witness-calculator input object, without the circuit name.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&SignalMap(&self.inputs))
    }
}

struct SignalMap<'a>(&'a [(String, CircuitValue)]);

impl Serialize for SignalMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Serialize, Deserialize)]
struct CircuitInputsRepr<T> {
    circuit_name: String,
    inputs: T,
}

impl Serialize for CircuitInputs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CircuitInputsRepr {
            circuit_name: self.circuit_name.clone(),
            inputs: SignalMap(&self.inputs),
        }
        .serialize(serializer)
    }
}

struct OrderedSignals(Vec<(String, CircuitValue)>);

impl<'de> Deserialize<'de> for OrderedSignals {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SignalVisitor;

        impl<'de> Visitor<'de> for SignalVisitor {
            type Value = OrderedSignals;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of circuit signals")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut signals = Vec::new();
                while let Some(entry) = access.next_entry::<String, CircuitValue>()? {
                    signals.push(entry);
                }
                Ok(OrderedSignals(signals))
            }
        }

        deserializer.deserialize_map(SignalVisitor)
    }
}

impl<'de> Deserialize<'de> for CircuitInputs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = CircuitInputsRepr::<OrderedSignals>::deserialize(deserializer)?;
        Ok(CircuitInputs {
            circuit_name: repr.circuit_name,
            inputs: repr.inputs.0,
        })
    }
}
