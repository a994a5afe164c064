//! Inputs for the standalone sanctions-list circuits.

use super::disclose::{push_ofac_inputs, OfacTrees};
use super::routing::category_circuit_name;
use super::CircuitInputs;
use crate::document::DocumentRecord;
use crate::error::Result;
use log::debug;

/// Builds the `ofac` (or `ofac_id`) inputs: DG1 followed by a leaf key, root and
/// siblings per sanctions tree. Id cards have no passport-number tree.
pub fn generate_circuit_inputs_ofac(document: &DocumentRecord, trees: &OfacTrees) -> Result<CircuitInputs> {
    let name = category_circuit_name("ofac", document.document_category)?;
    let layout = document.layout()?;
    let dg1 = document.dg1()?;

    let mut inputs = CircuitInputs::new(name);
    inputs.push("dg1", dg1.as_slice());
    push_ofac_inputs(&mut inputs, &dg1, layout, trees)?;
    debug!("Built {} inputs for {}", inputs.len(), inputs.circuit_name);
    Ok(inputs)
}
