//! The witness file written by the generator.

use crate::circuit::{CircuitInputs, CircuitValue};
use crate::commitment::generate_nullifier;
use crate::field::FieldElement;
use crate::utils::unix_timestamp;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// Circuit inputs for one document plus the public values a verifier checks them
/// against.
///
/// `commitment` is only present for circuits that bind the holder's commitment
/// (register and disclosure). `nullifier` is `poseidon2(secret, attestation_id)` and is
/// the same for every circuit a document is proven with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WitnessOutput {
    pub circuit_name: String,
    pub attestation_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<FieldElement>,
    pub nullifier: FieldElement,
    pub inputs: CircuitInputs,
    /// Unix timestamp when the inputs were generated
    pub timestamp: u64,
}

impl WitnessOutput {
    const TIMESTAMP_TOLERANCE_SECS: u64 = 30;
    const TIMESTAMP_MAX_AGE_SECS: u64 = 86400;

    /// Checks the output is internally consistent and fresh.
    ///
    /// # Errors
    /// Returns an error if:
    /// - the inputs are empty or name a different circuit
    /// - the timestamp is in the future or older than a day
    /// - a `secret` or `attestation_id` input disagrees with the nullifier
    pub fn validate(&self) -> Result<()> {
        debug!(
            "Validating witness for {} ({} inputs)",
            self.circuit_name,
            self.inputs.len()
        );

        if self.inputs.is_empty() {
            return Err(anyhow::anyhow!(
                "Witness for {} has no inputs.",
                self.circuit_name
            ));
        }
        if self.inputs.circuit_name != self.circuit_name {
            return Err(anyhow::anyhow!(
                "Circuit name mismatch: output says {}, inputs were built for {}.",
                self.circuit_name,
                self.inputs.circuit_name
            ));
        }

        let now = unix_timestamp();
        if self.timestamp > now + Self::TIMESTAMP_TOLERANCE_SECS {
            return Err(anyhow::anyhow!(
                "Timestamp is too far in the future: {} (current: {}, tolerance: {}s). Please check the system clock.",
                self.timestamp,
                now,
                Self::TIMESTAMP_TOLERANCE_SECS
            ));
        }
        if now > self.timestamp + Self::TIMESTAMP_MAX_AGE_SECS {
            return Err(anyhow::anyhow!(
                "Timestamp is too old: {} (current: {}, max age: {}s). Regenerate the witness against fresh trees.",
                self.timestamp,
                now,
                Self::TIMESTAMP_MAX_AGE_SECS
            ));
        }

        if let Some(CircuitValue::Single(id)) = self.inputs.get("attestation_id") {
            if *id != FieldElement::from(self.attestation_id) {
                return Err(anyhow::anyhow!(
                    "attestation_id input {id} does not match {}",
                    self.attestation_id
                ));
            }
        }

        if let Some(CircuitValue::Single(secret)) = self.inputs.get("secret") {
            let expected = generate_nullifier(*secret, self.attestation_id)
                .context("Failed to recompute nullifier")?;
            if expected != self.nullifier {
                return Err(anyhow::anyhow!(
                    "Nullifier mismatch: expected {expected}, got {}. The nullifier must equal poseidon(secret, attestation_id).",
                    self.nullifier
                ));
            }
        }

        Ok(())
    }
}
