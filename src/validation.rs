//! Multi-check document validation.
//!
//! Every independent problem is reported, both through [`PassportValidationCallbacks`]
//! and in the returned [`ValidationReport`]. Validation never fails.

use crate::circuit::routing::{get_circuit_name_from_passport_data, CircuitKind, SignatureDescriptor};
use crate::document::DocumentRecord;
use crate::hash::{digest, HashAlgorithm, DOCUMENT_HASHES};
use crate::metadata::PassportMetadata;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Receives each validation finding as it is made. Every method defaults to a no-op.
pub trait PassportValidationCallbacks {
    fn on_passport_metadata_null(&mut self) {}
    fn on_dg1_hash_function_null(&mut self) {}
    fn on_e_content_hash_function_null(&mut self) {}
    fn on_signed_attr_hash_function_null(&mut self) {}
    fn on_dg1_hash_mismatch(&mut self) {}
    fn on_unsupported_hash_algorithm(&mut self, _field: &str, _hash: HashAlgorithm) {}
    fn on_csca_not_found(&mut self) {}
    fn on_unsupported_signature_algorithm(&mut self, _reason: &str) {}
    fn on_circuit_not_supported(&mut self, _kind: CircuitKind, _reason: &str) {}
}

/// Callbacks that ignore everything; findings are still in the report.
pub struct NoopCallbacks;

impl PassportValidationCallbacks for NoopCallbacks {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ValidationIssue {
    PassportMetadataNull,
    Dg1HashFunctionNull,
    EContentHashFunctionNull,
    SignedAttrHashFunctionNull,
    Dg1HashMismatch,
    UnsupportedHashAlgorithm { field: String, hash: HashAlgorithm },
    CscaNotFound,
    UnsupportedSignatureAlgorithm { reason: String },
    CircuitNotSupported { kind: CircuitKind, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    /// Register circuit the document routes to, when routing succeeded.
    pub register_circuit: Option<String>,
    /// DSC circuit the document routes to, when a CSCA was found and routing succeeded.
    pub dsc_circuit: Option<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has(&self, issue: &ValidationIssue) -> bool {
        self.issues.contains(issue)
    }
}

struct Reporter<'a> {
    callbacks: &'a mut dyn PassportValidationCallbacks,
    report: ValidationReport,
}

impl Reporter<'_> {
    fn push(&mut self, issue: ValidationIssue) {
        debug!("Validation issue: {issue:?}");
        match &issue {
            ValidationIssue::PassportMetadataNull => self.callbacks.on_passport_metadata_null(),
            ValidationIssue::Dg1HashFunctionNull => self.callbacks.on_dg1_hash_function_null(),
            ValidationIssue::EContentHashFunctionNull => {
                self.callbacks.on_e_content_hash_function_null()
            }
            ValidationIssue::SignedAttrHashFunctionNull => {
                self.callbacks.on_signed_attr_hash_function_null()
            }
            ValidationIssue::Dg1HashMismatch => self.callbacks.on_dg1_hash_mismatch(),
            ValidationIssue::UnsupportedHashAlgorithm { field, hash } => {
                self.callbacks.on_unsupported_hash_algorithm(field, *hash)
            }
            ValidationIssue::CscaNotFound => self.callbacks.on_csca_not_found(),
            ValidationIssue::UnsupportedSignatureAlgorithm { reason } => {
                self.callbacks.on_unsupported_signature_algorithm(reason)
            }
            ValidationIssue::CircuitNotSupported { kind, reason } => {
                self.callbacks.on_circuit_not_supported(*kind, reason)
            }
        }
        self.report.issues.push(issue);
    }
}

/// Runs every check on a document and its derived metadata.
pub fn validate_document(
    document: &DocumentRecord,
    metadata: Option<&PassportMetadata>,
    callbacks: &mut dyn PassportValidationCallbacks,
) -> ValidationReport {
    let mut reporter = Reporter {
        callbacks,
        report: ValidationReport::default(),
    };
    let Some(metadata) = metadata else {
        reporter.push(ValidationIssue::PassportMetadataNull);
        return reporter.report;
    };

    let hashes = [
        ("dg1", metadata.dg1_hash_function, ValidationIssue::Dg1HashFunctionNull),
        (
            "eContent",
            metadata.e_content_hash_function,
            ValidationIssue::EContentHashFunctionNull,
        ),
        (
            "signed attributes",
            metadata.signed_attr_hash_function,
            ValidationIssue::SignedAttrHashFunctionNull,
        ),
    ];
    for (field, hash, missing) in hashes {
        match hash {
            None => reporter.push(missing),
            Some(h) if !DOCUMENT_HASHES.contains(&h) => {
                reporter.push(ValidationIssue::UnsupportedHashAlgorithm {
                    field: field.to_string(),
                    hash: h,
                })
            }
            Some(_) => {}
        }
    }

    if let Some(hash) = metadata.dg1_hash_function {
        let matches = match (document.dg1(), document.data_group_hashes.get(&1)) {
            (Ok(dg1), Some(expected)) => digest(hash, &dg1) == *expected,
            _ => false,
        };
        if !matches {
            reporter.push(ValidationIssue::Dg1HashMismatch);
        }
    }

    if !metadata.csca_found {
        reporter.push(ValidationIssue::CscaNotFound);
    }

    if let Err(e) = SignatureDescriptor::for_document(metadata).circuit_suffix() {
        reporter.push(ValidationIssue::UnsupportedSignatureAlgorithm {
            reason: e.to_string(),
        });
    }

    match get_circuit_name_from_passport_data(
        document.document_category,
        CircuitKind::Register,
        metadata,
    ) {
        Ok(name) => reporter.report.register_circuit = Some(name),
        Err(e) => reporter.push(ValidationIssue::CircuitNotSupported {
            kind: CircuitKind::Register,
            reason: e.to_string(),
        }),
    }
    if metadata.csca_found {
        match get_circuit_name_from_passport_data(
            document.document_category,
            CircuitKind::Dsc,
            metadata,
        ) {
            Ok(name) => reporter.report.dsc_circuit = Some(name),
            Err(e) => reporter.push(ValidationIssue::CircuitNotSupported {
                kind: CircuitKind::Dsc,
                reason: e.to_string(),
            }),
        }
    }

    if !reporter.report.is_valid() {
        warn!(
            "Document failed {} validation check(s)",
            reporter.report.issues.len()
        );
    }
    reporter.report
}
