//! Error taxonomy for the document-to-witness pipeline.
//!
//! Each family maps to a distinct recovery path: parse and algorithm errors mean the
//! document cannot be used, mismatches and crypto failures point at tampered data,
//! tree errors can be retried by refetching, and attestation errors must abort the
//! session before any secret leaves the device.

use thiserror::Error;

/// Malformed input: MRZ text, hex/base64 bytes, ASN.1 structures or certificates.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("MRZ format error: {0}")]
    MrzFormat(String),
    #[error("invalid date '{0}': expected YYYY-MM-DD or YYMMDD")]
    Date(String),
    #[error("invalid hex in {field}: {reason}")]
    Hex { field: String, reason: String },
    #[error("invalid base64 in {field}: {reason}")]
    Base64 { field: String, reason: String },
    #[error("malformed ASN.1 in {context}: {reason}")]
    Asn1 {
        context: &'static str,
        reason: String,
    },
    #[error("invalid certificate: {0}")]
    Certificate(String),
    #[error("invalid field element '{0}'")]
    FieldElement(String),
    #[error("invalid document: {0}")]
    Document(String),
}

/// An algorithm, curve or parameter combination outside the supported matrix.
#[derive(Debug, Error)]
pub enum UnsupportedAlgorithm {
    #[error("unsupported hash algorithm: {0}")]
    Hash(String),
    #[error("unsupported signature algorithm: {0}")]
    Signature(String),
    #[error("unsupported curve: {0}")]
    Curve(String),
    #[error("no circuit supports {0}")]
    Circuit(String),
}

/// A computed value does not match the signed value it should equal.
#[derive(Debug, Error)]
pub enum ValidationMismatch {
    #[error("hash of DG1 not found in eContent")]
    Dg1Hash,
    #[error("hash of eContent not found in signed attributes")]
    EContentHash,
    #[error("document signature does not verify with the signer certificate")]
    DocumentSignature,
    #[error("signer certificate is not signed by the issuing CSCA")]
    CertificateChain,
}

/// Registry fetch and tree structure failures.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("tree fetch from {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("tree service at {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("unexpected response shape from {url}: {reason}")]
    Shape { url: String, reason: String },
    #[error("leaf {0} not found in tree")]
    LeafNotFound(String),
    #[error("invalid tree data: {0}")]
    InvalidTreeData(String),
}

/// Key material and signature failures.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("malformed public key: {0}")]
    MalformedKey(String),
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("poseidon supports 1 to {max} inputs, got {got}")]
    PoseidonArity { got: usize, max: usize },
    #[error("poseidon: {0}")]
    Poseidon(String),
    #[error("{count} chunks exceed the hasher limit of {max}")]
    HasherCapacity { count: usize, max: usize },
}

/// COSE_Sign1 attestation decoding and verification failures.
#[derive(Debug, Error)]
pub enum AttestationError {
    #[error("invalid COSE format: {0}")]
    InvalidCoseFormat(String),
    #[error("unsupported curve: {0}")]
    UnsupportedCurve(String),
    #[error("invalid key coordinates: {0}")]
    InvalidKeyCoordinates(String),
    #[error("invalid key length: expected {expected} hex characters, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
    #[error("invalid signature length: {0} bytes")]
    InvalidSignatureLength(usize),
    #[error("signature verification failed")]
    SignatureVerificationFailed,
}

/// User-facing category a failure should be presented as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    UnsupportedDocument,
    TamperedData,
    NetworkIssue,
    UntrustedBackend,
}

#[derive(Debug, Error)]
pub enum WitnessError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Unsupported(#[from] UnsupportedAlgorithm),
    #[error(transparent)]
    Mismatch(#[from] ValidationMismatch),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Attestation(#[from] AttestationError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WitnessError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            WitnessError::Parse(_) | WitnessError::Unsupported(_) | WitnessError::Io(_) => {
                ErrorCategory::UnsupportedDocument
            }
            WitnessError::Mismatch(_) | WitnessError::Crypto(_) => ErrorCategory::TamperedData,
            WitnessError::Tree(_) => ErrorCategory::NetworkIssue,
            WitnessError::Attestation(_) => ErrorCategory::UntrustedBackend,
        }
    }

    /// Transport failures and missing leaves recover by refetching. Malformed tree data
    /// aborts.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WitnessError::Tree(
                TreeError::Fetch { .. } | TreeError::HttpStatus { .. } | TreeError::LeafNotFound(_)
            )
        )
    }
}

pub type Result<T, E = WitnessError> = std::result::Result<T, E>;
