//! ePassport / eID document-to-witness pipeline.
//!
//! This library turns a scanned identity document (MRZ, LDS security object, document
//! signature and signer certificate) into the inputs of the zero-knowledge circuits
//! that register and disclose it, against on-chain certificate registries.
//!
//! # Components
//!
//! - [`document`], [`mrz`], [`certificate`]: parsing raw documents and X.509 material
//! - [`metadata`], [`validation`]: which algorithms a document uses and whether it is
//!   internally consistent
//! - [`poseidon`], [`commitment`], [`leaves`]: circomlib-compatible hashing, the
//!   holder's commitment and nullifier, and registry leaves
//! - [`MerkleTree`], [`smt::SparseMerkleTree`]: the LeanIMT and sparse Merkle trees the
//!   registries are built from
//! - [`circuit`]: circuit routing and the register, DSC, disclosure and sanctions inputs
//! - [`tree_service`]: fetching registry snapshots
//! - [`attestation`]: verifying COSE_Sign1 attestations from a remote prover
//! - [`pipeline`]: the staged, cancellable pipeline tying it together
//!
//! # Example
//!
//! ```no_run
//! use passport_witness::merkle::MerkleTree;
//! use passport_witness::poseidon::init_crypto;
//!
//! init_crypto();
//! let tree = MerkleTree::new(vec![1u64.into(), 2u64.into()]).unwrap();
//! let proof = tree.generate_proof(1).unwrap();
//! assert!(tree.verify_proof(&proof));
//! ```

pub mod attestation;
pub mod certificate;
pub mod circuit;
pub mod commitment;
pub mod config;
pub mod document;
pub mod error;
pub mod field;
pub mod hash;
pub mod leaves;
pub mod merkle;
pub mod metadata;
pub mod mock;
pub mod mrz;
pub mod pipeline;
pub mod poseidon;
pub mod signature;
pub mod smt;
pub mod tree_service;
pub mod types;
pub mod user_id;
pub mod utils;
pub mod validation;


pub use circuit::{CircuitInputs, CircuitParams};
pub use document::{DocumentCategory, DocumentRecord, RawDocument};
pub use error::{ErrorCategory, WitnessError};
pub use field::FieldElement;
pub use merkle::{MerkleProof, MerkleTree};
pub use pipeline::{CertificateCache, Pipeline, PipelineError, Stage, WitnessRequest, WitnessTarget};
pub use types::WitnessOutput;
