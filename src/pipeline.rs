//! The document-to-witness pipeline.
//!
//! A request moves through `Raw → Parsed → MetadataDerived → TreeProofObtained →
//! InputsGenerated` in order. Cancellation is checked before every stage and while
//! waiting on the tree service; a stage that has started computing always finishes.

use crate::certificate::{fingerprint, parse_certificate, CertificateData, CscaStore};
use crate::circuit::disclose::{
    generate_circuit_inputs_vc_and_disclose, DiscloseArtifact, DisclosePolicy, DiscloseProofs,
    OfacTrees,
};
use crate::circuit::dsc::generate_circuit_inputs_dsc;
use crate::circuit::ofac::generate_circuit_inputs_ofac;
use crate::circuit::register::{generate_circuit_inputs_register, RegisterArtifact};
use crate::circuit::{inclusion_path, CircuitInputs, CircuitParams};
use crate::commitment::{generate_commitment, generate_nullifier};
use crate::document::{DocumentRecord, RawDocument};
use crate::error::{ParseError, Result, TreeError, ValidationMismatch, WitnessError};
use crate::field::FieldElement;
use crate::leaves::{get_leaf_csca_tree, get_leaf_dsc_tree};
use crate::merkle::MerkleTree;
use crate::metadata::{derive_passport_metadata, PassportMetadata};
use crate::signature::has_verifier;
use crate::smt::SparseMerkleTree;
use crate::tree_service::{fetch_merkle_tree, fetch_ofac_trees, TreeKind, TreeSource};
use crate::types::WitnessOutput;
use crate::utils::unix_timestamp;
use crate::validation::{validate_document, NoopCallbacks, ValidationIssue, ValidationReport};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use strum::Display;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Raw,
    Parsed,
    MetadataDerived,
    TreeProofObtained,
    InputsGenerated,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// `stage` is the stage that was being produced when `source` occurred.
    #[error("{stage} stage failed: {source}")]
    Failed {
        stage: Stage,
        #[source]
        source: WitnessError,
    },
    #[error("cancelled before the {stage} stage")]
    Cancelled { stage: Stage },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Failed { stage, .. } | PipelineError::Cancelled { stage } => *stage,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled { .. })
    }

    /// The underlying error, unless the run was cancelled.
    pub fn witness_error(&self) -> Option<&WitnessError> {
        match self {
            PipelineError::Failed { source, .. } => Some(source),
            PipelineError::Cancelled { .. } => None,
        }
    }
}

fn at<T>(stage: Stage, result: Result<T>) -> std::result::Result<T, PipelineError> {
    result.map_err(|source| PipelineError::Failed { stage, source })
}

/// Parsed certificates keyed by the SHA-256 fingerprint of their DER.
///
/// Owned by the caller so it can outlive a single run. The oldest entry is evicted once
/// `capacity` is reached; a capacity of zero disables caching.
#[derive(Debug, Default)]
pub struct CertificateCache {
    capacity: usize,
    entries: HashMap<String, Arc<CertificateData>>,
    order: VecDeque<String>,
}

impl CertificateCache {
    pub fn new(capacity: usize) -> Self {
        CertificateCache {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, fingerprint: &str) -> Option<Arc<CertificateData>> {
        self.entries.get(fingerprint).cloned()
    }

    /// The parsed certificate for `der`, parsing it on a miss.
    pub fn get_or_parse(&mut self, der: &[u8]) -> std::result::Result<Arc<CertificateData>, ParseError> {
        let key = fingerprint(der);
        if let Some(cert) = self.entries.get(&key) {
            debug!("Certificate cache hit for {key}");
            return Ok(Arc::clone(cert));
        }
        let cert = Arc::new(parse_certificate(der)?);
        if self.capacity == 0 {
            return Ok(cert);
        }
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, Arc::clone(&cert));
        Ok(cert)
    }

    /// Drops one certificate. Returns whether it was cached.
    pub fn invalidate(&mut self, fingerprint: &str) -> bool {
        self.order.retain(|k| k != fingerprint);
        self.entries.remove(fingerprint).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which circuit to build inputs for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "circuit", rename_all = "snake_case")]
pub enum WitnessTarget {
    Register,
    Dsc,
    Disclose(DisclosePolicy),
    Ofac,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WitnessRequest {
    pub document: RawDocument,
    pub secret: FieldElement,
    pub target: WitnessTarget,
}

/// A document after parsing and metadata derivation.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub document: DocumentRecord,
    pub dsc: Arc<CertificateData>,
    /// Issuer of the DSC, when the trust store has it.
    pub csca: Option<Arc<CertificateData>>,
    pub metadata: PassportMetadata,
    pub report: ValidationReport,
}

impl PreparedDocument {
    fn require_csca(&self) -> Result<&CertificateData> {
        self.csca
            .as_deref()
            .ok_or_else(|| ValidationMismatch::CertificateChain.into())
    }

    fn dsc_tree_leaf(&self) -> Result<FieldElement> {
        get_leaf_dsc_tree(&self.dsc, self.require_csca()?)
    }
}

enum TreeSnapshot {
    Dsc(MerkleTree),
    Csca(MerkleTree),
    Disclose {
        commitment: FieldElement,
        dsc_tree_leaf: FieldElement,
        commitment_tree: MerkleTree,
        ofac: OfacTrees,
    },
    Ofac(OfacTrees),
}

pub type ProgressCallback = Box<dyn Fn(Stage) + Send + Sync>;

/// Runs witness requests against a tree source and a CSCA trust store.
pub struct Pipeline<'a> {
    source: &'a dyn TreeSource,
    cscas: &'a CscaStore,
    params: CircuitParams,
    progress: Option<ProgressCallback>,
}

impl<'a> Pipeline<'a> {
    pub fn new(source: &'a dyn TreeSource, cscas: &'a CscaStore, params: CircuitParams) -> Self {
        Pipeline {
            source,
            cscas,
            params,
            progress: None,
        }
    }

    /// Called with each stage as it is reached.
    pub fn with_progress(mut self, progress: impl Fn(Stage) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    fn reached(&self, stage: Stage) {
        info!("Pipeline reached {stage}");
        if let Some(progress) = &self.progress {
            progress(stage);
        }
    }

    fn checkpoint(cancel: &CancellationToken, next: Stage) -> std::result::Result<(), PipelineError> {
        if cancel.is_cancelled() {
            info!("Pipeline cancelled before {next}");
            return Err(PipelineError::Cancelled { stage: next });
        }
        Ok(())
    }

    async fn cancellable<T>(
        cancel: &CancellationToken,
        stage: Stage,
        fut: impl Future<Output = Result<T>>,
    ) -> std::result::Result<T, PipelineError> {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!("Pipeline cancelled during {stage}");
                Err(PipelineError::Cancelled { stage })
            }

            result = fut => at(stage, result),
        }
    }

    /// Parses the document and its certificates, then derives and validates metadata.
    ///
    /// A DSC whose issuer is not in the trust store still prepares, with
    /// `csca_found == false` and a `CscaNotFound` issue in the report.
    pub fn prepare(
        &self,
        raw: RawDocument,
        cache: &mut CertificateCache,
    ) -> std::result::Result<PreparedDocument, PipelineError> {
        let (document, dsc, csca) = at(Stage::Parsed, self.parse(raw, cache))?;
        self.reached(Stage::Parsed);
        let (metadata, report) = at(Stage::MetadataDerived, derive(&document, &dsc, csca.as_deref()))?;
        self.reached(Stage::MetadataDerived);
        Ok(PreparedDocument {
            document,
            dsc,
            csca,
            metadata,
            report,
        })
    }

    #[allow(clippy::type_complexity)]
    fn parse(
        &self,
        raw: RawDocument,
        cache: &mut CertificateCache,
    ) -> Result<(DocumentRecord, Arc<CertificateData>, Option<Arc<CertificateData>>)> {
        let document = DocumentRecord::from_raw(raw)?;
        let dsc = cache.get_or_parse(&document.signer_certificate)?;
        let csca = self
            .cscas
            .find_issuer(&dsc)
            .map(|der| cache.get_or_parse(der))
            .transpose()?;
        match &csca {
            Some(csca) => debug!("DSC {} issued by {}", dsc.subject, csca.subject),
            None => info!("No CSCA in the trust store for issuer {}", dsc.issuer),
        }
        Ok((document, dsc, csca))
    }

    async fn fetch_trees(
        &self,
        prepared: &PreparedDocument,
        target: &WitnessTarget,
        secret: FieldElement,
    ) -> Result<TreeSnapshot> {
        let category = prepared.document.document_category;
        match target {
            WitnessTarget::Register => {
                let leaf = prepared.dsc_tree_leaf()?;
                let tree = fetch_merkle_tree(self.source, TreeKind::Dsc, category).await?;
                inclusion_path(&tree, &leaf, self.params.dsc_tree_depth, "dsc leaf")?;
                Ok(TreeSnapshot::Dsc(tree))
            }
            WitnessTarget::Dsc => {
                let leaf = get_leaf_csca_tree(prepared.require_csca()?)?;
                let tree = fetch_merkle_tree(self.source, TreeKind::Csca, category).await?;
                inclusion_path(&tree, &leaf, self.params.csca_tree_depth, "csca leaf")?;
                Ok(TreeSnapshot::Csca(tree))
            }
            WitnessTarget::Disclose(policy) => {
                let dsc_tree_leaf = prepared.dsc_tree_leaf()?;
                let commitment = generate_commitment(
                    secret,
                    category.attestation_id(),
                    &prepared.document,
                    &prepared.metadata,
                    dsc_tree_leaf,
                )?;
                let commitment_tree = async {
                    fetch_merkle_tree(self.source, TreeKind::Identity, category).await
                };
                let ofac = async {
                    if policy.ofac {
                        fetch_ofac_trees(self.source, category).await.into_trees()
                    } else {
                        Ok(unchecked_ofac_trees(category.is_id_card()))
                    }
                };
                let (commitment_tree, ofac) = tokio::join!(commitment_tree, ofac);
                let commitment_tree = commitment_tree?;
                inclusion_path(
                    &commitment_tree,
                    &commitment,
                    self.params.commitment_tree_depth,
                    "commitment",
                )?;
                Ok(TreeSnapshot::Disclose {
                    commitment,
                    dsc_tree_leaf,
                    commitment_tree,
                    ofac: ofac?,
                })
            }
            WitnessTarget::Ofac => Ok(TreeSnapshot::Ofac(
                fetch_ofac_trees(self.source, category).await.into_trees()?,
            )),
        }
    }

    fn generate(
        &self,
        prepared: &PreparedDocument,
        target: &WitnessTarget,
        trees: &TreeSnapshot,
        secret: FieldElement,
    ) -> Result<(CircuitInputs, Option<FieldElement>)> {
        let document = &prepared.document;
        match (target, trees) {
            (WitnessTarget::Register, TreeSnapshot::Dsc(tree)) => {
                let csca = prepared.require_csca()?;
                let inputs = generate_circuit_inputs_register(
                    RegisterArtifact {
                        document,
                        metadata: &prepared.metadata,
                        dsc: prepared.dsc.as_ref(),
                        csca,
                        secret,
                    },
                    tree,
                    &self.params,
                )?;
                let commitment = generate_commitment(
                    secret,
                    document.document_category.attestation_id(),
                    document,
                    &prepared.metadata,
                    prepared.dsc_tree_leaf()?,
                )?;
                Ok((inputs, Some(commitment)))
            }
            (WitnessTarget::Dsc, TreeSnapshot::Csca(tree)) => {
                let inputs = generate_circuit_inputs_dsc(
                    document.document_category,
                    &prepared.metadata,
                    &prepared.dsc,
                    prepared.require_csca()?,
                    tree,
                    &self.params,
                )?;
                Ok((inputs, None))
            }
            (
                WitnessTarget::Disclose(policy),
                TreeSnapshot::Disclose {
                    commitment,
                    dsc_tree_leaf,
                    commitment_tree,
                    ofac,
                },
            ) => {
                let inputs = generate_circuit_inputs_vc_and_disclose(
                    DiscloseArtifact {
                        document,
                        metadata: &prepared.metadata,
                        secret,
                        dsc_tree_leaf: *dsc_tree_leaf,
                    },
                    policy,
                    DiscloseProofs {
                        commitment_tree,
                        ofac,
                    },
                    &self.params,
                )?;
                Ok((inputs, Some(*commitment)))
            }
            (WitnessTarget::Ofac, TreeSnapshot::Ofac(ofac)) => {
                Ok((generate_circuit_inputs_ofac(document, ofac)?, None))
            }
            _ => Err(TreeError::InvalidTreeData(
                "tree snapshot does not match the requested circuit".to_string(),
            )
            .into()),
        }
    }

    /// Runs a request through every stage and returns the circuit inputs.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Cancelled`] if `cancel` fires before a stage or during the tree
    /// fetch, otherwise [`PipelineError::Failed`] with the stage that failed. Register,
    /// DSC and disclosure requests need the DSC's issuer in the trust store and fail at
    /// [`Stage::TreeProofObtained`] with [`ValidationMismatch::CertificateChain`]
    /// without it.
    pub async fn run(
        &self,
        request: WitnessRequest,
        cache: &mut CertificateCache,
        cancel: &CancellationToken,
    ) -> std::result::Result<WitnessOutput, PipelineError> {
        let WitnessRequest {
            document,
            secret,
            target,
        } = request;
        self.reached(Stage::Raw);

        Self::checkpoint(cancel, Stage::Parsed)?;
        let (document, dsc, csca) = at(Stage::Parsed, self.parse(document, cache))?;
        self.reached(Stage::Parsed);

        Self::checkpoint(cancel, Stage::MetadataDerived)?;
        let (metadata, report) = at(Stage::MetadataDerived, derive(&document, &dsc, csca.as_deref()))?;
        self.reached(Stage::MetadataDerived);
        let prepared = PreparedDocument {
            document,
            dsc,
            csca,
            metadata,
            report,
        };

        Self::checkpoint(cancel, Stage::TreeProofObtained)?;
        let trees = Self::cancellable(
            cancel,
            Stage::TreeProofObtained,
            self.fetch_trees(&prepared, &target, secret),
        )
        .await?;
        self.reached(Stage::TreeProofObtained);

        Self::checkpoint(cancel, Stage::InputsGenerated)?;
        let (inputs, commitment) = at(
            Stage::InputsGenerated,
            self.generate(&prepared, &target, &trees, secret),
        )?;
        let attestation_id = prepared.document.document_category.attestation_id();
        let nullifier = at(
            Stage::InputsGenerated,
            generate_nullifier(secret, attestation_id).map_err(WitnessError::from),
        )?;
        self.reached(Stage::InputsGenerated);

        Ok(WitnessOutput {
            circuit_name: inputs.circuit_name.clone(),
            attestation_id,
            commitment,
            nullifier,
            inputs,
            timestamp: unix_timestamp(),
        })
    }
}

/// Metadata plus the validation report. A DG1 that eContent does not commit to is
/// fatal; every other finding is left to circuit routing.
fn derive(
    document: &DocumentRecord,
    dsc: &CertificateData,
    csca: Option<&CertificateData>,
) -> Result<(PassportMetadata, ValidationReport)> {
    let metadata = derive_passport_metadata(document, dsc, csca)?;
    let report = validate_document(document, Some(&metadata), &mut NoopCallbacks);
    for issue in &report.issues {
        warn!("Validation: {issue:?}");
    }
    if report.has(&ValidationIssue::Dg1HashMismatch)
        || report.has(&ValidationIssue::Dg1HashFunctionNull)
    {
        return Err(ValidationMismatch::Dg1Hash.into());
    }
    if document.signed_attributes.is_some() && metadata.e_content_hash_function.is_none() {
        return Err(ValidationMismatch::EContentHash.into());
    }
    if metadata.signed_attr_hash_function.is_none() && has_verifier(&dsc.public_key) {
        return Err(ValidationMismatch::DocumentSignature.into());
    }
    Ok((metadata, report))
}

/// Empty sanctions trees for disclosures that do not check sanctions.
fn unchecked_ofac_trees(id_card: bool) -> OfacTrees {
    OfacTrees {
        passport_number: (!id_card).then(SparseMerkleTree::new),
        ..OfacTrees::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentCategory;
    use crate::mock::{build_mock_document, MockHashes, MockSigner, SAMPLE_TD3_MRZ};
    use crate::tree_service::MemoryTreeSource;
    use crate::utils::ByteEncoding;
    use std::sync::Mutex;

    const CSCA_PEM: &[u8] = include_bytes!("../tests/fixtures/csca_rsa2048.pem");
    const DSC_PEM: &[u8] = include_bytes!("../tests/fixtures/dsc_p256.pem");
    const DSC_KEY: &[u8] = include_bytes!("../tests/fixtures/dsc_p256_key.pem");

    fn raw_document() -> RawDocument {
        let dsc = parse_certificate(DSC_PEM).unwrap();
        let signer = MockSigner::from_pkcs8(DSC_KEY).unwrap();
        build_mock_document(
            SAMPLE_TD3_MRZ,
            DocumentCategory::Passport,
            MockHashes::default(),
            &signer,
            &dsc.raw,
        )
        .unwrap()
        .to_raw(ByteEncoding::Hex)
    }

    fn trust_store() -> CscaStore {
        let mut store = CscaStore::new();
        store.insert(CSCA_PEM).unwrap();
        store
    }

    #[test]
    fn test_stages_are_ordered() {
        assert!(Stage::Raw < Stage::Parsed);
        assert!(Stage::TreeProofObtained < Stage::InputsGenerated);
        assert_eq!(Stage::TreeProofObtained.to_string(), "tree_proof_obtained");
    }

    #[test]
    fn test_cache_evicts_oldest_and_invalidates() {
        let csca = parse_certificate(CSCA_PEM).unwrap();
        let dsc = parse_certificate(DSC_PEM).unwrap();
        let mut cache = CertificateCache::new(1);

        let first = cache.get_or_parse(&csca.raw).unwrap();
        let again = cache.get_or_parse(&csca.raw).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(cache.len(), 1);

        cache.get_or_parse(&dsc.raw).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&csca.fingerprint()).is_none());
        assert!(cache.get(&dsc.fingerprint()).is_some());

        assert!(cache.invalidate(&dsc.fingerprint()));
        assert!(!cache.invalidate(&dsc.fingerprint()));
        assert!(cache.is_empty());

        let mut cache = CertificateCache::new(4);
        cache.get_or_parse(&csca.raw).unwrap();
        cache.get_or_parse(&dsc.raw).unwrap();
        cache.clear();
        assert!(cache.is_empty());

        let mut disabled = CertificateCache::new(0);
        disabled.get_or_parse(&csca.raw).unwrap();
        assert!(disabled.is_empty());
    }

    #[test]
    fn test_prepare_without_trust_store() {
        let source = MemoryTreeSource::new();
        let store = CscaStore::new();
        let pipeline = Pipeline::new(&source, &store, CircuitParams::default());
        let mut cache = CertificateCache::new(8);

        let prepared = pipeline.prepare(raw_document(), &mut cache).unwrap();
        assert!(prepared.csca.is_none());
        assert!(!prepared.metadata.csca_found);
        assert!(prepared.report.has(&ValidationIssue::CscaNotFound));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_register_without_csca_fails_at_tree_stage() {
        let source = MemoryTreeSource::new();
        let store = CscaStore::new();
        let pipeline = Pipeline::new(&source, &store, CircuitParams::default());
        let request = WitnessRequest {
            document: raw_document(),
            secret: 42u64.into(),
            target: WitnessTarget::Register,
        };
        let err = pipeline
            .run(request, &mut CertificateCache::new(8), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Stage::TreeProofObtained);
        assert!(matches!(
            err.witness_error(),
            Some(WitnessError::Mismatch(ValidationMismatch::CertificateChain))
        ));
    }

    #[tokio::test]
    async fn test_register_reports_every_stage() {
        let dsc = parse_certificate(DSC_PEM).unwrap();
        let csca = parse_certificate(CSCA_PEM).unwrap();
        let mut source = MemoryTreeSource::new();
        source
            .insert_leaves(
                TreeKind::Dsc,
                DocumentCategory::Passport,
                vec![7u64.into(), get_leaf_dsc_tree(&dsc, &csca).unwrap()],
            )
            .unwrap();
        let store = trust_store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let pipeline = Pipeline::new(&source, &store, CircuitParams::default())
            .with_progress(move |stage| recorder.lock().unwrap().push(stage));

        let request = WitnessRequest {
            document: raw_document(),
            secret: 42u64.into(),
            target: WitnessTarget::Register,
        };
        let output = pipeline
            .run(request, &mut CertificateCache::new(8), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Stage::Raw,
                Stage::Parsed,
                Stage::MetadataDerived,
                Stage::TreeProofObtained,
                Stage::InputsGenerated
            ]
        );
        assert!(output.circuit_name.starts_with("register_sha256_sha256_sha256_ecdsa"));
        assert!(output.commitment.is_some());
        assert_eq!(
            output.nullifier,
            generate_nullifier(42u64.into(), 1).unwrap()
        );
        output.validate().unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_parsing() {
        let source = MemoryTreeSource::new();
        let store = trust_store();
        let pipeline = Pipeline::new(&source, &store, CircuitParams::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let request = WitnessRequest {
            document: raw_document(),
            secret: 1u64.into(),
            target: WitnessTarget::Ofac,
        };
        let err = pipeline
            .run(request, &mut CertificateCache::new(8), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.stage(), Stage::Parsed);
    }
}
