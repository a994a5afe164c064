//! Fetching registry snapshots: the CSCA, DSC and commitment LeanIMTs and the OFAC
//! sparse trees.
//!
//! The HTTP source makes exactly one request per tree with a caller-supplied timeout.
//! Failures are returned as [`TreeError`] and never retried here.

use crate::circuit::disclose::OfacTrees;
use crate::document::DocumentCategory;
use crate::error::{Result, TreeError, UnsupportedAlgorithm};
use crate::field::FieldElement;
use crate::merkle::{build_smt, MerkleTree};
use crate::smt::SparseMerkleTree;
use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use strum::Display;

/// A registry tree the pipeline reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TreeKind {
    Csca,
    Dsc,
    /// Registered identity commitments.
    Identity,
    OfacPassportNumber,
    OfacNameDob,
    OfacNameYob,
}

impl TreeKind {
    /// Path of the tree for a document category, relative to the service base URL.
    pub fn url_suffix(&self, category: DocumentCategory) -> Result<String> {
        let id = match category {
            DocumentCategory::Passport => "",
            DocumentCategory::IdCard => "-id",
            DocumentCategory::Aadhaar => {
                return Err(UnsupportedAlgorithm::Circuit(format!(
                    "no {self} tree for {category} documents"
                ))
                .into())
            }
        };
        let suffix = match self {
            TreeKind::Csca => format!("/csca{id}"),
            TreeKind::Dsc => format!("/dsc{id}"),
            TreeKind::Identity => format!("/identity{id}"),
            TreeKind::OfacPassportNumber if category.is_id_card() => {
                return Err(UnsupportedAlgorithm::Circuit(
                    "id cards have no passport number sanctions tree".to_string(),
                )
                .into())
            }
            TreeKind::OfacPassportNumber => "/ofac/passport-no-nationality".to_string(),
            TreeKind::OfacNameDob => format!("/ofac/name-dob{id}"),
            TreeKind::OfacNameYob => format!("/ofac/name-yob{id}"),
        };
        Ok(suffix)
    }
}

/// Where tree snapshots come from.
#[async_trait]
pub trait TreeSource: Send + Sync {
    /// Leaves of a LeanIMT registry, in insertion order.
    async fn fetch_leaves(
        &self,
        kind: TreeKind,
        category: DocumentCategory,
    ) -> Result<Vec<FieldElement>>;

    /// `(key, value)` entries of a sparse tree.
    async fn fetch_entries(
        &self,
        kind: TreeKind,
        category: DocumentCategory,
    ) -> Result<Vec<(FieldElement, FieldElement)>>;
}

#[derive(Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    data: Value,
}

fn shape(url: &str, reason: impl ToString) -> TreeError {
    TreeError::Shape {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

/// Some registries send `data` as a JSON document inside a string.
fn unwrap_data(url: &str, data: Value) -> std::result::Result<Vec<Value>, TreeError> {
    let data = match data {
        Value::String(text) => serde_json::from_str(&text).map_err(|e| shape(url, e))?,
        other => other,
    };
    match data {
        Value::Array(items) => Ok(items),
        other => Err(shape(url, format!("expected an array, got {other}"))),
    }
}

fn field(url: &str, value: &Value) -> std::result::Result<FieldElement, TreeError> {
    match value {
        Value::String(s) => FieldElement::from_str(s).map_err(|e| shape(url, e)),
        Value::Number(n) => n
            .as_u64()
            .map(FieldElement::from)
            .ok_or_else(|| shape(url, format!("{n} is not a field element"))),
        other => Err(shape(url, format!("{other} is not a field element"))),
    }
}

/// Parses a LeanIMT payload: a flat array of leaves.
pub fn parse_leaves(url: &str, data: Value) -> std::result::Result<Vec<FieldElement>, TreeError> {
    unwrap_data(url, data)?
        .iter()
        .map(|leaf| field(url, leaf))
        .collect()
}

/// Parses a sparse-tree payload: an array of `[key, value]` pairs.
pub fn parse_entries(
    url: &str,
    data: Value,
) -> std::result::Result<Vec<(FieldElement, FieldElement)>, TreeError> {
    unwrap_data(url, data)?
        .iter()
        .map(|entry| match entry.as_array().map(Vec::as_slice) {
            Some([key, value]) => Ok((field(url, key)?, field(url, value)?)),
            _ => Err(shape(url, format!("{entry} is not a [key, value] pair"))),
        })
        .collect()
}

/// Registry over HTTP: `GET {base_url}{suffix}` returning
/// `{ "status": "success", "data": [...] }`.
#[derive(Debug, Clone)]
pub struct HttpTreeSource {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTreeSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, timeout)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        HttpTreeSource {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    async fn fetch_data(&self, kind: TreeKind, category: DocumentCategory) -> Result<(String, Value)> {
        let url = format!("{}{}", self.base_url, kind.url_suffix(category)?);
        debug!("Fetching {kind} tree from {url}");
        let fetch_error = |source| TreeError::Fetch {
            url: url.clone(),
            source,
        };

        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(fetch_error)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TreeError::HttpStatus {
                url: url.clone(),
                status: status.as_u16(),
            }
            .into());
        }
        let body = resp.bytes().await.map_err(fetch_error)?;
        let envelope: Envelope = serde_json::from_slice(&body).map_err(|e| shape(&url, e))?;
        if envelope.status != "success" {
            return Err(shape(&url, format!("status is '{}'", envelope.status)).into());
        }
        Ok((url, envelope.data))
    }
}

#[async_trait]
impl TreeSource for HttpTreeSource {
    async fn fetch_leaves(
        &self,
        kind: TreeKind,
        category: DocumentCategory,
    ) -> Result<Vec<FieldElement>> {
        let (url, data) = self.fetch_data(kind, category).await?;
        let leaves = parse_leaves(&url, data)?;
        info!("Fetched {} leaves of the {kind} tree", leaves.len());
        Ok(leaves)
    }

    async fn fetch_entries(
        &self,
        kind: TreeKind,
        category: DocumentCategory,
    ) -> Result<Vec<(FieldElement, FieldElement)>> {
        let (url, data) = self.fetch_data(kind, category).await?;
        let entries = parse_entries(&url, data)?;
        info!("Fetched {} entries of the {kind} tree", entries.len());
        Ok(entries)
    }
}

#[derive(Debug, Clone)]
enum Snapshot {
    Leaves(Vec<FieldElement>),
    Entries(Vec<(FieldElement, FieldElement)>),
}

/// Snapshots held in memory, keyed like the HTTP paths. Used for local leaf files and
/// tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryTreeSource {
    snapshots: HashMap<String, Snapshot>,
}

impl MemoryTreeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_leaves(
        &mut self,
        kind: TreeKind,
        category: DocumentCategory,
        leaves: Vec<FieldElement>,
    ) -> Result<&mut Self> {
        self.snapshots
            .insert(kind.url_suffix(category)?, Snapshot::Leaves(leaves));
        Ok(self)
    }

    pub fn insert_entries(
        &mut self,
        kind: TreeKind,
        category: DocumentCategory,
        entries: Vec<(FieldElement, FieldElement)>,
    ) -> Result<&mut Self> {
        self.snapshots
            .insert(kind.url_suffix(category)?, Snapshot::Entries(entries));
        Ok(self)
    }

    fn snapshot(&self, kind: TreeKind, category: DocumentCategory) -> Result<(String, &Snapshot)> {
        let suffix = kind.url_suffix(category)?;
        match self.snapshots.get(&suffix) {
            Some(snapshot) => Ok((suffix, snapshot)),
            None => Err(TreeError::InvalidTreeData(format!("no snapshot for {suffix}")).into()),
        }
    }
}

#[async_trait]
impl TreeSource for MemoryTreeSource {
    async fn fetch_leaves(
        &self,
        kind: TreeKind,
        category: DocumentCategory,
    ) -> Result<Vec<FieldElement>> {
        match self.snapshot(kind, category)? {
            (_, Snapshot::Leaves(leaves)) => Ok(leaves.clone()),
            (suffix, Snapshot::Entries(_)) => {
                Err(TreeError::InvalidTreeData(format!("{suffix} holds entries, not leaves")).into())
            }
        }
    }

    async fn fetch_entries(
        &self,
        kind: TreeKind,
        category: DocumentCategory,
    ) -> Result<Vec<(FieldElement, FieldElement)>> {
        match self.snapshot(kind, category)? {
            (_, Snapshot::Entries(entries)) => Ok(entries.clone()),
            (suffix, Snapshot::Leaves(_)) => {
                Err(TreeError::InvalidTreeData(format!("{suffix} holds leaves, not entries")).into())
            }
        }
    }
}

/// Fetches a LeanIMT registry and rebuilds it.
pub async fn fetch_merkle_tree(
    source: &dyn TreeSource,
    kind: TreeKind,
    category: DocumentCategory,
) -> Result<MerkleTree> {
    let leaves = source.fetch_leaves(kind, category).await?;
    Ok(MerkleTree::new(leaves)?)
}

async fn fetch_smt(
    source: &dyn TreeSource,
    kind: TreeKind,
    category: DocumentCategory,
) -> Result<SparseMerkleTree> {
    let entries = source.fetch_entries(kind, category).await?;
    build_smt(&entries).map_err(|e| TreeError::InvalidTreeData(format!("{kind}: {e}")).into())
}

/// Outcome of fetching each sanctions tree, reported separately.
#[derive(Debug)]
pub struct OfacFetch {
    /// `None` for id cards.
    pub passport_number: Option<Result<SparseMerkleTree>>,
    pub name_dob: Result<SparseMerkleTree>,
    pub name_yob: Result<SparseMerkleTree>,
}

impl OfacFetch {
    /// All trees, or the first failure.
    pub fn into_trees(self) -> Result<OfacTrees> {
        Ok(OfacTrees {
            passport_number: self.passport_number.transpose()?,
            name_dob: self.name_dob?,
            name_yob: self.name_yob?,
        })
    }
}

/// Fetches every sanctions tree for `category` concurrently.
pub async fn fetch_ofac_trees(source: &dyn TreeSource, category: DocumentCategory) -> OfacFetch {
    let passport_number = async {
        if category.is_id_card() {
            None
        } else {
            Some(fetch_smt(source, TreeKind::OfacPassportNumber, category).await)
        }
    };
    let (passport_number, name_dob, name_yob) = tokio::join!(
        passport_number,
        fetch_smt(source, TreeKind::OfacNameDob, category),
        fetch_smt(source, TreeKind::OfacNameYob, category),
    );
    OfacFetch {
        passport_number,
        name_dob,
        name_yob,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WitnessError;
    use serde_json::json;

    #[test]
    fn test_url_suffixes() {
        use DocumentCategory::*;
        assert_eq!(TreeKind::Csca.url_suffix(Passport).unwrap(), "/csca");
        assert_eq!(TreeKind::Dsc.url_suffix(IdCard).unwrap(), "/dsc-id");
        assert_eq!(TreeKind::Identity.url_suffix(IdCard).unwrap(), "/identity-id");
        assert_eq!(
            TreeKind::OfacPassportNumber.url_suffix(Passport).unwrap(),
            "/ofac/passport-no-nationality"
        );
        assert_eq!(
            TreeKind::OfacNameYob.url_suffix(IdCard).unwrap(),
            "/ofac/name-yob-id"
        );
        assert!(TreeKind::OfacPassportNumber.url_suffix(IdCard).is_err());
        assert!(TreeKind::Csca.url_suffix(Aadhaar).is_err());
    }

    #[test]
    fn test_parse_leaves_accepts_stringified_data() {
        let leaves = parse_leaves("u", json!(["1", "0x02", 3])).unwrap();
        assert_eq!(leaves, vec![1u64.into(), 2u64.into(), 3u64.into()]);

        let nested = parse_leaves("u", json!("[\"4\",\"5\"]")).unwrap();
        assert_eq!(nested, vec![4u64.into(), 5u64.into()]);

        assert!(matches!(
            parse_leaves("u", json!({"leaves": []})),
            Err(TreeError::Shape { .. })
        ));
        assert!(parse_leaves("u", json!(["not a number"])).is_err());
    }

    #[test]
    fn test_parse_entries() {
        let entries = parse_entries("u", json!([["1", "2"], ["0x3", 4]])).unwrap();
        assert_eq!(
            entries,
            vec![(1u64.into(), 2u64.into()), (3u64.into(), 4u64.into())]
        );
        assert!(parse_entries("u", json!([["1"]])).is_err());
    }

    #[tokio::test]
    async fn test_memory_source_builds_trees() {
        let mut source = MemoryTreeSource::new();
        source
            .insert_leaves(
                TreeKind::Dsc,
                DocumentCategory::Passport,
                vec![1u64.into(), 2u64.into()],
            )
            .unwrap()
            .insert_entries(
                TreeKind::OfacNameDob,
                DocumentCategory::IdCard,
                vec![(5u64.into(), 1u64.into())],
            )
            .unwrap()
            .insert_entries(
                TreeKind::OfacNameYob,
                DocumentCategory::IdCard,
                vec![(6u64.into(), 1u64.into())],
            )
            .unwrap();

        let tree = fetch_merkle_tree(&source, TreeKind::Dsc, DocumentCategory::Passport)
            .await
            .unwrap();
        assert_eq!(tree.size(), 2);

        let fetch = fetch_ofac_trees(&source, DocumentCategory::IdCard).await;
        assert!(fetch.passport_number.is_none());
        let trees = fetch.into_trees().unwrap();
        assert_eq!(trees.name_dob.get(&5u64.into()), Some(1u64.into()));

        let err = fetch_merkle_tree(&source, TreeKind::OfacNameDob, DocumentCategory::IdCard)
            .await
            .unwrap_err();
        assert!(matches!(err, WitnessError::Tree(TreeError::InvalidTreeData(_))));
    }

    #[tokio::test]
    async fn test_missing_ofac_tree_reported_separately() {
        let mut source = MemoryTreeSource::new();
        source
            .insert_entries(TreeKind::OfacNameDob, DocumentCategory::Passport, vec![])
            .unwrap();
        let fetch = fetch_ofac_trees(&source, DocumentCategory::Passport).await;
        assert!(fetch.name_dob.is_ok());
        assert!(matches!(fetch.passport_number, Some(Err(_))));
        assert!(fetch.name_yob.is_err());
    }
}
