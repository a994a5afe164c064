use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, ValueEnum};
use log::{info, warn};
use passport_witness::certificate::CscaStore;
use passport_witness::circuit::disclose::DisclosePolicy;
use passport_witness::config::Config;
use passport_witness::document::{DocumentCategory, RawDocument};
use passport_witness::field::FieldElement;
use passport_witness::poseidon::init_crypto;
use passport_witness::tree_service::{
    parse_entries, parse_leaves, HttpTreeSource, MemoryTreeSource, TreeKind, TreeSource,
};
use passport_witness::{CertificateCache, Pipeline, WitnessRequest, WitnessTarget};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Circuit {
    Register,
    Dsc,
    Disclose,
    Ofac,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Builds circuit inputs for a scanned identity document", long_about = None)]
struct Args {
    /// Document JSON
    #[arg(short, long)]
    document: PathBuf,

    /// Holder secret, decimal or 0x-prefixed hex
    #[arg(short, long)]
    secret: String,

    #[arg(short, long, value_enum, default_value = "register")]
    circuit: Circuit,

    /// Disclosure policy JSON, required for `disclose`
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Directory of trusted CSCA certificates
    #[arg(long)]
    csca_dir: Option<PathBuf>,

    /// Read tree snapshots from this directory instead of the tree service
    #[arg(long)]
    leaves_dir: Option<PathBuf>,

    #[arg(long, default_value = "witness.toml")]
    config: PathBuf,

    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn read_limited(path: &Path, max_size: u64, what: &str) -> Result<String> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to read {what} metadata: {}", path.display()))?;
    if metadata.len() > max_size {
        return Err(anyhow::anyhow!(
            "{what} file too large: {} bytes (max {} bytes)",
            metadata.len(),
            max_size
        ));
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {what}: {}", path.display()))
}

/// `/ofac/name-dob-id` is stored as `ofac_name-dob-id.json`.
fn snapshot_file(dir: &Path, suffix: &str) -> PathBuf {
    dir.join(format!("{}.json", suffix.trim_start_matches('/').replace('/', "_")))
}

/// Loads whichever snapshots for `category` exist in `dir`.
fn load_local_trees(dir: &Path, category: DocumentCategory) -> Result<MemoryTreeSource> {
    let mut source = MemoryTreeSource::new();
    let kinds = [
        TreeKind::Csca,
        TreeKind::Dsc,
        TreeKind::Identity,
        TreeKind::OfacPassportNumber,
        TreeKind::OfacNameDob,
        TreeKind::OfacNameYob,
    ];
    for kind in kinds {
        let Ok(suffix) = kind.url_suffix(category) else {
            continue;
        };
        let path = snapshot_file(dir, &suffix);
        if !path.exists() {
            continue;
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let data: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        let location = path.display().to_string();
        match kind {
            TreeKind::Csca | TreeKind::Dsc | TreeKind::Identity => {
                source.insert_leaves(kind, category, parse_leaves(&location, data)?)?;
            }
            _ => {
                source.insert_entries(kind, category, parse_entries(&location, data)?)?;
            }
        }
        info!("Loaded {kind} snapshot from {location}");
    }
    Ok(source)
}

fn load_policy(path: Option<&Path>) -> Result<DisclosePolicy> {
    let path = path.context("--policy is required for the disclose circuit")?;
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read policy: {}", path.display()))?;
    let mut policy: DisclosePolicy =
        serde_json::from_str(&text).context("Failed to parse disclosure policy")?;
    if policy.current_date.is_empty() {
        policy.current_date = Local::now().format("%y%m%d").to_string();
        info!("Using today's date {}", policy.current_date);
    }
    Ok(policy)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load_from_file_or_default(&args.config);
    init_crypto();

    info!("Loading document from: {}", args.document.display());
    let text = read_limited(
        &args.document,
        config.input.max_document_file_size,
        "Document",
    )?;
    let document: RawDocument =
        serde_json::from_str(&text).context("Failed to parse document JSON")?;
    let category = document.document_category;

    let secret = FieldElement::from_str(args.secret.trim())
        .map_err(|e| anyhow::anyhow!("Invalid secret: {e}"))?;

    let target = match args.circuit {
        Circuit::Register => WitnessTarget::Register,
        Circuit::Dsc => WitnessTarget::Dsc,
        Circuit::Disclose => WitnessTarget::Disclose(load_policy(args.policy.as_deref())?),
        Circuit::Ofac => WitnessTarget::Ofac,
    };

    let cscas = match args.csca_dir.as_ref().or(config.pipeline.csca_dir.as_ref()) {
        Some(dir) => CscaStore::load_from_dir(dir)
            .with_context(|| format!("Failed to load CSCAs from {}", dir.display()))?,
        None => {
            warn!("No CSCA directory configured; only the OFAC circuit can be built");
            CscaStore::new()
        }
    };

    let source: Box<dyn TreeSource> = match &args.leaves_dir {
        Some(dir) => Box::new(load_local_trees(dir, category)?),
        None => {
            info!("Fetching trees from {}", config.trees.base_url);
            Box::new(HttpTreeSource::new(
                config.trees.base_url.clone(),
                config.trees.timeout(),
            ))
        }
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, cancelling");
            on_signal.cancel();
        }
    });

    let pipeline = Pipeline::new(source.as_ref(), &cscas, config.circuit);
    let mut cache = CertificateCache::new(config.pipeline.cache_capacity);
    let request = WitnessRequest {
        document,
        secret,
        target,
    };
    let output = pipeline
        .run(request, &mut cache, &cancel)
        .await
        .context("Witness generation failed")?;
    output.validate().context("Generated witness failed validation")?;

    info!("Circuit: {}", output.circuit_name);
    if let Some(commitment) = &output.commitment {
        info!("Commitment: {commitment}");
    }
    info!("Nullifier: {}", output.nullifier);

    let output_path = args.output.unwrap_or(config.input.output_file);
    let json = output
        .inputs
        .to_json()
        .context("Failed to serialize circuit inputs")?;
    fs::write(&output_path, json)
        .with_context(|| format!("Failed to write inputs to {}", output_path.display()))?;
    info!("Circuit inputs written to: {}", output_path.display());

    let summary_path = output_path.with_extension("witness.json");
    let summary = serde_json::to_string_pretty(&output).context("Failed to serialize witness")?;
    fs::write(&summary_path, summary)
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;
    info!("Witness summary written to: {}", summary_path.display());

    Ok(())
}
