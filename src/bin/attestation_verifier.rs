use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use passport_witness::attestation::{verify_attestation, AttestationKey};
use std::fs;
use std::path::PathBuf;

/// Attestation documents are small; anything larger is not one.
const MAX_ATTESTATION_FILE_SIZE: u64 = 64 * 1024;

#[derive(Parser, Debug)]
#[command(author, version, about = "Verifies a COSE_Sign1 attestation document", long_about = None)]
struct Args {
    /// COSE_Sign1 document, raw CBOR or hex text
    #[arg(short, long)]
    attestation: PathBuf,

    /// Curve of the signing key, e.g. P-256 or P-384
    #[arg(long, default_value = "P-256")]
    curve: String,

    /// Public key x coordinate, hex
    #[arg(short, long)]
    x: String,

    /// Public key y coordinate, hex
    #[arg(short, long)]
    y: String,

    /// Also write the verified payload to this file
    #[arg(long)]
    payload_out: Option<PathBuf>,
}

fn read_attestation(path: &PathBuf) -> Result<Vec<u8>> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to read attestation metadata: {}", path.display()))?;
    if metadata.len() > MAX_ATTESTATION_FILE_SIZE {
        return Err(anyhow::anyhow!(
            "Attestation file too large: {} bytes (max {} bytes)",
            metadata.len(),
            MAX_ATTESTATION_FILE_SIZE
        ));
    }
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read attestation: {}", path.display()))?;

    match std::str::from_utf8(&bytes) {
        Ok(text) if !text.trim().is_empty() && text.trim().bytes().all(|b| b.is_ascii_hexdigit()) => {
            hex::decode(text.trim()).context("Failed to decode hex attestation")
        }
        _ => Ok(bytes),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    info!("Loading attestation from: {}", args.attestation.display());
    let cose = read_attestation(&args.attestation)?;

    let key = AttestationKey {
        curve: args.curve,
        x: args.x,
        y: args.y,
    };
    let verified = match verify_attestation(&cose, &key) {
        Ok(verified) => verified,
        Err(e) => {
            error!("Attestation verification FAILED: {e}");
            return Err(e).context("Attestation is not trusted");
        }
    };

    info!("Attestation verification PASSED");
    if let Some(alg) = verified.algorithm() {
        info!("Protected header alg: {alg}");
    }
    info!("Payload: {} bytes", verified.payload.len());

    if let Some(path) = args.payload_out {
        fs::write(&path, &verified.payload)
            .with_context(|| format!("Failed to write payload to {}", path.display()))?;
        info!("Payload written to: {}", path.display());
    }

    Ok(())
}
