//! Scanned document records and the JSON shape they arrive in.

use crate::error::ParseError;
use crate::hash::HashAlgorithm;
use crate::mrz::{self, MrzInfo, MrzLayout};
use crate::utils::{decode_bytes, encode_bytes, ByteEncoding};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};
use x509_parser::der_parser::ber::BerObject;
use x509_parser::der_parser::parse_der;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentCategory {
    Passport,
    IdCard,
    Aadhaar,
}

impl DocumentCategory {
    /// Identifier bound into every commitment and nullifier.
    pub fn attestation_id(&self) -> u64 {
        match self {
            DocumentCategory::Passport => 1,
            DocumentCategory::IdCard => 2,
            DocumentCategory::Aadhaar => 3,
        }
    }

    /// True for categories whose circuits use the `_id` names.
    pub fn is_id_card(&self) -> bool {
        matches!(self, DocumentCategory::IdCard)
    }
}

/// A byte field as it appears in JSON: encoded text or an array of byte values.
///
/// Arrays may hold signed (`-128..=127`) or unsigned values; both map to the same byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawBytes {
    Text(String),
    Array(Vec<i16>),
}

impl RawBytes {
    pub fn decode(&self, field: &str, encoding: ByteEncoding) -> Result<Vec<u8>, ParseError> {
        match self {
            RawBytes::Text(text) => decode_bytes(field, text, encoding),
            RawBytes::Array(values) => values
                .iter()
                .map(|&v| {
                    if (-128..=255).contains(&v) {
                        Ok((v & 0xff) as u8)
                    } else {
                        Err(ParseError::Document(format!(
                            "{field}: {v} is not a byte value"
                        )))
                    }
                })
                .collect(),
        }
    }
}

/// Document input before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub document_category: DocumentCategory,
    pub mrz: String,
    #[serde(default)]
    pub encoding: ByteEncoding,
    #[serde(default)]
    pub data_group_hashes: BTreeMap<u8, RawBytes>,
    pub e_content: RawBytes,
    #[serde(default)]
    pub signed_attributes: Option<RawBytes>,
    pub signature: RawBytes,
    /// PEM text, or DER bytes in `encoding`.
    pub signer_certificate: String,
    #[serde(default)]
    pub mock: bool,
}

/// Immutable, normalized view of a scanned document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub document_category: DocumentCategory,
    /// MRZ characters with line breaks removed.
    pub mrz: String,
    pub data_group_hashes: BTreeMap<u8, Vec<u8>>,
    pub e_content: Vec<u8>,
    pub signed_attributes: Option<Vec<u8>>,
    pub signature: Vec<u8>,
    /// DER encoding of the document signer certificate.
    pub signer_certificate: Vec<u8>,
    pub mock: bool,
}

fn pem_to_der(pem_text: &str) -> Result<Vec<u8>, ParseError> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(pem_text.trim().as_bytes())
        .map_err(|e| ParseError::Certificate(format!("invalid PEM: {e}")))?;
    Ok(pem.contents)
}

/// Accepts PEM text or DER in the given encoding.
pub fn certificate_to_der(input: &str, encoding: ByteEncoding) -> Result<Vec<u8>, ParseError> {
    if input.trim_start().starts_with("-----BEGIN") {
        pem_to_der(input)
    } else {
        decode_bytes("signer_certificate", input, encoding)
    }
}

impl DocumentRecord {
    /// Normalizes encodings and fills data-group hashes from eContent when absent.
    pub fn from_raw(raw: RawDocument) -> Result<Self, ParseError> {
        let mrz = mrz::normalize_mrz(&raw.mrz);
        mrz::detect_layout(&mrz)?;

        let e_content = raw.e_content.decode("e_content", raw.encoding)?;
        let signed_attributes = raw
            .signed_attributes
            .as_ref()
            .map(|sa| sa.decode("signed_attributes", raw.encoding))
            .transpose()?;
        let signature = raw.signature.decode("signature", raw.encoding)?;
        let signer_certificate = certificate_to_der(&raw.signer_certificate, raw.encoding)?;

        let mut data_group_hashes = BTreeMap::new();
        for (dg, value) in &raw.data_group_hashes {
            let bytes = value.decode(&format!("data_group_hashes[{dg}]"), raw.encoding)?;
            data_group_hashes.insert(*dg, bytes);
        }
        if data_group_hashes.is_empty() {
            debug!("No data group hashes supplied, reading them from eContent");
            data_group_hashes = parse_lds_security_object(&e_content)?.data_group_hashes;
        }

        Ok(DocumentRecord {
            document_category: raw.document_category,
            mrz,
            data_group_hashes,
            e_content,
            signed_attributes,
            signature,
            signer_certificate,
            mock: raw.mock,
        })
    }

    pub fn layout(&self) -> Result<MrzLayout, ParseError> {
        mrz::detect_layout(&self.mrz)
    }

    pub fn mrz_info(&self) -> Result<MrzInfo, ParseError> {
        mrz::extract_mrz_info(&self.mrz)
    }

    /// DG1 bytes: TLV header followed by the MRZ.
    pub fn dg1(&self) -> Result<Vec<u8>, ParseError> {
        mrz::format_mrz(&self.mrz)
    }

    pub fn data_groups(&self) -> Vec<u8> {
        self.data_group_hashes.keys().copied().collect()
    }

    /// Bytes the document signature covers: signed attributes when present, else eContent.
    pub fn signed_bytes(&self) -> &[u8] {
        self.signed_attributes.as_deref().unwrap_or(&self.e_content)
    }

    pub fn to_raw(&self, encoding: ByteEncoding) -> RawDocument {
        let text = |bytes: &[u8]| RawBytes::Text(encode_bytes(bytes, encoding));
        RawDocument {
            document_category: self.document_category,
            mrz: self.mrz.clone(),
            encoding,
            data_group_hashes: self
                .data_group_hashes
                .iter()
                .map(|(dg, h)| (*dg, text(h)))
                .collect(),
            e_content: text(&self.e_content),
            signed_attributes: self.signed_attributes.as_deref().map(text),
            signature: text(&self.signature),
            signer_certificate: encode_bytes(&self.signer_certificate, encoding),
            mock: self.mock,
        }
    }
}

/// Decoded `LDSSecurityObject` carried in eContent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdsSecurityObject {
    pub version: u32,
    pub hash_algorithm_oid: String,
    pub hash_algorithm: Option<HashAlgorithm>,
    pub data_group_hashes: BTreeMap<u8, Vec<u8>>,
}

fn asn1(context: &'static str, reason: impl ToString) -> ParseError {
    ParseError::Asn1 {
        context,
        reason: reason.to_string(),
    }
}

fn sequence<'a, 'b>(
    obj: &'b BerObject<'a>,
    context: &'static str,
) -> Result<&'b Vec<BerObject<'a>>, ParseError> {
    obj.as_sequence().map_err(|e| asn1(context, e))
}

/// Parses `SEQUENCE { version, AlgorithmIdentifier, SEQUENCE OF { dg, OCTET STRING } }`.
pub fn parse_lds_security_object(e_content: &[u8]) -> Result<LdsSecurityObject, ParseError> {
    let (_, root) = parse_der(e_content).map_err(|e| asn1("LDSSecurityObject", e))?;
    let fields = sequence(&root, "LDSSecurityObject")?;
    if fields.len() < 3 {
        return Err(asn1("LDSSecurityObject", "expected at least 3 fields"));
    }

    let version = fields[0].as_u32().map_err(|e| asn1("version", e))?;
    let algorithm = sequence(&fields[1], "hashAlgorithm")?;
    let oid = algorithm
        .first()
        .ok_or_else(|| asn1("hashAlgorithm", "empty AlgorithmIdentifier"))?
        .as_oid()
        .map_err(|e| asn1("hashAlgorithm", e))?
        .to_id_string();

    let mut data_group_hashes = BTreeMap::new();
    for entry in sequence(&fields[2], "dataGroupHashValues")? {
        let pair = sequence(entry, "DataGroupHash")?;
        if pair.len() != 2 {
            return Err(asn1("DataGroupHash", "expected number and hash"));
        }
        let number = pair[0].as_u32().map_err(|e| asn1("dataGroupNumber", e))?;
        let number = u8::try_from(number).map_err(|e| asn1("dataGroupNumber", e))?;
        let value = pair[1].as_slice().map_err(|e| asn1("dataGroupHashValue", e))?;
        data_group_hashes.insert(number, value.to_vec());
    }

    Ok(LdsSecurityObject {
        version,
        hash_algorithm: HashAlgorithm::from_oid(&oid),
        hash_algorithm_oid: oid,
        data_group_hashes,
    })
}
