//! Machine-readable zone parsing for TD1 (3x30) and TD3 (2x44) documents.
//!
//! Fields are sliced at fixed ICAO 9303 offsets. Check digits are computed and
//! reported but never enforced, since mock documents routinely carry invalid ones.

use crate::error::ParseError;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const TD3_LENGTH: usize = 88;
pub const TD1_LENGTH: usize = 90;
pub const TD3_LINE_LENGTH: usize = 44;
pub const TD1_LINE_LENGTH: usize = 30;

/// DG1 tag/length header preceding a TD3 MRZ.
pub const TD3_DG1_HEADER: [u8; 5] = [0x61, 0x5B, 0x5F, 0x1F, 0x58];
/// DG1 tag/length header preceding a TD1 MRZ.
pub const TD1_DG1_HEADER: [u8; 5] = [0x61, 0x5D, 0x5F, 0x1F, 0x5A];

const TD1_LINE1_PATTERN: &str = r"^[AIC][A-Z0-9<][A-Z<]{3}[A-Z0-9<]{9}[0-9<][A-Z0-9<]{15}";
const TD3_LINE2_PATTERN: &str =
    r"^[A-Z0-9<]{9}[0-9<][A-Z<]{3}[0-9<]{6}[0-9<][MFX<][0-9<]{6}[0-9<][A-Z0-9<]{14}[0-9<]{2}$";
const ISO_DATE_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MrzLayout {
    /// Passport booklet, two lines of 44.
    Td3,
    /// ID card, three lines of 30.
    Td1,
}

impl MrzLayout {
    pub fn mrz_length(&self) -> usize {
        match self {
            MrzLayout::Td3 => TD3_LENGTH,
            MrzLayout::Td1 => TD1_LENGTH,
        }
    }

    pub fn dg1_header(&self) -> [u8; 5] {
        match self {
            MrzLayout::Td3 => TD3_DG1_HEADER,
            MrzLayout::Td1 => TD1_DG1_HEADER,
        }
    }
}

/// Whether each check digit matched its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CheckDigits {
    pub document_number: bool,
    pub date_of_birth: bool,
    pub date_of_expiry: bool,
    pub composite: bool,
}

impl CheckDigits {
    pub fn all_valid(&self) -> bool {
        self.document_number && self.date_of_birth && self.date_of_expiry && self.composite
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MrzInfo {
    pub layout: MrzLayout,
    pub document_type: String,
    pub issuing_country: String,
    pub document_number: String,
    pub nationality: String,
    /// YYMMDD
    pub date_of_birth: String,
    /// YYMMDD
    pub date_of_expiry: String,
    pub sex: String,
    pub surname: String,
    pub given_names: String,
    pub optional_data: String,
    pub check_digits: CheckDigits,
}

fn compile(pattern: &str) -> Result<Regex, ParseError> {
    Regex::new(pattern).map_err(|e| ParseError::MrzFormat(format!("bad pattern: {e}")))
}

/// Removes line breaks and surrounding whitespace.
pub fn normalize_mrz(mrz: &str) -> String {
    mrz.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Determines whether normalized MRZ text is a TD1 or TD3 zone.
pub fn detect_layout(mrz: &str) -> Result<MrzLayout, ParseError> {
    if !mrz.is_ascii() {
        return Err(ParseError::MrzFormat("MRZ contains non-ASCII characters".into()));
    }
    match mrz.len() {
        TD1_LENGTH => {
            let leading_id = matches!(mrz.as_bytes()[0], b'I' | b'A' | b'C');
            if leading_id || compile(TD1_LINE1_PATTERN)?.is_match(mrz) {
                return Ok(MrzLayout::Td1);
            }
        }
        TD3_LENGTH => {
            if compile(TD3_LINE2_PATTERN)?.is_match(&mrz[TD3_LINE_LENGTH..]) {
                return Ok(MrzLayout::Td3);
            }
        }
        _ => {}
    }
    Err(ParseError::MrzFormat(format!(
        "{} characters match neither the TD1 nor the TD3 layout",
        mrz.len()
    )))
}

fn char_value(c: char) -> u32 {
    match c {
        '0'..='9' => c as u32 - '0' as u32,
        'A'..='Z' => c as u32 - 'A' as u32 + 10,
        _ => 0,
    }
}

/// ICAO 9303 check digit with repeating weights 7, 3, 1.
pub fn compute_check_digit(field: &str) -> u32 {
    const WEIGHTS: [u32; 3] = [7, 3, 1];
    field
        .chars()
        .enumerate()
        .map(|(i, c)| char_value(c) * WEIGHTS[i % 3])
        .sum::<u32>()
        % 10
}

fn check(field: &str, digit: &str) -> bool {
    let expected = compute_check_digit(field);
    match digit.chars().next() {
        Some('<') => expected == 0,
        Some(c) => c.to_digit(10) == Some(expected),
        None => false,
    }
}

fn clean(field: &str) -> String {
    field.replace('<', " ").trim().to_string()
}

fn split_names(field: &str) -> (String, String) {
    match field.split_once("<<") {
        Some((surname, given)) => (clean(surname), clean(given)),
        None => (clean(field), String::new()),
    }
}

/// Extracts the holder and document fields from TD1 or TD3 MRZ text.
///
/// Line breaks are optional.
///
/// # Errors
///
/// Returns [`ParseError::MrzFormat`] when the text matches neither layout.
///
/// # Examples
///
/// ```
/// use passport_witness::mrz::extract_mrz_info;
///
/// let mrz = "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<\
///            L898902C36UTO7408122F1204159ZE184226B<<<<<10";
/// let info = extract_mrz_info(mrz).unwrap();
/// assert_eq!(info.document_number, "L898902C3");
/// assert_eq!(info.date_of_birth, "740812");
/// ```
pub fn extract_mrz_info(mrz: &str) -> Result<MrzInfo, ParseError> {
    let mrz = normalize_mrz(mrz);
    let layout = detect_layout(&mrz)?;
    debug!("Parsing MRZ as {:?}", layout);

    let info = match layout {
        MrzLayout::Td3 => {
            let (line1, line2) = mrz.split_at(TD3_LINE_LENGTH);
            let (surname, given_names) = split_names(&line1[5..44]);
            MrzInfo {
                layout,
                document_type: clean(&line1[0..2]),
                issuing_country: clean(&line1[2..5]),
                document_number: clean(&line2[0..9]),
                nationality: clean(&line2[10..13]),
                date_of_birth: line2[13..19].to_string(),
                date_of_expiry: line2[21..27].to_string(),
                sex: clean(&line2[20..21]),
                surname,
                given_names,
                optional_data: clean(&line2[28..42]),
                check_digits: CheckDigits {
                    document_number: check(&line2[0..9], &line2[9..10]),
                    date_of_birth: check(&line2[13..19], &line2[19..20]),
                    date_of_expiry: check(&line2[21..27], &line2[27..28]),
                    composite: check(
                        &[&line2[0..10], &line2[13..20], &line2[21..43]].concat(),
                        &line2[43..44],
                    ),
                },
            }
        }
        MrzLayout::Td1 => {
            let line1 = &mrz[0..30];
            let line2 = &mrz[30..60];
            let line3 = &mrz[60..90];
            let (surname, given_names) = split_names(line3);
            MrzInfo {
                layout,
                document_type: clean(&line1[0..2]),
                issuing_country: clean(&line1[2..5]),
                document_number: clean(&line1[5..14]),
                nationality: clean(&line2[15..18]),
                date_of_birth: line2[0..6].to_string(),
                date_of_expiry: line2[8..14].to_string(),
                sex: clean(&line2[7..8]),
                surname,
                given_names,
                optional_data: clean(&[&line1[15..30], &line2[18..29]].concat()),
                check_digits: CheckDigits {
                    document_number: check(&line1[5..14], &line1[14..15]),
                    date_of_birth: check(&line2[0..6], &line2[6..7]),
                    date_of_expiry: check(&line2[8..14], &line2[14..15]),
                    composite: check(
                        &[&line1[5..30], &line2[0..7], &line2[8..15], &line2[18..29]].concat(),
                        &line2[29..30],
                    ),
                },
            }
        }
    };

    if !info.check_digits.all_valid() {
        debug!("MRZ check digits do not all match: {:?}", info.check_digits);
    }
    Ok(info)
}

/// Converts `YYYY-MM-DD` to `YYMMDD`. Six-digit input is returned unchanged.
pub fn format_date_to_yymmdd(date: &str) -> Result<String, ParseError> {
    let date = date.trim();
    if date.len() == 6 && date.chars().all(|c| c.is_ascii_digit()) {
        return Ok(date.to_string());
    }
    let iso = Regex::new(ISO_DATE_PATTERN).map_err(|e| ParseError::Date(e.to_string()))?;
    if !iso.is_match(date) {
        return Err(ParseError::Date(date.to_string()));
    }
    Ok(format!("{}{}{}", &date[2..4], &date[5..7], &date[8..10]))
}

/// Builds the DG1 bytes: the 5-byte TLV header followed by the MRZ characters.
pub fn format_mrz(mrz: &str) -> Result<Vec<u8>, ParseError> {
    let mrz = normalize_mrz(mrz);
    let layout = detect_layout(&mrz)?;
    let mut dg1 = Vec::with_capacity(layout.mrz_length() + 5);
    dg1.extend_from_slice(&layout.dg1_header());
    dg1.extend_from_slice(mrz.as_bytes());
    Ok(dg1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TD3_SAMPLE: &str = "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<\nL898902C36UTO7408122F1204159ZE184226B<<<<<10";

    fn td1_sample() -> String {
        format!(
            "{:<<30}{:<<29}6{:<<30}",
            "I<UTOD231458907", "7408122F1204159UTO", "ERIKSSON<<ANNA<MARIA"
        )
    }

    #[test]
    fn test_td3_reference_record() {
        let info = extract_mrz_info(TD3_SAMPLE).unwrap();
        assert_eq!(info.layout, MrzLayout::Td3);
        assert_eq!(info.document_type, "P");
        assert_eq!(info.issuing_country, "UTO");
        assert_eq!(info.document_number, "L898902C3");
        assert_eq!(info.nationality, "UTO");
        assert_eq!(info.date_of_birth, "740812");
        assert_eq!(info.date_of_expiry, "120415");
        assert_eq!(info.sex, "F");
        assert_eq!(info.surname, "ERIKSSON");
        assert_eq!(info.given_names, "ANNA MARIA");
        assert_eq!(info.optional_data, "ZE184226B");
        assert!(info.check_digits.all_valid());
    }

    #[test]
    fn test_td1_reference_record() {
        let mrz = td1_sample();
        assert_eq!(mrz.len(), TD1_LENGTH);
        let info = extract_mrz_info(&mrz).unwrap();
        assert_eq!(info.layout, MrzLayout::Td1);
        assert_eq!(info.document_type, "I");
        assert_eq!(info.document_number, "D23145890");
        assert_eq!(info.date_of_birth, "740812");
        assert_eq!(info.date_of_expiry, "120415");
        assert_eq!(info.nationality, "UTO");
        assert_eq!(info.surname, "ERIKSSON");
        assert!(info.check_digits.all_valid());
    }

    #[test]
    fn test_invalid_check_digits_are_reported_not_rejected() {
        let tampered = TD3_SAMPLE.replace("L898902C36", "L898902C35");
        let info = extract_mrz_info(&tampered).unwrap();
        assert!(!info.check_digits.document_number);
        assert!(info.check_digits.date_of_birth);
    }

    #[test]
    fn test_rejects_unknown_layout() {
        assert!(matches!(
            extract_mrz_info("P<UTO"),
            Err(ParseError::MrzFormat(_))
        ));
        let garbage = "x".repeat(TD3_LENGTH);
        assert!(extract_mrz_info(&garbage).is_err());
    }

    #[test]
    fn test_check_digit() {
        assert_eq!(compute_check_digit("L898902C3"), 6);
        assert_eq!(compute_check_digit("740812"), 2);
        assert_eq!(compute_check_digit("<<<"), 0);
    }

    #[test]
    fn test_format_date_to_yymmdd() {
        assert_eq!(format_date_to_yymmdd("1974-08-12").unwrap(), "740812");
        assert_eq!(format_date_to_yymmdd("740812").unwrap(), "740812");
        assert!(format_date_to_yymmdd("12/08/1974").is_err());
    }

    #[test]
    fn test_format_mrz_headers() {
        let dg1 = format_mrz(TD3_SAMPLE).unwrap();
        assert_eq!(dg1.len(), 93);
        assert_eq!(&dg1[..5], &TD3_DG1_HEADER);
        assert_eq!(&dg1[5..7], b"P<");

        let dg1 = format_mrz(&td1_sample()).unwrap();
        assert_eq!(dg1.len(), 95);
        assert_eq!(&dg1[..5], &TD1_DG1_HEADER);
    }
}
