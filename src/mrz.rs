//! ICAO 9303 TD3 field decoding
//!
//! A TD3 (passport) MRZ is two 44-character lines. The parser receives both
//! lines concatenated, whitespace-free, and slices fields at fixed offsets.
//! Check-digit positions are skipped, not validated. OCR confusables such as
//! `0`/`O` are passed through as recognized.

use crate::error::ParseError;
use serde::Serialize;
use std::ops::Range;

pub const TD3_LINE_LEN: usize = 44;
pub const TD3_TEXT_LEN: usize = 2 * TD3_LINE_LEN;

const FILLER: char = '<';
const NAME_SEPARATOR: &str = "<<";

/// Field offsets within each TD3 line
mod td3 {
    use std::ops::Range;

    // line 1
    pub const DOCUMENT_TYPE: Range<usize> = 0..1;
    pub const ISSUING_COUNTRY: Range<usize> = 2..5;
    pub const NAME: Range<usize> = 5..44;

    // line 2; 9, 19, 27, 42 and 43 hold check digits
    pub const PASSPORT_NUMBER: Range<usize> = 0..9;
    pub const NATIONALITY: Range<usize> = 10..13;
    pub const BIRTH_DATE: Range<usize> = 13..19;
    pub const SEX: Range<usize> = 20..21;
    pub const EXPIRY_DATE: Range<usize> = 21..27;
    pub const PERSONAL_NUMBER: Range<usize> = 28..42;
}

/// Decoded passport MRZ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MrzRecord {
    document_type: String,
    issuing_country: String,
    last_name: String,
    first_name: String,
    passport_number: String,
    nationality: String,
    /// YYMMDD as printed
    birth_date: String,
    sex: String,
    /// YYMMDD as printed
    expiry_date: String,
    personal_number: String,
    raw_text: String,
}

impl MrzRecord {
    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    pub fn issuing_country(&self) -> &str {
        &self.issuing_country
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn passport_number(&self) -> &str {
        &self.passport_number
    }

    pub fn nationality(&self) -> &str {
        &self.nationality
    }

    pub fn birth_date(&self) -> &str {
        &self.birth_date
    }

    pub fn sex(&self) -> &str {
        &self.sex
    }

    pub fn expiry_date(&self) -> &str {
        &self.expiry_date
    }

    pub fn personal_number(&self) -> &str {
        &self.personal_number
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Field name to value, in MRZ order
    pub fn fields(&self) -> [(&'static str, &str); 10] {
        [
            ("documentType", self.document_type.as_str()),
            ("issuingCountry", self.issuing_country.as_str()),
            ("lastName", self.last_name.as_str()),
            ("firstName", self.first_name.as_str()),
            ("passportNumber", self.passport_number.as_str()),
            ("nationality", self.nationality.as_str()),
            ("birthDate", self.birth_date.as_str()),
            ("sex", self.sex.as_str()),
            ("expiryDate", self.expiry_date.as_str()),
            ("personalNumber", self.personal_number.as_str()),
        ]
    }
}

/// Slice a whitespace-free TD3 character stream into fields.
///
/// Callers run the text-shape gate first; anything shorter than two full lines,
/// or carrying non-ASCII or whitespace bytes inside them, is an error rather
/// than a silently truncated record. Characters past offset 88 are ignored.
pub fn parse(text: &str) -> Result<MrzRecord, ParseError> {
    let bytes = text.as_bytes();
    if bytes.len() < TD3_TEXT_LEN {
        return Err(ParseError::TooShort {
            expected: TD3_TEXT_LEN,
            actual: text.chars().count(),
        });
    }
    if let Some((offset, &byte)) = bytes[..TD3_TEXT_LEN]
        .iter()
        .enumerate()
        .find(|(_, b)| !b.is_ascii() || b.is_ascii_whitespace())
    {
        return Err(ParseError::InvalidByte { offset, byte });
    }

    // all-ASCII prefix, so both cut points are char boundaries
    let line1 = &text[..TD3_LINE_LEN];
    let line2 = &text[TD3_LINE_LEN..TD3_TEXT_LEN];
    let (last_name, first_name) = split_name(slice(line1, td3::NAME));

    Ok(MrzRecord {
        document_type: slice(line1, td3::DOCUMENT_TYPE).to_string(),
        issuing_country: slice(line1, td3::ISSUING_COUNTRY).to_string(),
        last_name,
        first_name,
        passport_number: strip_filler(slice(line2, td3::PASSPORT_NUMBER)),
        nationality: slice(line2, td3::NATIONALITY).to_string(),
        birth_date: slice(line2, td3::BIRTH_DATE).to_string(),
        sex: slice(line2, td3::SEX).to_string(),
        expiry_date: slice(line2, td3::EXPIRY_DATE).to_string(),
        personal_number: strip_filler(slice(line2, td3::PERSONAL_NUMBER)),
        raw_text: text.to_string(),
    })
}

fn slice(line: &str, range: Range<usize>) -> &str {
    &line[range]
}

/// Surname and given names split on the first `<<`
fn split_name(field: &str) -> (String, String) {
    match field.split_once(NAME_SEPARATOR) {
        Some((surname, given)) => (clean_name(surname), clean_name(given)),
        None => (clean_name(field), String::new()),
    }
}

fn clean_name(segment: &str) -> String {
    segment.replace(FILLER, " ").trim().to_string()
}

fn strip_filler(field: &str) -> String {
    field.replace(FILLER, "").trim().to_string()
}
