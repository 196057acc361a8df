//! Extraction stages
//!
//! Each stage searches the unparsed remainder of a filename stem and returns the
//! recovered value together with the text that follows the match, so stages can
//! be chained left to right with `?`.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::{FilenameError, ParsedFilename};

static DOCUMENT_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([0-9]+)[\s_-]*of[\s_-]*([0-9]+)").expect("valid regex")
});

// Tolerates l/1/i/| and o/0 and e/3 lookalikes from OCR'd or hand-typed names.
static LLOYD_GEORGE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)l[l1i|][o0]yd[\s_-]*g[e3][o0]rg[e3][\s_-]*r[e3]c[o0]rd").expect("valid regex")
});

static PERSON_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{L}+(?:[^\p{L}0-9]+\p{L}+)*").expect("valid regex"));

static NHS_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9](?:[\s-]?[0-9]){9}").expect("valid regex"));

static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{1,2})[\s./_-]+([0-9]{1,2})[\s./_-]+([0-9]{4}|[0-9]{2})(?:[^0-9]|$)")
        .expect("valid regex")
});

/// `(document index, total documents)` from the first `<n>of<m>` run.
pub fn extract_document_number(input: &str) -> Result<((u32, u32), &str), FilenameError> {
    let caps = DOCUMENT_NUMBER
        .captures(input)
        .ok_or(FilenameError::MissingDocumentNumber)?;
    let (Some(whole), Some(index), Some(total)) = (caps.get(0), caps.get(1), caps.get(2)) else {
        return Err(FilenameError::MissingDocumentNumber);
    };

    let index: u32 = index
        .as_str()
        .parse()
        .map_err(|_| FilenameError::MissingDocumentNumber)?;
    let total: u32 = total
        .as_str()
        .parse()
        .map_err(|_| FilenameError::MissingDocumentNumber)?;

    Ok(((index, total), &input[whole.end()..]))
}

/// The fuzzy "Lloyd George Record" token; returns the matched text.
pub fn extract_lloyd_george_marker(input: &str) -> Result<(&str, &str), FilenameError> {
    let found = LLOYD_GEORGE_MARKER
        .find(input)
        .ok_or(FilenameError::MissingMarker)?;
    Ok((found.as_str(), &input[found.end()..]))
}

/// First run of letter words, cleaned to letters and single spaces and capitalised.
pub fn extract_person_name(input: &str) -> Result<(String, &str), FilenameError> {
    let found = PERSON_NAME
        .find(input)
        .ok_or(FilenameError::MissingPersonName)?;

    let cleaned: String = found
        .as_str()
        .chars()
        .map(|c| if c.is_alphabetic() { c } else { ' ' })
        .collect();
    let name = cleaned
        .split_whitespace()
        .map(capitalise)
        .collect::<Vec<_>>()
        .join(" ");

    if name.is_empty() {
        return Err(FilenameError::MissingPersonName);
    }

    Ok((name, &input[found.end()..]))
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// First ten digits, possibly broken up by single spaces or hyphens. A digit
/// directly after the tenth makes the number too long; anything separated
/// from it (such as a following date) is left in the remainder.
pub fn extract_nhs_number(input: &str) -> Result<(String, &str), FilenameError> {
    let found = NHS_NUMBER
        .find(input)
        .ok_or(FilenameError::MissingNhsNumber)?;

    let mut digits: String = found.as_str().chars().filter(char::is_ascii_digit).collect();
    let rest = &input[found.end()..];
    let overflow: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if !overflow.is_empty() {
        digits.push_str(&overflow);
        return Err(FilenameError::InvalidNhsNumber(digits));
    }

    Ok((digits, rest))
}

/// First day/month/year triple. Two-digit years are taken as 20xx and the
/// triple must be a real calendar date.
pub fn extract_date(input: &str) -> Result<(NaiveDate, &str), FilenameError> {
    let caps = DATE.captures(input).ok_or(FilenameError::MissingDate)?;
    let (Some(day), Some(month), Some(year)) = (caps.get(1), caps.get(2), caps.get(3)) else {
        return Err(FilenameError::MissingDate);
    };

    let raw = format!("{}-{}-{}", day.as_str(), month.as_str(), year.as_str());
    let invalid = || FilenameError::InvalidDate(raw.clone());

    let day: u32 = day.as_str().parse().map_err(|_| invalid())?;
    let month: u32 = month.as_str().parse().map_err(|_| invalid())?;
    let mut year_value: i32 = year.as_str().parse().map_err(|_| invalid())?;
    if year.as_str().len() == 2 {
        year_value += 2000;
    }

    let date = NaiveDate::from_ymd_opt(year_value, month, day).ok_or_else(invalid)?;
    Ok((date, &input[year.end()..]))
}

/// Runs every stage in order over a filename stem (no extension).
pub fn parse_filename(stem: &str) -> Result<ParsedFilename, FilenameError> {
    let ((document_index, total_documents), rest) = extract_document_number(stem)?;
    let (_, rest) = extract_lloyd_george_marker(rest)?;
    let (person_name, rest) = extract_person_name(rest)?;
    let (nhs_number, rest) = extract_nhs_number(rest)?;
    let (date, _) = extract_date(rest)?;

    Ok(ParsedFilename {
        document_index,
        total_documents,
        person_name,
        nhs_number,
        date,
    })
}
