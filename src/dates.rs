//! Date/time parsing, canonical formatting and in-text normalization.
//!
//! Parse failures of individual dates or times are absorbed: the value is
//! treated as absent and a `warn!` is logged. Only grammar invariant
//! violations and invalid output patterns surface as [`DateError`].

use crate::extract::{DateMatch, Extractor};
use crate::fsio;
use crate::substitute::{self, Substitution};
use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveTime};
use log::{debug, info, warn};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default output pattern (`05-01-2021`).
pub const DEFAULT_FORMAT: &str = "%d-%m-%Y";

#[derive(Error, Debug)]
pub enum DateError {
    #[error("date match at byte {offset} carries none of the expected date forms")]
    Integrity { offset: usize },

    #[error("invalid date output pattern '{pattern}'")]
    InvalidPattern { pattern: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Which date alternative of the grammar matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateForm {
    /// `Jan 5 2021`
    MonthName,
    /// `01/05/2021` (month first)
    Slash,
    /// `05-01-2021` (day first)
    Dash,
}

impl DateForm {
    fn strptime(self) -> &'static str {
        match self {
            DateForm::MonthName => "%b %d %Y",
            DateForm::Slash => "%m/%d/%Y",
            DateForm::Dash => "%d-%m-%Y",
        }
    }
}

/// A calendar date with an optional time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeValue {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl std::fmt::Display for DateTimeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.time {
            Some(time) => write!(f, "{} {}", self.date, time.format("%H:%M")),
            None => write!(f, "{}", self.date),
        }
    }
}

/// Parse a date in the given form.
///
/// The year must be exactly four digits; anything else, or an out-of-range
/// month or day, yields `None`.
pub fn parse_date(raw: &str, form: DateForm) -> Option<NaiveDate> {
    let year = raw
        .rsplit(|c: char| c == ' ' || c == '/' || c == '-')
        .next()
        .unwrap_or("");
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        warn!("ignoring date '{raw}': year is not four digits");
        return None;
    }
    match NaiveDate::parse_from_str(raw, form.strptime()) {
        Ok(date) => Some(date),
        Err(e) => {
            warn!("ignoring date '{raw}': {e}");
            None
        }
    }
}

/// Parse a time candidate.
///
/// A candidate containing `m`/`M` is read strictly as 12-hour
/// (`%I:%M%p`); anything else as 24-hour `%H:%M`. Failures and empty
/// input yield `None`.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    if raw.is_empty() {
        return None;
    }
    let format = if raw.contains(['m', 'M']) {
        "%I:%M%p"
    } else {
        "%H:%M"
    };
    match NaiveTime::parse_from_str(raw, format) {
        Ok(time) => Some(time),
        Err(e) => {
            warn!("ignoring time '{raw}': {e}");
            None
        }
    }
}

/// Check that `pattern` is a usable strftime pattern.
pub fn validate_pattern(pattern: &str) -> Result<(), DateError> {
    let invalid = StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error));
    if invalid {
        return Err(DateError::InvalidPattern {
            pattern: pattern.to_string(),
        });
    }
    Ok(())
}

/// Render a value: the date with `pattern`, then `" HH:MM"` in 24-hour form
/// when a time is present.
pub fn format(value: &DateTimeValue, pattern: &str) -> Result<String, DateError> {
    validate_pattern(pattern)?;

    let mut out = String::new();
    write!(out, "{}", value.date.format(pattern)).map_err(|_| DateError::InvalidPattern {
        pattern: pattern.to_string(),
    })?;
    if let Some(time) = value.time {
        write!(out, " {}", time.format("%H:%M")).map_err(|_| DateError::InvalidPattern {
            pattern: pattern.to_string(),
        })?;
    }
    Ok(out)
}

/// Formatted output for each match; empty where the date did not parse.
fn format_matches(found: &[DateMatch], pattern: &str) -> Result<Vec<String>, DateError> {
    found
        .iter()
        .map(|m| match &m.value {
            Some(value) => format(value, pattern),
            None => Ok(String::new()),
        })
        .collect()
}

/// Rewrite every date/time occurrence of `text` into `pattern`.
///
/// Occurrences are replaced one at a time, first occurrence first, in
/// extraction order. Occurrences that did not parse are left alone.
pub fn replace_in_text(
    extractor: &Extractor,
    text: &str,
    pattern: &str,
) -> Result<String, DateError> {
    validate_pattern(pattern)?;
    let found = extractor.extract_dates(text)?;
    let formatted = format_matches(&found, pattern)?;

    let pairs: Vec<Substitution> = found
        .iter()
        .zip(formatted)
        .map(|(m, out)| Substitution::new(m.raw.clone(), out))
        .collect();

    debug!("normalizing {} date occurrences", pairs.len());
    Ok(substitute::apply(text, &pairs))
}

/// Read a UTF-8 text file.
pub fn read_text(path: &Path) -> Result<String, DateError> {
    fsio::read_text(path).map_err(|source| DateError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Find the date/time occurrences of a UTF-8 text file.
pub fn find_in_file(extractor: &Extractor, path: &Path) -> Result<Vec<DateMatch>, DateError> {
    let content = read_text(path)?;
    extractor.extract_dates(&content)
}

/// Format the date/time occurrences of a file.
///
/// With an output path the strings are also written there, one per line.
pub fn format_file(
    extractor: &Extractor,
    input: &Path,
    output: Option<&Path>,
    pattern: &str,
) -> Result<Vec<String>, DateError> {
    validate_pattern(pattern)?;
    let found = find_in_file(extractor, input)?;
    let formatted = format_matches(&found, pattern)?;

    if let Some(output) = output {
        fsio::write_lines(output, &formatted).map_err(|source| DateError::Io {
            path: output.to_path_buf(),
            source,
        })?;
        info!(
            "wrote {} formatted dates to {}",
            formatted.len(),
            output.display()
        );
    }
    Ok(formatted)
}

/// Write a copy of `input` to `output` with every date normalized.
pub fn replace_file(
    extractor: &Extractor,
    input: &Path,
    output: &Path,
    pattern: &str,
) -> Result<String, DateError> {
    let content = read_text(input)?;
    let replaced = replace_in_text(extractor, &content, pattern)?;
    fsio::atomic_write(output, replaced.as_bytes()).map_err(|source| DateError::Io {
        path: output.to_path_buf(),
        source,
    })?;
    info!("wrote normalized text to {}", output.display());
    Ok(replaced)
}
