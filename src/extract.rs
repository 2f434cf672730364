//! Token extraction over text buffers.
//!
//! Extraction is a pure function of the compiled grammars and the input.
//! Tokens carry the byte span they were found at, but substitution later
//! matches by content only: the span is informational.

use crate::dates::{self, DateError, DateForm, DateTimeValue};
use crate::patterns::PatternLibrary;
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::ops::Range;

/// What kind of text a token was extracted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenCategory {
    /// Norm code in current notation (`PN-EN 1990:2004`)
    NormCurrent,
    /// Norm code in pre-1994 notation (`PN-76/B-03001`)
    NormLegacy,
    Date,
    Time,
}

/// A substring extracted from a text buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Token {
    raw_text: String,
    category: TokenCategory,
    span: Range<usize>,
}

impl Token {
    pub fn new(raw_text: impl Into<String>, category: TokenCategory, span: Range<usize>) -> Self {
        Self {
            raw_text: raw_text.into(),
            category,
            span,
        }
    }

    /// Build a current-notation norm token with an empty span.
    ///
    /// Useful when the code did not come from a scanned buffer.
    pub fn norm(raw_text: impl Into<String>) -> Self {
        Self::new(raw_text, TokenCategory::NormCurrent, 0..0)
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn category(&self) -> TokenCategory {
        self.category
    }

    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }
}

/// One date/time occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMatch {
    /// The date portion as it appears in the source.
    pub date: Token,
    /// The time portion, present only when it passed validation.
    pub time: Option<Token>,
    /// `date` or `date + " " + time`: the key used for substitution.
    pub raw: String,
    /// Parsed value, `None` when the date itself does not parse.
    pub value: Option<DateTimeValue>,
}

/// Runs the [`PatternLibrary`] grammars over text.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    patterns: PatternLibrary,
}

impl Extractor {
    pub fn new(patterns: PatternLibrary) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &PatternLibrary {
        &self.patterns
    }

    /// Extract every token: norm codes first, then dates and times.
    pub fn extract(&self, text: &str) -> Result<Vec<Token>, DateError> {
        let mut tokens = self.extract_norms(text);
        for found in self.extract_dates(text)? {
            tokens.push(found.date);
            tokens.extend(found.time);
        }
        Ok(tokens)
    }

    /// Extract norm codes.
    ///
    /// Current-notation tokens come first in text order, followed by legacy
    /// tokens in text order. A current-notation match that starts where a
    /// legacy match starts is dropped in favour of the legacy token, and the
    /// current-notation scan resumes where that legacy token ends, so a code
    /// swallowed by the dropped match is still found.
    pub fn extract_norms(&self, text: &str) -> Vec<Token> {
        let legacy: Vec<Token> = self
            .patterns
            .norm_legacy()
            .find_iter(text)
            .map(|m| Token::new(m.as_str(), TokenCategory::NormLegacy, m.range()))
            .collect();
        let legacy_ends: HashMap<usize, usize> =
            legacy.iter().map(|t| (t.span.start, t.span.end)).collect();

        let mut tokens = Vec::new();
        let mut at = 0;
        while let Some(m) = self.patterns.norm_current().find_at(text, at) {
            match legacy_ends.get(&m.start()) {
                Some(&end) => {
                    debug!("'{}' also matches the legacy notation", m.as_str());
                    at = end;
                }
                None => {
                    tokens.push(Token::new(m.as_str(), TokenCategory::NormCurrent, m.range()));
                    at = m.end();
                }
            }
        }

        debug!(
            "extracted {} current and {} legacy norm codes",
            tokens.len(),
            legacy.len()
        );
        tokens.extend(legacy);
        tokens
    }

    /// Extract date/time occurrences in text order.
    ///
    /// Fails only when a match carries none of the date alternatives, which
    /// the grammar rules out.
    pub fn extract_dates(&self, text: &str) -> Result<Vec<DateMatch>, DateError> {
        let mut found = Vec::new();

        for caps in self.patterns.date_time().captures_iter(text) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let date = [
                ("month_name", DateForm::MonthName),
                ("slash", DateForm::Slash),
                ("dash", DateForm::Dash),
            ]
            .into_iter()
            .find_map(|(name, form)| caps.name(name).map(|m| (form, m)));
            let Some((form, date)) = date else {
                return Err(DateError::Integrity {
                    offset: whole.start,
                });
            };

            let time = caps
                .name("time")
                .filter(|m| !m.as_str().is_empty())
                .and_then(|m| {
                    dates::parse_time(m.as_str())
                        .map(|value| (Token::new(m.as_str(), TokenCategory::Time, m.range()), value))
                });

            let value = dates::parse_date(date.as_str(), form).map(|date| DateTimeValue {
                date,
                time: time.as_ref().map(|(_, value)| *value),
            });

            let raw = match &time {
                Some((token, _)) => format!("{} {}", date.as_str(), token.raw_text()),
                None => date.as_str().to_string(),
            };

            found.push(DateMatch {
                date: Token::new(date.as_str(), TokenCategory::Date, date.range()),
                time: time.map(|(token, _)| token),
                raw,
                value,
            });
        }

        Ok(found)
    }
}
