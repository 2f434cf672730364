//! Classification of extracted tokens against the reference table.

use crate::extract::{Token, TokenCategory};
use crate::reference::ReferenceTable;
use crate::substitute::Substitution;
use serde::Serialize;
use std::fmt;

/// Where a token stands relative to the reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Token is the current alias of an entry
    Current,
    /// Token is a superseded alias; a replacement is known
    Superseded,
    /// Token is not in the table
    Unknown,
    /// Pre-1994 notation, never looked up
    Legacy,
}

impl Status {
    /// Whether the table knows the token.
    pub fn is_known(self) -> bool {
        matches!(self, Status::Current | Status::Superseded)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Current => "up-to-date",
            Status::Superseded => "out-of-date",
            Status::Unknown => "unknown",
            Status::Legacy => "pre-1994 notation",
        };
        f.write_str(label)
    }
}

/// A token with its status and, for superseded codes only, the code that
/// replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    token: Token,
    status: Status,
    replacement: Option<String>,
}

impl ClassificationResult {
    pub fn current(token: Token) -> Self {
        Self {
            token,
            status: Status::Current,
            replacement: None,
        }
    }

    pub fn superseded(token: Token, replacement: impl Into<String>) -> Self {
        Self {
            token,
            status: Status::Superseded,
            replacement: Some(replacement.into()),
        }
    }

    pub fn unknown(token: Token) -> Self {
        Self {
            token,
            status: Status::Unknown,
            replacement: None,
        }
    }

    pub fn legacy(token: Token) -> Self {
        Self {
            token,
            status: Status::Legacy,
            replacement: None,
        }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn replacement(&self) -> Option<&str> {
        self.replacement.as_deref()
    }

    /// The substitution this result calls for, if any.
    pub fn substitution(&self) -> Option<Substitution> {
        self.replacement
            .as_ref()
            .map(|replacement| Substitution::new(self.token.raw_text(), replacement.as_str()))
    }
}

/// Resolve one token against `table`.
///
/// Entries are scanned in table order. Within an entry the current alias is
/// checked before the superseded aliases; the first entry with any hit
/// decides.
pub fn classify(token: &Token, table: &ReferenceTable) -> ClassificationResult {
    match token.category() {
        TokenCategory::NormLegacy => return ClassificationResult::legacy(token.clone()),
        TokenCategory::Date | TokenCategory::Time => {
            return ClassificationResult::unknown(token.clone())
        }
        TokenCategory::NormCurrent => {}
    }

    let code = token.raw_text();
    for entry in table.entries() {
        if entry.current_alias() == code {
            return ClassificationResult::current(token.clone());
        }
        if entry.supersedes(code) {
            return ClassificationResult::superseded(token.clone(), entry.current_alias());
        }
    }
    ClassificationResult::unknown(token.clone())
}

/// Classify every token in order.
pub fn classify_all(tokens: &[Token], table: &ReferenceTable) -> Vec<ClassificationResult> {
    tokens.iter().map(|token| classify(token, table)).collect()
}

/// Substitution pairs for the results that carry a replacement, in order.
pub fn substitutions(results: &[ClassificationResult]) -> Vec<Substitution> {
    results
        .iter()
        .filter_map(ClassificationResult::substitution)
        .collect()
}
