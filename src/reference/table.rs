use std::collections::BTreeSet;
use thiserror::Error;

/// Minimum normalized Levenshtein similarity for a suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("entry '{canonical}' lists its current alias '{current}' as superseded")]
    SelfSuperseded { canonical: String, current: String },

    #[error("entry '{canonical}' has an empty current alias")]
    EmptyCurrent { canonical: String },
}

/// One known standard: its current code and the codes it replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    canonical_code: String,
    current_alias: String,
    superseded_aliases: BTreeSet<String>,
}

impl ReferenceEntry {
    /// Build an entry, rejecting one whose current alias is also listed as
    /// superseded.
    pub fn new(
        canonical_code: impl Into<String>,
        current_alias: impl Into<String>,
        superseded_aliases: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, EntryError> {
        let canonical_code = canonical_code.into();
        let current_alias = current_alias.into();
        let superseded_aliases: BTreeSet<String> =
            superseded_aliases.into_iter().map(Into::into).collect();

        if current_alias.is_empty() {
            return Err(EntryError::EmptyCurrent {
                canonical: canonical_code,
            });
        }
        if superseded_aliases.contains(&current_alias) {
            return Err(EntryError::SelfSuperseded {
                canonical: canonical_code,
                current: current_alias,
            });
        }

        Ok(Self {
            canonical_code,
            current_alias,
            superseded_aliases,
        })
    }

    pub fn canonical_code(&self) -> &str {
        &self.canonical_code
    }

    pub fn current_alias(&self) -> &str {
        &self.current_alias
    }

    pub fn superseded_aliases(&self) -> &BTreeSet<String> {
        &self.superseded_aliases
    }

    pub fn supersedes(&self, code: &str) -> bool {
        self.superseded_aliases.contains(code)
    }
}

/// Ordered, read-only collection of reference entries.
///
/// Lookups scan entries in insertion order and the first hit wins, so
/// overlapping aliases resolve to the earliest entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceTable {
    entries: Vec<ReferenceEntry>,
}

impl ReferenceTable {
    pub fn new(entries: Vec<ReferenceEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Closest known alias to an unrecognised code, if any is similar
    /// enough. Ties resolve to the earliest entry.
    pub fn closest(&self, code: &str) -> Option<&str> {
        let mut best: Option<(&str, f64)> = None;
        for entry in &self.entries {
            let aliases = std::iter::once(entry.current_alias.as_str())
                .chain(entry.superseded_aliases.iter().map(String::as_str));
            for alias in aliases {
                let score = strsim::normalized_levenshtein(code, alias);
                if score >= SUGGESTION_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
                    best = Some((alias, score));
                }
            }
        }
        best.map(|(alias, _)| alias)
    }
}

impl FromIterator<ReferenceEntry> for ReferenceTable {
    fn from_iter<I: IntoIterator<Item = ReferenceEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
