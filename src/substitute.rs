use log::debug;

/// One `(original, replacement)` pair.
///
/// Applying a pair replaces exactly one occurrence: the first one left in
/// the buffer at the time the pair is applied. An empty replacement means
/// "leave the buffer alone".
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Substitution does nothing until applied"]
pub struct Substitution {
    pub original: String,
    pub replacement: Option<String>,
}

impl Substitution {
    pub fn new(original: impl Into<String>, replacement: impl Into<String>) -> Self {
        let replacement = replacement.into();
        Self {
            original: original.into(),
            replacement: (!replacement.is_empty()).then_some(replacement),
        }
    }

    /// A pair that is always skipped.
    pub fn skip(original: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            replacement: None,
        }
    }

    fn replacement(&self) -> Option<&str> {
        self.replacement.as_deref().filter(|r| !r.is_empty())
    }
}

/// What happened to one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstitutionOutcome {
    /// Replaced the occurrence starting at `offset` of the buffer as it was
    /// when the pair was applied
    Applied { offset: usize },
    /// The original no longer occurs in the buffer
    NotFound,
    /// Replacement empty or absent
    SkippedEmpty,
}

/// Apply `pairs` in order to `buffer`.
pub fn apply(buffer: &str, pairs: &[Substitution]) -> String {
    apply_with_outcomes(buffer, pairs).0
}

/// Apply `pairs` in order and report the outcome of each one.
///
/// Order matters: each pair scans the buffer produced by the pairs before
/// it, so an earlier replacement can consume the span a later pair was
/// looking for.
pub fn apply_with_outcomes(
    buffer: &str,
    pairs: &[Substitution],
) -> (String, Vec<SubstitutionOutcome>) {
    let mut content = buffer.to_string();
    let mut outcomes = Vec::with_capacity(pairs.len());

    for pair in pairs {
        let Some(replacement) = pair.replacement() else {
            outcomes.push(SubstitutionOutcome::SkippedEmpty);
            continue;
        };
        if pair.original.is_empty() {
            outcomes.push(SubstitutionOutcome::NotFound);
            continue;
        }

        match content.find(&pair.original) {
            Some(offset) => {
                content.replace_range(offset..offset + pair.original.len(), replacement);
                outcomes.push(SubstitutionOutcome::Applied { offset });
            }
            None => {
                debug!("'{}' no longer occurs, skipping", pair.original);
                outcomes.push(SubstitutionOutcome::NotFound);
            }
        }
    }

    (content, outcomes)
}
