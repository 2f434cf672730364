//! Document-level operations: analyze a document, then apply the results.
//!
//! This is the request/response surface a front end drives: `analyze`
//! reports every norm code found in the document body with its status,
//! `apply` writes a patched copy of the document with superseded codes
//! replaced and returns where it went.

use crate::classify::{self, ClassificationResult, Status};
use crate::container::{CommitOutcome, ContainerError, ContainerPatcher};
use crate::extract::Extractor;
use crate::fsio;
use crate::reference::ReferenceTable;
use crate::substitute::{self, Substitution, SubstitutionOutcome};
use log::{debug, info};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Body member of a word-processing document.
pub const DOCUMENT_MEMBER: &str = "word/document.xml";

/// Inserted before the extension of a patched copy.
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_FFNORMA";

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("failed to write {path}: {source}")]
    Export {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Status counts of an analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub current: usize,
    pub superseded: usize,
    pub unknown: usize,
    pub legacy: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.current + self.superseded + self.unknown + self.legacy
    }

    /// Codes the reference table knows about.
    pub fn found(&self) -> usize {
        self.current + self.superseded
    }
}

/// Result of analysing one document.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub path: PathBuf,
    pub results: Vec<ClassificationResult>,
}

impl Analysis {
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for result in &self.results {
            match result.status() {
                Status::Current => summary.current += 1,
                Status::Superseded => summary.superseded += 1,
                Status::Unknown => summary.unknown += 1,
                Status::Legacy => summary.legacy += 1,
            }
        }
        summary
    }
}

/// Write the codes detected across `analyses` to a text file, one per line.
pub fn export_codes(analyses: &[Analysis], output: &Path) -> Result<(), WorkflowError> {
    let codes: Vec<&str> = analyses
        .iter()
        .flat_map(|a| a.results.iter())
        .map(|r| r.token().raw_text())
        .collect();
    fsio::write_lines(output, &codes).map_err(|source| WorkflowError::Export {
        path: output.to_path_buf(),
        source,
    })?;
    info!("exported {} codes to {}", codes.len(), output.display());
    Ok(())
}

/// Body text before and after substitution.
#[derive(Debug, Clone)]
pub struct Patch {
    pub original: String,
    pub patched: String,
    pub outcomes: Vec<(Substitution, SubstitutionOutcome)>,
}

impl Patch {
    pub fn applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, SubstitutionOutcome::Applied { .. }))
            .count()
    }

    pub fn is_noop(&self) -> bool {
        self.original == self.patched
    }
}

/// What `apply` wrote.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub output: PathBuf,
    pub patch: Patch,
}

/// Analyses documents against a reference table and writes patched copies.
#[derive(Debug, Clone)]
pub struct DocumentChecker {
    extractor: Extractor,
    table: ReferenceTable,
    member: String,
    output_suffix: String,
}

impl DocumentChecker {
    pub fn new(extractor: Extractor, table: ReferenceTable) -> Self {
        Self {
            extractor,
            table,
            member: DOCUMENT_MEMBER.to_string(),
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
        }
    }

    /// Read a different container member than `word/document.xml`.
    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = member.into();
        self
    }

    pub fn with_output_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.output_suffix = suffix.into();
        self
    }

    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    /// Classify every norm code in `text`.
    pub fn analyze_text(&self, text: &str) -> Vec<ClassificationResult> {
        let tokens = self.extractor.extract_norms(text);
        classify::classify_all(&tokens, &self.table)
    }

    /// Classify every norm code in the body of the document at `path`.
    pub fn analyze(&self, path: impl AsRef<Path>) -> Result<Analysis, WorkflowError> {
        let path = path.as_ref();
        let mut container = ContainerPatcher::open(path)?;
        let body = container.read_member_string(&self.member)?;
        let results = self.analyze_text(&body);

        let analysis = Analysis {
            path: path.to_path_buf(),
            results,
        };
        let summary = analysis.summary();
        info!(
            "{}: {} codes ({} up-to-date, {} out-of-date, {} unknown, {} legacy)",
            path.display(),
            summary.total(),
            summary.current,
            summary.superseded,
            summary.unknown,
            summary.legacy
        );
        Ok(analysis)
    }

    /// Compute the patched body without writing anything.
    pub fn plan(
        &self,
        path: impl AsRef<Path>,
        results: &[ClassificationResult],
    ) -> Result<Patch, WorkflowError> {
        let mut container = ContainerPatcher::open(path)?;
        let original = container.read_member_string(&self.member)?;
        Ok(plan_text(original, results))
    }

    /// Write a patched copy of the document next to it and return its path.
    ///
    /// The source document is never modified.
    pub fn apply(
        &self,
        path: impl AsRef<Path>,
        results: &[ClassificationResult],
    ) -> Result<ApplyReport, WorkflowError> {
        let path = path.as_ref();
        let output = patched_path(path, &self.output_suffix);

        let mut container = ContainerPatcher::open(path)?;
        let original = container.read_member_string(&self.member)?;
        let patch = plan_text(original, results);
        debug!(
            "{} of {} substitutions applied to {}",
            patch.applied(),
            patch.outcomes.len(),
            self.member
        );

        container.stage(&self.member, patch.patched.as_bytes())?;
        if let CommitOutcome::Rebuilt(summary) = container.commit_to(&output)? {
            debug!(
                "{} members copied, {} replaced",
                summary.copied,
                summary.replaced.len()
            );
        }
        info!("created {}", output.display());

        Ok(ApplyReport { output, patch })
    }
}

fn plan_text(original: String, results: &[ClassificationResult]) -> Patch {
    let pairs = classify::substitutions(results);
    let (patched, outcomes) = substitute::apply_with_outcomes(&original, &pairs);
    Patch {
        original,
        patched,
        outcomes: pairs.into_iter().zip(outcomes).collect(),
    }
}

/// `dir/name.docx` → `dir/name<suffix>.docx`.
pub fn patched_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    path.with_file_name(name)
}
