//! Norm Patcher: find, classify and update Polish norm codes in documents
//!
//! Norm codes (`PN-EN 1990:2004`, `PN-76/B-03001`) are extracted from the
//! body of a word-processing document, classified against a reference table
//! of current and superseded aliases, and superseded codes are replaced in a
//! patched copy of the document. The same extraction machinery normalizes
//! dates in plain-text files.
//!
//! # Architecture
//!
//! Every rewrite compiles down to one primitive: a [`Substitution`] that
//! replaces the first remaining occurrence of a string. Intelligence lives
//! in producing the pairs (extraction and classification), not in applying
//! them.
//!
//! # Safety
//!
//! - Source documents are never modified; patched copies get a new name
//! - Containers are rebuilt into a temp file, fsynced, then renamed
//! - A failed rebuild leaves the destination untouched
//! - Reference alias sets are parsed, never evaluated
//!
//! # Example
//!
//! ```no_run
//! use norm_patcher::{reference, DocumentChecker, Extractor, LoadOptions};
//!
//! let table = reference::load_from_path("db/baza.csv", LoadOptions::default())?;
//! let checker = DocumentChecker::new(Extractor::default(), table);
//!
//! let analysis = checker.analyze("opis.docx")?;
//! let report = checker.apply("opis.docx", &analysis.results)?;
//! println!("patched copy: {}", report.output.display());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod classify;
pub mod config;
pub mod container;
pub mod dates;
pub mod extract;
pub mod fsio;
pub mod patterns;
pub mod reference;
pub mod substitute;
pub mod workflow;

// Re-exports
pub use classify::{classify, classify_all, ClassificationResult, Status};
pub use config::{ConfigError, Settings};
pub use container::{CommitOutcome, ContainerError, ContainerPatcher, RebuildSummary};
pub use dates::{DateError, DateForm, DateTimeValue};
pub use extract::{DateMatch, Extractor, Token, TokenCategory};
pub use patterns::PatternLibrary;
pub use reference::{LoadOptions, ReferenceEntry, ReferenceTable, TableError};
pub use substitute::{Substitution, SubstitutionOutcome};
pub use workflow::{patched_path, Analysis, ApplyReport, DocumentChecker, Patch, WorkflowError};
