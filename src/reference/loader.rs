use crate::reference::alias_set::{self, AliasSetError};
use crate::reference::table::{EntryError, ReferenceEntry, ReferenceTable};
use log::{debug, info};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("failed to read reference table {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed reference table: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: expected 3 fields, found {found}")]
    MalformedRow { line: u64, found: usize },

    #[error("line {line}: {source}")]
    AliasSet { line: u64, source: AliasSetError },

    #[error("line {line}: {source}")]
    Entry { line: u64, source: EntryError },
}

/// How the delimited file is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub has_header: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: false,
        }
    }
}

/// Load a reference table from rows of
/// `canonical_code, current_alias, superseded_aliases`.
pub fn load_from_reader<R: Read>(
    reader: R,
    options: LoadOptions,
) -> Result<ReferenceTable, TableError> {
    let mut csv = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(options.has_header)
        .flexible(true)
        .from_reader(reader);

    let mut entries = Vec::new();
    for record in csv.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());

        if record.len() < 3 {
            return Err(TableError::MalformedRow {
                line,
                found: record.len(),
            });
        }

        let aliases = alias_set::parse(&record[2])
            .map_err(|source| TableError::AliasSet { line, source })?;
        let entry = ReferenceEntry::new(record[0].trim(), record[1].trim(), aliases)
            .map_err(|source| TableError::Entry { line, source })?;

        debug!(
            "line {line}: {} with {} superseded aliases",
            entry.current_alias(),
            entry.superseded_aliases().len()
        );
        entries.push(entry);
    }

    Ok(ReferenceTable::new(entries))
}

pub fn load_from_str(input: &str, options: LoadOptions) -> Result<ReferenceTable, TableError> {
    load_from_reader(input.as_bytes(), options)
}

pub fn load_from_path(
    path: impl AsRef<Path>,
    options: LoadOptions,
) -> Result<ReferenceTable, TableError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = load_from_reader(file, options)?;
    info!(
        "loaded {} reference entries from {}",
        table.len(),
        path.display()
    );
    Ok(table)
}
