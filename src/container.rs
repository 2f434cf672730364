//! Crash-safe member replacement for zip containers.
//!
//! # Lifecycle
//!
//! `open` → `stage`/`remove` (changes accumulate in temporary buffers, the
//! archive on disk is untouched) → `commit` (a new archive is built into a
//! temporary file next to the destination, fsynced, then renamed over it).
//!
//! The rename is the only step that touches the destination path. If any
//! earlier step fails, the temporary file is removed and the destination
//! is left byte-for-byte as it was. Staged buffers are released when the
//! patcher is dropped, whichever way commit ends.

use crate::fsio;
use log::{debug, info};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, SpooledTempFile};
use thiserror::Error;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Staged members up to this size stay in memory.
const SPOOL_THRESHOLD: usize = 1024 * 1024;

/// Largest declared member size taken as a read-buffer hint. Declared
/// sizes come from the archive and are not trusted beyond this.
const READ_HINT_LIMIT: u64 = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("failed to open container {path}: {source}")]
    Io {
        path: PathBuf,
        source: io::Error,
    },

    #[error("invalid zip container {path}: {source}")]
    Zip { path: PathBuf, source: ZipError },

    #[error("member '{member}' not found in {path}")]
    MemberNotFound { path: PathBuf, member: String },

    #[error("member '{member}' of {path} is not valid UTF-8")]
    InvalidUtf8 { path: PathBuf, member: String },

    #[error("failed to stage member '{member}': {source}")]
    Stage { member: String, source: io::Error },

    #[error("rebuild of {path} failed while {step}: {source}")]
    Rebuild {
        path: PathBuf,
        step: RebuildStep,
        source: io::Error,
    },
}

/// The step of a rebuild that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildStep {
    CreatingTempFile,
    CopyingMember(String),
    WritingMember(String),
    Finishing,
    Syncing,
    Replacing,
}

impl fmt::Display for RebuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildStep::CreatingTempFile => write!(f, "creating the temporary archive"),
            RebuildStep::CopyingMember(name) => write!(f, "copying member '{name}'"),
            RebuildStep::WritingMember(name) => write!(f, "writing member '{name}'"),
            RebuildStep::Finishing => write!(f, "writing the central directory"),
            RebuildStep::Syncing => write!(f, "syncing the temporary archive"),
            RebuildStep::Replacing => write!(f, "replacing the destination"),
        }
    }
}

enum Staged {
    Replace(SpooledTempFile),
    Delete,
}

/// What a commit did.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "CommitOutcome reports whether the archive was rewritten"]
pub enum CommitOutcome {
    /// Nothing was staged; no file was written
    Unchanged,
    /// A new archive was written to the destination
    Rebuilt(RebuildSummary),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    pub destination: PathBuf,
    /// Members copied verbatim
    pub copied: usize,
    pub replaced: Vec<String>,
    pub removed: Vec<String>,
    /// Staged members that did not exist in the source archive
    pub added: Vec<String>,
}

/// An open zip container with staged member changes.
#[must_use = "staged changes are discarded unless commit() is called"]
pub struct ContainerPatcher {
    path: PathBuf,
    archive: ZipArchive<File>,
    staged: BTreeMap<String, Staged>,
    #[cfg(test)]
    fail_at: Option<String>,
}

impl fmt::Debug for ContainerPatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerPatcher")
            .field("path", &self.path)
            .field("members", &self.archive.len())
            .field("staged", &self.staged.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ContainerPatcher {
    /// Open a container for reading and staging.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| ContainerError::Io {
            path: path.clone(),
            source,
        })?;
        let archive = ZipArchive::new(file).map_err(|source| ContainerError::Zip {
            path: path.clone(),
            source,
        })?;
        debug!("opened {} ({} members)", path.display(), archive.len());

        Ok(Self {
            path,
            archive,
            staged: BTreeMap::new(),
            #[cfg(test)]
            fail_at: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Member names in archive order.
    pub fn member_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.archive.index_for_name(name).is_some()
    }

    /// Whether any change is waiting for commit.
    pub fn is_staging(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Read a member as stored in the archive on disk (staged changes are
    /// not visible here).
    pub fn read_member(&mut self, name: &str) -> Result<Vec<u8>, ContainerError> {
        let mut member = self.archive.by_name(name).map_err(|source| match source {
            ZipError::FileNotFound => ContainerError::MemberNotFound {
                path: self.path.clone(),
                member: name.to_string(),
            },
            source => ContainerError::Zip {
                path: self.path.clone(),
                source,
            },
        })?;

        let mut content = Vec::with_capacity(read_hint(member.size()));
        member
            .read_to_end(&mut content)
            .map_err(|source| ContainerError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(content)
    }

    /// Read a member and decode it as UTF-8.
    pub fn read_member_string(&mut self, name: &str) -> Result<String, ContainerError> {
        let bytes = self.read_member(name)?;
        String::from_utf8(bytes).map_err(|_| ContainerError::InvalidUtf8 {
            path: self.path.clone(),
            member: name.to_string(),
        })
    }

    /// Stage new content for a member.
    ///
    /// Staging a name again replaces the earlier staged content. A name
    /// that is not in the archive is appended on commit.
    pub fn stage(&mut self, name: &str, content: &[u8]) -> Result<(), ContainerError> {
        self.stage_from_reader(name, &mut &content[..])
    }

    /// Stage the content of a file on disk for a member.
    pub fn stage_from_file(&mut self, name: &str, source: &Path) -> Result<(), ContainerError> {
        let mut file = File::open(source).map_err(|source| ContainerError::Stage {
            member: name.to_string(),
            source,
        })?;
        self.stage_from_reader(name, &mut file)
    }

    fn stage_from_reader(
        &mut self,
        name: &str,
        reader: &mut dyn Read,
    ) -> Result<(), ContainerError> {
        let mut buffer = tempfile::spooled_tempfile(SPOOL_THRESHOLD);
        let written = io::copy(reader, &mut buffer)
            .and_then(|written| buffer.flush().map(|_| written))
            .map_err(|source| ContainerError::Stage {
                member: name.to_string(),
                source,
            })?;
        debug!("staged {written} bytes for '{name}'");
        self.staged.insert(name.to_string(), Staged::Replace(buffer));
        Ok(())
    }

    /// Mark a member for deletion.
    pub fn remove(&mut self, name: &str) -> Result<(), ContainerError> {
        if !self.has_member(name) {
            return Err(ContainerError::MemberNotFound {
                path: self.path.clone(),
                member: name.to_string(),
            });
        }
        debug!("staged removal of '{name}'");
        self.staged.insert(name.to_string(), Staged::Delete);
        Ok(())
    }

    /// Write staged changes back over the source archive.
    ///
    /// With nothing staged this is a no-op.
    pub fn commit(self) -> Result<CommitOutcome, ContainerError> {
        if self.staged.is_empty() {
            debug!("nothing staged for {}, skipping rebuild", self.path.display());
            return Ok(CommitOutcome::Unchanged);
        }
        let destination = self.path.clone();
        self.commit_into(&destination)
    }

    /// Write the archive with staged changes applied to `destination`,
    /// leaving the source archive untouched.
    ///
    /// Always writes, even with nothing staged.
    pub fn commit_to(
        self,
        destination: impl AsRef<Path>,
    ) -> Result<CommitOutcome, ContainerError> {
        self.commit_into(destination.as_ref())
    }

    fn commit_into(mut self, destination: &Path) -> Result<CommitOutcome, ContainerError> {
        let (temp, mut summary) = self.rebuild(destination)?;

        // Release the source handle and staged buffers before the rename
        drop(self);

        temp.persist(destination)
            .map_err(|e| rebuild_error(destination, RebuildStep::Replacing, e.error))?;

        summary.destination = destination.to_path_buf();
        info!(
            "wrote {} ({} copied, {} replaced, {} removed, {} added)",
            destination.display(),
            summary.copied,
            summary.replaced.len(),
            summary.removed.len(),
            summary.added.len()
        );
        Ok(CommitOutcome::Rebuilt(summary))
    }

    /// Build the new archive into a temporary file beside `destination`.
    fn rebuild(
        &mut self,
        destination: &Path,
    ) -> Result<(NamedTempFile, RebuildSummary), ContainerError> {
        let mut temp = NamedTempFile::new_in(fsio::parent_dir(destination))
            .map_err(|e| rebuild_error(destination, RebuildStep::CreatingTempFile, e))?;
        let mut pending = std::mem::take(&mut self.staged);
        let mut summary = RebuildSummary::default();

        {
            let mut writer = ZipWriter::new(temp.as_file_mut());

            for index in 0..self.archive.len() {
                let entry = self.archive.by_index_raw(index).map_err(|e| {
                    rebuild_error(
                        destination,
                        RebuildStep::CopyingMember(format!("#{index}")),
                        e.into(),
                    )
                })?;
                let name = entry.name().to_string();

                #[cfg(test)]
                if self.fail_at.as_deref() == Some(name.as_str()) {
                    return Err(rebuild_error(
                        destination,
                        RebuildStep::CopyingMember(name),
                        io::Error::other("injected failure"),
                    ));
                }

                match pending.remove(&name) {
                    Some(Staged::Delete) => {
                        debug!("dropping '{name}'");
                        summary.removed.push(name);
                    }
                    Some(Staged::Replace(mut buffer)) => {
                        let options = SimpleFileOptions::default()
                            .compression_method(writable_method(entry.compression()))
                            .last_modified_time(entry.last_modified().unwrap_or_default());
                        let options = match entry.unix_mode() {
                            Some(mode) => options.unix_permissions(mode),
                            None => options,
                        };
                        drop(entry);

                        write_member(&mut writer, &name, options, &mut buffer).map_err(|e| {
                            rebuild_error(destination, RebuildStep::WritingMember(name.clone()), e)
                        })?;
                        debug!("replaced '{name}'");
                        summary.replaced.push(name);
                    }
                    None => {
                        writer.raw_copy_file(entry).map_err(|e| {
                            rebuild_error(destination, RebuildStep::CopyingMember(name), e.into())
                        })?;
                        summary.copied += 1;
                    }
                }
            }

            for (name, staged) in pending {
                let Staged::Replace(mut buffer) = staged else {
                    continue;
                };
                let options =
                    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
                write_member(&mut writer, &name, options, &mut buffer).map_err(|e| {
                    rebuild_error(destination, RebuildStep::WritingMember(name.clone()), e)
                })?;
                debug!("added '{name}'");
                summary.added.push(name);
            }

            writer
                .finish()
                .map_err(|e| rebuild_error(destination, RebuildStep::Finishing, e.into()))?;
        }

        temp.as_file()
            .sync_all()
            .map_err(|e| rebuild_error(destination, RebuildStep::Syncing, e))?;

        Ok((temp, summary))
    }

    /// Make the rebuild fail when it reaches `member`.
    #[cfg(test)]
    fn fail_at(&mut self, member: &str) {
        self.fail_at = Some(member.to_string());
    }
}

fn write_member<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    name: &str,
    options: SimpleFileOptions,
    buffer: &mut SpooledTempFile,
) -> io::Result<()> {
    writer.start_file(name, options)?;
    buffer.seek(SeekFrom::Start(0))?;
    io::copy(buffer, writer)?;
    Ok(())
}

/// Compression to use when re-encoding a replaced member.
fn writable_method(original: CompressionMethod) -> CompressionMethod {
    match original {
        CompressionMethod::Stored => CompressionMethod::Stored,
        _ => CompressionMethod::Deflated,
    }
}

fn rebuild_error(path: &Path, step: RebuildStep, source: io::Error) -> ContainerError {
    ContainerError::Rebuild {
        path: path.to_path_buf(),
        step,
        source,
    }
}

fn read_hint(declared: u64) -> usize {
    usize::try_from(declared.min(READ_HINT_LIMIT)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const BODY: &str = "<w:document><w:t>PN-B-03264:1999</w:t></w:document>";

    fn build_archive(path: &Path) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        zip.start_file("[Content_Types].xml", deflated).unwrap();
        zip.write_all(b"<Types/>").unwrap();
        zip.start_file("word/document.xml", deflated).unwrap();
        zip.write_all(BODY.as_bytes()).unwrap();
        zip.start_file("word/media/image1.bin", stored).unwrap();
        zip.write_all(&[0u8, 159, 146, 150]).unwrap();
        zip.start_file("word/styles.xml", deflated).unwrap();
        zip.write_all(b"<w:styles/>").unwrap();
        zip.finish().unwrap();
    }

    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opis.docx");
        build_archive(&path);
        (dir, path)
    }

    fn dir_entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_read_member() {
        let (_dir, path) = fixture();
        let mut patcher = ContainerPatcher::open(&path).unwrap();
        assert_eq!(patcher.read_member_string("word/document.xml").unwrap(), BODY);
        assert_eq!(
            patcher.member_names(),
            vec![
                "[Content_Types].xml",
                "word/document.xml",
                "word/media/image1.bin",
                "word/styles.xml"
            ]
        );
    }

    /// Rewrite the uncompressed size recorded for `member` in the central
    /// directory.
    fn declare_size(path: &Path, member: &str, size: u32) {
        let mut bytes = fs::read(path).unwrap();
        let mut pos = 0;
        while let Some(offset) = bytes[pos..].windows(4).position(|w| w == b"PK\x01\x02") {
            let header = pos + offset;
            let name_len = u16::from_le_bytes([bytes[header + 28], bytes[header + 29]]) as usize;
            if &bytes[header + 46..header + 46 + name_len] == member.as_bytes() {
                bytes[header + 24..header + 28].copy_from_slice(&size.to_le_bytes());
                fs::write(path, bytes).unwrap();
                return;
            }
            pos = header + 4;
        }
        panic!("{member} not in central directory");
    }

    #[test]
    fn test_read_hint_is_capped() {
        assert_eq!(read_hint(0), 0);
        assert_eq!(read_hint(4096), 4096);
        assert_eq!(read_hint(u64::MAX), READ_HINT_LIMIT as usize);
    }

    #[test]
    fn test_read_member_ignores_declared_size() {
        let (_dir, path) = fixture();
        declare_size(&path, "word/media/image1.bin", u32::MAX - 1);

        let outcome = ContainerPatcher::open(&path).and_then(|mut patcher| {
            patcher.read_member("word/media/image1.bin")
        });
        if let Ok(content) = outcome {
            assert_eq!(content, vec![0u8, 159, 146, 150]);
        }
    }

    #[test]
    fn test_large_member_reads_back() {
        let (_dir, path) = fixture();
        let body: String = "<w:t>PN-EN 1990:2004</w:t>".repeat(8192);

        let mut patcher = ContainerPatcher::open(&path).unwrap();
        patcher.stage("word/document.xml", body.as_bytes()).unwrap();
        patcher.commit().unwrap();

        let mut patcher = ContainerPatcher::open(&path).unwrap();
        assert_eq!(patcher.read_member_string("word/document.xml").unwrap(), body);
    }

    #[test]
    fn test_missing_member() {
        let (_dir, path) = fixture();
        let mut patcher = ContainerPatcher::open(&path).unwrap();
        assert!(matches!(
            patcher.read_member("word/missing.xml"),
            Err(ContainerError::MemberNotFound { .. })
        ));
        assert!(matches!(
            patcher.remove("word/missing.xml"),
            Err(ContainerError::MemberNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_member() {
        let (_dir, path) = fixture();
        let mut patcher = ContainerPatcher::open(&path).unwrap();
        assert!(matches!(
            patcher.read_member_string("word/media/image1.bin"),
            Err(ContainerError::InvalidUtf8 { .. })
        ));
    }

    #[test]
    fn test_not_a_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.docx");
        fs::write(&path, b"not a zip").unwrap();
        assert!(matches!(
            ContainerPatcher::open(&path),
            Err(ContainerError::Zip { .. })
        ));
    }

    #[test]
    fn test_commit_without_changes_is_noop() {
        let (dir, path) = fixture();
        let before = fs::read(&path).unwrap();
        let patcher = ContainerPatcher::open(&path).unwrap();
        assert!(!patcher.is_staging());
        assert_eq!(patcher.commit().unwrap(), CommitOutcome::Unchanged);
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(dir_entries(dir.path()), 1);
    }

    #[test]
    fn test_commit_replaces_member_in_place() {
        let (dir, path) = fixture();
        let mut patcher = ContainerPatcher::open(&path).unwrap();
        patcher.stage("word/document.xml", b"<new/>").unwrap();

        let CommitOutcome::Rebuilt(summary) = patcher.commit().unwrap() else {
            panic!("expected a rebuild");
        };
        assert_eq!(summary.replaced, vec!["word/document.xml"]);
        assert_eq!(summary.copied, 3);
        assert_eq!(summary.destination, path);

        let mut reopened = ContainerPatcher::open(&path).unwrap();
        assert_eq!(reopened.read_member_string("word/document.xml").unwrap(), "<new/>");
        assert_eq!(reopened.read_member_string("word/styles.xml").unwrap(), "<w:styles/>");
        assert_eq!(
            reopened.read_member("word/media/image1.bin").unwrap(),
            vec![0u8, 159, 146, 150]
        );
        assert_eq!(reopened.member_names().len(), 4);
        assert_eq!(dir_entries(dir.path()), 1);
    }

    #[test]
    fn test_replaced_member_keeps_compression() {
        let (_dir, path) = fixture();
        let mut patcher = ContainerPatcher::open(&path).unwrap();
        patcher.stage("word/media/image1.bin", &[1, 2, 3]).unwrap();
        let _ = patcher.commit().unwrap();

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let member = archive.by_name("word/media/image1.bin").unwrap();
        assert_eq!(member.compression(), CompressionMethod::Stored);
    }

    #[test]
    fn test_restaging_replaces_previous_content() {
        let (_dir, path) = fixture();
        let mut patcher = ContainerPatcher::open(&path).unwrap();
        patcher.stage("word/document.xml", b"first").unwrap();
        patcher.stage("word/document.xml", b"second").unwrap();
        let _ = patcher.commit().unwrap();

        let mut reopened = ContainerPatcher::open(&path).unwrap();
        assert_eq!(reopened.read_member_string("word/document.xml").unwrap(), "second");
    }

    #[test]
    fn test_remove_and_add_members() {
        let (_dir, path) = fixture();
        let mut patcher = ContainerPatcher::open(&path).unwrap();
        patcher.remove("word/styles.xml").unwrap();
        patcher.stage("customXml/item1.xml", b"<item/>").unwrap();

        let CommitOutcome::Rebuilt(summary) = patcher.commit().unwrap() else {
            panic!("expected a rebuild");
        };
        assert_eq!(summary.removed, vec!["word/styles.xml"]);
        assert_eq!(summary.added, vec!["customXml/item1.xml"]);

        let mut reopened = ContainerPatcher::open(&path).unwrap();
        assert!(!reopened.has_member("word/styles.xml"));
        assert_eq!(reopened.read_member_string("customXml/item1.xml").unwrap(), "<item/>");
        assert_eq!(
            reopened.member_names().last().map(String::as_str),
            Some("customXml/item1.xml")
        );
    }

    #[test]
    fn test_stage_from_file() {
        let (dir, path) = fixture();
        let source = dir.path().join("document.xml");
        fs::write(&source, "<from-file/>").unwrap();

        let mut patcher = ContainerPatcher::open(&path).unwrap();
        patcher.stage_from_file("word/document.xml", &source).unwrap();
        let _ = patcher.commit().unwrap();

        let mut reopened = ContainerPatcher::open(&path).unwrap();
        assert_eq!(
            reopened.read_member_string("word/document.xml").unwrap(),
            "<from-file/>"
        );
    }

    #[test]
    fn test_commit_to_leaves_source_untouched() {
        let (dir, path) = fixture();
        let before = fs::read(&path).unwrap();
        let dest = dir.path().join("opis_FFNORMA.docx");

        let mut patcher = ContainerPatcher::open(&path).unwrap();
        patcher.stage("word/document.xml", b"<new/>").unwrap();
        let _ = patcher.commit_to(&dest).unwrap();

        assert_eq!(fs::read(&path).unwrap(), before);
        let mut patched = ContainerPatcher::open(&dest).unwrap();
        assert_eq!(patched.read_member_string("word/document.xml").unwrap(), "<new/>");
    }

    #[test]
    fn test_failed_rebuild_leaves_original_intact() {
        let (dir, path) = fixture();
        let before = fs::read(&path).unwrap();

        let mut patcher = ContainerPatcher::open(&path).unwrap();
        patcher.stage("word/document.xml", b"<new/>").unwrap();
        patcher.fail_at("word/media/image1.bin");

        let err = patcher.commit().unwrap_err();
        match err {
            ContainerError::Rebuild { step, .. } => {
                assert_eq!(step, RebuildStep::CopyingMember("word/media/image1.bin".into()))
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(fs::read(&path).unwrap(), before);
        // The temporary archive is cleaned up
        assert_eq!(dir_entries(dir.path()), 1);
    }
}
