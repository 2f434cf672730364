use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the destination is left as it was.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut temp = tempfile::NamedTempFile::new_in(parent_dir(path))?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Write each item followed by a newline.
pub fn write_lines<S: AsRef<str>>(path: &Path, items: &[S]) -> io::Result<()> {
    let mut content = String::new();
    for item in items {
        content.push_str(item.as_ref());
        content.push('\n');
    }
    atomic_write(path, content.as_bytes())
}

/// Directory a temp file must live in to be renamed onto `path`.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Read a whole UTF-8 file.
pub fn read_text(path: &Path) -> io::Result<String> {
    fs::read_to_string(path)
}
