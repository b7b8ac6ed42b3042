//! Whole-file artifact writes.
//!
//! Artifacts are written to a temp file in the destination directory and
//! renamed over the target, so readers see either the old or the new file.

use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::PipelineError;

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Creates a temp file next to `path`, keeping its extension so encoders
/// that pick a format from the file name still work.
pub(crate) fn temp_file_beside(path: &Path) -> Result<NamedTempFile, PipelineError> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;

    let suffix = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    tempfile::Builder::new()
        .prefix(".tmp-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .map_err(|e| PipelineError::io(dir, e))
}

/// Renames a finished temp file over `path`.
pub(crate) fn commit(tmp: NamedTempFile, path: &Path) -> Result<(), PipelineError> {
    tmp.persist(path)
        .map_err(|e| PipelineError::io(path, e.error))?;
    Ok(())
}

/// Replaces the file at `path` with `contents` in one rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PipelineError> {
    let mut tmp = temp_file_beside(path)?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| PipelineError::io(path, e))?;
    commit(tmp, path)
}
