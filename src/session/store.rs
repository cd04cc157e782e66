//! File system side of a session: path resolution, staleness and atomic writes.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Result, SpliceError};

/// Expands `~` and canonicalizes. Standard input (`-`) cannot be edited in place.
pub(crate) fn resolve(path: &Path) -> Result<PathBuf> {
    if path == Path::new("-") {
        return Err(SpliceError::UnsupportedSource("-".into()));
    }
    let expanded = PathBuf::from(&*shellexpand::tilde(&path.to_string_lossy()));
    expanded
        .canonicalize()
        .map_err(|e| SpliceError::io(&expanded, e))
}

/// What a file looked like when a session started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StaleToken {
    modified: Option<SystemTime>,
    len: u64,
}

impl StaleToken {
    pub(crate) fn capture(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path).map_err(|e| SpliceError::io(path, e))?;
        Ok(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }

    pub(crate) fn verify(&self, path: &Path) -> Result<()> {
        let current = Self::capture(path)?;
        if current == *self {
            return Ok(());
        }
        log::warn!(
            "{} changed on disk ({} -> {} bytes)",
            path.display(),
            self.len,
            current.len
        );
        Err(SpliceError::StaleFile {
            path: path.to_path_buf(),
        })
    }
}

/// `notes.md` is backed up to `notes.md~` next to it.
pub(crate) fn backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push("~");
    path.with_file_name(name)
}

/// Replaces `path` with `contents` through a synced temporary file in the
/// same directory, keeping the permissions of the file being replaced.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut temp = tempfile::Builder::new()
        .prefix(".md-splice-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| SpliceError::io(dir, e))?;
    temp.write_all(contents)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| SpliceError::io(temp.path(), e))?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp.path(), metadata.permissions())
            .map_err(|e| SpliceError::io(temp.path(), e))?;
    }

    temp.persist(path)
        .map_err(|e| SpliceError::io(path, e.error))?;
    log::trace!("wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}
