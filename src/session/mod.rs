//! Guarded, transactional edits of a file on disk.
//!
//! A session claims its path in a [`SessionRegistry`], remembers what the
//! file looked like, and only writes when [`EditSession::commit`] is called.
//! Dropping a session (or calling [`EditSession::abort`]) leaves the file
//! alone.

mod batch;
mod registry;
pub(crate) mod store;

pub use batch::BatchEditSession;
pub use registry::SessionRegistry;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::diff::unified_diff;
use crate::document::MarkdownDocument;
use crate::error::{Result, SpliceError};
use crate::operations::Operation;
use crate::traits::Document;
use crate::transaction::{Ambiguity, AmbiguityPolicy, ApplyReport};
use registry::ActiveSlot;
use store::StaleToken;

/// How a session treats ambiguity, staleness and the final write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, fieldwork::Fieldwork)]
#[fieldwork(with)]
#[serde(default, deny_unknown_fields)]
pub struct SessionOptions {
    /// Copy the file to `<name>~` before overwriting it
    pub backup: bool,
    /// Abort on selectors matching more than one node instead of warning
    pub fail_on_ambiguity: bool,
    /// Refuse to commit when the file changed since the session opened
    pub check_stale: bool,
    /// Put a unified diff of the change in the commit report
    pub preview_diff: bool,
    /// Write at all; when off, commit only reports
    pub commit: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            backup: true,
            fail_on_ambiguity: true,
            check_stale: true,
            preview_diff: false,
            commit: true,
        }
    }
}

impl SessionOptions {
    pub fn ambiguity_policy(&self) -> AmbiguityPolicy {
        if self.fail_on_ambiguity {
            AmbiguityPolicy::FailFast
        } else {
            AmbiguityPolicy::Warn
        }
    }
}

/// What [`EditSession::commit`] did.
#[derive(Debug, Clone, PartialEq, Eq, fieldwork::Fieldwork)]
#[fieldwork(get)]
pub struct CommitReport {
    path: PathBuf,
    /// whether the file on disk was replaced
    written: bool,
    backup_path: Option<PathBuf>,
    /// Present when [`SessionOptions::preview_diff`] was on and the file was written
    diff: Option<String>,
    ambiguities: Vec<Ambiguity>,
}

/// An open, exclusive edit of one file.
#[derive(Debug, fieldwork::Fieldwork)]
#[fieldwork(get)]
pub struct EditSession<D: Document = MarkdownDocument> {
    path: PathBuf,
    options: SessionOptions,
    #[fieldwork(get_mut)]
    document: D,
    #[fieldwork(skip)]
    token: StaleToken,
    /// ambiguities observed by every apply so far
    ambiguities: Vec<Ambiguity>,
    #[fieldwork(skip)]
    _slot: ActiveSlot,
}

impl<D: Document> EditSession<D> {
    /// Opens `path` using the process-wide [`SessionRegistry::global`].
    pub fn open(path: impl AsRef<Path>, options: SessionOptions) -> Result<Self> {
        Self::open_in(SessionRegistry::global(), path, options)
    }

    pub fn open_in(
        registry: &Arc<SessionRegistry>,
        path: impl AsRef<Path>,
        options: SessionOptions,
    ) -> Result<Self> {
        let path = store::resolve(path.as_ref())?;
        let slot = registry.claim(&path)?;

        let token = StaleToken::capture(&path)?;
        let text = fs::read_to_string(&path).map_err(|e| SpliceError::io(&path, e))?;
        let document = D::parse(&text)?;
        log::debug!("opened edit session for {}", path.display());

        Ok(Self {
            path,
            options,
            document,
            token,
            ambiguities: vec![],
            _slot: slot,
        })
    }

    /// Opens a session, runs `body`, then commits if it succeeded or aborts if
    /// it failed.
    pub fn run<T, E, F>(
        path: impl AsRef<Path>,
        options: SessionOptions,
        body: F,
    ) -> std::result::Result<(T, CommitReport), E>
    where
        E: From<SpliceError>,
        F: FnOnce(&mut Self) -> std::result::Result<T, E>,
    {
        let mut session = Self::open(path, options)?;
        match body(&mut session) {
            Ok(value) => Ok((value, session.commit()?)),
            Err(error) => {
                session.abort();
                Err(error)
            }
        }
    }

    /// Applies `operations` to the in-memory document right away.
    pub fn apply(&mut self, operations: &[Operation]) -> Result<ApplyReport> {
        let report = self
            .document
            .apply(operations, self.options.ambiguity_policy())?;
        self.ambiguities.extend(report.ambiguities().iter().cloned());
        Ok(report)
    }

    pub fn preview(&self, operations: &[Operation]) -> Result<String> {
        self.document
            .preview(operations, self.options.ambiguity_policy())
    }

    /// Ends the session without writing.
    pub fn abort(self) {
        log::debug!("aborted edit session for {}", self.path.display());
    }

    /// Writes the document back, with a backup of what it replaces.
    pub fn commit(self) -> Result<CommitReport> {
        self.finish(|_, _| Ok(vec![]))
    }

    /// `before_write` runs first and may still mutate the document; any
    /// ambiguities it returns are added to the report.
    pub(crate) fn finish<F>(mut self, before_write: F) -> Result<CommitReport>
    where
        F: FnOnce(&mut D, AmbiguityPolicy) -> Result<Vec<Ambiguity>>,
    {
        if !self.options.commit {
            log::debug!("commit disabled, {} left untouched", self.path.display());
            return Ok(CommitReport {
                path: self.path,
                written: false,
                backup_path: None,
                diff: None,
                ambiguities: self.ambiguities,
            });
        }

        let observed = before_write(&mut self.document, self.options.ambiguity_policy())?;
        self.ambiguities.extend(observed);

        if self.options.check_stale {
            self.token.verify(&self.path)?;
        }

        let rendered = self.document.render();
        let current = if self.options.preview_diff || self.options.backup {
            Some(fs::read(&self.path).map_err(|e| SpliceError::io(&self.path, e))?)
        } else {
            None
        };

        let diff = current
            .as_deref()
            .filter(|_| self.options.preview_diff)
            .map(|current| {
                let current = String::from_utf8_lossy(current);
                unified_diff(&current, &rendered, "original", "modified")
            });
        if let Some(diff) = &diff {
            log::info!("changes to {}:\n{diff}", self.path.display());
        }

        let backup_path = match current.as_deref().filter(|_| self.options.backup) {
            Some(current) => {
                let backup = store::backup_path(&self.path);
                store::write_atomic(&backup, current)?;
                Some(backup)
            }
            None => None,
        };

        store::write_atomic(&self.path, rendered.as_bytes())?;
        log::debug!("committed {}", self.path.display());

        Ok(CommitReport {
            path: self.path,
            written: true,
            backup_path,
            diff,
            ambiguities: self.ambiguities,
        })
    }
}
