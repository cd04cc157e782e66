use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::error::{Result, SpliceError};

/// Canonical paths that currently have an open edit session.
///
/// Opening a second session for a path that is already claimed fails with
/// [`SpliceError::SessionActive`]. Claims are released when the session ends,
/// however it ends.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: Mutex<HashSet<PathBuf>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry used by [`EditSession::open`](super::EditSession::open).
    pub fn global() -> &'static Arc<SessionRegistry> {
        static GLOBAL: OnceLock<Arc<SessionRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(SessionRegistry::new()))
    }

    pub fn is_active(&self, path: impl AsRef<Path>) -> bool {
        self.lock().contains(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        // The set stays consistent even if a holder panicked.
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn claim(self: &Arc<Self>, path: &Path) -> Result<ActiveSlot> {
        if !self.lock().insert(path.to_path_buf()) {
            return Err(SpliceError::SessionActive {
                path: path.to_path_buf(),
            });
        }
        log::debug!("claimed {}", path.display());
        Ok(ActiveSlot {
            registry: Arc::clone(self),
            path: path.to_path_buf(),
        })
    }
}

/// A claimed path, released on drop.
#[derive(Debug)]
pub(crate) struct ActiveSlot {
    registry: Arc<SessionRegistry>,
    path: PathBuf,
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.path);
        log::debug!("released {}", self.path.display());
    }
}
