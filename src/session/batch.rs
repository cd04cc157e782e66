use std::path::Path;
use std::sync::Arc;

use super::{CommitReport, EditSession, SessionOptions, SessionRegistry};
use crate::document::MarkdownDocument;
use crate::error::{Result, SpliceError};
use crate::operations::Operation;
use crate::traits::Document;

/// An edit session that queues operations and applies them together on commit.
///
/// The document is untouched until [`BatchEditSession::commit`], which submits
/// the whole queue, in order, to a single [`Document::apply`]. Any failure
/// there aborts the commit and nothing is written.
#[derive(Debug, fieldwork::Fieldwork)]
#[fieldwork(get)]
pub struct BatchEditSession<D: Document = MarkdownDocument> {
    #[fieldwork(skip)]
    session: EditSession<D>,
    /// operations waiting for the commit
    #[fieldwork(rename = queued)]
    queue: Vec<Operation>,
}

impl<D: Document> BatchEditSession<D> {
    pub fn open(path: impl AsRef<Path>, options: SessionOptions) -> Result<Self> {
        Self::open_in(SessionRegistry::global(), path, options)
    }

    pub fn open_in(
        registry: &Arc<SessionRegistry>,
        path: impl AsRef<Path>,
        options: SessionOptions,
    ) -> Result<Self> {
        Ok(Self {
            session: EditSession::open_in(registry, path, options)?,
            queue: vec![],
        })
    }

    /// Opens a batch, lets `body` queue operations, then commits or aborts.
    pub fn run<T, E, F>(
        path: impl AsRef<Path>,
        options: SessionOptions,
        body: F,
    ) -> std::result::Result<(T, CommitReport), E>
    where
        E: From<SpliceError>,
        F: FnOnce(&mut Self) -> std::result::Result<T, E>,
    {
        let mut batch = Self::open(path, options)?;
        match body(&mut batch) {
            Ok(value) => Ok((value, batch.commit()?)),
            Err(error) => {
                batch.abort();
                Err(error)
            }
        }
    }

    /// Queues an operation for the commit.
    pub fn apply(&mut self, operation: impl Into<Operation>) {
        self.queue.push(operation.into());
    }

    pub fn path(&self) -> &Path {
        self.session.path()
    }

    /// The document as it was read; queued operations are not reflected.
    pub fn document(&self) -> &D {
        self.session.document()
    }

    /// Renders the document as the queue would leave it.
    pub fn preview(&self) -> Result<String> {
        self.session.preview(&self.queue)
    }

    pub fn abort(self) {
        log::debug!("discarding {} queued operations", self.queue.len());
        self.session.abort();
    }

    pub fn commit(self) -> Result<CommitReport> {
        let queue = self.queue;
        log::debug!("applying {} queued operations", queue.len());
        self.session.finish(move |document, policy| {
            Ok(document.apply(&queue, policy)?.into_ambiguities())
        })
    }
}
