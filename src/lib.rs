#![allow(clippy::collapsible_if)]
#![deny(dead_code)]
//! Selector-driven, transactional editing of Markdown documents.
//!
//! Nodes are located with [`Selector`]s, changed with [`Operation`]s, and
//! every list of operations is applied all-or-nothing. Files are edited
//! through an [`EditSession`] or [`BatchEditSession`], which add staleness
//! checks, backups and atomic writes.
//!
//! ```no_run
//! use markdown_splice::{EditSession, InsertOperation, InsertPosition, Selector, SessionOptions};
//!
//! # fn main() -> markdown_splice::Result<()> {
//! let mut session: EditSession = EditSession::open("README.md", SessionOptions::default())?;
//! let after_install = InsertOperation::builder()
//!     .selector(Selector::builder().select_type("h2").contains("Install").build()?)
//!     .position(InsertPosition::AppendChild)
//!     .content("Requires Rust 1.80 or later.")
//!     .build()?;
//! session.apply(&[after_install.into()])?;
//! session.commit()?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
mod diff;
mod document;
mod error;
pub mod operations;
mod selector;
mod session;
mod traits;
mod transaction;

pub use codec::CodecFormat;
pub use diff::unified_diff;
pub use document::MarkdownDocument;
pub use error::{ErrorKind, Result, SpliceError};
pub use operations::{
    DeleteFrontmatterOperation, DeleteOperation, FrontmatterFormat, FrontmatterPath,
    InsertOperation, InsertPosition, Operation, ReplaceFrontmatterOperation, ReplaceOperation,
    SetFrontmatterOperation, Target,
};
pub use selector::{Anchor, RegexFlags, RegexSelector, Scope, Selector, SelectorBuilder};
pub use session::{BatchEditSession, CommitReport, EditSession, SessionOptions, SessionRegistry};
pub use traits::Document;
pub use transaction::{
    execute, Ambiguity, AmbiguityPolicy, AmbiguitySink, ApplyReport, SelectorTable,
};
