use std::path::PathBuf;

use strum::{AsRefStr, Display, EnumString, VariantNames};

use crate::transaction::Ambiguity;

pub type Result<T, E = SpliceError> = std::result::Result<T, E>;

/// Every failure this crate can produce.
///
/// Variants are disjoint so callers can match on the kind of failure instead
/// of inspecting message text.
#[derive(Debug, thiserror::Error)]
pub enum SpliceError {
    #[error("a selector cannot be scoped both `after` and `within` another node")]
    ConflictingScope,

    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("could not parse operations: {0}")]
    OperationParse(String),

    #[error("operation #{} failed: {source}", .index + 1)]
    OperationFailed {
        index: usize,
        #[source]
        source: Box<SpliceError>,
    },

    #[error("ambiguity detected: {0}")]
    Ambiguity(Ambiguity),

    #[error("file changed on disk since the session started: {}", .path.display())]
    StaleFile { path: PathBuf },

    #[error("an edit session is already active for {}", .path.display())]
    SessionActive { path: PathBuf },

    #[error("unsupported source `{0}`: edit sessions require a file on disk")]
    UnsupportedSource(String),

    #[error("the document was not read from a file, so it cannot be written in place")]
    NoSourcePath,

    #[error("no node matched selector {0}")]
    NodeNotFound(String),

    #[error("cannot insert children into a {0}")]
    InvalidChildInsertion(String),

    #[error("content for a list item target must be a single list: {0}")]
    InvalidListItemContent(String),

    #[error("sections start at a heading, found a {0}")]
    InvalidSectionDelete(String),

    #[error("ranges must start and end at block-level nodes, not list items")]
    RangeRequiresBlock,

    #[error("selector alias `{0}` is not defined")]
    SelectorAliasNotDefined(String),

    #[error("selector alias `{0}` is already defined")]
    SelectorAliasAlreadyDefined(String),

    #[error("the document has no frontmatter")]
    FrontmatterMissing,

    #[error("frontmatter key `{0}` not found")]
    FrontmatterKeyNotFound(String),

    #[error("could not parse frontmatter: {0}")]
    FrontmatterParse(String),

    #[error("could not serialize frontmatter: {0}")]
    FrontmatterSerialize(String),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Flat discriminant of [`SpliceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    ConflictingScope,
    InvalidRegex,
    InvalidArgument,
    OperationParse,
    OperationFailed,
    Ambiguity,
    StaleFile,
    SessionActive,
    UnsupportedSource,
    NoSourcePath,
    NodeNotFound,
    InvalidChildInsertion,
    InvalidListItemContent,
    InvalidSectionDelete,
    RangeRequiresBlock,
    SelectorAliasNotDefined,
    SelectorAliasAlreadyDefined,
    FrontmatterMissing,
    FrontmatterKeyNotFound,
    FrontmatterParse,
    FrontmatterSerialize,
    Io,
}

impl SpliceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SpliceError::ConflictingScope => ErrorKind::ConflictingScope,
            SpliceError::InvalidRegex(_) => ErrorKind::InvalidRegex,
            SpliceError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SpliceError::OperationParse(_) => ErrorKind::OperationParse,
            SpliceError::OperationFailed { .. } => ErrorKind::OperationFailed,
            SpliceError::Ambiguity(_) => ErrorKind::Ambiguity,
            SpliceError::StaleFile { .. } => ErrorKind::StaleFile,
            SpliceError::SessionActive { .. } => ErrorKind::SessionActive,
            SpliceError::UnsupportedSource(_) => ErrorKind::UnsupportedSource,
            SpliceError::NoSourcePath => ErrorKind::NoSourcePath,
            SpliceError::NodeNotFound(_) => ErrorKind::NodeNotFound,
            SpliceError::InvalidChildInsertion(_) => ErrorKind::InvalidChildInsertion,
            SpliceError::InvalidListItemContent(_) => ErrorKind::InvalidListItemContent,
            SpliceError::InvalidSectionDelete(_) => ErrorKind::InvalidSectionDelete,
            SpliceError::RangeRequiresBlock => ErrorKind::RangeRequiresBlock,
            SpliceError::SelectorAliasNotDefined(_) => ErrorKind::SelectorAliasNotDefined,
            SpliceError::SelectorAliasAlreadyDefined(_) => ErrorKind::SelectorAliasAlreadyDefined,
            SpliceError::FrontmatterMissing => ErrorKind::FrontmatterMissing,
            SpliceError::FrontmatterKeyNotFound(_) => ErrorKind::FrontmatterKeyNotFound,
            SpliceError::FrontmatterParse(_) => ErrorKind::FrontmatterParse,
            SpliceError::FrontmatterSerialize(_) => ErrorKind::FrontmatterSerialize,
            SpliceError::Io { .. } => ErrorKind::Io,
        }
    }

    /// The innermost error, looking through [`SpliceError::OperationFailed`].
    pub fn root_cause(&self) -> &SpliceError {
        match self {
            SpliceError::OperationFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SpliceError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn failed_at(index: usize, source: SpliceError) -> Self {
        SpliceError::OperationFailed {
            index,
            source: Box::new(source),
        }
    }
}
