//! The closed set of mutations that can be requested against a document.
//!
//! Every operation is validated when it is built and exposes its fields
//! through getters only.

mod block;
mod frontmatter;
mod validation;

pub use block::{
    DeleteBuilder, DeleteOperation, InsertBuilder, InsertOperation, InsertPosition, ReplaceBuilder,
    ReplaceOperation,
};
pub use frontmatter::{
    DeleteFrontmatterOperation, FrontmatterFormat, FrontmatterPath, PathSegment,
    ReplaceFrontmatterOperation, SetFrontmatterOperation,
};

use std::fmt::{self, Display, Formatter};

use crate::error::{Result, SpliceError};
use crate::selector::Selector;

/// Where an operation points: an inline selector or the alias of one.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Selector(Selector),
    Ref(String),
}

impl Target {
    pub(crate) fn reference(alias: String, field: &str) -> Result<Self> {
        if alias.trim().is_empty() {
            Err(SpliceError::InvalidArgument(format!(
                "`{field}` cannot be empty"
            )))
        } else {
            Ok(Target::Ref(alias))
        }
    }

    pub fn selector(&self) -> Option<&Selector> {
        match self {
            Target::Selector(selector) => Some(selector),
            Target::Ref(_) => None,
        }
    }

    pub fn selector_ref(&self) -> Option<&str> {
        match self {
            Target::Selector(_) => None,
            Target::Ref(alias) => Some(alias),
        }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Target::Selector(selector) => Display::fmt(selector, f),
            Target::Ref(alias) => write!(f, "ref {alias}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Insert(InsertOperation),
    Replace(ReplaceOperation),
    Delete(DeleteOperation),
    SetFrontmatter(SetFrontmatterOperation),
    DeleteFrontmatter(DeleteFrontmatterOperation),
    ReplaceFrontmatter(ReplaceFrontmatterOperation),
}

impl Operation {
    /// The `op` tag used for this variant in operation files.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Insert(_) => "insert",
            Operation::Replace(_) => "replace",
            Operation::Delete(_) => "delete",
            Operation::SetFrontmatter(_) => "set_frontmatter",
            Operation::DeleteFrontmatter(_) => "delete_frontmatter",
            Operation::ReplaceFrontmatter(_) => "replace_frontmatter",
        }
    }

    pub fn comment(&self) -> Option<&str> {
        match self {
            Operation::Insert(op) => op.comment(),
            Operation::Replace(op) => op.comment(),
            Operation::Delete(op) => op.comment(),
            Operation::SetFrontmatter(op) => op.comment(),
            Operation::DeleteFrontmatter(op) => op.comment(),
            Operation::ReplaceFrontmatter(op) => op.comment(),
        }
    }

    /// The primary target followed by the range end, when the variant has them.
    pub fn targets(&self) -> (Option<&Target>, Option<&Target>) {
        match self {
            Operation::Insert(op) => (Some(op.target()), None),
            Operation::Replace(op) => (Some(op.target()), op.until()),
            Operation::Delete(op) => (Some(op.target()), op.until()),
            Operation::SetFrontmatter(_)
            | Operation::DeleteFrontmatter(_)
            | Operation::ReplaceFrontmatter(_) => (None, None),
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Insert(op) => write!(f, "insert {} {}", op.position(), op.target()),
            Operation::Replace(op) => write!(f, "replace {}", op.target()),
            Operation::Delete(op) => write!(f, "delete {}", op.target()),
            Operation::SetFrontmatter(op) => write!(f, "set frontmatter {}", op.key()),
            Operation::DeleteFrontmatter(op) => write!(f, "delete frontmatter {}", op.key()),
            Operation::ReplaceFrontmatter(_) => f.write_str("replace frontmatter"),
        }
    }
}

macro_rules! impl_from_operation {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Operation {
                fn from(operation: $ty) -> Self {
                    Operation::$variant(operation)
                }
            }
        )*
    };
}

impl_from_operation!(
    Insert(InsertOperation),
    Replace(ReplaceOperation),
    Delete(DeleteOperation),
    SetFrontmatter(SetFrontmatterOperation),
    DeleteFrontmatter(DeleteFrontmatterOperation),
    ReplaceFrontmatter(ReplaceFrontmatterOperation),
);
