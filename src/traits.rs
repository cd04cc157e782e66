use serde_yaml::Value as YamlValue;

use crate::error::Result;
use crate::operations::{FrontmatterFormat, Operation};
use crate::transaction::{AmbiguityPolicy, ApplyReport};

/// A document that can be parsed, edited with [`Operation`]s and rendered back.
///
/// Sessions are generic over this trait so the file handling can be reused
/// for other formats, and so tests can observe how often a document is
/// mutated.
pub trait Document: Clone + Sized {
    fn parse(text: &str) -> Result<Self>;

    fn render(&self) -> String;

    /// The parsed frontmatter mapping, if the document has a frontmatter block.
    fn frontmatter(&self) -> Option<&YamlValue>;

    fn frontmatter_format(&self) -> Option<FrontmatterFormat>;

    /// Applies every operation or none of them.
    fn apply(&mut self, operations: &[Operation], policy: AmbiguityPolicy)
        -> Result<ApplyReport>;

    /// Renders what `apply` would produce without touching `self`.
    fn preview(&self, operations: &[Operation], policy: AmbiguityPolicy) -> Result<String> {
        let mut scratch = self.clone();
        scratch.apply(operations, policy)?;
        Ok(scratch.render())
    }
}
