use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};

use super::validation::{at_most_one_until, exactly_one_target, required_content};
use super::Target;
use crate::error::Result;
use crate::selector::Selector;

/// Where inserted content lands relative to the matched node.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Deserialize,
    Serialize,
    JsonSchema,
    EnumString,
    VariantNames,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InsertPosition {
    /// As a sibling preceding the node
    Before,
    /// As a sibling following the node
    #[default]
    After,
    /// As the first child of a container node
    #[serde(alias = "prepend-child")]
    #[strum(to_string = "prepend_child", serialize = "prepend-child")]
    PrependChild,
    /// As the last child of a container node
    #[serde(alias = "append-child")]
    #[strum(to_string = "append_child", serialize = "append-child")]
    AppendChild,
}

#[derive(Debug, Clone, PartialEq, fieldwork::Fieldwork)]
#[fieldwork(get)]
pub struct InsertOperation {
    target: Target,
    content: String,
    #[fieldwork(get(copy))]
    position: InsertPosition,
    comment: Option<String>,
}

impl InsertOperation {
    pub fn builder() -> InsertBuilder {
        InsertBuilder::default()
    }

    pub fn selector(&self) -> Option<&Selector> {
        self.target.selector()
    }

    pub fn selector_ref(&self) -> Option<&str> {
        self.target.selector_ref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct InsertBuilder {
    selector: Option<Selector>,
    selector_ref: Option<String>,
    content: Option<String>,
    position: InsertPosition,
    comment: Option<String>,
}

impl InsertBuilder {
    pub fn selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn selector_ref(mut self, alias: impl Into<String>) -> Self {
        self.selector_ref = Some(alias.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn position(mut self, position: InsertPosition) -> Self {
        self.position = position;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn build(self) -> Result<InsertOperation> {
        Ok(InsertOperation {
            target: exactly_one_target("insert", self.selector, self.selector_ref)?,
            content: required_content("insert", self.content)?,
            position: self.position,
            comment: self.comment,
        })
    }
}

/// Replaces the matched node, or the range up to `until`, with new content.
#[derive(Debug, Clone, PartialEq, fieldwork::Fieldwork)]
#[fieldwork(get)]
pub struct ReplaceOperation {
    target: Target,
    content: String,
    until: Option<Target>,
    comment: Option<String>,
}

impl ReplaceOperation {
    pub fn builder() -> ReplaceBuilder {
        ReplaceBuilder::default()
    }

    pub fn selector(&self) -> Option<&Selector> {
        self.target.selector()
    }

    pub fn selector_ref(&self) -> Option<&str> {
        self.target.selector_ref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReplaceBuilder {
    selector: Option<Selector>,
    selector_ref: Option<String>,
    content: Option<String>,
    until: Option<Selector>,
    until_ref: Option<String>,
    comment: Option<String>,
}

impl ReplaceBuilder {
    pub fn selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn selector_ref(mut self, alias: impl Into<String>) -> Self {
        self.selector_ref = Some(alias.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn until(mut self, until: Selector) -> Self {
        self.until = Some(until);
        self
    }

    pub fn until_ref(mut self, alias: impl Into<String>) -> Self {
        self.until_ref = Some(alias.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn build(self) -> Result<ReplaceOperation> {
        Ok(ReplaceOperation {
            target: exactly_one_target("replace", self.selector, self.selector_ref)?,
            content: required_content("replace", self.content)?,
            until: at_most_one_until("replace", self.until, self.until_ref)?,
            comment: self.comment,
        })
    }
}

/// Removes the matched node, its heading section, or the range up to `until`.
#[derive(Debug, Clone, PartialEq, fieldwork::Fieldwork)]
#[fieldwork(get)]
pub struct DeleteOperation {
    target: Target,
    section: bool,
    until: Option<Target>,
    comment: Option<String>,
}

impl DeleteOperation {
    pub fn builder() -> DeleteBuilder {
        DeleteBuilder::default()
    }

    pub fn selector(&self) -> Option<&Selector> {
        self.target.selector()
    }

    pub fn selector_ref(&self) -> Option<&str> {
        self.target.selector_ref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeleteBuilder {
    selector: Option<Selector>,
    selector_ref: Option<String>,
    section: bool,
    until: Option<Selector>,
    until_ref: Option<String>,
    comment: Option<String>,
}

impl DeleteBuilder {
    pub fn selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn selector_ref(mut self, alias: impl Into<String>) -> Self {
        self.selector_ref = Some(alias.into());
        self
    }

    pub fn section(mut self, section: bool) -> Self {
        self.section = section;
        self
    }

    pub fn until(mut self, until: Selector) -> Self {
        self.until = Some(until);
        self
    }

    pub fn until_ref(mut self, alias: impl Into<String>) -> Self {
        self.until_ref = Some(alias.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn build(self) -> Result<DeleteOperation> {
        Ok(DeleteOperation {
            target: exactly_one_target("delete", self.selector, self.selector_ref)?,
            section: self.section,
            until: at_most_one_until("delete", self.until, self.until_ref)?,
            comment: self.comment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn paragraph() -> Selector {
        Selector::builder().select_type("p").build().unwrap()
    }

    #[test]
    fn targets_require_exactly_one_form() {
        let both = InsertOperation::builder()
            .selector(paragraph())
            .selector_ref("intro")
            .content("x")
            .build()
            .unwrap_err();
        assert_eq!(both.kind(), ErrorKind::InvalidArgument);

        let neither = ReplaceOperation::builder().content("x").build().unwrap_err();
        assert_eq!(neither.kind(), ErrorKind::InvalidArgument);

        let neither = DeleteOperation::builder().build().unwrap_err();
        assert_eq!(neither.kind(), ErrorKind::InvalidArgument);

        let by_ref = DeleteOperation::builder()
            .selector_ref("intro")
            .build()
            .unwrap();
        assert_eq!(by_ref.selector_ref(), Some("intro"));
        assert!(by_ref.selector().is_none());
    }

    #[test]
    fn until_allows_at_most_one_form() {
        let error = ReplaceOperation::builder()
            .selector(paragraph())
            .content("x")
            .until(paragraph())
            .until_ref("end")
            .build()
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);

        let error = DeleteOperation::builder()
            .selector(paragraph())
            .until(paragraph())
            .until_ref("end")
            .build()
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn content_is_required_for_insert_and_replace() {
        let error = InsertOperation::builder()
            .selector(paragraph())
            .build()
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);

        let empty = ReplaceOperation::builder()
            .selector(paragraph())
            .content("")
            .build()
            .unwrap();
        assert_eq!(empty.content(), "");
    }

    #[test]
    fn insert_defaults_to_after() {
        let op = InsertOperation::builder()
            .selector(paragraph())
            .content("x")
            .build()
            .unwrap();
        assert_eq!(op.position(), InsertPosition::After);
    }

    #[test]
    fn positions_accept_hyphenated_spellings() {
        assert_eq!(
            "prepend-child".parse::<InsertPosition>().ok(),
            Some(InsertPosition::PrependChild)
        );
        assert_eq!(
            "append_child".parse::<InsertPosition>().ok(),
            Some(InsertPosition::AppendChild)
        );
        assert_eq!(InsertPosition::PrependChild.to_string(), "prepend_child");
    }
}
