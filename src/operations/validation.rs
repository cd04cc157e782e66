use crate::error::{Result, SpliceError};
use crate::operations::Target;
use crate::selector::Selector;

/// Exactly one of the inline and referenced forms must be supplied.
pub(crate) fn exactly_one_target(
    operation: &str,
    selector: Option<Selector>,
    selector_ref: Option<String>,
) -> Result<Target> {
    match (selector, selector_ref) {
        (Some(selector), None) => Ok(Target::Selector(selector)),
        (None, Some(alias)) => Target::reference(alias, "selector_ref"),
        (Some(_), Some(_)) => Err(SpliceError::InvalidArgument(format!(
            "{operation} accepts either `selector` or `selector_ref`, not both"
        ))),
        (None, None) => Err(SpliceError::InvalidArgument(format!(
            "{operation} requires `selector` or `selector_ref`"
        ))),
    }
}

/// At most one of the inline and referenced range ends may be supplied.
pub(crate) fn at_most_one_until(
    operation: &str,
    until: Option<Selector>,
    until_ref: Option<String>,
) -> Result<Option<Target>> {
    match (until, until_ref) {
        (Some(until), None) => Ok(Some(Target::Selector(until))),
        (None, Some(alias)) => Target::reference(alias, "until_ref").map(Some),
        (Some(_), Some(_)) => Err(SpliceError::InvalidArgument(format!(
            "{operation} accepts either `until` or `until_ref`, not both"
        ))),
        (None, None) => Ok(None),
    }
}

pub(crate) fn required_content(operation: &str, content: Option<String>) -> Result<String> {
    content.ok_or_else(|| SpliceError::InvalidArgument(format!("{operation} requires `content`")))
}
