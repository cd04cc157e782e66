//! Reading and writing operation lists as YAML or JSON.
//!
//! An operation file is a sequence of records tagged by `op`:
//!
//! ```yaml
//! - op: insert
//!   selector:
//!     select_type: li
//!     select_contains: Configure
//!   position: before
//!   content: "- Verify checksum"
//! - op: set_frontmatter
//!   key: tags[0]
//!   value: docs
//! ```

use std::path::Path;

use schemars::{
    generate::SchemaSettings,
    transform::{RecursiveTransform, Transform},
    JsonSchema, Schema,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_yaml::Value as YamlValue;
use strum::{Display, EnumString, VariantNames};

use crate::error::{Result, SpliceError};
use crate::operations::{
    DeleteFrontmatterOperation, DeleteOperation, FrontmatterFormat, InsertOperation,
    InsertPosition, Operation, ReplaceFrontmatterOperation, ReplaceOperation,
    SetFrontmatterOperation, Target,
};
use crate::selector::Selector;

/// Fields that would make decoding read other files.
const UNSUPPORTED_FIELDS: [&str; 2] = ["content_file", "value_file"];

/// Text format of an operation file.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    VariantNames,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CodecFormat {
    #[default]
    Yaml,
    Json,
}

impl CodecFormat {
    /// `.json` files are JSON, everything else is read as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|extension| extension.to_str()) {
            Some(extension) if extension.eq_ignore_ascii_case("json") => CodecFormat::Json,
            _ => CodecFormat::Yaml,
        }
    }
}

/// A regular expression, either as a bare pattern or with flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
enum RegexRecord {
    Pattern(String),
    WithFlags {
        pattern: String,
        /// Any of `i`, `m`, `s` (and the no-op `u`)
        #[serde(default, skip_serializing_if = "String::is_empty")]
        flags: String,
    },
}

/// Criteria locating a node. Every given criterion must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct SelectorRecord {
    /// Name other selectors can refer to with `*_ref`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alias: Option<String>,

    /// Node kind: `p`, `h1`..`h6`, `heading`, `list`, `li`, `blockquote`, `code`, `html`, `table`, `hr`, `footnote`, `definition`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    select_type: Option<String>,

    /// Substring of the node's plain text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    select_contains: Option<String>,

    /// Pattern matched against the node's plain text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    select_regex: Option<RegexRecord>,

    /// 1-based index among the matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    select_ordinal: Option<usize>,

    /// Only consider nodes following this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    after: Option<Box<SelectorRecord>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    after_ref: Option<String>,

    /// Only consider nodes inside this one (a heading's section, a blockquote or a list)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    within: Option<Box<SelectorRecord>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    within_ref: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !value
}

/// One entry of an operation file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
enum OperationRecord {
    /// Insert markdown relative to a node
    Insert {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<SelectorRecord>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector_ref: Option<String>,
        content: String,
        #[serde(default)]
        position: InsertPosition,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },

    /// Replace a node, or a range of blocks when `until` is given
    Replace {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<SelectorRecord>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector_ref: Option<String>,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        until: Option<SelectorRecord>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        until_ref: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },

    /// Delete a node, a heading's whole section, or a range of blocks
    Delete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<SelectorRecord>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector_ref: Option<String>,
        #[serde(default, skip_serializing_if = "is_false")]
        section: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        until: Option<SelectorRecord>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        until_ref: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },

    /// Set one frontmatter value, creating the block if needed
    SetFrontmatter {
        /// Dotted path with `[n]` indices, e.g. `authors[0].name`
        key: String,
        #[schemars(with = "serde_json::Value")]
        value: YamlValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<FrontmatterFormat>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },

    /// Remove one frontmatter value
    DeleteFrontmatter {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },

    /// Replace the whole frontmatter; `null` removes the block
    ReplaceFrontmatter {
        #[schemars(with = "serde_json::Value")]
        content: YamlValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<FrontmatterFormat>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },
}

impl TryFrom<SelectorRecord> for Selector {
    type Error = SpliceError;

    fn try_from(record: SelectorRecord) -> Result<Self> {
        let mut builder = Selector::builder();
        if let Some(alias) = record.alias {
            builder = builder.alias(alias);
        }
        if let Some(select_type) = record.select_type {
            builder = builder.select_type(select_type);
        }
        if let Some(contains) = record.select_contains {
            builder = builder.contains(contains);
        }
        match record.select_regex {
            Some(RegexRecord::Pattern(pattern)) => builder = builder.regex(pattern),
            Some(RegexRecord::WithFlags { pattern, flags }) => {
                builder = builder.regex_with_flags(pattern, flags)
            }
            None => {}
        }
        if let Some(ordinal) = record.select_ordinal {
            builder = builder.ordinal(ordinal);
        }
        if let Some(after) = record.after {
            builder = builder.after(Selector::try_from(*after)?);
        }
        if let Some(alias) = record.after_ref {
            builder = builder.after_ref(alias);
        }
        if let Some(within) = record.within {
            builder = builder.within(Selector::try_from(*within)?);
        }
        if let Some(alias) = record.within_ref {
            builder = builder.within_ref(alias);
        }
        builder.build()
    }
}

impl From<&Selector> for SelectorRecord {
    fn from(selector: &Selector) -> Self {
        let select_regex = selector.regex().map(|regex| {
            if regex.flags().is_empty() {
                RegexRecord::Pattern(regex.pattern().to_string())
            } else {
                RegexRecord::WithFlags {
                    pattern: regex.pattern().to_string(),
                    flags: regex.flags().to_string(),
                }
            }
        });

        Self {
            alias: selector.alias().map(str::to_string),
            select_type: selector.select_type().map(str::to_string),
            select_contains: selector.contains().map(str::to_string),
            select_regex,
            select_ordinal: Some(selector.ordinal()).filter(|ordinal| *ordinal != 1),
            after: selector.after().map(|after| Box::new(after.into())),
            after_ref: selector.after_ref().map(str::to_string),
            within: selector.within().map(|within| Box::new(within.into())),
            within_ref: selector.within_ref().map(str::to_string),
        }
    }
}

fn split_target(target: Option<&Target>) -> (Option<SelectorRecord>, Option<String>) {
    match target {
        Some(Target::Selector(selector)) => (Some(selector.into()), None),
        Some(Target::Ref(alias)) => (None, Some(alias.clone())),
        None => (None, None),
    }
}

impl TryFrom<OperationRecord> for Operation {
    type Error = SpliceError;

    fn try_from(record: OperationRecord) -> Result<Self> {
        let operation = match record {
            OperationRecord::Insert {
                selector,
                selector_ref,
                content,
                position,
                comment,
            } => {
                let mut builder = InsertOperation::builder().content(content).position(position);
                if let Some(selector) = selector {
                    builder = builder.selector(selector.try_into()?);
                }
                if let Some(alias) = selector_ref {
                    builder = builder.selector_ref(alias);
                }
                if let Some(comment) = comment {
                    builder = builder.comment(comment);
                }
                builder.build()?.into()
            }

            OperationRecord::Replace {
                selector,
                selector_ref,
                content,
                until,
                until_ref,
                comment,
            } => {
                let mut builder = ReplaceOperation::builder().content(content);
                if let Some(selector) = selector {
                    builder = builder.selector(selector.try_into()?);
                }
                if let Some(alias) = selector_ref {
                    builder = builder.selector_ref(alias);
                }
                if let Some(until) = until {
                    builder = builder.until(until.try_into()?);
                }
                if let Some(alias) = until_ref {
                    builder = builder.until_ref(alias);
                }
                if let Some(comment) = comment {
                    builder = builder.comment(comment);
                }
                builder.build()?.into()
            }

            OperationRecord::Delete {
                selector,
                selector_ref,
                section,
                until,
                until_ref,
                comment,
            } => {
                let mut builder = DeleteOperation::builder().section(section);
                if let Some(selector) = selector {
                    builder = builder.selector(selector.try_into()?);
                }
                if let Some(alias) = selector_ref {
                    builder = builder.selector_ref(alias);
                }
                if let Some(until) = until {
                    builder = builder.until(until.try_into()?);
                }
                if let Some(alias) = until_ref {
                    builder = builder.until_ref(alias);
                }
                if let Some(comment) = comment {
                    builder = builder.comment(comment);
                }
                builder.build()?.into()
            }

            OperationRecord::SetFrontmatter {
                key,
                value,
                format,
                comment,
            } => {
                let mut operation = SetFrontmatterOperation::new(&key, value)?;
                if let Some(format) = format {
                    operation = operation.with_format(format);
                }
                if let Some(comment) = comment {
                    operation = operation.with_comment(comment);
                }
                operation.into()
            }

            OperationRecord::DeleteFrontmatter { key, comment } => {
                let mut operation = DeleteFrontmatterOperation::new(&key)?;
                if let Some(comment) = comment {
                    operation = operation.with_comment(comment);
                }
                operation.into()
            }

            OperationRecord::ReplaceFrontmatter {
                content,
                format,
                comment,
            } => {
                let mut operation = ReplaceFrontmatterOperation::new(content);
                if let Some(format) = format {
                    operation = operation.with_format(format);
                }
                if let Some(comment) = comment {
                    operation = operation.with_comment(comment);
                }
                operation.into()
            }
        };
        Ok(operation)
    }
}

impl From<&Operation> for OperationRecord {
    fn from(operation: &Operation) -> Self {
        let comment = operation.comment().map(str::to_string);
        match operation {
            Operation::Insert(op) => {
                let (selector, selector_ref) = split_target(Some(op.target()));
                OperationRecord::Insert {
                    selector,
                    selector_ref,
                    content: op.content().to_string(),
                    position: op.position(),
                    comment,
                }
            }
            Operation::Replace(op) => {
                let (selector, selector_ref) = split_target(Some(op.target()));
                let (until, until_ref) = split_target(op.until());
                OperationRecord::Replace {
                    selector,
                    selector_ref,
                    content: op.content().to_string(),
                    until,
                    until_ref,
                    comment,
                }
            }
            Operation::Delete(op) => {
                let (selector, selector_ref) = split_target(Some(op.target()));
                let (until, until_ref) = split_target(op.until());
                OperationRecord::Delete {
                    selector,
                    selector_ref,
                    section: op.section(),
                    until,
                    until_ref,
                    comment,
                }
            }
            Operation::SetFrontmatter(op) => OperationRecord::SetFrontmatter {
                key: op.key().to_string(),
                value: op.value().clone(),
                format: op.format(),
                comment,
            },
            Operation::DeleteFrontmatter(op) => OperationRecord::DeleteFrontmatter {
                key: op.key().to_string(),
                comment,
            },
            Operation::ReplaceFrontmatter(op) => OperationRecord::ReplaceFrontmatter {
                content: op.content().clone(),
                format: op.format(),
                comment,
            },
        }
    }
}

fn parse_error(error: impl std::fmt::Display) -> SpliceError {
    SpliceError::OperationParse(error.to_string())
}

/// Decodes an operation list.
///
/// Both formats are read into YAML values first, so frontmatter payloads keep
/// their key order, non-string keys and non-finite floats.
///
/// Structural problems are [`SpliceError::OperationParse`]; a well-formed
/// record that fails validation keeps its own kind, such as
/// [`SpliceError::InvalidRegex`] or [`SpliceError::ConflictingScope`].
pub fn loads(text: &str, format: CodecFormat) -> Result<Vec<Operation>> {
    let raw: YamlValue = match format {
        CodecFormat::Yaml => serde_yaml::from_str(text).map_err(parse_error)?,
        CodecFormat::Json => serde_json::from_str(text).map_err(parse_error)?,
    };

    let YamlValue::Sequence(entries) = &raw else {
        return Err(SpliceError::OperationParse(
            "expected a list of operations".into(),
        ));
    };

    for (index, entry) in entries.iter().enumerate() {
        if let Some(field) = UNSUPPORTED_FIELDS
            .iter()
            .find(|field| entry.get(**field).is_some())
        {
            return Err(SpliceError::OperationParse(format!(
                "operation #{}: `{field}` is not supported, inline the content instead",
                index + 1
            )));
        }
    }

    let records: Vec<OperationRecord> = serde_yaml::from_value(raw).map_err(parse_error)?;
    log::trace!("decoded {} operations", records.len());
    records.into_iter().map(Operation::try_from).collect()
}

/// Encodes an operation list. Decoding the result yields an equal list.
pub fn dumps(operations: &[Operation], format: CodecFormat) -> Result<String> {
    let records = operations
        .iter()
        .map(OperationRecord::from)
        .collect::<Vec<_>>();
    match format {
        CodecFormat::Yaml => serde_yaml::to_string(&records).map_err(parse_error),
        CodecFormat::Json => serde_json::to_string_pretty(&records).map_err(parse_error),
    }
}

fn remove_null(schema: &mut Schema) {
    if let Some(Value::Array(types)) = schema.get_mut("type") {
        types.retain(|value| matches!(value, Value::String(s) if s != "null"));
    }
    let single = match schema.get("type") {
        Some(Value::Array(types)) if types.len() == 1 => types.first().cloned(),
        _ => None,
    };
    if let Some(single) = single {
        schema.insert("type".to_string(), single);
    }

    if let Some(Value::Array(variants)) = schema.get_mut("enum") {
        variants.retain(|value| !value.is_null());
    }
}

/// JSON Schema (draft 2020-12) of an operation file.
pub fn operations_schema() -> Value {
    let generator = SchemaSettings::draft2020_12().into_generator();
    let mut schema = generator.into_root_schema_for::<Vec<OperationRecord>>();
    RecursiveTransform(remove_null).transform(&mut schema);
    schema.insert("title".to_string(), Value::from("Operations"));
    schema.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::{AmbiguityPolicy, Document, MarkdownDocument};

    const OPERATIONS: &str = r#"
- op: insert
  selector:
    alias: install
    select_type: h2
    select_contains: Install
  position: append-child
  content: "Requires Rust."
- op: replace
  selector:
    select_regex:
      pattern: "^run"
      flags: i
    within_ref: install
  content: Run it twice.
  comment: be explicit
- op: delete
  selector_ref: install
  section: true
- op: set_frontmatter
  key: authors[0].name
  value: Ada
  format: toml
- op: delete_frontmatter
  key: draft
- op: replace_frontmatter
  content: null
"#;

    #[test]
    fn decodes_every_operation_kind() {
        let operations = loads(OPERATIONS, CodecFormat::Yaml).unwrap();
        let names = operations.iter().map(Operation::name).collect::<Vec<_>>();
        assert_eq!(
            names,
            [
                "insert",
                "replace",
                "delete",
                "set_frontmatter",
                "delete_frontmatter",
                "replace_frontmatter"
            ]
        );

        let Operation::Insert(insert) = &operations[0] else {
            panic!("expected an insert");
        };
        assert_eq!(insert.position(), InsertPosition::AppendChild);
        assert_eq!(insert.selector().and_then(Selector::alias), Some("install"));
        assert_eq!(operations[1].comment(), Some("be explicit"));
    }

    #[test]
    fn yaml_and_json_round_trip() {
        let operations = loads(OPERATIONS, CodecFormat::Yaml).unwrap();
        for format in [CodecFormat::Yaml, CodecFormat::Json] {
            let encoded = dumps(&operations, format).unwrap();
            assert_eq!(loads(&encoded, format).unwrap(), operations);
        }
    }

    #[test]
    fn frontmatter_payloads_keep_key_order() {
        let text = r#"
- op: replace_frontmatter
  content:
    title: Guide
    author: Ada
    status: draft
"#;
        for (text, format) in [
            (text.to_string(), CodecFormat::Yaml),
            (
                r#"[{"op": "replace_frontmatter", "content": {"title": "Guide", "author": "Ada", "status": "draft"}}]"#
                    .to_string(),
                CodecFormat::Json,
            ),
        ] {
            let operations = loads(&text, format).unwrap();
            let Operation::ReplaceFrontmatter(replace) = &operations[0] else {
                panic!("expected a frontmatter replacement");
            };
            let keys = replace
                .content()
                .as_mapping()
                .unwrap()
                .keys()
                .filter_map(YamlValue::as_str)
                .collect::<Vec<_>>();
            assert_eq!(keys, ["title", "author", "status"], "{format}");

            let mut document: MarkdownDocument = "# Guide\n".parse().unwrap();
            document
                .apply(&operations, AmbiguityPolicy::FailFast)
                .unwrap();
            assert_eq!(
                document.render(),
                "---\ntitle: Guide\nauthor: Ada\nstatus: draft\n---\n\n# Guide\n"
            );
        }
    }

    #[test]
    fn yaml_values_keep_non_string_keys_and_infinity() {
        let text = r#"
- op: set_frontmatter
  key: limits
  value:
    1: one
    ceiling: .inf
"#;
        let operations = loads(text, CodecFormat::Yaml).unwrap();
        let Operation::SetFrontmatter(set) = &operations[0] else {
            panic!("expected a frontmatter set");
        };
        assert_eq!(set.value()[1usize], YamlValue::from("one"));
        assert_eq!(set.value()["ceiling"].as_f64(), Some(f64::INFINITY));

        let encoded = dumps(&operations, CodecFormat::Yaml).unwrap();
        assert_eq!(loads(&encoded, CodecFormat::Yaml).unwrap(), operations);
    }

    #[test]
    fn file_references_are_rejected() {
        let error = loads(
            "- op: insert\n  selector_ref: a\n  content_file: body.md\n",
            CodecFormat::Yaml,
        )
        .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::OperationParse);
        assert!(error.to_string().contains("content_file"));
    }

    #[test]
    fn structural_errors_are_parse_errors() {
        for text in [
            r#"[{"op": "explode"}]"#,
            r#"[{"op": "delete", "selector_ref": "a", "colour": "red"}]"#,
            r#"[{"op": "insert", "selector_ref": "a"}]"#,
            r#"{"op": "delete"}"#,
        ] {
            let error = loads(text, CodecFormat::Json).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::OperationParse, "{text}");
        }
    }

    #[test]
    fn validation_errors_keep_their_kind() {
        let bad_regex = r#"[{"op": "delete", "selector": {"select_regex": "("}}]"#;
        assert_eq!(
            loads(bad_regex, CodecFormat::Json).unwrap_err().kind(),
            ErrorKind::InvalidRegex
        );

        let conflicting = r#"[{"op": "delete", "selector": {"after_ref": "a", "within_ref": "b"}}]"#;
        assert_eq!(
            loads(conflicting, CodecFormat::Json).unwrap_err().kind(),
            ErrorKind::ConflictingScope
        );

        let both_targets = r#"[{"op": "delete", "selector": {}, "selector_ref": "a"}]"#;
        assert_eq!(
            loads(both_targets, CodecFormat::Json).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn formats_parse_from_strings_and_paths() {
        assert_eq!("JSON".parse::<CodecFormat>().ok(), Some(CodecFormat::Json));
        assert_eq!(CodecFormat::from_path("ops.json"), CodecFormat::Json);
        assert_eq!(CodecFormat::from_path("ops.yml"), CodecFormat::Yaml);
    }

    #[test]
    fn schema_describes_every_tag() {
        let schema = operations_schema().to_string();
        for tag in [
            "insert",
            "replace",
            "delete",
            "set_frontmatter",
            "delete_frontmatter",
            "replace_frontmatter",
        ] {
            assert!(schema.contains(&format!("\"{tag}\"")), "{tag}");
        }
        assert!(schema.contains("select_contains"));
    }
}
