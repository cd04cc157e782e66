use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_yaml::Value as YamlValue;
use strum::{Display as StrumDisplay, EnumString, VariantNames};

use crate::error::{Result, SpliceError};

/// Serialization used by a document's frontmatter block.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Deserialize,
    Serialize,
    JsonSchema,
    EnumString,
    VariantNames,
    StrumDisplay,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FrontmatterFormat {
    /// Delimited by `---`
    Yaml,
    /// Delimited by `+++`
    Toml,
}

/// One step of a frontmatter key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A parsed key path such as `authors[0].name`.
///
/// Dots separate mapping keys and `[n]` indexes into sequences. The path
/// always starts with a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, fieldwork::Fieldwork)]
#[fieldwork(get)]
pub struct FrontmatterPath {
    segments: Vec<PathSegment>,
}

impl FromStr for FrontmatterPath {
    type Err = SpliceError;

    fn from_str(path: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            SpliceError::InvalidArgument(format!("invalid frontmatter key `{path}`: {reason}"))
        };

        if path.trim().is_empty() {
            return Err(invalid("key cannot be empty"));
        }

        let mut segments = vec![];
        for part in path.split('.') {
            let (key, mut rest) = match part.find('[') {
                Some(bracket) => part.split_at(bracket),
                None => (part, ""),
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(invalid("empty key segment"));
            }
            segments.push(PathSegment::Key(key.to_string()));

            while !rest.is_empty() {
                let Some(inner) = rest.strip_prefix('[') else {
                    return Err(invalid("unexpected characters after index"));
                };
                let Some(close) = inner.find(']') else {
                    return Err(invalid("unclosed `[`"));
                };
                let index = inner[..close]
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| invalid("indices must be non-negative integers"))?;
                segments.push(PathSegment::Index(index));
                rest = &inner[close + 1..];
            }
        }

        Ok(Self { segments })
    }
}

impl Display for FrontmatterPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if position == 0 => f.write_str(key)?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Sets a value at a key path, creating intermediate mappings.
#[derive(Debug, Clone, PartialEq, fieldwork::Fieldwork)]
#[fieldwork(get)]
pub struct SetFrontmatterOperation {
    key: FrontmatterPath,
    value: YamlValue,
    /// format of a newly created block, ignored when frontmatter exists
    #[fieldwork(get(copy), with(option_set_some))]
    format: Option<FrontmatterFormat>,
    #[fieldwork(with(into, option_set_some))]
    comment: Option<String>,
}

impl SetFrontmatterOperation {
    pub fn new(key: &str, value: impl Into<YamlValue>) -> Result<Self> {
        Ok(Self {
            key: key.parse()?,
            value: value.into(),
            format: None,
            comment: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, fieldwork::Fieldwork)]
#[fieldwork(get)]
pub struct DeleteFrontmatterOperation {
    key: FrontmatterPath,
    #[fieldwork(with(into, option_set_some))]
    comment: Option<String>,
}

impl DeleteFrontmatterOperation {
    pub fn new(key: &str) -> Result<Self> {
        Ok(Self {
            key: key.parse()?,
            comment: None,
        })
    }
}

/// Replaces the whole frontmatter payload. A null payload removes the block.
#[derive(Debug, Clone, PartialEq, fieldwork::Fieldwork)]
#[fieldwork(get)]
pub struct ReplaceFrontmatterOperation {
    content: YamlValue,
    #[fieldwork(get(copy), with(option_set_some))]
    format: Option<FrontmatterFormat>,
    #[fieldwork(with(into, option_set_some))]
    comment: Option<String>,
}

impl ReplaceFrontmatterOperation {
    pub fn new(content: impl Into<YamlValue>) -> Self {
        Self {
            content: content.into(),
            format: None,
            comment: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn parses_keys_and_indices() {
        let path: FrontmatterPath = "authors[0].name".parse().unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("authors".into()),
                PathSegment::Index(0),
                PathSegment::Key("name".into()),
            ]
        );
        assert_eq!(path.to_string(), "authors[0].name");

        let nested: FrontmatterPath = "matrix[1][2]".parse().unwrap();
        assert_eq!(nested.segments().len(), 3);
    }

    #[test]
    fn rejects_malformed_paths() {
        for path in ["", "  ", "a..b", "[0]", "a[", "a[x]", "a[-1]", "a[0]b"] {
            let error = path.parse::<FrontmatterPath>().unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidArgument, "path {path:?}");
        }
    }

    #[test]
    fn construction_validates_the_key() {
        assert!(SetFrontmatterOperation::new("", "x").is_err());
        assert!(DeleteFrontmatterOperation::new("status").is_ok());
    }

    #[test]
    fn chained_setters_fill_optional_fields() {
        let set = SetFrontmatterOperation::new("status", "draft")
            .unwrap()
            .with_format(FrontmatterFormat::Toml)
            .with_comment("mark as draft");
        assert_eq!(set.format(), Some(FrontmatterFormat::Toml));
        assert_eq!(set.comment(), Some("mark as draft"));
        assert_eq!(set.key().to_string(), "status");

        let replace = ReplaceFrontmatterOperation::new(YamlValue::Null);
        assert_eq!(replace.format(), None);
        assert!(replace.content().is_null());
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("TOML".parse::<FrontmatterFormat>().ok(), Some(FrontmatterFormat::Toml));
        assert_eq!(FrontmatterFormat::Yaml.to_string(), "yaml");
    }
}
