//! Leading YAML (`---`) or TOML (`+++`) metadata blocks.

use serde_yaml::{Mapping, Value as YamlValue};

use crate::error::{Result, SpliceError};
use crate::operations::{FrontmatterFormat, FrontmatterPath, PathSegment};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Frontmatter {
    format: FrontmatterFormat,
    value: YamlValue,
    /// Delimited source, ending in a newline.
    block: String,
    /// Blank lines between the block and the body.
    spacing: String,
}

impl Frontmatter {
    pub(crate) fn format(&self) -> FrontmatterFormat {
        self.format
    }

    pub(crate) fn value(&self) -> &YamlValue {
        &self.value
    }

    pub(crate) fn render(&self, has_body: bool) -> String {
        if has_body {
            format!("{}{}", self.block, self.spacing)
        } else {
            self.block.clone()
        }
    }

    fn build(format: FrontmatterFormat, value: YamlValue, spacing: String) -> Result<Self> {
        let block = serialize(format, &value)?;
        Ok(Self {
            format,
            value,
            block,
            spacing,
        })
    }
}

fn delimiter(format: FrontmatterFormat) -> &'static str {
    match format {
        FrontmatterFormat::Yaml => "---",
        FrontmatterFormat::Toml => "+++",
    }
}

/// Separates a leading frontmatter block from the body.
///
/// A document whose opening delimiter is never closed has no frontmatter; the
/// delimiter line is then ordinary Markdown.
pub(crate) fn split(text: &str) -> Result<(Option<Frontmatter>, &str)> {
    let first_line = text.lines().next().unwrap_or_default().trim_end();
    let format = match first_line {
        "---" => FrontmatterFormat::Yaml,
        "+++" => FrontmatterFormat::Toml,
        _ => return Ok((None, text)),
    };
    let marker = delimiter(format);

    let mut offset = text.find('\n').map_or(text.len(), |newline| newline + 1);
    let inner_start = offset;
    loop {
        if offset >= text.len() {
            return Ok((None, text));
        }
        let line_end = text[offset..]
            .find('\n')
            .map_or(text.len(), |newline| offset + newline + 1);
        if text[offset..line_end].trim_end() == marker {
            let inner = &text[inner_start..offset];
            let block_end = line_end;
            let body_start = skip_blank_lines(text, block_end);

            let mut block = text[..block_end].to_string();
            if !block.ends_with('\n') {
                block.push('\n');
            }

            let frontmatter = Frontmatter {
                format,
                value: deserialize(format, inner)?,
                block,
                spacing: text[block_end..body_start].to_string(),
            };
            return Ok((Some(frontmatter), &text[body_start..]));
        }
        offset = line_end;
    }
}

fn skip_blank_lines(text: &str, mut offset: usize) -> usize {
    while offset < text.len() {
        let line_end = text[offset..]
            .find('\n')
            .map_or(text.len(), |newline| offset + newline + 1);
        if !text[offset..line_end].trim().is_empty() {
            break;
        }
        offset = line_end;
    }
    offset
}

fn deserialize(format: FrontmatterFormat, inner: &str) -> Result<YamlValue> {
    let value = match format {
        FrontmatterFormat::Yaml => serde_yaml::from_str::<YamlValue>(inner)
            .map_err(|error| SpliceError::FrontmatterParse(error.to_string()))?,
        FrontmatterFormat::Toml => {
            let table = toml::from_str::<toml::Table>(inner)
                .map_err(|error| SpliceError::FrontmatterParse(error.to_string()))?;
            serde_yaml::to_value(table)
                .map_err(|error| SpliceError::FrontmatterParse(error.to_string()))?
        }
    };

    Ok(match value {
        YamlValue::Null => YamlValue::Mapping(Mapping::new()),
        other => other,
    })
}

fn serialize(format: FrontmatterFormat, value: &YamlValue) -> Result<String> {
    let body = match format {
        FrontmatterFormat::Yaml => serde_yaml::to_string(value)
            .map_err(|error| SpliceError::FrontmatterSerialize(error.to_string()))?,
        FrontmatterFormat::Toml => {
            let table = serde_yaml::from_value::<toml::Table>(value.clone())
                .map_err(|error| SpliceError::FrontmatterSerialize(error.to_string()))?;
            toml::to_string(&table)
                .map_err(|error| SpliceError::FrontmatterSerialize(error.to_string()))?
        }
    };

    let marker = delimiter(format);
    let mut block = format!("{marker}\n{body}");
    if !block.ends_with('\n') {
        block.push('\n');
    }
    block.push_str(marker);
    block.push('\n');
    Ok(block)
}

fn is_empty_container(value: &YamlValue) -> bool {
    match value {
        YamlValue::Mapping(mapping) => mapping.is_empty(),
        YamlValue::Sequence(sequence) => sequence.is_empty(),
        _ => false,
    }
}

/// Sets `value` at `path`, creating the block and intermediate mappings.
///
/// An index equal to the sequence length appends.
pub(crate) fn set(
    frontmatter: &mut Option<Frontmatter>,
    path: &FrontmatterPath,
    value: &YamlValue,
    format: Option<FrontmatterFormat>,
) -> Result<()> {
    let (format, mut root, spacing) = match frontmatter.as_ref() {
        Some(existing) => (
            existing.format,
            existing.value.clone(),
            existing.spacing.clone(),
        ),
        None => (
            format.unwrap_or(FrontmatterFormat::Yaml),
            YamlValue::Mapping(Mapping::new()),
            "\n".to_string(),
        ),
    };

    set_in(&mut root, path.segments(), value.clone(), path)?;
    *frontmatter = Some(Frontmatter::build(format, root, spacing)?);
    Ok(())
}

fn set_in(
    current: &mut YamlValue,
    segments: &[PathSegment],
    value: YamlValue,
    path: &FrontmatterPath,
) -> Result<()> {
    let Some((segment, rest)) = segments.split_first() else {
        *current = value;
        return Ok(());
    };

    match segment {
        PathSegment::Key(key) => {
            if current.is_null() {
                *current = YamlValue::Mapping(Mapping::new());
            }
            let YamlValue::Mapping(mapping) = current else {
                return Err(SpliceError::InvalidArgument(format!(
                    "frontmatter key `{path}` passes through a value that is not a mapping"
                )));
            };
            let key = YamlValue::String(key.clone());
            if rest.is_empty() {
                mapping.insert(key, value);
                return Ok(());
            }
            if !mapping.contains_key(&key) {
                let empty = match rest.first() {
                    Some(PathSegment::Index(_)) => YamlValue::Sequence(vec![]),
                    _ => YamlValue::Mapping(Mapping::new()),
                };
                mapping.insert(key.clone(), empty);
            }
            let child = mapping
                .get_mut(&key)
                .ok_or_else(|| SpliceError::FrontmatterKeyNotFound(path.to_string()))?;
            set_in(child, rest, value, path)
        }

        PathSegment::Index(index) => {
            let YamlValue::Sequence(sequence) = current else {
                return Err(SpliceError::InvalidArgument(format!(
                    "frontmatter key `{path}` indexes into a value that is not a sequence"
                )));
            };
            if *index == sequence.len() && rest.is_empty() {
                sequence.push(value);
                return Ok(());
            }
            let child = sequence
                .get_mut(*index)
                .ok_or_else(|| SpliceError::FrontmatterKeyNotFound(path.to_string()))?;
            set_in(child, rest, value, path)
        }
    }
}

/// Removes the value at `path`, pruning containers left empty.
///
/// The block disappears once nothing is left in it.
pub(crate) fn delete(frontmatter: &mut Option<Frontmatter>, path: &FrontmatterPath) -> Result<()> {
    let Some(existing) = frontmatter.as_ref() else {
        return Err(SpliceError::FrontmatterMissing);
    };
    let format = existing.format;
    let spacing = existing.spacing.clone();
    let mut value = existing.value.clone();
    delete_in(&mut value, path.segments(), path)?;

    *frontmatter = if is_empty_container(&value) {
        None
    } else {
        Some(Frontmatter::build(format, value, spacing)?)
    };
    Ok(())
}

fn delete_in(current: &mut YamlValue, segments: &[PathSegment], path: &FrontmatterPath) -> Result<()> {
    let not_found = || SpliceError::FrontmatterKeyNotFound(path.to_string());
    let Some((segment, rest)) = segments.split_first() else {
        return Err(not_found());
    };

    match (segment, current) {
        (PathSegment::Key(key), YamlValue::Mapping(mapping)) => {
            let key = YamlValue::String(key.clone());
            if rest.is_empty() {
                return mapping.shift_remove(&key).map(|_| ()).ok_or_else(not_found);
            }
            let child = mapping.get_mut(&key).ok_or_else(not_found)?;
            delete_in(child, rest, path)?;
            if is_empty_container(child) {
                mapping.shift_remove(&key);
            }
            Ok(())
        }

        (PathSegment::Index(index), YamlValue::Sequence(sequence)) => {
            if *index >= sequence.len() {
                return Err(not_found());
            }
            if rest.is_empty() {
                sequence.remove(*index);
                return Ok(());
            }
            let child = &mut sequence[*index];
            delete_in(child, rest, path)?;
            if is_empty_container(child) {
                sequence.remove(*index);
            }
            Ok(())
        }

        _ => Err(not_found()),
    }
}

/// Replaces the whole payload. A null payload removes the block.
///
/// An explicit format wins over the existing one.
pub(crate) fn replace(
    frontmatter: &mut Option<Frontmatter>,
    content: &YamlValue,
    format: Option<FrontmatterFormat>,
) -> Result<()> {
    if content.is_null() {
        *frontmatter = None;
        return Ok(());
    }

    let format = format
        .or(frontmatter.as_ref().map(Frontmatter::format))
        .unwrap_or(FrontmatterFormat::Yaml);
    let spacing = frontmatter
        .as_ref()
        .map_or_else(|| "\n".to_string(), |existing| existing.spacing.clone());

    *frontmatter = Some(Frontmatter::build(format, content.clone(), spacing)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn path(path: &str) -> FrontmatterPath {
        path.parse().unwrap()
    }

    #[test]
    fn splits_yaml_and_keeps_the_block_verbatim() {
        let text = "---\ntitle:   Spaced\n---\n\n# Body\n";
        let (frontmatter, body) = split(text).unwrap();
        let frontmatter = frontmatter.unwrap();
        assert_eq!(frontmatter.format(), FrontmatterFormat::Yaml);
        assert_eq!(frontmatter.value()["title"], YamlValue::from("Spaced"));
        assert_eq!(frontmatter.render(true), "---\ntitle:   Spaced\n---\n\n");
        assert_eq!(body, "# Body\n");
    }

    #[test]
    fn splits_toml() {
        let text = "+++\ntitle = \"Doc\"\ndraft = true\n+++\nBody\n";
        let (frontmatter, body) = split(text).unwrap();
        let frontmatter = frontmatter.unwrap();
        assert_eq!(frontmatter.format(), FrontmatterFormat::Toml);
        assert_eq!(frontmatter.value()["draft"], YamlValue::from(true));
        assert_eq!(body, "Body\n");
    }

    #[test]
    fn unclosed_delimiter_is_body() {
        let (frontmatter, body) = split("---\nnot frontmatter\n").unwrap();
        assert!(frontmatter.is_none());
        assert_eq!(body, "---\nnot frontmatter\n");
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let error = split("---\nkey: [unclosed\n---\n").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::FrontmatterParse);
    }

    #[test]
    fn set_creates_block_and_intermediate_mappings() {
        let mut frontmatter = None;
        set(
            &mut frontmatter,
            &path("meta.owner"),
            &YamlValue::from("docs"),
            Some(FrontmatterFormat::Toml),
        )
        .unwrap();
        let frontmatter = frontmatter.unwrap();
        assert_eq!(frontmatter.format(), FrontmatterFormat::Toml);
        assert_eq!(frontmatter.value()["meta"]["owner"], YamlValue::from("docs"));
        assert!(frontmatter.render(false).starts_with("+++\n"));
    }

    #[test]
    fn set_indexes_into_sequences() {
        let (mut frontmatter, _) = split("---\ntags:\n- a\n- b\n---\n").unwrap();
        set(&mut frontmatter, &path("tags[1]"), &YamlValue::from("c"), None).unwrap();
        set(&mut frontmatter, &path("tags[2]"), &YamlValue::from("d"), None).unwrap();
        let error = set(&mut frontmatter, &path("tags[9]"), &YamlValue::from("e"), None)
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::FrontmatterKeyNotFound);

        let value = frontmatter.unwrap().value().clone();
        let tags = value["tags"].as_sequence().unwrap();
        assert_eq!(tags, &vec![YamlValue::from("a"), YamlValue::from("c"), YamlValue::from("d")]);
    }

    #[test]
    fn delete_prunes_and_removes_empty_blocks() {
        let (mut frontmatter, _) = split("---\nmeta:\n  owner: docs\n---\n").unwrap();
        delete(&mut frontmatter, &path("meta.owner")).unwrap();
        assert!(frontmatter.is_none());
    }

    #[test]
    fn delete_reports_missing_keys_and_blocks() {
        let mut none = None;
        assert_eq!(
            delete(&mut none, &path("status")).unwrap_err().kind(),
            ErrorKind::FrontmatterMissing
        );

        let (mut frontmatter, _) = split("---\ntitle: Doc\n---\n").unwrap();
        let error = delete(&mut frontmatter, &path("status")).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::FrontmatterKeyNotFound);
        assert!(frontmatter.is_some());
    }

    #[test]
    fn replace_with_null_removes_the_block() {
        let (mut frontmatter, _) = split("---\ntitle: Doc\n---\n").unwrap();
        replace(&mut frontmatter, &YamlValue::Null, None).unwrap();
        assert!(frontmatter.is_none());
    }

    #[test]
    fn replace_prefers_the_explicit_format() {
        let (mut frontmatter, _) = split("---\ntitle: Doc\n---\n").unwrap();
        let content: YamlValue = serde_yaml::from_str("title: New").unwrap();
        replace(&mut frontmatter, &content, Some(FrontmatterFormat::Toml)).unwrap();
        let frontmatter = frontmatter.unwrap();
        assert_eq!(frontmatter.render(false), "+++\ntitle = \"New\"\n+++\n");
    }

    #[test]
    fn toml_cannot_hold_null() {
        let content: YamlValue = serde_yaml::from_str("title: ~\nother: 1").unwrap();
        let mut frontmatter = None;
        let error =
            replace(&mut frontmatter, &content, Some(FrontmatterFormat::Toml)).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::FrontmatterSerialize);
    }
}
