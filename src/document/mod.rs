//! The Markdown implementation of [`Document`].

mod blocks;
mod frontmatter;
mod locate;
mod splice;

use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_yaml::Value as YamlValue;

use blocks::{parse_blocks, render_blocks, Block};
use frontmatter::Frontmatter;
use locate::{block_at, candidates, container, locate, locate_until, node_source, NodeRef};

use crate::error::{Result, SpliceError};
use crate::operations::{FrontmatterFormat, Operation};
use crate::selector::Selector;
use crate::session::store;
use crate::traits::Document;
use crate::transaction::{self, AmbiguityPolicy, AmbiguitySink, ApplyReport, SelectorTable};

/// A Markdown file split into frontmatter and top-level blocks.
///
/// Blocks no operation touched render exactly as they were read; the only
/// normalization is one blank line between blocks and a single trailing
/// newline.
#[derive(Debug, Clone, PartialEq, fieldwork::Fieldwork)]
#[fieldwork(opt_in, get)]
pub struct MarkdownDocument {
    frontmatter: Option<Frontmatter>,
    blocks: Vec<Block>,
    /// the file this document was read from, if any
    #[fieldwork(get)]
    path: Option<PathBuf>,
}

impl MarkdownDocument {
    /// Reads and parses `path`, remembering it for [`MarkdownDocument::write_in_place`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| SpliceError::io(path, e))?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            ..Self::parse(&text)?
        })
    }

    /// Atomically writes the rendered document to `path`, creating or
    /// replacing it.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        store::write_atomic(path, self.render().as_bytes())?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }

    /// Writes the rendered document back to the file it was read from.
    ///
    /// With `backup`, the bytes being replaced are first copied to `<name>~`.
    /// Documents not read with [`MarkdownDocument::from_file`] have nowhere to
    /// go and fail with [`SpliceError::NoSourcePath`].
    pub fn write_in_place(&self, backup: bool) -> Result<()> {
        let path = self.path.as_deref().ok_or(SpliceError::NoSourcePath)?;
        if backup {
            let current = fs::read(path).map_err(|e| SpliceError::io(path, e))?;
            store::write_atomic(&store::backup_path(path), &current)?;
        }
        self.write_to(path)
    }

    /// Source of the node `selector` picks.
    pub fn get(&self, selector: &Selector) -> Result<String> {
        let (table, mut sink) = query_context(selector)?;
        let node = locate(&self.blocks, selector, &table, &mut sink)?;
        node_source(&self.blocks, &node)
            .ok_or_else(|| SpliceError::NodeNotFound(selector.to_string()))
    }

    /// Source of every node `selector` matches, ignoring its ordinal.
    pub fn get_all(&self, selector: &Selector) -> Result<Vec<String>> {
        let (table, mut sink) = query_context(selector)?;
        Ok(candidates(&self.blocks, selector, &table, &mut sink)?
            .iter()
            .filter_map(|node| node_source(&self.blocks, node))
            .collect())
    }

    /// The heading `selector` picks together with the rest of its section.
    pub fn get_section(&self, selector: &Selector) -> Result<String> {
        let (table, mut sink) = query_context(selector)?;
        let node = locate(&self.blocks, selector, &table, &mut sink)?;
        let block = block_at(&self.blocks, &node)
            .ok_or_else(|| SpliceError::NodeNotFound(selector.to_string()))?;

        match node {
            NodeRef::Block {
                container: path,
                index,
            } if block.heading_level().is_some() => {
                let siblings = container(&self.blocks, &path);
                let end = locate::section_end(siblings, index);
                Ok(render_blocks(&siblings[index..end]))
            }
            NodeRef::Block { .. } => Err(SpliceError::InvalidSectionDelete(
                block.kind_name().to_string(),
            )),
            NodeRef::Item { .. } => Err(SpliceError::InvalidSectionDelete("list item".into())),
        }
    }

    /// Blocks from the node `selector` picks up to, not including, the node
    /// `until` picks. Runs to the end of the container when `until` matches
    /// nothing after the start.
    pub fn get_until(&self, selector: &Selector, until: &Selector) -> Result<String> {
        let (mut table, mut sink) = query_context(selector)?;
        table.register(until)?;

        let node = locate(&self.blocks, selector, &table, &mut sink)?;
        let end = locate_until(&self.blocks, &node, until, &table, &mut sink)?;
        let NodeRef::Block {
            container: path,
            index,
        } = node
        else {
            return Err(SpliceError::RangeRequiresBlock);
        };

        let siblings = container(&self.blocks, &path);
        Ok(render_blocks(&siblings[index..end.max(index + 1)]))
    }
}

fn query_context(selector: &Selector) -> Result<(SelectorTable, AmbiguitySink)> {
    let mut table = SelectorTable::new();
    table.register(selector)?;
    Ok((table, AmbiguitySink::new(AmbiguityPolicy::Ignore)))
}

impl Document for MarkdownDocument {
    fn parse(text: &str) -> Result<Self> {
        let (frontmatter, body) = frontmatter::split(text)?;
        Ok(Self {
            frontmatter,
            blocks: parse_blocks(body),
            path: None,
        })
    }

    fn render(&self) -> String {
        let body = render_blocks(&self.blocks);
        let has_body = !body.is_empty();

        let mut rendered = self
            .frontmatter
            .as_ref()
            .map(|frontmatter| frontmatter.render(has_body))
            .unwrap_or_default();
        if has_body {
            rendered.push_str(&body);
            rendered.push('\n');
        }
        rendered
    }

    fn frontmatter(&self) -> Option<&YamlValue> {
        self.frontmatter.as_ref().map(Frontmatter::value)
    }

    fn frontmatter_format(&self) -> Option<FrontmatterFormat> {
        self.frontmatter.as_ref().map(Frontmatter::format)
    }

    fn apply(&mut self, operations: &[Operation], policy: AmbiguityPolicy) -> Result<ApplyReport> {
        transaction::execute(self, operations, policy, splice::apply_operation)
    }
}

impl FromStr for MarkdownDocument {
    type Err = SpliceError;

    fn from_str(text: &str) -> Result<Self> {
        Self::parse(text)
    }
}

impl Display for MarkdownDocument {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::operations::{
        DeleteOperation, InsertOperation, InsertPosition, ReplaceOperation,
        SetFrontmatterOperation,
    };

    const GUIDE: &str = "\
---
title: Guide
---

# Guide

Intro paragraph.

## Install

- Download
- Configure

## Usage

Run it.
";

    fn doc(text: &str) -> MarkdownDocument {
        text.parse().unwrap()
    }

    fn select(select_type: &str, contains: &str) -> Selector {
        Selector::builder()
            .select_type(select_type)
            .contains(contains)
            .build()
            .unwrap()
    }

    fn apply(document: &mut MarkdownDocument, operations: Vec<Operation>) -> Result<ApplyReport> {
        document.apply(&operations, AmbiguityPolicy::Warn)
    }

    #[test]
    fn untouched_documents_render_unchanged() {
        assert_eq!(doc(GUIDE).render(), GUIDE);
        assert_eq!(doc("").render(), "");
    }

    #[test]
    fn insert_before_a_list_item() {
        let mut document = doc(GUIDE);
        let op = InsertOperation::builder()
            .selector(select("li", "Configure"))
            .content("- Verify checksum")
            .position(InsertPosition::Before)
            .build()
            .unwrap();
        apply(&mut document, vec![op.into()]).unwrap();
        assert!(document
            .render()
            .contains("- Download\n- Verify checksum\n- Configure"));
    }

    #[test]
    fn append_child_to_a_heading_lands_at_the_end_of_its_section() {
        let mut document = doc(GUIDE);
        let op = InsertOperation::builder()
            .selector(select("h2", "Install"))
            .content("Requires Rust.")
            .position(InsertPosition::AppendChild)
            .build()
            .unwrap();
        apply(&mut document, vec![op.into()]).unwrap();
        assert!(document
            .render()
            .contains("- Configure\n\nRequires Rust.\n\n## Usage"));
    }

    #[test]
    fn paragraphs_reject_children() {
        let mut document = doc(GUIDE);
        let op = InsertOperation::builder()
            .selector(select("p", "Intro"))
            .content("nested")
            .position(InsertPosition::AppendChild)
            .build()
            .unwrap();
        let error = apply(&mut document, vec![op.into()]).unwrap_err();
        assert_eq!(error.root_cause().kind(), ErrorKind::InvalidChildInsertion);
    }

    #[test]
    fn replace_until_keeps_the_boundary() {
        let mut document = doc(GUIDE);
        let op = ReplaceOperation::builder()
            .selector(select("h2", "Install"))
            .until(select("h2", "Usage"))
            .content("## Setup\n\nNothing to install.")
            .build()
            .unwrap();
        apply(&mut document, vec![op.into()]).unwrap();
        let rendered = document.render();
        assert!(rendered.contains("Intro paragraph.\n\n## Setup\n\nNothing to install.\n\n## Usage"));
        assert!(!rendered.contains("Download"));
    }

    #[test]
    fn section_delete_removes_the_heading_and_its_body() {
        let mut document = doc(GUIDE);
        let op = DeleteOperation::builder()
            .selector(select("h2", "Install"))
            .section(true)
            .build()
            .unwrap();
        apply(&mut document, vec![op.into()]).unwrap();
        assert!(document
            .render()
            .ends_with("Intro paragraph.\n\n## Usage\n\nRun it.\n"));
    }

    #[test]
    fn deleting_every_item_removes_the_list() {
        let mut document = doc("Before.\n\n- only\n\nAfter.\n");
        let op = DeleteOperation::builder()
            .selector(select("li", "only"))
            .build()
            .unwrap();
        apply(&mut document, vec![op.into()]).unwrap();
        assert_eq!(document.render(), "Before.\n\nAfter.\n");
    }

    #[test]
    fn edits_inside_blockquotes_requote_the_children() {
        let mut document = doc("> First.\n>\n> Second.\n");
        let quoted = Selector::builder()
            .select_type("p")
            .contains("Second")
            .within(Selector::builder().select_type("blockquote").build().unwrap())
            .build()
            .unwrap();
        let op = ReplaceOperation::builder()
            .selector(quoted)
            .content("Replaced.")
            .build()
            .unwrap();
        apply(&mut document, vec![op.into()]).unwrap();
        assert_eq!(document.render(), "> First.\n>\n> Replaced.\n");
    }

    #[test]
    fn failed_transactions_leave_the_document_alone() {
        let mut document = doc(GUIDE);
        let operations: Vec<Operation> = vec![
            SetFrontmatterOperation::new("draft", true).unwrap().into(),
            DeleteOperation::builder()
                .selector(select("h3", "Missing"))
                .build()
                .unwrap()
                .into(),
        ];
        let error = apply(&mut document, operations).unwrap_err();
        assert!(matches!(error, SpliceError::OperationFailed { index: 1, .. }));
        assert_eq!(document.render(), GUIDE);
    }

    #[test]
    fn frontmatter_edits_keep_the_body() {
        let mut document = doc(GUIDE);
        let op = SetFrontmatterOperation::new("tags[0]", "docs").unwrap();
        apply(&mut document, vec![op.into()]).unwrap();
        assert_eq!(
            document.frontmatter().and_then(|value| value["tags"][0].as_str()),
            Some("docs")
        );
        assert!(document.render().ends_with("---\n\n# Guide\n\nIntro paragraph.\n\n## Install\n\n- Download\n- Configure\n\n## Usage\n\nRun it.\n"));
        assert_eq!(document.frontmatter_format(), Some(FrontmatterFormat::Yaml));
    }

    #[test]
    fn queries_read_without_mutating() {
        let document = doc(GUIDE);
        assert_eq!(document.get(&select("li", "Conf")).unwrap(), "- Configure");
        assert_eq!(
            document
                .get_all(&Selector::builder().select_type("h2").build().unwrap())
                .unwrap(),
            vec!["## Install", "## Usage"]
        );
        assert_eq!(
            document.get_section(&select("h2", "Install")).unwrap(),
            "## Install\n\n- Download\n- Configure"
        );
        assert_eq!(
            document
                .get_until(&select("h1", "Guide"), &select("h2", "Usage"))
                .unwrap(),
            "# Guide\n\nIntro paragraph.\n\n## Install\n\n- Download\n- Configure"
        );
        assert_eq!(
            document.get_section(&select("p", "Intro")).unwrap_err().kind(),
            ErrorKind::InvalidSectionDelete
        );
    }

    fn append_to_guide() -> Operation {
        InsertOperation::builder()
            .selector(select("li", "Configure"))
            .content("- Verify")
            .build()
            .unwrap()
            .into()
    }

    #[test]
    fn write_in_place_replaces_the_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide.md");
        fs::write(&path, GUIDE).unwrap();

        let mut document = MarkdownDocument::from_file(&path).unwrap();
        assert_eq!(document.path(), Some(path.as_path()));
        apply(&mut document, vec![append_to_guide()]).unwrap();
        document.write_in_place(false).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("- Configure\n- Verify\n"));
        assert!(!store::backup_path(&path).exists());
    }

    #[test]
    fn write_in_place_can_keep_a_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide.md");
        fs::write(&path, GUIDE).unwrap();

        let mut document = MarkdownDocument::from_file(&path).unwrap();
        apply(&mut document, vec![append_to_guide()]).unwrap();
        document.write_in_place(true).unwrap();

        assert_eq!(fs::read_to_string(store::backup_path(&path)).unwrap(), GUIDE);
        assert_eq!(fs::read_to_string(&path).unwrap(), document.render());
    }

    #[test]
    fn parsed_documents_cannot_be_written_in_place() {
        let document = doc("Paragraph.\n");
        assert_eq!(document.path(), None);
        assert_eq!(
            document.write_in_place(true).unwrap_err().kind(),
            ErrorKind::NoSourcePath
        );
    }

    #[test]
    fn write_to_creates_a_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.md");

        let mut document = doc("Paragraph.\n");
        apply(
            &mut document,
            vec![ReplaceOperation::builder()
                .selector(Selector::builder().select_type("p").build().unwrap())
                .content("Rewritten paragraph.")
                .build()
                .unwrap()
                .into()],
        )
        .unwrap();
        document.write_to(&output).unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "Rewritten paragraph.\n");
        assert_eq!(document.path(), None);
    }

    #[test]
    fn preview_does_not_touch_the_document() {
        let document = doc(GUIDE);
        let op: Operation = DeleteOperation::builder()
            .selector(select("p", "Run"))
            .build()
            .unwrap()
            .into();
        let preview = document.preview(&[op], AmbiguityPolicy::Ignore).unwrap();
        assert!(preview.ends_with("## Usage\n"));
        assert_eq!(document.render(), GUIDE);
    }
}
