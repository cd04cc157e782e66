//! Block-level view of a Markdown body.
//!
//! Blocks keep the exact source they were parsed from, so a block that no
//! operation touches renders byte-for-byte as it was read. Only list and
//! blockquote blocks rebuild their source, and only after one of their
//! children changed.

use std::ops::Range;

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Block {
    kind: BlockKind,
    source: String,
    text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BlockKind {
    Paragraph,
    Heading(u8),
    List(List),
    BlockQuote(Vec<Block>),
    CodeBlock,
    Html,
    Table,
    ThematicBreak,
    FootnoteDefinition,
    /// Link reference definitions and anything else the parser emits no events for.
    Definition,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct List {
    items: Vec<ListItem>,
    loose: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ListItem {
    source: String,
    text: String,
}

impl Block {
    pub(crate) fn kind(&self) -> &BlockKind {
        &self.kind
    }

    pub(crate) fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn heading_level(&self) -> Option<u8> {
        match self.kind {
            BlockKind::Heading(level) => Some(level),
            _ => None,
        }
    }

    pub(crate) fn list(&self) -> Option<&List> {
        match &self.kind {
            BlockKind::List(list) => Some(list),
            _ => None,
        }
    }

    pub(crate) fn quote_children(&self) -> Option<&[Block]> {
        match &self.kind {
            BlockKind::BlockQuote(children) => Some(children),
            _ => None,
        }
    }

    /// Human readable kind, used in error messages.
    pub(crate) fn kind_name(&self) -> &'static str {
        match self.kind {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Heading(_) => "heading",
            BlockKind::List(_) => "list",
            BlockKind::BlockQuote(_) => "blockquote",
            BlockKind::CodeBlock => "code block",
            BlockKind::Html => "html block",
            BlockKind::Table => "table",
            BlockKind::ThematicBreak => "thematic break",
            BlockKind::FootnoteDefinition => "footnote definition",
            BlockKind::Definition => "definition",
        }
    }

    /// Whether a `select_type` filter names this block.
    pub(crate) fn matches_type(&self, select_type: &str) -> bool {
        let select_type = select_type.trim().to_ascii_lowercase();
        match (&self.kind, select_type.as_str()) {
            (BlockKind::Paragraph, "p" | "paragraph") => true,
            (BlockKind::Heading(_), "heading") => true,
            (BlockKind::Heading(level), other) => other
                .strip_prefix('h')
                .and_then(|digits| digits.parse::<u8>().ok())
                .is_some_and(|wanted| wanted == *level),
            (BlockKind::List(_), "list") => true,
            (BlockKind::BlockQuote(_), "blockquote") => true,
            (BlockKind::CodeBlock, "code" | "codeblock") => true,
            (BlockKind::Html, "html" | "htmlblock") => true,
            (BlockKind::Table, "table") => true,
            (BlockKind::ThematicBreak, "thematicbreak" | "hr") => true,
            (BlockKind::FootnoteDefinition, "footnote" | "footnotedefinition") => true,
            (BlockKind::Definition, "definition") => true,
            _ => false,
        }
    }

    pub(crate) fn from_list(list: List) -> Self {
        let source = list.render();
        let text = list
            .items
            .iter()
            .map(|item| item.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            kind: BlockKind::List(list),
            source,
            text,
        }
    }

    pub(crate) fn from_quote(children: Vec<Block>) -> Self {
        let inner = render_blocks(&children);
        let source = inner
            .lines()
            .map(|line| {
                if line.is_empty() {
                    ">".to_string()
                } else {
                    format!("> {line}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        let text = children
            .iter()
            .map(|child| child.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            kind: BlockKind::BlockQuote(children),
            source,
            text,
        }
    }

    /// Takes a list block apart, or returns `None` for any other kind.
    pub(crate) fn into_list(self) -> Option<List> {
        match self.kind {
            BlockKind::List(list) => Some(list),
            _ => None,
        }
    }
}

impl List {
    pub(crate) fn items(&self) -> &[ListItem] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<ListItem> {
        &mut self.items
    }

    pub(crate) fn into_items(self) -> Vec<ListItem> {
        self.items
    }

    fn render(&self) -> String {
        let separator = if self.loose { "\n\n" } else { "\n" };
        self.items
            .iter()
            .map(|item| item.source.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }
}

impl ListItem {
    pub(crate) fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn new(source: String, text: String) -> Self {
        Self { source, text }
    }
}

/// Joins blocks with exactly one blank line between them.
pub(crate) fn render_blocks(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|block| block.source.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
}

/// Splits `source` into top-level blocks.
pub(crate) fn parse_blocks(source: &str) -> Vec<Block> {
    let mut collector = Collector::new(source);
    for (event, range) in Parser::new_ext(source, markdown_options()).into_offset_iter() {
        collector.push(event, range);
    }
    collector.finish()
}

#[derive(Debug, Clone, Copy)]
enum PendingKind {
    Paragraph,
    Heading(u8),
    List,
    BlockQuote,
    CodeBlock,
    Html,
    Table,
    FootnoteDefinition,
}

#[derive(Debug)]
struct Pending {
    kind: PendingKind,
    range: Range<usize>,
    text: String,
    items: Vec<(Range<usize>, String)>,
}

struct Collector<'a> {
    source: &'a str,
    depth: usize,
    pending: Option<Pending>,
    in_item: bool,
    spans: Vec<(Range<usize>, Block)>,
}

impl<'a> Collector<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            depth: 0,
            pending: None,
            in_item: false,
            spans: vec![],
        }
    }

    fn push(&mut self, event: Event<'_>, range: Range<usize>) {
        match event {
            Event::Start(tag) => {
                if self.depth == 0 {
                    self.pending = Some(Pending {
                        kind: pending_kind(&tag),
                        range,
                        text: String::new(),
                        items: vec![],
                    });
                } else if self.depth == 1 && matches!(tag, Tag::Item) {
                    if let Some(pending) = &mut self.pending {
                        pending.items.push((range, String::new()));
                        self.in_item = true;
                    }
                } else if matches!(tag, Tag::List(_)) {
                    // Tight items emit no paragraph around their text.
                    self.push_text("\n");
                }
                self.depth += 1;
            }

            Event::End(tag) => {
                self.depth = self.depth.saturating_sub(1);
                if self.depth == 0 {
                    if let Some(pending) = self.pending.take() {
                        self.finish_pending(pending);
                    }
                    return;
                }

                if is_block_end(&tag) {
                    self.push_text("\n");
                }
                if self.depth == 1 && matches!(tag, TagEnd::Item) {
                    self.in_item = false;
                }
            }

            Event::Rule if self.depth == 0 => {
                let block = Block {
                    kind: BlockKind::ThematicBreak,
                    source: self.block_source(&range),
                    text: String::new(),
                };
                self.spans.push((range, block));
            }

            Event::Text(text) | Event::Code(text) | Event::Html(text) | Event::InlineHtml(text) => {
                self.push_text(&text)
            }

            Event::SoftBreak => self.push_text(" "),
            Event::HardBreak => self.push_text("\n"),
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        let Some(pending) = &mut self.pending else {
            return;
        };
        pending.text.push_str(text);
        if self.in_item {
            if let Some((_, item_text)) = pending.items.last_mut() {
                item_text.push_str(text);
            }
        }
    }

    /// Block source starting at the beginning of its first line.
    fn block_source(&self, range: &Range<usize>) -> String {
        let start = line_start(self.source, range.start);
        self.source[start..range.end].trim_end().to_string()
    }

    fn finish_pending(&mut self, pending: Pending) {
        let Pending {
            kind,
            range,
            text,
            items,
        } = pending;
        let source = self.block_source(&range);
        let text = text.trim().to_string();

        let kind = match kind {
            PendingKind::Paragraph => BlockKind::Paragraph,
            PendingKind::Heading(level) => BlockKind::Heading(level),
            PendingKind::CodeBlock => BlockKind::CodeBlock,
            PendingKind::Html => BlockKind::Html,
            PendingKind::Table => BlockKind::Table,
            PendingKind::FootnoteDefinition => BlockKind::FootnoteDefinition,
            PendingKind::BlockQuote => BlockKind::BlockQuote(parse_blocks(&unquote(&source))),
            PendingKind::List => {
                let loose = items.windows(2).any(|pair| {
                    let between = &self.source[pair[0].0.start..pair[1].0.start];
                    let trimmed = between.trim_end();
                    between[trimmed.len()..].matches('\n').count() >= 2
                });
                let items = items
                    .into_iter()
                    .map(|(range, text)| ListItem {
                        source: self.source[range].trim_end().to_string(),
                        text: text.trim().to_string(),
                    })
                    .collect();
                BlockKind::List(List { items, loose })
            }
        };

        self.spans.push((range, Block { kind, source, text }));
    }

    /// Orders blocks and recovers text the parser produced no events for.
    fn finish(self) -> Vec<Block> {
        let mut blocks = vec![];
        let mut cursor = 0;
        for (range, block) in self.spans {
            let start = line_start(self.source, range.start).max(cursor);
            push_definition(&mut blocks, &self.source[cursor..start]);
            blocks.push(block);
            cursor = range.end.max(cursor);
        }
        push_definition(&mut blocks, &self.source[cursor..]);
        blocks
    }
}

fn push_definition(blocks: &mut Vec<Block>, gap: &str) {
    let trimmed = gap.trim();
    if trimmed.is_empty() {
        return;
    }
    blocks.push(Block {
        kind: BlockKind::Definition,
        source: gap.trim_matches('\n').trim_end().to_string(),
        text: trimmed.to_string(),
    });
}

fn pending_kind(tag: &Tag<'_>) -> PendingKind {
    match tag {
        Tag::Heading { level, .. } => PendingKind::Heading(heading_level_to_u8(*level)),
        Tag::List(_) => PendingKind::List,
        Tag::BlockQuote(_) => PendingKind::BlockQuote,
        Tag::CodeBlock(_) => PendingKind::CodeBlock,
        Tag::HtmlBlock => PendingKind::Html,
        Tag::Table(_) => PendingKind::Table,
        Tag::FootnoteDefinition(_) => PendingKind::FootnoteDefinition,
        _ => PendingKind::Paragraph,
    }
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn is_block_end(tag: &TagEnd) -> bool {
    matches!(
        tag,
        TagEnd::Paragraph
            | TagEnd::Heading(_)
            | TagEnd::Item
            | TagEnd::CodeBlock
            | TagEnd::HtmlBlock
            | TagEnd::TableRow
            | TagEnd::TableHead
            | TagEnd::TableCell
    )
}

/// Start of the line containing `offset`, when only indentation precedes it.
fn line_start(source: &str, offset: usize) -> usize {
    let start = source[..offset].rfind('\n').map_or(0, |newline| newline + 1);
    if source[start..offset].chars().all(|c| c == ' ' || c == '\t') {
        start
    } else {
        offset
    }
}

/// Strips one level of `>` markers. Lazy continuation lines are kept as is.
fn unquote(source: &str) -> String {
    source
        .lines()
        .map(|line| {
            let indent = line.len() - line.trim_start_matches(' ').len();
            if indent > 3 {
                return line;
            }
            match line[indent..].strip_prefix('>') {
                Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
                None => line,
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
