use super::blocks::{parse_blocks, Block, BlockKind, List, ListItem};
use super::frontmatter;
use super::locate::{locate, locate_until, section_end, NodeRef};
use super::MarkdownDocument;
use crate::error::{Result, SpliceError};
use crate::operations::{
    DeleteOperation, InsertOperation, InsertPosition, Operation, ReplaceOperation,
};
use crate::transaction::{AmbiguitySink, SelectorTable};

pub(super) fn apply_operation(
    document: &mut MarkdownDocument,
    operation: &Operation,
    table: &SelectorTable,
    sink: &mut AmbiguitySink,
) -> Result<()> {
    match operation {
        Operation::Insert(op) => insert(&mut document.blocks, op, table, sink),
        Operation::Replace(op) => replace(&mut document.blocks, op, table, sink),
        Operation::Delete(op) => delete(&mut document.blocks, op, table, sink),
        Operation::SetFrontmatter(op) => {
            frontmatter::set(&mut document.frontmatter, op.key(), op.value(), op.format())
        }
        Operation::DeleteFrontmatter(op) => {
            frontmatter::delete(&mut document.frontmatter, op.key())
        }
        Operation::ReplaceFrontmatter(op) => {
            frontmatter::replace(&mut document.frontmatter, op.content(), op.format())
        }
    }
}

fn vanished() -> SpliceError {
    SpliceError::NodeNotFound("a node resolved earlier in this operation".into())
}

/// Runs `edit` on the block list at `path`, rebuilding every blockquote on the way.
fn with_container<R>(
    blocks: &mut Vec<Block>,
    path: &[usize],
    edit: impl FnOnce(&mut Vec<Block>) -> Result<R>,
) -> Result<R> {
    let Some((&first, rest)) = path.split_first() else {
        return edit(blocks);
    };

    let mut children = blocks
        .get(first)
        .and_then(Block::quote_children)
        .map(<[Block]>::to_vec)
        .ok_or_else(vanished)?;
    let result = with_container(&mut children, rest, edit)?;
    blocks[first] = Block::from_quote(children);
    Ok(result)
}

/// Runs `edit` on the items of a list. A list left without items is removed.
fn with_list<R>(
    blocks: &mut Vec<Block>,
    path: &[usize],
    index: usize,
    edit: impl FnOnce(&mut Vec<ListItem>) -> Result<R>,
) -> Result<R> {
    with_container(blocks, path, |siblings| {
        let mut list = siblings
            .get(index)
            .and_then(Block::list)
            .cloned()
            .ok_or_else(vanished)?;
        let result = edit(list.items_mut())?;
        if list.items().is_empty() {
            siblings.remove(index);
        } else {
            siblings[index] = Block::from_list(list);
        }
        Ok(result)
    })
}

fn splice_blocks(
    blocks: &mut Vec<Block>,
    path: &[usize],
    range: std::ops::Range<usize>,
    content: &str,
) -> Result<()> {
    with_container(blocks, path, |siblings| {
        if range.end > siblings.len() {
            return Err(vanished());
        }
        siblings.splice(range, parse_blocks(content));
        Ok(())
    })
}

/// Parses content that must consist of exactly one list.
fn list_items_from(content: &str) -> Result<Vec<ListItem>> {
    let mut parsed = parse_blocks(content);
    if parsed.len() != 1 {
        return Err(SpliceError::InvalidListItemContent(format!(
            "expected one list, found {} blocks",
            parsed.len()
        )));
    }

    let block = parsed.remove(0);
    let kind = block.kind_name();
    block
        .into_list()
        .map(List::into_items)
        .ok_or_else(|| SpliceError::InvalidListItemContent(format!("expected a list, found a {kind}")))
}

fn insert(
    blocks: &mut Vec<Block>,
    op: &InsertOperation,
    table: &SelectorTable,
    sink: &mut AmbiguitySink,
) -> Result<()> {
    let selector = table.resolve(op.target())?;
    let node = locate(blocks, selector, table, sink)?;
    let content = op.content();
    let position = op.position();

    match node {
        NodeRef::Block { container, index } => match position {
            InsertPosition::Before => splice_blocks(blocks, &container, index..index, content),
            InsertPosition::After => {
                splice_blocks(blocks, &container, index + 1..index + 1, content)
            }
            InsertPosition::PrependChild | InsertPosition::AppendChild => insert_child(
                blocks,
                &container,
                index,
                content,
                position == InsertPosition::PrependChild,
            ),
        },

        NodeRef::Item {
            container,
            block,
            item,
        } => match position {
            InsertPosition::Before | InsertPosition::After => {
                let new_items = list_items_from(content)?;
                let at = if position == InsertPosition::Before {
                    item
                } else {
                    item + 1
                };
                with_list(blocks, &container, block, |items| {
                    let new_items = conform_items(items, at, new_items);
                    items.splice(at..at, new_items);
                    Ok(())
                })
            }
            InsertPosition::PrependChild | InsertPosition::AppendChild => {
                let prepend = position == InsertPosition::PrependChild;
                with_list(blocks, &container, block, |items| {
                    let target = items.get_mut(item).ok_or_else(vanished)?;
                    *target = nest_in_item(target.source(), content, prepend);
                    Ok(())
                })
            }
        },
    }
}

fn insert_child(
    blocks: &mut Vec<Block>,
    path: &[usize],
    index: usize,
    content: &str,
    prepend: bool,
) -> Result<()> {
    with_container(blocks, path, |siblings| {
        let kind = siblings
            .get(index)
            .map(|block| (block.kind().clone(), block.kind_name()))
            .ok_or_else(vanished)?;

        match kind {
            (BlockKind::Heading(_), _) => {
                let at = if prepend {
                    index + 1
                } else {
                    section_end(siblings, index)
                };
                siblings.splice(at..at, parse_blocks(content));
            }

            (BlockKind::BlockQuote(mut children), _) => {
                let at = if prepend { 0 } else { children.len() };
                children.splice(at..at, parse_blocks(content));
                siblings[index] = Block::from_quote(children);
            }

            (BlockKind::List(mut list), _) => {
                let new_items = list_items_from(content)?;
                let at = if prepend { 0 } else { list.items().len() };
                let new_items = conform_items(list.items(), at, new_items);
                list.items_mut().splice(at..at, new_items);
                siblings[index] = Block::from_list(list);
            }

            (_, kind_name) => {
                return Err(SpliceError::InvalidChildInsertion(kind_name.to_string()));
            }
        }
        Ok(())
    })
}

fn replace(
    blocks: &mut Vec<Block>,
    op: &ReplaceOperation,
    table: &SelectorTable,
    sink: &mut AmbiguitySink,
) -> Result<()> {
    let selector = table.resolve(op.target())?;
    let node = locate(blocks, selector, table, sink)?;
    let content = op.content();

    match (node, op.until()) {
        (node @ NodeRef::Block { .. }, Some(until)) => {
            let end = locate_until(blocks, &node, table.resolve(until)?, table, sink)?;
            let NodeRef::Block { container, index } = node else {
                return Err(SpliceError::RangeRequiresBlock);
            };
            splice_blocks(blocks, &container, index..end.max(index + 1), content)
        }
        (NodeRef::Item { .. }, Some(_)) => Err(SpliceError::RangeRequiresBlock),
        (NodeRef::Block { container, index }, None) => {
            splice_blocks(blocks, &container, index..index + 1, content)
        }
        (
            NodeRef::Item {
                container,
                block,
                item,
            },
            None,
        ) => {
            let new_items = if content.trim().is_empty() {
                vec![]
            } else {
                list_items_from(content)?
            };
            with_list(blocks, &container, block, |items| {
                if item >= items.len() {
                    return Err(vanished());
                }
                let new_items = conform_items(items, item, new_items);
                items.splice(item..item + 1, new_items);
                Ok(())
            })
        }
    }
}

fn delete(
    blocks: &mut Vec<Block>,
    op: &DeleteOperation,
    table: &SelectorTable,
    sink: &mut AmbiguitySink,
) -> Result<()> {
    let selector = table.resolve(op.target())?;
    let node = locate(blocks, selector, table, sink)?;

    match node {
        NodeRef::Item { .. } if op.until().is_some() => Err(SpliceError::RangeRequiresBlock),
        NodeRef::Item { .. } if op.section() => {
            Err(SpliceError::InvalidSectionDelete("list item".into()))
        }
        NodeRef::Item {
            container,
            block,
            item,
        } => with_list(blocks, &container, block, |items| {
            if item >= items.len() {
                return Err(vanished());
            }
            items.remove(item);
            Ok(())
        }),

        NodeRef::Block { .. } if op.until().is_some() => {
            let until = op.until().ok_or_else(vanished)?;
            let end = locate_until(blocks, &node, table.resolve(until)?, table, sink)?;
            let NodeRef::Block { container, index } = node else {
                return Err(SpliceError::RangeRequiresBlock);
            };
            splice_blocks(blocks, &container, index..end.max(index + 1), "")
        }

        NodeRef::Block { container, index } => {
            let end = if op.section() {
                let siblings = super::locate::container(blocks, &container);
                match siblings.get(index) {
                    Some(block) if block.heading_level().is_some() => {
                        section_end(siblings, index)
                    }
                    Some(block) => {
                        return Err(SpliceError::InvalidSectionDelete(
                            block.kind_name().to_string(),
                        ))
                    }
                    None => return Err(vanished()),
                }
            } else {
                index + 1
            };
            splice_blocks(blocks, &container, index..end, "")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Bullet(char),
    Ordered { number: u64, delimiter: char },
}

impl Marker {
    /// Whether an item with `other` continues a list using `self`.
    fn continues(self, other: Marker) -> bool {
        match (self, other) {
            (Marker::Bullet(a), Marker::Bullet(b)) => a == b,
            (Marker::Ordered { delimiter: a, .. }, Marker::Ordered { delimiter: b, .. }) => a == b,
            _ => false,
        }
    }

    fn render(self) -> String {
        match self {
            Marker::Bullet(bullet) => bullet.to_string(),
            Marker::Ordered { number, delimiter } => format!("{number}{delimiter}"),
        }
    }
}

/// The marker on the first line of a list item and the columns around it.
#[derive(Debug, Clone, Copy)]
struct ItemMarker {
    leading: usize,
    marker: Marker,
    width: usize,
    spaces: usize,
}

impl ItemMarker {
    fn parse(item: &str) -> Option<Self> {
        let first = item.lines().next()?;
        let leading = first.len() - first.trim_start_matches(' ').len();
        let rest = &first[leading..];

        let (marker, width) = match rest.chars().next()? {
            bullet @ ('-' | '*' | '+') => (Marker::Bullet(bullet), 1),
            _ => {
                let digits = rest.chars().take_while(char::is_ascii_digit).count();
                let delimiter = rest[digits..]
                    .chars()
                    .next()
                    .filter(|delimiter| matches!(delimiter, '.' | ')'))?;
                let number = rest[..digits].parse().ok()?;
                (Marker::Ordered { number, delimiter }, digits + 1)
            }
        };

        let after = &rest[width..];
        let spaces = after.len() - after.trim_start_matches(' ').len();
        let spaces = if (1..=4).contains(&spaces) && !after.trim().is_empty() {
            spaces
        } else {
            1
        };

        Some(Self {
            leading,
            marker,
            width,
            spaces,
        })
    }

    /// Column where the item's content starts.
    fn content_offset(&self) -> usize {
        self.leading + self.width + self.spaces
    }
}

/// Column where an item's content starts, after its marker.
fn content_offset(item: &str) -> usize {
    ItemMarker::parse(item).map_or(2, |marker| marker.content_offset())
}

/// Rewrites markers of `items` spliced into `existing` at `at` so they stay in
/// the same list. A bullet or delimiter that differs from the list's would
/// otherwise start a new list.
///
/// Bullets take the list's bullet. Ordered items keep their number and take
/// the list's delimiter; bullets entering an ordered list are numbered by
/// position.
fn conform_items(existing: &[ListItem], at: usize, items: Vec<ListItem>) -> Vec<ListItem> {
    let Some(list) = existing
        .first()
        .and_then(|item| ItemMarker::parse(item.source()))
    else {
        return items;
    };

    items
        .into_iter()
        .enumerate()
        .map(|(offset, item)| {
            let Some(own) = ItemMarker::parse(item.source()) else {
                return item;
            };
            if list.marker.continues(own.marker) {
                return item;
            }

            let marker = match (list.marker, own.marker) {
                (Marker::Bullet(bullet), _) => Marker::Bullet(bullet),
                (Marker::Ordered { delimiter, .. }, Marker::Ordered { number, .. }) => {
                    Marker::Ordered { number, delimiter }
                }
                (Marker::Ordered { number, delimiter }, Marker::Bullet(_)) => Marker::Ordered {
                    number: number + (at + offset) as u64,
                    delimiter,
                },
            };
            remark(item.source(), own, list.leading, marker)
        })
        .collect()
}

/// Swaps the marker of `item` and moves its continuation lines to the new
/// content column.
fn remark(item: &str, own: ItemMarker, leading: usize, marker: Marker) -> ListItem {
    let marker = marker.render();
    let old_indent = " ".repeat(own.content_offset());
    let new_indent = " ".repeat(leading + marker.len() + own.spaces);

    let mut lines = item.lines();
    let body = lines
        .next()
        .and_then(|first| first.get(own.content_offset()..))
        .unwrap_or_default();

    let mut source = format!("{}{marker}", " ".repeat(leading));
    if !body.is_empty() {
        source.push_str(&" ".repeat(own.spaces));
        source.push_str(body);
    }
    for line in lines {
        source.push('\n');
        match line.strip_prefix(old_indent.as_str()) {
            Some(rest) => {
                source.push_str(&new_indent);
                source.push_str(rest);
            }
            None => source.push_str(line),
        }
    }

    reparse_item(source)
}

/// Adds `content` as a child of a list item, indented under its marker.
fn nest_in_item(item: &str, content: &str, prepend: bool) -> ListItem {
    let indent = " ".repeat(content_offset(item));
    let parsed = parse_blocks(content);
    let separator = match parsed.as_slice() {
        [only] if only.list().is_some() => "\n",
        _ => "\n\n",
    };

    let nested = content
        .trim_matches('\n')
        .trim_end()
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let source = match (prepend, item.split_once('\n')) {
        (true, Some((first, rest))) => format!("{first}{separator}{nested}\n{rest}"),
        _ => format!("{item}{separator}{nested}"),
    };

    reparse_item(source)
}

fn reparse_item(source: String) -> ListItem {
    parse_blocks(&source)
        .into_iter()
        .next()
        .and_then(Block::into_list)
        .and_then(|list| list.into_items().into_iter().next())
        .unwrap_or_else(|| {
            let text = source.clone();
            ListItem::new(source, text)
        })
}
