//! Resolving selectors to nodes.
//!
//! Candidates are the blocks of one container (the document root or the
//! children of a blockquote) plus the items of the lists among them, in
//! document order. `li` selectors only see list items. Every other selector
//! only sees blocks, unless the region holds nothing but list items (inside a
//! list).

use std::ops::Range;

use super::blocks::{Block, BlockKind};
use crate::error::{Result, SpliceError};
use crate::selector::{Scope, Selector};
use crate::transaction::{AmbiguitySink, SelectorTable};

/// Address of a node: a path of blockquote indices leading to its container,
/// then its position there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeRef {
    Block {
        container: Vec<usize>,
        index: usize,
    },
    Item {
        container: Vec<usize>,
        block: usize,
        item: usize,
    },
}

impl NodeRef {
    pub(crate) fn container(&self) -> &[usize] {
        match self {
            NodeRef::Block { container, .. } | NodeRef::Item { container, .. } => container,
        }
    }
}

/// A contiguous part of one container that a selector may match in.
#[derive(Debug, Clone)]
struct Region {
    container: Vec<usize>,
    /// Items of one list preceding `blocks`, as `(list block, first item)`.
    leading_items: Option<(usize, usize)>,
    blocks: Range<usize>,
}

pub(crate) fn container<'a>(blocks: &'a [Block], path: &[usize]) -> &'a [Block] {
    let mut current = blocks;
    for &index in path {
        current = match current.get(index).and_then(Block::quote_children) {
            Some(children) => children,
            None => return &[],
        };
    }
    current
}

/// End (exclusive) of the section a heading starts.
pub(crate) fn section_end(blocks: &[Block], heading: usize) -> usize {
    let Some(level) = blocks.get(heading).and_then(Block::heading_level) else {
        return heading + 1;
    };
    blocks
        .iter()
        .enumerate()
        .skip(heading + 1)
        .find(|(_, block)| block.heading_level().is_some_and(|other| other <= level))
        .map_or(blocks.len(), |(index, _)| index)
}

fn is_item_type(select_type: &str) -> bool {
    matches!(
        select_type.trim().to_ascii_lowercase().as_str(),
        "li" | "item" | "listitem"
    )
}

fn nodes_in(blocks: &[Block], region: &Region) -> Vec<NodeRef> {
    let siblings = container(blocks, &region.container);
    let mut nodes = vec![];

    let items_of = |nodes: &mut Vec<NodeRef>, block: usize, from: usize| {
        let count = siblings
            .get(block)
            .and_then(Block::list)
            .map_or(0, |list| list.items().len());
        nodes.extend((from..count).map(|item| NodeRef::Item {
            container: region.container.clone(),
            block,
            item,
        }));
    };

    if let Some((block, from)) = region.leading_items {
        items_of(&mut nodes, block, from);
    }

    for index in region.blocks.clone() {
        if index >= siblings.len() {
            break;
        }
        nodes.push(NodeRef::Block {
            container: region.container.clone(),
            index,
        });
        items_of(&mut nodes, index, 0);
    }

    nodes
}

fn node_text<'a>(blocks: &'a [Block], node: &NodeRef) -> Option<&'a str> {
    match node {
        NodeRef::Block { container: path, index } => {
            container(blocks, path).get(*index).map(Block::text)
        }
        NodeRef::Item {
            container: path,
            block,
            item,
        } => container(blocks, path)
            .get(*block)
            .and_then(Block::list)
            .and_then(|list| list.items().get(*item))
            .map(|item| item.text()),
    }
}

pub(crate) fn node_source(blocks: &[Block], node: &NodeRef) -> Option<String> {
    match node {
        NodeRef::Block { container: path, index } => container(blocks, path)
            .get(*index)
            .map(|block| block.source().to_string()),
        NodeRef::Item {
            container: path,
            block,
            item,
        } => container(blocks, path)
            .get(*block)
            .and_then(Block::list)
            .and_then(|list| list.items().get(*item))
            .map(|item| item.source().to_string()),
    }
}

fn matches(blocks: &[Block], node: &NodeRef, selector: &Selector, items_only: bool) -> bool {
    let type_ok = match (node, selector.select_type()) {
        (NodeRef::Item { .. }, Some(select_type)) => is_item_type(select_type),
        (NodeRef::Item { .. }, None) => items_only,
        (NodeRef::Block { .. }, Some(select_type)) => {
            !is_item_type(select_type)
                && block_at(blocks, node).is_some_and(|block| block.matches_type(select_type))
        }
        (NodeRef::Block { .. }, None) => !items_only,
    };

    type_ok && node_text(blocks, node).is_some_and(|text| selector.matches_text(text))
}

pub(crate) fn block_at<'a>(blocks: &'a [Block], node: &NodeRef) -> Option<&'a Block> {
    match node {
        NodeRef::Block { container: path, index } => container(blocks, path).get(*index),
        NodeRef::Item {
            container: path,
            block,
            ..
        } => container(blocks, path).get(*block),
    }
}

fn region_for(
    blocks: &[Block],
    selector: &Selector,
    table: &SelectorTable,
    sink: &mut AmbiguitySink,
) -> Result<Region> {
    let root = Region {
        container: vec![],
        leading_items: None,
        blocks: 0..blocks.len(),
    };

    let Some(scope) = selector.scope() else {
        return Ok(root);
    };

    match scope {
        Scope::After(anchor) => {
            let anchor = locate(blocks, table.resolve_anchor(anchor)?, table, sink)?;
            let siblings = container(blocks, anchor.container()).len();
            Ok(match anchor {
                NodeRef::Block { container, index } => Region {
                    container,
                    leading_items: None,
                    blocks: index + 1..siblings,
                },
                NodeRef::Item {
                    container,
                    block,
                    item,
                } => Region {
                    container,
                    leading_items: Some((block, item + 1)),
                    blocks: block + 1..siblings,
                },
            })
        }

        Scope::Within(anchor) => {
            let anchor = locate(blocks, table.resolve_anchor(anchor)?, table, sink)?;
            let (path, index) = match anchor {
                NodeRef::Block { container, index } => (container, index),
                // List items hold no addressable children.
                NodeRef::Item { container, .. } => {
                    return Ok(Region {
                        container,
                        leading_items: None,
                        blocks: 0..0,
                    })
                }
            };
            let siblings = container(blocks, &path);
            let region = match siblings.get(index).map(Block::kind) {
                Some(BlockKind::Heading(_)) => Region {
                    blocks: index + 1..section_end(siblings, index),
                    container: path,
                    leading_items: None,
                },
                Some(BlockKind::BlockQuote(children)) => {
                    let mut inner = path;
                    inner.push(index);
                    Region {
                        container: inner,
                        leading_items: None,
                        blocks: 0..children.len(),
                    }
                }
                Some(BlockKind::List(_)) => Region {
                    container: path,
                    leading_items: Some((index, 0)),
                    blocks: 0..0,
                },
                _ => Region {
                    container: path,
                    leading_items: None,
                    blocks: 0..0,
                },
            };
            Ok(region)
        }
    }
}

/// Every node the selector matches, ignoring its ordinal.
pub(crate) fn candidates(
    blocks: &[Block],
    selector: &Selector,
    table: &SelectorTable,
    sink: &mut AmbiguitySink,
) -> Result<Vec<NodeRef>> {
    let region = region_for(blocks, selector, table, sink)?;
    let items_only = region.blocks.is_empty() && region.leading_items.is_some();
    Ok(nodes_in(blocks, &region)
        .into_iter()
        .filter(|node| matches(blocks, node, selector, items_only))
        .collect())
}

fn pick(
    selector: &Selector,
    candidates: Vec<NodeRef>,
    sink: &mut AmbiguitySink,
) -> Result<NodeRef> {
    sink.observe(selector, candidates.len())?;
    candidates
        .into_iter()
        .nth(selector.ordinal() - 1)
        .ok_or_else(|| SpliceError::NodeNotFound(selector.to_string()))
}

/// The node chosen by the selector's ordinal among its candidates.
pub(crate) fn locate(
    blocks: &[Block],
    selector: &Selector,
    table: &SelectorTable,
    sink: &mut AmbiguitySink,
) -> Result<NodeRef> {
    let candidates = candidates(blocks, selector, table, sink)?;
    pick(selector, candidates, sink)
}

/// End (exclusive) of a range starting at `start` and stopping before `until`.
///
/// Only blocks following the start in the same container qualify. When none
/// matches, the range runs to the end of the container.
pub(crate) fn locate_until(
    blocks: &[Block],
    start: &NodeRef,
    until: &Selector,
    table: &SelectorTable,
    sink: &mut AmbiguitySink,
) -> Result<usize> {
    let NodeRef::Block { container: path, index } = start else {
        return Err(SpliceError::RangeRequiresBlock);
    };

    let following = candidates(blocks, until, table, sink)?
        .into_iter()
        .filter(|node| match node {
            NodeRef::Block {
                container,
                index: other,
            } => container == path && other > index,
            NodeRef::Item {
                container, block, ..
            } => container == path && block > index,
        })
        .collect::<Vec<_>>();

    if following.is_empty() {
        return Ok(container(blocks, path).len());
    }

    match pick(until, following, sink) {
        Ok(NodeRef::Block { index: end, .. }) => Ok(end),
        Ok(NodeRef::Item { .. }) => Err(SpliceError::RangeRequiresBlock),
        Err(SpliceError::NodeNotFound(_)) => Ok(container(blocks, path).len()),
        Err(other) => Err(other),
    }
}
