// SPDX-License-Identifier: AGPL-3.0-or-later
//! List normalization
//!
//! Importers that only know an indentation per item produce flat runs of list
//! containers. This pass collects every item of a run into a frame, tagged
//! with its depth, and rebuilds the nesting from those depths.

use crate::ast::{MetaValue, Metadata, Segment, SegmentKind, SyntaxNode};

/// Metadata key holding the indentation recorded by an importer
pub const META_MARGIN_LEFT: &str = "margin-left";

struct Item {
    node: SyntaxNode,
    depth: i64,
    kind: SegmentKind,
}

/// Items collected from one run of sibling list containers
#[derive(Default)]
struct Frame {
    items: Vec<Item>,
}

fn margin_of(meta: &Metadata) -> i64 {
    meta.get(META_MARGIN_LEFT)
        .and_then(MetaValue::as_integer)
        .unwrap_or(0)
}

fn is_list(node: &SyntaxNode) -> bool {
    node.segment_kind().is_some_and(|kind| kind.is_list())
}

/// Rebuild list nesting below `root`
///
/// Returns the rewritten tree and whether anything changed.
pub fn normalize_lists(root: SyntaxNode) -> (SyntaxNode, bool) {
    let mut modified = false;

    let root = if is_list(&root) {
        let mut replacement = normalize_run(vec![root], &mut modified);
        match replacement.len() {
            1 => replacement.remove(0),
            _ => SyntaxNode::segment(None, replacement),
        }
    } else {
        normalize_node(root, &mut modified)
    };

    (root, modified)
}

fn normalize_node(mut node: SyntaxNode, modified: &mut bool) -> SyntaxNode {
    if let Some(content) = node.content_mut() {
        let children = std::mem::take(content);
        *content = normalize_children(children, modified);
    }
    node
}

fn normalize_children(children: Vec<SyntaxNode>, modified: &mut bool) -> Vec<SyntaxNode> {
    let mut output = Vec::with_capacity(children.len());
    let mut run = Vec::new();

    for child in children {
        if is_list(&child) {
            run.push(child);
            continue;
        }

        if !run.is_empty() {
            output.append(&mut normalize_run(std::mem::take(&mut run), modified));
        }
        output.push(normalize_node(child, modified));
    }

    if !run.is_empty() {
        output.append(&mut normalize_run(run, modified));
    }

    output
}

/// Regroup consecutive list containers, yielding at most one node
fn normalize_run(run: Vec<SyntaxNode>, modified: &mut bool) -> Vec<SyntaxNode> {
    let original = run.clone();
    let mut frame = Frame::default();

    for node in run {
        if let SyntaxNode::Segment(list) = node {
            collect_container(list, 0, &mut frame, modified);
        }
    }

    let item_count = frame.items.len();
    let mut results = regroup(frame.items);
    tracing::debug!(
        items = item_count,
        containers = results.len(),
        "regrouped list frame"
    );

    let replacement = match results.len() {
        0 => Vec::new(),
        1 => results,
        _ => vec![SyntaxNode::segment(None, std::mem::take(&mut results))],
    };

    if replacement != original {
        *modified = true;
    }
    replacement
}

fn collect_container(list: Segment, parent_margin: i64, frame: &mut Frame, modified: &mut bool) {
    let Some(kind) = list.kind else {
        return;
    };
    let margin = parent_margin + margin_of(&list.meta) + 1;

    for child in list.content {
        match child {
            SyntaxNode::Segment(item) if item.kind == Some(SegmentKind::Li) => {
                collect_item(item, kind, margin, frame, modified);
            }
            other => frame.items.push(Item {
                node: normalize_node(other, modified),
                depth: margin,
                kind,
            }),
        }
    }
}

/// Record `item` ahead of the items of any list nested inside it
fn collect_item(
    mut item: Segment,
    kind: SegmentKind,
    margin: i64,
    frame: &mut Frame,
    modified: &mut bool,
) {
    let index = frame.items.len();
    let depth = margin + margin_of(&item.meta);

    let mut kept = Vec::with_capacity(item.content.len());
    for child in std::mem::take(&mut item.content) {
        match child {
            SyntaxNode::Segment(nested) if nested.kind.is_some_and(|k| k.is_list()) => {
                collect_container(nested, margin, frame, modified);
            }
            other => kept.push(normalize_node(other, modified)),
        }
    }
    item.content = kept;

    frame.items.insert(
        index,
        Item {
            node: SyntaxNode::Segment(item),
            depth,
            kind,
        },
    );
}

/// Open containers, innermost last
type Stack = Vec<(Segment, i64, SegmentKind)>;

fn close_top(stack: &mut Stack, results: &mut Vec<SyntaxNode>) {
    if let Some((container, _, _)) = stack.pop() {
        let node = SyntaxNode::Segment(container);
        match stack.last_mut() {
            Some((parent, _, _)) => parent.content.push(node),
            None => results.push(node),
        }
    }
}

fn regroup(items: Vec<Item>) -> Vec<SyntaxNode> {
    let mut results = Vec::new();
    let mut stack: Stack = Vec::new();

    for item in items {
        while stack.last().is_some_and(|(_, depth, _)| item.depth < *depth) {
            close_top(&mut stack, &mut results);
        }

        let reuse = match stack.last() {
            Some((_, depth, kind)) if *depth == item.depth => {
                if *kind != item.kind {
                    close_top(&mut stack, &mut results);
                    false
                } else {
                    true
                }
            }
            _ => false,
        };

        if !reuse {
            stack.push((Segment::new(Some(item.kind), Vec::new()), item.depth, item.kind));
        }

        if let Some((container, _, _)) = stack.last_mut() {
            container.content.push(item.node);
        }
    }

    while !stack.is_empty() {
        close_top(&mut stack, &mut results);
    }

    results
}
