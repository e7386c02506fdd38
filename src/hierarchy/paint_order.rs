//! Paint order inside stacking contexts
//!
//! Within a context the layers paint bottom to top:
//!
//! 1. the context root itself
//! 2. child contexts with negative z-index (most negative first)
//! 3. in-flow block-level descendants
//! 4. non-positioned floats
//! 5. in-flow inline-level descendants
//! 6. positioned descendants with `z-index: auto` and contexts with z 0
//! 7. child contexts with positive z-index (least positive first)
//!
//! Ties fall back to document order. Child contexts are atomic: their
//! descendants are ordered inside them and never interleave with the
//! parent's layers.

use super::stacking::context_id;
use crate::ir::{Document, Node, NodeId, StackingContext, StackingReason};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Band {
    NegativeZ,
    Block,
    Float,
    Inline,
    Positioned,
    PositiveZ,
}

fn band_of(node: &Node, is_context: bool, inside_positioned: bool) -> (Band, i32) {
    let style = &node.layout.style;
    if is_context {
        let z = node.z_index.unwrap_or(0);
        let band = match z {
            z if z < 0 => Band::NegativeZ,
            0 => Band::Positioned,
            _ => Band::PositiveZ,
        };
        return (band, z);
    }
    // non-positioned content of a positioned box paints with that box
    if style.position.is_positioned() || inside_positioned {
        (Band::Positioned, 0)
    } else if style.float {
        (Band::Float, 0)
    } else if style.display.is_inline_level() {
        (Band::Inline, 0)
    } else {
        (Band::Block, 0)
    }
}

/// Members of the context rooted at `root`, in paint order
fn collect_members(doc: &Document, root: &Node, is_context: &HashMap<&str, StackingReason>) -> Vec<NodeId> {
    let mut keyed: Vec<((Band, i32, usize), NodeId)> = Vec::new();
    let mut stack: Vec<(&str, bool)> = root.children.iter().rev().map(|c| (c.as_str(), false)).collect();
    while let Some((id, inside_positioned)) = stack.pop() {
        let Some(node) = doc.get(id) else { continue };
        let context = is_context.contains_key(id);
        let (band, z) = band_of(node, context, inside_positioned);
        keyed.push(((band, z, node.order), node.id.clone()));
        if context {
            continue;
        }
        let positioned = inside_positioned || node.layout.style.position.is_positioned();
        for child in node.children.iter().rev() {
            stack.push((child.as_str(), positioned));
        }
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    keyed.into_iter().map(|(_, id)| id).collect()
}

/// Build the stacking contexts for every detected context root and record
/// on each painted node the context it paints in.
pub(super) fn build_contexts(doc: &mut Document, roots: &[(NodeId, StackingReason)]) -> Vec<StackingContext> {
    let Some(doc_root) = doc.root.clone() else {
        return Vec::new();
    };
    let reasons: HashMap<&str, StackingReason> = roots.iter().map(|(id, r)| (id.as_str(), *r)).collect();

    let mut contexts = Vec::with_capacity(roots.len());
    let mut paints_in: HashMap<NodeId, String> = HashMap::new();
    for (root_id, reason) in roots {
        let Some(root) = doc.get(root_id) else { continue };
        let id = context_id(root_id);
        let mut members = collect_members(doc, root, &reasons);
        if *root_id == doc_root {
            members.insert(0, root_id.clone());
        }
        for m in &members {
            paints_in.insert(m.clone(), id.clone());
        }
        contexts.push(StackingContext {
            id,
            root: root_id.clone(),
            parent: None,
            z_index: root.z_index.unwrap_or(0),
            reason: *reason,
            members,
        });
    }
    for ctx in &mut contexts {
        if ctx.root != doc_root {
            ctx.parent = paints_in.get(&ctx.root).cloned();
        }
    }
    for (node_id, ctx) in paints_in {
        if let Some(node) = doc.get_mut(&node_id) {
            node.stacking_context = Some(ctx);
        }
    }
    contexts
}

/// Flatten the context tree into one global paint sequence
pub(super) fn global_sequence(contexts: &[StackingContext]) -> Vec<NodeId> {
    let by_root: HashMap<&str, &StackingContext> = contexts.iter().map(|c| (c.root.as_str(), c)).collect();
    let Some(top) = contexts.iter().find(|c| c.parent.is_none() && c.reason == StackingReason::Root) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut stack: Vec<(&StackingContext, usize)> = vec![(top, 0)];
    while let Some((ctx, pos)) = stack.pop() {
        let Some(member) = ctx.members.get(pos) else { continue };
        stack.push((ctx, pos + 1));
        out.push(member.clone());
        if *member != ctx.root {
            if let Some(child) = by_root.get(member.as_str()) {
                stack.push((*child, 0));
            }
        }
    }
    out
}

/// Sort each node's children by paint position. Auto-layout containers
/// instead order in-flow children by (`order`, document order), reversed
/// for `*-reverse` directions, with out-of-flow children around them by
/// z-index.
pub(super) fn order_children(doc: &mut Document, sequence: &[NodeId]) {
    let position: HashMap<&str, usize> = sequence.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
    let mut updates: Vec<(NodeId, Vec<NodeId>)> = Vec::new();
    for node in doc.nodes.values() {
        if node.children.len() < 2 {
            continue;
        }
        let paint_pos = |id: &NodeId| position.get(id.as_str()).copied().unwrap_or(usize::MAX);
        let mut children = node.children.clone();
        match node.layout.auto_layout.as_ref().filter(|a| !a.is_absolute()) {
            Some(auto) => {
                let (mut flow, absolute): (Vec<NodeId>, Vec<NodeId>) = children
                    .into_iter()
                    .partition(|c| doc.get(c).is_some_and(|n| !n.layout.child.absolute));
                flow.sort_by_key(|c| doc.get(c).map(|n| (n.layout.child.order, n.order)).unwrap_or_default());
                if auto.reverse_children {
                    flow.reverse();
                }
                let (mut below, mut above): (Vec<NodeId>, Vec<NodeId>) = absolute
                    .into_iter()
                    .partition(|c| doc.get(c).and_then(|n| n.z_index).is_some_and(|z| z < 0));
                below.sort_by_key(&paint_pos);
                above.sort_by_key(&paint_pos);
                children = below;
                children.extend(flow);
                children.extend(above);
            }
            None => children.sort_by_key(&paint_pos),
        }
        if children != node.children {
            updates.push((node.id.clone(), children));
        }
    }
    for (id, children) in updates {
        if let Some(node) = doc.get_mut(&id) {
            node.children = children;
        }
    }
}
