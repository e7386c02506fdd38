//! Hierarchy and paint-order builder
//!
//! Rebuilds the painted tree from each node's captured parent reference,
//! repairs what cannot be trusted (missing parents, dangling references,
//! cycles) by attaching to the root with a structural marker, then detects
//! stacking contexts and sorts every child list into paint order.
//!
//! Building is idempotent: all links are recomputed from `dom_parent` and
//! capture order on every run, so the receiver can rebuild after each batch.

mod paint_order;
pub mod stacking;

pub use stacking::{context_id, establishes_context};

use crate::ir::{Document, Marker, MarkerKind, NodeId};
use log::{debug, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// What a build had to repair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub nodes: usize,
    /// Nodes attached to the root because their parent was missing
    pub reattached: usize,
    pub cycles_broken: usize,
    pub hidden: usize,
    pub stacking_contexts: usize,
}

fn structural(reason: String) -> Marker {
    Marker::new(MarkerKind::Structural, "parent", reason)
}

/// Root choice: an existing root is kept, otherwise the first parentless
/// node in capture order, otherwise the first node.
fn choose_root(doc: &Document, ordered: &[NodeId]) -> Option<NodeId> {
    if let Some(root) = doc.root.as_ref().filter(|r| doc.nodes.contains_key(r.as_str())) {
        return Some(root.clone());
    }
    ordered
        .iter()
        .find(|id| doc.get(id).is_some_and(|n| n.dom_parent.is_none()))
        .or_else(|| ordered.first())
        .cloned()
}

/// Rebuild parent/child links, stacking contexts and paint order
pub fn build(doc: &mut Document) -> BuildReport {
    let ordered: Vec<NodeId> = doc.nodes_in_order().into_iter().map(|n| n.id.clone()).collect();
    let mut report = BuildReport {
        nodes: ordered.len(),
        ..Default::default()
    };
    doc.hidden.clear();
    doc.stacking_contexts.clear();
    let Some(root) = choose_root(doc, &ordered) else {
        doc.root = None;
        return report;
    };
    doc.root = Some(root.clone());

    // effective parent of every non-root node
    let mut parent_of: HashMap<NodeId, NodeId> = HashMap::with_capacity(ordered.len());
    let mut repairs: Vec<(NodeId, Marker)> = Vec::new();
    for id in &ordered {
        if *id == root {
            continue;
        }
        let declared = doc.get(id).and_then(|n| n.dom_parent.clone());
        let parent = match declared {
            Some(p) if p != *id && doc.nodes.contains_key(&p) => p,
            Some(p) if p == *id => {
                repairs.push((id.clone(), structural("node lists itself as parent; attached to root".into())));
                root.clone()
            }
            Some(p) => {
                repairs.push((id.clone(), structural(format!("parent '{}' not in capture; attached to root", p))));
                root.clone()
            }
            None => {
                repairs.push((id.clone(), structural("no parent reference; attached to root".into())));
                root.clone()
            }
        };
        parent_of.insert(id.clone(), parent);
    }
    report.reattached = repairs.len();

    // every chain must reach the root; break cycles at the first repeat
    let mut resolved: HashSet<NodeId> = HashSet::with_capacity(ordered.len());
    resolved.insert(root.clone());
    for id in &ordered {
        let mut path: Vec<NodeId> = Vec::new();
        let mut on_path: HashSet<NodeId> = HashSet::new();
        let mut cur = id.clone();
        while !resolved.contains(&cur) {
            if !on_path.insert(cur.clone()) {
                warn!("parent cycle through '{}' broken by attaching it to the root", cur);
                parent_of.insert(cur.clone(), root.clone());
                repairs.push((cur.clone(), structural("parent cycle; attached to root".into())));
                report.cycles_broken += 1;
                break;
            }
            path.push(cur.clone());
            match parent_of.get(&cur) {
                Some(p) => cur = p.clone(),
                None => break,
            }
        }
        resolved.extend(path);
    }

    for node in doc.nodes.values_mut() {
        node.parent = None;
        node.children.clear();
        node.stacking_context = None;
    }
    for id in &ordered {
        let Some(parent) = parent_of.get(id).cloned() else { continue };
        let hidden = doc.get(id).is_some_and(|n| n.hidden);
        if hidden {
            doc.hidden.push(id.clone());
            continue;
        }
        if let Some(node) = doc.get_mut(id) {
            node.parent = Some(parent.clone());
        }
        if let Some(p) = doc.get_mut(&parent) {
            p.children.push(id.clone());
        }
    }
    report.hidden = doc.hidden.len();
    for (id, marker) in repairs {
        if let Some(node) = doc.get_mut(&id) {
            node.push_marker(marker);
        }
    }

    let roots = stacking::detect(doc);
    let contexts = paint_order::build_contexts(doc, &roots);
    let sequence = paint_order::global_sequence(&contexts);
    paint_order::order_children(doc, &sequence);
    report.stacking_contexts = contexts.len();
    doc.stacking_contexts = contexts;

    debug!(
        "hierarchy: {} nodes, {} reattached, {} cycles broken, {} hidden, {} stacking contexts",
        report.nodes, report.reattached, report.cycles_broken, report.hidden, report.stacking_contexts
    );
    report
}

/// Check the structural invariants of a built document. Returns one line
/// per violation; empty means the tree is sound.
pub fn check_integrity(doc: &Document) -> Vec<String> {
    let mut problems = Vec::new();
    let Some(root) = doc.root.as_deref() else {
        if !doc.is_empty() {
            problems.push("document has nodes but no root".to_string());
        }
        return problems;
    };
    let painted: HashSet<&str> = doc.walk().into_iter().map(|n| n.id.as_str()).collect();
    for node in doc.nodes_in_order() {
        if node.id == root || node.hidden {
            continue;
        }
        match node.parent.as_deref() {
            None if painted.contains(node.id.as_str()) => problems.push(format!("'{}' is painted without a parent", node.id)),
            None => {}
            Some(p) => match doc.get(p) {
                None => problems.push(format!("'{}' has missing parent '{}'", node.id, p)),
                Some(parent) => {
                    let count = parent.children.iter().filter(|c| **c == node.id).count();
                    if count != 1 {
                        problems.push(format!("'{}' appears {} times in '{}' children", node.id, count, p));
                    }
                }
            },
        }
        // `ancestors` stops on a repeat, so a chain whose top still has a
        // parent went round a cycle
        let chain = doc.ancestors(&node.id);
        let top = chain.last().unwrap_or(&node.id);
        if doc.get(top).is_some_and(|t| t.parent.is_some()) {
            problems.push(format!("'{}' sits on a parent cycle", node.id));
        }
    }
    for id in &painted {
        let Some(node) = doc.get(id) else { continue };
        match node.stacking_context.as_deref().and_then(|c| doc.stacking_context(c)) {
            Some(ctx) if ctx.members.iter().any(|m| m.as_str() == *id) => {}
            _ => problems.push(format!("'{}' is not a member of its stacking context", id)),
        }
    }
    problems
}
