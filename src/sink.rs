//! Scene sink interface
//!
//! The host canvas is an external collaborator. [`emit_document`] walks the
//! painted tree top-down (parents before children, siblings in paint order)
//! and issues one call per populated field. A failed call is counted and the
//! walk goes on; a node whose creation fails is skipped with its subtree.

use crate::ir::{Document, ImageRef, Matrix, Node, NodeId, Rect};
use crate::layout::{AutoLayout, ChildLayout, LayoutMode};
use crate::paint::{Background, Border, CornerRadii, Effects, VectorPath};
use crate::text::{TextContent, TextMetrics};
use crate::{Error, Result};
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashSet;

/// Per-node operations of a vector canvas
pub trait SceneSink {
    /// Whatever the host uses to address a created node
    type Handle: Clone;

    fn create_node(&mut self, node: &Node, parent: Option<&Self::Handle>) -> Result<Self::Handle>;

    /// Page-space rect plus the flattened world transform
    fn set_rect(&mut self, handle: &Self::Handle, rect: &Rect, transform: &Matrix) -> Result<()>;

    /// Background layers, first declared on top
    fn set_fills(&mut self, handle: &Self::Handle, background: &Background) -> Result<()>;

    fn set_strokes(&mut self, handle: &Self::Handle, border: &Border) -> Result<()>;

    fn set_effects(&mut self, handle: &Self::Handle, effects: &Effects) -> Result<()>;

    fn set_corner_radii(&mut self, handle: &Self::Handle, radii: &CornerRadii) -> Result<()>;

    /// `container` is set when the node lays out its own children
    fn set_auto_layout(
        &mut self,
        handle: &Self::Handle,
        container: Option<&AutoLayout>,
        child: &ChildLayout,
    ) -> Result<()>;

    fn set_text(&mut self, handle: &Self::Handle, text: &TextContent, metrics: Option<&TextMetrics>) -> Result<()>;

    /// `image` is `None` when only a placeholder can be drawn
    fn set_image(&mut self, handle: &Self::Handle, image: Option<&ImageRef>, needs_fallback: bool) -> Result<()>;

    fn set_vectors(&mut self, _handle: &Self::Handle, _paths: &[VectorPath]) -> Result<()> {
        Ok(())
    }
}

/// Outcome of one emission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitReport {
    pub created: usize,
    /// Nodes whose creation failed
    pub failed_nodes: usize,
    /// Descendants skipped because an ancestor could not be created
    pub skipped: usize,
    /// Property calls that failed on a created node
    pub failed_calls: usize,
}

impl EmitReport {
    pub fn is_clean(&self) -> bool {
        self.failed_nodes == 0 && self.skipped == 0 && self.failed_calls == 0
    }
}

fn subtree_size(doc: &Document, id: &str) -> usize {
    let mut count = 0;
    let mut stack = vec![id];
    let mut seen = HashSet::new();
    while let Some(cur) = stack.pop() {
        if !seen.insert(cur) {
            continue;
        }
        count += 1;
        if let Some(node) = doc.get(cur) {
            stack.extend(node.children.iter().map(String::as_str));
        }
    }
    count
}

fn apply_fields<S: SceneSink>(sink: &mut S, handle: &S::Handle, node: &Node) -> usize {
    let mut failures = 0;
    let mut check = |res: Result<()>, what: &str| {
        if let Err(e) = res {
            warn!("sink rejected {} for '{}': {}", what, node.id, e);
            failures += 1;
        }
    };
    check(sink.set_rect(handle, &node.rect, &node.transform), "rect");
    if let Some(bg) = node.background.as_ref().filter(|b| !b.is_empty()) {
        check(sink.set_fills(handle, bg), "fills");
    }
    if let Some(border) = &node.border {
        if border.has_visible_side() {
            check(sink.set_strokes(handle, border), "strokes");
        }
        if !border.radii.is_zero() {
            check(sink.set_corner_radii(handle, &border.radii), "corner radii");
        }
    }
    if let Some(effects) = &node.effects {
        check(sink.set_effects(handle, effects), "effects");
    }
    let layout = &node.layout;
    if layout.auto_layout.is_some() || layout.child.absolute || layout.child.grow {
        check(
            sink.set_auto_layout(handle, layout.auto_layout.as_ref(), &layout.child),
            "auto layout",
        );
    }
    if let Some(text) = &node.text {
        check(sink.set_text(handle, text, node.text_metrics.as_ref()), "text");
    }
    if node.image.is_some() || node.needs_fallback {
        check(sink.set_image(handle, node.image.as_ref(), node.needs_fallback), "image");
    }
    if !node.vectors.is_empty() {
        check(sink.set_vectors(handle, &node.vectors), "vectors");
    }
    failures
}

/// Drive `sink` over the painted tree of `doc`
pub fn emit_document<S: SceneSink>(doc: &Document, sink: &mut S) -> EmitReport {
    let mut report = EmitReport::default();
    let Some(root) = doc.root_node() else {
        return report;
    };
    let mut stack: Vec<(&str, Option<S::Handle>)> = vec![(root.id.as_str(), None)];
    let mut visited: HashSet<&str> = HashSet::new();
    while let Some((id, parent)) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let Some(node) = doc.get(id) else { continue };
        let handle = match sink.create_node(node, parent.as_ref()) {
            Ok(h) => h,
            Err(e) => {
                let lost = subtree_size(doc, id) - 1;
                warn!("sink could not create '{}' ({}); skipping {} descendants", id, e, lost);
                report.failed_nodes += 1;
                report.skipped += lost;
                continue;
            }
        };
        report.created += 1;
        report.failed_calls += apply_fields(sink, &handle, node);
        // reversed so the earliest painted child is created first
        for child in node.children.iter().rev() {
            stack.push((child.as_str(), Some(handle.clone())));
        }
    }
    debug!(
        "emitted {} nodes ({} failed, {} skipped, {} failed calls)",
        report.created, report.failed_nodes, report.skipped, report.failed_calls
    );
    report
}

/// One recorded sink call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "camelCase")]
pub enum SinkCall {
    Create { id: NodeId, parent: Option<NodeId> },
    Rect { id: NodeId, rect: Rect },
    Fills { id: NodeId, layers: usize },
    Strokes { id: NodeId, uniform: bool },
    Effects { id: NodeId, opacity: f32 },
    CornerRadii { id: NodeId, uniform: bool },
    AutoLayout { id: NodeId, mode: Option<LayoutMode> },
    Text { id: NodeId, text: String },
    Image { id: NodeId, asset_id: Option<String>, fallback: bool },
    Vectors { id: NodeId, paths: usize },
}

/// Sink that records every call; used for dry runs and tests
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub calls: Vec<SinkCall>,
    /// Node ids whose creation is refused
    pub refuse: HashSet<NodeId>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids passed to `create_node`, in call order
    pub fn created(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SinkCall::Create { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl SceneSink for RecordingSink {
    type Handle = NodeId;

    fn create_node(&mut self, node: &Node, parent: Option<&NodeId>) -> Result<NodeId> {
        if self.refuse.contains(&node.id) {
            return Err(Error::Sink(format!("refused '{}'", node.id)));
        }
        self.calls.push(SinkCall::Create {
            id: node.id.clone(),
            parent: parent.cloned(),
        });
        Ok(node.id.clone())
    }

    fn set_rect(&mut self, handle: &NodeId, rect: &Rect, _transform: &Matrix) -> Result<()> {
        self.calls.push(SinkCall::Rect {
            id: handle.clone(),
            rect: *rect,
        });
        Ok(())
    }

    fn set_fills(&mut self, handle: &NodeId, background: &Background) -> Result<()> {
        self.calls.push(SinkCall::Fills {
            id: handle.clone(),
            layers: background.layers.len(),
        });
        Ok(())
    }

    fn set_strokes(&mut self, handle: &NodeId, border: &Border) -> Result<()> {
        self.calls.push(SinkCall::Strokes {
            id: handle.clone(),
            uniform: border.is_uniform(),
        });
        Ok(())
    }

    fn set_effects(&mut self, handle: &NodeId, effects: &Effects) -> Result<()> {
        self.calls.push(SinkCall::Effects {
            id: handle.clone(),
            opacity: effects.opacity,
        });
        Ok(())
    }

    fn set_corner_radii(&mut self, handle: &NodeId, radii: &CornerRadii) -> Result<()> {
        self.calls.push(SinkCall::CornerRadii {
            id: handle.clone(),
            uniform: radii.is_uniform(),
        });
        Ok(())
    }

    fn set_auto_layout(&mut self, handle: &NodeId, container: Option<&AutoLayout>, _child: &ChildLayout) -> Result<()> {
        self.calls.push(SinkCall::AutoLayout {
            id: handle.clone(),
            mode: container.map(|c| c.mode),
        });
        Ok(())
    }

    fn set_text(&mut self, handle: &NodeId, text: &TextContent, _metrics: Option<&TextMetrics>) -> Result<()> {
        self.calls.push(SinkCall::Text {
            id: handle.clone(),
            text: text.text.clone(),
        });
        Ok(())
    }

    fn set_image(&mut self, handle: &NodeId, image: Option<&ImageRef>, needs_fallback: bool) -> Result<()> {
        self.calls.push(SinkCall::Image {
            id: handle.clone(),
            asset_id: image.map(|i| i.asset_id.clone()),
            fallback: needs_fallback,
        });
        Ok(())
    }

    fn set_vectors(&mut self, handle: &NodeId, paths: &[VectorPath]) -> Result<()> {
        self.calls.push(SinkCall::Vectors {
            id: handle.clone(),
            paths: paths.len(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::NodeKind;
    use crate::Viewport;

    fn doc() -> Document {
        let mut d = Document::new("https://example.com", "t", Viewport::default());
        d.insert(Node::new("root", "body", NodeKind::Container, Rect::default()));
        d.insert(Node::new("a", "div", NodeKind::Container, Rect::default()).with_dom_parent("root").with_order(1));
        d.insert(Node::new("a1", "span", NodeKind::Text, Rect::default()).with_dom_parent("a").with_order(2));
        let mut b = Node::new("b", "img", NodeKind::Image, Rect::default()).with_dom_parent("root").with_order(3);
        b.needs_fallback = true;
        d.insert(b);
        crate::hierarchy::build(&mut d);
        d
    }

    #[test]
    fn parents_are_created_before_children_in_paint_order() {
        let d = doc();
        let mut sink = RecordingSink::new();
        let report = emit_document(&d, &mut sink);
        assert!(report.is_clean());
        assert_eq!(sink.created(), vec!["root", "a", "a1", "b"]);
        assert!(sink.calls.contains(&SinkCall::Create {
            id: "a1".into(),
            parent: Some("a".into())
        }));
        assert!(sink.calls.contains(&SinkCall::Image {
            id: "b".into(),
            asset_id: None,
            fallback: true
        }));
    }

    #[test]
    fn refused_node_skips_its_subtree_only() {
        let d = doc();
        let mut sink = RecordingSink::new();
        sink.refuse.insert("a".into());
        let report = emit_document(&d, &mut sink);
        assert_eq!(report.failed_nodes, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(sink.created(), vec!["root", "b"]);
    }

    #[test]
    fn empty_document_emits_nothing() {
        let d = Document::new("u", "t", Viewport::default());
        let mut sink = RecordingSink::new();
        assert_eq!(emit_document(&d, &mut sink), EmitReport::default());
        assert!(sink.calls.is_empty());
    }
}
