//! Stacking context detection
//!
//! A node establishes a stacking context if it is the root, is positioned
//! with a z-index, is fixed or sticky, or carries an effect that forces
//! compositing (opacity below one, a transform, filters, clipping, masking,
//! blending, isolation). Flex and grid items with a z-index also qualify
//! without being positioned.

use crate::ir::{Document, Node, StackingReason};
use crate::layout::Position;
use crate::paint::BlendMode;

/// Why `node` establishes a stacking context, if it does.
///
/// `parent` is the node's parent in the reconstructed tree.
pub fn establishes_context(node: &Node, parent: Option<&Node>, is_root: bool) -> Option<StackingReason> {
    if is_root {
        return Some(StackingReason::Root);
    }
    let style = &node.layout.style;
    if matches!(style.position, Position::Fixed | Position::Sticky) {
        return Some(StackingReason::FixedOrSticky);
    }
    if node.z_index.is_some() {
        let in_container = parent.is_some_and(|p| p.layout.style.is_layout_container());
        return Some(if !style.position.is_positioned() && in_container {
            StackingReason::FlexOrGridItemWithZIndex
        } else {
            StackingReason::PositionedWithZIndex
        });
    }
    if let Some(effects) = &node.effects {
        if effects.opacity < 1.0 {
            return Some(StackingReason::Opacity);
        }
    }
    // world transforms are inherited unchanged unless the node has its own
    let parent_transform = parent.map(|p| p.transform).unwrap_or_default();
    if node.transform != parent_transform {
        return Some(StackingReason::Transform);
    }
    if let Some(effects) = &node.effects {
        if !effects.filters.is_empty() {
            return Some(StackingReason::Filter);
        }
    }
    if let Some(clip) = &node.clip {
        if clip.shape.is_some() {
            return Some(StackingReason::ClipPath);
        }
        if clip.mask.is_some() {
            return Some(StackingReason::Mask);
        }
    }
    if let Some(effects) = &node.effects {
        if effects.blend_mode != BlendMode::Normal {
            return Some(StackingReason::MixBlendMode);
        }
    }
    if style.isolation {
        return Some(StackingReason::Isolation);
    }
    if let Some(effects) = &node.effects {
        if !effects.backdrop_filters.is_empty() {
            return Some(StackingReason::BackdropFilter);
        }
    }
    None
}

/// Stacking context id for the context rooted at `node`
pub fn context_id(node: &str) -> String {
    format!("sc:{}", node)
}

/// Every painted node that establishes a context, with its reason
pub(super) fn detect(doc: &Document) -> Vec<(String, StackingReason)> {
    let Some(root) = doc.root.as_deref() else {
        return Vec::new();
    };
    doc.walk()
        .into_iter()
        .filter_map(|node| {
            let parent = node.parent.as_deref().and_then(|p| doc.get(p));
            establishes_context(node, parent, node.id == root).map(|reason| (node.id.clone(), reason))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Matrix, NodeKind, Rect};
    use crate::layout::{Display, LayoutStyle};
    use crate::paint::Effects;

    fn node(id: &str) -> Node {
        Node::new(id, "div", NodeKind::Container, Rect::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn plain_node_is_not_a_context() {
        let parent = node("p");
        assert_eq!(establishes_context(&node("a"), Some(&parent), false), None);
        assert_eq!(establishes_context(&node("a"), None, true), Some(StackingReason::Root));
    }

    #[test]
    fn positioned_with_z_index() {
        let mut n = node("a");
        n.layout.style.position = Position::Relative;
        assert_eq!(establishes_context(&n, None, false), None);
        n.z_index = Some(0);
        assert_eq!(establishes_context(&n, None, false), Some(StackingReason::PositionedWithZIndex));
    }

    #[test]
    fn flex_item_with_z_index() {
        let mut parent = node("p");
        parent.layout.style = LayoutStyle {
            display: Display::Flex,
            ..Default::default()
        };
        let mut n = node("a");
        n.z_index = Some(2);
        assert_eq!(
            establishes_context(&n, Some(&parent), false),
            Some(StackingReason::FlexOrGridItemWithZIndex)
        );
    }

    #[test]
    fn effects_create_contexts() {
        let parent = node("p");
        let mut n = node("a");
        n.effects = Some(Effects {
            opacity: 0.5,
            ..Default::default()
        });
        assert_eq!(establishes_context(&n, Some(&parent), false), Some(StackingReason::Opacity));

        let mut n = node("a");
        n.transform = Matrix::translate(5.0, 0.0);
        assert_eq!(establishes_context(&n, Some(&parent), false), Some(StackingReason::Transform));

        // inherited transform alone is not a context
        let mut moved = node("p");
        moved.transform = Matrix::translate(5.0, 0.0);
        assert_eq!(establishes_context(&n, Some(&moved), false), None);

        let mut n = node("a");
        n.layout.style.position = Position::Sticky;
        assert_eq!(establishes_context(&n, Some(&parent), false), Some(StackingReason::FixedOrSticky));

        let mut n = node("a");
        n.layout.style.isolation = true;
        assert_eq!(establishes_context(&n, Some(&parent), false), Some(StackingReason::Isolation));
    }
}
