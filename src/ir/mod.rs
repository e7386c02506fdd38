//! Intermediate representation shared by the producer and consumer stages
//!
//! A [`Document`] owns every [`Node`] in an id-keyed arena. Parent and child
//! links are plain ids into that arena, so structural repair is a lookup and
//! a rewrite rather than a pointer-graph mutation.

mod geometry;

pub use geometry::{Matrix, Rect};

use crate::layout::{AutoLayout, ChildLayout, LayoutStyle};
use crate::paint::{Background, Border, Clip, Effects, Rgba, VectorPath};
use crate::text::{TextContent, TextMetrics};
use crate::Viewport;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Opaque node identity (taken from the capture)
pub type NodeId = String;

/// Coarse classification used by the sink to pick a node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Container,
    Text,
    Image,
    Vector,
    Canvas,
    Video,
    Unknown,
}

/// What a marker records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerKind {
    /// A decoder could only partially interpret a value
    Unsupported,
    /// A style value could not be parsed and was kept as its raw string
    StyleFallback,
    /// The layout engine substituted an approximation
    LayoutFallback,
    /// The asset owned by this node could not be delivered
    AssetFailure,
    /// The builder had to repair a parent reference
    Structural,
}

/// Machine-readable record of anything the conversion could not carry over
/// faithfully. A conversion never drops content without one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub kind: MarkerKind,
    pub property: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Marker {
    pub fn new(kind: MarkerKind, property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            property: property.into(),
            reason: reason.into(),
            raw: None,
        }
    }

    pub fn unsupported(property: impl Into<String>, raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: MarkerKind::Unsupported,
            property: property.into(),
            reason: reason.into(),
            raw: Some(raw.into()),
        }
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }
}

/// Per-node layout record: the resolved style bundle plus what the layout
/// mapping engine derived from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub style: LayoutStyle,
    /// Present when the node maps to an auto-layout container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_layout: Option<AutoLayout>,
    /// How this node behaves as a child of its parent's layout
    #[serde(default)]
    pub child: ChildLayout,
}

/// Description of a streamed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRef {
    pub total_size: usize,
    pub total_chunks: u32,
    pub chunk_size: usize,
    pub is_streamed: bool,
}

impl ChunkRef {
    pub fn for_size(total_size: usize, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let total_chunks = total_size.div_ceil(chunk_size).max(1) as u32;
        Self {
            total_size,
            total_chunks,
            chunk_size,
            is_streamed: true,
        }
    }
}

/// Binary payload of an image, either embedded or delivered out-of-band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "delivery", rename_all = "camelCase")]
pub enum ImagePayload {
    Inline { bytes: Vec<u8> },
    Chunked(ChunkRef),
}

/// A node's reference to an image asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub asset_id: String,
    pub payload: ImagePayload,
}

impl ImageRef {
    pub fn is_streamed(&self) -> bool {
        matches!(self.payload, ImagePayload::Chunked(_))
    }
}

/// Delivery state of an image asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum AssetState {
    /// Chunks are still expected
    Pending,
    /// Bytes are complete and usable
    Ready,
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
    Svg,
    Unknown,
}

/// Image asset table entry (metadata only; bytes live on the node or in the
/// chunk stream)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    pub id: String,
    pub source: String,
    pub format: ImageFormat,
    pub size: usize,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    pub node_ids: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<ChunkRef>,
    pub state: AssetState,
}

impl ImageAsset {
    /// Streamed assets are only usable once every chunk has been reassembled.
    pub fn is_usable(&self) -> bool {
        self.state == AssetState::Ready
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontAsset {
    pub family: String,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub src: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvgAsset {
    pub id: String,
    pub source: String,
    pub markup: String,
    pub node_ids: Vec<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assets {
    #[serde(default)]
    pub images: Vec<ImageAsset>,
    #[serde(default)]
    pub fonts: Vec<FontAsset>,
    #[serde(default)]
    pub svgs: Vec<SvgAsset>,
}

impl Assets {
    pub fn image(&self, id: &str) -> Option<&ImageAsset> {
        self.images.iter().find(|a| a.id == id)
    }

    pub fn image_mut(&mut self, id: &str) -> Option<&mut ImageAsset> {
        self.images.iter_mut().find(|a| a.id == id)
    }
}

/// Design tokens lifted from custom properties on the root element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignTokens {
    #[serde(default)]
    pub colors: BTreeMap<String, Rgba>,
    #[serde(default)]
    pub lengths: BTreeMap<String, f32>,
    #[serde(default)]
    pub other: BTreeMap<String, String>,
}

impl DesignTokens {
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty() && self.lengths.is_empty() && self.other.is_empty()
    }
}

/// Why a node establishes a stacking context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StackingReason {
    Root,
    PositionedWithZIndex,
    FixedOrSticky,
    Opacity,
    Transform,
    Filter,
    ClipPath,
    Mask,
    MixBlendMode,
    Isolation,
    BackdropFilter,
    FlexOrGridItemWithZIndex,
}

/// A group of nodes painted together as one unit relative to their siblings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackingContext {
    pub id: String,
    /// Node establishing the context
    pub root: NodeId,
    #[serde(default)]
    pub parent: Option<String>,
    pub z_index: i32,
    pub reason: StackingReason,
    /// Nodes painted inside this context, in paint order. Roots of child
    /// contexts are members (they paint as a unit here).
    pub members: Vec<NodeId>,
}

/// The unit of conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub tag: String,
    #[serde(default)]
    pub role: Option<String>,
    pub kind: NodeKind,
    pub rect: Rect,
    /// Flattened world transform
    #[serde(default)]
    pub transform: Matrix,
    /// `None` means `z-index: auto`
    #[serde(default)]
    pub z_index: Option<i32>,
    /// Stacking context this node paints in
    #[serde(default)]
    pub stacking_context: Option<String>,
    /// Position in capture (document) order
    pub order: usize,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects: Option<Effects>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip: Option<Clip>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_metrics: Option<TextMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vectors: Vec<VectorPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svg_asset: Option<String>,
    /// The sink should render a placeholder for this node's asset
    #[serde(default)]
    pub needs_fallback: bool,
    /// `display: none`; kept for traceability but never painted
    #[serde(default)]
    pub hidden: bool,
    /// Parent as declared by the capture
    #[serde(default)]
    pub dom_parent: Option<NodeId>,
    /// Parent in the reconstructed tree (lookup only)
    #[serde(default)]
    pub parent: Option<NodeId>,
    /// Children in paint order, earliest paints first
    #[serde(default)]
    pub children: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<Marker>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, tag: impl Into<String>, kind: NodeKind, rect: Rect) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            role: None,
            kind,
            rect,
            transform: Matrix::IDENTITY,
            z_index: None,
            stacking_context: None,
            order: 0,
            layout: Layout::default(),
            background: None,
            border: None,
            effects: None,
            clip: None,
            text: None,
            text_metrics: None,
            image: None,
            vectors: Vec::new(),
            svg_asset: None,
            needs_fallback: false,
            hidden: false,
            dom_parent: None,
            parent: None,
            children: Vec::new(),
            markers: Vec::new(),
        }
    }

    pub fn with_dom_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.dom_parent = Some(parent.into());
        self
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    pub fn push_marker(&mut self, marker: Marker) {
        if !self.markers.contains(&marker) {
            self.markers.push(marker);
        }
    }

    pub fn markers_of(&self, kind: MarkerKind) -> impl Iterator<Item = &Marker> {
        self.markers.iter().filter(move |m| m.kind == kind)
    }
}

/// Root aggregate. Owns all nodes exclusively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub url: String,
    pub title: String,
    pub viewport: Viewport,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    #[serde(with = "node_table")]
    pub nodes: HashMap<NodeId, Node>,
    #[serde(default)]
    pub root: Option<NodeId>,
    #[serde(default)]
    pub assets: Assets,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<DesignTokens>,
    #[serde(default)]
    pub stacking_contexts: Vec<StackingContext>,
    /// Nodes detached from the painted tree (`display: none` subtrees)
    #[serde(default)]
    pub hidden: Vec<NodeId>,
}

impl Document {
    pub fn new(url: impl Into<String>, title: impl Into<String>, viewport: Viewport) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            viewport,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert a node, replacing any previous node with the same id
    pub fn insert(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.id.clone(), node)
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn root_node(&self) -> Option<&Node> {
        self.root.as_deref().and_then(|id| self.nodes.get(id))
    }

    pub fn children_of<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |c| self.nodes.get(c))
    }

    pub fn stacking_context(&self, id: &str) -> Option<&StackingContext> {
        self.stacking_contexts.iter().find(|c| c.id == id)
    }

    /// Nodes sorted by capture order
    pub fn nodes_in_order(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        nodes
    }

    /// Ancestors of `id` following reconstructed parent links, nearest first.
    /// Stops on a repeated id, so a corrupted table cannot loop forever.
    pub fn ancestors(&self, id: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(id.to_string());
        let mut cur = self.nodes.get(id).and_then(|n| n.parent.clone());
        while let Some(p) = cur {
            if !seen.insert(p.clone()) {
                break;
            }
            cur = self.nodes.get(&p).and_then(|n| n.parent.clone());
            out.push(p);
        }
        out
    }

    /// Pre-order walk of the painted tree starting at the root
    pub fn walk(&self) -> Vec<&Node> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut seen = HashSet::new();
        let mut stack: Vec<&str> = self.root.as_deref().into_iter().collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(id) {
                out.push(node);
                for child in node.children.iter().rev() {
                    stack.push(child.as_str());
                }
            }
        }
        out
    }

    /// Every marker in the document with the node it belongs to
    pub fn markers(&self) -> Vec<(&str, &Marker)> {
        let mut out = Vec::new();
        for node in self.nodes_in_order() {
            for m in &node.markers {
                out.push((node.id.as_str(), m));
            }
        }
        out
    }
}

/// Serialises the node arena as a plain array (capture order) and reads it
/// back into the id-keyed map.
mod node_table {
    use super::{Node, NodeId};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    pub fn serialize<S>(nodes: &HashMap<NodeId, Node>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut list: Vec<&Node> = nodes.values().collect();
        list.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<NodeId, Node>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let list = Vec::<Node>::deserialize(deserializer)?;
        Ok(list.into_iter().map(|n| (n.id.clone(), n)).collect())
    }
}
