//! Snapshot to IR pipeline
//!
//! [`Converter::normalize`] is the synchronous part: cascade, layout mapping,
//! paint decoding, typography and the hierarchy build, all pure transforms
//! over the capture. [`Converter::convert`] adds the asset stage, the only
//! step that suspends.

use crate::assets::{collect_requests, AssetProcessor, AssetReport, Fetcher};
use crate::hierarchy::{self, BuildReport};
use crate::ir::{DesignTokens, Document, Marker, MarkerKind, Matrix, Node, NodeId, NodeKind};
use crate::layout::{fallback_markers, map_child, map_container, Display, LayoutStyle};
use crate::paint::background::{decode_background, BackgroundInput};
use crate::paint::border::{decode_border, BorderInput, SideInput};
use crate::paint::clip::{parse_clip_path, parse_mask_image};
use crate::paint::path::decode_vector;
use crate::paint::transform::{parse_origin, parse_transform};
use crate::paint::{decode_effects, Clip, EffectsInput, Rgba};
use crate::snapshot::{PageSnapshot, RawElement};
use crate::style::{CascadeResolver, ResolvedStyle, StyleValue};
use crate::text::{resolve_text, FontBook};
use crate::{ConvertConfig, Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Counts reported at the end of a conversion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionSummary {
    pub nodes: usize,
    pub hidden: usize,
    pub text_nodes: usize,
    pub stacking_contexts: usize,
    /// Layout fallbacks (approximated auto-layout)
    pub fallbacks: usize,
    /// Unsupported or unparseable style values
    pub unsupported: usize,
    pub structural: usize,
    pub failed_assets: usize,
}

impl ConversionSummary {
    pub fn from_document(doc: &Document) -> Self {
        let mut summary = Self {
            nodes: doc.len(),
            hidden: doc.hidden.len(),
            stacking_contexts: doc.stacking_contexts.len(),
            ..Default::default()
        };
        for node in doc.nodes.values() {
            if node.text.is_some() {
                summary.text_nodes += 1;
            }
            for m in &node.markers {
                match m.kind {
                    MarkerKind::LayoutFallback => summary.fallbacks += 1,
                    MarkerKind::Unsupported | MarkerKind::StyleFallback => summary.unsupported += 1,
                    MarkerKind::Structural => summary.structural += 1,
                    MarkerKind::AssetFailure => summary.failed_assets += 1,
                }
            }
        }
        summary
    }
}

/// Output of the synchronous stage
#[derive(Debug, Clone)]
pub struct Normalized {
    pub document: Document,
    /// Content image source per node (`<img>` src, element screenshot or
    /// inline SVG markup as a `data:` URI)
    pub content: HashMap<NodeId, String>,
    pub build: BuildReport,
}

/// A finished conversion
#[derive(Debug, Clone)]
pub struct Conversion {
    pub document: Document,
    /// Bytes of every streamed asset, keyed by asset id
    pub payloads: HashMap<String, Vec<u8>>,
    pub reports: Vec<AssetReport>,
    pub summary: ConversionSummary,
}

/// What a child needs from its already processed parent
struct ParentState {
    world: Matrix,
    layout: LayoutStyle,
    /// Inside a `display: none` subtree
    suppressed: bool,
}

/// Indices of `elements` ordered so every parent comes before its children.
/// A parent that is missing or closes a cycle is treated as absent.
fn parent_first(elements: &[RawElement], index: &HashMap<&str, usize>) -> Vec<usize> {
    let mut done = vec![false; elements.len()];
    let mut out = Vec::with_capacity(elements.len());
    for start in 0..elements.len() {
        let mut chain = Vec::new();
        let mut on_chain = HashSet::new();
        let mut cur = Some(start);
        while let Some(i) = cur {
            if done[i] || !on_chain.insert(i) {
                break;
            }
            chain.push(i);
            cur = elements[i].parent_id.as_deref().and_then(|p| index.get(p).copied());
        }
        for i in chain.into_iter().rev() {
            done[i] = true;
            out.push(i);
        }
    }
    out
}

fn classify(el: &RawElement, has_children: bool) -> NodeKind {
    let tag = el.tag.to_ascii_lowercase();
    match tag.as_str() {
        "" => NodeKind::Unknown,
        "img" | "picture" | "image" => NodeKind::Image,
        "svg" | "path" => NodeKind::Vector,
        "canvas" => NodeKind::Canvas,
        "video" => NodeKind::Video,
        _ if !el.paths.is_empty() || el.svg.is_some() => NodeKind::Vector,
        _ if el.image.is_some() => NodeKind::Image,
        _ if !has_children && el.text.as_deref().is_some_and(|t| !t.trim().is_empty()) => NodeKind::Text,
        _ => NodeKind::Container,
    }
}

/// Where the bytes of a content image come from, if the node has one
fn content_source(el: &RawElement, kind: NodeKind) -> Option<String> {
    let src = el.image.as_ref().map(|i| i.src.trim()).filter(|s| !s.is_empty());
    let screenshot = || {
        el.screenshot
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|b64| format!("data:image/png;base64,{}", b64))
    };
    match kind {
        NodeKind::Image => src.map(str::to_string).or_else(screenshot),
        NodeKind::Canvas | NodeKind::Video => screenshot().or_else(|| src.map(str::to_string)),
        NodeKind::Vector if el.paths.is_empty() => el
            .svg
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .map(|m| format!("data:image/svg+xml;base64,{}", STANDARD.encode(m))),
        _ => None,
    }
}

fn current_color(style: &ResolvedStyle) -> Rgba {
    style
        .value("color")
        .and_then(StyleValue::as_color)
        .or_else(|| Rgba::parse(style.raw("color")))
        .unwrap_or(Rgba::BLACK)
}

/// Custom properties declared on the root element
fn design_tokens(style: &ResolvedStyle) -> DesignTokens {
    let mut tokens = DesignTokens::default();
    for (name, prop) in style.custom_properties() {
        let key = name.trim_start_matches("--").to_string();
        let raw = prop.raw.trim();
        if let Some(color) = prop.value.as_color().or_else(|| Rgba::parse(raw)) {
            tokens.colors.insert(key, color);
        } else if let Some(len) = prop.value.as_length() {
            tokens.lengths.insert(key, len);
        } else {
            tokens.other.insert(key, raw.to_string());
        }
    }
    tokens
}

/// Drives one snapshot through the pipeline
pub struct Converter {
    config: ConvertConfig,
    fetcher: Option<Arc<dyn Fetcher>>,
    cascade: CascadeResolver,
}

impl Converter {
    pub fn new(config: ConvertConfig) -> Self {
        Self {
            config,
            fetcher: None,
            cascade: CascadeResolver::new(),
        }
    }

    /// Use `fetcher` for remote assets instead of the default HTTP client
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Run every synchronous stage and build the tree
    pub fn normalize(&self, snapshot: &PageSnapshot) -> Result<Normalized> {
        if let Some(el) = snapshot.elements.iter().find(|e| e.id.trim().is_empty()) {
            return Err(Error::InvalidSnapshot(format!("element '{}' has an empty id", el.tag)));
        }
        let styles = self.cascade.resolve(&snapshot.elements);
        let fonts = FontBook::new(&self.config.fonts, &snapshot.fonts);
        let default_style = ResolvedStyle::default();

        let mut index: HashMap<&str, usize> = HashMap::with_capacity(snapshot.elements.len());
        for (i, el) in snapshot.elements.iter().enumerate() {
            index.insert(el.id.as_str(), i);
        }
        let with_children: HashSet<&str> = snapshot
            .elements
            .iter()
            .filter_map(|e| e.parent_id.as_deref())
            .collect();

        // children taking part in their parent's flow
        let mut in_flow: HashMap<&str, usize> = HashMap::new();
        for el in &snapshot.elements {
            let Some(parent) = el.parent_id.as_deref() else { continue };
            let style = styles.get(&el.id).unwrap_or(&default_style);
            let out_of_flow =
                style.keyword("display") == "none" || matches!(style.keyword("position").as_str(), "absolute" | "fixed");
            if !out_of_flow {
                *in_flow.entry(parent).or_default() += 1;
            }
        }

        let mut doc = Document::new(snapshot.url.clone(), snapshot.title.clone(), snapshot.viewport);
        doc.meta = snapshot.meta.clone();
        doc.assets.fonts = snapshot.fonts.clone();

        let mut states: HashMap<usize, ParentState> = HashMap::with_capacity(snapshot.elements.len());
        let mut content = HashMap::new();
        for i in parent_first(&snapshot.elements, &index) {
            let el = &snapshot.elements[i];
            let style = styles.get(&el.id).unwrap_or(&default_style);
            let parent = el
                .parent_id
                .as_deref()
                .and_then(|p| index.get(p))
                .and_then(|p| states.get(p));
            let kind = classify(el, with_children.contains(el.id.as_str()));
            let items = in_flow.get(el.id.as_str()).copied().unwrap_or(0);
            let (mut node, state) = self.build_node(el, i, kind, style, parent, items, &fonts);
            for m in styles.markers(&el.id) {
                node.push_marker(m.clone());
            }
            if !state.suppressed {
                if let Some(src) = content_source(el, kind) {
                    content.insert(node.id.clone(), src);
                }
            }
            states.insert(i, state);
            doc.insert(node);
        }

        if let Some(root) = snapshot.elements.iter().find(|e| e.parent_id.is_none()) {
            doc.root = Some(root.id.clone());
            let tokens = design_tokens(styles.get(&root.id).unwrap_or(&default_style));
            if !tokens.is_empty() {
                debug!(
                    "design tokens: {} colors, {} lengths, {} other",
                    tokens.colors.len(),
                    tokens.lengths.len(),
                    tokens.other.len()
                );
                doc.tokens = Some(tokens);
            }
        }

        let build = hierarchy::build(&mut doc);
        debug!(
            "normalized {} elements of {} ({} content images)",
            doc.len(),
            doc.url,
            content.len()
        );
        Ok(Normalized {
            document: doc,
            content,
            build,
        })
    }

    fn build_node(
        &self,
        el: &RawElement,
        order: usize,
        kind: NodeKind,
        style: &ResolvedStyle,
        parent: Option<&ParentState>,
        in_flow_items: usize,
        fonts: &FontBook,
    ) -> (Node, ParentState) {
        let mut markers: Vec<Marker> = Vec::new();
        let mut node = Node::new(el.id.clone(), el.tag.clone(), kind, el.rect).with_order(order);
        node.dom_parent = el.parent_id.clone();
        node.role = el.attr("role").map(str::to_string);

        let layout = LayoutStyle::from_resolved(style).drain_into(&mut markers);
        let parent_layout = parent.map(|p| &p.layout);
        let auto_layout = map_container(&layout, in_flow_items);
        let child = map_child(&layout, parent_layout);
        markers.extend(fallback_markers(auto_layout.as_ref(), &child));
        let is_item = parent_layout.is_some_and(LayoutStyle::is_layout_container);
        // z-index only applies to positioned boxes and flex/grid items
        node.z_index = layout
            .z_index
            .filter(|_| layout.position.is_positioned() || is_item);

        node.hidden = layout.display == Display::None;
        let suppressed = node.hidden || parent.is_some_and(|p| p.suppressed);

        let size = (el.rect.width, el.rect.height);
        let color = current_color(style);

        node.background = decode_background(BackgroundInput {
            color: style.raw("background-color"),
            image: style.raw("background-image"),
            size: style.raw("background-size"),
            position: style.raw("background-position"),
            repeat: style.raw("background-repeat"),
            blend_mode: style.raw("background-blend-mode"),
            clip: style.raw("background-clip"),
            box_size: size,
        })
        .drain_into(&mut markers);

        let side = |name: &str| SideInput {
            width: style.raw(&format!("border-{}-width", name)),
            style: style.raw(&format!("border-{}-style", name)),
            color: style.raw(&format!("border-{}-color", name)),
        };
        node.border = decode_border(BorderInput {
            top: side("top"),
            right: side("right"),
            bottom: side("bottom"),
            left: side("left"),
            radii: [
                style.raw("border-top-left-radius"),
                style.raw("border-top-right-radius"),
                style.raw("border-bottom-right-radius"),
                style.raw("border-bottom-left-radius"),
            ],
            box_size: size,
            current_color: color,
        })
        .drain_into(&mut markers);

        node.effects = decode_effects(EffectsInput {
            box_shadow: style.raw("box-shadow"),
            filter: style.raw("filter"),
            backdrop_filter: style.raw("backdrop-filter"),
            opacity: style.raw("opacity"),
            mix_blend_mode: style.raw("mix-blend-mode"),
            current_color: color,
        })
        .drain_into(&mut markers);

        let clip = Clip {
            shape: parse_clip_path(style.raw("clip-path"), size).drain_into(&mut markers),
            mask: parse_mask_image(style.raw("mask-image"), style.raw("mask-mode"), size).drain_into(&mut markers),
        };
        node.clip = (!clip.is_empty()).then_some(clip);

        // box-local transform moved to page space, then composed with the
        // parent's world matrix; an untransformed node shares its parent's
        let origin = parse_origin(style.raw("transform-origin"), size);
        let local = parse_transform(style.raw("transform"), origin, size).drain_into(&mut markers);
        let parent_world = parent.map(|p| p.world).unwrap_or(Matrix::IDENTITY);
        node.transform = if local.is_identity() {
            parent_world
        } else {
            let page = Matrix::translate(el.rect.x, el.rect.y)
                .multiply(&local)
                .multiply(&Matrix::translate(-el.rect.x, -el.rect.y));
            parent_world.multiply(&page)
        };

        for path in &el.paths {
            node.vectors.push(decode_vector(path, color).drain_into(&mut markers));
        }

        let carries_text = matches!(kind, NodeKind::Text | NodeKind::Container | NodeKind::Unknown);
        if carries_text && !suppressed {
            if let Some((text, metrics)) =
                resolve_text(el, style, &el.rect, node.background.as_ref(), fonts).drain_into(&mut markers)
            {
                node.text = Some(text);
                node.text_metrics = Some(metrics);
            }
        }

        node.layout.style = layout.clone();
        node.layout.auto_layout = auto_layout;
        node.layout.child = child;
        for m in markers {
            node.push_marker(m);
        }
        let state = ParentState {
            world: node.transform,
            layout,
            suppressed,
        };
        (node, state)
    }

    fn asset_processor(&self, page_url: &str) -> Result<AssetProcessor> {
        let processor = match &self.fetcher {
            Some(fetcher) => AssetProcessor::new(self.config.assets.clone()).with_fetcher(fetcher.clone()),
            #[cfg(feature = "http")]
            None => AssetProcessor::with_http(self.config.assets.clone(), &self.config.user_agent)?,
            #[cfg(not(feature = "http"))]
            None => AssetProcessor::new(self.config.assets.clone()),
        };
        Ok(processor.with_base_url(page_url))
    }

    /// Fetch and attach the assets of a normalized document
    pub async fn process_assets(&self, normalized: Normalized) -> Result<Conversion> {
        let Normalized {
            document: mut doc,
            content,
            ..
        } = normalized;

        if !self.config.assets.enabled {
            for id in content.keys() {
                if let Some(node) = doc.get_mut(id) {
                    node.needs_fallback = true;
                    node.push_marker(Marker::new(MarkerKind::AssetFailure, "src", "asset processing disabled"));
                }
            }
            let summary = ConversionSummary::from_document(&doc);
            return Ok(Conversion {
                document: doc,
                payloads: HashMap::new(),
                reports: Vec::new(),
                summary,
            });
        }

        let requests = collect_requests(&doc, &content);
        let processor = self.asset_processor(&doc.url)?;
        let processed = processor.process(requests).await;
        let failed = processed.failed();
        if failed > 0 {
            warn!("{} asset reference(s) could not be delivered", failed);
        }
        let reports = processed.reports.clone();
        let payloads = processed.apply(&mut doc);
        let summary = ConversionSummary::from_document(&doc);
        info!(
            "converted {}: {} nodes, {} fallbacks, {} unsupported, {} failed assets",
            doc.url, summary.nodes, summary.fallbacks, summary.unsupported, summary.failed_assets
        );
        Ok(Conversion {
            document: doc,
            payloads,
            reports,
            summary,
        })
    }

    /// Full conversion: normalize, then assets
    pub async fn convert(&self, snapshot: &PageSnapshot) -> Result<Conversion> {
        let normalized = self.normalize(snapshot)?;
        self.process_assets(normalized).await
    }
}
