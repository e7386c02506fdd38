//! Layout mapping engine
//!
//! Maps CSS flow, flexbox and grid semantics onto the canvas' constrained
//! auto-layout model: one orientation, fixed or hug sizing per axis, a
//! primary and a counter alignment enum and a single item spacing.
//!
//! Every individual mapping decision returns a [`Mapped`] value, so callers
//! always see when an approximation was substituted and why. Containers that
//! have no auto-layout equivalent (wrapping flex, multi-track grids) switch to
//! [`LayoutMode::Absolute`]: their children keep their captured rects.

mod flex;
mod grid;
pub mod style;

pub use grid::{parse_placement, parse_tracks, GridPlacement, GridTemplate, GridTrack};
pub use style::{ContentAlign, Display, Edges, FlexDirection, FlexWrap, ItemAlign, LayoutStyle, Position, SizeValue};

use crate::ir::{Marker, MarkerKind};
use serde::{Deserialize, Serialize};

/// Result of a mapping decision that may have had to approximate
#[derive(Debug, Clone, PartialEq)]
pub struct Mapped<T> {
    pub value: T,
    pub fallback_applied: bool,
    pub reason: Option<String>,
}

impl<T> Mapped<T> {
    pub fn exact(value: T) -> Self {
        Self {
            value,
            fallback_applied: false,
            reason: None,
        }
    }

    pub fn fallback(value: T, reason: impl Into<String>) -> Self {
        Self {
            value,
            fallback_applied: true,
            reason: Some(reason.into()),
        }
    }

    /// Take the value, recording the fallback (if any) under `kind`
    pub fn record(self, kind: FallbackKind, flags: &mut Vec<FallbackFlag>) -> T {
        if self.fallback_applied {
            flags.push(FallbackFlag {
                kind,
                reason: self.reason.unwrap_or_default(),
            });
        }
        self.value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Horizontal,
    Vertical,
    /// No auto-layout: children keep their absolute rects
    Absolute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sizing {
    #[default]
    Fixed,
    Hug,
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrimaryAlign {
    #[default]
    Start,
    Center,
    End,
    SpaceBetween,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterAlign {
    #[default]
    Start,
    Center,
    End,
    Baseline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackKind {
    AbsolutePosition,
    PrimaryAlignment,
    CounterAlignment,
    Sizing,
    Grid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackFlag {
    pub kind: FallbackKind,
    pub reason: String,
}

/// Auto-layout descriptor for a container
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoLayout {
    pub mode: LayoutMode,
    pub primary_sizing: Sizing,
    pub counter_sizing: Sizing,
    pub primary_alignment: PrimaryAlign,
    pub counter_alignment: CounterAlign,
    pub item_spacing: f32,
    /// Spacing between lines; only meaningful for wrapped content
    #[serde(default)]
    pub counter_spacing: f32,
    pub padding: Edges,
    /// Children are placed in reverse order (`*-reverse` directions)
    #[serde(default)]
    pub reverse_children: bool,
    #[serde(default)]
    pub clips_content: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<FallbackFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridTemplate>,
}

impl AutoLayout {
    pub fn is_absolute(&self) -> bool {
        self.mode == LayoutMode::Absolute
    }

    pub fn has_fallback(&self) -> bool {
        !self.fallbacks.is_empty()
    }

    pub fn has_fallback_of(&self, kind: FallbackKind) -> bool {
        self.fallbacks.iter().any(|f| f.kind == kind)
    }
}

/// How a node sits inside its parent's layout
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildLayout {
    /// `flex-grow > 0`
    #[serde(default)]
    pub grow: bool,
    #[serde(default)]
    pub grow_factor: f32,
    /// Out of flow: keeps its rect inside an auto-layout parent
    #[serde(default)]
    pub absolute: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align_self: Option<CounterAlign>,
    /// CSS `order`
    #[serde(default)]
    pub order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridPlacement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<FallbackFlag>,
}

/// Map one axis' size onto fixed/hug/fill sizing
pub fn map_sizing(size: SizeValue) -> Mapped<Sizing> {
    match size {
        SizeValue::Px(_) => Mapped::exact(Sizing::Fixed),
        SizeValue::Percent(p) if (p - 100.0).abs() < f32::EPSILON => Mapped::exact(Sizing::Fill),
        SizeValue::Percent(_) => Mapped::exact(Sizing::Fixed),
        SizeValue::Auto | SizeValue::FitContent | SizeValue::MaxContent => Mapped::exact(Sizing::Hug),
        SizeValue::MinContent => Mapped::fallback(Sizing::Hug, "min-content sized as hug contents"),
    }
}

/// Map an item alignment onto the counter axis.
///
/// `normal` (the initial value) is start without a flag; explicit `stretch`
/// has no cross-axis equivalent and is flagged.
pub fn map_counter_alignment(property: &str, align: &ItemAlign) -> Mapped<CounterAlign> {
    match align {
        ItemAlign::Auto | ItemAlign::Normal | ItemAlign::Start => Mapped::exact(CounterAlign::Start),
        ItemAlign::Center => Mapped::exact(CounterAlign::Center),
        ItemAlign::End => Mapped::exact(CounterAlign::End),
        ItemAlign::Baseline => Mapped::exact(CounterAlign::Baseline),
        ItemAlign::Stretch => Mapped::fallback(
            CounterAlign::Start,
            format!("{}: stretch approximated as start", property),
        ),
        ItemAlign::LastBaseline => Mapped::fallback(
            CounterAlign::End,
            format!("{}: last baseline approximated as end", property),
        ),
        ItemAlign::Unknown(raw) => Mapped::fallback(
            CounterAlign::Start,
            format!("{}: unsupported value '{}' approximated as start", property, raw),
        ),
    }
}

/// Map a node's layout style to its container descriptor, if it is one.
/// `in_flow_items` counts the children that take part in the container's
/// flow (not hidden, not absolutely positioned).
pub fn map_container(style: &LayoutStyle, in_flow_items: usize) -> Option<AutoLayout> {
    if style.display.is_flex() {
        Some(flex::map_flex(style))
    } else if style.display.is_grid() {
        Some(grid::map_grid(style, in_flow_items))
    } else {
        None
    }
}

/// Map a node's behaviour inside its parent
pub fn map_child(style: &LayoutStyle, parent: Option<&LayoutStyle>) -> ChildLayout {
    let mut fallbacks = Vec::new();
    let mut child = ChildLayout {
        order: style.order,
        absolute: style.position.is_out_of_flow(),
        ..Default::default()
    };
    let Some(parent) = parent.filter(|p| p.is_layout_container()) else {
        return child;
    };
    if parent.display.is_flex() {
        child.grow = style.flex_grow > 0.0;
        child.grow_factor = style.flex_grow;
    }
    if style.align_self != ItemAlign::Auto {
        child.align_self = Some(map_counter_alignment("align-self", &style.align_self).record(FallbackKind::CounterAlignment, &mut fallbacks));
    }
    if parent.display.is_grid() {
        let placement = GridPlacement {
            column: parse_placement(&style.grid_column),
            row: parse_placement(&style.grid_row),
        };
        if !placement.is_auto() {
            child.grid = Some(placement);
        }
    }
    child.fallbacks = fallbacks;
    child
}

/// Markers describing every fallback in a container and child descriptor
pub fn fallback_markers(auto_layout: Option<&AutoLayout>, child: &ChildLayout) -> Vec<Marker> {
    auto_layout
        .into_iter()
        .flat_map(|a| a.fallbacks.iter())
        .chain(child.fallbacks.iter())
        .map(|f| {
            let property = match f.kind {
                FallbackKind::AbsolutePosition => "layout",
                FallbackKind::PrimaryAlignment => "justify-content",
                FallbackKind::CounterAlignment => "align-items",
                FallbackKind::Sizing => "sizing",
                FallbackKind::Grid => "grid",
            };
            Marker::new(MarkerKind::LayoutFallback, property, f.reason.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flex(direction: FlexDirection) -> LayoutStyle {
        LayoutStyle {
            display: Display::Flex,
            flex_direction: direction,
            ..Default::default()
        }
    }

    #[test]
    fn mapped_records_only_fallbacks() {
        let mut flags = Vec::new();
        assert_eq!(Mapped::exact(1).record(FallbackKind::Sizing, &mut flags), 1);
        assert!(flags.is_empty());
        assert_eq!(Mapped::fallback(2, "why").record(FallbackKind::Sizing, &mut flags), 2);
        assert_eq!(flags[0].reason, "why");
    }

    #[test]
    fn sizing_table() {
        assert_eq!(map_sizing(SizeValue::Px(10.0)).value, Sizing::Fixed);
        assert_eq!(map_sizing(SizeValue::Auto).value, Sizing::Hug);
        assert_eq!(map_sizing(SizeValue::FitContent).value, Sizing::Hug);
        assert_eq!(map_sizing(SizeValue::Percent(100.0)).value, Sizing::Fill);
        assert_eq!(map_sizing(SizeValue::Percent(50.0)).value, Sizing::Fixed);
        assert!(map_sizing(SizeValue::MinContent).fallback_applied);
    }

    #[test]
    fn only_flex_and_grid_are_containers() {
        assert!(map_container(&flex(FlexDirection::Row), 2).is_some());
        let grid = LayoutStyle {
            display: Display::Grid,
            ..Default::default()
        };
        assert!(map_container(&grid, 2).is_some());
        let block = LayoutStyle {
            display: Display::Block,
            ..Default::default()
        };
        assert!(map_container(&block, 2).is_none());
    }

    #[test]
    fn child_grow_and_absolute() {
        let parent = flex(FlexDirection::Row);
        let child = LayoutStyle {
            flex_grow: 2.0,
            position: Position::Absolute,
            align_self: ItemAlign::Stretch,
            ..Default::default()
        };
        let c = map_child(&child, Some(&parent));
        assert!(c.grow);
        assert!(c.absolute);
        assert_eq!(c.align_self, Some(CounterAlign::Start));
        assert_eq!(c.fallbacks.len(), 1);
        assert_eq!(fallback_markers(None, &c).len(), 1);
    }

    #[test]
    fn child_of_block_ignores_flex_properties() {
        let child = LayoutStyle {
            flex_grow: 1.0,
            ..Default::default()
        };
        let c = map_child(&child, None);
        assert!(!c.grow);
        assert!(c.fallbacks.is_empty());
    }
}
