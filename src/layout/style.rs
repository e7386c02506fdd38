//! Typed layout bundle read from a node's resolved style

use crate::ir::Marker;
use crate::paint::Decoded;
use crate::style::tokens::parse_number_unit;
use crate::style::ResolvedStyle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Display {
    #[default]
    Inline,
    Block,
    InlineBlock,
    Flex,
    InlineFlex,
    Grid,
    InlineGrid,
    ListItem,
    Table,
    Contents,
    None,
    Other,
}

impl Display {
    fn parse(raw: &str) -> Display {
        match raw {
            "inline" => Display::Inline,
            "block" | "flow-root" | "block flow" | "block flow-root" => Display::Block,
            "inline-block" | "inline flow-root" => Display::InlineBlock,
            "flex" | "block flex" | "-webkit-box" => Display::Flex,
            "inline-flex" | "inline flex" => Display::InlineFlex,
            "grid" | "block grid" => Display::Grid,
            "inline-grid" | "inline grid" => Display::InlineGrid,
            "list-item" => Display::ListItem,
            "contents" => Display::Contents,
            "none" => Display::None,
            t if t.starts_with("table") => Display::Table,
            _ => Display::Other,
        }
    }

    pub fn is_flex(self) -> bool {
        matches!(self, Display::Flex | Display::InlineFlex)
    }

    pub fn is_grid(self) -> bool {
        matches!(self, Display::Grid | Display::InlineGrid)
    }

    /// Participates in inline layout
    pub fn is_inline_level(self) -> bool {
        matches!(
            self,
            Display::Inline | Display::InlineBlock | Display::InlineFlex | Display::InlineGrid
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
    Sticky,
}

impl Position {
    pub fn is_positioned(self) -> bool {
        !matches!(self, Position::Static)
    }

    /// Taken out of flow
    pub fn is_out_of_flow(self) -> bool {
        matches!(self, Position::Absolute | Position::Fixed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlexDirection {
    #[default]
    Row,
    RowReverse,
    Column,
    ColumnReverse,
}

impl FlexDirection {
    pub fn is_row(self) -> bool {
        matches!(self, FlexDirection::Row | FlexDirection::RowReverse)
    }

    pub fn is_reverse(self) -> bool {
        matches!(self, FlexDirection::RowReverse | FlexDirection::ColumnReverse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlexWrap {
    #[default]
    Nowrap,
    Wrap,
    WrapReverse,
}

/// Content distribution (`justify-content`, `align-content`)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentAlign {
    #[default]
    Normal,
    Start,
    Center,
    End,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
    Stretch,
    /// Unrecognised value, kept for the fallback reason
    Unknown(String),
}

impl ContentAlign {
    fn parse(raw: &str) -> ContentAlign {
        // `safe`/`unsafe` only change overflow behaviour
        let raw = raw.trim_start_matches("safe ").trim_start_matches("unsafe ");
        match raw {
            "" | "normal" => ContentAlign::Normal,
            "start" | "flex-start" | "left" => ContentAlign::Start,
            "center" => ContentAlign::Center,
            "end" | "flex-end" | "right" => ContentAlign::End,
            "space-between" => ContentAlign::SpaceBetween,
            "space-around" => ContentAlign::SpaceAround,
            "space-evenly" => ContentAlign::SpaceEvenly,
            "stretch" => ContentAlign::Stretch,
            other => ContentAlign::Unknown(other.to_string()),
        }
    }
}

/// Item alignment (`align-items`, `align-self`, `justify-items`)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemAlign {
    /// `auto` on `align-self`: defer to the container
    Auto,
    #[default]
    Normal,
    Start,
    Center,
    End,
    Stretch,
    Baseline,
    LastBaseline,
    Unknown(String),
}

impl ItemAlign {
    fn parse(raw: &str) -> ItemAlign {
        let raw = raw.trim_start_matches("safe ").trim_start_matches("unsafe ");
        match raw {
            "auto" => ItemAlign::Auto,
            "" | "normal" | "legacy" => ItemAlign::Normal,
            "start" | "flex-start" | "self-start" | "left" => ItemAlign::Start,
            "center" => ItemAlign::Center,
            "end" | "flex-end" | "self-end" | "right" => ItemAlign::End,
            "stretch" => ItemAlign::Stretch,
            "baseline" | "first baseline" => ItemAlign::Baseline,
            "last baseline" => ItemAlign::LastBaseline,
            other => ItemAlign::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum SizeValue {
    #[default]
    Auto,
    Px(f32),
    Percent(f32),
    FitContent,
    MinContent,
    MaxContent,
}

impl SizeValue {
    fn parse(raw: &str) -> Option<SizeValue> {
        Some(match raw {
            "" | "auto" | "none" | "normal" => SizeValue::Auto,
            "fit-content" | "-webkit-fit-content" | "-moz-fit-content" | "stretch" | "-webkit-fill-available" => {
                SizeValue::FitContent
            }
            "min-content" => SizeValue::MinContent,
            "max-content" => SizeValue::MaxContent,
            other => match parse_number_unit(other)? {
                (v, "px") => SizeValue::Px(v),
                (v, "%") => SizeValue::Percent(v),
                (v, "") if v == 0.0 => SizeValue::Px(0.0),
                _ => return None,
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub fn is_zero(&self) -> bool {
        self.top == 0.0 && self.right == 0.0 && self.bottom == 0.0 && self.left == 0.0
    }
}

/// Resolved layout-relevant properties of one node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutStyle {
    pub display: Display,
    pub position: Position,
    /// `None` means `auto`
    #[serde(default)]
    pub z_index: Option<i32>,
    #[serde(default)]
    pub float: bool,
    pub flex_direction: FlexDirection,
    pub flex_wrap: FlexWrap,
    pub justify_content: ContentAlign,
    pub align_items: ItemAlign,
    pub align_content: ContentAlign,
    pub align_self: ItemAlign,
    pub justify_items: ItemAlign,
    pub row_gap: f32,
    pub column_gap: f32,
    pub padding: Edges,
    pub margin: Edges,
    pub border: Edges,
    pub width: SizeValue,
    pub height: SizeValue,
    pub flex_grow: f32,
    pub flex_shrink: f32,
    pub flex_basis: SizeValue,
    pub order: i32,
    #[serde(default)]
    pub clips_content: bool,
    /// `isolation: isolate` or a `will-change` that forces a stacking context
    #[serde(default)]
    pub isolation: bool,
    #[serde(default)]
    pub grid_template_columns: String,
    #[serde(default)]
    pub grid_template_rows: String,
    #[serde(default)]
    pub grid_auto_flow: String,
    #[serde(default)]
    pub grid_column: String,
    #[serde(default)]
    pub grid_row: String,
}

/// Pixel length or zero with a marker
fn px(style: &ResolvedStyle, name: &str, markers: &mut Vec<Marker>) -> f32 {
    let raw = style.raw(name).trim();
    if raw.is_empty() || raw == "normal" || raw == "auto" {
        return 0.0;
    }
    match style.length(name) {
        Some(v) => v,
        None => {
            markers.push(Marker::unsupported(name, raw, "not a pixel length; using 0"));
            0.0
        }
    }
}

fn edges(style: &ResolvedStyle, prefix: &str, suffix: &str, markers: &mut Vec<Marker>) -> Edges {
    let side = |s: &str, markers: &mut Vec<Marker>| px(style, &format!("{}-{}{}", prefix, s, suffix), markers);
    Edges {
        top: side("top", markers),
        right: side("right", markers),
        bottom: side("bottom", markers),
        left: side("left", markers),
    }
}

fn size(style: &ResolvedStyle, name: &str, markers: &mut Vec<Marker>) -> SizeValue {
    let raw = style.keyword(name);
    SizeValue::parse(&raw).unwrap_or_else(|| {
        markers.push(Marker::unsupported(name, raw.as_str(), "unsupported size; treated as auto"));
        SizeValue::Auto
    })
}

fn integer(style: &ResolvedStyle, name: &str, markers: &mut Vec<Marker>) -> Option<i32> {
    let raw = style.keyword(name);
    if raw.is_empty() || raw == "auto" {
        return None;
    }
    match raw.parse::<i32>() {
        Ok(v) => Some(v),
        Err(_) => {
            markers.push(Marker::unsupported(name, raw.as_str(), "not an integer"));
            None
        }
    }
}

fn factor(style: &ResolvedStyle, name: &str, default: f32, markers: &mut Vec<Marker>) -> f32 {
    let raw = style.raw(name).trim();
    if raw.is_empty() {
        return default;
    }
    match style.number(name) {
        Some(v) if v >= 0.0 => v,
        _ => {
            markers.push(Marker::unsupported(name, raw, "not a non-negative number"));
            default
        }
    }
}

impl LayoutStyle {
    /// Read the layout bundle; anything unusable becomes its default plus a
    /// marker.
    pub fn from_resolved(style: &ResolvedStyle) -> Decoded<LayoutStyle> {
        let mut markers = Vec::new();
        let keyword = |name: &str| style.keyword(name);

        let position = match keyword("position").as_str() {
            "relative" => Position::Relative,
            "absolute" => Position::Absolute,
            "fixed" => Position::Fixed,
            "sticky" | "-webkit-sticky" => Position::Sticky,
            _ => Position::Static,
        };
        let flex_direction = match keyword("flex-direction").as_str() {
            "row-reverse" => FlexDirection::RowReverse,
            "column" => FlexDirection::Column,
            "column-reverse" => FlexDirection::ColumnReverse,
            _ => FlexDirection::Row,
        };
        let flex_wrap = match keyword("flex-wrap").as_str() {
            "wrap" => FlexWrap::Wrap,
            "wrap-reverse" => FlexWrap::WrapReverse,
            _ => FlexWrap::Nowrap,
        };
        let overflow = keyword("overflow");
        let clips_content = overflow.split_whitespace().any(|o| matches!(o, "hidden" | "clip" | "scroll" | "auto"));

        let isolation = keyword("isolation") == "isolate"
            || keyword("will-change")
                .split(',')
                .any(|w| matches!(w.trim(), "transform" | "opacity" | "filter" | "z-index" | "isolation"));

        let value = LayoutStyle {
            display: Display::parse(&keyword("display")),
            position,
            z_index: integer(style, "z-index", &mut markers),
            float: !matches!(keyword("float").as_str(), "" | "none"),
            flex_direction,
            flex_wrap,
            justify_content: ContentAlign::parse(&keyword("justify-content")),
            align_items: ItemAlign::parse(&keyword("align-items")),
            align_content: ContentAlign::parse(&keyword("align-content")),
            align_self: ItemAlign::parse(&keyword("align-self")),
            justify_items: ItemAlign::parse(&keyword("justify-items")),
            row_gap: px(style, "row-gap", &mut markers),
            column_gap: px(style, "column-gap", &mut markers),
            padding: edges(style, "padding", "", &mut markers),
            margin: edges(style, "margin", "", &mut markers),
            border: edges(style, "border", "-width", &mut markers),
            width: size(style, "width", &mut markers),
            height: size(style, "height", &mut markers),
            flex_grow: factor(style, "flex-grow", 0.0, &mut markers),
            flex_shrink: factor(style, "flex-shrink", 1.0, &mut markers),
            flex_basis: size(style, "flex-basis", &mut markers),
            order: integer(style, "order", &mut markers).unwrap_or(0),
            clips_content,
            isolation,
            grid_template_columns: keyword("grid-template-columns"),
            grid_template_rows: keyword("grid-template-rows"),
            grid_auto_flow: keyword("grid-auto-flow"),
            grid_column: keyword("grid-column"),
            grid_row: keyword("grid-row"),
        };
        Decoded::with_markers(value, markers)
    }

    /// Flex or grid container
    pub fn is_layout_container(&self) -> bool {
        self.display.is_flex() || self.display.is_grid()
    }
}
