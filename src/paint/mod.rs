//! Paint, effect and vector decoders
//!
//! Every decoder is a pure function from captured CSS syntax to a typed
//! descriptor. Nothing here fails: unparseable or partially supported input
//! yields the best-effort descriptor plus one [`Marker`] per problem, wrapped
//! in [`Decoded`].

pub mod background;
pub mod border;
pub mod clip;
pub mod color;
pub mod filter;
pub mod path;
pub mod shadow;
pub mod transform;

pub use background::{Background, BackgroundClip, BackgroundLayer, GradientStop, Paint, RadialShape};
pub use border::{Border, BorderSide, BorderStyle, CornerRadii, CornerRadius};
pub use clip::{Clip, ClipShape, Mask};
pub use color::Rgba;
pub use filter::{Filter, FilterKind};
pub use path::{FillRule, PathCommand, Stroke, VectorPath};
pub use shadow::Shadow;

use crate::ir::Marker;
use serde::{Deserialize, Serialize};

/// Decoder output: the best-effort value and what could not be represented
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub markers: Vec<Marker>,
}

impl<T> Decoded<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            markers: Vec::new(),
        }
    }

    pub fn with_markers(value: T, markers: Vec<Marker>) -> Self {
        Self { value, markers }
    }

    /// Whether anything was dropped or approximated
    pub fn is_partial(&self) -> bool {
        !self.markers.is_empty()
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Decoded<U> {
        Decoded {
            value: f(self.value),
            markers: self.markers,
        }
    }

    /// Move the markers into `sink` and return the value
    pub fn drain_into(self, sink: &mut Vec<Marker>) -> T {
        sink.extend(self.markers);
        self.value
    }
}

/// Separable and non-separable blend modes shared by layers and elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
    PlusLighter,
}

impl BlendMode {
    pub fn parse(raw: &str) -> Option<BlendMode> {
        Some(match raw.trim().to_ascii_lowercase().as_str() {
            "normal" => BlendMode::Normal,
            "multiply" => BlendMode::Multiply,
            "screen" => BlendMode::Screen,
            "overlay" => BlendMode::Overlay,
            "darken" => BlendMode::Darken,
            "lighten" => BlendMode::Lighten,
            "color-dodge" => BlendMode::ColorDodge,
            "color-burn" => BlendMode::ColorBurn,
            "hard-light" => BlendMode::HardLight,
            "soft-light" => BlendMode::SoftLight,
            "difference" => BlendMode::Difference,
            "exclusion" => BlendMode::Exclusion,
            "hue" => BlendMode::Hue,
            "saturation" => BlendMode::Saturation,
            "color" => BlendMode::Color,
            "luminosity" => BlendMode::Luminosity,
            "plus-lighter" => BlendMode::PlusLighter,
            _ => return None,
        })
    }

    /// Parse with a marker for unknown modes, falling back to `normal`
    pub fn decode(property: &str, raw: &str) -> Decoded<BlendMode> {
        match BlendMode::parse(raw) {
            Some(mode) => Decoded::ok(mode),
            None => Decoded::with_markers(
                BlendMode::Normal,
                vec![Marker::unsupported(property, raw, "unknown blend mode")],
            ),
        }
    }
}

/// Visual effects of one element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Effects {
    #[serde(default)]
    pub shadows: Vec<Shadow>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub backdrop_filters: Vec<Filter>,
    pub opacity: f32,
    #[serde(default)]
    pub blend_mode: BlendMode,
}

impl Default for Effects {
    fn default() -> Self {
        Self {
            shadows: Vec::new(),
            filters: Vec::new(),
            backdrop_filters: Vec::new(),
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
        }
    }
}

impl Effects {
    /// Nothing worth sending to the sink
    pub fn is_noop(&self) -> bool {
        self.shadows.is_empty()
            && self.filters.is_empty()
            && self.backdrop_filters.is_empty()
            && self.opacity >= 1.0
            && self.blend_mode == BlendMode::Normal
    }
}

/// Captured strings that make up an element's effects
#[derive(Debug, Clone, Copy, Default)]
pub struct EffectsInput<'a> {
    pub box_shadow: &'a str,
    pub filter: &'a str,
    pub backdrop_filter: &'a str,
    pub opacity: &'a str,
    pub mix_blend_mode: &'a str,
    pub current_color: Rgba,
}

/// Decode shadows, filter chains, opacity and blend mode together
pub fn decode_effects(input: EffectsInput<'_>) -> Decoded<Option<Effects>> {
    let mut markers = Vec::new();
    let shadows = shadow::parse_box_shadows(input.box_shadow, input.current_color).drain_into(&mut markers);
    let filters = filter::parse_filters("filter", input.filter).drain_into(&mut markers);
    let backdrop_filters = filter::parse_filters("backdrop-filter", input.backdrop_filter).drain_into(&mut markers);

    let opacity = match input.opacity.trim() {
        "" => 1.0,
        raw => match crate::style::tokens::parse_number_unit(raw) {
            Some((v, "")) => v.clamp(0.0, 1.0),
            Some((v, "%")) => (v / 100.0).clamp(0.0, 1.0),
            _ => {
                markers.push(Marker::unsupported("opacity", raw, "not a number"));
                1.0
            }
        },
    };

    let blend_mode = match input.mix_blend_mode.trim() {
        "" => BlendMode::Normal,
        raw => BlendMode::decode("mix-blend-mode", raw).drain_into(&mut markers),
    };

    let effects = Effects {
        shadows,
        filters,
        backdrop_filters,
        opacity,
        blend_mode,
    };
    let value = if effects.is_noop() { None } else { Some(effects) };
    Decoded::with_markers(value, markers)
}
