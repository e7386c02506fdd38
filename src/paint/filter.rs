use super::color::Rgba;
use super::shadow::{parse_box_shadows, parse_px, Shadow};
use super::Decoded;
use crate::ir::Marker;
use crate::style::tokens::{parse_angle, parse_function, parse_number_unit, split_whitespace_top_level};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    Blur,
    Brightness,
    Contrast,
    Grayscale,
    HueRotate,
    Invert,
    Opacity,
    Saturate,
    Sepia,
    DropShadow,
}

/// One entry of a `filter` / `backdrop-filter` chain.
///
/// `value` is pixels for blur, degrees for hue-rotate and a unit amount
/// (1.0 = 100%) for the rest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub kind: FilterKind,
    pub value: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<Shadow>,
}

fn amount(args: &str, default: f32) -> Option<f32> {
    if args.is_empty() {
        return Some(default);
    }
    match parse_number_unit(args)? {
        (v, "") => Some(v),
        (v, "%") => Some(v / 100.0),
        _ => None,
    }
}

fn parse_one(token: &str) -> Result<Filter, String> {
    let (name, args) = parse_function(token).ok_or_else(|| format!("not a filter function: '{}'", token))?;
    let lname = name.to_ascii_lowercase();
    let simple = |kind: FilterKind, value: Option<f32>| {
        value
            .map(|value| Filter { kind, value, shadow: None })
            .ok_or_else(|| format!("bad argument for {}(): '{}'", lname, args))
    };
    match lname.as_str() {
        "blur" => simple(
            FilterKind::Blur,
            if args.is_empty() { Some(0.0) } else { parse_px(args) },
        ),
        "brightness" => simple(FilterKind::Brightness, amount(args, 1.0)),
        "contrast" => simple(FilterKind::Contrast, amount(args, 1.0)),
        "grayscale" => simple(FilterKind::Grayscale, amount(args, 1.0)),
        "invert" => simple(FilterKind::Invert, amount(args, 1.0)),
        "opacity" => simple(FilterKind::Opacity, amount(args, 1.0)),
        "saturate" => simple(FilterKind::Saturate, amount(args, 1.0)),
        "sepia" => simple(FilterKind::Sepia, amount(args, 1.0)),
        "hue-rotate" => simple(
            FilterKind::HueRotate,
            if args.is_empty() { Some(0.0) } else { parse_angle(args) },
        ),
        "drop-shadow" => {
            let shadows = parse_box_shadows(args, Rgba::BLACK);
            match shadows.value.first() {
                Some(s) if shadows.markers.is_empty() => Ok(Filter {
                    kind: FilterKind::DropShadow,
                    value: s.blur,
                    shadow: Some(*s),
                }),
                _ => Err(format!("bad drop-shadow '{}'", args)),
            }
        }
        "url" => Err("SVG filter references are not supported".into()),
        _ => Err(format!("unknown filter function '{}'", name)),
    }
}

/// Parse a filter chain, keeping declared order
pub fn parse_filters(property: &str, raw: &str) -> Decoded<Vec<Filter>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Decoded::ok(Vec::new());
    }
    let mut filters = Vec::new();
    let mut markers = Vec::new();
    for token in split_whitespace_top_level(raw) {
        match parse_one(token) {
            Ok(f) => filters.push(f),
            Err(reason) => markers.push(Marker::unsupported(property, token, reason)),
        }
    }
    Decoded::with_markers(filters, markers)
}
