//! Background layers: colors, images and gradients
//!
//! Layers keep CSS order: `layers[0]` is the first declared image and paints
//! on top; the background color, when present, is the last (bottom) layer.

use super::color::{looks_like_color, Rgba};
use super::{BlendMode, Decoded};
use crate::ir::{ImagePayload, Marker};
use crate::style::tokens::{parse_angle, parse_function, parse_number_unit, split_top_level, split_whitespace_top_level, unquote};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    pub color: Rgba,
    /// Offset along the gradient line, 0..=1
    pub position: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadialShape {
    Circle,
    Ellipse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Paint {
    Solid {
        color: Rgba,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        url: String,
        /// Filled in once the asset processor has registered the image
        #[serde(default)]
        asset_id: Option<String>,
        /// Embedded bytes for small images, a chunk reference for streamed ones
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<ImagePayload>,
    },
    LinearGradient {
        /// CSS angle in degrees (0 = to top, 90 = to right)
        angle: f32,
        stops: Vec<GradientStop>,
    },
    RadialGradient {
        shape: RadialShape,
        /// Center as fractions of the box
        center: (f32, f32),
        stops: Vec<GradientStop>,
    },
    #[serde(rename_all = "camelCase")]
    ConicGradient {
        from_angle: f32,
        center: (f32, f32),
        stops: Vec<GradientStop>,
    },
}

impl Paint {
    pub fn is_gradient(&self) -> bool {
        matches!(
            self,
            Paint::LinearGradient { .. } | Paint::RadialGradient { .. } | Paint::ConicGradient { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackgroundClip {
    #[default]
    BorderBox,
    PaddingBox,
    ContentBox,
    /// Paint shows through glyphs only (gradient text)
    Text,
}

impl BackgroundClip {
    fn parse(raw: &str) -> Option<Self> {
        Some(match raw.trim().to_ascii_lowercase().as_str() {
            "border-box" => BackgroundClip::BorderBox,
            "padding-box" => BackgroundClip::PaddingBox,
            "content-box" => BackgroundClip::ContentBox,
            "text" | "-webkit-text" => BackgroundClip::Text,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundLayer {
    pub paint: Paint,
    #[serde(default)]
    pub blend_mode: BlendMode,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub repeat: String,
    #[serde(default)]
    pub clip: BackgroundClip,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Background {
    /// First declared on top
    pub layers: Vec<BackgroundLayer>,
}

impl Background {
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers in the order a bottom-up painter wants them
    pub fn bottom_to_top(&self) -> impl Iterator<Item = &BackgroundLayer> {
        self.layers.iter().rev()
    }

    /// Whether any layer is clipped to text
    pub fn clips_to_text(&self) -> bool {
        self.layers.iter().any(|l| l.clip == BackgroundClip::Text)
    }

    pub fn image_layers_mut(&mut self) -> impl Iterator<Item = &mut BackgroundLayer> {
        self.layers.iter_mut().filter(|l| matches!(l.paint, Paint::Image { .. }))
    }
}

/// Captured background longhands for one element
#[derive(Debug, Clone, Copy, Default)]
pub struct BackgroundInput<'a> {
    pub color: &'a str,
    pub image: &'a str,
    pub size: &'a str,
    pub position: &'a str,
    pub repeat: &'a str,
    pub blend_mode: &'a str,
    pub clip: &'a str,
    /// Box size used to resolve pixel stop positions
    pub box_size: (f32, f32),
}

/// CSS repeats shorter per-layer lists to match the number of images
fn nth_cycled<'a>(list: &[&'a str], i: usize, default: &'a str) -> &'a str {
    if list.is_empty() {
        default
    } else {
        list[i % list.len()]
    }
}

pub fn decode_background(input: BackgroundInput<'_>) -> Decoded<Option<Background>> {
    let mut markers = Vec::new();
    let mut layers = Vec::new();

    let sizes = split_top_level(input.size, ',');
    let positions = split_top_level(input.position, ',');
    let repeats = split_top_level(input.repeat, ',');
    let blends = split_top_level(input.blend_mode, ',');
    let clips = split_top_level(input.clip, ',');

    let image = input.image.trim();
    if !image.is_empty() && !image.eq_ignore_ascii_case("none") {
        for (i, item) in split_top_level(image, ',').into_iter().enumerate() {
            if item.eq_ignore_ascii_case("none") {
                continue;
            }
            let Some(paint) = decode_image(item, input.box_size, &mut markers) else {
                continue;
            };
            let blend_mode = BlendMode::decode("background-blend-mode", nth_cycled(&blends, i, "normal"))
                .drain_into(&mut markers);
            let clip_raw = nth_cycled(&clips, i, "border-box");
            let clip = BackgroundClip::parse(clip_raw).unwrap_or_else(|| {
                markers.push(Marker::unsupported("background-clip", clip_raw, "unknown clip box"));
                BackgroundClip::BorderBox
            });
            layers.push(BackgroundLayer {
                paint,
                blend_mode,
                size: nth_cycled(&sizes, i, "auto").to_string(),
                position: nth_cycled(&positions, i, "0% 0%").to_string(),
                repeat: nth_cycled(&repeats, i, "repeat").to_string(),
                clip,
            });
        }
    }

    let color_raw = input.color.trim();
    if !color_raw.is_empty() {
        match Rgba::parse(color_raw) {
            Some(color) if !color.is_transparent() => {
                let clip = clips
                    .last()
                    .and_then(|c| BackgroundClip::parse(c))
                    .unwrap_or_default();
                layers.push(BackgroundLayer {
                    paint: Paint::Solid { color },
                    blend_mode: BlendMode::Normal,
                    size: String::new(),
                    position: String::new(),
                    repeat: String::new(),
                    clip,
                });
            }
            Some(_) => {}
            None => markers.push(Marker::unsupported("background-color", color_raw, "unparseable color")),
        }
    }

    let value = if layers.is_empty() { None } else { Some(Background { layers }) };
    Decoded::with_markers(value, markers)
}

/// Decode one `<image>` value
pub fn decode_image(item: &str, box_size: (f32, f32), markers: &mut Vec<Marker>) -> Option<Paint> {
    let Some((name, args)) = parse_function(item) else {
        markers.push(Marker::unsupported("background-image", item, "not an image function"));
        return None;
    };
    let lname = name.to_ascii_lowercase();
    let (base, repeating) = match lname.strip_prefix("repeating-") {
        Some(base) => (base.to_string(), true),
        None => (lname.clone(), false),
    };
    let base = base.trim_start_matches("-webkit-");
    let decoded = match base {
        "url" => {
            let url = unquote(args).to_string();
            if url.is_empty() {
                Err("empty url()".to_string())
            } else {
                Ok(Paint::Image {
                    url,
                    asset_id: None,
                    payload: None,
                })
            }
        }
        "linear-gradient" => linear_gradient(args, box_size, markers),
        "radial-gradient" => radial_gradient(args, markers),
        "conic-gradient" => conic_gradient(args, markers),
        _ => Err(format!("unsupported image function {}()", name)),
    };
    match decoded {
        Ok(paint) => {
            if repeating {
                markers.push(Marker::unsupported(
                    "background-image",
                    item,
                    "repeating gradient painted as a single repetition",
                ));
            }
            Some(paint)
        }
        Err(reason) => {
            markers.push(Marker::unsupported("background-image", item, reason));
            None
        }
    }
}

fn side_angle(words: &[&str]) -> Option<f32> {
    let mut horiz = None;
    let mut vert = None;
    for w in words {
        match w.to_ascii_lowercase().as_str() {
            "left" => horiz = Some(-1.0),
            "right" => horiz = Some(1.0),
            "top" => vert = Some(-1.0),
            "bottom" => vert = Some(1.0),
            _ => return None,
        }
    }
    Some(match (horiz, vert) {
        (None, Some(v)) => {
            if v < 0.0 {
                0.0
            } else {
                180.0
            }
        }
        (Some(h), None) => {
            if h > 0.0 {
                90.0
            } else {
                270.0
            }
        }
        (Some(h), Some(v)) => match (h > 0.0, v < 0.0) {
            (true, true) => 45.0,
            (true, false) => 135.0,
            (false, false) => 225.0,
            (false, true) => 315.0,
        },
        (None, None) => return None,
    })
}

fn linear_gradient(args: &str, box_size: (f32, f32), markers: &mut Vec<Marker>) -> Result<Paint, String> {
    let parts = split_top_level(args, ',');
    let (angle, stop_parts) = match parts.first() {
        Some(first) if first.to_ascii_lowercase().starts_with("to ") => {
            let words: Vec<&str> = split_whitespace_top_level(first).into_iter().skip(1).collect();
            let angle = side_angle(&words).ok_or_else(|| format!("bad direction '{}'", first))?;
            (angle, &parts[1..])
        }
        Some(first) => match parse_angle(first) {
            Some(a) if !looks_like_color(first) => (a, &parts[1..]),
            _ => (180.0, &parts[..]),
        },
        None => return Err("empty gradient".into()),
    };
    let rad = angle.to_radians();
    let line_length = (box_size.0 * rad.sin()).abs() + (box_size.1 * rad.cos()).abs();
    let stops = parse_stops(stop_parts, line_length, markers)?;
    Ok(Paint::LinearGradient { angle, stops })
}

fn position_keyword(word: &str) -> Option<f32> {
    match word.to_ascii_lowercase().as_str() {
        "left" | "top" => Some(0.0),
        "center" => Some(0.5),
        "right" | "bottom" => Some(1.0),
        w => match parse_number_unit(w) {
            Some((v, "%")) => Some(v / 100.0),
            _ => None,
        },
    }
}

/// `at <position>` -> center fractions; keywords and percentages only
fn parse_center(words: &[&str]) -> Option<(f32, f32)> {
    match words {
        [] => Some((0.5, 0.5)),
        [one] => {
            let v = position_keyword(one)?;
            let lower = one.to_ascii_lowercase();
            if lower == "top" || lower == "bottom" {
                Some((0.5, v))
            } else {
                Some((v, 0.5))
            }
        }
        [a, b] => {
            let (la, lb) = (a.to_ascii_lowercase(), b.to_ascii_lowercase());
            if la == "top" || la == "bottom" || lb == "left" || lb == "right" {
                Some((position_keyword(b)?, position_keyword(a)?))
            } else {
                Some((position_keyword(a)?, position_keyword(b)?))
            }
        }
        _ => None,
    }
}

fn is_stop(part: &str) -> bool {
    split_whitespace_top_level(part)
        .first()
        .is_some_and(|t| looks_like_color(t))
}

fn radial_gradient(args: &str, markers: &mut Vec<Marker>) -> Result<Paint, String> {
    let parts = split_top_level(args, ',');
    let mut shape = RadialShape::Ellipse;
    let mut center = (0.5, 0.5);
    let mut stop_parts = &parts[..];
    if let Some(first) = parts.first() {
        if !is_stop(first) {
            let words = split_whitespace_top_level(first);
            let at = words.iter().position(|w| w.eq_ignore_ascii_case("at"));
            let (shape_words, pos_words) = match at {
                Some(i) => (&words[..i], &words[i + 1..]),
                None => (&words[..], &words[words.len()..]),
            };
            for w in shape_words {
                match w.to_ascii_lowercase().as_str() {
                    "circle" => shape = RadialShape::Circle,
                    "ellipse" => shape = RadialShape::Ellipse,
                    "closest-side" | "closest-corner" | "farthest-side" | "farthest-corner" => {}
                    other => markers.push(Marker::unsupported(
                        "background-image",
                        other,
                        "explicit radial size approximated by farthest-corner",
                    )),
                }
            }
            center = parse_center(pos_words).ok_or_else(|| format!("bad gradient position '{}'", first))?;
            stop_parts = &parts[1..];
        }
    }
    let stops = parse_stops(stop_parts, 0.0, markers)?;
    Ok(Paint::RadialGradient { shape, center, stops })
}

fn conic_gradient(args: &str, markers: &mut Vec<Marker>) -> Result<Paint, String> {
    let parts = split_top_level(args, ',');
    let mut from_angle = 0.0;
    let mut center = (0.5, 0.5);
    let mut stop_parts = &parts[..];
    if let Some(first) = parts.first() {
        if !is_stop(first) {
            let words = split_whitespace_top_level(first);
            let mut i = 0;
            while i < words.len() {
                if words[i].eq_ignore_ascii_case("from") {
                    from_angle = words
                        .get(i + 1)
                        .and_then(|w| parse_angle(w))
                        .ok_or_else(|| format!("bad conic angle in '{}'", first))?;
                    i += 2;
                } else if words[i].eq_ignore_ascii_case("at") {
                    center = parse_center(&words[i + 1..]).ok_or_else(|| format!("bad conic position '{}'", first))?;
                    break;
                } else {
                    return Err(format!("unexpected '{}' in conic gradient", words[i]));
                }
            }
            stop_parts = &parts[1..];
        }
    }
    // conic stops use angles; convert degrees to turns
    let converted: Vec<String> = stop_parts
        .iter()
        .map(|p| {
            split_whitespace_top_level(p)
                .into_iter()
                .map(|t| match parse_angle(t) {
                    Some(deg) if !looks_like_color(t) && parse_number_unit(t).is_some_and(|(_, u)| !u.is_empty()) => {
                        format!("{}%", deg / 360.0 * 100.0)
                    }
                    _ => t.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    let refs: Vec<&str> = converted.iter().map(String::as_str).collect();
    let stops = parse_stops(&refs, 0.0, markers)?;
    Ok(Paint::ConicGradient {
        from_angle,
        center,
        stops,
    })
}

/// Parse color stops and fill in missing positions.
///
/// Pixel positions are resolved against `line_length` when it is known.
fn parse_stops(parts: &[&str], line_length: f32, markers: &mut Vec<Marker>) -> Result<Vec<GradientStop>, String> {
    let mut raw: Vec<(Rgba, Option<f32>)> = Vec::new();
    for part in parts {
        let tokens = split_whitespace_top_level(part);
        let Some(color_token) = tokens.first() else { continue };
        let Some(color) = Rgba::parse(color_token) else {
            if tokens.len() == 1 && parse_number_unit(color_token).is_some() {
                markers.push(Marker::unsupported("background-image", *part, "color hint ignored"));
                continue;
            }
            markers.push(Marker::unsupported("background-image", *part, "color stop skipped"));
            continue;
        };
        let positions: Vec<Option<f32>> = tokens[1..]
            .iter()
            .map(|t| match parse_number_unit(t) {
                Some((v, "%")) => Some(v / 100.0),
                Some((v, "px")) if line_length > 0.0 => Some(v / line_length),
                Some((v, "")) if v == 0.0 => Some(0.0),
                _ => None,
            })
            .collect();
        if positions.iter().any(Option::is_none) {
            markers.push(Marker::unsupported("background-image", *part, "stop position could not be resolved"));
        }
        match positions.as_slice() {
            [] => raw.push((color, None)),
            [p] => raw.push((color, *p)),
            [p, q, ..] => {
                raw.push((color, *p));
                raw.push((color, *q));
            }
        }
    }
    if raw.len() < 2 {
        if raw.len() == 1 {
            raw.push(raw[0]);
        } else {
            return Err("gradient needs at least one color stop".into());
        }
    }

    let n = raw.len();
    let mut positions: Vec<Option<f32>> = raw.iter().map(|(_, p)| *p).collect();
    if positions[0].is_none() {
        positions[0] = Some(0.0);
    }
    if positions[n - 1].is_none() {
        positions[n - 1] = Some(1.0);
    }
    // stops never move backwards
    let mut max_so_far = f32::MIN;
    for p in positions.iter_mut().flatten() {
        if *p < max_so_far {
            *p = max_so_far;
        }
        max_so_far = *p;
    }
    // evenly distribute runs of missing positions between known neighbours
    let mut i = 0;
    while i < n {
        if positions[i].is_some() {
            i += 1;
            continue;
        }
        let start = i - 1;
        let mut end = i;
        while positions[end].is_none() {
            end += 1;
        }
        let (a, b) = (positions[start].unwrap_or(0.0), positions[end].unwrap_or(1.0));
        let span = (end - start) as f32;
        for (k, slot) in positions.iter_mut().enumerate().take(end).skip(i) {
            *slot = Some(a + (b - a) * (k - start) as f32 / span);
        }
        i = end;
    }

    Ok(raw
        .into_iter()
        .zip(positions)
        .map(|((color, _), p)| GradientStop {
            color,
            position: p.unwrap_or(0.0),
        })
        .collect())
}
