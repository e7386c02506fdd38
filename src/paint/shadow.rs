use super::color::{looks_like_color, Rgba};
use super::Decoded;
use crate::ir::Marker;
use crate::style::tokens::{parse_number_unit, split_top_level, split_whitespace_top_level};
use crate::style::StyleValue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shadow {
    pub offset_x: f32,
    pub offset_y: f32,
    pub blur: f32,
    pub spread: f32,
    pub color: Rgba,
    pub inset: bool,
}

pub(crate) fn parse_px(token: &str) -> Option<f32> {
    match StyleValue::parse(token).ok()? {
        StyleValue::Length(v) => Some(v),
        StyleValue::Number(v) if v == 0.0 => Some(0.0),
        _ => None,
    }
}

fn parse_one(part: &str, current_color: Rgba) -> Result<Shadow, String> {
    let mut lengths = Vec::new();
    let mut color = None;
    let mut inset = false;
    for token in split_whitespace_top_level(part) {
        if token.eq_ignore_ascii_case("inset") {
            inset = true;
        } else if token.eq_ignore_ascii_case("currentcolor") {
            color = Some(current_color);
        } else if looks_like_color(token) {
            color = Some(Rgba::parse(token).ok_or_else(|| format!("bad color '{}'", token))?);
        } else if parse_number_unit(token).is_some() {
            lengths.push(parse_px(token).ok_or_else(|| format!("bad length '{}'", token))?);
        } else {
            return Err(format!("unexpected token '{}'", token));
        }
    }
    let (offset_x, offset_y, blur, spread) = match lengths.as_slice() {
        [x, y] => (*x, *y, 0.0, 0.0),
        [x, y, b] => (*x, *y, *b, 0.0),
        [x, y, b, s] => (*x, *y, *b, *s),
        _ => return Err(format!("expected 2-4 lengths, got {}", lengths.len())),
    };
    if blur < 0.0 {
        return Err("negative blur radius".into());
    }
    Ok(Shadow {
        offset_x,
        offset_y,
        blur,
        spread,
        color: color.unwrap_or(current_color),
        inset,
    })
}

fn parse_list(property: &str, raw: &str, current_color: Rgba, allow_box_features: bool) -> Decoded<Vec<Shadow>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Decoded::ok(Vec::new());
    }
    let mut shadows = Vec::new();
    let mut markers = Vec::new();
    for part in split_top_level(raw, ',') {
        match parse_one(part, current_color) {
            Ok(mut shadow) => {
                if !allow_box_features && (shadow.inset || shadow.spread != 0.0) {
                    markers.push(Marker::unsupported(property, part, "text shadows take no spread or inset"));
                    shadow.inset = false;
                    shadow.spread = 0.0;
                }
                shadows.push(shadow);
            }
            Err(reason) => markers.push(Marker::unsupported(property, part, reason)),
        }
    }
    Decoded::with_markers(shadows, markers)
}

/// `box-shadow` list in declared order (first is painted on top)
pub fn parse_box_shadows(raw: &str, current_color: Rgba) -> Decoded<Vec<Shadow>> {
    parse_list("box-shadow", raw, current_color, true)
}

pub fn parse_text_shadows(raw: &str, current_color: Rgba) -> Decoded<Vec<Shadow>> {
    parse_list("text-shadow", raw, current_color, false)
}
