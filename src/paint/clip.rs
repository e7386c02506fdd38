use super::background::{decode_image, Paint};
use super::path::{parse_path_data, FillRule, PathCommand};
use super::Decoded;
use crate::ir::Marker;
use crate::style::tokens::{parse_function, parse_number_unit, split_top_level, split_whitespace_top_level, unquote};
use serde::{Deserialize, Serialize};

/// Clip-path shape in box-local pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "camelCase")]
pub enum ClipShape {
    Inset {
        top: f32,
        right: f32,
        bottom: f32,
        left: f32,
        #[serde(default)]
        radius: f32,
    },
    Circle {
        radius: f32,
        center: (f32, f32),
    },
    Ellipse {
        rx: f32,
        ry: f32,
        center: (f32, f32),
    },
    #[serde(rename_all = "camelCase")]
    Polygon {
        points: Vec<(f32, f32)>,
        fill_rule: FillRule,
    },
    #[serde(rename_all = "camelCase")]
    Path {
        commands: Vec<PathCommand>,
        fill_rule: FillRule,
    },
    /// `url(#id)` to an SVG `<clipPath>`; not resolved
    Reference {
        url: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mask {
    /// Mask images, first declared on top
    pub layers: Vec<Paint>,
    #[serde(default)]
    pub mode: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<ClipShape>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<Mask>,
}

impl Clip {
    pub fn is_empty(&self) -> bool {
        self.shape.is_none() && self.mask.is_none()
    }
}

fn length(token: &str, basis: f32) -> Option<f32> {
    match parse_number_unit(token)? {
        (v, "px") => Some(v),
        (v, "%") => Some(v / 100.0 * basis),
        (v, "") if v == 0.0 => Some(0.0),
        _ => None,
    }
}

fn position(words: &[&str], size: (f32, f32)) -> Option<(f32, f32)> {
    let axis = |w: &str, basis: f32| match w.to_ascii_lowercase().as_str() {
        "left" | "top" => Some(0.0),
        "center" => Some(basis / 2.0),
        "right" | "bottom" => Some(basis),
        other => length(other, basis),
    };
    match words {
        [] => Some((size.0 / 2.0, size.1 / 2.0)),
        [one] => {
            let l = one.to_ascii_lowercase();
            if l == "top" || l == "bottom" {
                Some((size.0 / 2.0, axis(*one, size.1)?))
            } else {
                Some((axis(*one, size.0)?, size.1 / 2.0))
            }
        }
        [x, y] => {
            let (lx, ly) = (x.to_ascii_lowercase(), y.to_ascii_lowercase());
            if lx == "top" || lx == "bottom" || ly == "left" || ly == "right" {
                Some((axis(*y, size.0)?, axis(*x, size.1)?))
            } else {
                Some((axis(*x, size.0)?, axis(*y, size.1)?))
            }
        }
        _ => None,
    }
}

/// Radius keyword or length along one dimension
fn radius(token: &str, center: (f32, f32), size: (f32, f32), basis: f32, axis: Option<usize>) -> Option<f32> {
    let side_distances = |i: usize| {
        let c = if i == 0 { center.0 } else { center.1 };
        let s = if i == 0 { size.0 } else { size.1 };
        (c.abs(), (s - c).abs())
    };
    match token.to_ascii_lowercase().as_str() {
        "closest-side" => Some(match axis {
            Some(i) => {
                let (a, b) = side_distances(i);
                a.min(b)
            }
            None => {
                let (a, b) = side_distances(0);
                let (c, d) = side_distances(1);
                a.min(b).min(c).min(d)
            }
        }),
        "farthest-side" => Some(match axis {
            Some(i) => {
                let (a, b) = side_distances(i);
                a.max(b)
            }
            None => {
                let (a, b) = side_distances(0);
                let (c, d) = side_distances(1);
                a.max(b).max(c).max(d)
            }
        }),
        other => length(other, basis),
    }
}

fn split_at_keyword<'a>(words: &'a [&'a str]) -> (&'a [&'a str], &'a [&'a str]) {
    match words.iter().position(|w| w.eq_ignore_ascii_case("at")) {
        Some(i) => (&words[..i], &words[i + 1..]),
        None => (words, &[]),
    }
}

fn fill_rule_prefix(parts: &[&str]) -> (FillRule, usize) {
    match parts.first().map(|p| p.trim().to_ascii_lowercase()) {
        Some(ref r) if r == "evenodd" => (FillRule::EvenOdd, 1),
        Some(ref r) if r == "nonzero" => (FillRule::NonZero, 1),
        _ => (FillRule::NonZero, 0),
    }
}

fn parse_shape(name: &str, args: &str, size: (f32, f32)) -> Result<ClipShape, String> {
    let (w, h) = size;
    match name {
        "inset" => {
            let words = split_whitespace_top_level(args);
            let round = words.iter().position(|t| t.eq_ignore_ascii_case("round"));
            let (offsets, radius_words) = match round {
                Some(i) => (&words[..i], &words[i + 1..]),
                None => (&words[..], &words[words.len()..]),
            };
            let o: Vec<f32> = offsets
                .iter()
                .enumerate()
                .map(|(i, t)| length(t, if i % 2 == 0 { h } else { w }))
                .collect::<Option<_>>()
                .ok_or("bad inset offsets")?;
            let (top, right, bottom, left) = match o.as_slice() {
                [a] => (*a, *a, *a, *a),
                [a, b] => (*a, *b, *a, *b),
                [a, b, c] => (*a, *b, *c, *b),
                [a, b, c, d] => (*a, *b, *c, *d),
                _ => return Err("inset() takes 1-4 offsets".into()),
            };
            let radius = match radius_words.first() {
                Some(r) => length(r, w.min(h)).ok_or("bad inset radius")?,
                None => 0.0,
            };
            Ok(ClipShape::Inset {
                top,
                right,
                bottom,
                left,
                radius,
            })
        }
        "circle" => {
            let words = split_whitespace_top_level(args);
            let (r, at) = split_at_keyword(&words);
            let center = position(at, size).ok_or("bad circle position")?;
            let reference = ((w * w + h * h) / 2.0).sqrt();
            let radius = match r {
                [] => radius("closest-side", center, size, reference, None),
                [one] => radius(one, center, size, reference, None),
                _ => None,
            }
            .ok_or("bad circle radius")?;
            Ok(ClipShape::Circle { radius, center })
        }
        "ellipse" => {
            let words = split_whitespace_top_level(args);
            let (r, at) = split_at_keyword(&words);
            let center = position(at, size).ok_or("bad ellipse position")?;
            let (rx, ry) = match r {
                [] => (
                    radius("closest-side", center, size, w, Some(0)),
                    radius("closest-side", center, size, h, Some(1)),
                ),
                [a, b] => (radius(a, center, size, w, Some(0)), radius(b, center, size, h, Some(1))),
                _ => (None, None),
            };
            Ok(ClipShape::Ellipse {
                rx: rx.ok_or("bad ellipse radius")?,
                ry: ry.ok_or("bad ellipse radius")?,
                center,
            })
        }
        "polygon" => {
            let parts = split_top_level(args, ',');
            let (fill_rule, skip) = fill_rule_prefix(&parts);
            let points = parts[skip..]
                .iter()
                .map(|p| match split_whitespace_top_level(p).as_slice() {
                    [x, y] => Some((length(x, w)?, length(y, h)?)),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .ok_or("bad polygon point")?;
            if points.len() < 3 {
                return Err("polygon() needs at least three points".into());
            }
            Ok(ClipShape::Polygon { points, fill_rule })
        }
        "path" => {
            let parts = split_top_level(args, ',');
            let (fill_rule, skip) = fill_rule_prefix(&parts);
            let data = parts.get(skip).map(|d| unquote(d)).ok_or("path() without data")?;
            let (commands, error) = parse_path_data(data);
            if let Some(e) = error {
                return Err(e);
            }
            Ok(ClipShape::Path { commands, fill_rule })
        }
        "url" => Ok(ClipShape::Reference {
            url: unquote(args).to_string(),
        }),
        other => Err(format!("unsupported clip shape {}()", other)),
    }
}

/// Parse `clip-path` against the element's box size
pub fn parse_clip_path(raw: &str, size: (f32, f32)) -> Decoded<Option<ClipShape>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Decoded::ok(None);
    }
    let mut markers = Vec::new();
    let mut shape = None;
    for token in split_whitespace_top_level(raw) {
        let lower = token.to_ascii_lowercase();
        if matches!(
            lower.as_str(),
            "border-box" | "padding-box" | "content-box" | "margin-box" | "fill-box" | "stroke-box" | "view-box"
        ) {
            if lower != "border-box" {
                markers.push(Marker::unsupported("clip-path", token, "reference box treated as border-box"));
            }
            continue;
        }
        match parse_function(token) {
            Some((name, args)) => match parse_shape(&name.to_ascii_lowercase(), args, size) {
                Ok(s) => {
                    if let ClipShape::Reference { .. } = s {
                        markers.push(Marker::unsupported("clip-path", token, "SVG clip reference not resolved"));
                    }
                    shape = Some(s);
                }
                Err(reason) => markers.push(Marker::unsupported("clip-path", token, reason)),
            },
            None => markers.push(Marker::unsupported("clip-path", token, "unknown clip value")),
        }
    }
    Decoded::with_markers(shape, markers)
}

/// Parse `mask-image` layers
pub fn parse_mask_image(raw: &str, mode: &str, size: (f32, f32)) -> Decoded<Option<Mask>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Decoded::ok(None);
    }
    let mut markers = Vec::new();
    let layers: Vec<Paint> = split_top_level(raw, ',')
        .into_iter()
        .filter(|item| !item.eq_ignore_ascii_case("none"))
        .filter_map(|item| decode_image(item, size, &mut markers))
        .collect();
    for m in markers.iter_mut() {
        m.property = "mask-image".into();
    }
    let value = if layers.is_empty() {
        None
    } else {
        Some(Mask {
            layers,
            mode: mode.trim().to_string(),
        })
    };
    Decoded::with_markers(value, markers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inset_with_round() {
        let d = parse_clip_path("inset(10px 20% round 4px)", (100.0, 50.0));
        assert_eq!(
            d.value,
            Some(ClipShape::Inset {
                top: 10.0,
                right: 20.0,
                bottom: 10.0,
                left: 20.0,
                radius: 4.0
            })
        );
    }

    #[test]
    fn circle_defaults_to_closest_side_at_center() {
        let d = parse_clip_path("circle()", (100.0, 60.0));
        assert_eq!(
            d.value,
            Some(ClipShape::Circle {
                radius: 30.0,
                center: (50.0, 30.0)
            })
        );
        let d = parse_clip_path("circle(50% at left top)", (100.0, 100.0));
        match d.value {
            Some(ClipShape::Circle { radius, center }) => {
                assert!((radius - 50.0).abs() < 1e-3);
                assert_eq!(center, (0.0, 0.0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn polygon_with_fill_rule() {
        let d = parse_clip_path("polygon(evenodd, 0% 0%, 100% 0%, 50% 100%)", (10.0, 10.0));
        match d.value {
            Some(ClipShape::Polygon { points, fill_rule }) => {
                assert_eq!(fill_rule, FillRule::EvenOdd);
                assert_eq!(points, vec![(0.0, 0.0), (10.0, 0.0), (5.0, 10.0)]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn path_shape_and_reference() {
        let d = parse_clip_path("path('M0 0 L10 0 L5 5 Z')", (10.0, 10.0));
        assert!(matches!(d.value, Some(ClipShape::Path { ref commands, .. }) if commands.len() == 4));
        let d = parse_clip_path("url(#clip)", (10.0, 10.0));
        assert!(matches!(d.value, Some(ClipShape::Reference { ref url }) if url == "#clip"));
        assert!(d.is_partial());
    }

    #[test]
    fn bad_shapes_are_marked() {
        let d = parse_clip_path("polygon(0 0, 1px 1px)", (10.0, 10.0));
        assert_eq!(d.value, None);
        assert_eq!(d.markers.len(), 1);
    }

    #[test]
    fn mask_layers() {
        let d = parse_mask_image("linear-gradient(black, transparent), url(m.svg)", "alpha", (10.0, 10.0));
        let mask = d.value.unwrap();
        assert_eq!(mask.layers.len(), 2);
        assert_eq!(mask.mode, "alpha");
    }
}
