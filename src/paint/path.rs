//! SVG path data and vector shapes.
//!
//! Path data is normalised on parse: relative commands become absolute,
//! `H`/`V` become line-tos and the smooth curve forms (`S`/`T`) are expanded
//! with their reflected control points, so consumers only ever see six
//! command kinds.

use super::color::Rgba;
use super::Decoded;
use crate::ir::Marker;
use crate::snapshot::RawPath;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum PathCommand {
    MoveTo {
        x: f32,
        y: f32,
    },
    LineTo {
        x: f32,
        y: f32,
    },
    CubicTo {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        x: f32,
        y: f32,
    },
    QuadTo {
        x1: f32,
        y1: f32,
        x: f32,
        y: f32,
    },
    #[serde(rename_all = "camelCase")]
    ArcTo {
        rx: f32,
        ry: f32,
        rotation: f32,
        large_arc: bool,
        sweep: bool,
        x: f32,
        y: f32,
    },
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: Rgba,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorPath {
    pub commands: Vec<PathCommand>,
    #[serde(default)]
    pub fill: Option<Rgba>,
    #[serde(default)]
    pub fill_rule: FillRule,
    #[serde(default)]
    pub stroke: Option<Stroke>,
}

impl VectorPath {
    pub fn to_svg_path(&self) -> String {
        to_svg_path(&self.commands)
    }
}

struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            bytes: s.as_bytes(),
            pos: 0,
        }
    }

    fn skip_separators(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if b.is_ascii_whitespace() || b == b',' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn peek_command(&mut self) -> Option<u8> {
        self.skip_separators();
        self.bytes.get(self.pos).copied().filter(u8::is_ascii_alphabetic)
    }

    fn at_end(&mut self) -> bool {
        self.skip_separators();
        self.pos >= self.bytes.len()
    }

    /// Whether another number follows (implicit command repetition)
    fn has_number(&mut self) -> bool {
        self.skip_separators();
        matches!(self.bytes.get(self.pos), Some(b) if b.is_ascii_digit() || *b == b'-' || *b == b'+' || *b == b'.')
    }

    fn number(&mut self) -> Result<f32, String> {
        self.skip_separators();
        let start = self.pos;
        let b = self.bytes;
        if matches!(b.get(self.pos), Some(b'-') | Some(b'+')) {
            self.pos += 1;
        }
        let mut seen_dot = false;
        while let Some(&c) = b.get(self.pos) {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if c == b'.' && !seen_dot {
                seen_dot = true;
                self.pos += 1;
            } else {
                break;
            }
        }
        if matches!(b.get(self.pos), Some(b'e') | Some(b'E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(b.get(self.pos), Some(b'-') | Some(b'+')) {
                self.pos += 1;
            }
            if matches!(b.get(self.pos), Some(c) if c.is_ascii_digit()) {
                while matches!(b.get(self.pos), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                self.pos = save;
            }
        }
        let text = std::str::from_utf8(&b[start..self.pos]).map_err(|e| e.to_string())?;
        text.parse::<f32>()
            .map_err(|_| format!("expected number at offset {}", start))
    }

    /// Arc flags may be written without separators (`a1 1 0 011 1`)
    fn flag(&mut self) -> Result<bool, String> {
        self.skip_separators();
        match self.bytes.get(self.pos) {
            Some(b'0') => {
                self.pos += 1;
                Ok(false)
            }
            Some(b'1') => {
                self.pos += 1;
                Ok(true)
            }
            _ => Err(format!("expected arc flag at offset {}", self.pos)),
        }
    }
}

/// Parse SVG path data into absolute commands.
///
/// On a syntax error the commands parsed so far are returned with the error
/// message, so a partially valid path still draws.
pub fn parse_path_data(d: &str) -> (Vec<PathCommand>, Option<String>) {
    let mut out = Vec::new();
    let mut lx = Lexer::new(d);
    let (mut cx, mut cy) = (0.0f32, 0.0f32);
    let (mut sx, mut sy) = (0.0f32, 0.0f32);
    // last control point for S/T reflection
    let mut last_cubic: Option<(f32, f32)> = None;
    let mut last_quad: Option<(f32, f32)> = None;
    let mut command: Option<u8> = None;

    while !lx.at_end() {
        let cmd = match lx.peek_command() {
            Some(c) => {
                lx.pos += 1;
                c
            }
            None => match command {
                // implicit repetition; a repeated moveto is a lineto
                Some(b'M') if lx.has_number() => b'L',
                Some(b'm') if lx.has_number() => b'l',
                Some(c) if lx.has_number() => c,
                _ => return (out, Some(format!("unexpected input at offset {}", lx.pos))),
            },
        };
        if out.is_empty() && !matches!(cmd, b'M' | b'm') {
            return (out, Some("path data must start with a moveto".into()));
        }
        command = Some(cmd);
        let rel = cmd.is_ascii_lowercase();
        let (ox, oy) = if rel { (cx, cy) } else { (0.0, 0.0) };

        let step = (|| -> Result<PathCommand, String> {
            Ok(match cmd.to_ascii_uppercase() {
                b'M' => {
                    let (x, y) = (lx.number()? + ox, lx.number()? + oy);
                    PathCommand::MoveTo { x, y }
                }
                b'L' => {
                    let (x, y) = (lx.number()? + ox, lx.number()? + oy);
                    PathCommand::LineTo { x, y }
                }
                b'H' => {
                    let x = lx.number()? + ox;
                    PathCommand::LineTo { x, y: cy }
                }
                b'V' => {
                    let y = lx.number()? + oy;
                    PathCommand::LineTo { x: cx, y }
                }
                b'C' => {
                    let (x1, y1) = (lx.number()? + ox, lx.number()? + oy);
                    let (x2, y2) = (lx.number()? + ox, lx.number()? + oy);
                    let (x, y) = (lx.number()? + ox, lx.number()? + oy);
                    PathCommand::CubicTo { x1, y1, x2, y2, x, y }
                }
                b'S' => {
                    let (x1, y1) = match last_cubic {
                        Some((px, py)) => (2.0 * cx - px, 2.0 * cy - py),
                        None => (cx, cy),
                    };
                    let (x2, y2) = (lx.number()? + ox, lx.number()? + oy);
                    let (x, y) = (lx.number()? + ox, lx.number()? + oy);
                    PathCommand::CubicTo { x1, y1, x2, y2, x, y }
                }
                b'Q' => {
                    let (x1, y1) = (lx.number()? + ox, lx.number()? + oy);
                    let (x, y) = (lx.number()? + ox, lx.number()? + oy);
                    PathCommand::QuadTo { x1, y1, x, y }
                }
                b'T' => {
                    let (x1, y1) = match last_quad {
                        Some((px, py)) => (2.0 * cx - px, 2.0 * cy - py),
                        None => (cx, cy),
                    };
                    let (x, y) = (lx.number()? + ox, lx.number()? + oy);
                    PathCommand::QuadTo { x1, y1, x, y }
                }
                b'A' => {
                    let rx = lx.number()?.abs();
                    let ry = lx.number()?.abs();
                    let rotation = lx.number()?;
                    let large_arc = lx.flag()?;
                    let sweep = lx.flag()?;
                    let (x, y) = (lx.number()? + ox, lx.number()? + oy);
                    PathCommand::ArcTo {
                        rx,
                        ry,
                        rotation,
                        large_arc,
                        sweep,
                        x,
                        y,
                    }
                }
                b'Z' => PathCommand::Close,
                other => return Err(format!("unknown path command '{}'", other as char)),
            })
        })();

        let step = match step {
            Ok(step) => step,
            Err(e) => return (out, Some(e)),
        };

        last_cubic = None;
        last_quad = None;
        match step {
            PathCommand::MoveTo { x, y } => {
                (cx, cy) = (x, y);
                (sx, sy) = (x, y);
            }
            PathCommand::LineTo { x, y } | PathCommand::ArcTo { x, y, .. } => (cx, cy) = (x, y),
            PathCommand::CubicTo { x2, y2, x, y, .. } => {
                last_cubic = Some((x2, y2));
                (cx, cy) = (x, y);
            }
            PathCommand::QuadTo { x1, y1, x, y } => {
                last_quad = Some((x1, y1));
                (cx, cy) = (x, y);
            }
            PathCommand::Close => {
                (cx, cy) = (sx, sy);
                // Z takes no arguments and cannot repeat implicitly
                command = None;
            }
        }
        out.push(step);
    }
    (out, None)
}

/// Serialise absolute commands back to compact path data
pub fn to_svg_path(commands: &[PathCommand]) -> String {
    let mut s = String::new();
    for (i, c) in commands.iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        let _ = match *c {
            PathCommand::MoveTo { x, y } => write!(s, "M {} {}", x, y),
            PathCommand::LineTo { x, y } => write!(s, "L {} {}", x, y),
            PathCommand::CubicTo { x1, y1, x2, y2, x, y } => {
                write!(s, "C {} {} {} {} {} {}", x1, y1, x2, y2, x, y)
            }
            PathCommand::QuadTo { x1, y1, x, y } => write!(s, "Q {} {} {} {}", x1, y1, x, y),
            PathCommand::ArcTo {
                rx,
                ry,
                rotation,
                large_arc,
                sweep,
                x,
                y,
            } => write!(
                s,
                "A {} {} {} {} {} {} {}",
                rx,
                ry,
                rotation,
                u8::from(large_arc),
                u8::from(sweep),
                x,
                y
            ),
            PathCommand::Close => write!(s, "Z"),
        };
    }
    s
}

fn paint_attr(property: &str, raw: Option<&str>, default: Option<Rgba>, current_color: Rgba, markers: &mut Vec<Marker>) -> Option<Rgba> {
    let Some(raw) = raw.map(str::trim) else {
        return default;
    };
    if raw.is_empty() {
        return default;
    }
    if raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("transparent") {
        return None;
    }
    if raw.eq_ignore_ascii_case("currentcolor") {
        return Some(current_color);
    }
    match Rgba::parse(raw) {
        Some(c) => Some(c),
        None => {
            // url(#gradient) paint servers are not resolved
            markers.push(Marker::unsupported(property, raw, "paint server approximated by current color"));
            Some(current_color)
        }
    }
}

/// Decode one captured SVG shape into a vector path
pub fn decode_vector(raw: &RawPath, current_color: Rgba) -> Decoded<VectorPath> {
    let mut markers = Vec::new();
    let (commands, error) = parse_path_data(&raw.d);
    if let Some(reason) = error {
        markers.push(Marker::unsupported("d", raw.d.as_str(), reason));
    }
    // SVG defaults: fill black, no stroke
    let fill = paint_attr("fill", raw.fill.as_deref(), Some(Rgba::BLACK), current_color, &mut markers);
    let stroke = paint_attr("stroke", raw.stroke.as_deref(), None, current_color, &mut markers).map(|color| Stroke {
        color,
        width: raw.stroke_width.unwrap_or(1.0).max(0.0),
    });
    let fill_rule = match raw.fill_rule.as_deref().map(str::trim) {
        Some("evenodd") => FillRule::EvenOdd,
        Some("nonzero") | Some("") | None => FillRule::NonZero,
        Some(other) => {
            markers.push(Marker::unsupported("fill-rule", other, "unknown fill rule"));
            FillRule::NonZero
        }
    };
    Decoded::with_markers(
        VectorPath {
            commands,
            fill,
            fill_rule,
            stroke,
        },
        markers,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_commands_become_absolute() {
        let (cmds, err) = parse_path_data("m10 10 l5 0 h5 v-10 z");
        assert!(err.is_none());
        assert_eq!(
            cmds,
            vec![
                PathCommand::MoveTo { x: 10.0, y: 10.0 },
                PathCommand::LineTo { x: 15.0, y: 10.0 },
                PathCommand::LineTo { x: 20.0, y: 10.0 },
                PathCommand::LineTo { x: 20.0, y: 0.0 },
                PathCommand::Close,
            ]
        );
    }

    #[test]
    fn implicit_repetition_and_compact_numbers() {
        let (cmds, err) = parse_path_data("M0,0 10,10L1.5.5-2-2");
        assert!(err.is_none());
        assert_eq!(cmds[1], PathCommand::LineTo { x: 10.0, y: 10.0 });
        assert_eq!(cmds[2], PathCommand::LineTo { x: 1.5, y: 0.5 });
        assert_eq!(cmds[3], PathCommand::LineTo { x: -2.0, y: -2.0 });
    }

    #[test]
    fn smooth_curves_reflect_control_points() {
        let (cmds, _) = parse_path_data("M0 0 C0 10 10 10 10 0 S20 -10 20 0");
        assert_eq!(
            cmds[2],
            PathCommand::CubicTo {
                x1: 10.0,
                y1: -10.0,
                x2: 20.0,
                y2: -10.0,
                x: 20.0,
                y: 0.0
            }
        );
    }

    #[test]
    fn arcs_accept_packed_flags() {
        let (cmds, err) = parse_path_data("M0 0a5 5 0 015 5");
        assert!(err.is_none());
        assert_eq!(
            cmds[1],
            PathCommand::ArcTo {
                rx: 5.0,
                ry: 5.0,
                rotation: 0.0,
                large_arc: false,
                sweep: true,
                x: 5.0,
                y: 5.0
            }
        );
    }

    #[test]
    fn syntax_errors_keep_the_valid_prefix() {
        let (cmds, err) = parse_path_data("M0 0 L10 10 L oops");
        assert_eq!(cmds.len(), 2);
        assert!(err.is_some());
    }

    #[test]
    fn serialises_back_to_path_data() {
        let (cmds, _) = parse_path_data("M0 0 L10 0 Z");
        assert_eq!(to_svg_path(&cmds), "M 0 0 L 10 0 Z");
    }

    #[test]
    fn decodes_shape_paint() {
        let raw = RawPath {
            d: "M0 0 L1 1".into(),
            fill: Some("none".into()),
            stroke: Some("currentColor".into()),
            stroke_width: Some(2.0),
            fill_rule: Some("evenodd".into()),
        };
        let d = decode_vector(&raw, Rgba::new(1.0, 0.0, 0.0, 1.0));
        assert!(!d.is_partial());
        assert_eq!(d.value.fill, None);
        assert_eq!(d.value.stroke.unwrap().width, 2.0);
        assert_eq!(d.value.fill_rule, FillRule::EvenOdd);

        let d = decode_vector(&RawPath { d: "M0 0".into(), fill: Some("url(#g)".into()), ..Default::default() }, Rgba::BLACK);
        assert_eq!(d.markers.len(), 1);
    }
}
