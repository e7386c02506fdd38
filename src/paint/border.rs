use super::color::Rgba;
use super::Decoded;
use crate::ir::Marker;
use crate::style::tokens::{parse_number_unit, split_whitespace_top_level};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    #[default]
    None,
    Hidden,
    Solid,
    Dashed,
    Dotted,
    Double,
    Groove,
    Ridge,
    Inset,
    Outset,
}

impl BorderStyle {
    pub fn parse(raw: &str) -> Option<BorderStyle> {
        Some(match raw.trim().to_ascii_lowercase().as_str() {
            "" | "none" => BorderStyle::None,
            "hidden" => BorderStyle::Hidden,
            "solid" => BorderStyle::Solid,
            "dashed" => BorderStyle::Dashed,
            "dotted" => BorderStyle::Dotted,
            "double" => BorderStyle::Double,
            "groove" => BorderStyle::Groove,
            "ridge" => BorderStyle::Ridge,
            "inset" => BorderStyle::Inset,
            "outset" => BorderStyle::Outset,
            _ => return None,
        })
    }

    pub fn is_visible(self) -> bool {
        !matches!(self, BorderStyle::None | BorderStyle::Hidden)
    }

    /// Styles a vector canvas can only draw as a plain solid stroke
    fn is_approximated(self) -> bool {
        matches!(
            self,
            BorderStyle::Double | BorderStyle::Groove | BorderStyle::Ridge | BorderStyle::Inset | BorderStyle::Outset
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BorderSide {
    pub width: f32,
    pub style: BorderStyle,
    pub color: Rgba,
}

impl BorderSide {
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.style.is_visible() && !self.color.is_transparent()
    }
}

/// Elliptical corner radius in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CornerRadius {
    pub x: f32,
    pub y: f32,
}

impl CornerRadius {
    pub const fn circular(r: f32) -> Self {
        Self { x: r, y: r }
    }

    pub fn is_zero(&self) -> bool {
        self.x <= 0.0 || self.y <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CornerRadii {
    pub top_left: CornerRadius,
    pub top_right: CornerRadius,
    pub bottom_right: CornerRadius,
    pub bottom_left: CornerRadius,
}

impl CornerRadii {
    pub fn uniform(r: f32) -> Self {
        let c = CornerRadius::circular(r);
        Self {
            top_left: c,
            top_right: c,
            bottom_right: c,
            bottom_left: c,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.corners().iter().all(CornerRadius::is_zero)
    }

    /// Clockwise from top-left
    pub fn corners(&self) -> [CornerRadius; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    /// Whether all corners are circular and equal
    pub fn is_uniform(&self) -> bool {
        let c = self.top_left;
        c.x == c.y && self.corners().iter().all(|o| *o == c)
    }

    /// Scale all radii down so adjacent radii never overlap on a side
    pub fn clamp_to(&mut self, width: f32, height: f32) {
        let ratio = |len: f32, sum: f32| if sum > len && sum > 0.0 { len / sum } else { 1.0 };
        let f = ratio(width, self.top_left.x + self.top_right.x)
            .min(ratio(width, self.bottom_left.x + self.bottom_right.x))
            .min(ratio(height, self.top_left.y + self.bottom_left.y))
            .min(ratio(height, self.top_right.y + self.bottom_right.y))
            .max(0.0);
        if f < 1.0 {
            for c in [
                &mut self.top_left,
                &mut self.top_right,
                &mut self.bottom_right,
                &mut self.bottom_left,
            ] {
                c.x *= f;
                c.y *= f;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Border {
    pub top: BorderSide,
    pub right: BorderSide,
    pub bottom: BorderSide,
    pub left: BorderSide,
    #[serde(default)]
    pub radii: CornerRadii,
}

impl Border {
    pub fn sides(&self) -> [&BorderSide; 4] {
        [&self.top, &self.right, &self.bottom, &self.left]
    }

    pub fn has_visible_side(&self) -> bool {
        self.sides().iter().any(|s| s.is_visible())
    }

    /// Same visible stroke on all four sides
    pub fn is_uniform(&self) -> bool {
        let t = self.top;
        self.sides().iter().all(|s| **s == t)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SideInput<'a> {
    pub width: &'a str,
    pub style: &'a str,
    pub color: &'a str,
}

/// Captured border longhands of one element
#[derive(Debug, Clone, Copy, Default)]
pub struct BorderInput<'a> {
    pub top: SideInput<'a>,
    pub right: SideInput<'a>,
    pub bottom: SideInput<'a>,
    pub left: SideInput<'a>,
    /// top-left, top-right, bottom-right, bottom-left
    pub radii: [&'a str; 4],
    pub box_size: (f32, f32),
    pub current_color: Rgba,
}

const SIDE_NAMES: [&str; 4] = ["top", "right", "bottom", "left"];
const CORNER_NAMES: [&str; 4] = ["top-left", "top-right", "bottom-right", "bottom-left"];

fn decode_side(name: &str, input: SideInput<'_>, current_color: Rgba, markers: &mut Vec<Marker>) -> BorderSide {
    let style = BorderStyle::parse(input.style).unwrap_or_else(|| {
        markers.push(Marker::unsupported(
            format!("border-{}-style", name),
            input.style,
            "unknown border style",
        ));
        BorderStyle::Solid
    });
    if style.is_approximated() {
        markers.push(Marker::unsupported(
            format!("border-{}-style", name),
            input.style,
            "drawn as a solid stroke",
        ));
    }
    let width = match input.width.trim() {
        "" => 0.0,
        "thin" => 1.0,
        "medium" => 3.0,
        "thick" => 5.0,
        raw => match parse_number_unit(raw) {
            Some((v, "px")) => v.max(0.0),
            Some((v, "")) if v == 0.0 => 0.0,
            _ => {
                markers.push(Marker::unsupported(format!("border-{}-width", name), raw, "unresolved width"));
                0.0
            }
        },
    };
    let color = match input.color.trim() {
        "" => current_color,
        c if c.eq_ignore_ascii_case("currentcolor") => current_color,
        c => Rgba::parse(c).unwrap_or_else(|| {
            markers.push(Marker::unsupported(format!("border-{}-color", name), c, "unparseable color"));
            current_color
        }),
    };
    BorderSide {
        width: if style.is_visible() { width } else { 0.0 },
        style,
        color,
    }
}

fn radius_component(token: &str, basis: f32) -> Option<f32> {
    match parse_number_unit(token)? {
        (v, "px") => Some(v.max(0.0)),
        (v, "%") => Some((v / 100.0 * basis).max(0.0)),
        (v, "") if v == 0.0 => Some(0.0),
        _ => None,
    }
}

/// Parse one corner's computed radius (`"4px"` or `"4px 10%"`)
pub fn parse_corner(raw: &str, box_size: (f32, f32)) -> Option<CornerRadius> {
    let tokens = split_whitespace_top_level(raw);
    match tokens.as_slice() {
        [] => Some(CornerRadius::default()),
        [r] => Some(CornerRadius {
            x: radius_component(r, box_size.0)?,
            y: radius_component(r, box_size.1)?,
        }),
        [x, y] => Some(CornerRadius {
            x: radius_component(x, box_size.0)?,
            y: radius_component(y, box_size.1)?,
        }),
        _ => None,
    }
}

/// Decode sides and radii. `None` when nothing is visible and all corners
/// are square.
pub fn decode_border(input: BorderInput<'_>) -> Decoded<Option<Border>> {
    let mut markers = Vec::new();
    let sides = [input.top, input.right, input.bottom, input.left];
    let [top, right, bottom, left] =
        [0, 1, 2, 3].map(|i| decode_side(SIDE_NAMES[i], sides[i], input.current_color, &mut markers));

    let [tl, tr, br, bl] = [0, 1, 2, 3].map(|i| {
        parse_corner(input.radii[i], input.box_size).unwrap_or_else(|| {
            markers.push(Marker::unsupported(
                format!("border-{}-radius", CORNER_NAMES[i]),
                input.radii[i],
                "unresolved radius",
            ));
            CornerRadius::default()
        })
    });
    let mut radii = CornerRadii {
        top_left: tl,
        top_right: tr,
        bottom_right: br,
        bottom_left: bl,
    };
    radii.clamp_to(input.box_size.0, input.box_size.1);

    let border = Border {
        top,
        right,
        bottom,
        left,
        radii,
    };
    let value = if border.has_visible_side() || !radii.is_zero() {
        Some(border)
    } else {
        None
    };
    Decoded::with_markers(value, markers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side<'a>(width: &'a str, style: &'a str, color: &'a str) -> SideInput<'a> {
        SideInput { width, style, color }
    }

    #[test]
    fn decodes_four_independent_sides() {
        let d = decode_border(BorderInput {
            top: side("1px", "solid", "red"),
            right: side("2px", "dashed", "blue"),
            bottom: side("0px", "none", "red"),
            left: side("thin", "dotted", ""),
            box_size: (100.0, 50.0),
            current_color: Rgba::BLACK,
            ..Default::default()
        });
        assert!(!d.is_partial());
        let b = d.value.unwrap();
        assert_eq!(b.top.width, 1.0);
        assert_eq!(b.right.style, BorderStyle::Dashed);
        assert!(!b.bottom.is_visible());
        assert_eq!(b.left.width, 1.0);
        assert_eq!(b.left.color, Rgba::BLACK);
        assert!(!b.is_uniform());
    }

    #[test]
    fn radius_only_border_is_kept() {
        let d = decode_border(BorderInput {
            radii: ["8px", "8px", "8px", "8px"],
            box_size: (100.0, 100.0),
            ..Default::default()
        });
        let b = d.value.unwrap();
        assert!(!b.has_visible_side());
        assert!(b.radii.is_uniform());
        assert_eq!(b.radii.top_left.x, 8.0);
    }

    #[test]
    fn percentages_and_elliptical_radii() {
        let c = parse_corner("50%", (200.0, 100.0)).unwrap();
        assert_eq!(c, CornerRadius { x: 100.0, y: 50.0 });
        let c = parse_corner("10px 20px", (200.0, 100.0)).unwrap();
        assert_eq!(c, CornerRadius { x: 10.0, y: 20.0 });
    }

    #[test]
    fn oversized_radii_are_scaled_down() {
        let mut radii = CornerRadii::uniform(80.0);
        radii.clamp_to(100.0, 100.0);
        assert_eq!(radii.top_left.x, 50.0);
        assert_eq!(radii.bottom_right.y, 50.0);
    }

    #[test]
    fn approximated_styles_are_marked() {
        let d = decode_border(BorderInput {
            top: side("3px", "double", "red"),
            right: side("3px", "groove", "red"),
            ..Default::default()
        });
        assert_eq!(d.markers.len(), 2);
        assert!(d.value.unwrap().top.is_visible());
    }

    #[test]
    fn nothing_visible_is_none() {
        let d = decode_border(BorderInput::default());
        assert!(d.value.is_none());
    }
}
