use super::Decoded;
use crate::ir::{Marker, Matrix};
use crate::style::tokens::{parse_angle, parse_function, parse_number_unit, split_top_level, split_whitespace_top_level};

fn args_of(args: &str) -> Vec<&str> {
    let commas = split_top_level(args, ',');
    if commas.len() > 1 {
        commas
    } else {
        split_whitespace_top_level(args)
    }
}

fn number(token: &str) -> Option<f32> {
    match parse_number_unit(token)? {
        (v, "") => Some(v),
        (v, "%") => Some(v / 100.0),
        _ => None,
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

enum Step {
    Flat(Matrix),
    /// 3D function flattened to its 2D projection
    Projected(Matrix),
}

fn parse_one(token: &str, box_size: (f32, f32)) -> Result<Step, String> {
    let (name, args) = parse_function(token).ok_or_else(|| format!("not a transform function: '{}'", token))?;
    let a = args_of(args);
    let bad = || format!("bad arguments for {}()", name);
    let n = |i: usize| a.get(i).and_then(|t| number(t)).ok_or_else(bad);
    let len = |i: usize, basis: f32| a.get(i).and_then(|t| length(t, basis)).ok_or_else(bad);
    let ang = |i: usize| a.get(i).and_then(|t| parse_angle(t)).map(f32::to_radians).ok_or_else(bad);

    let m = match name.to_ascii_lowercase().as_str() {
        "matrix" => {
            if a.len() != 6 {
                return Err(bad());
            }
            Matrix::new(n(0)?, n(1)?, n(2)?, n(3)?, n(4)?, n(5)?)
        }
        "translate" => {
            let ty = if a.len() > 1 { len(1, box_size.1)? } else { 0.0 };
            Matrix::translate(len(0, box_size.0)?, ty)
        }
        "translatex" => Matrix::translate(len(0, box_size.0)?, 0.0),
        "translatey" => Matrix::translate(0.0, len(0, box_size.1)?),
        "scale" => {
            let sx = n(0)?;
            let sy = if a.len() > 1 { n(1)? } else { sx };
            Matrix::scale(sx, sy)
        }
        "scalex" => Matrix::scale(n(0)?, 1.0),
        "scaley" => Matrix::scale(1.0, n(0)?),
        "rotate" | "rotatez" => Matrix::rotate(ang(0)?),
        "skew" => {
            let ay = if a.len() > 1 { ang(1)? } else { 0.0 };
            Matrix::skew(ang(0)?, ay)
        }
        "skewx" => Matrix::skew(ang(0)?, 0.0),
        "skewy" => Matrix::skew(0.0, ang(0)?),
        "matrix3d" => {
            if a.len() != 16 {
                return Err(bad());
            }
            let v: Vec<f32> = (0..16).map(n).collect::<Result<_, _>>()?;
            let flat = Matrix::new(v[0], v[1], v[4], v[5], v[12], v[13]);
            let is_2d = [v[2], v[3], v[6], v[7], v[8], v[9], v[11], v[14]].iter().all(|x| *x == 0.0)
                && v[10] == 1.0
                && v[15] == 1.0;
            return Ok(if is_2d { Step::Flat(flat) } else { Step::Projected(flat) });
        }
        "translate3d" => return Ok(Step::Projected(Matrix::translate(len(0, box_size.0)?, len(1, box_size.1)?))),
        "scale3d" => return Ok(Step::Projected(Matrix::scale(n(0)?, n(1)?))),
        "translatez" | "perspective" | "rotatex" | "rotatey" | "rotate3d" | "scalez" => {
            return Ok(Step::Projected(Matrix::IDENTITY))
        }
        _ => return Err(format!("unknown transform function '{}'", name)),
    };
    Ok(Step::Flat(m))
}

/// Parse a `transform` value into a 2D affine about `origin` (box-local
/// pixels). Functions compose left to right as in CSS.
pub fn parse_transform(raw: &str, origin: (f32, f32), box_size: (f32, f32)) -> Decoded<Matrix> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Decoded::ok(Matrix::IDENTITY);
    }
    let mut markers = Vec::new();
    let mut m = Matrix::IDENTITY;
    for token in split_whitespace_top_level(raw) {
        match parse_one(token, box_size) {
            Ok(Step::Flat(step)) => m = m.multiply(&step),
            Ok(Step::Projected(step)) => {
                markers.push(Marker::unsupported("transform", token, "3D transform flattened to 2D"));
                m = m.multiply(&step);
            }
            Err(reason) => markers.push(Marker::unsupported("transform", token, reason)),
        }
    }
    let about_origin = Matrix::translate(origin.0, origin.1)
        .multiply(&m)
        .multiply(&Matrix::translate(-origin.0, -origin.1));
    Decoded::with_markers(about_origin, markers)
}

/// Resolve `transform-origin` to box-local pixels; defaults to the center
pub fn parse_origin(raw: &str, box_size: (f32, f32)) -> (f32, f32) {
    let center = (box_size.0 / 2.0, box_size.1 / 2.0);
    let words = split_whitespace_top_level(raw);
    let axis = |w: &str, basis: f32| -> Option<f32> {
        match w.to_ascii_lowercase().as_str() {
            "left" | "top" => Some(0.0),
            "center" => Some(basis / 2.0),
            "right" | "bottom" => Some(basis),
            other => length(other, basis),
        }
    };
    match words.as_slice() {
        [] => center,
        [one] => {
            let lower = one.to_ascii_lowercase();
            if lower == "top" || lower == "bottom" {
                (center.0, axis(*one, box_size.1).unwrap_or(center.1))
            } else {
                (axis(*one, box_size.0).unwrap_or(center.0), center.1)
            }
        }
        [x, y, ..] => {
            let (lx, ly) = (x.to_ascii_lowercase(), y.to_ascii_lowercase());
            let (x, y): (&str, &str) = if lx == "top" || lx == "bottom" || ly == "left" || ly == "right" {
                (*y, *x)
            } else {
                (*x, *y)
            };
            (
                axis(x, box_size.0).unwrap_or(center.0),
                axis(y, box_size.1).unwrap_or(center.1),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-4 && (a.1 - b.1).abs() < 1e-4
    }

    #[test]
    fn computed_matrix_passes_through() {
        let d = parse_transform("matrix(1, 0, 0, 1, 10, 20)", (0.0, 0.0), (0.0, 0.0));
        assert!(!d.is_partial());
        assert_eq!(d.value, Matrix::translate(10.0, 20.0));
    }

    #[test]
    fn functions_compose_left_to_right() {
        let d = parse_transform("translate(10px, 0) scale(2)", (0.0, 0.0), (100.0, 100.0));
        assert!(close(d.value.apply(1.0, 1.0), (12.0, 2.0)));
    }

    #[test]
    fn rotation_about_center() {
        let d = parse_transform("rotate(90deg)", (50.0, 50.0), (100.0, 100.0));
        // the center is a fixed point
        assert!(close(d.value.apply(50.0, 50.0), (50.0, 50.0)));
        assert!(close(d.value.apply(100.0, 50.0), (50.0, 100.0)));
    }

    #[test]
    fn percent_translate_uses_box() {
        let d = parse_transform("translateX(-50%)", (0.0, 0.0), (40.0, 10.0));
        assert_eq!(d.value.e, -20.0);
    }

    #[test]
    fn three_d_is_marked() {
        let d = parse_transform("perspective(100px) rotateY(30deg) translate(1px)", (0.0, 0.0), (10.0, 10.0));
        assert_eq!(d.markers.len(), 2);
        assert_eq!(d.value.e, 1.0);
        let flat3d = parse_transform("matrix3d(1,0,0,0,0,1,0,0,0,0,1,0,5,6,0,1)", (0.0, 0.0), (0.0, 0.0));
        assert!(!flat3d.is_partial());
        assert_eq!(flat3d.value, Matrix::translate(5.0, 6.0));
    }

    #[test]
    fn origin_keywords() {
        assert_eq!(parse_origin("", (10.0, 20.0)), (5.0, 10.0));
        assert_eq!(parse_origin("left top", (10.0, 20.0)), (0.0, 0.0));
        assert_eq!(parse_origin("top right", (10.0, 20.0)), (10.0, 0.0));
        assert_eq!(parse_origin("2px 25%", (10.0, 20.0)), (2.0, 5.0));
    }
}
