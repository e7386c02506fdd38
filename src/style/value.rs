//! Normalised style value shapes
//!
//! Captured values arrive as strings. The resolver turns each one into a
//! [`StyleValue`] once; later stages only look at typed records.

use super::tokens::{is_balanced, parse_function, parse_number_unit, split_top_level, split_whitespace_top_level};
use crate::ir::Matrix;
use crate::paint::Rgba;
use serde::{Deserialize, Serialize};

/// Root font size used to convert `em`/`rem` when the capture did not
/// already hand us pixels
pub const DEFAULT_FONT_SIZE: f32 = 16.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum StyleValue {
    /// Absolute length in CSS pixels
    Length(f32),
    Percentage(f32),
    Number(f32),
    /// Other well-formed dimension (angles, times, `fr`, viewport units)
    Dimension { value: f32, unit: String },
    Color(Rgba),
    Keyword(String),
    Matrix(Matrix),
    /// Well-formed functional syntax handled by a dedicated decoder
    Function(String),
    List(Vec<StyleValue>),
    /// Unparseable input, kept verbatim
    Raw(String),
}

/// Why a raw value could not be normalised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueError(pub String);

impl std::fmt::Display for ValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl StyleValue {
    pub fn parse(raw: &str) -> Result<StyleValue, ValueError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ValueError("empty value".into()));
        }
        if !is_balanced(raw) {
            return Err(ValueError("unbalanced parentheses or quotes".into()));
        }
        let commas = split_top_level(raw, ',');
        if commas.len() > 1 {
            let items = commas.into_iter().map(parse_space_list).collect::<Result<Vec<_>, _>>()?;
            return Ok(StyleValue::List(items));
        }
        parse_space_list(raw)
    }

    pub fn as_length(&self) -> Option<f32> {
        match self {
            StyleValue::Length(v) => Some(*v),
            StyleValue::Number(v) if *v == 0.0 => Some(0.0),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f32> {
        match self {
            StyleValue::Number(v) => Some(*v),
            StyleValue::Percentage(v) => Some(*v / 100.0),
            _ => None,
        }
    }

    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            StyleValue::Keyword(k) => Some(k.as_str()),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Rgba> {
        match self {
            StyleValue::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, StyleValue::Raw(_))
    }
}

fn parse_space_list(raw: &str) -> Result<StyleValue, ValueError> {
    let parts = split_whitespace_top_level(raw);
    match parts.as_slice() {
        [] => Err(ValueError("empty value".into())),
        [single] => parse_single(single),
        many => Ok(StyleValue::List(
            many.iter().map(|p| parse_single(p)).collect::<Result<Vec<_>, _>>()?,
        )),
    }
}

fn parse_single(token: &str) -> Result<StyleValue, ValueError> {
    let first = token.chars().next().unwrap_or(' ');
    if first.is_ascii_digit() || first == '.' || first == '-' || first == '+' {
        if let Some((value, unit)) = parse_number_unit(token) {
            return parse_dimension(value, unit, token);
        }
        if first == '-' {
            // vendor keyword such as -webkit-box
            return Ok(StyleValue::Keyword(token.to_ascii_lowercase()));
        }
        return Err(ValueError(format!("malformed number '{}'", token)));
    }
    if first == '#' {
        return Rgba::parse(token)
            .map(StyleValue::Color)
            .ok_or_else(|| ValueError(format!("malformed hex color '{}'", token)));
    }
    if first == '"' || first == '\'' {
        return Ok(StyleValue::Keyword(super::tokens::unquote(token).to_string()));
    }
    if let Some((name, args)) = parse_function(token) {
        let lname = name.to_ascii_lowercase();
        return match lname.as_str() {
            "matrix" => parse_matrix(args).map(StyleValue::Matrix),
            "rgb" | "rgba" | "hsl" | "hsla" | "hwb" | "lab" | "lch" | "oklab" | "oklch" => Rgba::parse(token)
                .map(StyleValue::Color)
                .ok_or_else(|| ValueError(format!("malformed color '{}'", token))),
            _ => Ok(StyleValue::Function(token.to_string())),
        };
    }
    if token.contains('(') || token.contains(')') {
        return Err(ValueError(format!("malformed function '{}'", token)));
    }
    if token.chars().all(|c| c.is_ascii_alphabetic()) {
        if let Some(color) = Rgba::parse(token) {
            return Ok(StyleValue::Color(color));
        }
    }
    Ok(StyleValue::Keyword(token.to_ascii_lowercase()))
}

fn parse_dimension(value: f32, unit: &str, token: &str) -> Result<StyleValue, ValueError> {
    let unit = unit.to_ascii_lowercase();
    let px = match unit.as_str() {
        "" => return Ok(StyleValue::Number(value)),
        "%" => return Ok(StyleValue::Percentage(value)),
        "px" => value,
        "pt" => value * 4.0 / 3.0,
        "pc" => value * 16.0,
        "in" => value * 96.0,
        "cm" => value * 96.0 / 2.54,
        "mm" => value * 96.0 / 25.4,
        "q" => value * 96.0 / 101.6,
        "em" | "rem" => value * DEFAULT_FONT_SIZE,
        "deg" | "rad" | "grad" | "turn" | "s" | "ms" | "fr" | "vw" | "vh" | "vmin" | "vmax" | "ch" | "ex" | "dpi"
        | "dppx" | "x" => return Ok(StyleValue::Dimension { value, unit }),
        _ => return Err(ValueError(format!("unknown unit in '{}'", token))),
    };
    Ok(StyleValue::Length(px))
}

fn parse_matrix(args: &str) -> Result<Matrix, ValueError> {
    let nums: Vec<f32> = split_top_level(args, ',')
        .iter()
        .map(|s| s.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|_| ValueError(format!("malformed matrix({})", args)))?;
    match nums.as_slice() {
        [a, b, c, d, e, f] => Ok(Matrix::new(*a, *b, *c, *d, *e, *f)),
        _ => Err(ValueError(format!("matrix() expects 6 values, got {}", nums.len()))),
    }
}
