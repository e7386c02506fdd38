//! Property registry: which properties inherit and what their initial
//! values are.

/// Static description of a known property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: &'static str,
    pub inherits: bool,
    pub initial: &'static str,
}

const fn def(name: &'static str, inherits: bool, initial: &'static str) -> PropertyDef {
    PropertyDef { name, inherits, initial }
}

/// Every property the pipeline queries
pub const PROPERTIES: &[PropertyDef] = &[
    // inherited
    def("color", true, "rgb(0, 0, 0)"),
    def("font-family", true, "sans-serif"),
    def("font-size", true, "16px"),
    def("font-weight", true, "400"),
    def("font-style", true, "normal"),
    def("line-height", true, "normal"),
    def("letter-spacing", true, "normal"),
    def("word-spacing", true, "normal"),
    def("text-align", true, "start"),
    def("text-transform", true, "none"),
    def("text-indent", true, "0px"),
    def("text-shadow", true, "none"),
    def("white-space", true, "normal"),
    def("visibility", true, "visible"),
    def("direction", true, "ltr"),
    def("writing-mode", true, "horizontal-tb"),
    def("cursor", true, "auto"),
    def("list-style-type", true, "disc"),
    def("-webkit-text-fill-color", true, "currentcolor"),
    // not inherited
    def("display", false, "inline"),
    def("position", false, "static"),
    def("top", false, "auto"),
    def("right", false, "auto"),
    def("bottom", false, "auto"),
    def("left", false, "auto"),
    def("z-index", false, "auto"),
    def("float", false, "none"),
    def("width", false, "auto"),
    def("height", false, "auto"),
    def("min-width", false, "auto"),
    def("min-height", false, "auto"),
    def("max-width", false, "none"),
    def("max-height", false, "none"),
    def("box-sizing", false, "content-box"),
    def("margin-top", false, "0px"),
    def("margin-right", false, "0px"),
    def("margin-bottom", false, "0px"),
    def("margin-left", false, "0px"),
    def("padding-top", false, "0px"),
    def("padding-right", false, "0px"),
    def("padding-bottom", false, "0px"),
    def("padding-left", false, "0px"),
    def("overflow", false, "visible"),
    def("flex-direction", false, "row"),
    def("flex-wrap", false, "nowrap"),
    def("justify-content", false, "normal"),
    def("align-items", false, "normal"),
    def("align-content", false, "normal"),
    def("align-self", false, "auto"),
    def("justify-items", false, "normal"),
    def("flex-grow", false, "0"),
    def("flex-shrink", false, "1"),
    def("flex-basis", false, "auto"),
    def("order", false, "0"),
    def("row-gap", false, "normal"),
    def("column-gap", false, "normal"),
    def("grid-template-columns", false, "none"),
    def("grid-template-rows", false, "none"),
    def("grid-auto-flow", false, "row"),
    def("grid-column", false, "auto"),
    def("grid-row", false, "auto"),
    def("background-color", false, "transparent"),
    def("background-image", false, "none"),
    def("background-size", false, "auto"),
    def("background-position", false, "0% 0%"),
    def("background-repeat", false, "repeat"),
    def("background-blend-mode", false, "normal"),
    def("background-clip", false, "border-box"),
    def("border-top-width", false, "0px"),
    def("border-right-width", false, "0px"),
    def("border-bottom-width", false, "0px"),
    def("border-left-width", false, "0px"),
    def("border-top-style", false, "none"),
    def("border-right-style", false, "none"),
    def("border-bottom-style", false, "none"),
    def("border-left-style", false, "none"),
    def("border-top-color", false, "currentcolor"),
    def("border-right-color", false, "currentcolor"),
    def("border-bottom-color", false, "currentcolor"),
    def("border-left-color", false, "currentcolor"),
    def("border-top-left-radius", false, "0px"),
    def("border-top-right-radius", false, "0px"),
    def("border-bottom-right-radius", false, "0px"),
    def("border-bottom-left-radius", false, "0px"),
    def("box-shadow", false, "none"),
    def("opacity", false, "1"),
    def("mix-blend-mode", false, "normal"),
    def("filter", false, "none"),
    def("backdrop-filter", false, "none"),
    def("transform", false, "none"),
    def("transform-origin", false, "50% 50%"),
    def("clip-path", false, "none"),
    def("mask-image", false, "none"),
    def("mask-mode", false, "match-source"),
    def("isolation", false, "auto"),
    def("will-change", false, "auto"),
    def("text-decoration-line", false, "none"),
    def("text-decoration-color", false, "currentcolor"),
    def("text-decoration-style", false, "solid"),
    def("vertical-align", false, "baseline"),
    def("object-fit", false, "fill"),
];

/// Look up a property definition (case-insensitive)
pub fn lookup(name: &str) -> Option<&'static PropertyDef> {
    PROPERTIES.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Whether a property inherits naturally. Unknown properties do not, except
/// custom properties which always inherit.
pub fn is_inherited(name: &str) -> bool {
    if name.starts_with("--") {
        return true;
    }
    lookup(name).is_some_and(|p| p.inherits)
}

pub fn initial_value(name: &str) -> Option<&'static str> {
    lookup(name).map(|p| p.initial)
}

/// Expand a common shorthand into its longhands. Returns `None` when the
/// property is not a shorthand we expand.
pub fn expand_shorthand(property: &str, value: &str) -> Option<Vec<(String, String)>> {
    use super::tokens::split_whitespace_top_level;

    let four = |prefix: &str, suffix: &str| -> Option<Vec<(String, String)>> {
        let parts = split_whitespace_top_level(value);
        let (t, r, b, l) = match parts.as_slice() {
            [a] => (*a, *a, *a, *a),
            [a, b] => (*a, *b, *a, *b),
            [a, b, c] => (*a, *b, *c, *b),
            [a, b, c, d] => (*a, *b, *c, *d),
            _ => return None,
        };
        Some(
            [("top", t), ("right", r), ("bottom", b), ("left", l)]
                .iter()
                .map(|(side, v)| (format!("{}-{}{}", prefix, side, suffix), v.to_string()))
                .collect(),
        )
    };

    match property.to_ascii_lowercase().as_str() {
        "margin" => four("margin", ""),
        "padding" => four("padding", ""),
        "border-width" => four("border", "-width"),
        "border-style" => four("border", "-style"),
        "border-color" => four("border", "-color"),
        "border-radius" => {
            // elliptical `a / b` forms are left to the border decoder
            if value.contains('/') {
                return None;
            }
            let parts = split_whitespace_top_level(value);
            let (tl, tr, br, bl) = match parts.as_slice() {
                [a] => (*a, *a, *a, *a),
                [a, b] => (*a, *b, *a, *b),
                [a, b, c] => (*a, *b, *c, *b),
                [a, b, c, d] => (*a, *b, *c, *d),
                _ => return None,
            };
            Some(vec![
                ("border-top-left-radius".into(), tl.into()),
                ("border-top-right-radius".into(), tr.into()),
                ("border-bottom-right-radius".into(), br.into()),
                ("border-bottom-left-radius".into(), bl.into()),
            ])
        }
        "gap" => {
            let parts = split_whitespace_top_level(value);
            match parts.as_slice() {
                [a] => Some(vec![("row-gap".into(), a.to_string()), ("column-gap".into(), a.to_string())]),
                [a, b] => Some(vec![("row-gap".into(), a.to_string()), ("column-gap".into(), b.to_string())]),
                _ => None,
            }
        }
        "flex-flow" => {
            let mut out = Vec::new();
            for part in split_whitespace_top_level(value) {
                let p = part.to_ascii_lowercase();
                if p.starts_with("row") || p.starts_with("column") {
                    out.push(("flex-direction".to_string(), p));
                } else {
                    out.push(("flex-wrap".to_string(), p));
                }
            }
            Some(out)
        }
        "text-decoration" => {
            let line = split_whitespace_top_level(value)
                .into_iter()
                .filter(|p| {
                    matches!(
                        p.to_ascii_lowercase().as_str(),
                        "underline" | "overline" | "line-through" | "none"
                    )
                })
                .collect::<Vec<_>>()
                .join(" ");
            if line.is_empty() {
                None
            } else {
                Some(vec![("text-decoration-line".into(), line)])
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inheritance_table() {
        assert!(is_inherited("color"));
        assert!(is_inherited("Font-Family"));
        assert!(is_inherited("--brand"));
        assert!(!is_inherited("display"));
        assert!(!is_inherited("made-up"));
        assert_eq!(initial_value("display"), Some("inline"));
        assert_eq!(initial_value("made-up"), None);
    }

    #[test]
    fn expands_box_shorthands() {
        let m = expand_shorthand("margin", "1px 2px").unwrap();
        assert_eq!(m[0], ("margin-top".to_string(), "1px".to_string()));
        assert_eq!(m[3], ("margin-left".to_string(), "2px".to_string()));
        let b = expand_shorthand("border-width", "1px 2px 3px").unwrap();
        assert_eq!(b[3], ("border-left-width".to_string(), "2px".to_string()));
        assert!(expand_shorthand("border-radius", "10px / 5px").is_none());
    }

    #[test]
    fn expands_gap_and_flex_flow() {
        let g = expand_shorthand("gap", "8px").unwrap();
        assert_eq!(g.len(), 2);
        let f = expand_shorthand("flex-flow", "column wrap").unwrap();
        assert_eq!(f[0], ("flex-direction".to_string(), "column".to_string()));
        assert_eq!(f[1], ("flex-wrap".to_string(), "wrap".to_string()));
    }
}
