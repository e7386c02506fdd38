use serde::{Deserialize, Serialize};

/// Color with unit-range channels, the form the canvas sink expects
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Rgba {
    fn default() -> Self {
        Self::TRANSPARENT
    }
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Rgba = Rgba::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            f32::from(a) / 255.0,
        )
    }

    /// Parse any CSS `<color>`; `currentcolor` is not resolvable here
    pub fn parse(input: &str) -> Option<Rgba> {
        let input = input.trim();
        if input.is_empty() || input.eq_ignore_ascii_case("currentcolor") {
            return None;
        }
        let parsed: csscolorparser::Color = input.parse().ok()?;
        let [r, g, b, a] = parsed.to_rgba8();
        Some(Rgba::from_rgba8(r, g, b, a))
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }

    pub fn with_alpha(mut self, a: f32) -> Self {
        self.a = a.clamp(0.0, 1.0);
        self
    }

    pub fn to_hex(&self) -> String {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        if self.a >= 1.0 {
            format!("#{:02x}{:02x}{:02x}", c(self.r), c(self.g), c(self.b))
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", c(self.r), c(self.g), c(self.b), c(self.a))
        }
    }
}

/// Whether a token can only be a color (used to pick colors out of
/// shorthand lists such as shadows and borders)
pub fn looks_like_color(token: &str) -> bool {
    let t = token.trim();
    t.starts_with('#')
        || t.eq_ignore_ascii_case("currentcolor")
        || crate::style::tokens::parse_function(t).is_some_and(|(name, _)| {
            matches!(
                name.to_ascii_lowercase().as_str(),
                "rgb" | "rgba" | "hsl" | "hsla" | "hwb" | "lab" | "lch" | "oklab" | "oklch" | "color"
            )
        })
        || (t.chars().all(|c| c.is_ascii_alphabetic()) && Rgba::parse(t).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_forms() {
        assert_eq!(Rgba::parse("#ff0000"), Some(Rgba::new(1.0, 0.0, 0.0, 1.0)));
        assert_eq!(Rgba::parse("rgb(0, 0, 255)"), Some(Rgba::new(0.0, 0.0, 1.0, 1.0)));
        let half = Rgba::parse("rgba(0, 0, 0, 0.5)").unwrap();
        assert!((half.a - 0.5).abs() < 0.01);
        assert!(Rgba::parse("transparent").unwrap().is_transparent());
        assert_eq!(Rgba::parse("currentColor"), None);
        assert_eq!(Rgba::parse("auto"), None);
    }

    #[test]
    fn color_tokens_are_recognised() {
        assert!(looks_like_color("red"));
        assert!(looks_like_color("hsl(0 100% 50%)"));
        assert!(!looks_like_color("inset"));
        assert!(!looks_like_color("4px"));
    }

    #[test]
    fn hex_round_trip() {
        assert_eq!(Rgba::new(1.0, 0.0, 0.0, 1.0).to_hex(), "#ff0000");
    }
}
