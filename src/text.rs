//! Typography resolver
//!
//! Decides which nodes carry text, extracts what they display and resolves
//! the font they use.
//!
//! The has-text rules are evaluated in priority order and short-circuit on
//! hidden elements (`display: none`, `visibility: hidden`, zero opacity):
//!
//! 1. non-empty visible text
//! 2. inline-level display
//! 3. a text-bearing tag (`button`, `label`, headings, form controls, ...)
//! 4. `text-decoration` or `text-shadow`
//! 5. an accessible name (`aria-label`, `title`)
//!
//! A rule only qualifies a node; it still needs extractable text. Extraction
//! prefers direct text, then a form value or a `[placeholder]`, then the
//! accessible name, then image `alt` text.

use crate::ir::{FontAsset, Marker, Rect};
use crate::paint::background::{Background, Paint};
use crate::paint::shadow::{parse_text_shadows, Shadow};
use crate::paint::{Decoded, Rgba};
use crate::snapshot::RawElement;
use crate::style::tokens::{split_top_level, unquote};
use crate::style::value::DEFAULT_FONT_SIZE;
use crate::style::ResolvedStyle;
use crate::FontConfig;
use log::debug;
use serde::{Deserialize, Serialize};

const TEXT_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "button", "caption", "cite", "code", "dd", "dt", "em", "figcaption", "h1", "h2",
    "h3", "h4", "h5", "h6", "i", "input", "kbd", "label", "legend", "li", "mark", "option", "p", "pre", "q", "s",
    "samp", "select", "small", "span", "strong", "sub", "summary", "sup", "td", "textarea", "th", "time", "u",
];

const GENERIC_FAMILIES: &[&str] = &[
    "serif",
    "sans-serif",
    "monospace",
    "cursive",
    "fantasy",
    "system-ui",
    "ui-sans-serif",
    "ui-serif",
    "ui-monospace",
    "ui-rounded",
    "-apple-system",
    "blinkmacsystemfont",
    "emoji",
    "math",
];

/// Which has-text rule qualified a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextRule {
    VisibleText,
    InlineDisplay,
    TextTag,
    Decorated,
    AccessibleName,
}

/// Where the displayed text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextSource {
    Direct,
    Value,
    Placeholder,
    AccessibleName,
    Alt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontResolution {
    /// Families as declared, unquoted
    pub requested: Vec<String>,
    pub family: String,
    /// The resolved family came from a generic keyword
    #[serde(default)]
    pub generic: bool,
    /// Nothing in the stack matched; `family` is the configured fallback
    #[serde(default)]
    pub substituted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDecoration {
    pub lines: Vec<String>,
    pub color: Rgba,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
    pub source: TextSource,
    pub rule: TextRule,
    pub font: FontResolution,
    pub font_size: f32,
    pub font_weight: u16,
    #[serde(default)]
    pub italic: bool,
    pub color: Rgba,
    /// Gradient or image painted through the glyphs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Paint>,
    #[serde(default)]
    pub align: String,
    /// `text-transform` keyword (`none`, `uppercase`, ...)
    #[serde(default)]
    pub case: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoration: Option<TextDecoration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shadows: Vec<Shadow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMetrics {
    /// `None` for `line-height: normal`
    #[serde(default)]
    pub line_height: Option<f32>,
    pub letter_spacing: f32,
    pub word_spacing: f32,
    pub line_count: u32,
    pub multi_line: bool,
    pub gradient_fill: bool,
    pub rtl: bool,
    pub vertical: bool,
    #[serde(default)]
    pub preserve_whitespace: bool,
}

/// Available font families and the configured generic fallbacks
#[derive(Debug, Clone, Default)]
pub struct FontBook {
    available: Vec<String>,
    sans_serif: String,
    serif: String,
    monospace: String,
}

impl FontBook {
    pub fn new(config: &FontConfig, loaded: &[FontAsset]) -> Self {
        let mut available: Vec<String> = config.available.iter().map(|f| f.to_ascii_lowercase()).collect();
        available.extend(loaded.iter().map(|f| f.family.to_ascii_lowercase()));
        available.sort();
        available.dedup();
        Self {
            available,
            sans_serif: config.sans_serif.clone(),
            serif: config.serif.clone(),
            monospace: config.monospace.clone(),
        }
    }

    fn generic(&self, keyword: &str) -> &str {
        match keyword {
            "serif" | "ui-serif" => &self.serif,
            "monospace" | "ui-monospace" => &self.monospace,
            _ => &self.sans_serif,
        }
    }

    /// Walk a `font-family` stack and record the first usable family
    pub fn resolve(&self, stack: &str) -> FontResolution {
        let requested: Vec<String> = split_top_level(stack, ',')
            .into_iter()
            .map(|f| unquote(f).trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        let matched = requested.iter().find_map(|family| {
            let lower = family.to_ascii_lowercase();
            if GENERIC_FAMILIES.contains(&lower.as_str()) {
                Some((self.generic(&lower).to_string(), true))
            } else if self.available.binary_search(&lower).is_ok() {
                Some((family.clone(), false))
            } else {
                None
            }
        });
        match matched {
            Some((family, generic)) => FontResolution {
                requested,
                family,
                generic,
                substituted: false,
            },
            None => FontResolution {
                requested,
                family: self.sans_serif.clone(),
                generic: true,
                substituted: true,
            },
        }
    }
}

/// Whether the element is invisible to the reader
pub fn is_hidden(style: &ResolvedStyle) -> bool {
    if style.keyword("display") == "none" {
        return true;
    }
    if matches!(style.keyword("visibility").as_str(), "hidden" | "collapse") {
        return true;
    }
    matches!(style.number("opacity"), Some(o) if o <= 0.0)
}

fn accessible_name(el: &RawElement) -> Option<&str> {
    el.attr("aria-label")
        .or_else(|| el.attr("title"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// First has-text rule the element satisfies
pub fn text_rule(el: &RawElement, style: &ResolvedStyle) -> Option<TextRule> {
    if is_hidden(style) {
        return None;
    }
    if el.text.as_deref().is_some_and(|t| !t.trim().is_empty()) {
        return Some(TextRule::VisibleText);
    }
    let display = style.keyword("display");
    if matches!(display.as_str(), "inline" | "inline-block" | "inline-flex" | "inline-grid") {
        return Some(TextRule::InlineDisplay);
    }
    if TEXT_TAGS.contains(&el.tag.to_ascii_lowercase().as_str()) {
        return Some(TextRule::TextTag);
    }
    let decorated = !matches!(style.keyword("text-decoration-line").as_str(), "" | "none")
        || !matches!(style.keyword("text-shadow").as_str(), "" | "none");
    if decorated {
        return Some(TextRule::Decorated);
    }
    if accessible_name(el).is_some() {
        return Some(TextRule::AccessibleName);
    }
    None
}

/// Displayed text and where it came from
pub fn extract_text(el: &RawElement) -> Option<(String, TextSource)> {
    if let Some(t) = el.text.as_deref().filter(|t| !t.trim().is_empty()) {
        return Some((t.to_string(), TextSource::Direct));
    }
    if let Some(v) = el.attr("value").filter(|v| !v.is_empty()) {
        let tag = el.tag.to_ascii_lowercase();
        let is_hidden_input = tag == "input" && el.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("hidden"));
        if !is_hidden_input {
            return Some((v.to_string(), TextSource::Value));
        }
    }
    if let Some(p) = el.attr("placeholder").map(str::trim).filter(|p| !p.is_empty()) {
        return Some((format!("[{}]", p), TextSource::Placeholder));
    }
    if let Some(name) = accessible_name(el) {
        return Some((name.to_string(), TextSource::AccessibleName));
    }
    el.attr("alt")
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| (a.to_string(), TextSource::Alt))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn font_weight(raw: &str) -> u16 {
    match raw {
        "normal" | "" => 400,
        "bold" => 700,
        "lighter" => 300,
        "bolder" => 700,
        n => n.parse::<f32>().map(|w| w.clamp(1.0, 1000.0) as u16).unwrap_or(400),
    }
}

/// Resolve text content and metrics for one element.
///
/// `background` is the node's decoded background; a gradient clipped to
/// text becomes the glyph fill.
pub fn resolve_text(
    el: &RawElement,
    style: &ResolvedStyle,
    rect: &Rect,
    background: Option<&Background>,
    fonts: &FontBook,
) -> Decoded<Option<(TextContent, TextMetrics)>> {
    let Some(rule) = text_rule(el, style) else {
        return Decoded::ok(None);
    };
    let Some((raw_text, source)) = extract_text(el) else {
        return Decoded::ok(None);
    };

    let mut markers = Vec::new();
    let white_space = style.keyword("white-space");
    let preserve_whitespace = matches!(white_space.as_str(), "pre" | "pre-wrap" | "pre-line" | "break-spaces");
    let text = if preserve_whitespace {
        raw_text
    } else {
        collapse_whitespace(&raw_text)
    };

    let font_size = style.length("font-size").unwrap_or(DEFAULT_FONT_SIZE);
    let color = style
        .value("color")
        .and_then(|v| v.as_color())
        .or_else(|| Rgba::parse(style.raw("color")))
        .unwrap_or(Rgba::BLACK);

    let line_height = match style.keyword("line-height").as_str() {
        "normal" | "" => None,
        _ => match (style.length("line-height"), style.number("line-height")) {
            (Some(px), _) => Some(px),
            (None, Some(factor)) => Some(factor * font_size),
            _ => {
                markers.push(Marker::unsupported("line-height", style.raw("line-height"), "unresolved line height"));
                None
            }
        },
    };
    let spacing = |name: &str| style.length(name).unwrap_or(0.0);

    // gradient text: background clipped to glyphs with a transparent fill
    let fill_color = style.raw("-webkit-text-fill-color").trim().to_ascii_lowercase();
    let transparent_fill = fill_color == "transparent" || Rgba::parse(&fill_color).is_some_and(|c| c.is_transparent());
    let fill = background
        .filter(|bg| bg.clips_to_text() && (transparent_fill || color.is_transparent()))
        .and_then(|bg| bg.layers.iter().find(|l| !matches!(l.paint, Paint::Solid { .. })).map(|l| l.paint.clone()));
    let gradient_fill = fill.as_ref().is_some_and(Paint::is_gradient);

    let effective_line_height = line_height.unwrap_or(font_size * 1.2);
    let line_count = el.line_count.unwrap_or_else(|| {
        if effective_line_height > 0.0 && rect.height > effective_line_height * 1.5 {
            (rect.height / effective_line_height).round().max(1.0) as u32
        } else {
            1
        }
    });

    let decoration_lines: Vec<String> = style
        .keyword("text-decoration-line")
        .split_whitespace()
        .filter(|l| *l != "none")
        .map(str::to_string)
        .collect();
    let decoration = if decoration_lines.is_empty() {
        None
    } else {
        let raw = style.raw("text-decoration-color").trim();
        let decoration_color = if raw.is_empty() || raw.eq_ignore_ascii_case("currentcolor") {
            color
        } else {
            Rgba::parse(raw).unwrap_or(color)
        };
        Some(TextDecoration {
            lines: decoration_lines,
            color: decoration_color,
            style: style.keyword("text-decoration-style"),
        })
    };

    let shadows = parse_text_shadows(style.raw("text-shadow"), color).drain_into(&mut markers);

    let font = fonts.resolve(style.raw("font-family"));
    if font.substituted {
        debug!("font stack {:?} for {} substituted by {}", font.requested, el.id, font.family);
    }

    let writing_mode = style.keyword("writing-mode");
    let font_style = style.keyword("font-style");
    let metrics = TextMetrics {
        line_height,
        letter_spacing: spacing("letter-spacing"),
        word_spacing: spacing("word-spacing"),
        line_count,
        multi_line: line_count > 1,
        gradient_fill,
        rtl: style.keyword("direction") == "rtl",
        vertical: writing_mode.starts_with("vertical") || writing_mode.starts_with("sideways"),
        preserve_whitespace,
    };
    let content = TextContent {
        text,
        source,
        rule,
        font,
        font_size,
        font_weight: font_weight(&style.keyword("font-weight")),
        italic: font_style == "italic" || font_style.starts_with("oblique"),
        color,
        fill,
        align: style.keyword("text-align"),
        case: style.keyword("text-transform"),
        decoration,
        shadows,
    };
    Decoded::with_markers(Some((content, metrics)), markers)
}
