//! Raw capture schema
//!
//! This is what the external browser-automation layer hands us: a flat list
//! of elements in document order, each with geometry, the declarations that
//! apply to it and whatever text/image/vector data the capture collected.
//! Nothing here is trusted; parent ids may dangle or form cycles.

use crate::ir::{FontAsset, Rect};
use crate::Viewport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options passed to the capture function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureOptions {
    /// Embed element screenshots in the snapshot instead of deferring them
    pub inline_screenshots: bool,
    /// Upper bound on waiting for fonts and network idle
    pub max_wait_ms: u64,
    pub viewport: Viewport,
    pub device_pixel_ratio: f32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            inline_screenshots: false,
            max_wait_ms: 10_000,
            viewport: Viewport::default(),
            device_pixel_ratio: 1.0,
        }
    }
}

/// A declaration matched by a selector (or the inline `style` attribute)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDeclaration {
    pub property: String,
    pub value: String,
    /// Selector of the originating rule; `None` for inline style
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub important: bool,
    /// Position of the rule in the page's style sheets
    #[serde(default)]
    pub source_order: u32,
}

impl RawDeclaration {
    pub fn new(property: impl Into<String>, value: impl Into<String>, selector: Option<&str>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
            selector: selector.map(str::to_string),
            important: false,
            source_order: 0,
        }
    }
}

/// Image data attached to `<img>`, `<picture>` or an element screenshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawImage {
    /// URL or `data:` URI
    pub src: String,
    #[serde(default)]
    pub natural_width: Option<u32>,
    #[serde(default)]
    pub natural_height: Option<u32>,
}

/// One `<path>` (or equivalent shape) collected from inline SVG
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPath {
    pub d: String,
    #[serde(default)]
    pub fill: Option<String>,
    #[serde(default)]
    pub stroke: Option<String>,
    #[serde(default)]
    pub stroke_width: Option<f32>,
    #[serde(default)]
    pub fill_rule: Option<String>,
}

/// A captured element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawElement {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub tag: String,
    #[serde(default)]
    pub rect: Rect,
    /// Direct visible text content
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Captured property values, treated as explicit declarations with zero
    /// specificity
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
    /// Matched declarations with their selectors
    #[serde(default)]
    pub rules: Vec<RawDeclaration>,
    #[serde(default)]
    pub line_count: Option<u32>,
    #[serde(default)]
    pub image: Option<RawImage>,
    #[serde(default)]
    pub paths: Vec<RawPath>,
    /// Serialised `<svg>` markup for vector elements
    #[serde(default)]
    pub svg: Option<String>,
    /// Base64 PNG screenshot of the element (canvas, video, fallbacks)
    #[serde(default)]
    pub screenshot: Option<String>,
}

impl RawElement {
    pub fn new(id: impl Into<String>, tag: impl Into<String>, parent: Option<&str>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            parent_id: parent.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn with_rect(mut self, x: f32, y: f32, width: f32, height: f32) -> Self {
        self.rect = Rect::new(x, y, width, height);
        self
    }

    pub fn with_style(mut self, property: &str, value: &str) -> Self {
        self.styles.insert(property.to_string(), value.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// A complete capture of one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    /// Elements in document order
    pub elements: Vec<RawElement>,
    #[serde(default)]
    pub fonts: Vec<FontAsset>,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, elements: Vec<RawElement>) -> Self {
        Self {
            url: url.into(),
            elements,
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_capture() {
        let json = r#"{
            "url": "https://example.com",
            "elements": [
                {"id": "1", "tag": "html", "rect": {"x": 0, "y": 0, "width": 800, "height": 600}},
                {"id": "2", "parentId": "1", "tag": "p", "text": "hi",
                 "styles": {"color": "red"},
                 "rules": [{"property": "color", "value": "blue", "selector": ".x", "sourceOrder": 3}]}
            ]
        }"#;
        let snap = PageSnapshot::from_json(json).unwrap();
        assert_eq!(snap.elements.len(), 2);
        let p = &snap.elements[1];
        assert_eq!(p.parent_id.as_deref(), Some("1"));
        assert_eq!(p.rules[0].source_order, 3);
        assert!(!p.rules[0].important);
        assert_eq!(snap.viewport.width, 1280);
    }

    #[test]
    fn default_capture_options_defer_screenshots() {
        let o = CaptureOptions::default();
        assert!(!o.inline_screenshots);
        assert_eq!(o.device_pixel_ratio, 1.0);
    }
}
