//! pagescene
//!
//! Converts a captured web page (rendered DOM plus computed styles) into a
//! normalized intermediate representation and from there into a layered
//! vector scene graph: containers with auto-layout rules, fills, strokes,
//! effects, typography and vector paths.
//!
//! # Pipeline
//!
//! - **Cascade** ([`style`]): raw per-element declarations become resolved
//!   properties carrying provenance (explicit or inherited).
//! - **Layout mapping** ([`layout`]): flex and grid map onto auto-layout
//!   containers, with a recorded fallback wherever no equivalent exists.
//! - **Decoders** ([`paint`]) and **typography** ([`text`]).
//! - **Hierarchy** ([`hierarchy`]): the flat node list becomes a rooted tree
//!   in paint order, repaired where the capture cannot be trusted.
//! - **Assets** ([`assets`]) and **streaming transport** ([`transport`]).
//!
//! Nothing is dropped silently: every value that could not be carried over
//! leaves a [`ir::Marker`] on its node.
//!
//! # Example
//!
//! ```no_run
//! use pagescene::{ConvertConfig, Converter, JsonFileSource, SnapshotSource};
//!
//! # async fn run() -> pagescene::Result<()> {
//! let mut source = JsonFileSource::new("capture.json");
//! let snapshot = source.capture("https://example.com", &Default::default())?;
//! let conversion = Converter::new(ConvertConfig::default()).convert(&snapshot).await?;
//! println!("{} nodes, {} fallbacks", conversion.summary.nodes, conversion.summary.fallbacks);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod error;
pub use error::{Error, Phase, Result};

pub mod assets;
pub mod hierarchy;
pub mod ir;
pub mod layout;
pub mod normalize;
pub mod paint;
pub mod sink;
pub mod snapshot;
pub mod style;
pub mod text;
pub mod transport;

pub use assets::{AssetProcessor, AssetReport, Fetcher};
#[cfg(feature = "http")]
pub use assets::HttpFetcher;
pub use ir::{Document, Marker, MarkerKind, Node, NodeId, NodeKind};
pub use normalize::{Conversion, ConversionSummary, Converter, Normalized};
pub use sink::{emit_document, EmitReport, RecordingSink, SceneSink};
pub use snapshot::{CaptureOptions, PageSnapshot, RawElement};

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_dpr")]
    pub device_pixel_ratio: f32,
}

fn default_dpr() -> f32 {
    1.0
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            device_pixel_ratio: 1.0,
        }
    }
}

/// Asset fetching and delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssetConfig {
    /// Process assets at all; when off, every content image gets a fallback
    pub enabled: bool,
    /// Payloads at or above this size are streamed as chunks
    pub inline_threshold_bytes: usize,
    pub chunk_size_bytes: usize,
    /// Upper bound on concurrent fetches
    pub max_concurrency: usize,
    /// Per-fetch timeout; an expired fetch fails only its own asset
    pub fetch_timeout_ms: u64,
    /// Re-encode WebP and BMP payloads as PNG
    pub convert_to_png: bool,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            inline_threshold_bytes: 512 * 1024,
            chunk_size_bytes: 256 * 1024,
            max_concurrency: num_cpus::get().clamp(2, 8),
            fetch_timeout_ms: 10_000,
            convert_to_png: true,
        }
    }
}

/// Streaming transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransportConfig {
    pub nodes_per_batch: usize,
    /// Reassembly buffers older than this are dropped
    pub reassembly_timeout_ms: u64,
    pub sweep_interval_ms: u64,
    /// Envelopes buffered in the in-process channel
    pub channel_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            nodes_per_batch: 200,
            reassembly_timeout_ms: 30_000,
            sweep_interval_ms: 1_000,
            channel_capacity: 64,
        }
    }
}

/// Fonts known to the target canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FontConfig {
    /// Families installed on the target, matched case-insensitively
    pub available: Vec<String>,
    pub sans_serif: String,
    pub serif: String,
    pub monospace: String,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            available: vec!["Inter".to_string(), "Roboto".to_string()],
            sans_serif: "Inter".to_string(),
            serif: "Georgia".to_string(),
            monospace: "Roboto Mono".to_string(),
        }
    }
}

/// Configuration for a conversion
///
/// The defaults are conservative: bounded fetch concurrency, 512 KiB inline
/// threshold, 30 second reassembly timeout.
///
/// # Examples
///
/// ```
/// let cfg = pagescene::ConvertConfig::default();
/// assert_eq!(cfg.viewport.width, 1280);
/// assert_eq!(cfg.transport.nodes_per_batch, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConvertConfig {
    pub viewport: Viewport,
    /// Passed to the capture layer
    pub capture: CaptureOptions,
    pub assets: AssetConfig,
    pub transport: TransportConfig,
    pub fonts: FontConfig,
    /// User agent for asset fetches
    pub user_agent: String,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            capture: CaptureOptions::default(),
            assets: AssetConfig::default(),
            transport: TransportConfig::default(),
            fonts: FontConfig::default(),
            user_agent: concat!("pagescene/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ConvertConfig {
    /// Load a JSON config file; missing fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: ConvertConfig = serde_json::from_str(&text)
            .map_err(|e| Error::ConfigError(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.assets.chunk_size_bytes == 0 {
            return Err(Error::ConfigError("assets.chunkSizeBytes must be positive".into()));
        }
        if self.transport.nodes_per_batch == 0 {
            return Err(Error::ConfigError("transport.nodesPerBatch must be positive".into()));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::ConfigError("viewport must not be empty".into()));
        }
        Ok(())
    }
}

/// Produces page snapshots. The browser automation that drives a real page
/// lives outside this crate; implementors wrap it.
pub trait SnapshotSource {
    fn capture(&mut self, url: &str, options: &CaptureOptions) -> Result<PageSnapshot>;
}

/// Reads a snapshot exported to disk by an external capture tool
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotSource for JsonFileSource {
    fn capture(&mut self, url: &str, _options: &CaptureOptions) -> Result<PageSnapshot> {
        let text = std::fs::read_to_string(&self.path)?;
        let mut snapshot = PageSnapshot::from_json(&text)
            .map_err(|e| Error::InvalidSnapshot(format!("{}: {}", self.path.display(), e)))?;
        if snapshot.url.is_empty() {
            snapshot.url = url.to_string();
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConvertConfig::default();
        assert_eq!(config.viewport.width, 1280);
        assert_eq!(config.viewport.height, 720);
        assert_eq!(config.assets.inline_threshold_bytes, 512 * 1024);
        assert!((2..=8).contains(&config.assets.max_concurrency));
        assert!(config.user_agent.starts_with("pagescene/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: ConvertConfig =
            serde_json::from_str(r#"{"transport": {"nodesPerBatch": 10}, "viewport": {"width": 800, "height": 600}}"#)
                .unwrap();
        assert_eq!(cfg.transport.nodes_per_batch, 10);
        assert_eq!(cfg.transport.reassembly_timeout_ms, 30_000);
        assert_eq!(cfg.viewport.device_pixel_ratio, 1.0);
        assert!(cfg.assets.enabled);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut cfg = ConvertConfig::default();
        cfg.transport.nodes_per_batch = 0;
        assert!(matches!(cfg.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn json_file_source_fills_missing_url() {
        let path = std::env::temp_dir().join(format!("pagescene-src-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"url": "", "elements": [{"id": "1", "tag": "html"}]}"#).unwrap();
        let snap = JsonFileSource::new(&path)
            .capture("https://example.com", &CaptureOptions::default())
            .unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(snap.url, "https://example.com");
        assert_eq!(snap.elements.len(), 1);
    }
}
