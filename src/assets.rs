//! Asset processor
//!
//! Collects every image a document references (content images, element
//! screenshots, background image layers), fetches remote ones under a fixed
//! concurrency limit, normalises formats and decides per asset whether the
//! bytes travel inline in the node record or out-of-band as chunks.
//!
//! Failures are per asset: the owning node keeps its place in the tree and is
//! flagged `needs_fallback` with an [`MarkerKind::AssetFailure`] marker.

use crate::ir::{
    AssetState, ChunkRef, Document, ImageAsset, ImageFormat, ImagePayload, ImageRef, Marker, MarkerKind, NodeId,
    SvgAsset,
};
use crate::paint::Paint;
use crate::{AssetConfig, Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::{join_all, BoxFuture};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

/// Fetches the bytes behind a URL
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// `reqwest`-backed fetcher
#[cfg(feature = "http")]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http")]
impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            let res = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| Error::NetworkError(format!("GET {} failed: {}", url, e)))?;
            let status = res.status();
            if !status.is_success() {
                return Err(Error::NetworkError(format!("GET {} returned {}", url, status)));
            }
            let body = res
                .bytes()
                .await
                .map_err(|e| Error::NetworkError(format!("Failed to read {}: {}", url, e)))?;
            Ok(body.to_vec())
        })
    }
}

/// What the referencing node uses the asset for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetUsage {
    /// `<img>`, `<svg>` or element screenshot
    Content,
    BackgroundLayer,
}

/// One asset reference found on a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub node_id: NodeId,
    /// URL or `data:` URI, exactly as captured
    pub source: String,
    pub usage: AssetUsage,
}

impl AssetRequest {
    pub fn new(node_id: impl Into<NodeId>, source: impl Into<String>, usage: AssetUsage) -> Self {
        Self {
            node_id: node_id.into(),
            source: source.into(),
            usage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Delivery {
    Inline,
    Streamed,
    Vector,
    Failed,
}

/// Conversion metadata for one asset (or one failed reference)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetReport {
    #[serde(default)]
    pub asset_id: Option<String>,
    pub node_ids: Vec<NodeId>,
    pub source: String,
    pub format: ImageFormat,
    pub original_size: usize,
    pub final_size: usize,
    #[serde(default)]
    pub converted_from: Option<ImageFormat>,
    pub delivery: Delivery,
    #[serde(default)]
    pub error: Option<String>,
}

/// Identify an image payload from its leading bytes
pub fn sniff_format(bytes: &[u8]) -> ImageFormat {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return ImageFormat::Png;
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return ImageFormat::Jpeg;
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return ImageFormat::Gif;
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return ImageFormat::Webp;
    }
    if bytes.starts_with(b"BM") {
        return ImageFormat::Bmp;
    }
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
    let head = head.trim_start_matches('\u{feff}').trim_start();
    if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
        return ImageFormat::Svg;
    }
    ImageFormat::Unknown
}

/// Content-hash asset id
pub fn asset_id(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn percent_decode(raw: &str) -> Vec<u8> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(b) = raw.get(i + 1..i + 3).and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

/// Decode a `data:` URI into its bytes
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| Error::AssetError("not a data: URI".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::AssetError("data: URI without payload".into()))?;
    if header.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|e| Error::AssetError(format!("bad base64 payload: {}", e)))
    } else {
        Ok(percent_decode(payload))
    }
}

/// Re-encode a payload as PNG
fn convert_to_png(bytes: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).map_err(|e| Error::AssetError(format!("decode failed: {}", e)))?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| Error::AssetError(format!("PNG encode failed: {}", e)))?;
    Ok(out.into_inner())
}

fn dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Outcome of one request
#[derive(Debug, Clone, PartialEq)]
pub enum AssetOutcome {
    Image { asset_id: String },
    Svg { asset_id: String },
    Failed { reason: String },
}

/// Everything the processor produced for one document
#[derive(Debug, Default)]
pub struct ProcessedAssets {
    pub images: Vec<ImageAsset>,
    pub svgs: Vec<SvgAsset>,
    /// Final bytes of every image, by asset id
    pub payloads: HashMap<String, Vec<u8>>,
    pub outcomes: Vec<(AssetRequest, AssetOutcome)>,
    pub reports: Vec<AssetReport>,
}

impl ProcessedAssets {
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, AssetOutcome::Failed { .. }))
            .count()
    }

    /// Attach the results to the document's nodes and asset tables. Returns
    /// the bytes of every streamed asset, for the transport.
    pub fn apply(self, doc: &mut Document) -> HashMap<String, Vec<u8>> {
        let ProcessedAssets {
            images,
            svgs,
            mut payloads,
            outcomes,
            ..
        } = self;
        let by_id: HashMap<&str, &ImageAsset> = images.iter().map(|a| (a.id.as_str(), a)).collect();

        for (request, outcome) in &outcomes {
            let Some(node) = doc.get_mut(&request.node_id) else { continue };
            match (outcome, request.usage) {
                (AssetOutcome::Image { asset_id }, AssetUsage::Content) => {
                    let Some(asset) = by_id.get(asset_id.as_str()) else { continue };
                    node.image = Some(ImageRef {
                        asset_id: asset_id.clone(),
                        payload: payload_for(asset, &payloads),
                    });
                }
                (AssetOutcome::Svg { asset_id }, AssetUsage::Content) => {
                    node.svg_asset = Some(asset_id.clone());
                }
                (AssetOutcome::Image { asset_id } | AssetOutcome::Svg { asset_id }, AssetUsage::BackgroundLayer) => {
                    // svg backgrounds resolve through the vector table and carry no bytes
                    let payload = by_id.get(asset_id.as_str()).map(|asset| payload_for(asset, &payloads));
                    if let Some(bg) = node.background.as_mut() {
                        for layer in bg.image_layers_mut() {
                            if let Paint::Image {
                                url,
                                asset_id: slot,
                                payload: bytes,
                            } = &mut layer.paint
                            {
                                if *url == request.source {
                                    *slot = Some(asset_id.clone());
                                    *bytes = payload.clone();
                                }
                            }
                        }
                    }
                }
                (AssetOutcome::Failed { reason }, usage) => {
                    let property = match usage {
                        AssetUsage::Content => "src",
                        AssetUsage::BackgroundLayer => "background-image",
                    };
                    if usage == AssetUsage::Content {
                        node.needs_fallback = true;
                    }
                    node.push_marker(Marker::new(MarkerKind::AssetFailure, property, reason.clone()).with_raw(truncate_source(&request.source)));
                }
            }
        }

        let streamed: Vec<String> = images.iter().filter(|a| a.chunk.is_some()).map(|a| a.id.clone()).collect();
        for asset in images {
            if doc.assets.image(&asset.id).is_none() {
                doc.assets.images.push(asset);
            }
        }
        for svg in svgs {
            if !doc.assets.svgs.iter().any(|s| s.id == svg.id) {
                doc.assets.svgs.push(svg);
            }
        }
        streamed
            .into_iter()
            .filter_map(|id| payloads.remove(&id).map(|bytes| (id, bytes)))
            .collect()
    }
}

/// Inline bytes below the threshold, a chunk reference above it
fn payload_for(asset: &ImageAsset, payloads: &HashMap<String, Vec<u8>>) -> ImagePayload {
    match asset.chunk {
        Some(chunk) => ImagePayload::Chunked(chunk),
        None => ImagePayload::Inline {
            bytes: payloads.get(&asset.id).cloned().unwrap_or_default(),
        },
    }
}

/// Keep data URIs out of markers
fn truncate_source(source: &str) -> String {
    if source.len() > 96 {
        let cut = (0..=96).rev().find(|i| source.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &source[..cut])
    } else {
        source.to_string()
    }
}

/// Gather every asset reference in the document. `content` maps node ids to
/// their image source (`<img>` src or element screenshot).
pub fn collect_requests(doc: &Document, content: &HashMap<NodeId, String>) -> Vec<AssetRequest> {
    let mut out = Vec::new();
    for node in doc.nodes_in_order() {
        if node.hidden {
            continue;
        }
        if let Some(src) = content.get(&node.id) {
            out.push(AssetRequest::new(node.id.clone(), src.clone(), AssetUsage::Content));
        }
        if let Some(bg) = &node.background {
            for layer in &bg.layers {
                if let Paint::Image { url, .. } = &layer.paint {
                    out.push(AssetRequest::new(node.id.clone(), url.clone(), AssetUsage::BackgroundLayer));
                }
            }
        }
    }
    out
}

/// Fetches, normalises and classifies assets
pub struct AssetProcessor {
    config: AssetConfig,
    fetcher: Option<Arc<dyn Fetcher>>,
    base_url: Option<Url>,
}

enum Loaded {
    Bytes(Vec<u8>),
    Failed(String),
}

impl AssetProcessor {
    pub fn new(config: AssetConfig) -> Self {
        Self {
            config,
            fetcher: None,
            base_url: None,
        }
    }

    /// Processor with the default HTTP fetcher installed
    #[cfg(feature = "http")]
    pub fn with_http(config: AssetConfig, user_agent: &str) -> Result<Self> {
        let fetcher = HttpFetcher::new(user_agent)?;
        Ok(Self::new(config).with_fetcher(Arc::new(fetcher)))
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Resolve relative URLs against `page_url`
    pub fn with_base_url(mut self, page_url: &str) -> Self {
        self.base_url = Url::parse(page_url).ok();
        self
    }

    fn resolve(&self, source: &str) -> std::result::Result<String, String> {
        match Url::parse(source) {
            Ok(u) => Ok(u.to_string()),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => base
                    .join(source)
                    .map(|u| u.to_string())
                    .map_err(|e| format!("cannot resolve '{}': {}", source, e)),
                None => Err(format!("relative URL '{}' without a page URL", source)),
            },
            Err(e) => Err(format!("invalid URL '{}': {}", source, e)),
        }
    }

    async fn fetch_all(&self, urls: Vec<String>) -> HashMap<String, Loaded> {
        let Some(fetcher) = self.fetcher.clone() else {
            return urls
                .into_iter()
                .map(|u| (u, Loaded::Failed("remote fetching disabled".into())))
                .collect();
        };
        let limit = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let timeout = Duration::from_millis(self.config.fetch_timeout_ms);
        let timeout_ms = self.config.fetch_timeout_ms;
        let tasks = urls.into_iter().map(|url| {
            let limit = limit.clone();
            let fetcher = fetcher.clone();
            async move {
                let loaded = match limit.acquire_owned().await {
                    Ok(_permit) => match tokio::time::timeout(timeout, fetcher.fetch(&url)).await {
                        Ok(Ok(bytes)) => Loaded::Bytes(bytes),
                        Ok(Err(e)) => Loaded::Failed(e.to_string()),
                        Err(_) => Loaded::Failed(Error::Timeout(timeout_ms).to_string()),
                    },
                    Err(_) => Loaded::Failed("fetch pool closed".into()),
                };
                (url, loaded)
            }
        });
        join_all(tasks).await.into_iter().collect()
    }

    /// Process every request. Never fails as a whole: failures are reported
    /// per request.
    pub async fn process(&self, requests: Vec<AssetRequest>) -> ProcessedAssets {
        // resolve sources once; identical URLs are fetched once
        let mut resolved: Vec<std::result::Result<String, String>> = Vec::with_capacity(requests.len());
        let mut remote: Vec<String> = Vec::new();
        for req in &requests {
            let r = if req.source.starts_with("data:") {
                Ok(req.source.clone())
            } else {
                self.resolve(&req.source)
            };
            if let Ok(url) = &r {
                if !url.starts_with("data:") && !remote.contains(url) {
                    remote.push(url.clone());
                }
            }
            resolved.push(r);
        }
        debug!("assets: {} requests, {} remote fetches", requests.len(), remote.len());
        let mut fetched = self.fetch_all(remote).await;

        let mut out = ProcessedAssets::default();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut svg_index: HashMap<String, usize> = HashMap::new();
        let mut by_source: HashMap<String, AssetOutcome> = HashMap::new();

        for (req, r) in requests.into_iter().zip(resolved) {
            let outcome = match r {
                Err(reason) => AssetOutcome::Failed { reason },
                Ok(source) => match by_source.get(&source) {
                    Some(done) => done.clone(),
                    None => {
                        let loaded = if source.starts_with("data:") {
                            match decode_data_uri(&source) {
                                Ok(bytes) => Loaded::Bytes(bytes),
                                Err(e) => Loaded::Failed(e.to_string()),
                            }
                        } else {
                            fetched
                                .remove(&source)
                                .unwrap_or_else(|| Loaded::Failed("not fetched".into()))
                        };
                        let outcome = self.ingest(&source, loaded, &mut out, &mut index, &mut svg_index);
                        by_source.insert(source, outcome.clone());
                        outcome
                    }
                },
            };
            match &outcome {
                AssetOutcome::Image { asset_id } => {
                    if let Some(&i) = index.get(asset_id) {
                        push_owner(&mut out.images[i].node_ids, &req.node_id);
                        if let Some(report) = out.reports.iter_mut().find(|r| r.asset_id.as_ref() == Some(asset_id)) {
                            push_owner(&mut report.node_ids, &req.node_id);
                        }
                    }
                }
                AssetOutcome::Svg { asset_id } => {
                    if let Some(&i) = svg_index.get(asset_id) {
                        push_owner(&mut out.svgs[i].node_ids, &req.node_id);
                    }
                }
                AssetOutcome::Failed { reason } => {
                    warn!("asset for node '{}' failed: {}", req.node_id, reason);
                    out.reports.push(AssetReport {
                        asset_id: None,
                        node_ids: vec![req.node_id.clone()],
                        source: truncate_source(&req.source),
                        format: ImageFormat::Unknown,
                        original_size: 0,
                        final_size: 0,
                        converted_from: None,
                        delivery: Delivery::Failed,
                        error: Some(reason.clone()),
                    });
                }
            }
            out.outcomes.push((req, outcome));
        }
        out
    }

    /// Turn loaded bytes into a table entry
    fn ingest(
        &self,
        source: &str,
        loaded: Loaded,
        out: &mut ProcessedAssets,
        index: &mut HashMap<String, usize>,
        svg_index: &mut HashMap<String, usize>,
    ) -> AssetOutcome {
        let bytes = match loaded {
            Loaded::Bytes(b) if b.is_empty() => return AssetOutcome::Failed { reason: "empty payload".into() },
            Loaded::Bytes(b) => b,
            Loaded::Failed(reason) => return AssetOutcome::Failed { reason },
        };
        let original_size = bytes.len();
        let format = sniff_format(&bytes);

        if format == ImageFormat::Svg {
            let id = asset_id(&bytes);
            if !svg_index.contains_key(&id) {
                let markup = String::from_utf8_lossy(&bytes).into_owned();
                svg_index.insert(id.clone(), out.svgs.len());
                out.svgs.push(SvgAsset {
                    id: id.clone(),
                    source: truncate_source(source),
                    markup,
                    node_ids: Vec::new(),
                });
                out.reports.push(AssetReport {
                    asset_id: Some(id.clone()),
                    node_ids: Vec::new(),
                    source: truncate_source(source),
                    format,
                    original_size,
                    final_size: original_size,
                    converted_from: None,
                    delivery: Delivery::Vector,
                    error: None,
                });
            }
            return AssetOutcome::Svg { asset_id: id };
        }

        let (bytes, format, converted_from) = match format {
            ImageFormat::Webp | ImageFormat::Bmp if self.config.convert_to_png => match convert_to_png(&bytes) {
                Ok(png) => (png, ImageFormat::Png, Some(format)),
                Err(e) => return AssetOutcome::Failed { reason: e.to_string() },
            },
            ImageFormat::Unknown => {
                return AssetOutcome::Failed {
                    reason: "unrecognised image format".into(),
                }
            }
            _ => (bytes, format, None),
        };

        let id = asset_id(&bytes);
        if index.contains_key(&id) {
            return AssetOutcome::Image { asset_id: id };
        }
        let size = bytes.len();
        let (width, height) = match dimensions(&bytes) {
            Some((w, h)) => (Some(w), Some(h)),
            None => (None, None),
        };
        let streamed = size >= self.config.inline_threshold_bytes;
        let chunk = streamed.then(|| ChunkRef::for_size(size, self.config.chunk_size_bytes));
        index.insert(id.clone(), out.images.len());
        out.images.push(ImageAsset {
            id: id.clone(),
            source: truncate_source(source),
            format,
            size,
            width,
            height,
            node_ids: Vec::new(),
            chunk,
            state: AssetState::Ready,
        });
        out.reports.push(AssetReport {
            asset_id: Some(id.clone()),
            node_ids: Vec::new(),
            source: truncate_source(source),
            format,
            original_size,
            final_size: size,
            converted_from,
            delivery: if streamed { Delivery::Streamed } else { Delivery::Inline },
            error: None,
        });
        out.payloads.insert(id.clone(), bytes);
        AssetOutcome::Image { asset_id: id }
    }
}

fn push_owner(owners: &mut Vec<NodeId>, id: &NodeId) {
    if !owners.contains(id) {
        owners.push(id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

    struct MapFetcher {
        entries: HashMap<String, Vec<u8>>,
        calls: AtomicUsize,
    }

    impl Fetcher for MapFetcher {
        fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.entries
                    .get(url)
                    .cloned()
                    .ok_or_else(|| Error::NetworkError(format!("404 {}", url)))
            })
        }
    }

    /// Answers after a delay and records how many fetches overlap.
    /// URLs containing "slow" never answer within a test's timeout.
    struct SlowFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Fetcher for SlowFetcher {
        fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
            Box::pin(async move {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                let delay = if url.contains("slow") { 5_000 } else { 30 };
                tokio::time::sleep(Duration::from_millis(delay)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(png())
            })
        }
    }

    fn png() -> Vec<u8> {
        STANDARD.decode(PNG_1X1).unwrap()
    }

    fn config() -> AssetConfig {
        AssetConfig {
            inline_threshold_bytes: 1024,
            chunk_size_bytes: 16,
            ..Default::default()
        }
    }

    #[test]
    fn sniffs_common_formats() {
        assert_eq!(sniff_format(&png()), ImageFormat::Png);
        assert_eq!(sniff_format(&[0xFF, 0xD8, 0xFF, 0xE0]), ImageFormat::Jpeg);
        assert_eq!(sniff_format(b"GIF89a...."), ImageFormat::Gif);
        assert_eq!(sniff_format(b"RIFF\0\0\0\0WEBPVP8 "), ImageFormat::Webp);
        assert_eq!(sniff_format(b"  <svg xmlns='x'></svg>"), ImageFormat::Svg);
        assert_eq!(sniff_format(b"hello"), ImageFormat::Unknown);
    }

    #[test]
    fn decodes_data_uris() {
        let uri = format!("data:image/png;base64,{}", PNG_1X1);
        assert_eq!(decode_data_uri(&uri).unwrap(), png());
        assert_eq!(decode_data_uri("data:image/svg+xml,%3Csvg%3E").unwrap(), b"<svg>".to_vec());
        assert!(decode_data_uri("data:image/png;base64").is_err());
    }

    #[tokio::test]
    async fn identical_payloads_share_one_asset() {
        let fetcher = Arc::new(MapFetcher {
            entries: HashMap::from([("https://cdn.test/a.png".to_string(), png())]),
            calls: AtomicUsize::new(0),
        });
        let processor = AssetProcessor::new(config())
            .with_fetcher(fetcher.clone())
            .with_base_url("https://cdn.test/page.html");
        let data = format!("data:image/png;base64,{}", PNG_1X1);
        let out = processor
            .process(vec![
                AssetRequest::new("n1", "a.png", AssetUsage::Content),
                AssetRequest::new("n2", "https://cdn.test/a.png", AssetUsage::Content),
                AssetRequest::new("n3", data, AssetUsage::Content),
            ])
            .await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(out.images.len(), 1);
        assert_eq!(out.images[0].node_ids, vec!["n1", "n2", "n3"]);
        assert_eq!(out.images[0].width, Some(1));
        assert_eq!(out.failed(), 0);
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let fetcher = Arc::new(MapFetcher {
            entries: HashMap::from([("https://cdn.test/ok.png".to_string(), png())]),
            calls: AtomicUsize::new(0),
        });
        let processor = AssetProcessor::new(config()).with_fetcher(fetcher);
        let out = processor
            .process(vec![
                AssetRequest::new("ok", "https://cdn.test/ok.png", AssetUsage::Content),
                AssetRequest::new("missing", "https://cdn.test/missing.png", AssetUsage::Content),
                AssetRequest::new("relative", "rel.png", AssetUsage::Content),
            ])
            .await;
        assert_eq!(out.failed(), 2);
        assert_eq!(out.images.len(), 1);
        let failed: Vec<&AssetReport> = out.reports.iter().filter(|r| r.delivery == Delivery::Failed).collect();
        assert_eq!(failed.len(), 2);
    }

    #[tokio::test]
    async fn fetches_respect_the_concurrency_limit() {
        let fetcher = Arc::new(SlowFetcher {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let processor = AssetProcessor::new(AssetConfig {
            max_concurrency: 2,
            ..config()
        })
        .with_fetcher(fetcher.clone());
        let requests = (0..8)
            .map(|i| AssetRequest::new(format!("n{}", i), format!("https://cdn.test/{}.png", i), AssetUsage::Content))
            .collect();
        let out = processor.process(requests).await;
        assert_eq!(out.failed(), 0);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 2);
        assert_eq!(out.images[0].node_ids.len(), 8);
    }

    #[tokio::test]
    async fn a_timed_out_fetch_fails_only_its_asset() {
        let fetcher = Arc::new(SlowFetcher {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let processor = AssetProcessor::new(AssetConfig {
            fetch_timeout_ms: 200,
            ..config()
        })
        .with_fetcher(fetcher);
        let out = processor
            .process(vec![
                AssetRequest::new("fast", "https://cdn.test/fast.png", AssetUsage::Content),
                AssetRequest::new("stalled", "https://cdn.test/slow.png", AssetUsage::Content),
            ])
            .await;
        assert_eq!(out.failed(), 1);
        assert_eq!(out.images.len(), 1);
        assert_eq!(out.images[0].node_ids, vec!["fast"]);
        let failed = out.reports.iter().find(|r| r.delivery == Delivery::Failed).unwrap();
        assert_eq!(failed.node_ids, vec!["stalled"]);
        assert!(failed.error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn large_assets_are_streamed() {
        let processor = AssetProcessor::new(AssetConfig {
            inline_threshold_bytes: 10,
            chunk_size_bytes: 16,
            ..Default::default()
        });
        let data = format!("data:image/png;base64,{}", PNG_1X1);
        let out = processor.process(vec![AssetRequest::new("n", data, AssetUsage::Content)]).await;
        let asset = &out.images[0];
        let chunk = asset.chunk.expect("streamed");
        assert_eq!(chunk.total_chunks as usize, asset.size.div_ceil(16));
        assert_eq!(out.reports[0].delivery, Delivery::Streamed);
    }

    #[tokio::test]
    async fn svg_payloads_go_to_the_vector_table() {
        let processor = AssetProcessor::new(config());
        let out = processor
            .process(vec![AssetRequest::new(
                "icon",
                "data:image/svg+xml,%3Csvg%20xmlns%3D%22x%22%3E%3C%2Fsvg%3E",
                AssetUsage::Content,
            )])
            .await;
        assert!(out.images.is_empty());
        assert_eq!(out.svgs.len(), 1);
        assert_eq!(out.svgs[0].node_ids, vec!["icon"]);
    }

    #[tokio::test]
    async fn remote_sources_fail_without_a_fetcher() {
        let processor = AssetProcessor::new(config());
        let out = processor
            .process(vec![AssetRequest::new("n", "https://cdn.test/a.png", AssetUsage::Content)])
            .await;
        assert!(matches!(&out.outcomes[0].1, AssetOutcome::Failed { reason } if reason.contains("disabled")));
    }
}
