//! Receiving end of the stream
//!
//! Applies envelopes to a growing [`Document`], rebuilds the hierarchy after
//! every node batch and reassembles chunked images. A background sweep on a
//! fixed interval fails buffers that stall, whether or not messages keep
//! arriving.

use super::message::{Envelope, Message};
use super::reassembly::{ChunkEvent, ChunkStore};
use crate::error::Phase;
use crate::hierarchy;
use crate::ir::{AssetState, Document, Marker, MarkerKind};
use crate::{Error, Result, TransportConfig};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Whether the stream is still open after a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    Open,
    Complete,
    /// The sender reported an error; the partial document is usable when
    /// `recoverable` is set
    Aborted { message: String, recoverable: bool },
}

/// Final state of a receiver
#[derive(Debug)]
pub struct Received {
    pub document: Document,
    /// Reassembled bytes of streamed assets, by asset id
    pub payloads: HashMap<String, Vec<u8>>,
    pub failed_assets: Vec<String>,
    pub status: StreamStatus,
}

pub struct Receiver {
    doc: Document,
    store: ChunkStore,
    payloads: HashMap<String, Vec<u8>>,
    failed: Vec<String>,
    last_seq: Option<u64>,
    status: StreamStatus,
    batches: u32,
}

impl Receiver {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            doc: Document::default(),
            store: ChunkStore::new(Duration::from_millis(config.reassembly_timeout_ms)),
            payloads: HashMap::new(),
            failed: Vec::new(),
            last_seq: None,
            status: StreamStatus::Open,
            batches: 0,
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn status(&self) -> &StreamStatus {
        &self.status
    }

    /// Reassembly buffers still collecting
    pub fn open_buffers(&self) -> usize {
        self.store.open()
    }

    /// Apply one envelope
    pub fn handle(&mut self, env: Envelope) -> Result<&StreamStatus> {
        self.handle_at(env, Instant::now())
    }

    pub fn handle_at(&mut self, env: Envelope, now: Instant) -> Result<&StreamStatus> {
        if self.status != StreamStatus::Open {
            return Err(Error::transport(
                format!("{} after end of stream", env.message.kind()),
                false,
                Phase::Transport,
            ));
        }
        if let Some(last) = self.last_seq {
            if env.seq <= last {
                self.abort("sequence number went backwards");
                return Err(Error::transport(
                    format!("sequence {} after {}", env.seq, last),
                    false,
                    Phase::Transport,
                ));
            }
        }
        self.last_seq = Some(env.seq);

        match env.message {
            Message::Meta {
                url,
                title,
                viewport,
                meta,
                root,
                images,
                svgs,
                stacking_contexts,
            } => {
                self.doc.url = url;
                self.doc.title = title;
                self.doc.viewport = viewport;
                self.doc.meta = meta;
                self.doc.root = root;
                self.doc.stacking_contexts = stacking_contexts;
                self.doc.assets.images = images
                    .into_iter()
                    .map(|mut a| {
                        if a.chunk.is_some() && a.state == AssetState::Ready {
                            a.state = AssetState::Pending;
                        }
                        a
                    })
                    .collect();
                self.doc.assets.svgs = svgs;
            }
            Message::Tokens { tokens } => self.doc.tokens = Some(tokens),
            Message::Fonts { fonts } => self.doc.assets.fonts = fonts,
            Message::Nodes {
                batch_index,
                total_batches,
                nodes,
            } => {
                debug!("batch {}/{}: {} nodes", batch_index + 1, total_batches, nodes.len());
                for node in nodes {
                    self.doc.insert(node);
                }
                self.batches += 1;
                hierarchy::build(&mut self.doc);
                // failures recorded before their owners arrived
                let failed = self.failed.clone();
                for id in failed {
                    self.mark_owners(&id);
                }
            }
            Message::ImageChunk {
                asset_id,
                chunk_index,
                total_chunks,
                data,
                ..
            } => self.accept_chunk(&asset_id, chunk_index, total_chunks, data, now),
            Message::Complete { summary } => {
                let pending: Vec<String> = self
                    .doc
                    .assets
                    .images
                    .iter()
                    .filter(|a| a.state == AssetState::Pending)
                    .map(|a| a.id.clone())
                    .collect();
                for id in pending {
                    self.fail_asset(&id, "stream completed before all chunks arrived");
                }
                for id in self.store.release_all() {
                    self.fail_asset(&id, "stream completed before all chunks arrived");
                }
                info!(
                    "stream complete: {} nodes in {} batches, {} failed assets",
                    self.doc.len(),
                    self.batches,
                    self.failed.len()
                );
                if let Some(summary) = summary {
                    if summary.nodes != self.doc.len() {
                        warn!("sender reported {} nodes, received {}", summary.nodes, self.doc.len());
                    }
                }
                self.status = StreamStatus::Complete;
            }
            Message::Error {
                message,
                recoverable,
                phase,
            } => {
                warn!(
                    "sender reported error during {}: {}",
                    phase.map(|p| p.to_string()).unwrap_or_else(|| "unknown phase".into()),
                    message
                );
                self.abort(&message);
                self.status = StreamStatus::Aborted { message, recoverable };
            }
            Message::Progress {
                phase,
                current,
                total,
                message,
            } => debug!("progress {} {}/{} {}", phase, current, total, message.unwrap_or_default()),
        }
        Ok(&self.status)
    }

    fn accept_chunk(&mut self, asset_id: &str, index: u32, total: u32, data: Vec<u8>, now: Instant) {
        match self.store.accept(asset_id, index, total, data, now) {
            ChunkEvent::Pending { .. } | ChunkEvent::Duplicate => {}
            ChunkEvent::Rejected(reason) => warn!("chunk rejected: {}", reason),
            ChunkEvent::Completed(bytes) => {
                let expected = self.doc.assets.image(asset_id).map(|a| a.size);
                match expected {
                    Some(size) if size != bytes.len() => {
                        self.fail_asset(
                            asset_id,
                            &format!("reassembled {} bytes, expected {}", bytes.len(), size),
                        );
                    }
                    _ => {
                        if let Some(asset) = self.doc.assets.image_mut(asset_id) {
                            asset.state = AssetState::Ready;
                        }
                        self.payloads.insert(asset_id.to_string(), bytes);
                    }
                }
            }
        }
    }

    fn mark_owners(&mut self, asset_id: &str) {
        let reason = match self.doc.assets.image(asset_id).map(|a| &a.state) {
            Some(AssetState::Failed { reason }) => reason.clone(),
            _ => "asset failed".to_string(),
        };
        let owners: Vec<String> = self
            .doc
            .nodes
            .values()
            .filter(|n| n.image.as_ref().is_some_and(|i| i.asset_id == asset_id))
            .map(|n| n.id.clone())
            .collect();
        for id in owners {
            if let Some(node) = self.doc.get_mut(&id) {
                node.needs_fallback = true;
                node.push_marker(Marker::new(MarkerKind::AssetFailure, "src", reason.clone()).with_raw(asset_id));
            }
        }
    }

    fn fail_asset(&mut self, asset_id: &str, reason: &str) {
        if self.failed.iter().any(|f| f == asset_id) {
            return;
        }
        warn!("asset '{}' failed: {}", asset_id, reason);
        self.failed.push(asset_id.to_string());
        self.payloads.remove(asset_id);
        if let Some(asset) = self.doc.assets.image_mut(asset_id) {
            asset.state = AssetState::Failed { reason: reason.to_string() };
        }
        self.mark_owners(asset_id);
    }

    /// Fail every buffer older than the reassembly timeout
    pub fn sweep(&mut self, now: Instant) {
        for id in self.store.sweep(now) {
            self.fail_asset(&id, "reassembly timed out");
        }
    }

    /// Release all open buffers and fail every asset still waiting for bytes
    pub fn abort(&mut self, reason: &str) {
        let reason = format!("stream aborted: {}", reason);
        for id in self.store.release_all() {
            self.fail_asset(&id, &reason);
        }
        let pending: Vec<String> = self
            .doc
            .assets
            .images
            .iter()
            .filter(|a| a.state == AssetState::Pending)
            .map(|a| a.id.clone())
            .collect();
        for id in pending {
            self.fail_asset(&id, &reason);
        }
    }

    pub fn finish(self) -> Received {
        Received {
            document: self.doc,
            payloads: self.payloads,
            failed_assets: self.failed,
            status: self.status,
        }
    }
}

/// Drive a receiver from a channel until `COMPLETE`, `ERROR` or the channel
/// closes. Timed-out buffers are swept every `sweep_interval_ms`.
pub async fn receive(mut rx: mpsc::Receiver<Envelope>, config: &TransportConfig) -> Result<Received> {
    let mut receiver = Receiver::new(config);
    let mut sweep = tokio::time::interval(Duration::from_millis(config.sweep_interval_ms.max(1)));
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(env) => {
                    if *receiver.handle(env)? != StreamStatus::Open {
                        break;
                    }
                }
                None => {
                    let message = "channel closed before COMPLETE".to_string();
                    receiver.abort(&message);
                    receiver.status = StreamStatus::Aborted { message, recoverable: true };
                    break;
                }
            },
            _ = sweep.tick() => receiver.sweep(Instant::now()),
        }
    }
    Ok(receiver.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ChunkRef, ImageAsset, ImageFormat, ImagePayload, ImageRef, Node, NodeKind, Rect};
    use crate::transport::encode_document;
    use crate::Viewport;

    fn source_doc() -> (Document, HashMap<String, Vec<u8>>) {
        let mut d = Document::new("https://example.com", "Example", Viewport::default());
        d.insert(Node::new("root", "html", NodeKind::Container, Rect::new(0.0, 0.0, 100.0, 100.0)));
        let mut img = Node::new("img", "img", NodeKind::Image, Rect::new(0.0, 0.0, 10.0, 10.0))
            .with_dom_parent("root")
            .with_order(1);
        let bytes: Vec<u8> = (0..=40).collect();
        let chunk = ChunkRef::for_size(bytes.len(), 8);
        img.image = Some(ImageRef {
            asset_id: "a1".into(),
            payload: ImagePayload::Chunked(chunk),
        });
        d.insert(img);
        d.assets.images.push(ImageAsset {
            id: "a1".into(),
            source: "https://example.com/a.png".into(),
            format: ImageFormat::Png,
            size: bytes.len(),
            width: None,
            height: None,
            node_ids: vec!["img".into()],
            chunk: Some(chunk),
            state: AssetState::Ready,
        });
        hierarchy::build(&mut d);
        (d, HashMap::from([("a1".to_string(), bytes)]))
    }

    #[test]
    fn replays_a_full_stream() {
        let (doc, payloads) = source_doc();
        let envs = encode_document(&doc, &payloads, &TransportConfig::default());
        let mut rx = Receiver::new(&TransportConfig::default());
        for env in envs {
            rx.handle(env).unwrap();
        }
        assert_eq!(*rx.status(), StreamStatus::Complete);
        let out = rx.finish();
        assert_eq!(out.document.len(), 2);
        assert_eq!(out.payloads["a1"], payloads["a1"]);
        assert!(out.document.assets.image("a1").unwrap().is_usable());
        assert_eq!(out.document.get("root").unwrap().children, vec!["img"]);
    }

    #[test]
    fn rejects_non_increasing_sequence() {
        let (doc, payloads) = source_doc();
        let mut envs = encode_document(&doc, &payloads, &TransportConfig::default());
        envs[1].seq = envs[0].seq;
        let mut rx = Receiver::new(&TransportConfig::default());
        rx.handle(envs[0].clone()).unwrap();
        let err = rx.handle(envs[1].clone()).unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn missing_chunks_fail_the_asset_not_the_node() {
        let (doc, payloads) = source_doc();
        let envs: Vec<Envelope> = encode_document(&doc, &payloads, &TransportConfig::default())
            .into_iter()
            .filter(|e| !matches!(e.message, Message::ImageChunk { chunk_index: 2, .. }))
            .collect();
        let mut rx = Receiver::new(&TransportConfig::default());
        for env in envs {
            rx.handle(env).unwrap();
        }
        let out = rx.finish();
        assert_eq!(out.failed_assets, vec!["a1"]);
        let node = out.document.get("img").unwrap();
        assert!(node.needs_fallback);
        assert_eq!(node.markers_of(MarkerKind::AssetFailure).count(), 1);
        assert!(!out.payloads.contains_key("a1"));
    }

    #[test]
    fn sweep_fails_stalled_buffers() {
        let (doc, payloads) = source_doc();
        let config = TransportConfig {
            reassembly_timeout_ms: 1_000,
            ..Default::default()
        };
        let envs = encode_document(&doc, &payloads, &config);
        let start = Instant::now();
        let mut rx = Receiver::new(&config);
        for env in envs.into_iter().take_while(|e| !matches!(e.message, Message::ImageChunk { chunk_index: 1, .. })) {
            rx.handle_at(env, start).unwrap();
        }
        assert_eq!(rx.open_buffers(), 1);
        rx.sweep(start + Duration::from_secs(2));
        assert_eq!(rx.open_buffers(), 0);
        assert_eq!(rx.finish().failed_assets, vec!["a1"]);
    }

    #[tokio::test]
    async fn channel_driven_receive() {
        let (doc, payloads) = source_doc();
        let config = TransportConfig::default();
        let envs = encode_document(&doc, &payloads, &config);
        let (tx, rx) = mpsc::channel(4);
        let sender = tokio::spawn(async move { crate::transport::send_all(envs, &tx).await });
        let out = receive(rx, &config).await.unwrap();
        sender.await.unwrap().unwrap();
        assert_eq!(out.status, StreamStatus::Complete);
        assert_eq!(out.payloads["a1"].len(), 41);
    }

    #[tokio::test]
    async fn closed_channel_is_a_recoverable_abort() {
        let (tx, rx) = mpsc::channel::<Envelope>(1);
        drop(tx);
        let out = receive(rx, &TransportConfig::default()).await.unwrap();
        assert!(matches!(out.status, StreamStatus::Aborted { recoverable: true, .. }));
    }
}
