//! Serialises a finished [`Document`] into an ordered message sequence

use super::message::{CompleteSummary, Envelope, Message};
use crate::error::Phase;
use crate::ir::{AssetState, ChunkRef, Document, ImageAsset, Node, NodeId};
use crate::{Error, Result, TransportConfig};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

/// Hands out strictly increasing sequence numbers
#[derive(Debug, Default)]
pub struct Sequencer {
    next: u64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn wrap(&mut self, message: Message) -> Envelope {
        let seq = self.next.max(1);
        self.next = seq + 1;
        Envelope { seq, message }
    }
}

/// Nodes in tree pre-order (parents before children), then everything the
/// painted tree does not reach (hidden subtrees) in capture order
fn send_order(doc: &Document) -> Vec<&Node> {
    let mut out = doc.walk();
    let seen: HashSet<&str> = out.iter().map(|n| n.id.as_str()).collect();
    let rest: Vec<&Node> = doc
        .nodes_in_order()
        .into_iter()
        .filter(|n| !seen.contains(n.id.as_str()))
        .collect();
    out.extend(rest);
    out
}

/// Bytes of a streamed asset, provided they split into exactly the number of
/// chunks its reference declares
fn streamable<'p>(asset: &ImageAsset, payloads: &'p HashMap<String, Vec<u8>>) -> Option<(ChunkRef, &'p [u8])> {
    let chunk = asset.chunk?;
    let bytes = payloads.get(&asset.id)?;
    let pieces = bytes.len().div_ceil(chunk.chunk_size.max(1));
    (pieces > 0 && pieces == chunk.total_chunks as usize).then_some((chunk, bytes.as_slice()))
}

/// Plan the full message sequence for `doc`. `payloads` holds the bytes of
/// every streamed asset.
pub fn encode_document(doc: &Document, payloads: &HashMap<String, Vec<u8>>, config: &TransportConfig) -> Vec<Envelope> {
    let mut seq = Sequencer::new();
    let mut out = Vec::new();

    // a streamed asset whose bytes cannot fill its chunk reference never completes
    let mut images = doc.assets.images.clone();
    for asset in &mut images {
        if asset.chunk.is_none() || streamable(asset, payloads).is_some() {
            continue;
        }
        let reason = if payloads.contains_key(&asset.id) {
            "payload does not match its chunk count"
        } else {
            "payload unavailable to sender"
        };
        warn!("streamed asset '{}': {}; marking failed", asset.id, reason);
        asset.state = AssetState::Failed { reason: reason.into() };
    }
    out.push(seq.wrap(Message::Meta {
        url: doc.url.clone(),
        title: doc.title.clone(),
        viewport: doc.viewport,
        meta: doc.meta.clone(),
        root: doc.root.clone(),
        images: images.clone(),
        svgs: doc.assets.svgs.clone(),
        stacking_contexts: doc.stacking_contexts.clone(),
    }));
    if let Some(tokens) = doc.tokens.as_ref().filter(|t| !t.is_empty()) {
        out.push(seq.wrap(Message::Tokens { tokens: tokens.clone() }));
    }
    out.push(seq.wrap(Message::Fonts {
        fonts: doc.assets.fonts.clone(),
    }));

    let nodes = send_order(doc);
    let per_batch = config.nodes_per_batch.max(1);
    let total_batches = nodes.len().div_ceil(per_batch).max(1) as u32;
    let mut sent_assets: HashSet<&str> = HashSet::new();
    let mut chunks = 0usize;
    let batches: Vec<&[&Node]> = if nodes.is_empty() {
        vec![&[]]
    } else {
        nodes.chunks(per_batch).collect()
    };

    for (batch_index, batch) in batches.iter().enumerate() {
        let batch_index = batch_index as u32;
        out.push(seq.wrap(Message::Nodes {
            batch_index,
            total_batches,
            nodes: batch.iter().map(|n| (*n).clone()).collect(),
        }));
        // chunks follow the batch that introduced their first owner
        for node in batch.iter() {
            let Some(image) = node.image.as_ref() else { continue };
            let Some(asset) = images.iter().find(|a| a.id == image.asset_id) else { continue };
            let Some((chunk, bytes)) = streamable(asset, payloads) else { continue };
            if !sent_assets.insert(asset.id.as_str()) {
                continue;
            }
            for (i, piece) in bytes.chunks(chunk.chunk_size.max(1)).enumerate() {
                out.push(seq.wrap(Message::ImageChunk {
                    asset_id: asset.id.clone(),
                    node_id: Some(node.id.clone()),
                    chunk_index: i as u32,
                    total_chunks: chunk.total_chunks,
                    data: piece.to_vec(),
                }));
                chunks += 1;
            }
        }
        out.push(seq.wrap(Message::Progress {
            phase: Phase::Transport,
            current: batch_index + 1,
            total: total_batches,
            message: Some(format!("{} nodes", batch.len())),
        }));
    }

    // streamed assets only referenced from unsent owners (background layers)
    for asset in &images {
        let Some((chunk, bytes)) = streamable(asset, payloads) else { continue };
        if sent_assets.contains(asset.id.as_str()) {
            continue;
        }
        for (i, piece) in bytes.chunks(chunk.chunk_size.max(1)).enumerate() {
            out.push(seq.wrap(Message::ImageChunk {
                asset_id: asset.id.clone(),
                node_id: asset.node_ids.first().cloned(),
                chunk_index: i as u32,
                total_chunks: chunk.total_chunks,
                data: piece.to_vec(),
            }));
            chunks += 1;
        }
    }

    let summary = CompleteSummary {
        nodes: nodes.len(),
        batches: batches.len() as u32,
        images: images.len(),
        streamed_assets: images.iter().filter(|a| a.chunk.is_some()).count(),
        chunks,
        failed_assets: images
            .iter()
            .filter(|a| matches!(a.state, AssetState::Failed { .. }))
            .count(),
        markers: doc.markers().len(),
    };
    debug!(
        "encoded {} nodes in {} batches with {} chunks",
        summary.nodes, summary.batches, summary.chunks
    );
    out.push(seq.wrap(Message::Complete { summary: Some(summary) }));
    out
}

/// Envelope reporting a failed conversion
pub fn error_envelope(seq: &mut Sequencer, err: &Error) -> Envelope {
    seq.wrap(Message::Error {
        message: err.to_string(),
        recoverable: err.is_recoverable(),
        phase: err.phase(),
    })
}

/// Push `envelopes` down a channel in order
pub async fn send_all(envelopes: Vec<Envelope>, tx: &mpsc::Sender<Envelope>) -> Result<()> {
    for env in envelopes {
        tx.send(env)
            .await
            .map_err(|_| Error::transport("receiver dropped the channel", true, Phase::Transport))?;
    }
    Ok(())
}

/// Ids of the nodes carried by a message sequence, in send order
pub fn sent_node_ids(envelopes: &[Envelope]) -> Vec<NodeId> {
    envelopes
        .iter()
        .filter_map(|e| match &e.message {
            Message::Nodes { nodes, .. } => Some(nodes.iter().map(|n| n.id.clone())),
            _ => None,
        })
        .flatten()
        .collect()
}
