//! Wire messages
//!
//! Every message travels in an [`Envelope`] carrying a strictly increasing
//! sequence number. On the wire an envelope is one JSON object:
//! `{"seq": 3, "type": "NODES", "batchIndex": 0, ...}`.

use crate::error::Phase;
use crate::ir::{DesignTokens, FontAsset, ImageAsset, Node, NodeId, StackingContext, SvgAsset};
use crate::{Result, Viewport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

/// Counts reported with `COMPLETE`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSummary {
    pub nodes: usize,
    pub batches: u32,
    pub images: usize,
    pub streamed_assets: usize,
    pub chunks: usize,
    pub failed_assets: usize,
    pub markers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Document metadata and the asset table without bytes; sent first
    #[serde(rename_all = "camelCase")]
    Meta {
        url: String,
        title: String,
        viewport: Viewport,
        #[serde(default)]
        meta: BTreeMap<String, String>,
        #[serde(default)]
        root: Option<NodeId>,
        #[serde(default)]
        images: Vec<ImageAsset>,
        #[serde(default)]
        svgs: Vec<SvgAsset>,
        #[serde(default)]
        stacking_contexts: Vec<StackingContext>,
    },
    Tokens {
        tokens: DesignTokens,
    },
    Fonts {
        fonts: Vec<FontAsset>,
    },
    #[serde(rename_all = "camelCase")]
    Nodes {
        batch_index: u32,
        total_batches: u32,
        nodes: Vec<Node>,
    },
    #[serde(rename_all = "camelCase")]
    ImageChunk {
        asset_id: String,
        #[serde(default)]
        node_id: Option<NodeId>,
        chunk_index: u32,
        total_chunks: u32,
        data: Vec<u8>,
    },
    Complete {
        #[serde(default)]
        summary: Option<CompleteSummary>,
    },
    Error {
        message: String,
        recoverable: bool,
        #[serde(default)]
        phase: Option<Phase>,
    },
    Progress {
        phase: Phase,
        current: u32,
        total: u32,
        #[serde(default)]
        message: Option<String>,
    },
}

impl Message {
    /// Wire name of the message type
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Meta { .. } => "META",
            Message::Tokens { .. } => "TOKENS",
            Message::Fonts { .. } => "FONTS",
            Message::Nodes { .. } => "NODES",
            Message::ImageChunk { .. } => "IMAGE_CHUNK",
            Message::Complete { .. } => "COMPLETE",
            Message::Error { .. } => "ERROR",
            Message::Progress { .. } => "PROGRESS",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Message::Complete { .. } | Message::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub seq: u64,
    #[serde(flatten)]
    pub message: Message,
}

/// Write envelopes as newline-delimited JSON
pub fn write_ndjson<W: Write>(mut out: W, envelopes: &[Envelope]) -> Result<()> {
    for env in envelopes {
        serde_json::to_writer(&mut out, env)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Read newline-delimited envelopes; blank lines are skipped
pub fn read_ndjson<R: BufRead>(input: R) -> Result<Vec<Envelope>> {
    let mut out = Vec::new();
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line)?);
    }
    Ok(out)
}
