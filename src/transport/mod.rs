//! Streaming transport
//!
//! The sender turns a finished document into an ordered envelope sequence
//! (`META`, `TOKENS`, `FONTS`, `NODES`..., `IMAGE_CHUNK`..., `COMPLETE`);
//! the receiver rebuilds the document incrementally from it. One channel
//! carries exactly one conversion.

pub mod message;
pub mod reassembly;
pub mod receiver;
pub mod sender;

pub use message::{read_ndjson, write_ndjson, CompleteSummary, Envelope, Message};
pub use reassembly::{BufferState, ChunkBuffer, ChunkEvent, ChunkStore};
pub use receiver::{receive, Received, Receiver, StreamStatus};
pub use sender::{encode_document, error_envelope, send_all, sent_node_ids, Sequencer};

use crate::ir::Document;
use crate::{Error, Result, TransportConfig};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Send `doc` through an in-process channel and rebuild it on the other side
pub async fn loopback(doc: &Document, payloads: &HashMap<String, Vec<u8>>, config: &TransportConfig) -> Result<Received> {
    let envelopes = encode_document(doc, payloads, config);
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let sender = tokio::spawn(async move { send_all(envelopes, &tx).await });
    let received = receive(rx, config).await?;
    sender
        .await
        .map_err(|e| Error::Other(format!("sender task failed: {}", e)))??;
    Ok(received)
}
