//! Chunk reassembly
//!
//! One [`ChunkBuffer`] per streamed asset moves through
//! `Collecting -> Complete -> Released`, or `Collecting -> TimedOut` when it
//! outlives the reassembly timeout. Chunks are keyed by index, so arrival
//! order does not matter and a repeated index is ignored.

use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Collecting,
    Complete,
    Released,
    TimedOut,
}

#[derive(Debug)]
pub struct ChunkBuffer {
    asset_id: String,
    total_chunks: u32,
    chunks: BTreeMap<u32, Vec<u8>>,
    created: Instant,
    state: BufferState,
}

impl ChunkBuffer {
    pub fn new(asset_id: impl Into<String>, total_chunks: u32, now: Instant) -> Self {
        Self {
            asset_id: asset_id.into(),
            total_chunks,
            chunks: BTreeMap::new(),
            created: now,
            state: BufferState::Collecting,
        }
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    pub fn received(&self) -> usize {
        self.chunks.len()
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    /// Store one chunk. Returns `false` if the index was already present.
    pub fn insert(&mut self, index: u32, data: Vec<u8>) -> bool {
        if self.state != BufferState::Collecting || self.chunks.contains_key(&index) {
            return false;
        }
        self.chunks.insert(index, data);
        if self.chunks.len() == self.total_chunks as usize {
            self.state = BufferState::Complete;
        }
        true
    }

    /// Concatenate in index order and release the chunk storage
    pub fn assemble(&mut self) -> Option<Vec<u8>> {
        if self.state != BufferState::Complete {
            return None;
        }
        let size = self.chunks.values().map(Vec::len).sum();
        let mut out = Vec::with_capacity(size);
        for (_, chunk) in std::mem::take(&mut self.chunks) {
            out.extend(chunk);
        }
        self.state = BufferState::Released;
        Some(out)
    }

    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        self.state == BufferState::Collecting && now.saturating_duration_since(self.created) >= timeout
    }
}

/// Result of feeding one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkEvent {
    Pending { received: usize, total: u32 },
    Completed(Vec<u8>),
    /// Repeated index, or a chunk for an asset already finished
    Duplicate,
    Rejected(String),
}

/// All open reassembly buffers of one receiver
#[derive(Debug)]
pub struct ChunkStore {
    buffers: HashMap<String, ChunkBuffer>,
    finished: HashMap<String, BufferState>,
    timeout: Duration,
}

impl ChunkStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            buffers: HashMap::new(),
            finished: HashMap::new(),
            timeout,
        }
    }

    /// Buffers still collecting
    pub fn open(&self) -> usize {
        self.buffers.len()
    }

    pub fn state_of(&self, asset_id: &str) -> Option<BufferState> {
        self.buffers
            .get(asset_id)
            .map(ChunkBuffer::state)
            .or_else(|| self.finished.get(asset_id).copied())
    }

    pub fn accept(&mut self, asset_id: &str, index: u32, total_chunks: u32, data: Vec<u8>, now: Instant) -> ChunkEvent {
        if total_chunks == 0 || index >= total_chunks {
            return ChunkEvent::Rejected(format!(
                "chunk {} outside declared range of {} for '{}'",
                index, total_chunks, asset_id
            ));
        }
        if let Some(state) = self.finished.get(asset_id) {
            return match state {
                BufferState::TimedOut => ChunkEvent::Rejected(format!("'{}' already timed out", asset_id)),
                _ => ChunkEvent::Duplicate,
            };
        }
        let buffer = self
            .buffers
            .entry(asset_id.to_string())
            .or_insert_with(|| ChunkBuffer::new(asset_id, total_chunks, now));
        if buffer.total_chunks != total_chunks {
            return ChunkEvent::Rejected(format!(
                "'{}' declared {} chunks, then {}",
                asset_id, buffer.total_chunks, total_chunks
            ));
        }
        if !buffer.insert(index, data) {
            return ChunkEvent::Duplicate;
        }
        match buffer.assemble() {
            Some(bytes) => {
                debug!("reassembled '{}' from {} chunks ({} bytes)", asset_id, total_chunks, bytes.len());
                self.buffers.remove(asset_id);
                self.finished.insert(asset_id.to_string(), BufferState::Released);
                ChunkEvent::Completed(bytes)
            }
            None => ChunkEvent::Pending {
                received: buffer.received(),
                total: total_chunks,
            },
        }
    }

    /// Drop buffers older than the timeout; returns their asset ids
    pub fn sweep(&mut self, now: Instant) -> Vec<String> {
        let timeout = self.timeout;
        let expired: Vec<String> = self
            .buffers
            .values()
            .filter(|b| b.is_expired(now, timeout))
            .map(|b| b.asset_id.clone())
            .collect();
        for id in &expired {
            if let Some(b) = self.buffers.remove(id) {
                warn!(
                    "reassembly of '{}' timed out with {}/{} chunks",
                    id,
                    b.received(),
                    b.total_chunks
                );
            }
            self.finished.insert(id.clone(), BufferState::TimedOut);
        }
        expired
    }

    /// Release every open buffer (abort); returns their asset ids
    pub fn release_all(&mut self) -> Vec<String> {
        let mut ids: Vec<String> = self.buffers.drain().map(|(id, _)| id).collect();
        ids.sort();
        for id in &ids {
            self.finished.insert(id.clone(), BufferState::Released);
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks() -> Vec<Vec<u8>> {
        vec![b"ab".to_vec(), b"cd".to_vec(), b"ef".to_vec(), b"g".to_vec()]
    }

    fn feed(order: &[u32]) -> Vec<u8> {
        let mut store = ChunkStore::new(Duration::from_secs(30));
        let now = Instant::now();
        let parts = chunks();
        let mut out = None;
        for &i in order {
            if let ChunkEvent::Completed(bytes) = store.accept("img", i, 4, parts[i as usize].clone(), now) {
                out = Some(bytes);
            }
        }
        out.expect("complete")
    }

    #[test]
    fn arrival_order_does_not_matter() {
        assert_eq!(feed(&[2, 0, 3, 1]), feed(&[0, 1, 2, 3]));
        assert_eq!(feed(&[3, 2, 1, 0]), b"abcdefg".to_vec());
    }

    #[test]
    fn duplicates_do_not_corrupt() {
        let mut store = ChunkStore::new(Duration::from_secs(30));
        let now = Instant::now();
        assert!(matches!(store.accept("img", 0, 2, b"xy".to_vec(), now), ChunkEvent::Pending { received: 1, total: 2 }));
        assert_eq!(store.accept("img", 0, 2, b"zz".to_vec(), now), ChunkEvent::Duplicate);
        assert_eq!(store.accept("img", 1, 2, b"z".to_vec(), now), ChunkEvent::Completed(b"xyz".to_vec()));
        assert_eq!(store.accept("img", 1, 2, b"z".to_vec(), now), ChunkEvent::Duplicate);
        assert_eq!(store.state_of("img"), Some(BufferState::Released));
        assert_eq!(store.open(), 0);
    }

    #[test]
    fn rejects_out_of_range_and_inconsistent_totals() {
        let mut store = ChunkStore::new(Duration::from_secs(30));
        let now = Instant::now();
        assert!(matches!(store.accept("img", 4, 4, vec![], now), ChunkEvent::Rejected(_)));
        store.accept("img", 0, 4, vec![1], now);
        assert!(matches!(store.accept("img", 1, 5, vec![2], now), ChunkEvent::Rejected(_)));
    }

    #[test]
    fn sweep_times_out_stale_buffers_only() {
        let mut store = ChunkStore::new(Duration::from_secs(30));
        let start = Instant::now();
        store.accept("old", 0, 2, vec![1], start);
        store.accept("new", 0, 2, vec![1], start + Duration::from_secs(20));
        assert!(store.sweep(start + Duration::from_secs(29)).is_empty());
        assert_eq!(store.sweep(start + Duration::from_secs(31)), vec!["old".to_string()]);
        assert_eq!(store.state_of("old"), Some(BufferState::TimedOut));
        assert!(matches!(store.accept("old", 1, 2, vec![2], start), ChunkEvent::Rejected(_)));
        assert_eq!(store.open(), 1);
        assert_eq!(store.release_all(), vec!["new".to_string()]);
        assert_eq!(store.open(), 0);
    }
}
