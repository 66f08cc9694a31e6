//! Bounded live frame store with amortized compaction

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::types::ClassifiedFrame;

/// Default live buffer target.
pub const DEFAULT_MAX_BUFFER: usize = 10_000;

/// Default slack allowed above the target before compaction.
pub const DEFAULT_OVERSHOOT_THRESHOLD: usize = 2_000;

/// Append-mostly buffer holding the most recent frames.
///
/// Trimming to exactly `max_buffer` on every push costs O(max_buffer) per flush.
/// Instead the buffer may grow to `max_buffer + overshoot_threshold`, and the
/// first push past that bound trims to the latest `max_buffer` frames in one pass.
#[derive(Debug, Clone)]
pub struct FrameStore {
    buffer: Vec<ClassifiedFrame>,
    version: u64,
    overshoot_threshold: usize,
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new(DEFAULT_OVERSHOOT_THRESHOLD)
    }
}

impl FrameStore {
    pub fn new(overshoot_threshold: usize) -> Self {
        Self { buffer: Vec::new(), version: 0, overshoot_threshold }
    }

    /// Append frames, compacting once the overshoot bound is exceeded.
    ///
    /// Every non-empty push bumps the version, whether or not compaction ran.
    /// Returns the number of frames dropped by compaction.
    pub fn push(&mut self, frames: impl IntoIterator<Item = ClassifiedFrame>, max_buffer: usize) -> usize {
        let before = self.buffer.len();
        self.buffer.extend(frames);
        if self.buffer.len() == before {
            return 0;
        }

        let mut dropped = 0;
        if self.buffer.len() > max_buffer.saturating_add(self.overshoot_threshold) {
            dropped = self.buffer.len() - max_buffer;
            self.buffer.drain(..dropped);
            trace!("Compacted frame store: dropped {} frames, kept {}", dropped, self.buffer.len());
        }

        self.version += 1;
        dropped
    }

    /// Drop all frames.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.version += 1;
    }

    pub fn frames(&self) -> &[ClassifiedFrame] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Mutation counter; consumers re-read when it changes.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn overshoot_threshold(&self) -> usize {
        self.overshoot_threshold
    }

    /// Change the compaction slack. Takes effect on the next push.
    pub fn set_overshoot_threshold(&mut self, overshoot_threshold: usize) {
        self.overshoot_threshold = overshoot_threshold;
    }
}

/// Split a frame store into its single writer and a cloneable read-only view.
pub fn shared_frame_store(store: FrameStore) -> (FrameStoreWriter, LiveView) {
    let inner = Arc::new(RwLock::new(store));
    (FrameStoreWriter { inner: Arc::clone(&inner) }, LiveView { inner })
}

/// Exclusive write half of a shared [`FrameStore`], owned by the flush task.
#[derive(Debug)]
pub struct FrameStoreWriter {
    inner: Arc<RwLock<FrameStore>>,
}

impl FrameStoreWriter {
    /// Push under the write lock; returns the new version.
    pub fn push(&self, frames: Vec<ClassifiedFrame>, max_buffer: usize) -> u64 {
        let mut store = self.inner.write();
        store.push(frames, max_buffer);
        store.version()
    }

    pub fn clear(&self) -> u64 {
        let mut store = self.inner.write();
        store.clear();
        store.version()
    }

    pub fn set_overshoot_threshold(&self, overshoot_threshold: usize) {
        self.inner.write().set_overshoot_threshold(overshoot_threshold);
    }

    pub fn version(&self) -> u64 {
        self.inner.read().version()
    }

    /// Read-only view sharing this store.
    pub fn view(&self) -> LiveView {
        LiveView { inner: Arc::clone(&self.inner) }
    }
}

/// Read-only handle to the live frame store.
#[derive(Debug, Clone)]
pub struct LiveView {
    inner: Arc<RwLock<FrameStore>>,
}

impl LiveView {
    pub fn version(&self) -> u64 {
        self.inner.read().version()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Copy of the whole buffer with the version it was read at.
    pub fn snapshot(&self) -> (u64, Vec<ClassifiedFrame>) {
        let store = self.inner.read();
        (store.version(), store.frames().to_vec())
    }

    /// Copy of `limit` frames starting at `offset`.
    pub fn slice(&self, offset: usize, limit: usize) -> Vec<ClassifiedFrame> {
        let store = self.inner.read();
        let frames = store.frames();
        let start = offset.min(frames.len());
        let end = start.saturating_add(limit).min(frames.len());
        frames[start..end].to_vec()
    }

    /// Run `f` against the buffer without copying it.
    pub fn with_frames<R>(&self, f: impl FnOnce(&[ClassifiedFrame]) -> R) -> R {
        f(self.inner.read().frames())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Disposition, FrameEvent};
    use proptest::prelude::*;

    fn classified(ts: u64) -> ClassifiedFrame {
        ClassifiedFrame {
            event: FrameEvent::new(0x100, vec![0u8; 8], ts),
            masked_id: 0x100,
            disposition: Disposition::Unmatched,
        }
    }

    #[test]
    fn compaction_is_deferred_until_overshoot_is_exceeded() {
        let mut store = FrameStore::new(2_000);
        for ts in 0..12_000 {
            store.push([classified(ts)], 10_000);
        }
        assert_eq!(store.len(), 12_000);
        assert_eq!(store.version(), 12_000);

        let dropped = store.push([classified(12_000)], 10_000);
        assert_eq!(dropped, 2_001);
        assert_eq!(store.len(), 10_000);
        assert_eq!(store.version(), 12_001);

        // Most recent frames survive, in order
        assert_eq!(store.frames()[0].timestamp_micros(), 2_001);
        assert_eq!(store.frames()[9_999].timestamp_micros(), 12_000);
    }

    #[test]
    fn huge_overshoot_never_compacts() {
        let mut store = FrameStore::new(usize::MAX);
        assert_eq!(store.push([classified(1)], 1), 0);
        assert_eq!(store.push([classified(2)], usize::MAX), 0);
        assert_eq!(store.len(), 2);
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn empty_push_changes_nothing() {
        let mut store = FrameStore::default();
        store.push([classified(1)], 10);
        let version = store.version();

        assert_eq!(store.push(Vec::new(), 10), 0);
        assert_eq!(store.version(), version);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn clear_empties_and_bumps_version() {
        let mut store = FrameStore::default();
        store.push((0..5).map(classified), 10);
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn live_view_reads_writer_updates() {
        let (writer, view) = shared_frame_store(FrameStore::new(0));
        assert_eq!(writer.push((0..4).map(classified).collect(), 3), 1);

        assert_eq!(view.len(), 3);
        assert_eq!(view.version(), 1);
        let (version, frames) = view.snapshot();
        assert_eq!(version, 1);
        assert_eq!(frames[0].timestamp_micros(), 1);

        let page = view.slice(1, 10);
        assert_eq!(page.len(), 2);
        assert!(view.slice(10, 5).is_empty());
        assert_eq!(view.with_frames(|f| f.len()), 3);
    }

    proptest! {
        #[test]
        fn prop_length_bounded_after_every_push(
            batches in prop::collection::vec(0usize..300, 1..60),
            max_buffer in 1usize..500,
            overshoot in 0usize..200
        ) {
            let mut store = FrameStore::new(overshoot);
            let mut ts = 0u64;
            for batch in batches {
                let frames: Vec<_> = (0..batch).map(|_| { ts += 1; classified(ts) }).collect();
                store.push(frames, max_buffer);
                prop_assert!(store.len() <= max_buffer + overshoot);
            }
            // Contents stay in arrival order
            let stamps: Vec<u64> = store.frames().iter().map(|f| f.timestamp_micros()).collect();
            prop_assert!(stamps.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
