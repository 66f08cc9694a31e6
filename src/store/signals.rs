//! Fixed-capacity per-signal ring buffers for charting

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Default number of samples kept per signal.
pub const DEFAULT_SIGNAL_CAPACITY: usize = 10_000;

/// Summary statistics over a set of samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SeriesStats {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub sample_count: u64,
}

impl SeriesStats {
    pub fn mean(&self) -> f64 {
        if self.sample_count == 0 { 0.0 } else { self.sum / self.sample_count as f64 }
    }

    fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut stats =
            SeriesStats { min: f64::INFINITY, max: f64::NEG_INFINITY, sum: 0.0, sample_count: 0 };
        for &value in values {
            stats.min = stats.min.min(value);
            stats.max = stats.max.max(value);
            stats.sum += value;
            stats.sample_count += 1;
        }
        Some(stats)
    }
}

/// Circular buffer of `(timestamp, value)` samples for one signal.
///
/// Running min/max/sum are cumulative since creation (or the last [`reset`]),
/// not over the retained window; use [`windowed_stats`] for the latter.
///
/// [`reset`]: SignalSeries::reset
/// [`windowed_stats`]: SignalSeries::windowed_stats
#[derive(Debug, Clone)]
pub struct SignalSeries {
    timestamps: Box<[u64]>,
    values: Box<[f64]>,
    write_index: usize,
    count: usize,
    min: f64,
    max: f64,
    sum: f64,
    sample_count: u64,
}

impl SignalSeries {
    /// Create a series holding at most `capacity` samples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            timestamps: vec![0; capacity].into_boxed_slice(),
            values: vec![0.0; capacity].into_boxed_slice(),
            write_index: 0,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            sample_count: 0,
        }
    }

    pub fn append(&mut self, timestamp: u64, value: f64) {
        let capacity = self.capacity();
        self.timestamps[self.write_index] = timestamp;
        self.values[self.write_index] = value;
        self.write_index = (self.write_index + 1) % capacity;
        if self.count < capacity {
            self.count += 1;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.sample_count += 1;
    }

    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_saturated(&self) -> bool {
        self.count == self.capacity()
    }

    /// Index of the slot written next (the oldest sample once saturated).
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    fn start_index(&self) -> usize {
        if self.count < self.capacity() { 0 } else { self.write_index }
    }

    /// Retained samples in chronological order.
    pub fn read_ordered(&self) -> (Vec<u64>, Vec<f64>) {
        let start = self.start_index();
        let capacity = self.capacity();
        let mut timestamps = Vec::with_capacity(self.count);
        let mut values = Vec::with_capacity(self.count);
        for i in 0..self.count {
            let idx = (start + i) % capacity;
            timestamps.push(self.timestamps[idx]);
            values.push(self.values[idx]);
        }
        (timestamps, values)
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<(u64, f64)> {
        if self.count == 0 {
            return None;
        }
        let idx = (self.write_index + self.capacity() - 1) % self.capacity();
        Some((self.timestamps[idx], self.values[idx]))
    }

    /// Cumulative statistics since creation, O(1).
    pub fn stats(&self) -> Option<SeriesStats> {
        (self.sample_count > 0).then_some(SeriesStats {
            min: self.min,
            max: self.max,
            sum: self.sum,
            sample_count: self.sample_count,
        })
    }

    /// Statistics over the retained window, recomputed from the ordered samples.
    pub fn windowed_stats(&self) -> Option<SeriesStats> {
        SeriesStats::from_values(&self.read_ordered().1)
    }

    /// Drop all samples and statistics, keeping the capacity.
    pub fn reset(&mut self) {
        *self = Self::new(self.capacity());
    }
}

/// One ring buffer per signal key, created lazily with a shared capacity.
#[derive(Debug, Clone)]
pub struct SignalBuffers {
    capacity: usize,
    series: HashMap<String, SignalSeries>,
    version: u64,
}

impl Default for SignalBuffers {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNAL_CAPACITY)
    }
}

impl SignalBuffers {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), series: HashMap::new(), version: 0 }
    }

    pub fn append(&mut self, key: &str, timestamp: u64, value: f64) {
        match self.series.get_mut(key) {
            Some(series) => series.append(timestamp, value),
            None => {
                let mut series = SignalSeries::new(self.capacity);
                series.append(timestamp, value);
                self.series.insert(key.to_string(), series);
            }
        }
    }

    /// Bump the version after a batch of appends.
    pub fn mark_updated(&mut self) {
        self.version += 1;
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, key: &str) -> Option<&SignalSeries> {
        self.series.get(key)
    }

    pub fn read_ordered(&self, key: &str) -> Option<(Vec<u64>, Vec<f64>)> {
        self.series.get(key).map(SignalSeries::read_ordered)
    }

    /// Signal keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.series.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn clear(&mut self) {
        self.series.clear();
        self.version += 1;
    }

    /// Align the listed series on the time base of the first one.
    pub fn align(&self, base: &str, others: &[&str]) -> Option<AlignedSeries> {
        let base = self.series.get(base)?;
        let others: Vec<Option<&SignalSeries>> = others.iter().map(|key| self.series.get(*key)).collect();
        Some(align_optional(base, &others))
    }
}

/// Multiple series sampled on one time base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct AlignedSeries {
    pub timestamps: Vec<u64>,
    pub base: Vec<f64>,
    /// One column per other series; `None` where it has no sample at that timestamp
    pub columns: Vec<Vec<Option<f64>>>,
}

/// Align `others` on the timestamps of `base`.
///
/// A column holds a value only where that series has a sample with exactly the
/// base timestamp; gaps are `None`, never interpolated. When a series has several
/// samples with the same timestamp, the latest one is used.
pub fn align(base: &SignalSeries, others: &[&SignalSeries]) -> AlignedSeries {
    let others: Vec<Option<&SignalSeries>> = others.iter().map(|s| Some(*s)).collect();
    align_optional(base, &others)
}

fn align_optional(base: &SignalSeries, others: &[Option<&SignalSeries>]) -> AlignedSeries {
    let (timestamps, base_values) = base.read_ordered();

    let columns = others
        .iter()
        .map(|other| match other {
            Some(series) => align_column(&timestamps, series),
            None => vec![None; timestamps.len()],
        })
        .collect();

    AlignedSeries { timestamps, base: base_values, columns }
}

fn align_column(base_timestamps: &[u64], series: &SignalSeries) -> Vec<Option<f64>> {
    let (timestamps, values) = series.read_ordered();
    let mut column = Vec::with_capacity(base_timestamps.len());
    let mut cursor = 0;

    for &ts in base_timestamps {
        while cursor < timestamps.len() && timestamps[cursor] < ts {
            cursor += 1;
        }
        let mut found = None;
        let mut scan = cursor;
        while scan < timestamps.len() && timestamps[scan] == ts {
            found = Some(values[scan]);
            scan += 1;
        }
        column.push(found);
    }
    column
}

/// Split signal buffers into a writer and a cloneable read-only view.
pub fn shared_signal_buffers(buffers: SignalBuffers) -> (SignalWriter, SignalView) {
    let inner = Arc::new(RwLock::new(buffers));
    (SignalWriter { inner: Arc::clone(&inner) }, SignalView { inner })
}

/// Exclusive write half of shared [`SignalBuffers`], owned by the flush task.
#[derive(Debug)]
pub struct SignalWriter {
    inner: Arc<RwLock<SignalBuffers>>,
}

impl SignalWriter {
    /// Apply a batch of `(key, timestamp, value)` samples under one lock.
    pub fn append_batch<'a>(&self, samples: impl IntoIterator<Item = (&'a str, u64, f64)>) -> u64 {
        let mut buffers = self.inner.write();
        let mut appended = false;
        for (key, timestamp, value) in samples {
            buffers.append(key, timestamp, value);
            appended = true;
        }
        if appended {
            buffers.mark_updated();
        }
        buffers.version()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn view(&self) -> SignalView {
        SignalView { inner: Arc::clone(&self.inner) }
    }
}

/// Read-only handle to the signal buffers.
#[derive(Debug, Clone)]
pub struct SignalView {
    inner: Arc<RwLock<SignalBuffers>>,
}

impl SignalView {
    pub fn version(&self) -> u64 {
        self.inner.read().version()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.read().keys()
    }

    pub fn read_ordered(&self, key: &str) -> Option<(Vec<u64>, Vec<f64>)> {
        self.inner.read().read_ordered(key)
    }

    pub fn stats(&self, key: &str) -> Option<SeriesStats> {
        self.inner.read().get(key).and_then(SignalSeries::stats)
    }

    pub fn windowed_stats(&self, key: &str) -> Option<SeriesStats> {
        self.inner.read().get(key).and_then(SignalSeries::windowed_stats)
    }

    pub fn align(&self, base: &str, others: &[&str]) -> Option<AlignedSeries> {
        self.inner.read().align(base, others)
    }
}
