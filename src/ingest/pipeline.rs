//! Extraction, classification and storage for one flush

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::classify::requires_processing;
use crate::config::PipelineConfig;
use crate::decode::{FrameDecoder, SignalSample};
use crate::selection::SelectionIndex;
use crate::store::{FrameStoreWriter, SignalWriter};
use crate::types::{ClassifiedFrame, Disposition, FrameEvent};

/// Per-disposition frame counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct DispositionCounts {
    pub matched: u64,
    pub unmatched: u64,
    pub too_short: u64,
    pub id_filtered: u64,
}

impl DispositionCounts {
    pub fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Matched => self.matched += 1,
            Disposition::Unmatched => self.unmatched += 1,
            Disposition::TooShort => self.too_short += 1,
            Disposition::IdFiltered => self.id_filtered += 1,
        }
    }

    pub fn get(&self, disposition: Disposition) -> u64 {
        match disposition {
            Disposition::Matched => self.matched,
            Disposition::Unmatched => self.unmatched,
            Disposition::TooShort => self.too_short,
            Disposition::IdFiltered => self.id_filtered,
        }
    }

    pub fn total(&self) -> u64 {
        self.matched + self.unmatched + self.too_short + self.id_filtered
    }

    fn merge(&mut self, other: &DispositionCounts) {
        self.matched += other.matched;
        self.unmatched += other.unmatched;
        self.too_short += other.too_short;
        self.id_filtered += other.id_filtered;
    }
}

/// Outcome of a single flush.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushStats {
    pub counts: DispositionCounts,
    /// Frames decoded into signal samples
    pub processed: u64,
    pub samples: u64,
    /// Routing IDs seen for the first time in this flush, in arrival order
    pub new_ids: Vec<u32>,
    /// Frame store version after the flush
    pub store_version: u64,
}

/// Running totals over a capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct CaptureSummary {
    pub flushes: u64,
    pub counts: DispositionCounts,
    pub processed: u64,
    pub samples: u64,
    pub distinct_ids: u64,
    pub store_version: u64,
}

/// Applies extraction layouts and classification to a single event.
pub fn classify_event(event: &FrameEvent, config: &PipelineConfig) -> ClassifiedFrame {
    let mut event = event.clone();
    if let Some(layout) = &config.id_extraction {
        // Routing IDs are 32-bit; wider layouts keep the low bits
        event.routing_id = layout.extract(&event.bytes) as u32;
    }
    if let Some(layout) = &config.source_extraction {
        event.source_address = Some(layout.extract(&event.bytes) as u32);
    }

    let masked_id = config.classifier.mask_id(event.routing_id);
    let disposition = config.classifier.classify(&event);
    ClassifiedFrame { event, masked_id, disposition }
}

/// Owns the write side of the stores and runs each flush.
///
/// The configuration and selection are passed in explicitly so a flush always
/// sees the values current at the moment it runs.
pub struct Pipeline {
    frames: FrameStoreWriter,
    signals: SignalWriter,
    decoder: Option<Box<dyn FrameDecoder>>,
    selection: SelectionIndex,
    summary: CaptureSummary,
    sample_scratch: Vec<SignalSample>,
}

impl Pipeline {
    pub fn new(frames: FrameStoreWriter, signals: SignalWriter) -> Self {
        Self {
            frames,
            signals,
            decoder: None,
            selection: SelectionIndex::new(),
            summary: CaptureSummary::default(),
            sample_scratch: Vec::new(),
        }
    }

    pub fn with_decoder(mut self, decoder: Box<dyn FrameDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn selection(&self) -> &SelectionIndex {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionIndex {
        &mut self.selection
    }

    pub fn summary(&self) -> CaptureSummary {
        self.summary
    }

    /// Process one batch in arrival order and apply it to the stores.
    ///
    /// An empty batch leaves the stores and their versions untouched.
    pub fn flush(&mut self, events: Vec<FrameEvent>, config: &Arc<PipelineConfig>) -> FlushStats {
        let mut stats = FlushStats { store_version: self.frames.version(), ..FlushStats::default() };
        if events.is_empty() {
            return stats;
        }

        let mut classified = Vec::with_capacity(events.len());
        self.sample_scratch.clear();

        for event in &events {
            let frame = classify_event(event, config);
            stats.counts.record(frame.disposition);

            if self.selection.observe(frame.routing_id()) {
                stats.new_ids.push(frame.routing_id());
            }

            if requires_processing(frame.disposition, frame.masked_id, frame.routing_id(), &self.selection) {
                stats.processed += 1;
                if let Some(decoder) = self.decoder.as_mut() {
                    decoder.decode(&frame, &mut self.sample_scratch);
                }
            }

            classified.push(frame);
        }

        stats.store_version = self.frames.push(classified, config.max_buffer);

        if !self.sample_scratch.is_empty() {
            stats.samples = self.sample_scratch.len() as u64;
            self.signals.append_batch(
                self.sample_scratch.iter().map(|s| (s.key.as_str(), s.timestamp_micros, s.value)),
            );
        }

        if !stats.new_ids.is_empty() {
            debug!("Discovered {} new routing IDs", stats.new_ids.len());
        }
        trace!(
            "Flushed {} frames: matched={} unmatched={} too_short={} id_filtered={} processed={}",
            events.len(),
            stats.counts.matched,
            stats.counts.unmatched,
            stats.counts.too_short,
            stats.counts.id_filtered,
            stats.processed
        );

        self.summary.flushes += 1;
        self.summary.counts.merge(&stats.counts);
        self.summary.processed += stats.processed;
        self.summary.samples += stats.samples;
        self.summary.distinct_ids = self.selection.seen_ids().len() as u64;
        self.summary.store_version = stats.store_version;
        stats
    }

    /// Drop all stored frames, samples and discovered IDs.
    pub fn clear(&mut self) {
        let version = self.frames.clear();
        self.signals.clear();
        self.selection.clear_seen();
        self.summary.distinct_ids = 0;
        self.summary.store_version = version;
    }

    pub fn set_overshoot_threshold(&self, overshoot_threshold: usize) {
        self.frames.set_overshoot_threshold(overshoot_threshold);
    }
}
