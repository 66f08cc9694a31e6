//! Ingestion: batching raw events and applying them to storage.
//!
//! Raw events from the transport are queued by a [`Batcher`]. When the single
//! armed flush timer fires, the whole queue is handed to [`Pipeline::flush`],
//! which extracts routing fields, classifies each frame in arrival order, and
//! writes the results to the frame store and signal buffers.
//!
//! ```rust
//! use std::sync::Arc;
//! use framestream::ingest::Pipeline;
//! use framestream::store::{FrameStore, SignalBuffers, shared_frame_store, shared_signal_buffers};
//! use framestream::types::{Disposition, FrameEvent};
//! use framestream::{ClassifierConfig, PipelineConfig};
//!
//! let (frames, live) = shared_frame_store(FrameStore::default());
//! let (signals, _) = shared_signal_buffers(SignalBuffers::default());
//! let mut pipeline = Pipeline::new(frames, signals);
//!
//! let config = Arc::new(PipelineConfig {
//!     classifier: ClassifierConfig::with_catalog([0x100]),
//!     ..PipelineConfig::default()
//! });
//! let stats = pipeline.flush(vec![FrameEvent::new(0x100, vec![0; 8], 0)], &config);
//!
//! assert_eq!(stats.counts.matched, 1);
//! assert_eq!(live.snapshot().1[0].disposition, Disposition::Matched);
//! ```

mod batcher;
mod pipeline;

pub use batcher::{Batcher, BatcherState, Schedule};
pub use pipeline::{CaptureSummary, DispositionCounts, FlushStats, Pipeline, classify_event};
