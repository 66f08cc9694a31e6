//! Bounded ingestion, classification and buffering for high-rate bus frame captures.
//!
//! `framestream` turns a stream of raw captured frames (CAN messages, delimited
//! serial records) into a bounded, versioned frame buffer and per-signal ring
//! buffers that a viewer can read while the capture runs.
//!
//! # Features
//!
//! - **Field extraction**: routing IDs and source addresses read from configurable
//!   byte layouts, including negative (from-the-end) offsets
//! - **Classification**: every frame tagged matched, unmatched, too short or ID-filtered
//! - **Bounded storage**: amortized compaction of the frame buffer, fixed-capacity
//!   signal rings with running statistics
//! - **Paginated handoff**: once a capture is persisted, reads move to a backend
//!   with stale-response protection for timeline scrubbing
//!
//! # Quick Start
//!
//! ```rust
//! use framestream::{CaptureSession, ChannelProvider, ClassifierConfig, FrameEvent, PipelineConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig {
//!     classifier: ClassifierConfig::with_catalog([0x100]),
//!     ..PipelineConfig::default()
//! };
//! let (sender, provider) = ChannelProvider::new(64);
//! let session = CaptureSession::start(provider, config)?;
//!
//! sender.send(vec![FrameEvent::new(0x100, vec![1, 2, 3, 4], 0)]).await?;
//! drop(sender);
//!
//! let summary = session.finished().await?;
//! assert_eq!(summary.counts.matched, 1);
//! # Ok(())
//! # }
//! ```

// Core types and error handling
mod error;
pub mod types;

// Classification and selection
pub mod classify;
pub mod config;
pub mod decode;
pub mod selection;

// Storage
pub mod store;

// Ingestion and the capture driver
pub mod driver;
pub mod ingest;
pub mod provider;
pub mod providers;
pub mod session;

// Paginated backend handoff
pub mod backend;
pub mod bridge;

pub mod logging;

// Core exports
pub use error::*;
pub use types::*;

pub use backend::{BufferId, FramingResult, MemoryBackend, Page, PaginatedBackend};
pub use bridge::{BridgePhase, BufferBridge, BufferMode, BufferModeState, SeekOutcome, SeekTicket};
pub use classify::{ClassifierConfig, classify, masked_id, requires_processing};
pub use config::{FRAME_FLUSH_INTERVAL, LIGHT_FLUSH_INTERVAL, PipelineConfig};
pub use decode::{FieldDecoder, FrameDecoder, SignalSample};
pub use ingest::{CaptureSummary, DispositionCounts};
pub use provider::Provider;
pub use providers::{ChannelProvider, FrameSender, ReplayProvider};
pub use selection::SelectionIndex;
pub use session::CaptureSession;
pub use store::{LiveView, SignalView};
