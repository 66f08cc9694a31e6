//! Paginated backend store interface.
//!
//! Once a capture stops, or when the live buffer is disabled, frames are read
//! from an external store that supports offset-paginated reads, timestamp
//! lookup and re-framing of the raw capture with a new extraction layout.
//! Every call is treated as a fallible remote operation.

mod memory;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::config::PipelineConfig;
use crate::types::ClassifiedFrame;

pub use memory::MemoryBackend;

/// Identifier of a framed buffer held by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct BufferId(pub u64);

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "buffer-{}", self.0)
    }
}

/// One page of frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<ClassifiedFrame>,
    /// Total frames matching the request's ID filter
    pub total_count: usize,
}

/// Outcome of re-framing the raw capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct FramingResult {
    /// Buffer holding the visible (matched and unmatched) frames
    pub buffer_id: BufferId,
    pub frame_count: usize,
    /// Frames classified too short or ID-filtered
    pub filtered_count: usize,
    /// Buffer holding the filtered frames, when there are any
    pub filtered_buffer_id: Option<BufferId>,
}

/// External paginated store.
#[async_trait::async_trait]
pub trait PaginatedBackend: Send + Sync + 'static {
    /// Read `limit` frames starting at row `offset` of the active buffer.
    ///
    /// With an ID filter only frames whose raw or masked routing ID is listed
    /// are counted and returned.
    async fn fetch_page(&self, offset: usize, limit: usize, id_filter: Option<&[u32]>) -> Result<Page>;

    /// Row offset of the first frame at or after `timestamp_micros`.
    async fn find_offset_for_timestamp(&self, timestamp_micros: u64, id_filter: Option<&[u32]>)
    -> Result<usize>;

    /// Re-frame the raw capture with `config` and make the result the active buffer.
    ///
    /// `previous` names the buffer being replaced so the backend can release it.
    async fn apply_framing(&self, config: &PipelineConfig, previous: Option<BufferId>) -> Result<FramingResult>;
}

/// Whether a frame passes an optional ID filter (raw or masked ID).
pub(crate) fn passes_id_filter(frame: &ClassifiedFrame, id_filter: Option<&[u32]>) -> bool {
    match id_filter {
        Some(ids) => ids.contains(&frame.routing_id()) || ids.contains(&frame.masked_id),
        None => true,
    }
}
