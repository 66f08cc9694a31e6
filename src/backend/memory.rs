//! In-process paginated backend

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{BufferId, FramingResult, Page, PaginatedBackend, passes_id_filter};
use crate::config::PipelineConfig;
use crate::ingest::classify_event;
use crate::types::{ClassifiedFrame, Disposition, FrameEvent};
use crate::{CaptureError, Result};

struct Inner {
    buffers: HashMap<BufferId, Vec<ClassifiedFrame>>,
    /// Visible buffer -> its filtered companion
    companions: HashMap<BufferId, BufferId>,
    active: Option<BufferId>,
    next_id: u64,
}

impl Inner {
    fn allocate(&mut self, frames: Vec<ClassifiedFrame>) -> BufferId {
        self.next_id += 1;
        let id = BufferId(self.next_id);
        self.buffers.insert(id, frames);
        id
    }

    fn active_frames(&self) -> Result<&[ClassifiedFrame]> {
        let id = self.active.ok_or_else(|| CaptureError::backend_failed("read", "no framed buffer"))?;
        self.buffers
            .get(&id)
            .map(Vec::as_slice)
            .ok_or_else(|| CaptureError::backend_failed("read", format!("{id} was released")))
    }
}

/// Backend keeping the raw capture and its framed buffers in memory.
///
/// Raw events are kept sorted by timestamp (stable for ties), so every framed
/// buffer is sorted too and timestamp lookup is a binary search. Framing uses
/// the same extraction and classification as the live path.
pub struct MemoryBackend {
    raw: Vec<FrameEvent>,
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    /// Persist a raw capture, framed once with `config`.
    pub fn new(mut raw: Vec<FrameEvent>, config: &PipelineConfig) -> Self {
        raw.sort_by_key(|e| e.timestamp_micros);
        let backend = Self {
            raw,
            inner: Mutex::new(Inner {
                buffers: HashMap::new(),
                companions: HashMap::new(),
                active: None,
                next_id: 0,
            }),
        };
        let result = backend.frame(config, None);
        info!(
            "Persisted capture: {} frames ({} filtered) as {}",
            result.frame_count, result.filtered_count, result.buffer_id
        );
        backend
    }

    pub fn raw_len(&self) -> usize {
        self.raw.len()
    }

    pub fn active_buffer(&self) -> Option<BufferId> {
        self.inner.lock().active
    }

    pub fn buffer_count(&self) -> usize {
        self.inner.lock().buffers.len()
    }

    /// Frames of a filtered-out buffer, for inspection.
    pub fn buffer(&self, id: BufferId) -> Option<Vec<ClassifiedFrame>> {
        self.inner.lock().buffers.get(&id).cloned()
    }

    fn frame(&self, config: &PipelineConfig, previous: Option<BufferId>) -> FramingResult {
        let (visible, filtered): (Vec<_>, Vec<_>) = self
            .raw
            .iter()
            .map(|event| classify_event(event, config))
            .partition(|frame| matches!(frame.disposition, Disposition::Matched | Disposition::Unmatched));

        let mut inner = self.inner.lock();
        if let Some(previous) = previous {
            inner.buffers.remove(&previous);
            if let Some(companion) = inner.companions.remove(&previous) {
                inner.buffers.remove(&companion);
            }
        }

        let frame_count = visible.len();
        let filtered_count = filtered.len();
        let buffer_id = inner.allocate(visible);
        let filtered_buffer_id = (!filtered.is_empty()).then(|| inner.allocate(filtered));
        if let Some(companion) = filtered_buffer_id {
            inner.companions.insert(buffer_id, companion);
        }
        inner.active = Some(buffer_id);

        FramingResult { buffer_id, frame_count, filtered_count, filtered_buffer_id }
    }
}

#[async_trait::async_trait]
impl PaginatedBackend for MemoryBackend {
    async fn fetch_page(&self, offset: usize, limit: usize, id_filter: Option<&[u32]>) -> Result<Page> {
        let inner = self.inner.lock();
        let frames = inner.active_frames()?;

        let page = match id_filter {
            None => {
                let start = offset.min(frames.len());
                let end = start.saturating_add(limit).min(frames.len());
                Page { records: frames[start..end].to_vec(), total_count: frames.len() }
            }
            Some(_) => {
                let matching: Vec<&ClassifiedFrame> =
                    frames.iter().filter(|f| passes_id_filter(f, id_filter)).collect();
                let records = matching.iter().skip(offset).take(limit).map(|f| (*f).clone()).collect();
                Page { records, total_count: matching.len() }
            }
        };
        debug!("Fetched {} records at offset {}", page.records.len(), offset);
        Ok(page)
    }

    async fn find_offset_for_timestamp(
        &self,
        timestamp_micros: u64,
        id_filter: Option<&[u32]>,
    ) -> Result<usize> {
        let inner = self.inner.lock();
        let frames = inner.active_frames()?;

        let offset = match id_filter {
            None => frames.partition_point(|f| f.timestamp_micros() < timestamp_micros),
            Some(_) => frames
                .iter()
                .filter(|f| passes_id_filter(f, id_filter))
                .take_while(|f| f.timestamp_micros() < timestamp_micros)
                .count(),
        };
        Ok(offset)
    }

    async fn apply_framing(&self, config: &PipelineConfig, previous: Option<BufferId>) -> Result<FramingResult> {
        if let Some(previous) = previous {
            if !self.inner.lock().buffers.contains_key(&previous) {
                return Err(CaptureError::backend_failed(
                    "apply_framing",
                    format!("unknown previous buffer {previous}"),
                ));
            }
        }
        Ok(self.frame(config, previous))
    }
}
