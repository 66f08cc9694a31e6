//! Bridge between the live frame store and the paginated backend.
//!
//! While a capture streams, reads come straight from the [`LiveView`]. Once the
//! capture stops and the backend confirms it persisted the data (or the live
//! buffer is explicitly disabled), reads become paginated backend fetches.
//!
//! ## Lifecycle
//!
//! ```text
//! Streaming --capture_stopped--> Stopped --(persisted)--> PaginatedReady
//!     ^                                                         |
//!     +--------------------- start_capture ---------------------+
//! ```
//!
//! ## Stale responses
//!
//! Scrubbing a timeline issues many timestamp lookups whose responses can
//! arrive out of order. Each lookup is tagged with a [`SeekTicket`]; only the
//! response carrying the latest issued tag is applied.
//!
//! ```rust
//! # use framestream::bridge::{BufferBridge, SeekOutcome};
//! # use framestream::{MemoryBackend, PipelineConfig};
//! # let backend = MemoryBackend::new(Vec::new(), &PipelineConfig::default());
//! let mut bridge = BufferBridge::new(backend, 100);
//! bridge.capture_stopped(true, 1_000);
//!
//! let first = bridge.begin_seek();
//! let second = bridge.begin_seek();
//! assert!(matches!(bridge.complete_seek(second, Ok(250)), Ok(SeekOutcome::Applied { page: 2, .. })));
//! assert!(matches!(bridge.complete_seek(first, Ok(900)), Ok(SeekOutcome::Stale)));
//! assert_eq!(bridge.current_page(), 2);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Result;
use crate::backend::{BufferId, FramingResult, Page, PaginatedBackend, passes_id_filter};
use crate::config::PipelineConfig;
use crate::store::LiveView;

/// Where frame reads are served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "snake_case")]
pub enum BufferMode {
    /// In-process live buffer
    Streaming,
    /// External paginated store
    Paginated,
}

/// Bridge lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "snake_case")]
pub enum BridgePhase {
    Streaming,
    /// Capture stopped; backend has not confirmed persistence
    Stopped,
    PaginatedReady,
}

/// Paging position and source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct BufferModeState {
    pub mode: BufferMode,
    /// Row offset of the current page
    pub page_offset: usize,
    pub page_size: usize,
    pub total_count: usize,
}

impl BufferModeState {
    pub fn page(&self) -> usize {
        self.page_offset / self.page_size.max(1)
    }

    pub fn page_count(&self) -> usize {
        self.total_count.div_ceil(self.page_size.max(1))
    }
}

/// Tag of an issued seek request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SeekTicket(u64);

impl SeekTicket {
    pub fn tag(self) -> u64 {
        self.0
    }
}

/// Result of completing a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    /// The response was current and the page moved
    Applied { page: usize, offset: usize },
    /// A newer seek was issued; the response was discarded
    Stale,
}

/// Coalesces overlapping re-framing requests into one follow-up run.
#[derive(Debug, Default)]
struct FramingGuard {
    in_flight: bool,
    queued: Option<Arc<PipelineConfig>>,
}

/// Reconciles the live store with the paginated backend.
pub struct BufferBridge<B> {
    backend: Arc<B>,
    phase: BridgePhase,
    state: BufferModeState,
    id_filter: Option<Vec<u32>>,
    buffer_id: Option<BufferId>,
    seek_counter: u64,
    framing: FramingGuard,
}

impl<B: PaginatedBackend> BufferBridge<B> {
    pub fn new(backend: B, page_size: usize) -> Self {
        Self::with_shared_backend(Arc::new(backend), page_size)
    }

    pub fn with_shared_backend(backend: Arc<B>, page_size: usize) -> Self {
        Self {
            backend,
            phase: BridgePhase::Streaming,
            state: BufferModeState {
                mode: BufferMode::Streaming,
                page_offset: 0,
                page_size: page_size.max(1),
                total_count: 0,
            },
            id_filter: None,
            buffer_id: None,
            seek_counter: 0,
            framing: FramingGuard::default(),
        }
    }

    /// Shared handle to the backend, for issuing tagged requests concurrently.
    pub fn backend(&self) -> Arc<B> {
        Arc::clone(&self.backend)
    }

    pub fn phase(&self) -> BridgePhase {
        self.phase
    }

    pub fn state(&self) -> BufferModeState {
        self.state
    }

    pub fn mode(&self) -> BufferMode {
        self.state.mode
    }

    pub fn current_page(&self) -> usize {
        self.state.page()
    }

    /// Backend buffer currently paged, once framing has run.
    pub fn buffer_id(&self) -> Option<BufferId> {
        self.buffer_id
    }

    /// A new capture started: serve reads from the live store again.
    pub fn start_capture(&mut self) {
        info!("Bridge streaming from live buffer");
        self.phase = BridgePhase::Streaming;
        self.state.mode = BufferMode::Streaming;
        self.state.page_offset = 0;
        self.state.total_count = 0;
    }

    /// The capture stopped. Switches to paginated reads if the backend persisted it.
    ///
    /// A stop reported without persistence leaves the bridge in `Stopped`; calling
    /// again with `persisted = true` once the backend confirms moves it on.
    pub fn capture_stopped(&mut self, persisted: bool, total_count: usize) {
        if self.phase == BridgePhase::PaginatedReady {
            debug!("Ignoring capture stop in phase {:?}", self.phase);
            return;
        }
        self.phase = BridgePhase::Stopped;
        if persisted {
            self.enter_paginated(total_count);
        } else {
            warn!("Capture stopped without persisted data; keeping live buffer");
        }
    }

    /// Serve reads from the backend while a capture may still be running.
    pub fn disable_live_buffer(&mut self, total_count: usize) {
        self.enter_paginated(total_count);
    }

    fn enter_paginated(&mut self, total_count: usize) {
        info!("Bridge paginated-ready ({} frames)", total_count);
        self.phase = BridgePhase::PaginatedReady;
        self.state.mode = BufferMode::Paginated;
        self.state.page_offset = 0;
        self.state.total_count = total_count;
    }

    /// Restrict reads to the listed routing IDs (raw or masked); `None` shows all.
    pub fn set_id_filter(&mut self, ids: Option<Vec<u32>>) {
        self.id_filter = ids;
        self.state.page_offset = 0;
    }

    pub fn id_filter(&self) -> Option<&[u32]> {
        self.id_filter.as_deref()
    }

    /// Move to `page`. Out-of-range pages read as empty.
    pub fn go_to_page(&mut self, page: usize) {
        self.state.page_offset = page.saturating_mul(self.state.page_size);
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        let page_size = page_size.max(1);
        // Keep the first visible row on screen
        self.state.page_offset = self.state.page_offset / page_size * page_size;
        self.state.page_size = page_size;
    }

    /// Read the current page from wherever the current phase serves it.
    ///
    /// Backend failures leave the paging state untouched.
    pub async fn read_page(&mut self, live: &LiveView) -> Result<Page> {
        match self.phase {
            BridgePhase::Streaming | BridgePhase::Stopped => Ok(self.streaming_page(live)),
            BridgePhase::PaginatedReady => self.fetch_current_page().await,
        }
    }

    /// Current page served from the live store.
    pub fn streaming_page(&self, live: &LiveView) -> Page {
        let BufferModeState { page_offset, page_size, .. } = self.state;
        match self.id_filter.as_deref() {
            None => Page { records: live.slice(page_offset, page_size), total_count: live.len() },
            Some(ids) => live.with_frames(|frames| {
                let matching: Vec<_> = frames.iter().filter(|f| passes_id_filter(f, Some(ids))).collect();
                Page {
                    records: matching.iter().skip(page_offset).take(page_size).map(|f| (*f).clone()).collect(),
                    total_count: matching.len(),
                }
            }),
        }
    }

    /// Current page fetched from the backend. Commits the total count on success.
    pub async fn fetch_current_page(&mut self) -> Result<Page> {
        let page = self
            .backend
            .fetch_page(self.state.page_offset, self.state.page_size, self.id_filter.as_deref())
            .await
            .inspect_err(|e| warn!("Page fetch at offset {} failed: {}", self.state.page_offset, e))?;
        self.state.total_count = page.total_count;
        Ok(page)
    }

    /// Issue a new seek tag. Earlier tags become stale.
    pub fn begin_seek(&mut self) -> SeekTicket {
        self.seek_counter += 1;
        SeekTicket(self.seek_counter)
    }

    /// Apply a seek response if its tag is still the latest issued.
    ///
    /// A failed lookup for the latest tag returns the error and leaves the page
    /// unchanged; failures for stale tags are discarded like any stale response.
    pub fn complete_seek(&mut self, ticket: SeekTicket, result: Result<usize>) -> Result<SeekOutcome> {
        if ticket.0 != self.seek_counter {
            debug!("Discarding stale seek response {} (latest {})", ticket.0, self.seek_counter);
            return Ok(SeekOutcome::Stale);
        }
        let offset = result.inspect_err(|e| warn!("Timestamp lookup failed: {}", e))?;
        let page = offset / self.state.page_size;
        self.state.page_offset = page * self.state.page_size;
        Ok(SeekOutcome::Applied { page, offset })
    }

    /// Move to the page holding the first frame at or after `timestamp_micros`.
    ///
    /// Holds the bridge for the duration of the lookup, so calls through this
    /// method never overlap. Callers issuing concurrent lookups use
    /// [`begin_seek`](Self::begin_seek) and [`complete_seek`](Self::complete_seek)
    /// with the [`backend`](Self::backend) handle directly.
    pub async fn seek_to_timestamp(&mut self, live: &LiveView, timestamp_micros: u64) -> Result<SeekOutcome> {
        let ticket = self.begin_seek();
        let result = match self.phase {
            BridgePhase::Streaming | BridgePhase::Stopped => Ok(self.live_offset(live, timestamp_micros)),
            BridgePhase::PaginatedReady => {
                self.backend.find_offset_for_timestamp(timestamp_micros, self.id_filter.as_deref()).await
            }
        };
        self.complete_seek(ticket, result)
    }

    fn live_offset(&self, live: &LiveView, timestamp_micros: u64) -> usize {
        let filter = self.id_filter.as_deref();
        live.with_frames(|frames| match filter {
            None => frames.partition_point(|f| f.timestamp_micros() < timestamp_micros),
            Some(_) => frames
                .iter()
                .filter(|f| passes_id_filter(f, filter))
                .take_while(|f| f.timestamp_micros() < timestamp_micros)
                .count(),
        })
    }

    /// Request re-framing with `config`.
    ///
    /// Returns the config to run now, or `None` when a run is already in flight;
    /// in that case `config` replaces any previously queued follow-up.
    pub fn submit_framing(&mut self, config: Arc<PipelineConfig>) -> Option<Arc<PipelineConfig>> {
        if self.framing.in_flight {
            debug!("Framing in flight; queueing follow-up");
            self.framing.queued = Some(config);
            return None;
        }
        self.framing.in_flight = true;
        Some(config)
    }

    /// Finish the in-flight framing run.
    ///
    /// Commits the new buffer on success. Returns the run's result together with
    /// the coalesced follow-up config, if one was queued meanwhile.
    pub fn complete_framing(
        &mut self,
        result: Result<FramingResult>,
    ) -> (Result<FramingResult>, Option<Arc<PipelineConfig>>) {
        let follow_up = self.framing.queued.take();
        self.framing.in_flight = follow_up.is_some();

        match &result {
            Ok(framed) => {
                info!(
                    "Framed {} frames into {} ({} filtered)",
                    framed.frame_count, framed.buffer_id, framed.filtered_count
                );
                self.buffer_id = Some(framed.buffer_id);
                self.state.total_count = framed.frame_count;
                self.state.page_offset = 0;
            }
            Err(e) => warn!("Framing failed: {}", e),
        }
        (result, follow_up)
    }

    pub fn framing_in_flight(&self) -> bool {
        self.framing.in_flight
    }

    /// Re-frame with `config`, then with any follow-up queued while it ran.
    ///
    /// Returns the result of the last run. The bridge is held across each
    /// backend call, so follow-ups are only queued by callers driving
    /// [`submit_framing`](Self::submit_framing) and
    /// [`complete_framing`](Self::complete_framing) themselves; a run started
    /// that way makes this method fail instead of overlapping it.
    pub async fn apply_framing(&mut self, config: Arc<PipelineConfig>) -> Result<FramingResult> {
        let Some(mut next) = self.submit_framing(config) else {
            return Err(crate::CaptureError::backend_failed("apply_framing", "framing already in flight"));
        };
        loop {
            let result = self.backend.apply_framing(&next, self.buffer_id).await;
            match self.complete_framing(result) {
                (result, None) => return result,
                (_, Some(follow_up)) => next = follow_up,
            }
        }
    }
}
