//! Frame event types for the ingestion pipeline

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Raw frame event as produced by the transport layer
///
/// This is the fundamental data unit that flows through the system.
/// Everything else (classification, signal samples) is derived from this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEvent {
    /// Routing identifier reported by the transport (e.g. CAN arbitration ID)
    pub routing_id: u32,

    /// Frame payload (zero-copy via Arc)
    pub bytes: Arc<[u8]>,

    /// Source address, when the transport reports one
    pub source_address: Option<u32>,

    /// Capture timestamp in microseconds
    pub timestamp_micros: u64,

    /// Bus index for multi-bus captures
    pub bus: Option<u8>,
}

impl FrameEvent {
    /// Create a new frame event
    pub fn new(routing_id: u32, bytes: impl Into<Arc<[u8]>>, timestamp_micros: u64) -> Self {
        Self { routing_id, bytes: bytes.into(), source_address: None, timestamp_micros, bus: None }
    }

    /// Attach a source address
    pub fn with_source(mut self, source_address: u32) -> Self {
        self.source_address = Some(source_address);
        self
    }

    /// Attach a bus index
    pub fn with_bus(mut self, bus: u8) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Classifier outcome for a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Masked routing ID is present in the catalog
    Matched,
    /// Masked routing ID is not in the catalog
    Unmatched,
    /// Payload is shorter than the configured minimum length
    TooShort,
    /// Raw routing ID is listed in the ID filter
    IdFiltered,
}

impl Disposition {
    /// All dispositions, in check order.
    pub const ALL: [Disposition; 4] =
        [Disposition::TooShort, Disposition::IdFiltered, Disposition::Matched, Disposition::Unmatched];

    /// Stable lowercase name, as used in serialized output.
    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Matched => "matched",
            Disposition::Unmatched => "unmatched",
            Disposition::TooShort => "too_short",
            Disposition::IdFiltered => "id_filtered",
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frame after field extraction and classification.
///
/// `event.routing_id` and `event.source_address` hold the extracted values
/// (or the transport values when no layout is configured).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFrame {
    pub event: FrameEvent,
    /// Routing ID after the catalog mask was applied
    pub masked_id: u32,
    pub disposition: Disposition,
}

impl ClassifiedFrame {
    pub fn routing_id(&self) -> u32 {
        self.event.routing_id
    }

    pub fn timestamp_micros(&self) -> u64 {
        self.event.timestamp_micros
    }

    pub fn bytes(&self) -> &[u8] {
        &self.event.bytes
    }

    pub fn is_matched(&self) -> bool {
        self.disposition == Disposition::Matched
    }
}
