//! Frame classification against the catalog and user filters

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::selection::SelectionIndex;
use crate::types::{Disposition, FrameEvent};

/// Recognized classification options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(default)]
pub struct ClassifierConfig {
    /// Routing IDs known to the catalog
    pub catalog_ids: HashSet<u32>,
    /// Bitmask applied to the routing ID before catalog lookup
    pub mask: Option<u32>,
    /// Raw routing IDs to drop from the live view
    pub id_filter: Option<HashSet<u32>>,
    /// Frames shorter than this many bytes are classified as too short (0 disables)
    pub min_length: u32,
}

impl ClassifierConfig {
    /// Catalog-only configuration with no mask and no filters.
    pub fn with_catalog(ids: impl IntoIterator<Item = u32>) -> Self {
        Self { catalog_ids: ids.into_iter().collect(), ..Self::default() }
    }

    pub fn mask_id(&self, routing_id: u32) -> u32 {
        masked_id(routing_id, self.mask)
    }

    pub fn classify(&self, frame: &FrameEvent) -> Disposition {
        classify(frame, &self.catalog_ids, self.mask, self.id_filter.as_ref(), self.min_length)
    }
}

/// Apply an optional catalog mask to a routing ID.
pub fn masked_id(routing_id: u32, mask: Option<u32>) -> u32 {
    match mask {
        Some(mask) => routing_id & mask,
        None => routing_id,
    }
}

/// Assign a disposition to a frame.
///
/// Checks run in a fixed order and the first match wins: length, then the raw
/// ID filter, then catalog membership of the masked ID.
pub fn classify(
    frame: &FrameEvent,
    catalog_ids: &HashSet<u32>,
    mask: Option<u32>,
    id_filter: Option<&HashSet<u32>>,
    min_length: u32,
) -> Disposition {
    if min_length > 0 && frame.bytes.len() < min_length as usize {
        return Disposition::TooShort;
    }

    if id_filter.is_some_and(|filter| filter.contains(&frame.routing_id)) {
        return Disposition::IdFiltered;
    }

    if catalog_ids.contains(&masked_id(frame.routing_id, mask)) {
        Disposition::Matched
    } else {
        Disposition::Unmatched
    }
}

/// Whether a classified frame must be decoded into display-ready output.
///
/// Only matched frames whose masked or raw ID is selected, or whose masked ID
/// is the source of a selected mirror, are processed.
pub fn requires_processing(
    disposition: Disposition,
    masked_id: u32,
    raw_id: u32,
    selection: &SelectionIndex,
) -> bool {
    disposition == Disposition::Matched && selection.requires(masked_id, raw_id)
}
