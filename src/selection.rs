//! Routing-ID discovery and selection tracking

use std::collections::{HashMap, HashSet};

/// Tracks which routing IDs have been seen and which are selected for display.
///
/// A mirror frame is a derived routing ID whose payload depends on a source ID.
/// Selecting a mirror makes its source required for processing even when the
/// source itself is not selected.
#[derive(Debug, Clone, Default)]
pub struct SelectionIndex {
    seen_ids: HashSet<u32>,
    selected_ids: HashSet<u32>,
    mirror_source_of: HashMap<u32, u32>,
}

impl SelectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a routing ID seen on the bus. Returns `true` the first time.
    pub fn observe(&mut self, id: u32) -> bool {
        self.seen_ids.insert(id)
    }

    pub fn seen_ids(&self) -> &HashSet<u32> {
        &self.seen_ids
    }

    /// Seen IDs in ascending order.
    pub fn seen_sorted(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.seen_ids.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn clear_seen(&mut self) {
        self.seen_ids.clear();
    }

    pub fn select(&mut self, id: u32) -> bool {
        self.selected_ids.insert(id)
    }

    pub fn deselect(&mut self, id: u32) -> bool {
        self.selected_ids.remove(&id)
    }

    /// Replace the whole selection.
    pub fn set_selected(&mut self, ids: impl IntoIterator<Item = u32>) {
        self.selected_ids = ids.into_iter().collect();
    }

    pub fn selected_ids(&self) -> &HashSet<u32> {
        &self.selected_ids
    }

    pub fn is_selected(&self, id: u32) -> bool {
        self.selected_ids.contains(&id)
    }

    /// Declare `derived` as a mirror of `source`.
    pub fn set_mirror_source(&mut self, derived: u32, source: u32) {
        self.mirror_source_of.insert(derived, source);
    }

    pub fn clear_mirror_source(&mut self, derived: u32) -> Option<u32> {
        self.mirror_source_of.remove(&derived)
    }

    pub fn mirror_source_of(&self, derived: u32) -> Option<u32> {
        self.mirror_source_of.get(&derived).copied()
    }

    /// Whether `id` is the source of any selected mirror.
    pub fn is_required_mirror_source(&self, id: u32) -> bool {
        self.mirror_source_of
            .iter()
            .any(|(derived, source)| *source == id && self.selected_ids.contains(derived))
    }

    /// Selected IDs plus the sources of every selected mirror.
    pub fn required_ids(&self) -> HashSet<u32> {
        let mut required = self.selected_ids.clone();
        required.extend(
            self.mirror_source_of
                .iter()
                .filter(|(derived, _)| self.selected_ids.contains(derived))
                .map(|(_, source)| *source),
        );
        required
    }

    /// Selection test used by the classifier for a matched frame.
    ///
    /// Accepts either the masked or the raw routing ID as selected.
    pub fn requires(&self, masked_id: u32, raw_id: u32) -> bool {
        self.selected_ids.contains(&masked_id)
            || self.selected_ids.contains(&raw_id)
            || self.is_required_mirror_source(masked_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_reports_first_sighting_only() {
        let mut index = SelectionIndex::new();
        assert!(index.observe(0x100));
        assert!(!index.observe(0x100));
        assert!(index.observe(0x0FF));
        assert_eq!(index.seen_sorted(), vec![0x0FF, 0x100]);

        index.clear_seen();
        assert!(index.seen_ids().is_empty());
    }

    #[test]
    fn selected_mirror_requires_its_source() {
        let mut index = SelectionIndex::new();
        index.select(5);
        index.set_mirror_source(5, 3);

        assert!(!index.is_selected(3));
        assert!(index.requires(3, 3));
        assert!(index.required_ids().contains(&3));
    }

    #[test]
    fn unselected_mirror_does_not_require_source() {
        let mut index = SelectionIndex::new();
        index.set_mirror_source(5, 3);

        assert!(!index.requires(3, 3));
        assert!(!index.required_ids().contains(&3));

        index.select(5);
        assert!(index.requires(3, 3));
        index.deselect(5);
        assert!(!index.requires(3, 3));
    }

    #[test]
    fn raw_or_masked_id_selection_is_accepted() {
        let mut index = SelectionIndex::new();
        index.set_selected([0x18FF_0001]);

        // Raw ID selected, masked lookup differs
        assert!(index.requires(0x00FF_0001, 0x18FF_0001));
        // Masked ID selected
        index.set_selected([0x00FF_0001]);
        assert!(index.requires(0x00FF_0001, 0x18FF_0001));
        assert!(!index.requires(0x7, 0x7));
    }
}
