use crate::foundation::core::RegionId;
use std::collections::HashMap;

/// Background snapshots per region, used to erase the previous frame during a blit.
///
/// Entries are only valid for the surface size they were captured at; the owner invalidates
/// the cache on every resize.
#[derive(Debug)]
pub struct BlitCache<Snap> {
    entries: HashMap<RegionId, Snap>,
}

impl<Snap> Default for BlitCache<Snap> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<Snap> BlitCache<Snap> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture `region` unless it already has a snapshot. Returns `true` when it captured.
    pub fn capture_if_absent(&mut self, region: RegionId, capture: impl FnOnce() -> Snap) -> bool {
        if self.entries.contains_key(&region) {
            return false;
        }
        self.entries.insert(region, capture());
        true
    }

    pub fn get(&self, region: RegionId) -> Option<&Snap> {
        self.entries.get(&region)
    }

    pub fn contains(&self, region: RegionId) -> bool {
        self.entries.contains_key(&region)
    }

    pub fn invalidate(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!(regions = self.entries.len(), "blit cache invalidated");
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
