// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-frame structural deltas.

use ordoplay_stage::{DepthChange, PlaceState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structural changes introduced by one frame, keyed by depth
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDelta {
    /// Changes by depth
    pub changes: BTreeMap<i32, DepthChange>,
}

impl FrameDelta {
    /// Create an empty delta
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a placement at the state's depth
    pub fn place(mut self, state: PlaceState) -> Self {
        self.changes.insert(state.depth, DepthChange::Place(state));
        self
    }

    /// Add a removal at a depth
    pub fn remove(mut self, depth: i32) -> Self {
        self.changes.insert(depth, DepthChange::Remove);
        self
    }

    /// Change for a depth
    pub fn change_at(&self, depth: i32) -> Option<&DepthChange> {
        self.changes.get(&depth)
    }

    /// Iterate over changes
    pub fn iter(&self) -> impl Iterator<Item = (i32, &DepthChange)> {
        self.changes.iter().map(|(depth, change)| (*depth, change))
    }

    /// Whether the delta changes nothing
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Availability of a frame in the store
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameAvailability<'a> {
    /// Frame data is loaded
    Available(&'a FrameDelta),
    /// Frame exists but has not been loaded yet
    NotYetLoaded,
    /// Frame index is past the end of the timeline
    OutOfRange,
}

/// Ordered frame deltas of one timeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDeltaStore {
    /// Total frames in the timeline
    total_frames: u32,
    /// Loaded frames, index 0 is frame 1
    frames: Vec<FrameDelta>,
}

impl FrameDeltaStore {
    /// Create an empty store for a timeline of `total_frames`
    pub fn new(total_frames: u32) -> Self {
        Self {
            total_frames,
            frames: Vec::new(),
        }
    }

    /// Create a store with the given loaded frames
    pub fn with_frames(total_frames: u32, frames: Vec<FrameDelta>) -> Self {
        let mut store = Self::new(total_frames);
        for frame in frames {
            store.push(frame);
        }
        store
    }

    /// Append the next loaded frame. Frames past the total are dropped.
    pub fn push(&mut self, delta: FrameDelta) -> bool {
        if self.frames.len() as u32 >= self.total_frames {
            tracing::warn!(total = self.total_frames, "ignoring frame past end of timeline");
            return false;
        }
        self.frames.push(delta);
        true
    }

    /// Replace the delta of a loaded 0-based frame index
    pub fn replace(&mut self, index: u32, delta: FrameDelta) -> bool {
        match self.frames.get_mut(index as usize) {
            Some(slot) => {
                *slot = delta;
                true
            }
            None => false,
        }
    }

    /// Delta for a 0-based frame index
    pub fn delta_at(&self, index: u32) -> FrameAvailability<'_> {
        if index >= self.total_frames {
            return FrameAvailability::OutOfRange;
        }
        match self.frames.get(index as usize) {
            Some(delta) => FrameAvailability::Available(delta),
            None => FrameAvailability::NotYetLoaded,
        }
    }

    /// Total frames in the timeline
    pub fn total_frames(&self) -> u32 {
        self.total_frames
    }

    /// Number of frames loaded so far
    pub fn frames_loaded(&self) -> u32 {
        self.frames.len() as u32
    }

    /// Whether every frame is loaded
    pub fn is_complete(&self) -> bool {
        self.frames_loaded() == self.total_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordoplay_stage::{SymbolKind, SymbolRef};

    #[test]
    fn test_availability() {
        let mut store = FrameDeltaStore::new(3);
        store.push(FrameDelta::new());
        assert!(matches!(store.delta_at(0), FrameAvailability::Available(_)));
        assert_eq!(store.delta_at(1), FrameAvailability::NotYetLoaded);
        assert_eq!(store.delta_at(3), FrameAvailability::OutOfRange);
        assert_eq!(store.frames_loaded(), 1);
        assert!(!store.is_complete());
    }

    #[test]
    fn test_push_past_total_is_dropped() {
        let mut store = FrameDeltaStore::with_frames(1, vec![FrameDelta::new()]);
        assert!(store.is_complete());
        assert!(!store.push(FrameDelta::new()));
        assert_eq!(store.frames_loaded(), 1);
    }

    #[test]
    fn test_delta_builder() {
        let shape = SymbolRef::new(1, SymbolKind::Shape);
        let delta = FrameDelta::new().place(PlaceState::new(2, shape)).remove(5);
        assert!(matches!(delta.change_at(2), Some(DepthChange::Place(_))));
        assert_eq!(delta.change_at(5), Some(&DepthChange::Remove));
        assert_eq!(delta.change_at(3), None);
        assert_eq!(delta.iter().map(|(d, _)| d).collect::<Vec<_>>(), vec![2, 5]);
    }
}
