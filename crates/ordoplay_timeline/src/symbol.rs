// SPDX-License-Identifier: MIT OR Apache-2.0
//! Symbol library and timeline definitions.

use crate::delta::{FrameAvailability, FrameDelta, FrameDeltaStore};
use crate::error::{Result, TimelineError};
use crate::scene::{FrameLabel, Scene, SceneIndex};
use indexmap::IndexMap;
use ordoplay_stage::{DepthChange, SymbolId, SymbolKind};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Compiled legacy script actions for one frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionBlock {
    /// Debug name, unique per timeline
    pub name: String,
    /// Encoded actions, interpreted by the legacy runtime
    pub bytes: Vec<u8>,
}

impl ActionBlock {
    /// Create a new action block
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Legacy actions attached to a 0-based frame index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameActions {
    /// 0-based frame index
    pub frame_index: u32,
    /// Encoded actions
    pub bytes: Vec<u8>,
}

/// Authored timeline of a sprite or of the root movie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineDefinition {
    /// Frame deltas
    pub frames: FrameDeltaStore,
    /// Scenes; when empty the timeline is one unnamed scene carrying `labels`
    #[serde(default)]
    pub scenes: Vec<Scene>,
    /// Labels of the implicit scene
    #[serde(default)]
    pub labels: Vec<FrameLabel>,
    /// Legacy actions per frame
    #[serde(default)]
    pub frame_actions: Vec<FrameActions>,
}

impl TimelineDefinition {
    /// Timeline of `total_frames` with nothing loaded
    pub fn new(total_frames: u32) -> Self {
        Self {
            frames: FrameDeltaStore::new(total_frames.max(1)),
            scenes: Vec::new(),
            labels: Vec::new(),
            frame_actions: Vec::new(),
        }
    }

    /// Timeline of `total_frames` with every frame loaded and empty
    pub fn with_empty_frames(total_frames: u32) -> Self {
        let total = total_frames.max(1);
        Self {
            frames: FrameDeltaStore::with_frames(total, vec![FrameDelta::new(); total as usize]),
            ..Self::new(total)
        }
    }

    /// Replace the delta of a loaded 0-based frame
    pub fn with_delta(mut self, frame_index: u32, delta: FrameDelta) -> Self {
        if !self.frames.replace(frame_index, delta) {
            tracing::warn!(frame_index, "ignoring delta for unloaded frame");
        }
        self
    }

    /// Add a label to the implicit scene
    pub fn with_label(mut self, name: impl Into<String>, frame: u32) -> Self {
        self.labels.push(FrameLabel::new(name, frame));
        self
    }

    /// Add an explicit scene
    pub fn with_scene(mut self, scene: Scene) -> Self {
        self.scenes.push(scene);
        self
    }

    /// Add legacy actions to a 0-based frame index
    pub fn with_frame_actions(mut self, frame_index: u32, bytes: Vec<u8>) -> Self {
        self.frame_actions.push(FrameActions { frame_index, bytes });
        self
    }

    /// Total frames
    pub fn total_frames(&self) -> u32 {
        self.frames.total_frames()
    }

    /// Scene table for a new instance
    pub fn scene_index(&self) -> SceneIndex {
        if self.scenes.is_empty() {
            return SceneIndex::single(self.labels.clone(), self.total_frames());
        }
        let mut index = SceneIndex::new();
        for scene in &self.scenes {
            index.add_scene(scene.name.clone(), scene.labels.clone(), scene.offset, scene.num_frames);
        }
        index
    }

    /// Check scene partition, delta depth keys and action frame indices
    pub fn validate(&self) -> Result<()> {
        let total = self.total_frames();
        if total == 0 {
            return Err(TimelineError::InvalidTimeline("timeline has no frames".into()));
        }
        if self.frames.frames_loaded() > total {
            return Err(TimelineError::InvalidTimeline(format!(
                "{} frames loaded for a timeline of {}",
                self.frames.frames_loaded(),
                total
            )));
        }
        self.scene_index().validate(total)?;

        for index in 0..self.frames.frames_loaded() {
            let FrameAvailability::Available(delta) = self.frames.delta_at(index) else {
                continue;
            };
            for (depth, change) in delta.iter() {
                if let DepthChange::Place(state) = change {
                    if state.depth != depth {
                        return Err(TimelineError::InvalidTimeline(format!(
                            "frame {} places depth {} under key {}",
                            index + 1,
                            state.depth,
                            depth
                        )));
                    }
                }
            }
        }

        if let Some(actions) = self.frame_actions.iter().find(|a| a.frame_index >= total) {
            return Err(TimelineError::InvalidTimeline(format!(
                "actions on frame index {} past end of timeline",
                actions.frame_index
            )));
        }
        Ok(())
    }
}

/// A library symbol that placements instantiate
#[derive(Debug, Clone)]
pub struct Symbol {
    /// Symbol ID
    pub id: SymbolId,
    /// Export name
    pub name: Option<String>,
    /// Content kind
    pub kind: SymbolKind,
    /// Instances are driven by the legacy script subsystem
    pub legacy: bool,
    /// Timeline for sprites
    pub timeline: Option<Rc<TimelineDefinition>>,
}

impl Symbol {
    /// Symbol without a timeline
    pub fn new(id: u32, kind: SymbolKind) -> Self {
        Self {
            id: SymbolId(id),
            name: None,
            kind,
            legacy: false,
            timeline: None,
        }
    }

    /// Sprite symbol with its own timeline
    pub fn sprite(id: u32, timeline: TimelineDefinition) -> Self {
        Self {
            timeline: Some(Rc::new(timeline)),
            ..Self::new(id, SymbolKind::Sprite)
        }
    }

    /// Set the export name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark as legacy-driven
    pub fn legacy(mut self) -> Self {
        self.legacy = true;
        self
    }
}

/// Registry of symbols available for instantiation
#[derive(Debug, Clone, Default)]
pub struct SymbolLibrary {
    symbols: IndexMap<SymbolId, Symbol>,
}

impl SymbolLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a symbol, replacing any previous one with the same ID
    pub fn register(&mut self, symbol: Symbol) {
        self.symbols.insert(symbol.id, symbol);
    }

    /// Builder-style registration
    pub fn with(mut self, symbol: Symbol) -> Self {
        self.register(symbol);
        self
    }

    /// Get a symbol
    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(&id)
    }

    /// Find a symbol by export name
    pub fn by_name(&self, name: &str) -> Option<&Symbol> {
        self.symbols.values().find(|s| s.name.as_deref() == Some(name))
    }

    /// All symbols
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    /// Number of symbols
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the library is empty
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
