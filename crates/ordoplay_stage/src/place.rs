// SPDX-License-Identifier: MIT OR Apache-2.0
//! Placement descriptors carried by frame deltas.

use crate::node::{BlendMode, ColorTransform, Matrix, SymbolId, SymbolKind};
use serde::{Deserialize, Serialize};

/// Reference to the symbol a placement instantiates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolRef {
    /// Symbol ID in the library
    pub id: SymbolId,
    /// Kind of the referenced symbol
    pub kind: SymbolKind,
    /// Placement is driven by the legacy script subsystem
    #[serde(default)]
    pub legacy: bool,
}

impl SymbolRef {
    /// Create a reference to a symbol
    pub fn new(id: u32, kind: SymbolKind) -> Self {
        Self {
            id: SymbolId(id),
            kind,
            legacy: false,
        }
    }

    /// Mark the placement as legacy-bound
    pub fn legacy(mut self) -> Self {
        self.legacy = true;
        self
    }

    /// Dynamic symbols are never content-swapped in place
    pub fn is_dynamic(&self) -> bool {
        self.kind.is_dynamic()
    }
}

/// Target state for one depth in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceState {
    /// Depth this state applies to
    pub depth: i32,
    /// Symbol to show at the depth (absent for move-only placements)
    #[serde(default)]
    pub symbol: Option<SymbolRef>,
    /// Instance name given to a newly created child
    #[serde(default)]
    pub name: Option<String>,
    /// Transform
    #[serde(default)]
    pub matrix: Option<Matrix>,
    /// Color transform
    #[serde(default)]
    pub color_transform: Option<ColorTransform>,
    /// Morph ratio
    #[serde(default)]
    pub ratio: Option<f32>,
    /// Clip (mask) depth
    #[serde(default)]
    pub clip_depth: Option<i32>,
    /// Blend mode
    #[serde(default)]
    pub blend_mode: Option<BlendMode>,
    /// Visibility
    #[serde(default)]
    pub visible: Option<bool>,
}

impl PlaceState {
    /// Placement of a symbol at a depth
    pub fn new(depth: i32, symbol: SymbolRef) -> Self {
        Self {
            symbol: Some(symbol),
            ..Self::modify(depth)
        }
    }

    /// Move-only placement that modifies whatever sits at the depth
    pub fn modify(depth: i32) -> Self {
        Self {
            depth,
            symbol: None,
            name: None,
            matrix: None,
            color_transform: None,
            ratio: None,
            clip_depth: None,
            blend_mode: None,
            visible: None,
        }
    }

    /// Set the instance name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the transform
    pub fn with_matrix(mut self, matrix: Matrix) -> Self {
        self.matrix = Some(matrix);
        self
    }

    /// Set the morph ratio
    pub fn with_ratio(mut self, ratio: f32) -> Self {
        self.ratio = Some(ratio);
        self
    }
}

/// Structural instruction for one depth in a frame delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DepthChange {
    /// Place or modify the child at the depth
    Place(PlaceState),
    /// Remove whatever occupies the depth
    Remove,
}

impl DepthChange {
    /// Placement state, if this is a placement
    pub fn place_state(&self) -> Option<&PlaceState> {
        match self {
            Self::Place(state) => Some(state),
            Self::Remove => None,
        }
    }
}
