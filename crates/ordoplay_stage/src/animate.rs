// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline animation capability.
//!
//! A frame delta may only re-drive an existing child when the child reports
//! that it can be animated by the incoming state. Otherwise the child is
//! replaced.

use crate::node::{DisplayNode, NodeContent};
use crate::place::{PlaceState, SymbolRef};

/// Capability of a display node variant to be re-driven by a placement
pub trait Animatable {
    /// Whether `state` may update this node in place. Must not have side effects.
    fn can_be_animated(&self, state: &PlaceState) -> bool;

    /// Apply the transform/ratio parameters of `state`
    fn animate(&mut self, state: &PlaceState);
}

impl NodeContent {
    /// Whether content of this variant may switch to `symbol` without being recreated
    pub fn accepts_symbol(&self, symbol: &SymbolRef) -> bool {
        match self {
            Self::Symbol(kind) => *kind == symbol.kind && !kind.is_dynamic(),
            Self::Container => false,
        }
    }
}

impl Animatable for DisplayNode {
    fn can_be_animated(&self, state: &PlaceState) -> bool {
        if !self.animated_by_timeline || self.depth != Some(state.depth) {
            return false;
        }
        match &state.symbol {
            None => true,
            Some(symbol) if self.symbol == Some(symbol.id) => true,
            Some(symbol) => self.content.accepts_symbol(symbol),
        }
    }

    fn animate(&mut self, state: &PlaceState) {
        if let Some(matrix) = state.matrix {
            self.matrix = matrix;
        }
        if let Some(color_transform) = state.color_transform {
            self.color_transform = color_transform;
        }
        if let Some(ratio) = state.ratio {
            self.ratio = Some(ratio);
        }
        if let Some(clip_depth) = state.clip_depth {
            self.clip_depth = Some(clip_depth);
        }
        if let Some(blend_mode) = state.blend_mode {
            self.blend_mode = blend_mode;
        }
        if let Some(visible) = state.visible {
            self.visible = visible;
        }
    }
}

impl DisplayNode {
    /// Swap static content to another symbol of the same kind
    pub fn set_static_content(&mut self, symbol: &SymbolRef) {
        if symbol.is_dynamic() {
            return;
        }
        self.symbol = Some(symbol.id);
    }

    /// Build a timeline-owned child from a placement
    pub fn from_placement(state: &PlaceState, symbol: &SymbolRef) -> Self {
        let mut node = Self::from_symbol(symbol.id, symbol.kind);
        node.name = state.name.clone();
        node.animated_by_timeline = true;
        node.animate(state);
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Matrix, SymbolId, SymbolKind};

    fn placed(depth: i32, symbol: SymbolRef) -> DisplayNode {
        let state = PlaceState::new(depth, symbol);
        let mut node = DisplayNode::from_placement(&state, &symbol);
        node.depth = Some(depth);
        node
    }

    #[test]
    fn test_same_symbol_can_be_animated() {
        let shape = SymbolRef::new(1, SymbolKind::Shape);
        let node = placed(2, shape);
        assert!(node.can_be_animated(&PlaceState::new(2, shape)));
        assert!(node.can_be_animated(&PlaceState::modify(2)));
    }

    #[test]
    fn test_depth_mismatch_rejected() {
        let shape = SymbolRef::new(1, SymbolKind::Shape);
        let node = placed(2, shape);
        assert!(!node.can_be_animated(&PlaceState::modify(3)));
    }

    #[test]
    fn test_static_swap_allowed_dynamic_swap_rejected() {
        let node = placed(1, SymbolRef::new(1, SymbolKind::Shape));
        assert!(node.can_be_animated(&PlaceState::new(1, SymbolRef::new(7, SymbolKind::Shape))));
        assert!(!node.can_be_animated(&PlaceState::new(1, SymbolRef::new(7, SymbolKind::Bitmap))));

        let sprite = placed(1, SymbolRef::new(4, SymbolKind::Sprite));
        assert!(!sprite.can_be_animated(&PlaceState::new(1, SymbolRef::new(5, SymbolKind::Sprite))));
    }

    #[test]
    fn test_script_owned_never_animated() {
        let mut node = DisplayNode::from_symbol(SymbolId(1), SymbolKind::Shape);
        node.depth = Some(1);
        assert!(!node.can_be_animated(&PlaceState::modify(1)));
    }

    #[test]
    fn test_animate_applies_present_fields_only() {
        let shape = SymbolRef::new(1, SymbolKind::MorphShape);
        let mut node = placed(1, shape);
        node.animate(&PlaceState::modify(1).with_ratio(0.5));
        assert_eq!(node.ratio(), Some(0.5));
        assert_eq!(node.matrix(), Matrix::IDENTITY);

        node.animate(&PlaceState::modify(1).with_matrix(Matrix::translate(3.0, 0.0)));
        assert_eq!(node.ratio(), Some(0.5));
        assert_eq!(node.matrix().tx, 3.0);
    }
}
