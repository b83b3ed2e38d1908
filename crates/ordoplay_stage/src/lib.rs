// SPDX-License-Identifier: MIT OR Apache-2.0
//! Display tree for the `OrdoPlay` animation runtime.
//!
//! This crate provides the scene graph that timelines drive:
//! - Display nodes with depth-indexed children
//! - Placement descriptors produced by frame deltas
//! - The animation capability check deciding reuse vs. replacement
//! - Named child slots
//!
//! ## Architecture
//!
//! Nodes live in a single arena keyed by [`NodeId`]. A parent owns a
//! depth → child map and each child keeps a back-link to its parent; both
//! are cleared together by [`DisplayTree::detach`].

pub mod animate;
pub mod node;
pub mod place;
pub mod tree;

pub use animate::Animatable;
pub use node::{
    BlendMode, ColorTransform, DisplayNode, Matrix, NodeContent, NodeId, SymbolId, SymbolKind,
};
pub use place::{DepthChange, PlaceState, SymbolRef};
pub use tree::{DisplayTree, TreeError};
