// SPDX-License-Identifier: MIT OR Apache-2.0
//! Display node definitions for the stage tree.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for a display node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Authored symbol (character) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

/// Kind of content a symbol produces when instantiated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    /// Static vector shape
    Shape,
    /// Shape morphing between two states, driven by ratio
    MorphShape,
    /// Static (non-editable) text
    StaticText,
    /// Editable or script-driven text field
    DynamicText,
    /// Bitmap fill
    Bitmap,
    /// Button with up/over/down states
    Button,
    /// Sprite with its own timeline
    Sprite,
}

impl SymbolKind {
    /// Dynamic symbols carry their own state and are never content-swapped in place.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::DynamicText | Self::Button | Self::Sprite)
    }

    /// Whether instances of this kind own a timeline
    pub fn has_timeline(&self) -> bool {
        matches!(self, Self::Sprite)
    }
}

/// 2D affine transform (a, b, c, d, tx, ty)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    /// Horizontal scale / rotation
    pub a: f32,
    /// Vertical skew / rotation
    pub b: f32,
    /// Horizontal skew / rotation
    pub c: f32,
    /// Vertical scale / rotation
    pub d: f32,
    /// Horizontal translation
    pub tx: f32,
    /// Vertical translation
    pub ty: f32,
}

impl Matrix {
    /// Identity transform
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Pure translation
    pub fn translate(tx: f32, ty: f32) -> Self {
        Self {
            tx,
            ty,
            ..Self::IDENTITY
        }
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Color transform (RGBA multipliers and offsets)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorTransform {
    /// RGBA multipliers
    pub mul: [f32; 4],
    /// RGBA offsets
    pub add: [f32; 4],
}

impl Default for ColorTransform {
    fn default() -> Self {
        Self {
            mul: [1.0; 4],
            add: [0.0; 4],
        }
    }
}

/// Compositing blend mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    /// Normal source-over
    #[default]
    Normal,
    /// Group as layer
    Layer,
    /// Multiply
    Multiply,
    /// Screen
    Screen,
    /// Additive
    Add,
    /// Subtractive
    Subtract,
}

/// What a display node renders or hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeContent {
    /// Instance of a symbol from the library
    Symbol(SymbolKind),
    /// Plain container created by script
    Container,
}

impl NodeContent {
    /// Kind of symbol backing this content, if any
    pub fn symbol_kind(&self) -> Option<SymbolKind> {
        match self {
            Self::Symbol(kind) => Some(*kind),
            Self::Container => None,
        }
    }
}

/// A node in the display tree
#[derive(Debug, Clone)]
pub struct DisplayNode {
    /// Unique instance ID
    pub id: NodeId,
    /// Instance name
    pub name: Option<String>,
    /// Content variant
    pub content: NodeContent,
    /// Symbol currently providing the content
    pub(crate) symbol: Option<SymbolId>,
    /// Depth within the parent, while attached
    pub(crate) depth: Option<i32>,
    /// Parent node, while attached
    pub(crate) parent: Option<NodeId>,
    /// Children keyed by depth
    pub(crate) children: BTreeMap<i32, NodeId>,
    /// Named child slots bound on this node
    pub(crate) named_children: IndexMap<String, NodeId>,
    /// Local transform
    pub(crate) matrix: Matrix,
    /// Color transform
    pub(crate) color_transform: ColorTransform,
    /// Morph ratio
    pub(crate) ratio: Option<f32>,
    /// Clip (mask) depth
    pub(crate) clip_depth: Option<i32>,
    /// Blend mode
    pub(crate) blend_mode: BlendMode,
    /// Visibility
    pub(crate) visible: bool,
    /// Placed and still driven by a timeline
    pub(crate) animated_by_timeline: bool,
    /// Construction side effects have run
    pub(crate) constructed: bool,
}

impl DisplayNode {
    /// Create a script-owned node
    pub fn new(content: NodeContent) -> Self {
        Self {
            id: NodeId::new(),
            name: None,
            content,
            symbol: None,
            depth: None,
            parent: None,
            children: BTreeMap::new(),
            named_children: IndexMap::new(),
            matrix: Matrix::IDENTITY,
            color_transform: ColorTransform::default(),
            ratio: None,
            clip_depth: None,
            blend_mode: BlendMode::Normal,
            visible: true,
            animated_by_timeline: false,
            constructed: false,
        }
    }

    /// Create a script-owned instance of a symbol
    pub fn from_symbol(symbol: SymbolId, kind: SymbolKind) -> Self {
        let mut node = Self::new(NodeContent::Symbol(kind));
        node.symbol = Some(symbol);
        node
    }

    /// Set the instance name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Symbol currently providing the content
    pub fn symbol(&self) -> Option<SymbolId> {
        self.symbol
    }

    /// Depth within the parent
    pub fn depth(&self) -> Option<i32> {
        self.depth
    }

    /// Parent node
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child at a depth
    pub fn child_at_depth(&self, depth: i32) -> Option<NodeId> {
        self.children.get(&depth).copied()
    }

    /// Children in ascending depth order
    pub fn children(&self) -> impl Iterator<Item = (i32, NodeId)> + '_ {
        self.children.iter().map(|(depth, id)| (*depth, *id))
    }

    /// Number of children
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Child bound to a name slot on this node
    pub fn named_child(&self, name: &str) -> Option<NodeId> {
        self.named_children.get(name).copied()
    }

    /// Local transform
    pub fn matrix(&self) -> Matrix {
        self.matrix
    }

    /// Color transform
    pub fn color_transform(&self) -> ColorTransform {
        self.color_transform
    }

    /// Morph ratio
    pub fn ratio(&self) -> Option<f32> {
        self.ratio
    }

    /// Clip depth
    pub fn clip_depth(&self) -> Option<i32> {
        self.clip_depth
    }

    /// Blend mode
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// Visibility
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether a timeline still drives this node
    pub fn is_animated_by_timeline(&self) -> bool {
        self.animated_by_timeline
    }

    /// Whether construction has run
    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    /// Mark construction as done. Returns false if it already was.
    pub fn mark_constructed(&mut self) -> bool {
        !std::mem::replace(&mut self.constructed, true)
    }

    /// Hand this node to timeline control (used when a frame delta places it)
    pub fn attach_to_timeline(&mut self) {
        self.animated_by_timeline = true;
    }

    /// Take this node out of timeline control; later deltas will replace it instead.
    pub fn detach_from_timeline(&mut self) {
        self.animated_by_timeline = false;
    }

    /// Script-side transform change
    pub fn set_matrix(&mut self, matrix: Matrix) {
        self.matrix = matrix;
        self.detach_from_timeline();
    }

    /// Script-side color change
    pub fn set_color_transform(&mut self, color_transform: ColorTransform) {
        self.color_transform = color_transform;
        self.detach_from_timeline();
    }

    /// Script-side visibility change
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_mutation_detaches() {
        let mut node = DisplayNode::from_symbol(SymbolId(3), SymbolKind::Shape);
        node.attach_to_timeline();
        assert!(node.is_animated_by_timeline());

        node.set_visible(false);
        assert!(node.is_animated_by_timeline());

        node.set_matrix(Matrix::translate(10.0, 4.0));
        assert!(!node.is_animated_by_timeline());
        assert_eq!(node.matrix().tx, 10.0);
    }

    #[test]
    fn test_mark_constructed_once() {
        let mut node = DisplayNode::new(NodeContent::Container);
        assert!(node.mark_constructed());
        assert!(!node.mark_constructed());
        assert!(node.is_constructed());
    }

    #[test]
    fn test_dynamic_kinds() {
        assert!(SymbolKind::Sprite.is_dynamic());
        assert!(SymbolKind::DynamicText.is_dynamic());
        assert!(!SymbolKind::Shape.is_dynamic());
        assert!(!SymbolKind::MorphShape.is_dynamic());
        assert!(SymbolKind::Sprite.has_timeline());
    }
}
