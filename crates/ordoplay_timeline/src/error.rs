// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised by timeline navigation and frame scripts.

use ordoplay_stage::{NodeId, SymbolId, TreeError};

/// Error surfaced synchronously by timeline operations
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// Goto named a scene that does not exist
    #[error("Scene not found: {0}")]
    SceneNotFound(String),

    /// Goto target is neither a frame number nor a label in the resolved scene
    #[error("Frame label {label} not found in scene {scene:?}")]
    FrameLabelNotFound {
        /// Requested label
        label: String,
        /// Scene name passed to the goto, if any
        scene: Option<String>,
    },

    /// Method called with an unsupported number of arguments
    #[error("{method} expects {expected} argument(s), got {got}")]
    InvalidArgumentCount {
        /// Method name
        method: &'static str,
        /// Accepted argument count, human readable
        expected: &'static str,
        /// Actual argument count
        got: usize,
    },

    /// No scene covers an absolute frame; the scene table is malformed
    #[error("No scene covers frame {0}")]
    NoCoveringScene(u32),

    /// Node has no timeline attached
    #[error("Node is not a movie clip: {0:?}")]
    NotAMovieClip(NodeId),

    /// Placement referenced a symbol missing from the library
    #[error("Symbol not found: {0:?}")]
    SymbolNotFound(SymbolId),

    /// Bridge call named an unknown method
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// Timeline definition failed validation
    #[error("Invalid timeline: {0}")]
    InvalidTimeline(String),

    /// Display tree restructuring failed
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// A frame script failed while the script queue was drained
    #[error("Frame script on frame {frame} of {node:?} failed: {source}")]
    FrameScript {
        /// Node owning the script
        node: NodeId,
        /// Absolute frame the script belongs to
        frame: u32,
        /// Script failure
        #[source]
        source: Box<ScriptError>,
    },
}

/// Error returned by a frame script
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Script raised an error of its own
    #[error("{0}")]
    Thrown(String),

    /// Navigation performed by the script failed
    #[error("Navigation failed: {0}")]
    Navigation(#[from] Box<TimelineError>),
}

impl ScriptError {
    /// Create a thrown script error
    pub fn thrown(message: impl Into<String>) -> Self {
        Self::Thrown(message.into())
    }
}

impl From<TimelineError> for ScriptError {
    fn from(error: TimelineError) -> Self {
        Self::Navigation(Box::new(error))
    }
}

/// Result type for timeline operations
pub type Result<T> = std::result::Result<T, TimelineError>;
