// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline playback for `OrdoPlay` stages.
//!
//! This crate drives display trees from authored timelines:
//! - Scenes and frame labels over an absolute frame range
//! - Per-frame structural deltas, applied forward or rewound from frame 1
//! - Frame scripts queued per clip and drained at the end of each frame
//! - Goto navigation that is deferred while a clip's own script runs
//!
//! ## Architecture
//!
//! A [`Stage`] owns:
//! - The display tree (from `ordoplay_stage`)
//! - A [`MovieClip`] per node that has a timeline
//! - The [`FrameScheduler`] queue of clips with pending scripts
//! - The [`SymbolLibrary`] that placements instantiate from
//!
//! Each [`Stage::tick`] advances every playing clip, constructs new nodes and
//! drains the queue. Documents are stored as RON ([`MovieDocument`]).

pub mod bridge;
pub mod clip;
pub mod config;
pub mod delta;
mod diff;
pub mod document;
pub mod error;
pub mod hooks;
pub mod scene;
pub mod scheduler;
pub mod stage;
pub mod symbol;

#[cfg(test)]
mod testing;

pub use bridge::ScriptValue;
pub use clip::{FrameScript, FrameTarget, MovieClip};
pub use config::{ConfigError, PlaybackConfig, CONFIG_FORMAT_VERSION};
pub use delta::{FrameAvailability, FrameDelta, FrameDeltaStore};
pub use document::{DocumentError, MovieDocument, SymbolDefinition, DOCUMENT_FORMAT_VERSION};
pub use error::{Result, ScriptError, TimelineError};
pub use hooks::{FrameEvent, FrameListener, LegacyRuntime, ListenerId, Telemetry, TelemetryEvent, TracingTelemetry};
pub use scene::{FrameLabel, Scene, SceneIndex};
pub use scheduler::FrameScheduler;
pub use stage::Stage;
pub use symbol::{ActionBlock, FrameActions, Symbol, SymbolLibrary, TimelineDefinition};
