// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host hooks: legacy script runtime, telemetry and frame listeners.

use crate::error::ScriptError;
use crate::stage::Stage;
use crate::symbol::ActionBlock;
use indexmap::IndexMap;
use ordoplay_stage::{NodeId, PlaceState};
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// Runtime that owns legacy-bound placements and their action blocks
pub trait LegacyRuntime {
    /// Called after a legacy placement has been inserted into its host
    fn bind_child(&self, stage: &mut Stage, host: NodeId, child: NodeId, state: &PlaceState);

    /// Execute one block of legacy actions for `node`
    fn execute_actions(
        &self,
        stage: &mut Stage,
        node: NodeId,
        actions: &ActionBlock,
    ) -> Result<(), ScriptError>;
}

/// Event reported to telemetry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryEvent {
    /// A frame script failed
    ScriptError {
        /// Node owning the script
        node: NodeId,
        /// Absolute frame
        frame: u32,
        /// Error message
        message: String,
    },
}

/// Sink for engine telemetry
pub trait Telemetry {
    /// Record an event
    fn report(&self, event: &TelemetryEvent);
}

/// Telemetry that forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn report(&self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::ScriptError { node, frame, message } => {
                tracing::error!(?node, frame, %message, "Frame script failed");
            }
        }
    }
}

/// Broadcast event for frame listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    /// The script queue was drained for this frame
    ExitFrame,
}

/// Frame listener callback
pub type FrameListener = Rc<dyn Fn(&mut Stage, FrameEvent)>;

/// Handle for removing a frame listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub Uuid);

impl ListenerId {
    /// Create a new random listener ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Hooks installed on a stage
pub(crate) struct StageHooks {
    pub(crate) legacy: Option<Rc<dyn LegacyRuntime>>,
    pub(crate) telemetry: Rc<dyn Telemetry>,
    pub(crate) listeners: IndexMap<ListenerId, FrameListener>,
}

impl Default for StageHooks {
    fn default() -> Self {
        Self {
            legacy: None,
            telemetry: Rc::new(TracingTelemetry),
            listeners: IndexMap::new(),
        }
    }
}

impl fmt::Debug for StageHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageHooks")
            .field("legacy", &self.legacy.is_some())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
