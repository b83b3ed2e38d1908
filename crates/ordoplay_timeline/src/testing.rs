// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared helpers for unit tests.

use crate::hooks::{Telemetry, TelemetryEvent};
use ordoplay_stage::{SymbolKind, SymbolRef};
use std::cell::RefCell;

/// Route `tracing` output to the test harness
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Reference to a shape symbol
pub(crate) fn shape(id: u32) -> SymbolRef {
    SymbolRef::new(id, SymbolKind::Shape)
}

/// Telemetry that keeps every event
#[derive(Default)]
pub(crate) struct RecordingTelemetry {
    pub(crate) events: RefCell<Vec<TelemetryEvent>>,
}

impl Telemetry for RecordingTelemetry {
    fn report(&self, event: &TelemetryEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
