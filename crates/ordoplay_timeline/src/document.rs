// SPDX-License-Identifier: MIT OR Apache-2.0
//! Movie documents: a root timeline plus its symbol library, stored as RON.

use crate::config::PlaybackConfig;
use crate::delta::FrameAvailability;
use crate::error::TimelineError;
use crate::stage::Stage;
use crate::symbol::{Symbol, SymbolLibrary, TimelineDefinition};
use indexmap::IndexMap;
use ordoplay_stage::{SymbolId, SymbolKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::rc::Rc;

/// Current document format version
pub const DOCUMENT_FORMAT_VERSION: u32 = 1;

/// Error when loading, saving or validating a document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// File access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not a valid document
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Document could not be serialized
    #[error("Serialize error: {0}")]
    Serialize(#[from] ron::Error),

    /// Document was written by a newer version
    #[error("Document version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest supported version
        supported: u32,
    },

    /// Document content is inconsistent
    #[error("Invalid document: {0}")]
    Invalid(String),

    /// A timeline failed validation or the stage could not start
    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

/// Serialized form of a library symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolDefinition {
    /// Symbol ID
    pub id: SymbolId,
    /// Export name
    #[serde(default)]
    pub name: Option<String>,
    /// Content kind
    pub kind: SymbolKind,
    /// Instances are driven by the legacy script subsystem
    #[serde(default)]
    pub legacy: bool,
    /// Timeline, required for sprites
    #[serde(default)]
    pub timeline: Option<TimelineDefinition>,
}

/// A movie: root timeline, frame rate and symbols
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDocument {
    /// Format version
    pub version: u32,
    /// Document name
    pub name: String,
    /// Ticks per second
    pub frame_rate: f32,
    /// Main timeline
    pub root: TimelineDefinition,
    /// Library symbols
    #[serde(default)]
    pub symbols: Vec<SymbolDefinition>,
}

impl MovieDocument {
    /// Create a document with an empty library
    pub fn new(name: impl Into<String>, root: TimelineDefinition) -> Self {
        Self {
            version: DOCUMENT_FORMAT_VERSION,
            name: name.into(),
            frame_rate: PlaybackConfig::default().frame_rate,
            root,
            symbols: Vec::new(),
        }
    }

    /// Add a symbol
    pub fn with_symbol(mut self, symbol: SymbolDefinition) -> Self {
        self.symbols.push(symbol);
        self
    }

    /// Check the timelines, the symbol table and every placement's symbol kind
    pub fn validate(&self) -> Result<(), DocumentError> {
        let mut kinds = IndexMap::new();
        for symbol in &self.symbols {
            if kinds.insert(symbol.id, symbol.kind).is_some() {
                return Err(DocumentError::Invalid(format!("duplicate symbol {:?}", symbol.id)));
            }
            match (&symbol.timeline, symbol.kind.has_timeline()) {
                (None, true) => {
                    return Err(DocumentError::Invalid(format!("sprite {:?} has no timeline", symbol.id)));
                }
                (Some(_), false) => {
                    return Err(DocumentError::Invalid(format!(
                        "{:?} symbol {:?} cannot carry a timeline",
                        symbol.kind, symbol.id
                    )));
                }
                _ => {}
            }
        }

        let timelines = std::iter::once(&self.root).chain(self.symbols.iter().filter_map(|s| s.timeline.as_ref()));
        for timeline in timelines {
            timeline.validate()?;
            check_placements(timeline, &kinds)?;
        }
        Ok(())
    }

    /// Build the runtime symbol library
    pub fn library(&self) -> SymbolLibrary {
        let mut library = SymbolLibrary::new();
        for definition in &self.symbols {
            library.register(Symbol {
                id: definition.id,
                name: definition.name.clone(),
                kind: definition.kind,
                legacy: definition.legacy,
                timeline: definition.timeline.clone().map(Rc::new),
            });
        }
        library
    }

    /// Validate and start playback on a new stage
    pub fn into_stage(self, config: PlaybackConfig) -> Result<Stage, DocumentError> {
        self.validate()?;
        let library = self.library();
        let config = PlaybackConfig {
            frame_rate: self.frame_rate,
            ..config
        };
        tracing::info!(name = %self.name, symbols = library.len(), "Starting movie");
        Ok(Stage::new(self.root, library, config)?)
    }

    /// Serialize to a RON string
    pub fn to_ron(&self) -> Result<String, DocumentError> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Parse from a RON string
    pub fn from_ron(source: &str) -> Result<Self, DocumentError> {
        let document: Self = ron::from_str(source)?;
        if document.version > DOCUMENT_FORMAT_VERSION {
            return Err(DocumentError::UnsupportedVersion {
                found: document.version,
                supported: DOCUMENT_FORMAT_VERSION,
            });
        }
        Ok(document)
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Save to a file
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        std::fs::write(path, self.to_ron()?)?;
        tracing::debug!(path = %path.display(), "Saved movie document");
        Ok(())
    }
}

fn check_placements(timeline: &TimelineDefinition, kinds: &IndexMap<SymbolId, SymbolKind>) -> Result<(), DocumentError> {
    for index in 0..timeline.frames.frames_loaded() {
        let FrameAvailability::Available(delta) = timeline.frames.delta_at(index) else {
            continue;
        };
        for (_, change) in delta.iter() {
            let Some(symbol) = change.place_state().and_then(|state| state.symbol) else {
                continue;
            };
            match kinds.get(&symbol.id) {
                Some(kind) if *kind != symbol.kind => {
                    return Err(DocumentError::Invalid(format!(
                        "frame {} places {:?} as {:?} but it is {:?}",
                        index + 1,
                        symbol.id,
                        symbol.kind,
                        kind
                    )));
                }
                Some(_) => {}
                None => tracing::warn!(frame = index + 1, symbol = ?symbol.id, "Placement of unknown symbol"),
            }
        }
    }
    Ok(())
}
