// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playback configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Current playback config format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Error when loading or saving playback config
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid RON for this config
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Config could not be serialized
    #[error("Serialize error: {0}")]
    Serialize(#[from] ron::Error),

    /// Config was written by a newer version
    #[error("Config version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest supported version
        supported: u32,
    },
}

/// Stage-wide playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Config format version
    pub version: u32,
    /// Ticks per second
    pub frame_rate: f32,
    /// Skip frame scripts while draining the queue
    pub ignore_frame_scripts: bool,
    /// Fail placements whose symbol is missing instead of skipping them
    pub strict_symbols: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            frame_rate: 24.0,
            ignore_frame_scripts: false,
            strict_symbols: false,
        }
    }
}

impl PlaybackConfig {
    /// Time between ticks
    pub fn frame_interval(&self) -> Duration {
        if self.frame_rate > 0.0 {
            Duration::from_secs_f32(1.0 / self.frame_rate)
        } else {
            Duration::ZERO
        }
    }

    /// Parse from a RON string
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source)?;
        if config.version > CONFIG_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: config.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }
        Ok(config)
    }

    /// Serialize to a RON string
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron(&content)?;
        tracing::debug!(path = %path.display(), frame_rate = config.frame_rate, "Loaded playback config");
        Ok(config)
    }

    /// Save to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}
