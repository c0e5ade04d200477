// SPDX-License-Identifier: MIT OR Apache-2.0
//! Project settings persisted as a RON file.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Error loading or saving settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// File could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File content is not valid RON
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

/// Per-project evaluation and editor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Playback frame rate
    pub fps: f64,
    /// First frame of the working range
    pub frame_start: i64,
    /// Last frame of the working range
    pub frame_end: i64,
    /// Render resolution (width, height)
    pub resolution: [u32; 2],
    /// Maximum undo history depth
    pub history_depth: usize,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            fps: 24.0,
            frame_start: 1,
            frame_end: 250,
            resolution: [1920, 1080],
            history_depth: 100,
        }
    }
}

impl ProjectSettings {
    /// Serialize to a RON string
    pub fn to_ron(&self) -> Result<String, SettingsError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Deserialize from a RON string
    pub fn from_ron(text: &str) -> Result<Self, SettingsError> {
        Ok(ron::from_str(text)?)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ProjectSettings::default();
        assert_eq!(settings.fps, 24.0);
        assert_eq!(settings.frame_start, 1);
        assert_eq!(settings.resolution, [1920, 1080]);
    }

    #[test]
    fn test_ron_roundtrip() {
        let mut settings = ProjectSettings::default();
        settings.fps = 30.0;
        settings.resolution = [1280, 720];

        let text = settings.to_ron().expect("serialize");
        let loaded = ProjectSettings::from_ron(&text).expect("parse");
        assert_eq!(loaded, settings);
    }
}
