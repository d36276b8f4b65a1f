//! Engine configuration
//!
//! Loaded from a JSON file; every field has a default so a partial (or
//! missing) file is valid.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PadtrackError, Result};
use crate::timeline::DEFAULT_MAX_GAP_SECS;

/// Default spacing between clip starts during live playback
pub const DEFAULT_CLIP_SPACING_SECS: f64 = 0.25;

/// Duration assumed for a clip that cannot be probed when saving a composition
pub const DEFAULT_UNKNOWN_CLIP_DURATION_SECS: f64 = 0.25;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory rendered assets are written to
    pub output_dir: PathBuf,
    /// JSON manifest of saved tracks
    pub store_path: PathBuf,
    /// Directory scanned for clips
    pub clip_dir: PathBuf,
    /// Fixed offset between consecutive clip starts during playback
    pub clip_spacing_secs: f64,
    /// Fallback duration for unprobeable clips in composition-only saves
    pub unknown_clip_duration_secs: f64,
    /// Longest gap accepted on a timeline
    pub max_gap_secs: f64,
    /// Reject clips that cannot be converted to the render format instead of
    /// rendering them in their native format
    pub strict_formats: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("tracks"),
            store_path: PathBuf::from("tracks").join("tracks.json"),
            clip_dir: PathBuf::from("sounds"),
            clip_spacing_secs: DEFAULT_CLIP_SPACING_SECS,
            unknown_clip_duration_secs: DEFAULT_UNKNOWN_CLIP_DURATION_SECS,
            max_gap_secs: DEFAULT_MAX_GAP_SECS,
            strict_formats: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("clip_spacing_secs", self.clip_spacing_secs),
            ("unknown_clip_duration_secs", self.unknown_clip_duration_secs),
            ("max_gap_secs", self.max_gap_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PadtrackError::Config {
                    reason: format!("{} must be a positive number of seconds, got {}", field, value),
                });
            }
        }
        Ok(())
    }
}
