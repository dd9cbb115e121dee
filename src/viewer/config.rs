//! Viewer configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::time::FrameStep;
use crate::core::{Error, Result};
use crate::import::ImportConfig;

/// Viewer configuration, stored as JSON
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// glTF file to load
    pub model_path: PathBuf,
    /// Animation to play, by name. Takes precedence over `animation_index`.
    pub animation: Option<String>,
    /// Animation to play, by position in the loaded list
    pub animation_index: Option<usize>,
    /// Global time scale applied to every frame delta
    pub playback_speed: f64,
    pub frame_step: FrameStep,
    /// Frames to run in headless mode
    pub frames: u64,
    pub import: ImportConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("assets/models/character.gltf"),
            animation: None,
            animation_index: None,
            playback_speed: 1.0,
            frame_step: FrameStep::default(),
            frames: 120,
            import: ImportConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.playback_speed.is_finite() || self.playback_speed < 0.0 {
            return Err(Error::Config(format!(
                "playback_speed must be a non-negative number, got {}",
                self.playback_speed
            )));
        }
        if let FrameStep::Fixed { seconds } = self.frame_step {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(Error::Config(format!(
                    "fixed frame step must be a non-negative number of seconds, got {}",
                    seconds
                )));
            }
        }
        self.import.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configs/viewer.json");

        let config = ViewerConfig {
            model_path: PathBuf::from("walker.glb"),
            animation: Some("walk".into()),
            frame_step: FrameStep::WallClock,
            frames: 10,
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert_eq!(ViewerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        std::fs::write(
            &path,
            r#"{"model_path": "bot.gltf", "frame_step": {"mode": "fixed", "seconds": 0.5}}"#,
        )
        .unwrap();

        let config = ViewerConfig::load(&path).unwrap();
        assert_eq!(config.model_path, PathBuf::from("bot.gltf"));
        assert_eq!(config.frame_step, FrameStep::Fixed { seconds: 0.5 });
        assert_eq!(config.playback_speed, 1.0);
        assert_eq!(config.import, ImportConfig::default());
    }

    #[test]
    fn test_negative_speed_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        std::fs::write(&path, r#"{"playback_speed": -1.0}"#).unwrap();

        assert!(matches!(ViewerConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_import_settings_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        std::fs::write(&path, r#"{"import": {"playback_speed": -2.0}}"#).unwrap();
        assert!(matches!(ViewerConfig::load(&path), Err(Error::Config(_))));

        std::fs::write(&path, r#"{"import": {"default_ticks_per_second": -1.0}}"#).unwrap();
        assert!(matches!(ViewerConfig::load(&path), Err(Error::Config(_))));

        let config = ViewerConfig {
            import: ImportConfig {
                playback_speed: f64::NAN,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(ViewerConfig::load(&path), Err(Error::Json(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = ViewerConfig::load(Path::new("no/such/viewer.json"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
