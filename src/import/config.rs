//! Import settings

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Tick rate used when a source reports 0 ticks per second
pub const DEFAULT_TICKS_PER_SECOND: f64 = 25.0;

/// Settings applied while turning an imported scene into a skinned model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Fallback tick rate for animations without one.
    pub default_ticks_per_second: f64,
    /// Playback speed multiplier given to every loaded animation.
    pub playback_speed: f64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            default_ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            playback_speed: 1.0,
        }
    }
}

impl ImportConfig {
    /// Resolve the tick rate for an animation reporting `ticks_per_second`.
    pub fn ticks_per_second(&self, ticks_per_second: f64) -> f64 {
        if ticks_per_second.is_finite() && ticks_per_second > 0.0 {
            ticks_per_second
        } else if self.default_ticks_per_second.is_finite() && self.default_ticks_per_second > 0.0 {
            self.default_ticks_per_second
        } else {
            DEFAULT_TICKS_PER_SECOND
        }
    }

    /// Reject negative or non-finite settings. A zero tick rate selects the
    /// built-in default.
    pub fn validate(&self) -> Result<()> {
        if !self.playback_speed.is_finite() || self.playback_speed < 0.0 {
            return Err(Error::Config(format!(
                "import.playback_speed must be a non-negative number, got {}",
                self.playback_speed
            )));
        }
        if !self.default_ticks_per_second.is_finite() || self.default_ticks_per_second < 0.0 {
            return Err(Error::Config(format!(
                "import.default_ticks_per_second must be a non-negative number, got {}",
                self.default_ticks_per_second
            )));
        }
        Ok(())
    }
}
