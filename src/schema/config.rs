//! Configuration types for trace playback.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_interval_ms() -> u64 {
    10
}

fn default_min_visible_z() -> f64 {
    -1.0
}

/// Top-level playback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Milliseconds between automatic frame advances.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// How auto-play wraps back to the first frame.
    #[serde(default)]
    pub wrap: WrapMode,
    /// Points strictly below this height are hidden when rendering.
    #[serde(default = "default_min_visible_z")]
    pub min_visible_z: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            wrap: WrapMode::default(),
            min_visible_z: default_min_visible_z(),
        }
    }
}

/// Auto-play wrap policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    /// Advance modulo `frame_count - 1`; the last frame is only reachable
    /// by seeking.
    #[default]
    ShortCycle,
    /// Advance modulo `frame_count`, visiting every frame.
    FullCycle,
}

impl WrapMode {
    /// Modulus applied to `index + 1` on each tick. Never zero.
    #[inline]
    pub fn modulus(self, frame_count: usize) -> usize {
        match self {
            WrapMode::ShortCycle => frame_count.saturating_sub(1).max(1),
            WrapMode::FullCycle => frame_count.max(1),
        }
    }
}

impl PlaybackConfig {
    /// Tick interval as a [`Duration`].
    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        if !self.min_visible_z.is_finite() {
            return Err(ConfigError::InvalidVisibleFloor(self.min_visible_z));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Tick interval must be non-zero")]
    InvalidInterval,
    #[error("Visible height floor must be finite, got {0}")]
    InvalidVisibleFloor(f64),
}
