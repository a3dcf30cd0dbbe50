use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration for a performance. Built once at startup and
/// threaded through [`crate::Performance::start`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub playback: PlaybackConfig,
    pub visibility: VisibilityConfig,
    pub camera: CameraConfig,
}

impl PerformanceConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Transport and clock settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Drift above this many milliseconds triggers a hard resync.
    pub drift_tolerance_ms: u64,
    /// Lead-in before the sequencer is started.
    pub intro_seconds: f64,
    /// Time after the last event before the performance reports itself finished.
    pub outro_seconds: f64,
    pub seek_step_seconds: f64,
    pub looping: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            drift_tolerance_ms: 100,
            intro_seconds: 2.0,
            outro_seconds: 3.0,
            seek_step_seconds: 10.0,
            looping: false,
        }
    }
}

impl PlaybackConfig {
    pub fn drift_tolerance(&self) -> Duration {
        Duration::from_millis(self.drift_tolerance_ms)
    }

    pub fn intro(&self) -> Duration {
        seconds(self.intro_seconds)
    }

    pub fn outro(&self) -> Duration {
        seconds(self.outro_seconds)
    }

    pub fn seek_step(&self) -> Duration {
        seconds(self.seek_step_seconds)
    }
}

/// Windows used by the visibility and striker controllers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// Look-ahead window in quarter notes; converted to ticks with the
    /// sequence's resolution.
    pub look_ahead_quarters: f64,
    /// How long a released instance lingers before it is hidden.
    pub decay_seconds: f64,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            look_ahead_quarters: 2.0,
            decay_seconds: 0.5,
        }
    }
}

impl VisibilityConfig {
    pub fn look_ahead_ticks(&self, ticks_per_quarter: u16) -> u64 {
        (self.look_ahead_quarters.max(0.0) * f64::from(ticks_per_quarter)).round() as u64
    }

    pub fn decay(&self) -> Duration {
        seconds(self.decay_seconds)
    }
}

/// Camera behaviour settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub start_with_auto_cam: bool,
    /// Seconds the auto camera holds an angle before cutting to the next cue.
    pub auto_cam_idle_seconds: f64,
    /// Fraction of a transition completed per second.
    pub transition_speed: f32,
    pub free_cam_move_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            start_with_auto_cam: false,
            auto_cam_idle_seconds: 3.0,
            transition_speed: 0.4,
            free_cam_move_speed: 100.0,
        }
    }
}

impl CameraConfig {
    pub fn auto_cam_idle(&self) -> Duration {
        seconds(self.auto_cam_idle_seconds)
    }
}

/// Seconds from a config file as a [`Duration`]. Negative, non-finite and
/// out-of-range values become zero.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config =
            PerformanceConfig::from_json_str(r#"{ "playback": { "drift_tolerance_ms": 40 } }"#)
                .unwrap();

        assert_eq!(config.playback.drift_tolerance(), Duration::from_millis(40));
        assert_eq!(config.playback.intro(), Duration::from_secs(2));
        assert_eq!(config.visibility, VisibilityConfig::default());
    }

    #[test]
    fn look_ahead_is_expressed_in_ticks() {
        let visibility = VisibilityConfig::default();
        assert_eq!(visibility.look_ahead_ticks(480), 960);
    }

    #[test]
    fn unrepresentable_durations_become_zero() {
        let config = PerformanceConfig::from_json_str(
            r#"{ "playback": { "intro_seconds": 1e30, "outro_seconds": -4.0 }, "camera": { "auto_cam_idle_seconds": 1e300 } }"#,
        )
        .unwrap();

        assert_eq!(config.playback.intro(), Duration::ZERO);
        assert_eq!(config.playback.outro(), Duration::ZERO);
        assert_eq!(config.camera.auto_cam_idle(), Duration::ZERO);
    }

    #[test]
    fn rejects_invalid_json() {
        let err = PerformanceConfig::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, crate::PerformanceError::Json(_)));
    }
}
