use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable pointing at an engine config file
pub const CONFIG_ENV: &str = "VCONTROLS_CONFIG";

/// Tunables for every control behavior
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub touchpad: TouchPadConfig,
    pub joystick: JoystickConfig,
}

/// Timing and scaling of the touch-pad gesture state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TouchPadConfig {
    /// Delay before a pending touch is classified as click or long-press
    pub idle_timeout_ms: u64,
    /// Gap between a synthesized button down and its up
    pub click_timeout_ms: u64,
    /// Travel in dp that turns a pending touch into a cursor drag
    pub move_threshold_dp: f32,
    /// Multiplier applied to finger travel before it moves the cursor
    pub movement_ratio: f32,
}
impl TouchPadConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn click_timeout(&self) -> Duration {
        Duration::from_millis(self.click_timeout_ms)
    }
}
impl Default for TouchPadConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 200,
            click_timeout_ms: 50,
            move_threshold_dp: 5.0,
            movement_ratio: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JoystickConfig {
    /// Normalized deflection needed before a four-way key goes down
    pub deadzone: f32,
    /// Cursor pixels per sample at full deflection in mouse mode
    pub mouse_speed: f32,
}
impl Default for JoystickConfig {
    fn default() -> Self {
        Self {
            deadzone: 0.35,
            mouse_speed: 12.0,
        }
    }
}

impl EngineConfig {
    /// Parse a config from JSON text, filling missing fields with defaults
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Load from the file named by `VCONTROLS_CONFIG`, or use defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(path),
            None => {
                debug!("{} not set, using default engine config", CONFIG_ENV);
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let tp = &self.touchpad;
        if tp.idle_timeout_ms == 0 {
            return Err(ConfigError::Invalid("idleTimeoutMs must be positive".into()));
        }
        if tp.move_threshold_dp.is_nan() || tp.move_threshold_dp < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "moveThresholdDp must be non-negative, got {}",
                tp.move_threshold_dp
            )));
        }
        if tp.movement_ratio.is_nan() || tp.movement_ratio <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "movementRatio must be positive, got {}",
                tp.movement_ratio
            )));
        }
        let js = &self.joystick;
        if !(0.0..1.0).contains(&js.deadzone) {
            return Err(ConfigError::Invalid(format!(
                "deadzone must be in [0, 1), got {}",
                js.deadzone
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_gesture_timings() {
        let config = EngineConfig::default();
        assert_eq!(config.touchpad.idle_timeout(), Duration::from_millis(200));
        assert_eq!(config.touchpad.click_timeout(), Duration::from_millis(50));
        assert_eq!(config.touchpad.move_threshold_dp, 5.0);
        assert_eq!(config.touchpad.movement_ratio, 2.0);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = EngineConfig::from_json(r#"{"touchpad": {"movementRatio": 3.5}}"#).unwrap();
        assert_eq!(config.touchpad.movement_ratio, 3.5);
        assert_eq!(config.touchpad.idle_timeout_ms, 200);
        assert_eq!(config.joystick, JoystickConfig::default());
    }

    #[test]
    fn load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"touchpad": {{"movementRatio": 0}}}}"#).unwrap();

        let err = EngineConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = EngineConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }
}
