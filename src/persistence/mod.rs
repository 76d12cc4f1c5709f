//! # Persistence Module
//!
//! The robot is configured from a single TOML file. Every section has
//! defaults, so a missing or partial file still yields a working robot, and
//! the whole configuration is validated before anything is built from it.
//!
//! ```toml
//! [robot]
//! period_ms = 20
//!
//! [drive]
//! max_output = 0.75
//! drive_mode = "Arcade"
//!
//! [motors]
//! backend = "sim"
//!
//! [controller]
//! joystick_deadzone = 0.05
//!
//! [bindings]
//! toggle_scaling = "LeftStick"
//!
//! [telemetry]
//! mqtt_enabled = false
//! ```

pub mod config_store;

use crate::command::BindingsConfig;
use crate::controller::{ControllerError, ControllerSettings};
use crate::drive::pwm_motor::pwm_channel;
use crate::drive::{DriveConfig, DriveError, MotorBackend, MotorsConfig};
use crate::telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use config_store::{config_path, ensure_default_config, load_config, save_config};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Drive(#[from] DriveError),

    #[error(transparent)]
    Controller(#[from] ControllerError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RobotLoopConfig {
    /// Period of the main robot loop.
    pub period_ms: u64,
}

impl Default for RobotLoopConfig {
    fn default() -> Self {
        Self { period_ms: 20 }
    }
}

impl RobotLoopConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct RobotConfig {
    pub robot: RobotLoopConfig,
    pub drive: DriveConfig,
    pub motors: MotorsConfig,
    pub controller: ControllerSettings,
    pub bindings: BindingsConfig,
    pub telemetry: TelemetryConfig,
}

impl RobotConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.robot.period_ms == 0 {
            return Err(ConfigError::Invalid(
                "robot.period_ms must be positive".to_string(),
            ));
        }
        self.drive.validate()?;
        self.controller.validate()?;

        match self.motors.backend {
            MotorBackend::Sim => {
                if !(self.motors.sim.free_speed_mps > 0.0) {
                    return Err(ConfigError::Invalid(
                        "motors.sim.free_speed_mps must be positive".to_string(),
                    ));
                }
            }
            MotorBackend::Pwm => {
                let pwm = &self.motors.pwm;
                pwm_channel(self.motors.left_master.id)?;
                pwm_channel(self.motors.right_master.id)?;
                if self.motors.left_master.id == self.motors.right_master.id {
                    return Err(ConfigError::Invalid(
                        "left and right masters share a PWM channel".to_string(),
                    ));
                }
                if !(pwm.min_pulse_us < pwm.neutral_pulse_us
                    && pwm.neutral_pulse_us < pwm.max_pulse_us)
                {
                    return Err(ConfigError::Invalid(format!(
                        "PWM pulses must satisfy min < neutral < max, got {} / {} / {}",
                        pwm.min_pulse_us, pwm.neutral_pulse_us, pwm.max_pulse_us
                    )));
                }
                if pwm.max_pulse_us as u128 >= pwm.period().as_micros() {
                    return Err(ConfigError::Invalid(format!(
                        "PWM max pulse {}us does not fit in a {}ms period",
                        pwm.max_pulse_us, pwm.period_ms
                    )));
                }
                if !(pwm.free_speed_mps > 0.0) {
                    return Err(ConfigError::Invalid(
                        "motors.pwm.free_speed_mps must be positive".to_string(),
                    ));
                }
            }
        }

        if self.telemetry.mqtt_enabled && self.telemetry.server.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "telemetry.server is required when MQTT is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ButtonType;
    use crate::drive::{Direction, DriveMode, MotorConfig};

    #[test]
    fn defaults_validate() {
        assert!(RobotConfig::default().validate().is_ok());
    }

    #[test]
    fn parses_full_file() {
        let config: RobotConfig = toml::from_str(
            r#"
[robot]
period_ms = 10

[drive]
max_output = 0.5
drive_mode = "Curvature"
max_speed_mps = 3.5

[motors]
backend = "pwm"

[motors.left_master]
id = 0

[motors.right_master]
id = 1
direction = "Reverse"

[controller]
joystick_deadzone = 0.08

[bindings]
toggle_scaling = "B"

[telemetry]
mqtt_enabled = true
server = "10.0.0.5:1883"
"#,
        )
        .unwrap();

        assert_eq!(config.robot.period(), Duration::from_millis(10));
        assert_eq!(config.drive.drive_mode, DriveMode::Curvature);
        assert_eq!(config.drive.max_speed_mps, Some(3.5));
        assert!(config.drive.use_squares);
        assert_eq!(config.motors.right_master, MotorConfig::new(1, Direction::Reverse));
        assert_eq!(config.bindings.toggle_scaling, ButtonType::B);
        assert_eq!(config.bindings.cycle_drive_mode, ButtonType::Start);
        assert!(config.telemetry.mqtt_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn pwm_backend_checks_channels() {
        let mut config = RobotConfig::default();
        config.motors.backend = MotorBackend::Pwm;
        // Default ids are CAN ids, not PWM channels.
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Drive(DriveError::UnsupportedChannel(13)))
        ));

        config.motors.left_master.id = 1;
        config.motors.right_master.id = 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.motors.left_master.id = 0;
        assert!(config.validate().is_ok());

        config.motors.pwm.neutral_pulse_us = 2500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_period() {
        let mut config = RobotConfig::default();
        config.robot.period_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_round_trips_through_toml() {
        let text = toml::to_string_pretty(&RobotConfig::default()).unwrap();
        let parsed: RobotConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, RobotConfig::default());
    }
}
