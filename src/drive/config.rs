//! Drivetrain and motor settings as stored in the robot configuration file.

use super::drive_mode::DriveMode;
use super::error::DriveError;
use super::motor::Direction;
use super::pwm_motor::PwmConfig;
use super::sim::SimConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Distance between the left and right wheels in meters.
    pub track_width_m: f64,
    pub max_output: f64,
    pub deadband: f64,
    pub expiration_ms: u64,
    pub safety_enabled: bool,
    pub right_side_inverted: bool,
    /// When set, [`DriveTrain::set_velocity`](super::DriveTrain::set_velocity)
    /// runs closed-loop velocity scaled by this speed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_speed_mps: Option<f64>,
    pub drive_mode: DriveMode,
    pub use_squares: bool,
    pub quick_turn: bool,
    pub drive_scaling: f64,
    /// Scaling used when the scaling toggle drops out of full speed.
    pub slow_scaling: f64,
    /// Scaling change per POV press.
    pub scaling_step: f64,
    pub ramp_rate_s: f64,
    pub brakes: bool,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            track_width_m: 0.6,
            max_output: 0.75,
            deadband: 0.02,
            expiration_ms: 100,
            safety_enabled: false,
            right_side_inverted: false,
            max_speed_mps: None,
            drive_mode: DriveMode::Arcade,
            use_squares: true,
            quick_turn: false,
            drive_scaling: 1.0,
            slow_scaling: 0.5,
            scaling_step: 0.1,
            ramp_rate_s: 0.0,
            brakes: true,
        }
    }
}

impl DriveConfig {
    pub fn expiration(&self) -> Duration {
        Duration::from_millis(self.expiration_ms)
    }

    pub fn validate(&self) -> Result<(), DriveError> {
        if !(self.track_width_m > 0.0) {
            return Err(DriveError::Config(format!(
                "track_width_m must be positive, got {}",
                self.track_width_m
            )));
        }
        if !(self.max_output > 0.0 && self.max_output <= 1.0) {
            return Err(DriveError::Config(format!(
                "max_output must be in (0, 1], got {}",
                self.max_output
            )));
        }
        if !(0.0..1.0).contains(&self.deadband) {
            return Err(DriveError::Config(format!(
                "deadband must be in [0, 1), got {}",
                self.deadband
            )));
        }
        for (name, value) in [
            ("drive_scaling", self.drive_scaling),
            ("slow_scaling", self.slow_scaling),
        ] {
            if !(0.1..=1.0).contains(&value) {
                return Err(DriveError::Config(format!(
                    "{} must be in [0.1, 1], got {}",
                    name, value
                )));
            }
        }
        if let Some(speed) = self.max_speed_mps {
            if !(speed > 0.0) {
                return Err(DriveError::Config(format!(
                    "max_speed_mps must be positive, got {}",
                    speed
                )));
            }
        }
        if self.ramp_rate_s < 0.0 {
            return Err(DriveError::Config(format!(
                "ramp_rate_s must not be negative, got {}",
                self.ramp_rate_s
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorBackend {
    #[default]
    Sim,
    Pwm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorConfig {
    pub id: u8,
    #[serde(default)]
    pub direction: Direction,
}

impl MotorConfig {
    pub fn new(id: u8, direction: Direction) -> Self {
        Self { id, direction }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorsConfig {
    pub backend: MotorBackend,
    pub left_master: MotorConfig,
    pub right_master: MotorConfig,
    pub left_follower: MotorConfig,
    pub right_follower: MotorConfig,
    pub sim: SimConfig,
    pub pwm: PwmConfig,
}

impl Default for MotorsConfig {
    fn default() -> Self {
        Self {
            backend: MotorBackend::Sim,
            left_master: MotorConfig::new(13, Direction::Forward),
            right_master: MotorConfig::new(12, Direction::Reverse),
            left_follower: MotorConfig::new(15, Direction::Forward),
            right_follower: MotorConfig::new(14, Direction::Reverse),
            sim: SimConfig::default(),
            pwm: PwmConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(DriveConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let bad_width = DriveConfig {
            track_width_m: 0.0,
            ..Default::default()
        };
        assert!(bad_width.validate().is_err());

        let bad_output = DriveConfig {
            max_output: 1.5,
            ..Default::default()
        };
        assert!(bad_output.validate().is_err());

        let bad_scaling = DriveConfig {
            slow_scaling: 0.05,
            ..Default::default()
        };
        assert!(bad_scaling.validate().is_err());

        let bad_speed = DriveConfig {
            max_speed_mps: Some(-1.0),
            ..Default::default()
        };
        assert!(bad_speed.validate().is_err());
    }

    #[test]
    fn partial_motor_table_keeps_defaults() {
        let parsed: MotorsConfig = toml::from_str(
            r#"
backend = "pwm"

[right_master]
id = 3
"#,
        )
        .unwrap();
        assert_eq!(parsed.backend, MotorBackend::Pwm);
        assert_eq!(parsed.right_master, MotorConfig::new(3, Direction::Forward));
        assert_eq!(parsed.left_master, MotorConfig::new(13, Direction::Forward));
    }
}
