//! Minimal physics for running the drivetrain without hardware.
//!
//! Each tick the plant advances every simulated motor and turns the robot
//! by the wheel speed difference over the track width. Followers are
//! advanced too so their telemetry moves, but only the masters carry the
//! robot.

use super::gyro::SimGyroHandle;
use super::motor::SimMotorHandle;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::trace;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Wheel speed at full output, meters per second.
    pub free_speed_mps: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            free_speed_mps: 4.0,
        }
    }
}

pub struct SimPlant {
    left: SimMotorHandle,
    right: SimMotorHandle,
    followers: Vec<SimMotorHandle>,
    gyro: SimGyroHandle,
    track_width: f64,
    free_speed: f64,
}

impl SimPlant {
    pub fn new(
        left: SimMotorHandle,
        right: SimMotorHandle,
        gyro: SimGyroHandle,
        track_width: f64,
        config: &SimConfig,
    ) -> Self {
        Self {
            left,
            right,
            followers: Vec::new(),
            gyro,
            track_width,
            free_speed: config.free_speed_mps,
        }
    }

    pub fn with_followers(mut self, followers: Vec<SimMotorHandle>) -> Self {
        self.followers = followers;
        self
    }

    pub fn step(&mut self, elapsed: Duration) {
        let left_velocity = {
            let mut left = self.left.lock();
            left.advance(elapsed, self.free_speed);
            left.velocity
        };
        let right_velocity = {
            let mut right = self.right.lock();
            right.advance(elapsed, self.free_speed);
            right.velocity
        };
        for follower in &self.followers {
            follower.lock().advance(elapsed, self.free_speed);
        }

        let omega = (right_velocity - left_velocity) / self.track_width;
        let delta_degrees = (omega * elapsed.as_secs_f64()).to_degrees();
        self.gyro.rotate_degrees(delta_degrees);

        trace!(
            "Sim step: left {:.3} m/s, right {:.3} m/s, turned {:.3} deg",
            left_velocity,
            right_velocity,
            delta_degrees
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::gyro::{Gyro, SimGyro};
    use crate::drive::motor::{SimMotor, SmartMotor};
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn opposite_wheels_turn_in_place() {
        let mut left = SimMotor::new("Left");
        let mut right = SimMotor::new("Right");
        let gyro = SimGyro::new();
        let track_width = 0.5;
        let mut plant = SimPlant::new(
            left.handle(),
            right.handle(),
            gyro.handle(),
            track_width,
            &SimConfig {
                free_speed_mps: 1.0,
            },
        );

        left.set_percent_voltage(-0.25 * PI / 2.0);
        right.set_percent_voltage(0.25 * PI / 2.0);
        // omega = (pi/4) / 0.5 = pi/2 rad/s, so one second is a quarter turn.
        for _ in 0..100 {
            plant.step(Duration::from_millis(10));
        }
        assert_relative_eq!(gyro.heading_degrees(), 90.0, epsilon = 1e-6);
        assert_relative_eq!(
            left.position().unwrap_or_default(),
            -right.position().unwrap_or_default(),
            epsilon = 1e-9
        );
    }
}
