//! Differential drive kinematics.

use serde::{Deserialize, Serialize};

/// Linear speed of each side of the drivetrain in meters per second.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DifferentialDriveWheelSpeeds {
    pub left: f64,
    pub right: f64,
}

impl DifferentialDriveWheelSpeeds {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// Scales both sides down proportionally if either exceeds
    /// `max_speed`, preserving the ratio between them.
    pub fn desaturate(&mut self, max_speed: f64) {
        let real_max = self.left.abs().max(self.right.abs());
        if real_max > max_speed {
            self.left = self.left / real_max * max_speed;
            self.right = self.right / real_max * max_speed;
        }
    }
}

/// Robot-frame velocity. `vy` is always zero for a differential drive.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChassisSpeeds {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DifferentialDriveKinematics {
    pub track_width: f64,
}

impl DifferentialDriveKinematics {
    pub fn new(track_width: f64) -> Self {
        Self { track_width }
    }

    pub fn to_chassis_speeds(&self, wheels: &DifferentialDriveWheelSpeeds) -> ChassisSpeeds {
        ChassisSpeeds {
            vx: (wheels.left + wheels.right) / 2.0,
            vy: 0.0,
            omega: (wheels.right - wheels.left) / self.track_width,
        }
    }

    pub fn to_wheel_speeds(&self, chassis: &ChassisSpeeds) -> DifferentialDriveWheelSpeeds {
        let half_track = self.track_width / 2.0;
        DifferentialDriveWheelSpeeds {
            left: chassis.vx - half_track * chassis.omega,
            right: chassis.vx + half_track * chassis.omega,
        }
    }
}
