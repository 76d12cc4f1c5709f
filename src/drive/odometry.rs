//! Pose tracking from gyro heading and wheel encoder distances.
//!
//! Heading comes from the gyro only; the encoders contribute the distance
//! travelled along that heading. Between two updates the robot is assumed
//! to have moved along a constant-curvature arc.

use super::geometry::{Pose2d, Rotation2d, Twist2d};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct DifferentialDriveOdometry {
    pose: Pose2d,
    gyro_offset: Rotation2d,
    previous_angle: Rotation2d,
    previous_left_distance: f64,
    previous_right_distance: f64,
}

impl DifferentialDriveOdometry {
    /// Starts tracking at the origin, facing along the current gyro heading
    /// offset so that the pose reads zero heading.
    pub fn new(gyro_angle: Rotation2d) -> Self {
        Self::with_pose(gyro_angle, Pose2d::default())
    }

    pub fn with_pose(gyro_angle: Rotation2d, initial_pose: Pose2d) -> Self {
        Self {
            pose: initial_pose,
            gyro_offset: initial_pose.rotation - gyro_angle,
            previous_angle: initial_pose.rotation,
            previous_left_distance: 0.0,
            previous_right_distance: 0.0,
        }
    }

    /// Resets the pose. The encoders must be zeroed by the caller, since the
    /// stored previous distances restart at zero.
    pub fn reset_position(&mut self, pose: Pose2d, gyro_angle: Rotation2d) {
        debug!(
            "Odometry reset to ({:.3}, {:.3}) {}",
            pose.x(),
            pose.y(),
            pose.rotation
        );
        self.pose = pose;
        self.previous_angle = pose.rotation;
        self.gyro_offset = pose.rotation - gyro_angle;
        self.previous_left_distance = 0.0;
        self.previous_right_distance = 0.0;
    }

    /// Integrates one step and returns the new pose.
    pub fn update(
        &mut self,
        gyro_angle: Rotation2d,
        left_distance: f64,
        right_distance: f64,
    ) -> Pose2d {
        let delta_left = left_distance - self.previous_left_distance;
        let delta_right = right_distance - self.previous_right_distance;
        self.previous_left_distance = left_distance;
        self.previous_right_distance = right_distance;

        let average_delta = (delta_left + delta_right) / 2.0;
        let angle = gyro_angle + self.gyro_offset;

        let new_pose = self.pose.exp(&Twist2d {
            dx: average_delta,
            dy: 0.0,
            dtheta: (angle - self.previous_angle).radians(),
        });

        self.previous_angle = angle;
        self.pose = Pose2d {
            translation: new_pose.translation,
            rotation: angle,
        };
        self.pose
    }

    pub fn pose(&self) -> Pose2d {
        self.pose
    }
}
