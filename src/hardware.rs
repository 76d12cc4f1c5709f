//! Builds the drivetrain hardware for the configured motor backend.

use crate::drive::{
    DriveError, DriveHardware, DriveSide, MotorBackend, MotorsConfig, PwmMotor, SimGyro, SimMotor,
    SimPlant,
};
use tracing::{info, warn};

/// Creates both drive sides and the gyro. The simulated backend also
/// returns the plant that moves them.
pub fn build_hardware(
    motors: &MotorsConfig,
    track_width: f64,
) -> Result<(DriveHardware, Option<SimPlant>), DriveError> {
    match motors.backend {
        MotorBackend::Sim => {
            info!("Using simulated drivetrain");
            let left = SimMotor::new("Left");
            let right = SimMotor::new("Right");
            let left_follower = SimMotor::new("LeftFollow");
            let right_follower = SimMotor::new("RightFollow");
            let gyro = SimGyro::new();

            let plant = SimPlant::new(
                left.handle(),
                right.handle(),
                gyro.handle(),
                track_width,
                &motors.sim,
            )
            .with_followers(vec![left_follower.handle(), right_follower.handle()]);

            let hardware = DriveHardware {
                left: DriveSide::new(Box::new(left), Some(Box::new(left_follower))),
                right: DriveSide::new(Box::new(right), Some(Box::new(right_follower))),
                gyro: Box::new(gyro),
            };
            Ok((hardware, Some(plant)))
        }
        MotorBackend::Pwm => {
            info!("Using PWM drivetrain");
            let left = PwmMotor::new(
                "Left",
                motors.left_master.id,
                motors.left_master.direction,
                &motors.pwm,
            )?;
            let right = PwmMotor::new(
                "Right",
                motors.right_master.id,
                motors.right_master.direction,
                &motors.pwm,
            )?;
            warn!("PWM backend has no gyro or encoders, odometry is disabled");

            let hardware = DriveHardware {
                // Followers share the master's signal wire.
                left: DriveSide::new(Box::new(left), None),
                right: DriveSide::new(Box::new(right), None),
                gyro: Box::new(SimGyro::new()),
            };
            Ok((hardware, None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::{DriveConfig, DriveTrain};
    use crate::telemetry::MemoryDashboard;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn sim_backend_moves_followers_too() {
        let (hardware, plant) = build_hardware(&MotorsConfig::default(), 0.6).unwrap();
        let mut plant = plant.unwrap();
        let dashboard = Arc::new(MemoryDashboard::new());
        let mut dt = DriveTrain::new(hardware, &DriveConfig::default(), dashboard.clone()).unwrap();

        dt.set_percent_voltage(0.5, 0.5);
        plant.step(Duration::from_millis(100));
        dt.log_periodic();
        assert_eq!(dashboard.get_number("LeftFollow/Output"), Some(0.5));
        assert_eq!(dashboard.get_number("RightFollow/Output"), Some(0.5));
        assert!(dashboard.get_number("Left/Position").unwrap_or_default() > 0.0);
        assert!(dt.current_pose().x() > 0.0);
    }
}
