//! Differential drivetrain: mixing, odometry and the motors behind them.

pub mod config;
pub mod differential_drive;
pub mod drive_mode;
pub mod drivetrain;
pub mod error;
pub mod geometry;
pub mod gyro;
pub mod kinematics;
pub mod motor;
pub mod odometry;
pub mod pwm_motor;
pub mod sim;

pub use config::{DriveConfig, MotorBackend, MotorConfig, MotorsConfig};
pub use differential_drive::{DifferentialDrive, WheelOutputs};
pub use drive_mode::DriveMode;
pub use drivetrain::{DriveHardware, DriveTrain};
pub use error::DriveError;
pub use geometry::{Pose2d, Rotation2d, Translation2d, Twist2d};
pub use gyro::{Gyro, SimGyro};
pub use kinematics::{ChassisSpeeds, DifferentialDriveKinematics, DifferentialDriveWheelSpeeds};
pub use motor::{Direction, DriveSide, SimMotor, SmartMotor};
pub use odometry::DifferentialDriveOdometry;
pub use pwm_motor::{PwmConfig, PwmMotor};
pub use sim::{SimConfig, SimPlant};
