//! The drivetrain subsystem.
//!
//! Owns both drive sides, the gyro, the mixer and the odometry tracker.
//! Operator input arrives through [`DriveTrain::drive`] or
//! [`DriveTrain::set_output`], which smooth the raw stick values over two
//! samples before handing them to the mixer selected by the drive mode.

use super::config::DriveConfig;
use super::differential_drive::{DifferentialDrive, WheelOutputs};
use super::drive_mode::DriveMode;
use super::error::DriveError;
use super::geometry::{Pose2d, Rotation2d};
use super::gyro::Gyro;
use super::kinematics::{DifferentialDriveKinematics, DifferentialDriveWheelSpeeds};
use super::motor::DriveSide;
use super::odometry::DifferentialDriveOdometry;
use crate::controller::ControllerOutput;
use crate::telemetry::Dashboard;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

pub const MIN_DRIVE_SCALING: f64 = 0.1;
pub const MAX_DRIVE_SCALING: f64 = 1.0;

/// The motors and sensors the drivetrain is built from.
pub struct DriveHardware {
    pub left: DriveSide,
    pub right: DriveSide,
    pub gyro: Box<dyn Gyro>,
}

pub struct DriveTrain {
    left: DriveSide,
    right: DriveSide,
    gyro: Box<dyn Gyro>,

    kinematics: DifferentialDriveKinematics,
    odometry: DifferentialDriveOdometry,
    drive: DifferentialDrive,
    dashboard: Arc<dyn Dashboard>,

    max_speed: Option<f64>,
    drive_mode: DriveMode,
    use_squares: bool,
    drive_scaling: f64,
    quick_turn: bool,

    last_left_smoothing: f64,
    last_right_smoothing: f64,
    safety_tripped: bool,
}

impl DriveTrain {
    pub fn new(
        hardware: DriveHardware,
        config: &DriveConfig,
        dashboard: Arc<dyn Dashboard>,
    ) -> Result<Self, DriveError> {
        config.validate()?;
        let DriveHardware {
            mut left,
            mut right,
            gyro,
        } = hardware;

        left.set_names("Left", "LeftFollow");
        right.set_names("Right", "RightFollow");
        left.enable_brakes(config.brakes);
        right.enable_brakes(config.brakes);
        if config.ramp_rate_s > 0.0 {
            left.config_open_loop_ramp(config.ramp_rate_s);
            right.config_open_loop_ramp(config.ramp_rate_s);
        }

        let mut drive = DifferentialDrive::new();
        drive.set_right_side_inverted(config.right_side_inverted);
        drive.set_safety_enabled(config.safety_enabled);
        drive.set_expiration(config.expiration());
        drive.set_max_output(config.max_output);
        drive.set_deadband(config.deadband);

        let odometry = DifferentialDriveOdometry::new(gyro.heading());

        let mut drive_train = Self {
            left,
            right,
            gyro,
            kinematics: DifferentialDriveKinematics::new(config.track_width_m),
            odometry,
            drive,
            dashboard,
            max_speed: config.max_speed_mps,
            drive_mode: config.drive_mode,
            use_squares: config.use_squares,
            drive_scaling: config.drive_scaling,
            quick_turn: config.quick_turn,
            last_left_smoothing: 0.0,
            last_right_smoothing: 0.0,
            safety_tripped: false,
        };
        // Zero the sensors once on boot
        drive_train.reset_position();

        info!(
            "Drivetrain ready: mode {}, max output {:.2}, track width {:.2}m",
            drive_train.drive_mode, config.max_output, config.track_width_m
        );
        Ok(drive_train)
    }

    fn apply(&mut self, outputs: WheelOutputs) {
        self.left.master.set_percent_voltage(outputs.left);
        self.right.master.set_percent_voltage(outputs.right);
        self.sync_followers();
    }

    fn sync_followers(&mut self) {
        self.left.sync_follower();
        self.right.sync_follower();
    }

    /// Sets each side from [-1, 1]. Scaled by the max speed into closed-loop
    /// velocity when one is configured.
    pub fn set_velocity(&mut self, left_velocity: f64, right_velocity: f64) {
        match self.max_speed {
            Some(max_speed) => {
                self.left.master.set_velocity_ups(left_velocity * max_speed);
                self.right.master.set_velocity_ups(right_velocity * max_speed);
            }
            None => {
                self.left.master.set_percent_voltage(left_velocity);
                self.right.master.set_percent_voltage(right_velocity);
            }
        }
        self.sync_followers();
    }

    pub fn max_speed(&self) -> Option<f64> {
        self.max_speed
    }

    pub fn set_max_speed(&mut self, max_speed: Option<f64>) {
        self.max_speed = max_speed;
    }

    // Sensor getters. `None` when the drive has no encoders.

    pub fn left_vel(&mut self) -> Option<f64> {
        self.left.master.velocity()
    }

    pub fn right_vel(&mut self) -> Option<f64> {
        self.right.master.velocity()
    }

    pub fn left_pos(&mut self) -> Option<f64> {
        self.left.master.position()
    }

    pub fn right_pos(&mut self) -> Option<f64> {
        self.right.master.position()
    }

    pub fn left_vel_cached(&self) -> Option<f64> {
        self.left.master.velocity_cached()
    }

    pub fn right_vel_cached(&self) -> Option<f64> {
        self.right.master.velocity_cached()
    }

    pub fn left_pos_cached(&self) -> Option<f64> {
        self.left.master.position_cached()
    }

    pub fn right_pos_cached(&self) -> Option<f64> {
        self.right.master.position_cached()
    }

    /// Stops both sides and forgets the smoothing history.
    pub fn full_stop(&mut self) {
        self.set_percent_voltage(0.0, 0.0);
        self.last_left_smoothing = 0.0;
        self.last_right_smoothing = 0.0;
    }

    pub fn reset_odometry(&mut self, pose: Pose2d) {
        self.reset_position();
        self.set_heading_degrees(pose.rotation.degrees());
        self.odometry.reset_position(pose, self.gyro.heading());
        debug!("Odometry reset to ({:.2}, {:.2}) {}", pose.x(), pose.y(), pose.rotation);
    }

    /// Fuses the current heading and encoder distances into the pose.
    pub fn update_odometry(&mut self) {
        let (Some(left), Some(right)) = (self.left_pos(), self.right_pos()) else {
            trace!("No encoders, skipping odometry update");
            return;
        };
        let pose = self.odometry.update(self.gyro.heading(), left, right);
        self.dashboard.put_pose("Field2d", &pose);
        self.dashboard
            .put_string("Heading", &pose.rotation.to_string());
    }

    pub fn current_pose(&self) -> Pose2d {
        self.odometry.pose()
    }

    pub fn wheel_speeds(&mut self) -> Option<DifferentialDriveWheelSpeeds> {
        Some(DifferentialDriveWheelSpeeds::new(
            self.left_vel()?,
            self.right_vel()?,
        ))
    }

    pub fn drive_kinematics(&self) -> &DifferentialDriveKinematics {
        &self.kinematics
    }

    pub fn disable(&mut self) {
        self.left.master.disable();
        self.right.master.disable();
    }

    pub fn hold_position(&mut self, position: f64) {
        self.hold_position_sides(position, position);
    }

    pub fn hold_position_sides(&mut self, left_position: f64, right_position: f64) {
        self.left.master.set_setpoint(left_position);
        self.right.master.set_setpoint(right_position);
        self.sync_followers();
    }

    pub fn set_percent_voltage(&mut self, left: f64, right: f64) {
        self.left.master.set_percent_voltage(left);
        self.right.master.set_percent_voltage(right);
        self.sync_followers();
    }

    /// Zeroes both encoders.
    pub fn reset_position(&mut self) {
        self.left.master.reset_position();
        self.right.master.reset_position();
    }

    pub fn log_periodic(&mut self) {
        self.update_odometry();

        self.left.master.update();
        self.right.master.update();

        let dashboard = self.dashboard.as_ref();
        self.gyro.log_periodic(dashboard);
        self.left.master.log_periodic(dashboard);
        self.right.master.log_periodic(dashboard);
        for follower in [self.left.follower.as_ref(), self.right.follower.as_ref()]
            .into_iter()
            .flatten()
        {
            follower.log_periodic(dashboard);
        }

        dashboard.put_pose("Field2d", &self.odometry.pose());
    }

    /// Per-tick housekeeping: keeps followers in step and stops the drive
    /// when the motor-safety watchdog expires.
    pub fn periodic(&mut self, now: Instant) {
        if self.drive.is_expired(now) {
            if !self.safety_tripped {
                warn!(
                    "Drive output not updated within {:?}, stopping motors",
                    self.drive.expiration()
                );
                self.safety_tripped = true;
            }
            self.left.master.set_percent_voltage(0.0);
            self.right.master.set_percent_voltage(0.0);
        } else if self.safety_tripped {
            info!("Drive output resumed");
            self.safety_tripped = false;
        }
        self.sync_followers();
    }

    pub fn enable_drive_train(&mut self, enable: bool) {
        self.drive.set_safety_enabled(enable);
        if enable {
            self.left.enable();
            self.right.enable();
        } else {
            self.left.disable();
            self.right.disable();
        }
        info!("Drivetrain {}", if enable { "enabled" } else { "disabled" });
    }

    pub fn enable_brakes(&mut self, enabled: bool) {
        self.left.enable_brakes(enabled);
        self.right.enable_brakes(enabled);
    }

    pub fn average_encoder_distance(&mut self) -> Option<f64> {
        Some((self.left_pos()? + self.right_pos()?) / 2.0)
    }

    pub fn zero_heading(&mut self) {
        self.gyro.reset();
    }

    pub fn heading_degrees(&self) -> f64 {
        self.gyro.heading_degrees()
    }

    pub fn heading(&self) -> Rotation2d {
        self.gyro.heading()
    }

    /// Sets the heading, in degrees on [-180, 180].
    pub fn set_heading_degrees(&mut self, heading: f64) {
        self.gyro.set_heading_degrees(heading);
    }

    pub fn max_output(&self) -> f64 {
        self.drive.max_output()
    }

    pub fn set_max_output(&mut self, max_output: f64) {
        self.drive.set_max_output(max_output);
    }

    pub fn set_ramp_rate(&mut self, ramp_time_seconds: f64) {
        self.left.config_open_loop_ramp(ramp_time_seconds);
        self.right.config_open_loop_ramp(ramp_time_seconds);
    }

    pub fn drive_arcade(&mut self, speed: f64, rotation: f64, use_squares: bool) {
        let outputs = self.drive.arcade_drive(speed, rotation, use_squares);
        self.apply(outputs);
    }

    /// Tank drive always squares its inputs.
    pub fn drive_tank(&mut self, left_speed: f64, right_speed: f64) {
        let outputs = self.drive.tank_drive(left_speed, right_speed, true);
        self.apply(outputs);
    }

    pub fn drive_curvature(&mut self, speed: f64, rotation: f64, quick_turn: bool) {
        let outputs = self.drive.curvature_drive(speed, rotation, quick_turn);
        self.apply(outputs);
    }

    pub fn drive_to_target(&mut self, meters: f64) {
        self.left.master.set_target(meters);
        self.right.master.set_target(meters);
        self.sync_followers();
    }

    pub fn tank_drive_volts(&mut self, left_volts: f64, right_volts: f64) {
        self.left.master.set_voltage(left_volts);
        self.right.master.set_voltage(right_volts);
        self.sync_followers();
        self.drive.feed(Instant::now());
    }

    /// Maps the sticks for the current mode and drives with them.
    pub fn drive(&mut self, controller: &ControllerOutput) {
        let left_y = controller.left_stick.y as f64;
        let (left, right) = match self.drive_mode {
            DriveMode::Arcade | DriveMode::Curvature => {
                (left_y, controller.right_stick.x as f64)
            }
            DriveMode::Tank => (left_y, controller.right_stick.y as f64),
        };
        self.set_output(left, right);
    }

    /// Averages each input with the previous raw sample, then mixes.
    pub fn set_output(&mut self, left: f64, right: f64) {
        let new_left = (self.last_left_smoothing + left) / 2.0;
        let new_right = (self.last_right_smoothing + right) / 2.0;
        self.last_left_smoothing = left;
        self.last_right_smoothing = right;

        match self.drive_mode {
            DriveMode::Arcade => self.drive_arcade(new_left, new_right, self.use_squares),
            DriveMode::Tank => self.drive_tank(new_left, new_right),
            DriveMode::Curvature => self.drive_curvature(new_left, new_right, self.quick_turn),
        }
    }

    pub fn drive_mode(&self) -> DriveMode {
        self.drive_mode
    }

    pub fn set_drive_mode(&mut self, mode: DriveMode) {
        self.drive_mode = mode;
        info!("Drive mode: {}", mode);
        self.dashboard.put_string("DriveTrainMode", &mode.to_string());
    }

    pub fn toggle_drive_mode(&mut self) {
        self.set_drive_mode(self.drive_mode.next());
    }

    pub fn use_squares(&self) -> bool {
        self.use_squares
    }

    pub fn set_use_squares(&mut self, use_squares: bool) {
        self.use_squares = use_squares;
        self.dashboard.put_boolean("UseSquares", use_squares);
    }

    pub fn drive_scaling(&self) -> f64 {
        self.drive_scaling
    }

    /// Clamps to [0.1, 1.0] and applies it as the mixer's max output.
    pub fn set_drive_scaling(&mut self, scaling: f64) {
        self.drive_scaling = scaling.clamp(MIN_DRIVE_SCALING, MAX_DRIVE_SCALING);
        self.set_max_output(self.drive_scaling);
        debug!("Drive scaling: {:.2}", self.drive_scaling);
        self.dashboard.put_number("DriveScaling", self.drive_scaling);
    }

    pub fn quick_turn(&self) -> bool {
        self.quick_turn
    }

    pub fn set_quick_turn(&mut self, quick_turn: bool) {
        self.quick_turn = quick_turn;
        self.dashboard.put_boolean("UseQuickTurn", quick_turn);
    }

    /// Puts the current toggles on the dashboard without changing them.
    pub fn publish_settings(&self) {
        self.dashboard
            .put_string("DriveTrainMode", &self.drive_mode.to_string());
        self.dashboard.put_boolean("UseSquares", self.use_squares);
        self.dashboard.put_number("DriveScaling", self.drive_scaling);
        self.dashboard.put_boolean("UseQuickTurn", self.quick_turn);
    }

    /// Last raw samples fed to the smoothing filter.
    pub fn smoothing_state(&self) -> (f64, f64) {
        (self.last_left_smoothing, self.last_right_smoothing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::gyro::{SimGyro, SimGyroHandle};
    use crate::drive::motor::{ControlMode, SimMotor, SimMotorHandle, SmartMotor};
    use crate::drive::sim::{SimConfig, SimPlant};
    use crate::telemetry::MemoryDashboard;
    use approx::assert_relative_eq;
    use std::time::Duration;

    struct Rig {
        drive_train: DriveTrain,
        dashboard: Arc<MemoryDashboard>,
        left: SimMotorHandle,
        right: SimMotorHandle,
        left_follower: SimMotorHandle,
        gyro: SimGyroHandle,
    }

    fn rig(config: DriveConfig) -> Rig {
        let left = SimMotor::new("l");
        let right = SimMotor::new("r");
        let left_follower = SimMotor::new("lf");
        let right_follower = SimMotor::new("rf");
        let gyro = SimGyro::new();
        let handles = (left.handle(), right.handle(), left_follower.handle(), gyro.handle());
        let dashboard = Arc::new(MemoryDashboard::new());
        let hardware = DriveHardware {
            left: DriveSide::new(Box::new(left), Some(Box::new(left_follower))),
            right: DriveSide::new(Box::new(right), Some(Box::new(right_follower))),
            gyro: Box::new(gyro),
        };
        let drive_train = DriveTrain::new(hardware, &config, dashboard.clone()).unwrap();
        Rig {
            drive_train,
            dashboard,
            left: handles.0,
            right: handles.1,
            left_follower: handles.2,
            gyro: handles.3,
        }
    }

    fn output(handle: &SimMotorHandle) -> f64 {
        handle.lock().applied_output()
    }

    fn stick(left_y: f32, right_x: f32, right_y: f32) -> ControllerOutput {
        let mut out = ControllerOutput::default();
        out.left_stick.y = left_y;
        out.right_stick.x = right_x;
        out.right_stick.y = right_y;
        out
    }

    #[test]
    fn construction_names_motors_and_defaults() {
        let rig = rig(DriveConfig::default());
        let dt = &rig.drive_train;
        assert_eq!(dt.left.master.name(), "Left");
        assert_eq!(dt.right.master.name(), "Right");
        assert_eq!(dt.left.follower.as_ref().map(|f| f.name()), Some("LeftFollow"));
        assert_eq!(dt.right.follower.as_ref().map(|f| f.name()), Some("RightFollow"));
        assert_eq!(dt.drive_mode(), DriveMode::Arcade);
        assert!(dt.use_squares());
        assert!(!dt.quick_turn());
        assert_eq!(dt.drive_scaling(), 1.0);
        assert_relative_eq!(dt.max_output(), 0.75);
        assert_eq!(dt.smoothing_state(), (0.0, 0.0));
    }

    #[test]
    fn output_is_smoothed_over_two_samples() {
        let mut rig = rig(DriveConfig {
            max_output: 1.0,
            use_squares: false,
            ..Default::default()
        });
        rig.drive_train.set_drive_mode(DriveMode::Tank);

        rig.drive_train.set_output(1.0, 0.0);
        assert_eq!(rig.drive_train.smoothing_state(), (1.0, 0.0));
        // Tank squares: ((0.5 - 0.02) / 0.98)^2
        let half = ((0.5_f64 - 0.02) / 0.98).powi(2);
        assert_relative_eq!(output(&rig.left), half, epsilon = 1e-9);
        assert_relative_eq!(output(&rig.right), 0.0);

        rig.drive_train.set_output(1.0, 0.0);
        assert_relative_eq!(output(&rig.left), 1.0, epsilon = 1e-9);
        assert_relative_eq!(output(&rig.left_follower), output(&rig.left));
    }

    #[test]
    fn arcade_uses_left_y_and_right_x() {
        let mut rig = rig(DriveConfig {
            max_output: 1.0,
            use_squares: false,
            deadband: 0.0,
            ..Default::default()
        });
        let input = stick(0.5, 0.2, 0.9);
        rig.drive_train.drive(&input);
        // First sample is halved: speed 0.25, rotation 0.1
        assert_relative_eq!(output(&rig.left), 0.25, epsilon = 1e-9);
        assert_relative_eq!(output(&rig.right), 0.15, epsilon = 1e-9);
    }

    #[test]
    fn tank_uses_both_y_axes() {
        let mut rig = rig(DriveConfig {
            max_output: 1.0,
            deadband: 0.0,
            drive_mode: DriveMode::Tank,
            ..Default::default()
        });
        let input = stick(1.0, 0.7, -1.0);
        rig.drive_train.drive(&input);
        rig.drive_train.drive(&input);
        assert_relative_eq!(output(&rig.left), 1.0, epsilon = 1e-9);
        assert_relative_eq!(output(&rig.right), -1.0, epsilon = 1e-9);
    }

    #[test]
    fn full_stop_resets_smoothing() {
        let mut rig = rig(DriveConfig::default());
        rig.drive_train.set_output(0.8, -0.4);
        rig.drive_train.full_stop();
        assert_eq!(rig.drive_train.smoothing_state(), (0.0, 0.0));
        assert_eq!(output(&rig.left), 0.0);
        assert_eq!(output(&rig.right), 0.0);
        assert_eq!(output(&rig.left_follower), 0.0);
    }

    #[test]
    fn drive_scaling_is_clamped_and_published() {
        let mut rig = rig(DriveConfig::default());
        rig.drive_train.set_drive_scaling(0.05);
        assert_eq!(rig.drive_train.drive_scaling(), 0.1);
        assert_eq!(rig.drive_train.max_output(), 0.1);
        rig.drive_train.set_drive_scaling(3.0);
        assert_eq!(rig.drive_train.drive_scaling(), 1.0);
        assert_eq!(rig.dashboard.get_number("DriveScaling"), Some(1.0));
        rig.drive_train.set_drive_scaling(0.6);
        assert_relative_eq!(rig.drive_train.max_output(), 0.6);
    }

    #[test]
    fn toggles_publish_to_dashboard() {
        let mut rig = rig(DriveConfig::default());
        rig.drive_train.toggle_drive_mode();
        assert_eq!(rig.drive_train.drive_mode(), DriveMode::Tank);
        assert_eq!(
            rig.dashboard.get_string("DriveTrainMode").as_deref(),
            Some("TANK")
        );
        rig.drive_train.toggle_drive_mode();
        rig.drive_train.toggle_drive_mode();
        assert_eq!(rig.drive_train.drive_mode(), DriveMode::Arcade);

        rig.drive_train.set_use_squares(false);
        rig.drive_train.set_quick_turn(true);
        assert_eq!(rig.dashboard.get_boolean("UseSquares"), Some(false));
        assert_eq!(rig.dashboard.get_boolean("UseQuickTurn"), Some(true));
    }

    #[test]
    fn publish_settings_leaves_max_output_alone() {
        let rig = rig(DriveConfig::default());
        rig.drive_train.publish_settings();
        assert_eq!(rig.drive_train.max_output(), 0.75);
        assert_eq!(
            rig.dashboard.get_string("DriveTrainMode").as_deref(),
            Some("ARCADE")
        );
        assert_eq!(rig.dashboard.get_number("DriveScaling"), Some(1.0));
        assert_eq!(rig.dashboard.get_boolean("UseSquares"), Some(true));
        assert_eq!(rig.dashboard.get_boolean("UseQuickTurn"), Some(false));
    }

    #[test]
    fn velocity_uses_closed_loop_with_max_speed() {
        let mut rig = rig(DriveConfig {
            max_speed_mps: Some(3.0),
            ..Default::default()
        });
        rig.drive_train.set_velocity(0.5, -1.0);
        assert_eq!(rig.left.lock().mode, ControlMode::Velocity(1.5));
        assert_eq!(rig.right.lock().mode, ControlMode::Velocity(-3.0));

        rig.drive_train.set_max_speed(None);
        rig.drive_train.set_velocity(0.5, -1.0);
        assert_eq!(rig.left.lock().mode, ControlMode::PercentOutput(0.5));
        assert_eq!(output(&rig.right), -1.0);
    }

    #[test]
    fn odometry_tracks_simulated_motion() {
        let mut rig = rig(DriveConfig::default());
        let mut plant = SimPlant::new(
            rig.left.clone(),
            rig.right.clone(),
            rig.gyro.clone(),
            0.6,
            &SimConfig::default(),
        );
        rig.drive_train.set_percent_voltage(0.5, 0.5);
        for _ in 0..50 {
            plant.step(Duration::from_millis(20));
            rig.drive_train.log_periodic();
        }
        let pose = rig.drive_train.current_pose();
        assert_relative_eq!(pose.x(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(pose.y(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(rig.drive_train.right_pos_cached().unwrap_or_default(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(rig.drive_train.right_vel_cached().unwrap_or_default(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(rig.drive_train.average_encoder_distance().unwrap_or_default(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(rig.dashboard.get_number("Field2d/x").unwrap_or_default(), 2.0, epsilon = 1e-9);
        assert!(rig.dashboard.get_string("Heading").is_some());
        assert_eq!(rig.dashboard.get_number("Left/Output"), Some(0.5));
    }

    #[test]
    fn reset_odometry_sets_pose_and_heading() {
        let mut rig = rig(DriveConfig::default());
        rig.left.lock().position = 3.0;
        rig.right.lock().position = 3.0;
        let pose = Pose2d::new(1.0, 2.0, Rotation2d::from_degrees(90.0));
        rig.drive_train.reset_odometry(pose);

        assert_relative_eq!(rig.drive_train.heading_degrees(), 90.0, epsilon = 1e-9);
        assert_eq!(rig.drive_train.left_pos(), Some(0.0));

        rig.left.lock().position = 4.0;
        rig.right.lock().position = 4.0;
        rig.drive_train.update_odometry();
        let pose = rig.drive_train.current_pose();
        assert_relative_eq!(pose.x(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(pose.y(), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn watchdog_stops_motors_when_not_fed() {
        let mut rig = rig(DriveConfig {
            safety_enabled: true,
            ..Default::default()
        });
        rig.drive_train.set_output(1.0, 0.0);
        assert!(output(&rig.left) > 0.0);

        rig.drive_train.periodic(Instant::now());
        assert!(output(&rig.left) > 0.0);

        rig.drive_train.periodic(Instant::now() + Duration::from_millis(500));
        assert_eq!(output(&rig.left), 0.0);
        assert_eq!(output(&rig.left_follower), 0.0);
        assert!(rig.drive_train.safety_tripped);
    }

    #[test]
    fn watchdog_resumes_after_new_output() {
        let mut rig = rig(DriveConfig {
            safety_enabled: true,
            ..Default::default()
        });
        rig.drive_train.set_output(1.0, 0.0);
        rig.drive_train.periodic(Instant::now() + Duration::from_millis(500));
        assert_eq!(output(&rig.left), 0.0);
        assert!(rig.drive_train.safety_tripped);

        // Feeding again clears the trip and the output sticks.
        rig.drive_train.set_output(1.0, 0.0);
        assert!(output(&rig.left) > 0.0);
        rig.drive_train.periodic(Instant::now());
        assert!(!rig.drive_train.safety_tripped);
        assert!(output(&rig.left) > 0.0);
        assert!(output(&rig.left_follower) > 0.0);
    }

    #[test]
    fn enable_drive_train_toggles_motors() {
        let mut rig = rig(DriveConfig::default());
        rig.drive_train.enable_drive_train(false);
        assert!(!rig.drive_train.drive.is_safety_enabled());
        assert!(!rig.left.lock().enabled);
        assert!(!rig.left_follower.lock().enabled);
        rig.drive_train.enable_drive_train(true);
        assert!(rig.drive_train.drive.is_safety_enabled());
        assert!(rig.right.lock().enabled);
    }

    #[test]
    fn hold_and_target_commands() {
        let mut rig = rig(DriveConfig::default());
        rig.drive_train.hold_position_sides(0.5, -0.5);
        assert_eq!(rig.left.lock().mode, ControlMode::Position(0.5));
        assert_eq!(rig.right.lock().mode, ControlMode::Position(-0.5));
        rig.drive_train.drive_to_target(2.0);
        assert_eq!(rig.right.lock().mode, ControlMode::Target(2.0));
        rig.drive_train.tank_drive_volts(6.0, -6.0);
        assert_relative_eq!(output(&rig.left), 0.5);
        assert_relative_eq!(output(&rig.right), -0.5);
    }

    struct NoEncoder(SimMotor);

    impl SmartMotor for NoEncoder {
        fn name(&self) -> &str {
            self.0.name()
        }
        fn set_name(&mut self, name: &str) {
            self.0.set_name(name)
        }
        fn set_percent_voltage(&mut self, percent: f64) {
            self.0.set_percent_voltage(percent)
        }
        fn set_voltage(&mut self, volts: f64) {
            self.0.set_voltage(volts)
        }
        fn set_velocity_ups(&mut self, ups: f64) {
            self.0.set_velocity_ups(ups)
        }
        fn set_setpoint(&mut self, position: f64) {
            self.0.set_setpoint(position)
        }
        fn set_target(&mut self, meters: f64) {
            self.0.set_target(meters)
        }
        fn applied_output(&self) -> f64 {
            self.0.applied_output()
        }
        fn velocity(&mut self) -> Option<f64> {
            None
        }
        fn position(&mut self) -> Option<f64> {
            None
        }
        fn velocity_cached(&self) -> Option<f64> {
            None
        }
        fn position_cached(&self) -> Option<f64> {
            None
        }
        fn reset_position(&mut self) {}
        fn enable(&mut self) {
            self.0.enable()
        }
        fn disable(&mut self) {
            self.0.disable()
        }
        fn is_enabled(&self) -> bool {
            self.0.is_enabled()
        }
        fn enable_brakes(&mut self, enabled: bool) {
            self.0.enable_brakes(enabled)
        }
        fn config_open_loop_ramp(&mut self, seconds: f64) {
            self.0.config_open_loop_ramp(seconds)
        }
        fn update(&mut self) {}
    }

    #[test]
    fn missing_encoders_skip_odometry() {
        let hardware = DriveHardware {
            left: DriveSide::new(Box::new(NoEncoder(SimMotor::new("l"))), None),
            right: DriveSide::new(Box::new(NoEncoder(SimMotor::new("r"))), None),
            gyro: Box::new(SimGyro::new()),
        };
        let dashboard = Arc::new(MemoryDashboard::new());
        let mut dt = DriveTrain::new(hardware, &DriveConfig::default(), dashboard.clone()).unwrap();
        dt.log_periodic();
        assert_eq!(dt.left_pos(), None);
        assert_eq!(dt.wheel_speeds(), None);
        assert_eq!(dt.average_encoder_distance(), None);
        assert_eq!(dashboard.get_string("Heading"), None);
        assert_eq!(dashboard.get_number("Field2d/x"), Some(0.0));
    }

    #[test]
    fn rejects_invalid_config() {
        let hardware = DriveHardware {
            left: DriveSide::new(Box::new(SimMotor::new("l")), None),
            right: DriveSide::new(Box::new(SimMotor::new("r")), None),
            gyro: Box::new(SimGyro::new()),
        };
        let config = DriveConfig {
            track_width_m: -1.0,
            ..Default::default()
        };
        assert!(DriveTrain::new(hardware, &config, Arc::new(MemoryDashboard::new())).is_err());
    }
}
