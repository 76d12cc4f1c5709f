//! Drive mixing for a two-sided drivetrain.
//!
//! Converts operator-style requests (arcade, tank, curvature) into a pair of
//! percent outputs in [-1, 1]. The mixer only computes outputs; the
//! drivetrain applies them to its motors. It also carries the motor-safety
//! watchdog: every mixing call feeds it, and [`DifferentialDrive::is_expired`]
//! reports when no output was produced within the expiration window.

use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_DEADBAND: f64 = 0.02;
pub const DEFAULT_MAX_OUTPUT: f64 = 1.0;
pub const DEFAULT_EXPIRATION: Duration = Duration::from_millis(100);

const QUICK_STOP_THRESHOLD: f64 = 0.2;
const QUICK_STOP_ALPHA: f64 = 0.1;

/// Percent output for each side, already scaled and inverted.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WheelOutputs {
    pub left: f64,
    pub right: f64,
}

/// Zeroes values inside the deadband and rescales the rest so the output
/// still spans the full range.
pub fn apply_deadband(value: f64, deadband: f64) -> f64 {
    if value.abs() > deadband {
        if value > 0.0 {
            (value - deadband) / (1.0 - deadband)
        } else {
            (value + deadband) / (1.0 - deadband)
        }
    } else {
        0.0
    }
}

fn square_preserving_sign(value: f64) -> f64 {
    (value * value).copysign(value)
}

#[derive(Debug)]
pub struct DifferentialDrive {
    max_output: f64,
    deadband: f64,
    right_side_invert_multiplier: f64,
    quick_stop_accumulator: f64,

    safety_enabled: bool,
    expiration: Duration,
    last_feed: Option<Instant>,
}

impl Default for DifferentialDrive {
    fn default() -> Self {
        Self {
            max_output: DEFAULT_MAX_OUTPUT,
            deadband: DEFAULT_DEADBAND,
            right_side_invert_multiplier: 1.0,
            quick_stop_accumulator: 0.0,
            safety_enabled: false,
            expiration: DEFAULT_EXPIRATION,
            last_feed: None,
        }
    }
}

impl DifferentialDrive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arcade drive: one axis for speed, one for rotation.
    ///
    /// Positive rotation turns clockwise (left side faster).
    pub fn arcade_drive(&mut self, speed: f64, rotation: f64, square_inputs: bool) -> WheelOutputs {
        let mut speed = apply_deadband(speed.clamp(-1.0, 1.0), self.deadband);
        let mut rotation = apply_deadband(rotation.clamp(-1.0, 1.0), self.deadband);

        if square_inputs {
            speed = square_preserving_sign(speed);
            rotation = square_preserving_sign(rotation);
        }

        let max_input = speed.abs().max(rotation.abs()).copysign(speed);

        let (left, right) = if speed >= 0.0 {
            if rotation >= 0.0 {
                (max_input, speed - rotation)
            } else {
                (speed + rotation, max_input)
            }
        } else if rotation >= 0.0 {
            (speed + rotation, max_input)
        } else {
            (max_input, speed - rotation)
        };

        self.output(left.clamp(-1.0, 1.0), right.clamp(-1.0, 1.0))
    }

    /// Tank drive: each axis drives one side.
    pub fn tank_drive(&mut self, left: f64, right: f64, square_inputs: bool) -> WheelOutputs {
        let mut left = apply_deadband(left.clamp(-1.0, 1.0), self.deadband);
        let mut right = apply_deadband(right.clamp(-1.0, 1.0), self.deadband);

        if square_inputs {
            left = square_preserving_sign(left);
            right = square_preserving_sign(right);
        }

        self.output(left, right)
    }

    /// Curvature drive: rotation sets the path curvature rather than the
    /// turn rate, so the robot turns more slowly at low speed.
    ///
    /// With `quick_turn` set, rotation is applied directly for turning in
    /// place. The quick-stop accumulator bleeds off the rotation built up
    /// during a quick turn once normal driving resumes.
    pub fn curvature_drive(&mut self, speed: f64, rotation: f64, quick_turn: bool) -> WheelOutputs {
        let speed = apply_deadband(speed.clamp(-1.0, 1.0), self.deadband);
        let rotation = apply_deadband(rotation.clamp(-1.0, 1.0), self.deadband);

        let over_power;
        let angular_power;

        if quick_turn {
            if speed.abs() < QUICK_STOP_THRESHOLD {
                self.quick_stop_accumulator = (1.0 - QUICK_STOP_ALPHA)
                    * self.quick_stop_accumulator
                    + QUICK_STOP_ALPHA * rotation.clamp(-1.0, 1.0) * 2.0;
            }
            over_power = true;
            angular_power = rotation;
        } else {
            over_power = false;
            angular_power = speed.abs() * rotation - self.quick_stop_accumulator;

            if self.quick_stop_accumulator > 1.0 {
                self.quick_stop_accumulator -= 1.0;
            } else if self.quick_stop_accumulator < -1.0 {
                self.quick_stop_accumulator += 1.0;
            } else {
                self.quick_stop_accumulator = 0.0;
            }
        }

        let mut left = speed + angular_power;
        let mut right = speed - angular_power;

        if over_power {
            if left > 1.0 {
                right -= left - 1.0;
                left = 1.0;
            } else if right > 1.0 {
                left -= right - 1.0;
                right = 1.0;
            } else if left < -1.0 {
                right -= left + 1.0;
                left = -1.0;
            } else if right < -1.0 {
                left -= right + 1.0;
                right = -1.0;
            }
        }

        let max_magnitude = left.abs().max(right.abs());
        if max_magnitude > 1.0 {
            left /= max_magnitude;
            right /= max_magnitude;
        }

        self.output(left, right)
    }

    fn output(&mut self, left: f64, right: f64) -> WheelOutputs {
        self.feed(Instant::now());
        WheelOutputs {
            left: left * self.max_output,
            right: right * self.max_output * self.right_side_invert_multiplier,
        }
    }

    pub fn set_max_output(&mut self, max_output: f64) {
        debug!("Differential drive max output set to {:.2}", max_output);
        self.max_output = max_output;
    }

    pub fn max_output(&self) -> f64 {
        self.max_output
    }

    pub fn set_deadband(&mut self, deadband: f64) {
        self.deadband = deadband;
    }

    pub fn deadband(&self) -> f64 {
        self.deadband
    }

    pub fn set_right_side_inverted(&mut self, inverted: bool) {
        self.right_side_invert_multiplier = if inverted { -1.0 } else { 1.0 };
    }

    pub fn is_right_side_inverted(&self) -> bool {
        self.right_side_invert_multiplier < 0.0
    }

    pub fn quick_stop_accumulator(&self) -> f64 {
        self.quick_stop_accumulator
    }

    // Motor safety

    pub fn set_safety_enabled(&mut self, enabled: bool) {
        debug!("Differential drive safety enabled: {}", enabled);
        self.safety_enabled = enabled;
        if enabled {
            self.last_feed = Some(Instant::now());
        }
    }

    pub fn is_safety_enabled(&self) -> bool {
        self.safety_enabled
    }

    pub fn set_expiration(&mut self, expiration: Duration) {
        self.expiration = expiration;
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    pub fn feed(&mut self, now: Instant) {
        self.last_feed = Some(now);
    }

    /// True when safety is enabled and nothing fed the watchdog within the
    /// expiration window.
    pub fn is_expired(&self, now: Instant) -> bool {
        if !self.safety_enabled {
            return false;
        }
        match self.last_feed {
            Some(last) => now.saturating_duration_since(last) > self.expiration,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raw_drive() -> DifferentialDrive {
        let mut drive = DifferentialDrive::new();
        drive.set_deadband(0.0);
        drive
    }

    #[test]
    fn deadband_rescales() {
        assert_eq!(apply_deadband(0.01, 0.02), 0.0);
        assert_eq!(apply_deadband(-0.02, 0.02), 0.0);
        assert_relative_eq!(apply_deadband(1.0, 0.02), 1.0);
        assert_relative_eq!(apply_deadband(-1.0, 0.02), -1.0);
        assert_relative_eq!(apply_deadband(0.51, 0.02), 0.5);
    }

    #[test]
    fn arcade_quadrants() {
        let mut drive = raw_drive();

        let forward = drive.arcade_drive(0.5, 0.0, false);
        assert_relative_eq!(forward.left, 0.5);
        assert_relative_eq!(forward.right, 0.5);

        let turn_right = drive.arcade_drive(0.5, 0.25, false);
        assert_relative_eq!(turn_right.left, 0.5);
        assert_relative_eq!(turn_right.right, 0.25);

        let turn_left = drive.arcade_drive(0.5, -0.25, false);
        assert_relative_eq!(turn_left.left, 0.25);
        assert_relative_eq!(turn_left.right, 0.5);

        let reverse = drive.arcade_drive(-0.5, 0.25, false);
        assert_relative_eq!(reverse.left, -0.25);
        assert_relative_eq!(reverse.right, -0.5);

        let reverse_left = drive.arcade_drive(-0.5, -0.25, false);
        assert_relative_eq!(reverse_left.left, -0.5);
        assert_relative_eq!(reverse_left.right, -0.25);

        let spin = drive.arcade_drive(0.0, 1.0, false);
        assert_relative_eq!(spin.left, 1.0);
        assert_relative_eq!(spin.right, -1.0);
    }

    #[test]
    fn arcade_squares_inputs() {
        let mut drive = raw_drive();
        let out = drive.arcade_drive(-0.5, 0.0, true);
        assert_relative_eq!(out.left, -0.25);
        assert_relative_eq!(out.right, -0.25);
    }

    #[test]
    fn max_output_and_inversion() {
        let mut drive = raw_drive();
        drive.set_max_output(0.75);
        drive.set_right_side_inverted(true);
        assert!(drive.is_right_side_inverted());
        let out = drive.tank_drive(1.0, 1.0, false);
        assert_relative_eq!(out.left, 0.75);
        assert_relative_eq!(out.right, -0.75);

        drive.set_right_side_inverted(false);
        assert!(!drive.is_right_side_inverted());
        assert_relative_eq!(drive.tank_drive(1.0, 1.0, false).right, 0.75);
    }

    #[test]
    fn tank_clamps_and_squares() {
        let mut drive = raw_drive();
        let out = drive.tank_drive(2.0, -0.5, true);
        assert_relative_eq!(out.left, 1.0);
        assert_relative_eq!(out.right, -0.25);
    }

    #[test]
    fn tank_applies_deadband() {
        let mut drive = DifferentialDrive::new();
        let out = drive.tank_drive(0.015, -0.015, false);
        assert_eq!(out, WheelOutputs::default());
    }

    #[test]
    fn curvature_scales_turn_with_speed() {
        let mut drive = raw_drive();
        let out = drive.curvature_drive(0.5, 0.5, false);
        assert_relative_eq!(out.left, 0.75);
        assert_relative_eq!(out.right, 0.25);

        // Stationary without quick turn: no rotation at all.
        let still = drive.curvature_drive(0.0, 1.0, false);
        assert_relative_eq!(still.left, 0.0);
        assert_relative_eq!(still.right, 0.0);
    }

    #[test]
    fn curvature_normalizes_without_quick_turn() {
        let mut drive = raw_drive();
        // left = 2.0, right = 0.0 before normalization.
        let out = drive.curvature_drive(1.0, 1.0, false);
        assert_relative_eq!(out.left, 1.0);
        assert_relative_eq!(out.right, 0.0);

        let out = drive.curvature_drive(-1.0, 0.5, false);
        assert_relative_eq!(out.left, -1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(out.right, -1.0);
    }

    #[test]
    fn curvature_quick_turn_spins_in_place() {
        let mut drive = raw_drive();
        let out = drive.curvature_drive(0.0, 0.6, true);
        assert_relative_eq!(out.left, 0.6);
        assert_relative_eq!(out.right, -0.6);
        assert_relative_eq!(drive.quick_stop_accumulator(), 0.12, epsilon = 1e-12);
    }

    #[test]
    fn curvature_overpower_redistributes() {
        let mut drive = raw_drive();
        let out = drive.curvature_drive(0.8, 0.5, true);
        // left = 1.3 -> clipped to 1, excess taken off the right side.
        assert_relative_eq!(out.left, 1.0);
        assert_relative_eq!(out.right, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn curvature_accumulator_bleeds_off() {
        let mut drive = raw_drive();
        drive.curvature_drive(0.0, 1.0, true);
        let accumulated = drive.quick_stop_accumulator();
        assert!(accumulated > 0.0);

        // The next regular call counter-steers by the accumulated amount.
        let out = drive.curvature_drive(0.5, 0.0, false);
        assert_relative_eq!(out.left, 0.5 - accumulated, epsilon = 1e-12);
        assert_relative_eq!(out.right, 0.5 + accumulated, epsilon = 1e-12);
        assert_eq!(drive.quick_stop_accumulator(), 0.0);
    }

    #[test]
    fn curvature_large_accumulator_decays_by_one() {
        let mut drive = raw_drive();
        for _ in 0..10 {
            drive.curvature_drive(0.0, 1.0, true);
        }
        let accumulated = drive.quick_stop_accumulator();
        assert!(accumulated > 1.0, "accumulator = {}", accumulated);
        drive.curvature_drive(0.0, 0.0, false);
        assert_relative_eq!(drive.quick_stop_accumulator(), accumulated - 1.0, epsilon = 1e-12);

        for _ in 0..20 {
            drive.curvature_drive(0.0, -1.0, true);
        }
        let accumulated = drive.quick_stop_accumulator();
        assert!(accumulated < -1.0, "accumulator = {}", accumulated);
        drive.curvature_drive(0.0, 0.0, false);
        assert_relative_eq!(drive.quick_stop_accumulator(), accumulated + 1.0, epsilon = 1e-12);
    }

    #[test]
    fn watchdog_expires_only_when_enabled() {
        let mut drive = DifferentialDrive::new();
        assert!(!drive.is_safety_enabled());
        let start = Instant::now();
        drive.feed(start);
        let later = start + Duration::from_millis(250);
        assert!(!drive.is_expired(later));

        drive.set_safety_enabled(true);
        assert!(drive.is_safety_enabled());
        drive.feed(start);
        assert!(drive.is_expired(later));
        assert!(!drive.is_expired(start + Duration::from_millis(50)));

        drive.feed(later);
        assert!(!drive.is_expired(later + Duration::from_millis(20)));
    }
}
