//! Motor controller abstraction for the drivetrain.
//!
//! Each side of the drivetrain has a master [`SmartMotor`] that receives
//! commands and an optional follower that mirrors whatever the master
//! applies. Encoder readings are optional: a motor without a sensor
//! returns `None` from its position and velocity getters, and callers are
//! expected to handle that.
//!
//! Units are meters and meters per second; conversion from native sensor
//! units is the backend's job.

use crate::telemetry::Dashboard;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// Bus voltage used to convert voltage requests into percent output.
pub const NOMINAL_VOLTAGE: f64 = 12.0;

/// Rotation sense of a motor relative to forward robot motion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }
}

/// What a motor is currently being asked to do.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlMode {
    Disabled,
    PercentOutput(f64),
    Voltage(f64),
    /// Closed-loop velocity in meters per second.
    Velocity(f64),
    /// Closed-loop position hold in meters.
    Position(f64),
    /// Profiled move to a position in meters.
    Target(f64),
}

impl Default for ControlMode {
    fn default() -> Self {
        ControlMode::PercentOutput(0.0)
    }
}

pub trait SmartMotor: Send {
    fn name(&self) -> &str;
    fn set_name(&mut self, name: &str);

    fn set_percent_voltage(&mut self, percent: f64);
    fn set_voltage(&mut self, volts: f64);
    fn set_velocity_ups(&mut self, units_per_second: f64);
    fn set_setpoint(&mut self, position: f64);
    fn set_target(&mut self, meters: f64);

    /// Percent output currently applied, after ramping.
    fn applied_output(&self) -> f64;

    /// Fresh sensor reads. `None` when the motor has no encoder.
    fn velocity(&mut self) -> Option<f64>;
    fn position(&mut self) -> Option<f64>;

    /// Values captured by the last [`SmartMotor::update`].
    fn velocity_cached(&self) -> Option<f64>;
    fn position_cached(&self) -> Option<f64>;

    fn reset_position(&mut self);

    fn enable(&mut self);
    fn disable(&mut self);
    fn is_enabled(&self) -> bool;

    fn enable_brakes(&mut self, enabled: bool);
    fn config_open_loop_ramp(&mut self, seconds: f64);

    /// Refreshes the cached sensor values.
    fn update(&mut self);

    fn log_periodic(&self, dashboard: &dyn Dashboard) {
        let name = self.name();
        dashboard.put_number(&format!("{}/Output", name), self.applied_output());
        if let Some(velocity) = self.velocity_cached() {
            dashboard.put_number(&format!("{}/Velocity", name), velocity);
        }
        if let Some(position) = self.position_cached() {
            dashboard.put_number(&format!("{}/Position", name), position);
        }
        dashboard.put_boolean(&format!("{}/Enabled", name), self.is_enabled());
    }
}

/// Limits how fast an open-loop output may change.
///
/// `seconds` is the time to go from neutral to full output; zero disables
/// ramping.
#[derive(Clone, Copy, Debug, Default)]
pub struct RampLimiter {
    seconds: f64,
    current: f64,
}

impl RampLimiter {
    pub fn new(seconds: f64) -> Self {
        Self {
            seconds: seconds.max(0.0),
            current: 0.0,
        }
    }

    pub fn set_ramp(&mut self, seconds: f64) {
        self.seconds = seconds.max(0.0);
    }

    pub fn ramp(&self) -> f64 {
        self.seconds
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Moves the output towards `target` by at most what `elapsed` allows.
    pub fn step(&mut self, target: f64, elapsed: Duration) -> f64 {
        if self.seconds <= 0.0 {
            self.current = target;
        } else {
            let max_delta = elapsed.as_secs_f64() / self.seconds;
            let delta = (target - self.current).clamp(-max_delta, max_delta);
            self.current += delta;
        }
        self.current
    }

    /// Jumps straight to `value`, bypassing the ramp.
    pub fn force(&mut self, value: f64) {
        self.current = value;
    }

    pub fn reset(&mut self) {
        self.current = 0.0;
    }
}

/// Master and follower for one side of the drivetrain.
pub struct DriveSide {
    pub master: Box<dyn SmartMotor>,
    pub follower: Option<Box<dyn SmartMotor>>,
}

impl DriveSide {
    pub fn new(master: Box<dyn SmartMotor>, follower: Option<Box<dyn SmartMotor>>) -> Self {
        Self { master, follower }
    }

    /// Copies the master's applied output onto the follower.
    pub fn sync_follower(&mut self) {
        let output = self.master.applied_output();
        if let Some(follower) = self.follower.as_mut() {
            follower.set_percent_voltage(output);
        }
    }

    pub fn set_names(&mut self, master: &str, follower: &str) {
        self.master.set_name(master);
        if let Some(f) = self.follower.as_mut() {
            f.set_name(follower);
        }
    }

    pub fn enable(&mut self) {
        self.master.enable();
        if let Some(f) = self.follower.as_mut() {
            f.enable();
        }
    }

    pub fn disable(&mut self) {
        self.master.disable();
        if let Some(f) = self.follower.as_mut() {
            f.disable();
        }
    }

    pub fn enable_brakes(&mut self, enabled: bool) {
        self.master.enable_brakes(enabled);
        if let Some(f) = self.follower.as_mut() {
            f.enable_brakes(enabled);
        }
    }

    pub fn config_open_loop_ramp(&mut self, seconds: f64) {
        self.master.config_open_loop_ramp(seconds);
        if let Some(f) = self.follower.as_mut() {
            f.config_open_loop_ramp(seconds);
        }
    }
}

// Simulated motor

/// Shared state of a simulated motor. The [`SimPlant`](super::sim::SimPlant)
/// advances it; the drivetrain commands it through [`SimMotor`].
#[derive(Clone, Debug, Default)]
pub struct SimMotorState {
    pub mode: ControlMode,
    pub enabled: bool,
    pub brake: bool,
    pub ramp: RampLimiter,
    pub velocity: f64,
    pub position: f64,
}

impl SimMotorState {
    /// Integrates one time step for a motor whose full output moves its wheel
    /// at `free_speed` meters per second.
    pub fn advance(&mut self, elapsed: Duration, free_speed: f64) {
        let dt = elapsed.as_secs_f64();
        let target = if !self.enabled {
            0.0
        } else {
            match self.mode {
                ControlMode::Disabled => 0.0,
                ControlMode::PercentOutput(p) => p,
                ControlMode::Voltage(v) => v / NOMINAL_VOLTAGE,
                ControlMode::Velocity(v) => v / free_speed,
                ControlMode::Position(sp) | ControlMode::Target(sp) => {
                    if dt > 0.0 {
                        (sp - self.position) / (free_speed * dt)
                    } else {
                        0.0
                    }
                }
            }
        }
        .clamp(-1.0, 1.0);

        // Closed-loop modes are not subject to the open-loop ramp.
        let output = match self.mode {
            ControlMode::PercentOutput(_) | ControlMode::Voltage(_) => self.ramp.step(target, elapsed),
            _ => {
                self.ramp.force(target);
                target
            }
        };

        self.velocity = output * free_speed;
        self.position += self.velocity * dt;
    }

    /// Output the motor would apply right now.
    pub fn applied_output(&self) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        self.ramp.current()
    }
}

#[derive(Clone, Debug, Default)]
pub struct SimMotorHandle(Arc<Mutex<SimMotorState>>);

impl SimMotorHandle {
    pub fn lock(&self) -> MutexGuard<'_, SimMotorState> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Idealised motor with an encoder, used for simulation and tests.
pub struct SimMotor {
    name: String,
    state: SimMotorHandle,
    position_offset: f64,
    cached_velocity: Option<f64>,
    cached_position: Option<f64>,
}

impl SimMotor {
    pub fn new(name: &str) -> Self {
        let state = SimMotorHandle::default();
        state.lock().enabled = true;
        Self {
            name: name.to_string(),
            state,
            position_offset: 0.0,
            cached_velocity: None,
            cached_position: None,
        }
    }

    /// Handle for the plant (or a test) to drive and inspect the motor.
    pub fn handle(&self) -> SimMotorHandle {
        self.state.clone()
    }

    fn command(&mut self, mode: ControlMode) {
        let mut state = self.state.lock();
        state.mode = mode;
        // Open-loop commands are reflected immediately when no ramp is set so
        // that followers see the new output on the same tick.
        let open_loop = match mode {
            ControlMode::PercentOutput(p) => Some(p),
            ControlMode::Voltage(v) => Some(v / NOMINAL_VOLTAGE),
            _ => None,
        };
        if let Some(output) = open_loop {
            if state.ramp.ramp() <= 0.0 && state.enabled {
                state.ramp.force(output.clamp(-1.0, 1.0));
            }
        }
    }
}

impl SmartMotor for SimMotor {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn set_percent_voltage(&mut self, percent: f64) {
        self.command(ControlMode::PercentOutput(percent));
    }

    fn set_voltage(&mut self, volts: f64) {
        self.command(ControlMode::Voltage(volts));
    }

    fn set_velocity_ups(&mut self, units_per_second: f64) {
        self.command(ControlMode::Velocity(units_per_second));
    }

    fn set_setpoint(&mut self, position: f64) {
        self.command(ControlMode::Position(position + self.position_offset));
    }

    fn set_target(&mut self, meters: f64) {
        self.command(ControlMode::Target(meters + self.position_offset));
    }

    fn applied_output(&self) -> f64 {
        self.state.lock().applied_output()
    }

    fn velocity(&mut self) -> Option<f64> {
        let velocity = self.state.lock().velocity;
        self.cached_velocity = Some(velocity);
        Some(velocity)
    }

    fn position(&mut self) -> Option<f64> {
        let position = self.state.lock().position - self.position_offset;
        self.cached_position = Some(position);
        Some(position)
    }

    fn velocity_cached(&self) -> Option<f64> {
        self.cached_velocity
    }

    fn position_cached(&self) -> Option<f64> {
        self.cached_position
    }

    fn reset_position(&mut self) {
        self.position_offset = self.state.lock().position;
        self.cached_position = Some(0.0);
    }

    fn enable(&mut self) {
        self.state.lock().enabled = true;
    }

    fn disable(&mut self) {
        let mut state = self.state.lock();
        state.enabled = false;
        state.mode = ControlMode::Disabled;
        state.ramp.reset();
    }

    fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    fn enable_brakes(&mut self, enabled: bool) {
        debug!("{} brake mode: {}", self.name, enabled);
        self.state.lock().brake = enabled;
    }

    fn config_open_loop_ramp(&mut self, seconds: f64) {
        info!("{} open loop ramp set to {:.2}s", self.name, seconds);
        self.state.lock().ramp.set_ramp(seconds);
    }

    fn update(&mut self) {
        self.velocity();
        self.position();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ramp_limits_rate() {
        let mut ramp = RampLimiter::new(1.0);
        let out = ramp.step(1.0, Duration::from_millis(250));
        assert_relative_eq!(out, 0.25);
        let out = ramp.step(-1.0, Duration::from_millis(100));
        assert_relative_eq!(out, 0.15);
    }

    #[test]
    fn zero_ramp_is_immediate() {
        let mut ramp = RampLimiter::new(0.0);
        assert_relative_eq!(ramp.step(0.8, Duration::ZERO), 0.8);
    }

    #[test]
    fn sim_motor_integrates_position() {
        let mut motor = SimMotor::new("Left");
        let handle = motor.handle();
        motor.set_percent_voltage(0.5);
        assert_relative_eq!(motor.applied_output(), 0.5);

        handle.lock().advance(Duration::from_secs(1), 4.0);
        assert_relative_eq!(motor.velocity().unwrap_or_default(), 2.0);
        assert_relative_eq!(motor.position().unwrap_or_default(), 2.0);

        motor.reset_position();
        assert_relative_eq!(motor.position().unwrap_or_default(), 0.0);
    }

    #[test]
    fn sim_motor_position_hold_reaches_setpoint() {
        let mut motor = SimMotor::new("Left");
        let handle = motor.handle();
        motor.set_setpoint(0.1);
        handle.lock().advance(Duration::from_millis(100), 4.0);
        assert_relative_eq!(motor.position().unwrap_or_default(), 0.1, epsilon = 1e-9);
    }

    #[test]
    fn disabled_motor_outputs_nothing() {
        let mut motor = SimMotor::new("Right");
        motor.set_percent_voltage(1.0);
        motor.disable();
        assert_eq!(motor.applied_output(), 0.0);
        motor.handle().lock().advance(Duration::from_secs(1), 4.0);
        assert_eq!(motor.velocity(), Some(0.0));
    }

    #[test]
    fn follower_mirrors_master() {
        let master = SimMotor::new("Left");
        let follower = SimMotor::new("LeftFollow");
        let follower_handle = follower.handle();
        let mut side = DriveSide::new(Box::new(master), Some(Box::new(follower)));
        side.master.set_percent_voltage(-0.4);
        side.sync_follower();
        assert_eq!(
            follower_handle.lock().mode,
            ControlMode::PercentOutput(-0.4)
        );
    }

    #[test]
    fn cached_values_refresh_on_update() {
        let mut motor = SimMotor::new("Left");
        assert_eq!(motor.position_cached(), None);
        motor.set_percent_voltage(1.0);
        motor.handle().lock().advance(Duration::from_millis(500), 2.0);
        assert_eq!(motor.position_cached(), None);
        motor.update();
        assert_relative_eq!(motor.position_cached().unwrap_or_default(), 1.0);
        assert_relative_eq!(motor.velocity_cached().unwrap_or_default(), 2.0);
    }
}
