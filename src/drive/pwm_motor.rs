//! RC-style speed controller driven by Raspberry Pi hardware PWM.
//!
//! The controller reads a servo pulse: `min_pulse_us` is full reverse,
//! `neutral_pulse_us` is stop and `max_pulse_us` is full forward. There is no
//! encoder, so sensor getters return `None`.

use super::error::DriveError;
use super::motor::{Direction, RampLimiter, SmartMotor, NOMINAL_VOLTAGE};
use rppal::pwm::{Channel, Polarity, Pwm};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PwmConfig {
    pub period_ms: u64,
    pub min_pulse_us: u64,
    pub neutral_pulse_us: u64,
    pub max_pulse_us: u64,
    /// Wheel speed at full output, used to turn velocity requests into
    /// open-loop output.
    pub free_speed_mps: f64,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            period_ms: 20,
            min_pulse_us: 1000,
            neutral_pulse_us: 1500,
            max_pulse_us: 2000,
            free_speed_mps: 4.0,
        }
    }
}

impl PwmConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Pulse width for an output in [-1, 1].
pub fn pulse_width_for(output: f64, config: &PwmConfig) -> Duration {
    let output = output.clamp(-1.0, 1.0);
    let neutral = config.neutral_pulse_us as f64;
    let span = if output >= 0.0 {
        config.max_pulse_us as f64 - neutral
    } else {
        neutral - config.min_pulse_us as f64
    };
    Duration::from_micros((neutral + output * span).round() as u64)
}

pub fn pwm_channel(id: u8) -> Result<Channel, DriveError> {
    match id {
        0 => Ok(Channel::Pwm0),
        1 => Ok(Channel::Pwm1),
        other => Err(DriveError::UnsupportedChannel(other)),
    }
}

pub struct PwmMotor {
    name: String,
    pwm: Pwm,
    config: PwmConfig,
    direction: Direction,
    ramp: RampLimiter,
    target: f64,
    enabled: bool,
    last_update: Instant,
}

impl PwmMotor {
    pub fn new(
        name: &str,
        channel: u8,
        direction: Direction,
        config: &PwmConfig,
    ) -> Result<Self, DriveError> {
        let pwm = Pwm::with_period(
            pwm_channel(channel)?,
            config.period(),
            pulse_width_for(0.0, config),
            Polarity::Normal,
            true,
        )?;
        info!("{} on PWM channel {} ({:?})", name, channel, direction);

        Ok(Self {
            name: name.to_string(),
            pwm,
            config: config.clone(),
            direction,
            ramp: RampLimiter::default(),
            target: 0.0,
            enabled: true,
            last_update: Instant::now(),
        })
    }

    fn command(&mut self, output: f64) {
        self.target = output.clamp(-1.0, 1.0);
        if self.ramp.ramp() <= 0.0 {
            self.ramp.force(self.target);
            self.write();
        }
    }

    fn write(&mut self) {
        let output = if self.enabled { self.ramp.current() } else { 0.0 };
        let pulse = pulse_width_for(output * self.direction.sign(), &self.config);
        if let Err(e) = self.pwm.set_pulse_width(pulse) {
            warn!("{} failed to set pulse width: {}", self.name, e);
        }
    }
}

impl SmartMotor for PwmMotor {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn set_percent_voltage(&mut self, percent: f64) {
        self.command(percent);
    }

    fn set_voltage(&mut self, volts: f64) {
        self.command(volts / NOMINAL_VOLTAGE);
    }

    fn set_velocity_ups(&mut self, units_per_second: f64) {
        self.command(units_per_second / self.config.free_speed_mps);
    }

    fn set_setpoint(&mut self, position: f64) {
        warn!(
            "{} has no encoder, cannot hold position {:.3}",
            self.name, position
        );
        self.command(0.0);
    }

    fn set_target(&mut self, meters: f64) {
        warn!(
            "{} has no encoder, cannot drive to target {:.3}",
            self.name, meters
        );
        self.command(0.0);
    }

    fn applied_output(&self) -> f64 {
        if self.enabled {
            self.ramp.current()
        } else {
            0.0
        }
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
        if let Err(e) = self.pwm.enable() {
            warn!("{} failed to enable PWM: {}", self.name, e);
            return;
        }
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
        self.target = 0.0;
        self.ramp.reset();
        self.write();
        if let Err(e) = self.pwm.disable() {
            warn!("{} failed to disable PWM: {}", self.name, e);
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn enable_brakes(&mut self, enabled: bool) {
        // Brake or coast is a jumper on the controller itself.
        debug!("{} brake mode request ignored: {}", self.name, enabled);
    }

    fn config_open_loop_ramp(&mut self, seconds: f64) {
        info!("{} open loop ramp set to {:.2}s", self.name, seconds);
        self.ramp.set_ramp(seconds);
    }

    fn update(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update);
        self.last_update = now;
        if self.ramp.ramp() > 0.0 {
            self.ramp.step(self.target, elapsed);
            self.write();
        }
    }
}
