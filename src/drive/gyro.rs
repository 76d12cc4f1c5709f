//! Heading sensor used by the drivetrain.

use super::geometry::Rotation2d;
use crate::telemetry::Dashboard;
use std::sync::{Arc, Mutex, MutexGuard};

/// Wraps an angle in degrees onto [-180, 180).
pub fn wrap_degrees(degrees: f64) -> f64 {
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}

/// A yaw sensor. Headings are counter-clockwise positive.
pub trait Gyro: Send {
    /// Current heading in degrees on [-180, 180).
    fn heading_degrees(&self) -> f64;

    fn heading(&self) -> Rotation2d {
        Rotation2d::from_degrees(self.heading_degrees())
    }

    fn set_heading_degrees(&mut self, heading: f64);

    /// Zeroes the heading.
    fn reset(&mut self) {
        self.set_heading_degrees(0.0);
    }

    fn log_periodic(&self, dashboard: &dyn Dashboard) {
        dashboard.put_number("Gyro/Heading", self.heading_degrees());
    }
}

/// Raw accumulated yaw of a simulated gyro, in degrees.
#[derive(Clone, Debug, Default)]
pub struct SimGyroHandle(Arc<Mutex<f64>>);

impl SimGyroHandle {
    pub fn lock(&self) -> MutexGuard<'_, f64> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn rotate_degrees(&self, delta: f64) {
        *self.lock() += delta;
    }
}

#[derive(Debug, Default)]
pub struct SimGyro {
    raw: SimGyroHandle,
    offset: f64,
}

impl SimGyro {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> SimGyroHandle {
        self.raw.clone()
    }
}

impl Gyro for SimGyro {
    fn heading_degrees(&self) -> f64 {
        wrap_degrees(*self.raw.lock() + self.offset)
    }

    fn set_heading_degrees(&mut self, heading: f64) {
        self.offset = heading - *self.raw.lock();
    }
}
