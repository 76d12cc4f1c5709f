//! # Telemetry
//!
//! Key/value dashboard that the drivetrain publishes its state to: drive
//! mode, scaling, heading, field pose and per-motor readings.
//!
//! ```text
//! telemetry/
//! ├── mod.rs            - Dashboard trait and the in-memory table
//! ├── config.rs         - Telemetry settings
//! └── mqtt_dashboard.rs - Retained MQTT publishing of changed values
//! ```
//!
//! Publishing is fire-and-forget: the control loop never waits on telemetry
//! and a failing transport only produces log output.

pub mod config;
pub mod mqtt_dashboard;

use crate::drive::geometry::Pose2d;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

pub use config::TelemetryConfig;
pub use mqtt_dashboard::MqttDashboard;

#[derive(Clone, Debug, PartialEq)]
pub enum DashboardValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl fmt::Display for DashboardValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardValue::String(s) => write!(f, "{}", s),
            DashboardValue::Number(n) => write!(f, "{}", n),
            DashboardValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Invalid broker address: {0}")]
    InvalidBroker(String),

    #[error("Publish failed: {0}")]
    PublishError(String),
}

/// Sink for named values.
pub trait Dashboard: Send + Sync {
    fn put_value(&self, key: &str, value: DashboardValue);

    fn put_string(&self, key: &str, value: &str) {
        self.put_value(key, DashboardValue::String(value.to_string()));
    }

    fn put_number(&self, key: &str, value: f64) {
        self.put_value(key, DashboardValue::Number(value));
    }

    fn put_boolean(&self, key: &str, value: bool) {
        self.put_value(key, DashboardValue::Boolean(value));
    }

    /// Publishes a pose as `key/x`, `key/y` and `key/heading` (degrees).
    fn put_pose(&self, key: &str, pose: &Pose2d) {
        self.put_number(&format!("{}/x", key), pose.x());
        self.put_number(&format!("{}/y", key), pose.y());
        self.put_number(&format!("{}/heading", key), pose.rotation.degrees());
    }
}

/// In-process dashboard table.
#[derive(Debug, Default)]
pub struct MemoryDashboard {
    values: Mutex<HashMap<String, DashboardValue>>,
}

impl MemoryDashboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, DashboardValue>> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores the value and reports whether it differs from the previous one.
    pub fn update(&self, key: &str, value: DashboardValue) -> bool {
        let mut table = self.table();
        match table.get(key) {
            Some(existing) if *existing == value => false,
            _ => {
                table.insert(key.to_string(), value);
                true
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<DashboardValue> {
        self.table().get(key).cloned()
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(DashboardValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_number(&self, key: &str) -> Option<f64> {
        match self.get(key) {
            Some(DashboardValue::Number(n)) => Some(n),
            _ => None,
        }
    }

    pub fn get_boolean(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(DashboardValue::Boolean(b)) => Some(b),
            _ => None,
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.table().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Dashboard for MemoryDashboard {
    fn put_value(&self, key: &str, value: DashboardValue) {
        self.update(key, value);
    }
}
