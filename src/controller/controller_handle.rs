//! Controller Handle - Unified API for gamepad input processing
//!
//! Spawns the collector thread and the processor task with one set of
//! settings, and hands out receivers for the processed snapshots.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use super::event_collector::{
    ButtonState, ButtonType, CollectorError, CollectorHandle, CollectorSettings, JoystickType,
    RawControllerEvent, TriggerType,
};
pub use super::event_processor::{
    ButtonEvent, ButtonEventState, ControllerOutput, JoystickPosition, ProcessorError,
    ProcessorHandle, ProcessorSettings, TriggerValue,
};

/// Configuration for the complete controller subsystem.
///
/// Stored as the `[controller]` section of the robot configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// How often a snapshot is published. Matches the robot loop by default
    /// so every tick sees fresh input.
    pub processing_interval_ms: u64,

    /// Press/release pairs shorter than this are treated as contact bounce.
    pub button_press_threshold_ms: u32,

    /// Analog stick deadzone as a fraction (0.0-1.0).
    pub joystick_deadzone: f32,

    /// Index into the connected gamepads at startup.
    pub gamepad_index: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            processing_interval_ms: 20,
            button_press_threshold_ms: 10,
            joystick_deadzone: 0.05,
            gamepad_index: 0,
        }
    }
}

impl ControllerSettings {
    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.processing_interval_ms == 0 {
            return Err(ControllerError::InitializationError(
                "processing_interval_ms must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.joystick_deadzone) {
            return Err(ControllerError::InitializationError(format!(
                "joystick_deadzone must be in [0, 1), got {}",
                self.joystick_deadzone
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Collector error: {0}")]
    CollectorError(#[from] CollectorError),

    #[error("Processor error: {0}")]
    ProcessorError(#[from] ProcessorError),

    #[error("Initialization error: {0}")]
    InitializationError(String),
}

/// Running controller pipeline.
///
/// ```text
/// Collector thread ─[RawControllerEvent]→ Processor task ─[ControllerOutput]→ watch
///                    (mpsc::channel(1000))
/// ```
///
/// Both halves stop when the cancellation token fires.
pub struct ControllerHandle {
    _collector: CollectorHandle,
    processor: ProcessorHandle,
}

impl ControllerHandle {
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        settings: Option<ControllerSettings>,
        cancel: CancellationToken,
    ) -> Result<Self, ControllerError> {
        let settings = settings.unwrap_or_default();
        settings.validate()?;
        info!("Initializing Controller system with settings: {:?}", settings);

        let collector_settings = CollectorSettings {
            joystick_deadzone: settings.joystick_deadzone,
            gamepad_index: settings.gamepad_index,
            poll_interval: Duration::from_millis(1),
        };
        let processor_settings = ProcessorSettings {
            processing_interval_ms: settings.processing_interval_ms,
            button_press_threshold_ms: settings.button_press_threshold_ms,
        };
        debug!(
            "Split settings: collector={:?}, processor={:?}",
            collector_settings, processor_settings
        );

        let (event_sender, event_receiver) = mpsc::channel(1000);

        let collector =
            CollectorHandle::spawn(Some(collector_settings), event_sender, cancel.clone())?;
        let processor = ProcessorHandle::spawn(event_receiver, Some(processor_settings), cancel);

        info!("Controller system initialized");
        Ok(Self {
            _collector: collector,
            processor,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerOutput> {
        self.processor.subscribe()
    }
}
