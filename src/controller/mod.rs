//! Controller subsystem for gamepad input handling
//!
//! Implements a two-stage processing pipeline:
//!
//! 1. [`event_collector`] - Raw gamepad input collection
//! 2. [`event_processor`] - Batching into per-cycle snapshots
//! 3. [`controller_handle`] - Unified API and lifecycle management
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► Collector ──► Processor ──► ControllerOutput
//!             (Raw Events)  (Snapshots)
//! ```
//!
//! The collector polls gilrs on its own thread; the processor publishes a
//! snapshot every 20ms on a watch channel.

pub mod controller_handle;
pub mod event_collector;
pub mod event_processor;

pub use controller_handle::{ControllerError, ControllerHandle, ControllerSettings};
pub use event_collector::{ButtonType, JoystickType, TriggerType};
pub use event_processor::{ButtonEvent, ButtonEventState, ControllerOutput, JoystickPosition};
