use chrono::{DateTime, Local};
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use serde::{Deserialize, Serialize};
use statum::{machine, state};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// Raw controller event with chrono timestamps
#[derive(Debug, Clone)]
pub enum RawControllerEvent {
    JoystickMove {
        stick: JoystickType,
        x: f32,
        y: f32,
        timestamp: DateTime<Local>,
    },
    TriggerMove {
        trigger: TriggerType,
        value: f32,
        timestamp: DateTime<Local>,
    },
    ButtonEvent {
        button_type: ButtonType,
        button_state: ButtonState,
        timestamp: DateTime<Local>,
    },
    /// The active gamepad went away. Everything it held is released.
    Disconnected { timestamp: DateTime<Local> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoystickType {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerType {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

// Xbox layout names
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ButtonType {
    A,
    B,
    X,
    Y,
    Start,
    Select,
    LeftBumper,
    RightBumper,
    LeftStick,
    RightStick,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
    Guide,
}

#[derive(Clone, Debug)]
pub struct CollectorSettings {
    pub joystick_deadzone: f32,
    /// Which of the connected gamepads to listen to.
    pub gamepad_index: usize,
    pub poll_interval: Duration,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            joystick_deadzone: 0.05,
            gamepad_index: 0,
            poll_interval: Duration::from_millis(1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize collector: {0}")]
    InitializationError(String),

    #[error("Failed to send event: {0}")]
    EventSendError(String),

    #[error("Event channel closed")]
    ChannelClosed,
}

/// Coarse kind of a gilrs event, as far as gamepad selection cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadEvent {
    Connected,
    Disconnected,
    Input,
}

impl PadEvent {
    pub fn of(event: &EventType) -> Self {
        match event {
            EventType::Connected => PadEvent::Connected,
            EventType::Disconnected => PadEvent::Disconnected,
            _ => PadEvent::Input,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Event from the active gamepad.
    Forward,
    /// Event from another gamepad.
    Skip,
    /// No active gamepad and this one just connected.
    Select,
    /// No active gamepad and this one sent input.
    SelectAndForward,
}

/// Only one gamepad drives at a time. With none selected, the first one
/// that connects or sends input takes over.
pub fn route_event<Id: PartialEq>(active: Option<Id>, id: Id, event: PadEvent) -> Route {
    match active {
        Some(active) if active == id => Route::Forward,
        Some(_) => Route::Skip,
        None => match event {
            PadEvent::Connected => Route::Select,
            PadEvent::Disconnected => Route::Skip,
            PadEvent::Input => Route::SelectAndForward,
        },
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
#[derive(Debug)]
pub struct EventCollector<S: CollectionState> {
    gilrs: Gilrs,
    active_gamepad: Option<GamepadId>,
    settings: CollectorSettings,
    event_sender: mpsc::Sender<RawControllerEvent>,
    cancel: CancellationToken,

    // Last seen stick values, so a single-axis change still carries both axes
    left_stick: (f32, f32),
    right_stick: (f32, f32),
}

impl<S: CollectionState> EventCollector<S> {
    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }
}

impl EventCollector<Initializing> {
    pub fn create(
        settings: Option<CollectorSettings>,
        event_sender: mpsc::Sender<RawControllerEvent>,
        cancel: CancellationToken,
    ) -> Result<Self, CollectorError> {
        let settings = settings.unwrap_or_default();
        debug!("Creating Event Collector with settings: {:?}", settings);

        info!("Initializing gilrs controller interface");
        let gilrs = Gilrs::new().map_err(|e| {
            error!("Failed to initialize gilrs: {}", e);
            CollectorError::InitializationError(e.to_string())
        })?;

        Ok(Self::new(
            gilrs,
            None,
            settings,
            event_sender,
            cancel,
            (0.0, 0.0),
            (0.0, 0.0),
        ))
    }

    pub fn initialize(mut self) -> EventCollector<Collecting> {
        info!(
            "Initializing Event Collector with deadzone: {}",
            self.settings.joystick_deadzone
        );

        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();
        if gamepads.is_empty() {
            warn!("No gamepad connected, waiting for one to appear");
        } else {
            info!("Found {} gamepads:", gamepads.len());
            for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
                info!("  [{}] ID: {}, Name: {}", idx, id, gamepad.name());
            }
            let index = self.settings.gamepad_index.min(gamepads.len() - 1);
            let (id, gamepad) = &gamepads[index];
            info!("Selected gamepad: {} ({})", gamepad.name(), id);
            self.active_gamepad = Some(*id);
        }

        self.transition()
    }
}

impl EventCollector<Collecting> {
    /// Drains every pending gilrs event into the processor queue.
    pub fn collect_events(&mut self) -> Result<usize, CollectorError> {
        let mut count = 0;
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match route_event(self.active_gamepad, id, PadEvent::of(&event)) {
                Route::Skip => {
                    debug!("Skipping event from non-active gamepad: {:?}", id);
                    continue;
                }
                Route::Select => {
                    info!("Gamepad {} connected, selecting it", id);
                    self.active_gamepad = Some(id);
                    continue;
                }
                Route::SelectAndForward => {
                    info!("Gamepad {} sent input, selecting it", id);
                    self.active_gamepad = Some(id);
                }
                Route::Forward => {}
            }

            if event == EventType::Disconnected {
                self.active_gamepad = None;
                self.left_stick = (0.0, 0.0);
                self.right_stick = (0.0, 0.0);
            }

            if let Some(raw_event) = self.convert_gilrs_event(event) {
                if let RawControllerEvent::ButtonEvent {
                    button_type,
                    button_state,
                    timestamp,
                } = &raw_event
                {
                    debug!(
                        "Button event: {:?} {:?} at {}",
                        button_type,
                        button_state,
                        timestamp.format("%H:%M:%S.%3f")
                    );
                }
                self.send(raw_event)?;
                count += 1;
            }
        }
        Ok(count)
    }

    fn send(&self, event: RawControllerEvent) -> Result<(), CollectorError> {
        match self.event_sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                warn!("Processor queue full, dropping {:?}", event);
                Err(CollectorError::EventSendError("queue full".to_string()))
            }
            Err(TrySendError::Closed(_)) => Err(CollectorError::ChannelClosed),
        }
    }

    pub fn run_collection_loop(&mut self) -> Result<(), CollectorError> {
        info!("Starting Event Collector loop");

        let mut event_count = 0;
        let mut last_log_time = Local::now();
        let log_interval = chrono::Duration::seconds(30);

        while !self.cancel.is_cancelled() {
            match self.collect_events() {
                Ok(n) => event_count += n,
                Err(CollectorError::ChannelClosed) => {
                    warn!("Processor went away, stopping collector");
                    return Err(CollectorError::ChannelClosed);
                }
                Err(e) => error!("Error collecting events: {}", e),
            }

            let now = Local::now();
            if now - last_log_time > log_interval {
                debug!(
                    "Event Collector stats: {} events in last {} seconds",
                    event_count,
                    log_interval.num_seconds()
                );
                event_count = 0;
                last_log_time = now;
            }

            std::thread::sleep(self.settings.poll_interval);
        }

        info!("Event Collector stopped");
        Ok(())
    }

    fn stick_event(&mut self, stick: JoystickType, axis_x: bool, value: f32) -> RawControllerEvent {
        let last = match stick {
            JoystickType::Left => &mut self.left_stick,
            JoystickType::Right => &mut self.right_stick,
        };
        if axis_x {
            last.0 = value;
        } else {
            last.1 = value;
        }
        RawControllerEvent::JoystickMove {
            stick,
            x: last.0,
            y: last.1,
            timestamp: Local::now(),
        }
    }

    fn convert_gilrs_event(&mut self, event: EventType) -> Option<RawControllerEvent> {
        let now = Local::now();
        let deadzone = self.settings.joystick_deadzone;

        match event {
            EventType::AxisChanged(axis, value, _) => {
                let value = apply_deadzone(value, deadzone);
                match axis {
                    Axis::LeftStickX => Some(self.stick_event(JoystickType::Left, true, value)),
                    Axis::LeftStickY => Some(self.stick_event(JoystickType::Left, false, value)),
                    Axis::RightStickX => Some(self.stick_event(JoystickType::Right, true, value)),
                    Axis::RightStickY => Some(self.stick_event(JoystickType::Right, false, value)),
                    Axis::LeftZ => Some(RawControllerEvent::TriggerMove {
                        trigger: TriggerType::Left,
                        value,
                        timestamp: now,
                    }),
                    Axis::RightZ => Some(RawControllerEvent::TriggerMove {
                        trigger: TriggerType::Right,
                        value,
                        timestamp: now,
                    }),
                    _ => {
                        debug!("Ignoring unsupported axis: {:?}", axis);
                        None
                    }
                }
            }
            EventType::ButtonPressed(button, _) => {
                map_button(button).map(|button_type| RawControllerEvent::ButtonEvent {
                    button_type,
                    button_state: ButtonState::Pressed,
                    timestamp: now,
                })
            }
            EventType::ButtonReleased(button, _) => {
                map_button(button).map(|button_type| RawControllerEvent::ButtonEvent {
                    button_type,
                    button_state: ButtonState::Released,
                    timestamp: now,
                })
            }
            EventType::Disconnected => {
                warn!("Controller disconnected");
                Some(RawControllerEvent::Disconnected { timestamp: now })
            }
            _ => None,
        }
    }
}

/// Owns the collector thread. gilrs is not `Send`, so the collector is built
/// on the thread that polls it.
pub struct CollectorHandle {
    _thread: JoinHandle<()>,
}

impl CollectorHandle {
    pub fn spawn(
        settings: Option<CollectorSettings>,
        event_sender: mpsc::Sender<RawControllerEvent>,
        cancel: CancellationToken,
    ) -> Result<Self, CollectorError> {
        info!("Spawning Event Collector with settings: {:?}", settings);

        let thread = std::thread::Builder::new()
            .name("controller-collector".to_string())
            .spawn(move || {
                let collector = match EventCollector::create(settings, event_sender, cancel) {
                    Ok(c) => c,
                    Err(e) => {
                        error!("Failed to create Event Collector: {}", e);
                        return;
                    }
                };
                let mut collecting = collector.initialize();
                if let Err(e) = collecting.run_collection_loop() {
                    error!("Collector terminated with error: {}", e);
                }
            })
            .map_err(|e| CollectorError::InitializationError(e.to_string()))?;

        Ok(Self { _thread: thread })
    }
}

pub fn map_button(button: Button) -> Option<ButtonType> {
    match button {
        Button::South => Some(ButtonType::A),
        Button::East => Some(ButtonType::B),
        Button::West => Some(ButtonType::X),
        Button::North => Some(ButtonType::Y),
        Button::Start => Some(ButtonType::Start),
        Button::Select => Some(ButtonType::Select),
        Button::LeftTrigger => Some(ButtonType::LeftBumper),
        Button::RightTrigger => Some(ButtonType::RightBumper),
        Button::LeftThumb => Some(ButtonType::LeftStick),
        Button::RightThumb => Some(ButtonType::RightStick),
        Button::DPadUp => Some(ButtonType::DPadUp),
        Button::DPadDown => Some(ButtonType::DPadDown),
        Button::DPadLeft => Some(ButtonType::DPadLeft),
        Button::DPadRight => Some(ButtonType::DPadRight),
        Button::Mode => Some(ButtonType::Guide),
        _ => None,
    }
}

/// Zeroes values inside the deadzone and rescales the rest to the full range.
pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        let sign = if value < 0.0 { -1.0 } else { 1.0 };
        sign * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}
