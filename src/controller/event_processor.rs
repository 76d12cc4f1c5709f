use chrono::{DateTime, Local};
use statum::{machine, state};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::controller::event_collector::{
    ButtonState, ButtonType, JoystickType, RawControllerEvent, TriggerType,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonEventState {
    /// Still down at the end of the cycle
    Held,
    /// Released during the cycle
    Complete,
}

/// Snapshot of the gamepad, published once per processing cycle.
#[derive(Clone, Debug)]
pub struct ControllerOutput {
    pub left_stick: JoystickPosition,
    pub right_stick: JoystickPosition,
    pub left_trigger: TriggerValue,
    pub right_trigger: TriggerValue,

    /// Buttons down at the end of the cycle.
    pub buttons_down: BTreeSet<ButtonType>,
    /// Presses and releases seen during the cycle, plus every held button.
    pub button_events: Vec<ButtonEvent>,
    /// Presses per button since the processor started. Never reset, so a
    /// reader that skips snapshots can still tell that a press happened.
    pub press_counts: BTreeMap<ButtonType, u64>,

    pub connected: bool,
    /// Incremented on every published snapshot.
    pub sequence: u64,
    pub timestamp: DateTime<Local>,
}

impl Default for ControllerOutput {
    fn default() -> Self {
        Self {
            left_stick: Default::default(),
            right_stick: Default::default(),
            left_trigger: Default::default(),
            right_trigger: Default::default(),
            buttons_down: BTreeSet::new(),
            button_events: Vec::new(),
            press_counts: BTreeMap::new(),
            connected: true,
            sequence: 0,
            timestamp: Local::now(),
        }
    }
}

impl ControllerOutput {
    pub fn is_down(&self, button: ButtonType) -> bool {
        self.buttons_down.contains(&button)
    }

    /// True if the button went down during this cycle, even if it was
    /// already released again.
    pub fn pressed_this_cycle(&self, button: ButtonType) -> bool {
        self.button_events
            .iter()
            .any(|e| e.button == button && e.new_press)
    }

    pub fn press_count(&self, button: ButtonType) -> u64 {
        self.press_counts.get(&button).copied().unwrap_or(0)
    }

    /// D-pad as an angle in degrees, clockwise from up in 45 degree steps.
    /// `None` when nothing (or only opposing directions) is held.
    pub fn pov(&self) -> Option<u16> {
        let axis = |pos: ButtonType, neg: ButtonType| {
            self.is_down(pos) as i8 - self.is_down(neg) as i8
        };
        let vertical = axis(ButtonType::DPadUp, ButtonType::DPadDown);
        let horizontal = axis(ButtonType::DPadRight, ButtonType::DPadLeft);
        match (vertical, horizontal) {
            (1, 0) => Some(0),
            (1, 1) => Some(45),
            (0, 1) => Some(90),
            (-1, 1) => Some(135),
            (-1, 0) => Some(180),
            (-1, -1) => Some(225),
            (0, -1) => Some(270),
            (1, -1) => Some(315),
            _ => None,
        }
    }
}

// Joystick position with min/max over the cycle and delta to the last one
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JoystickPosition {
    pub x: f32,
    pub y: f32,
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
    pub delta_x: f32,
    pub delta_y: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TriggerValue {
    pub value: f32,
    pub min: f32,
    pub max: f32,
    pub delta: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ButtonEvent {
    pub button: ButtonType,
    pub duration_ms: f64,
    pub state: ButtonEventState,
    /// The press that started this event happened in this cycle.
    pub new_press: bool,
}

#[derive(Debug, Clone)]
pub struct EventBatch {
    pub events: Vec<RawControllerEvent>,
}

#[derive(Clone, Debug)]
pub struct ProcessorSettings {
    pub processing_interval_ms: u64,
    /// Press/release pairs shorter than this inside one cycle are treated
    /// as contact bounce.
    pub button_press_threshold_ms: u32,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            processing_interval_ms: 20,
            button_press_threshold_ms: 10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("Failed to receive events: {0}")]
    EventReceiveError(String),

    #[error("Failed to update state: {0}")]
    StateUpdateError(String),
}

#[state]
#[derive(Debug, Clone)]
pub enum ProcessingState {
    Waiting,
    Processing(EventBatch),
    Updating,
}

#[machine]
#[derive(Debug)]
pub struct EventProcessor<S: ProcessingState> {
    event_receiver: mpsc::Receiver<RawControllerEvent>,
    settings: ProcessorSettings,
    output: ControllerOutput,
    state_sender: watch::Sender<ControllerOutput>,

    // Press time of every button currently down
    held_since: HashMap<ButtonType, DateTime<Local>>,
    channel_closed: bool,
}

impl<S: ProcessingState> EventProcessor<S> {
    pub fn subscribe(&self) -> watch::Receiver<ControllerOutput> {
        self.state_sender.subscribe()
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// The collector dropped its sender.
    pub fn is_channel_closed(&self) -> bool {
        self.channel_closed
    }
}

impl EventProcessor<Waiting> {
    pub fn create(
        event_receiver: mpsc::Receiver<RawControllerEvent>,
        settings: Option<ProcessorSettings>,
    ) -> Self {
        let settings = settings.unwrap_or_default();
        info!("Creating Event Processor with settings: {:?}", settings);

        let output = ControllerOutput::default();
        let (state_sender, _) = watch::channel(output.clone());

        Self::new(
            event_receiver,
            settings,
            output,
            state_sender,
            HashMap::new(),
            false,
        )
    }

    /// Drains the queue without waiting.
    pub async fn wait_and_collect(mut self) -> EventProcessor<Processing> {
        let mut events = Vec::new();
        loop {
            match self.event_receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if !self.channel_closed {
                        error!("Event channel disconnected, releasing all inputs");
                        events.push(RawControllerEvent::Disconnected {
                            timestamp: Local::now(),
                        });
                        self.channel_closed = true;
                    }
                    break;
                }
            }
        }

        if !events.is_empty() {
            debug!("Collected batch of {} events for processing", events.len());
        }
        self.transition_with(EventBatch { events })
    }
}

impl EventProcessor<Processing> {
    pub fn process_events(self) -> EventProcessor<Updating> {
        self.process_events_at(Local::now())
    }

    /// Folds the batch into the output; `now` is used for held durations.
    pub fn process_events_at(mut self, now: DateTime<Local>) -> EventProcessor<Updating> {
        let raw_events = match self.get_state_data() {
            Some(batch) => batch.events.clone(),
            None => {
                warn!("No event batch found in state data");
                Vec::new()
            }
        };

        let previous = self.output.clone();
        let mut left_samples = Vec::new();
        let mut right_samples = Vec::new();
        let mut left_trigger_samples = Vec::new();
        let mut right_trigger_samples = Vec::new();
        let mut new_presses: HashSet<ButtonType> = HashSet::new();
        let mut completed = Vec::new();

        for event in &raw_events {
            match event {
                RawControllerEvent::JoystickMove { stick, x, y, .. } => match stick {
                    JoystickType::Left => left_samples.push((*x, *y)),
                    JoystickType::Right => right_samples.push((*x, *y)),
                },
                RawControllerEvent::TriggerMove { trigger, value, .. } => match trigger {
                    TriggerType::Left => left_trigger_samples.push(*value),
                    TriggerType::Right => right_trigger_samples.push(*value),
                },
                RawControllerEvent::ButtonEvent {
                    button_type,
                    button_state: ButtonState::Pressed,
                    timestamp,
                } => {
                    self.output.connected = true;
                    if !self.held_since.contains_key(button_type) {
                        self.held_since.insert(*button_type, *timestamp);
                        new_presses.insert(*button_type);
                    }
                }
                RawControllerEvent::ButtonEvent {
                    button_type,
                    button_state: ButtonState::Released,
                    timestamp,
                } => match self.held_since.remove(button_type) {
                    Some(pressed_at) => {
                        let duration_ms = (*timestamp - pressed_at).num_milliseconds() as f64;
                        let new_press = new_presses.contains(button_type);
                        if new_press
                            && duration_ms < self.settings.button_press_threshold_ms as f64
                        {
                            debug!("Ignoring {:?} bounce of {}ms", button_type, duration_ms);
                            new_presses.remove(button_type);
                            continue;
                        }
                        completed.push(ButtonEvent {
                            button: *button_type,
                            duration_ms,
                            state: ButtonEventState::Complete,
                            new_press,
                        });
                    }
                    None => debug!("Release of {:?} without a press", button_type),
                },
                RawControllerEvent::Disconnected { .. } => {
                    warn!("Controller disconnected, neutralising output");
                    left_samples.clear();
                    right_samples.clear();
                    left_trigger_samples.clear();
                    right_trigger_samples.clear();
                    new_presses.clear();
                    completed.clear();
                    self.held_since.clear();
                    self.output.left_stick = JoystickPosition::default();
                    self.output.right_stick = JoystickPosition::default();
                    self.output.left_trigger = TriggerValue::default();
                    self.output.right_trigger = TriggerValue::default();
                    self.output.connected = false;
                }
            }
        }

        if !left_samples.is_empty() {
            self.output.left_stick = fold_stick(&self.output.left_stick, &left_samples);
            self.output.connected = true;
        }
        if !right_samples.is_empty() {
            self.output.right_stick = fold_stick(&self.output.right_stick, &right_samples);
            self.output.connected = true;
        }
        if !left_trigger_samples.is_empty() {
            self.output.left_trigger = fold_trigger(&self.output.left_trigger, &left_trigger_samples);
        }
        if !right_trigger_samples.is_empty() {
            self.output.right_trigger =
                fold_trigger(&self.output.right_trigger, &right_trigger_samples);
        }

        // Deltas are relative to the previous snapshot, including any reset
        // done by a disconnect in this batch.
        if left_samples.is_empty() {
            self.output.left_stick.delta_x = self.output.left_stick.x - previous.left_stick.x;
            self.output.left_stick.delta_y = self.output.left_stick.y - previous.left_stick.y;
        }
        if right_samples.is_empty() {
            self.output.right_stick.delta_x = self.output.right_stick.x - previous.right_stick.x;
            self.output.right_stick.delta_y = self.output.right_stick.y - previous.right_stick.y;
        }

        let mut button_events = completed;
        for (button, pressed_at) in &self.held_since {
            button_events.push(ButtonEvent {
                button: *button,
                duration_ms: (now - *pressed_at).num_milliseconds() as f64,
                state: ButtonEventState::Held,
                new_press: new_presses.contains(button),
            });
        }
        button_events.sort_by_key(|e| e.button);
        self.output.button_events = button_events;
        self.output.buttons_down = self.held_since.keys().copied().collect();
        self.output.timestamp = now;

        for button in &new_presses {
            *self.output.press_counts.entry(*button).or_insert(0) += 1;
        }
        for event in self.output.button_events.iter().filter(|e| e.new_press) {
            debug!("Button {:?} pressed ({:?})", event.button, event.state);
        }

        self.transition()
    }
}

fn fold_stick(current: &JoystickPosition, samples: &[(f32, f32)]) -> JoystickPosition {
    let (x, y) = samples.last().copied().unwrap_or((current.x, current.y));
    let xs = samples.iter().map(|s| s.0).chain(std::iter::once(current.x));
    let ys = samples.iter().map(|s| s.1).chain(std::iter::once(current.y));
    JoystickPosition {
        x,
        y,
        x_min: xs.clone().fold(f32::MAX, f32::min),
        x_max: xs.fold(f32::MIN, f32::max),
        y_min: ys.clone().fold(f32::MAX, f32::min),
        y_max: ys.fold(f32::MIN, f32::max),
        delta_x: x - current.x,
        delta_y: y - current.y,
    }
}

fn fold_trigger(current: &TriggerValue, samples: &[f32]) -> TriggerValue {
    let value = samples.last().copied().unwrap_or(current.value);
    let all = samples.iter().copied().chain(std::iter::once(current.value));
    TriggerValue {
        value,
        min: all.clone().fold(f32::MAX, f32::min),
        max: all.fold(f32::MIN, f32::max),
        delta: value - current.value,
    }
}

impl EventProcessor<Updating> {
    /// Publishes the snapshot and goes back to waiting.
    pub fn update_state(mut self) -> Result<EventProcessor<Waiting>, ProcessorError> {
        self.output.sequence += 1;
        // Stored even with no subscriber.
        self.state_sender.send_replace(self.output.clone());
        debug!(
            "L:({:.2},{:.2}) R:({:.2},{:.2}) LT:{:.2} RT:{:.2} Buttons:{:?}",
            self.output.left_stick.x,
            self.output.left_stick.y,
            self.output.right_stick.x,
            self.output.right_stick.y,
            self.output.left_trigger.value,
            self.output.right_trigger.value,
            self.output.buttons_down
        );
        Ok(self.transition())
    }
}

pub struct ProcessorHandle {
    state_receiver: watch::Receiver<ControllerOutput>,
    _task: JoinHandle<Result<(), ProcessorError>>,
}

impl ProcessorHandle {
    pub fn spawn(
        event_receiver: mpsc::Receiver<RawControllerEvent>,
        settings: Option<ProcessorSettings>,
        cancel: CancellationToken,
    ) -> Self {
        let processor = EventProcessor::create(event_receiver, settings);
        let state_receiver = processor.subscribe();

        info!("Spawning Event Processor task");
        let task = tokio::spawn(async move {
            let result = run_processor_loop(processor, cancel).await;
            if let Err(e) = &result {
                error!("Processor task terminated with error: {}", e);
            }
            result
        });

        Self {
            state_receiver,
            _task: task,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerOutput> {
        self.state_receiver.clone()
    }
}

async fn run_processor_loop(
    mut processor: EventProcessor<Waiting>,
    cancel: CancellationToken,
) -> Result<(), ProcessorError> {
    let interval_ms = processor.settings().processing_interval_ms;
    info!("Starting processor loop with {}ms interval", interval_ms);

    let mut interval_timer = tokio::time::interval(std::time::Duration::from_millis(interval_ms));
    interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut cycles: u64 = 0;
    let mut total_events = 0;
    let mut last_stats_time = Local::now();
    let stats_interval = chrono::Duration::seconds(30);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Event Processor stopped");
                return Ok(());
            }
            _ = interval_timer.tick() => {}
        }

        let processing = processor.wait_and_collect().await;
        total_events += processing
            .get_state_data()
            .map(|batch| batch.events.len())
            .unwrap_or(0);
        processor = processing.process_events().update_state()?;
        cycles += 1;

        if processor.is_channel_closed() {
            return Err(ProcessorError::EventReceiveError(
                "Event channel disconnected".to_string(),
            ));
        }

        let now = Local::now();
        if now - last_stats_time > stats_interval {
            let elapsed_seconds = (now - last_stats_time).num_seconds().max(1);
            debug!(
                "Processor stats: {} cycles, {} events in {} seconds ({:.2} events/sec)",
                cycles,
                total_events,
                elapsed_seconds,
                total_events as f64 / elapsed_seconds as f64
            );
            cycles = 0;
            total_events = 0;
            last_stats_time = now;
        }
    }
}
