use super::bindings::BindingsConfig;
use super::Command;
use crate::controller::{ButtonType, ControllerOutput};
use crate::drive::{DriveConfig, DriveTrain};
use std::collections::BTreeMap;
use tokio::sync::watch;
use tracing::{debug, info};

/// Teleop command: turns the latest controller snapshot into drive output
/// and handles the drive toggles.
pub struct DriveCommand {
    input: watch::Receiver<ControllerOutput>,
    bindings: BindingsConfig,
    slow_scaling: f64,
    scaling_step: f64,

    // Press counts already acted on
    seen_presses: BTreeMap<ButtonType, u64>,
    last_pov: Option<u16>,
}

impl DriveCommand {
    pub fn new(
        input: watch::Receiver<ControllerOutput>,
        bindings: BindingsConfig,
        config: &DriveConfig,
    ) -> Self {
        Self {
            input,
            bindings,
            slow_scaling: config.slow_scaling,
            scaling_step: config.scaling_step,
            seen_presses: BTreeMap::new(),
            last_pov: None,
        }
    }

    /// True once per tick if the button was pressed since the last tick,
    /// including presses in snapshots that were overwritten unread.
    fn rising_edge(&self, snapshot: &ControllerOutput, button: ButtonType) -> bool {
        let seen = self.seen_presses.get(&button).copied().unwrap_or(0);
        snapshot.press_count(button) > seen
    }

    fn handle_buttons(&mut self, drive_train: &mut DriveTrain, snapshot: &ControllerOutput) {
        let pressed = |button| self.rising_edge(snapshot, button);

        let toggle_scaling = pressed(self.bindings.toggle_scaling);
        let cycle_mode = pressed(self.bindings.cycle_drive_mode);
        let toggle_squares = pressed(self.bindings.toggle_squares);
        let toggle_quick_turn = pressed(self.bindings.toggle_quick_turn);
        let zero_heading = pressed(self.bindings.zero_heading);

        if toggle_scaling {
            let scaling = if drive_train.drive_scaling() < 1.0 {
                1.0
            } else {
                self.slow_scaling
            };
            drive_train.set_drive_scaling(scaling);
        }
        if cycle_mode {
            drive_train.toggle_drive_mode();
        }
        if toggle_squares {
            drive_train.set_use_squares(!drive_train.use_squares());
        }
        if toggle_quick_turn {
            drive_train.set_quick_turn(!drive_train.quick_turn());
        }
        if zero_heading {
            info!("Zeroing heading");
            drive_train.zero_heading();
        }

        let pov = snapshot.pov();
        if pov != self.last_pov {
            if pov == Some(self.bindings.scaling_up_pov) {
                drive_train.set_drive_scaling(drive_train.drive_scaling() + self.scaling_step);
            } else if pov == Some(self.bindings.scaling_down_pov) {
                drive_train.set_drive_scaling(drive_train.drive_scaling() - self.scaling_step);
            }
            self.last_pov = pov;
        }

        self.seen_presses = snapshot.press_counts.clone();
    }
}

impl Command for DriveCommand {
    type Subsystem = DriveTrain;

    fn initialize(&mut self, drive_train: &mut DriveTrain) {
        debug!("Drive command starting");
        // Presses from before the command started are not acted on.
        self.seen_presses = self.input.borrow().press_counts.clone();
        self.last_pov = None;
        drive_train.full_stop();
    }

    fn execute(&mut self, drive_train: &mut DriveTrain) {
        let snapshot = self.input.borrow_and_update().clone();
        self.handle_buttons(drive_train, &snapshot);
        drive_train.drive(&snapshot);
    }

    fn end(&mut self, drive_train: &mut DriveTrain, interrupted: bool) {
        debug!("Drive command ended (interrupted: {})", interrupted);
        drive_train.full_stop();
    }
}
