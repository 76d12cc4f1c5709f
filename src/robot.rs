//! Main robot loop.
//!
//! Every period the loop advances the simulated plant (when there is one),
//! runs the active command, then lets the drivetrain do its periodic work
//! and publish telemetry.

use crate::command::Command;
use crate::drive::{DriveTrain, SimPlant};
use chrono::Local;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct Robot<C: Command<Subsystem = DriveTrain>> {
    drive_train: DriveTrain,
    command: C,
    plant: Option<SimPlant>,
    period: Duration,
    last_tick: Option<Instant>,
    overruns: u64,
}

impl<C: Command<Subsystem = DriveTrain>> Robot<C> {
    pub fn new(drive_train: DriveTrain, command: C, plant: Option<SimPlant>, period: Duration) -> Self {
        Self {
            drive_train,
            command,
            plant,
            period,
            last_tick: None,
            overruns: 0,
        }
    }

    pub fn drive_train(&self) -> &DriveTrain {
        &self.drive_train
    }

    pub fn drive_train_mut(&mut self) -> &mut DriveTrain {
        &mut self.drive_train
    }

    pub fn start(&mut self) {
        info!("Robot starting with {:?} loop period", self.period);
        self.last_tick = None;
        self.command.initialize(&mut self.drive_train);
    }

    /// Runs one loop iteration. Returns true once the command has finished.
    pub fn tick(&mut self, now: Instant) -> bool {
        let elapsed = self
            .last_tick
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(self.period);
        self.last_tick = Some(now);

        if let Some(plant) = self.plant.as_mut() {
            plant.step(elapsed);
        }

        self.command.execute(&mut self.drive_train);
        self.drive_train.periodic(now);
        self.drive_train.log_periodic();

        self.command.is_finished()
    }

    /// Ends the command and disables the drive.
    pub fn stop(&mut self, interrupted: bool) {
        self.command.end(&mut self.drive_train, interrupted);
        self.drive_train.enable_drive_train(false);
        info!("Robot stopped");
    }

    pub async fn run(&mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut ticks: u64 = 0;
        let mut last_stats_time = Local::now();
        let stats_interval = chrono::Duration::seconds(30);

        self.start();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.stop(true);
                    return;
                }
                _ = interval.tick() => {}
            }

            let started = Instant::now();
            if self.tick(started) {
                info!("Command finished");
                self.stop(false);
                return;
            }
            ticks += 1;

            let took = started.elapsed();
            if took > self.period {
                self.overruns += 1;
                warn!("Loop overrun: {:?} > {:?}", took, self.period);
            }

            let now = Local::now();
            if now - last_stats_time > stats_interval {
                let pose = self.drive_train.current_pose();
                debug!(
                    "Robot stats: {} ticks, {} overruns, pose ({:.2}, {:.2}) {}",
                    ticks,
                    self.overruns,
                    pose.x(),
                    pose.y(),
                    pose.rotation
                );
                ticks = 0;
                last_stats_time = now;
            }
        }
    }
}
