use color_eyre::{eyre::eyre, Result};
use opendrive::command::DriveCommand;
use opendrive::controller::{ControllerHandle, ControllerOutput};
use opendrive::drive::DriveTrain;
use opendrive::hardware::build_hardware;
use opendrive::persistence::{config_path, ensure_default_config, load_config};
use opendrive::robot::Robot;
use opendrive::telemetry::{Dashboard, MemoryDashboard, MqttDashboard, TelemetryConfig};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let path = config_path();
    ensure_default_config(&path).await?;
    let config = load_config(&path).await?;

    let cancel = CancellationToken::new();
    let dashboard = setup_dashboard(&config.telemetry, cancel.clone());

    // Without a gamepad the robot still runs, it just never moves.
    let (_controller, input) =
        match ControllerHandle::spawn(Some(config.controller.clone()), cancel.clone()) {
            Ok(handle) => {
                let input = handle.subscribe();
                (Some(handle), input)
            }
            Err(e) => {
                warn!("Controller unavailable, input stays neutral: {}", e);
                let (_tx, rx) = watch::channel(ControllerOutput::default());
                (None, rx)
            }
        };

    let (hardware, plant) = build_hardware(&config.motors, config.drive.track_width_m)
        .map_err(|e| eyre!("Failed to set up drive hardware: {}", e))?;
    let drive_train = DriveTrain::new(hardware, &config.drive, dashboard)
        .map_err(|e| eyre!("Failed to create drivetrain: {}", e))?;
    drive_train.publish_settings();

    let command = DriveCommand::new(input, config.bindings.clone(), &config.drive);
    let mut robot = Robot::new(drive_train, command, plant, config.robot.period());

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        shutdown.cancel();
    });

    robot.run(cancel.clone()).await;
    cancel.cancel();
    info!("Shut down cleanly");
    Ok(())
}

fn setup_dashboard(config: &TelemetryConfig, cancel: CancellationToken) -> Arc<dyn Dashboard> {
    if !config.mqtt_enabled {
        return Arc::new(MemoryDashboard::new());
    }
    match MqttDashboard::connect(config, cancel) {
        Ok(dashboard) => Arc::new(dashboard),
        Err(e) => {
            warn!("MQTT dashboard unavailable, keeping values local: {}", e);
            Arc::new(MemoryDashboard::new())
        }
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
