use super::RobotConfig;
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/opendrive";
const CONFIG_FILE: &str = "robot.toml";
/// Environment variable that points at an alternative config file.
pub const CONFIG_ENV: &str = "OPENDRIVE_CONFIG";

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}

/// `$OPENDRIVE_CONFIG` if set, otherwise `~/.config/opendrive/robot.toml`.
pub fn config_path() -> PathBuf {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => {
            let mut path = get_home_dir();
            path.push(CONFIG_DIR);
            path.push(CONFIG_FILE);
            path
        }
    }
}

/// Writes the default configuration if nothing exists at `path`.
pub async fn ensure_default_config(path: &Path) -> Result<()> {
    if tokio::fs::try_exists(path)
        .await
        .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
    {
        debug!("Using existing config at {:?}", path);
        return Ok(());
    }
    info!("No config found, writing defaults to {:?}", path);
    save_config(path, &RobotConfig::default()).await
}

pub async fn load_config(path: &Path) -> Result<RobotConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| eyre!("Failed to read config file {:?}: {}", path, e))?;
    let config: RobotConfig = toml::from_str(&content)
        .map_err(|e| eyre!("Failed to parse config file {:?}: {}", path, e))?;
    config
        .validate()
        .map_err(|e| eyre!("Config file {:?} is invalid: {}", path, e))?;
    info!("Loaded config from {:?}", path);
    Ok(config)
}

pub async fn save_config(path: &Path, config: &RobotConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| eyre!("Failed to serialize config: {}", e))?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| eyre!("Failed to write config file: {}", e))?;
    Ok(())
}
