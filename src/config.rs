use anyhow::{anyhow, Result};
use log::{info, warn, LevelFilter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

static CONFIG_DIR_OVERRIDE: OnceCell<PathBuf> = OnceCell::new();

/// Use `dir` instead of the platform config directory. Only the first call wins.
pub fn set_config_dir_override(dir: PathBuf) {
    if CONFIG_DIR_OVERRIDE.set(dir).is_err() {
        warn!("Config directory override already set, ignoring");
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = match CONFIG_DIR_OVERRIDE.get() {
        Some(dir) => dir.clone(),
        None => dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?
            .join("lounge-chat"),
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Log file name, relative to the config directory unless absolute
    pub log_file: PathBuf,
    pub log_level: String,
    /// How long a notification stays on screen
    pub toast_seconds: i64,
    /// Load the demo conversation history for the first contact
    pub seed_demo_history: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_file: PathBuf::from("lounge-chat.log"),
            log_level: "debug".to_string(),
            toast_seconds: 3,
            seed_demo_history: true,
        }
    }
}

impl AppConfig {
    pub fn log_level(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Debug)
    }

    pub fn log_path(&self, config_dir: &Path) -> PathBuf {
        if self.log_file.is_absolute() {
            self.log_file.clone()
        } else {
            config_dir.join(&self.log_file)
        }
    }
}

/// Load `config.json` from `dir`, writing the defaults there on first run
pub fn load_or_init(dir: &Path) -> Result<AppConfig> {
    let path = dir.join("config.json");

    if !path.exists() {
        let config = AppConfig::default();
        let file = File::create(&path)?;
        serde_json::to_writer_pretty(file, &config)?;
        info!("Wrote default config to {}", path.display());
        return Ok(config);
    }

    let contents = fs::read_to_string(&path)?;
    let config: AppConfig = serde_json::from_str(&contents)?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_run_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_init(dir.path()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(dir.path().join("config.json").exists());

        let again = load_or_init(dir.path()).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{ "toast_seconds": 8, "log_level": "warn" }"#,
        )
        .unwrap();

        let config = load_or_init(dir.path()).unwrap();
        assert_eq!(config.toast_seconds, 8);
        assert_eq!(config.log_level(), LevelFilter::Warn);
        assert!(config.seed_demo_history);
        assert_eq!(
            config.log_path(dir.path()),
            dir.path().join("lounge-chat.log")
        );
    }

    #[test]
    fn test_unknown_log_level_falls_back() {
        let config = AppConfig {
            log_level: "chatty".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.log_level(), LevelFilter::Debug);
    }
}
