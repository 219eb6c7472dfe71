//! Configuration management

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid config in {path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
}

/// Playback behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Start playing as soon as a source is ready
    pub autoplay: bool,
    /// Seconds moved by the arrow keys and double taps
    pub seek_step: f64,
    pub double_tap_window_ms: u64,
    /// Controls hide after this long without input while playing
    pub inactivity_timeout_ms: u64,
    pub initial_volume: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            autoplay: false,
            seek_step: 10.0,
            double_tap_window_ms: 300,
            inactivity_timeout_ms: 3000,
            initial_volume: 1.0,
        }
    }
}

impl PlayerConfig {
    pub fn double_tap_window(&self) -> Duration {
        Duration::from_millis(self.double_tap_window_ms)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub player: PlayerConfig,
    pub catalog_path: PathBuf,
    pub log_path: PathBuf,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            player: PlayerConfig::default(),
            catalog_path: data_dir.join("catalog.json"),
            log_path: data_dir.join("cinevault.log"),
            request_timeout_secs: 30,
            user_agent: format!("cinevault/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "cinevault")
}

/// Per-user data directory, or the working directory when there is no home
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

impl AppConfig {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        project_dirs()
            .map(|dirs| dirs.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("cinevault.json"))
    }

    /// Load from `path`. A missing file yields the defaults; a broken one is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Io { path: path.to_path_buf(), source }),
        };

        let mut config: AppConfig = serde_json::from_str(&content)
            .map_err(|source| ConfigError::Json { path: path.to_path_buf(), source })?;
        config.player.initial_volume = config.player.initial_volume.clamp(0.0, 1.0);
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io { path: path.to_path_buf(), source };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|source| ConfigError::Json { path: path.to_path_buf(), source })?;
        fs::write(path, content).map_err(io_err)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
