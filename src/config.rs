//! Configuration management for sorastream
//!
//! Config is stored at ~/.config/sorastream/config.toml. Every field is
//! optional in the file; missing fields take their defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::appearance::SubtitleStyle;
use crate::session::{EngineSettings, DEFAULT_SKIP_SECONDS, DEFAULT_TICK_INTERVAL};

/// Environment variable overriding the progress data directory
pub const DATA_DIR_ENV: &str = "SORASTREAM_DATA_DIR";


/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hide the watch-next prompt a few seconds after it appears
    pub auto_hide_watch_next: bool,
    /// Show the watch-next prompt at all
    pub show_watch_next: bool,
    /// Periodic tick interval in milliseconds
    pub tick_interval_ms: u64,
    /// Step for skip forward/back, in seconds
    pub skip_seconds: f64,
    /// Reapply the rate saved with the resume record
    pub restore_rate: bool,
    /// Where progress records live (defaults to the platform data dir)
    pub data_dir: Option<PathBuf>,
    pub subtitle_style: SubtitleStyle,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_hide_watch_next: false,
            show_watch_next: true,
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
            skip_seconds: DEFAULT_SKIP_SECONDS,
            restore_rate: true,
            data_dir: None,
            subtitle_style: SubtitleStyle::default(),
        }
    }
}

impl Config {
    /// Get config file path (~/.config/sorastream/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sorastream").join("config.toml"))
    }

    /// Load config from the default path, or defaults if there is none.
    ///
    /// A file that exists but fails to parse is an error.
    pub fn load() -> Result<Self> {
        match Self::path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load config from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            anyhow::bail!("tick_interval_ms must be greater than 0");
        }
        if !self.skip_seconds.is_finite() || self.skip_seconds <= 0.0 {
            anyhow::bail!("skip_seconds must be a positive number");
        }
        Ok(())
    }

    /// Progress directory with fallback chain:
    /// 1. Environment variable SORASTREAM_DATA_DIR
    /// 2. `data_dir` from the config file
    /// 3. Platform data dir (~/.local/share/sorastream/progress)
    pub fn data_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(dir));
        }
        if let Some(ref dir) = self.data_dir {
            return Some(dir.clone());
        }
        crate::persist::FileStore::default_dir()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            show_watch_next: self.show_watch_next,
            auto_hide_watch_next: self.auto_hide_watch_next,
            skip_seconds: self.skip_seconds,
            restore_rate: self.restore_rate,
        }
    }
}
