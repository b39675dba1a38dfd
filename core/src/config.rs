use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;

use crate::error::{PlayerError, Result};
use crate::source::{DEFAULT_URL, MediaType};

/// Player configuration
///
/// Missing fields fall back to the defaults below, so a config file only
/// needs to name the settings it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// URL pre-filled in the input field
    pub default_url: String,
    /// Media type pre-selected in the selector
    pub default_media_type: MediaType,
    /// Progress poller period in milliseconds
    pub poll_interval_ms: u64,
    /// Playback widget width in pixels
    pub widget_width: u32,
    /// Playback widget height in pixels
    pub widget_height: u32,
    /// Whole-request timeout for downloads (None = no timeout)
    pub request_timeout_secs: Option<u64>,
    /// User-Agent sent with downloads
    pub user_agent: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_url: DEFAULT_URL.to_string(),
            default_media_type: MediaType::Mp4,
            poll_interval_ms: 1000,
            widget_width: 320,
            widget_height: 240,
            request_timeout_secs: Some(60),
            user_agent: concat!("blobplay/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl PlayerConfig {
    /// Location of the per-user config file, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("blobplay").join("config.json"))
    }

    /// Parse a JSON config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| PlayerError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load an explicit file, or the per-user file when it exists, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(path),
            _ => {
                debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values the player cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(PlayerError::Config("poll_interval_ms must be greater than 0".into()));
        }
        if self.widget_width == 0 || self.widget_height == 0 {
            return Err(PlayerError::Config(format!(
                "widget size must be non-zero, got {}x{}",
                self.widget_width, self.widget_height
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
