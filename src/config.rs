//! Application configuration
//!
//! Every field has a default, so an empty or partial `config.json` is valid.

use crate::utils::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default address of the pose-processing server.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

/// Stand-in clip used by the "skip (demo only)" buttons.
pub const PLACEHOLDER_VIDEO_URL: &str = "/placeholder.svg?height=720&width=1280";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Base URL of the upload / compare-feed server
    pub server_url: String,

    /// Upload request timeout in seconds
    pub upload_timeout_secs: u64,

    /// Playback time display polling interval
    pub tick_interval_ms: u64,

    /// Idle time before fullscreen controls hide (only while playing)
    pub idle_hide_ms: u64,

    /// Countdown before recording starts, in seconds (0 disables)
    pub countdown_secs: u64,

    /// Simulated analysis time before feedback is shown
    pub analysis_delay_ms: u64,

    /// Maximum tolerated offset between the two players while playing.
    /// `None` disables drift correction.
    pub drift_tolerance_secs: Option<f64>,

    /// Clip used when a step is skipped
    pub placeholder_video_url: String,

    /// Camera settings
    pub capture: CaptureConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            upload_timeout_secs: 300,
            tick_interval_ms: 250,
            idle_hide_ms: 3000,
            countdown_secs: 3,
            analysis_delay_ms: 2000,
            drift_tolerance_secs: Some(0.25),
            placeholder_video_url: PLACEHOLDER_VIDEO_URL.to_string(),
            capture: CaptureConfig::default(),
        }
    }
}

/// Camera capture settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// Camera device ID (None = first camera)
    pub device_id: Option<String>,

    pub width: u32,

    pub height: u32,

    pub fps: u32,

    /// Request a microphone track alongside video
    pub audio: bool,

    /// Acquire the camera automatically when recording is requested
    pub auto_acquire: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            width: 640,
            height: 480,
            fps: 30,
            audio: false,
            auto_acquire: true,
        }
    }
}

impl AppConfig {
    /// Parse configuration from a JSON string
    pub fn from_json_str(json: &str) -> AppResult<Self> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "serverUrl must be an http(s) URL, got '{}'",
                self.server_url
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(AppError::Config("tickIntervalMs must be positive".to_string()));
        }
        if let Some(tolerance) = self.drift_tolerance_secs {
            if !(tolerance > 0.0) {
                return Err(AppError::Config(
                    "driftToleranceSecs must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn idle_hide(&self) -> Duration {
        Duration::from_millis(self.idle_hide_ms)
    }

    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_secs)
    }

    pub fn analysis_delay(&self) -> Duration {
        Duration::from_millis(self.analysis_delay_ms)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}
