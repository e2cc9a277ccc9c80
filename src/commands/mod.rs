//! Tauri command handlers
//!
//! IPC commands the webview front end invokes, plus the shared state they
//! operate on.

pub mod capture;
pub mod overlay;
pub mod playback;
pub mod session;

use crate::app::DanceApp;
use crate::capture::CameraSource;
use crate::config::AppConfig;
use playback::PlaybackBinding;
use std::ops::Deref;
use std::sync::Arc;

/// Everything the commands share
pub struct DanceState {
    pub app: DanceApp,
    /// Present while the compare step is loaded
    pub playback: parking_lot::Mutex<Option<PlaybackBinding>>,
}

impl DanceState {
    pub fn new(config: AppConfig, camera: Arc<dyn CameraSource>) -> Self {
        Self {
            app: DanceApp::new(config, camera),
            playback: parking_lot::Mutex::new(None),
        }
    }
}

impl Deref for DanceState {
    type Target = DanceApp;

    fn deref(&self) -> &DanceApp {
        &self.app
    }
}
