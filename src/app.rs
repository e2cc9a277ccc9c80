//! Application core
//!
//! Wires the session, upload, capture and overlay components together. The
//! desktop commands are thin wrappers around [`DanceApp`].

use crate::capture::{
    countdown_tick, CameraSource, CaptureComponent, CaptureOptions, CaptureResult, CaptureStatus,
    ClipRegistry,
};
use crate::config::AppConfig;
use crate::overlay::{OverlayController, OverlayState};
use crate::session::{Session, SessionController, Step};
use crate::upload::{UploadClient, UploadStep};
use crate::utils::{AppError, AppResult};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

/// Sources for the side-by-side view of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonSources {
    pub session_id: Uuid,
    pub reference_url: String,
    pub user_url: String,
}

pub struct DanceApp {
    pub config: AppConfig,
    pub clips: Arc<ClipRegistry>,
    pub session: Arc<SessionController>,
    pub upload: Arc<UploadStep>,
    pub capture: Mutex<CaptureComponent>,
    pub capture_status: watch::Receiver<CaptureStatus>,
    pub overlay: Arc<OverlayController>,
}

impl DanceApp {
    pub fn new(config: AppConfig, camera: Arc<dyn CameraSource>) -> Self {
        let clips = Arc::new(ClipRegistry::new());
        let session = Arc::new(SessionController::new(
            clips.clone(),
            config.placeholder_video_url.clone(),
        ));
        let client = UploadClient::new(&config.server_url, config.upload_timeout());
        let upload = Arc::new(UploadStep::new(client, session.clone()));
        let capture = CaptureComponent::new(camera, clips.clone(), CaptureOptions::from_config(&config));
        let capture_status = capture.subscribe();
        let overlay = Arc::new(OverlayController::new(config.idle_hide()));

        Self {
            config,
            clips,
            session,
            upload,
            capture: Mutex::new(capture),
            capture_status,
            overlay,
        }
    }

    /// Count down, then start recording.
    ///
    /// The capture lock is only taken between countdown seconds, so a stop
    /// or release during the countdown cancels it instead of waiting.
    pub async fn start_recording(&self) -> CaptureResult<()> {
        let (token, seconds) = {
            let mut capture = self.capture.lock().await;
            let token = capture.prepare_recording().await?;
            (token, capture.countdown_secs())
        };

        for remaining in (1..=seconds).rev() {
            {
                let capture = self.capture.lock().await;
                if token.is_cancelled() {
                    break;
                }
                capture.show_countdown(remaining);
            }
            if !countdown_tick(&token).await {
                break;
            }
        }

        self.capture.lock().await.begin_recording(&token)
    }

    /// Hand the recorded clip to the session and release the camera.
    pub async fn accept_recording(&self) -> AppResult<String> {
        let mut capture = self.capture.lock().await;
        let url = capture
            .accept()
            .ok_or_else(|| AppError::NotReady("Nothing has been recorded yet".to_string()))?;

        if let Err(e) = self.session.on_user_video_recorded(url.clone()) {
            // Session did not take ownership.
            self.clips.revoke(&url);
            return Err(e.into());
        }
        capture.release();
        Ok(url)
    }

    /// What the compare view should load, given the session whose sources
    /// are already loaded. `Ok(None)` means the loaded sources are current.
    pub fn comparison_to_load(&self, loaded: Option<Uuid>) -> AppResult<Option<ComparisonSources>> {
        let session = self.session.snapshot();
        let (Step::Compare, Some(reference_url), Some(user_url)) =
            (session.step, session.reference_video, session.user_video)
        else {
            return Err(AppError::NotReady("Both videos are needed to compare".to_string()));
        };
        if loaded == Some(session.id) {
            return Ok(None);
        }
        Ok(Some(ComparisonSources {
            session_id: session.id,
            reference_url,
            user_url,
        }))
    }

    /// The window reported its fullscreen flag, after a resize or an Escape.
    /// Only a real change reaches the overlay.
    pub fn window_fullscreen_changed(&self, is_fullscreen: bool) -> OverlayState {
        if self.overlay.state().is_fullscreen != is_fullscreen {
            self.overlay.on_fullscreen_change(is_fullscreen);
        }
        self.overlay.state()
    }

    /// "End" / "New Session": tear everything down and start over.
    pub async fn end_session(&self) -> Session {
        self.overlay.set_playing(false);
        self.overlay.exit_fullscreen();
        self.upload.reset();
        self.capture.lock().await.release();
        self.session.reset();
        tracing::info!("Session ended");
        self.session.snapshot()
    }
}
