//! Side-by-side playback
//!
//! The two `<video>` elements live in the webview. [`WebviewElement`] drives
//! one of them through `media-command` events and mirrors the position the
//! front end reports back through [`report_media_status`].

use super::DanceState;
use crate::app::ComparisonSources;
use crate::playback::{DualPlaybackSync, MediaElement, PlaybackResult, PlaybackState};
use crate::utils::{AppError, ErrorResponse, ScheduledTask};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tauri::{AppHandle, Emitter, State};
use uuid::Uuid;

pub const REFERENCE: &str = "reference";
pub const USER: &str = "user";

/// Instruction for one `<video>` element
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MediaCommand {
    Load { url: String },
    Play,
    Pause,
    Seek { time: f64 },
    Volume { volume: f64 },
    Muted { muted: bool },
}

#[derive(Debug, Clone, Serialize)]
struct MediaCommandEvent {
    target: String,
    #[serde(flatten)]
    command: MediaCommand,
}

/// Position reported by the front end on `timeupdate` / `loadedmetadata`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStatus {
    pub current_time: f64,
    pub duration: f64,
}

pub struct WebviewElement {
    label: String,
    app: AppHandle,
    status: Mutex<MediaStatus>,
}

impl WebviewElement {
    pub fn new(label: &str, app: AppHandle) -> Self {
        Self {
            label: label.to_string(),
            app,
            status: Mutex::new(MediaStatus {
                current_time: 0.0,
                duration: f64::NAN,
            }),
        }
    }

    fn send(&self, command: MediaCommand) {
        let event = MediaCommandEvent {
            target: self.label.clone(),
            command,
        };
        if let Err(e) = self.app.emit("media-command", event) {
            tracing::warn!("Failed to emit media-command to {}: {}", self.label, e);
        }
    }

    pub fn update_status(&self, status: MediaStatus) {
        *self.status.lock() = status;
    }
}

#[async_trait]
impl MediaElement for WebviewElement {
    fn label(&self) -> &str {
        &self.label
    }

    fn set_source(&self, url: &str) {
        *self.status.lock() = MediaStatus {
            current_time: 0.0,
            duration: f64::NAN,
        };
        self.send(MediaCommand::Load {
            url: url.to_string(),
        });
    }

    /// Refusals arrive later through [`report_play_rejected`].
    async fn play(&self) -> PlaybackResult<()> {
        self.send(MediaCommand::Play);
        Ok(())
    }

    fn pause(&self) {
        self.send(MediaCommand::Pause);
    }

    fn current_time(&self) -> f64 {
        self.status.lock().current_time
    }

    fn set_current_time(&self, seconds: f64) {
        self.status.lock().current_time = seconds;
        self.send(MediaCommand::Seek { time: seconds });
    }

    fn duration(&self) -> f64 {
        self.status.lock().duration
    }

    fn set_volume(&self, volume: f64) {
        self.send(MediaCommand::Volume { volume });
    }

    fn set_muted(&self, muted: bool) {
        self.send(MediaCommand::Muted { muted });
    }
}

/// Playback wiring for one loaded comparison
pub struct PlaybackBinding {
    /// Session whose videos are loaded
    pub session_id: Uuid,
    pub sync: Arc<DualPlaybackSync>,
    reference: Arc<WebviewElement>,
    user: Arc<WebviewElement>,
    _ticker: ScheduledTask,
}

impl PlaybackBinding {
    fn element(&self, target: &str) -> Option<&Arc<WebviewElement>> {
        match target {
            REFERENCE => Some(&self.reference),
            USER => Some(&self.user),
            _ => None,
        }
    }
}

fn current_sync(state: &DanceState) -> Result<Arc<DualPlaybackSync>, ErrorResponse> {
    state
        .playback
        .lock()
        .as_ref()
        .map(|binding| binding.sync.clone())
        .ok_or_else(|| AppError::NotReady("No comparison loaded".to_string()).into())
}

/// Point both panes at the session's videos and start polling. A no-op
/// when this session's videos are already loaded.
#[tauri::command]
pub async fn load_comparison(
    app: AppHandle,
    state: State<'_, DanceState>,
) -> Result<PlaybackState, ErrorResponse> {
    let loaded = state.playback.lock().as_ref().map(|binding| binding.session_id);
    let Some(ComparisonSources {
        session_id,
        reference_url,
        user_url,
    }) = state.app.comparison_to_load(loaded)?
    else {
        return Ok(current_sync(&state)?.state());
    };

    let reference = Arc::new(WebviewElement::new(REFERENCE, app.clone()));
    let user = Arc::new(WebviewElement::new(USER, app.clone()));
    let sync = Arc::new(DualPlaybackSync::new(
        reference.clone(),
        user.clone(),
        state.config.drift_tolerance_secs,
    ));
    sync.load(&reference_url, &user_url);
    let ticker = sync.start_ticker(state.config.tick_interval());

    // Forward snapshots until the binding is dropped.
    let mut rx = sync.subscribe();
    let overlay = state.overlay.clone();
    tauri::async_runtime::spawn(async move {
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            overlay.set_playing(snapshot.is_playing);
            if let Err(e) = app.emit("playback-changed", &snapshot) {
                tracing::warn!("Failed to emit playback-changed: {}", e);
            }
        }
    });

    let snapshot = sync.state();
    *state.playback.lock() = Some(PlaybackBinding {
        session_id,
        sync,
        reference,
        user,
        _ticker: ticker,
    });
    tracing::info!("Comparison loaded");
    Ok(snapshot)
}

#[tauri::command]
pub fn get_playback_state(state: State<'_, DanceState>) -> Result<PlaybackState, ErrorResponse> {
    Ok(current_sync(&state)?.state())
}

#[tauri::command]
pub async fn toggle_playback(state: State<'_, DanceState>) -> Result<PlaybackState, ErrorResponse> {
    let sync = current_sync(&state)?;
    sync.toggle_playback().await.map_err(AppError::from)?;
    Ok(sync.state())
}

#[tauri::command]
pub async fn play(state: State<'_, DanceState>) -> Result<(), ErrorResponse> {
    let sync = current_sync(&state)?;
    sync.play().await.map_err(AppError::from)?;
    Ok(())
}

#[tauri::command]
pub fn pause(state: State<'_, DanceState>) -> Result<(), ErrorResponse> {
    current_sync(&state)?.pause();
    Ok(())
}

/// Scrub to `percent` of the reference duration (slider value, 0..=100)
#[tauri::command]
pub fn seek(state: State<'_, DanceState>, percent: f64) -> Result<bool, ErrorResponse> {
    let sync = current_sync(&state)?;
    Ok(sync.seek(crate::playback::fraction_from_percent(percent)))
}

#[tauri::command]
pub async fn restart(state: State<'_, DanceState>) -> Result<(), ErrorResponse> {
    let sync = current_sync(&state)?;
    sync.restart().await.map_err(AppError::from)?;
    Ok(())
}

/// Pause and rewind both panes
#[tauri::command]
pub fn stop_playback(state: State<'_, DanceState>) -> Result<(), ErrorResponse> {
    current_sync(&state)?.stop();
    Ok(())
}

#[tauri::command]
pub fn set_volume(state: State<'_, DanceState>, volume: f64) -> Result<(), ErrorResponse> {
    current_sync(&state)?.set_volume(volume);
    Ok(())
}

/// Returns the new muted flag
#[tauri::command]
pub fn toggle_mute(state: State<'_, DanceState>) -> Result<bool, ErrorResponse> {
    Ok(current_sync(&state)?.toggle_mute())
}

#[tauri::command]
pub fn report_media_status(
    state: State<'_, DanceState>,
    target: String,
    status: MediaStatus,
) -> Result<(), ErrorResponse> {
    let playback = state.playback.lock();
    let element = playback
        .as_ref()
        .and_then(|binding| binding.element(&target))
        .ok_or_else(|| AppError::NotReady(format!("Unknown media element '{}'", target)))?;
    element.update_status(status);
    Ok(())
}

/// The webview refused to play (e.g. autoplay policy)
#[tauri::command]
pub fn report_play_rejected(
    state: State<'_, DanceState>,
    target: String,
    reason: String,
) -> Result<(), ErrorResponse> {
    current_sync(&state)?.on_play_rejected(&target, &reason);
    Ok(())
}
