//! Camera and recording commands

use super::DanceState;
use crate::capture::{CameraInfo, CaptureStatus, ClipRegistry};
use crate::utils::{format_clock, AppError, ErrorResponse};
use tauri::State;

/// Get list of available cameras/webcams
#[tauri::command]
pub async fn get_cameras(state: State<'_, DanceState>) -> Result<Vec<CameraInfo>, ErrorResponse> {
    let capture = state.capture.lock().await;
    Ok(capture.list_cameras())
}

#[tauri::command]
pub async fn get_capture_status(state: State<'_, DanceState>) -> Result<CaptureStatus, ErrorResponse> {
    Ok(state.capture.lock().await.status())
}

/// Elapsed recording time as `MM:SS`
#[tauri::command]
pub async fn get_recording_time(state: State<'_, DanceState>) -> Result<String, ErrorResponse> {
    let elapsed = state.capture.lock().await.recording_elapsed();
    Ok(format_clock(elapsed.as_secs_f64()))
}

#[tauri::command]
pub async fn start_camera(state: State<'_, DanceState>) -> Result<CaptureStatus, ErrorResponse> {
    let mut capture = state.capture.lock().await;
    capture.acquire().await.map_err(AppError::from)?;
    Ok(capture.status())
}

/// Runs the countdown without holding the capture lock
#[tauri::command]
pub async fn start_recording(state: State<'_, DanceState>) -> Result<(), ErrorResponse> {
    state.app.start_recording().await.map_err(AppError::from)?;
    Ok(())
}

/// Returns the clip URL, or `None` if nothing was recording. Cancels a
/// running countdown.
#[tauri::command]
pub async fn stop_recording(state: State<'_, DanceState>) -> Result<Option<String>, ErrorResponse> {
    let mut capture = state.capture.lock().await;
    let url = capture.stop_recording().await.map_err(AppError::from)?;
    Ok(url)
}

/// Discard the recorded clip and return to the live preview
#[tauri::command]
pub async fn reset_recording(state: State<'_, DanceState>) -> Result<CaptureStatus, ErrorResponse> {
    let mut capture = state.capture.lock().await;
    capture.reset();
    Ok(capture.status())
}

/// Hand the recorded clip to the session and leave the record step
#[tauri::command]
pub async fn accept_recording(state: State<'_, DanceState>) -> Result<String, ErrorResponse> {
    Ok(state.app.accept_recording().await?)
}

#[tauri::command]
pub async fn release_camera(state: State<'_, DanceState>) -> Result<(), ErrorResponse> {
    state.capture.lock().await.release();
    Ok(())
}

/// Raw bytes of a recorded clip, for the webview to wrap in a blob
#[tauri::command]
pub fn read_clip(state: State<'_, DanceState>, url: String) -> Result<tauri::ipc::Response, ErrorResponse> {
    if !ClipRegistry::is_clip_url(&url) {
        return Err(AppError::NotReady(format!("'{}' is not a recorded clip", url)).into());
    }
    let clip = state
        .clips
        .resolve(&url)
        .ok_or_else(|| AppError::NotReady(format!("Clip {} was revoked", url)))?;
    Ok(tauri::ipc::Response::new(clip.data.clone()))
}
