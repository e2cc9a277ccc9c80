//! Session, upload and feedback commands

use super::DanceState;
use crate::feedback::{canned_report, FeedbackReport};
use crate::session::Session;
use crate::upload::UploadStatus;
use crate::utils::{AppError, ErrorResponse};
use std::path::PathBuf;
use tauri::{AppHandle, State};
use tauri_plugin_dialog::DialogExt;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "webm", "mov", "avi", "mkv", "ogv"];

#[tauri::command]
pub fn get_session(state: State<'_, DanceState>) -> Session {
    state.session.snapshot()
}

#[tauri::command]
pub fn get_upload_status(state: State<'_, DanceState>) -> UploadStatus {
    state.upload.status()
}

/// Let the user pick a video file. Returns `None` if the dialog was dismissed.
#[tauri::command]
pub async fn choose_reference_video(app: AppHandle) -> Result<Option<String>, ErrorResponse> {
    let picked = tokio::task::spawn_blocking(move || {
        app.dialog()
            .file()
            .add_filter("Video", VIDEO_EXTENSIONS)
            .blocking_pick_file()
    })
    .await
    .map_err(|e| ErrorResponse::from(AppError::Session(e.to_string())))?;

    Ok(picked
        .and_then(|file| file.into_path().ok())
        .map(|path| path.to_string_lossy().into_owned()))
}

/// Upload the reference video at `path`; on success the session moves to
/// the record step.
#[tauri::command]
pub async fn upload_reference(
    state: State<'_, DanceState>,
    path: String,
) -> Result<String, ErrorResponse> {
    let upload = state.upload.clone();
    let url = upload
        .upload_file(&PathBuf::from(path))
        .await
        .map_err(AppError::from)?;
    Ok(url)
}

#[tauri::command]
pub fn cancel_upload(state: State<'_, DanceState>) {
    state.upload.cancel();
}

#[tauri::command]
pub fn skip_upload(state: State<'_, DanceState>) -> Result<(), ErrorResponse> {
    state.upload.skip().map_err(AppError::from)?;
    Ok(())
}

#[tauri::command]
pub fn skip_recording(state: State<'_, DanceState>) -> Result<(), ErrorResponse> {
    state.session.skip_recording().map_err(AppError::from)?;
    Ok(())
}

/// "Get AI Feedback": show the analyzing state, then move to feedback
#[tauri::command]
pub async fn request_feedback(state: State<'_, DanceState>) -> Result<(), ErrorResponse> {
    if let Some(binding) = state.playback.lock().as_ref() {
        binding.sync.pause();
    }
    let session = state.session.clone();
    session
        .request_feedback(state.config.analysis_delay())
        .await
        .map_err(AppError::from)?;
    Ok(())
}

#[tauri::command]
pub fn get_feedback() -> FeedbackReport {
    canned_report()
}

/// "End" / "New Session": tear down the compare view and start over
#[tauri::command]
pub async fn end_session(state: State<'_, DanceState>) -> Result<Session, ErrorResponse> {
    state.playback.lock().take();
    Ok(state.app.end_session().await)
}
