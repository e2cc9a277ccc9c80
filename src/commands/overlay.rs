//! Fullscreen comparison gestures
//!
//! These run as async commands so the idle timer is spawned on the runtime.

use super::DanceState;
use crate::overlay::OverlayState;
use crate::utils::{AppError, ErrorResponse};
use tauri::{State, WebviewWindow};

#[tauri::command]
pub fn get_overlay_state(state: State<'_, DanceState>) -> OverlayState {
    state.overlay.state()
}

/// Toggle the immersive view, resizing the window to match
#[tauri::command]
pub async fn toggle_fullscreen(
    window: WebviewWindow,
    state: State<'_, DanceState>,
) -> Result<OverlayState, ErrorResponse> {
    let fullscreen = !state.overlay.state().is_fullscreen;
    window
        .set_fullscreen(fullscreen)
        .map_err(|e| AppError::Window(format!("Failed to change fullscreen: {}", e)))?;
    state.overlay.on_fullscreen_change(fullscreen);
    Ok(state.overlay.state())
}

/// The platform left or entered fullscreen on its own (e.g. Escape)
#[tauri::command]
pub async fn fullscreen_changed(
    state: State<'_, DanceState>,
    is_fullscreen: bool,
) -> Result<OverlayState, ErrorResponse> {
    Ok(state.app.window_fullscreen_changed(is_fullscreen))
}

#[tauri::command]
pub async fn pointer_moved(state: State<'_, DanceState>) -> Result<(), ErrorResponse> {
    state.overlay.on_pointer_move();
    Ok(())
}

#[tauri::command]
pub fn set_controls_hovered(state: State<'_, DanceState>, hovering: bool) {
    state.overlay.set_hovering(hovering);
}
