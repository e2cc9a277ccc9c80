//! Dance Compare - upload a reference routine, record yourself, compare.
//!
//! This is the main library crate. It holds the session, capture, playback
//! and overlay state machines, the upload client for the processing server,
//! and (with the `desktop` feature) the Tauri application shell.

pub mod app;
pub mod capture;
pub mod config;
pub mod feedback;
pub mod overlay;
pub mod playback;
pub mod pose;
pub mod session;
pub mod upload;
pub mod utils;

#[cfg(feature = "desktop")]
pub mod commands;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dance_compare_lib=debug,tauri=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(feature = "desktop")]
fn load_config(app: &tauri::App) -> config::AppConfig {
    use tauri::Manager;

    let path = match app.path().app_config_dir() {
        Ok(dir) => dir.join("config.json"),
        Err(e) => {
            tracing::warn!("No app config directory ({}), using defaults", e);
            return config::AppConfig::default();
        }
    };
    config::AppConfig::load(&path).unwrap_or_else(|e| {
        tracing::error!("Ignoring invalid config {:?}: {}", path, e);
        config::AppConfig::default()
    })
}

/// Forward state changes to the webview
#[cfg(feature = "desktop")]
fn spawn_event_forwarders(app: &tauri::AppHandle, state: &commands::DanceState) {
    use tauri::Emitter;
    use tokio::sync::broadcast::error::RecvError;

    let handle = app.clone();
    let session = state.session.clone();
    let mut events = session.subscribe();
    tauri::async_runtime::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!("Session event: {:?}", event),
                Err(RecvError::Lagged(n)) => tracing::debug!("Skipped {} session events", n),
                Err(RecvError::Closed) => break,
            }
            if let Err(e) = handle.emit("session-changed", session.snapshot()) {
                tracing::warn!("Failed to emit session-changed: {}", e);
            }
        }
    });

    let handle = app.clone();
    let mut overlay = state.overlay.subscribe();
    tauri::async_runtime::spawn(async move {
        while overlay.changed().await.is_ok() {
            let snapshot = overlay.borrow_and_update().clone();
            if let Err(e) = handle.emit("overlay-changed", snapshot) {
                tracing::warn!("Failed to emit overlay-changed: {}", e);
            }
        }
    });

    let handle = app.clone();
    let mut capture = state.capture_status.clone();
    tauri::async_runtime::spawn(async move {
        while capture.changed().await.is_ok() {
            let snapshot = capture.borrow_and_update().clone();
            if let Err(e) = handle.emit("capture-changed", snapshot) {
                tracing::warn!("Failed to emit capture-changed: {}", e);
            }
        }
    });

    let handle = app.clone();
    let mut upload = state.upload.subscribe();
    tauri::async_runtime::spawn(async move {
        while upload.changed().await.is_ok() {
            let snapshot = upload.borrow_and_update().clone();
            if let Err(e) = handle.emit("upload-changed", snapshot) {
                tracing::warn!("Failed to emit upload-changed: {}", e);
            }
        }
    });
}

/// Initialize the application
#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use std::sync::Arc;
    use tauri::Manager;

    init_tracing();
    tracing::info!("Starting Dance Compare v{}", env!("CARGO_PKG_VERSION"));

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let config = load_config(app);
            tracing::info!("Processing server: {}", config.server_url);

            let camera = Arc::new(capture::webcam::NokhwaCameraSource::new());
            let state = commands::DanceState::new(config, camera);

            spawn_event_forwarders(app.handle(), &state);
            app.manage(state);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Session commands
            commands::session::get_session,
            commands::session::get_upload_status,
            commands::session::choose_reference_video,
            commands::session::upload_reference,
            commands::session::cancel_upload,
            commands::session::skip_upload,
            commands::session::skip_recording,
            commands::session::request_feedback,
            commands::session::get_feedback,
            commands::session::end_session,
            // Capture commands
            commands::capture::get_cameras,
            commands::capture::get_capture_status,
            commands::capture::get_recording_time,
            commands::capture::start_camera,
            commands::capture::start_recording,
            commands::capture::stop_recording,
            commands::capture::reset_recording,
            commands::capture::accept_recording,
            commands::capture::release_camera,
            commands::capture::read_clip,
            // Playback commands
            commands::playback::load_comparison,
            commands::playback::get_playback_state,
            commands::playback::toggle_playback,
            commands::playback::play,
            commands::playback::pause,
            commands::playback::seek,
            commands::playback::restart,
            commands::playback::stop_playback,
            commands::playback::set_volume,
            commands::playback::toggle_mute,
            commands::playback::report_media_status,
            commands::playback::report_play_rejected,
            // Overlay commands
            commands::overlay::get_overlay_state,
            commands::overlay::toggle_fullscreen,
            commands::overlay::fullscreen_changed,
            commands::overlay::pointer_moved,
            commands::overlay::set_controls_hovered,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
