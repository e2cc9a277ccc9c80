//! Capture component
//!
//! Owns the camera stream for its lifetime: acquire, record with countdown,
//! assemble the clip, and release the device on teardown.

use super::clip::{Clip, ClipRegistry};
use super::traits::{CameraInfo, CameraSource, CaptureError, CaptureResult, MediaStream, StreamConstraints};
use crate::config::AppConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Camera lifecycle as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum CameraState {
    /// Camera has not been requested
    Inactive,
    /// Waiting on the platform permission prompt / device open
    Requesting,
    /// Stream is live
    Active,
    /// Acquisition failed; terminal until the user retries
    Error(String),
}

/// What the preview pane is showing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PreviewSource {
    None,
    Live { stream_id: String },
    Clip { url: String },
}

/// Snapshot published on every transition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStatus {
    pub camera: CameraState,
    /// Seconds left before recording starts (0 when not counting down)
    pub countdown: u64,
    pub is_recording: bool,
    pub preview: PreviewSource,
    pub clip_url: Option<String>,
}

impl Default for CaptureStatus {
    fn default() -> Self {
        Self {
            camera: CameraState::Inactive,
            countdown: 0,
            is_recording: false,
            preview: PreviewSource::None,
            clip_url: None,
        }
    }
}

/// Behavior flags for the component
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub constraints: StreamConstraints,
    /// Acquire the camera when recording is requested without a stream
    pub auto_acquire: bool,
    /// Countdown before buffering starts
    pub countdown: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl CaptureOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            constraints: StreamConstraints::from(&config.capture),
            auto_acquire: config.capture.auto_acquire,
            countdown: config.countdown(),
        }
    }
}

/// How long `stop_recording` waits for the encoder to flush trailing segments
const FINALIZE_TIMEOUT: Duration = Duration::from_secs(10);

struct ActiveRecording {
    cancel: CancellationToken,
    pump: JoinHandle<Vec<Vec<u8>>>,
    stream: Arc<dyn MediaStream>,
    mime_type: String,
    started_at: Instant,
}

/// Wait one countdown second. Returns `false` if the countdown was cancelled.
pub async fn countdown_tick(token: &CancellationToken) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(Duration::from_secs(1)) => true,
    }
}

/// Camera capture and recording
pub struct CaptureComponent {
    source: Arc<dyn CameraSource>,
    clips: Arc<ClipRegistry>,
    options: CaptureOptions,
    stream: Option<Arc<dyn MediaStream>>,
    countdown: Option<CancellationToken>,
    recording: Option<ActiveRecording>,
    last_duration: Duration,
    status: watch::Sender<CaptureStatus>,
}

impl CaptureComponent {
    pub fn new(source: Arc<dyn CameraSource>, clips: Arc<ClipRegistry>, options: CaptureOptions) -> Self {
        let (status, _) = watch::channel(CaptureStatus::default());
        Self {
            source,
            clips,
            options,
            stream: None,
            countdown: None,
            recording: None,
            last_duration: Duration::ZERO,
            status,
        }
    }

    /// Cameras the source can open
    pub fn list_cameras(&self) -> Vec<CameraInfo> {
        self.source.list_cameras()
    }

    /// Subscribe to status snapshots
    pub fn subscribe(&self) -> watch::Receiver<CaptureStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> CaptureStatus {
        self.status.borrow().clone()
    }

    pub fn camera_state(&self) -> CameraState {
        self.status.borrow().camera.clone()
    }

    pub fn preview(&self) -> PreviewSource {
        self.status.borrow().preview.clone()
    }

    pub fn clip_url(&self) -> Option<String> {
        self.status.borrow().clip_url.clone()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn is_counting_down(&self) -> bool {
        self.countdown.is_some()
    }

    pub fn countdown_secs(&self) -> u64 {
        self.options.countdown.as_secs()
    }

    /// Time spent recording; frozen at the final value after stop
    pub fn recording_elapsed(&self) -> Duration {
        match &self.recording {
            Some(recording) => recording.started_at.elapsed(),
            None => self.last_duration,
        }
    }

    fn live_stream(&self) -> Option<&Arc<dyn MediaStream>> {
        self.stream.as_ref().filter(|s| s.is_live())
    }

    fn live_preview(&self) -> PreviewSource {
        match self.live_stream() {
            Some(stream) => PreviewSource::Live {
                stream_id: stream.id().to_string(),
            },
            None => PreviewSource::None,
        }
    }

    /// Request the camera and start the live preview.
    ///
    /// A no-op while a live stream is already held.
    pub async fn acquire(&mut self) -> CaptureResult<()> {
        if self.live_stream().is_some() {
            return Ok(());
        }

        self.status.send_modify(|s| s.camera = CameraState::Requesting);
        tracing::info!("Requesting camera ({:?})", self.options.constraints);

        match self.source.acquire(&self.options.constraints).await {
            Ok(stream) => {
                tracing::info!(
                    "Camera activated: stream {} with {} track(s)",
                    stream.id(),
                    stream.tracks().len()
                );
                let preview = PreviewSource::Live {
                    stream_id: stream.id().to_string(),
                };
                self.stream = Some(stream);
                self.status.send_modify(|s| {
                    s.camera = CameraState::Active;
                    if s.clip_url.is_none() {
                        s.preview = preview;
                    }
                });
                Ok(())
            }
            Err(e) => {
                tracing::error!("Error accessing camera: {}", e);
                self.status.send_modify(|s| s.camera = CameraState::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Count down, then start buffering segments from the stream.
    ///
    /// Holds `&mut self` for the whole countdown. Callers that share the
    /// component behind a lock use [`prepare_recording`](Self::prepare_recording),
    /// [`countdown_tick`] and [`begin_recording`](Self::begin_recording) instead.
    pub async fn start_recording(&mut self) -> CaptureResult<()> {
        let token = self.prepare_recording().await?;
        for remaining in (1..=self.countdown_secs()).rev() {
            self.show_countdown(remaining);
            if !countdown_tick(&token).await {
                break;
            }
        }
        self.begin_recording(&token)
    }

    /// Make sure a stream is live, drop any clip still waiting for
    /// acceptance and arm the countdown. The returned token is cancelled by
    /// `stop_recording`, `reset` and `release`.
    pub async fn prepare_recording(&mut self) -> CaptureResult<CancellationToken> {
        if self.recording.is_some() || self.countdown.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        if self.live_stream().is_none() {
            if !self.options.auto_acquire {
                return Err(CaptureError::NotReady);
            }
            self.acquire().await?;
        }

        self.discard_clip();

        let token = CancellationToken::new();
        self.countdown = Some(token.clone());
        Ok(token)
    }

    pub fn show_countdown(&self, remaining: u64) {
        self.status.send_modify(|s| s.countdown = remaining);
    }

    /// Start the take armed by [`prepare_recording`](Self::prepare_recording).
    pub fn begin_recording(&mut self, token: &CancellationToken) -> CaptureResult<()> {
        if token.is_cancelled() {
            return Err(CaptureError::CountdownCancelled);
        }
        if self.countdown.take().is_none() {
            return Err(CaptureError::NotReady);
        }
        self.status.send_modify(|s| s.countdown = 0);

        let stream = self.live_stream().cloned().ok_or(CaptureError::StreamEnded)?;
        let mut segments = stream.record()?;
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let pump = tokio::spawn(async move {
            let mut chunks = Vec::new();
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    segment = segments.recv() => match segment {
                        Some(data) if !data.is_empty() => chunks.push(data),
                        Some(_) => {}
                        None => break,
                    },
                }
            }
            // Segments already delivered before the stop belong to the take.
            while let Ok(data) = segments.try_recv() {
                if !data.is_empty() {
                    chunks.push(data);
                }
            }
            chunks
        });

        self.recording = Some(ActiveRecording {
            cancel,
            pump,
            mime_type: stream.mime_type().to_string(),
            stream,
            started_at: Instant::now(),
        });
        self.last_duration = Duration::ZERO;
        self.status.send_modify(|s| s.is_recording = true);

        tracing::info!("Recording started");
        Ok(())
    }

    /// Finish the take and expose it through a clip URL.
    ///
    /// During the countdown this cancels it. Returns `None` (and does
    /// nothing else) when not recording.
    pub async fn stop_recording(&mut self) -> CaptureResult<Option<String>> {
        if self.cancel_countdown() {
            tracing::info!("Countdown cancelled");
            return Ok(None);
        }
        let Some(mut recording) = self.recording.take() else {
            tracing::debug!("stop_recording called while not recording");
            return Ok(None);
        };

        self.last_duration = recording.started_at.elapsed();
        // Closing the tap lets the encoder flush; the pump ends when it does.
        recording.stream.finish_recording();

        let chunks = match tokio::time::timeout(FINALIZE_TIMEOUT, &mut recording.pump).await {
            Ok(Ok(chunks)) => chunks,
            Ok(Err(e)) => {
                tracing::warn!("Recorder task failed: {}", e);
                Vec::new()
            }
            Err(_) => {
                tracing::warn!("Recorder did not finish within {:?}", FINALIZE_TIMEOUT);
                recording.cancel.cancel();
                recording.pump.await.unwrap_or_default()
            }
        };

        let clip = Clip::from_segments(recording.mime_type, chunks);
        tracing::info!(
            "Recording stopped: {} segments, {} bytes, {:.1}s",
            clip.segment_count,
            clip.len(),
            self.last_duration.as_secs_f64()
        );

        let url = self.clips.create_url(clip);
        self.status.send_modify(|s| {
            s.is_recording = false;
            s.clip_url = Some(url.clone());
            s.preview = PreviewSource::Clip { url: url.clone() };
        });
        Ok(Some(url))
    }

    /// Throw the take away (including one still in progress) and return to
    /// the live preview.
    pub fn reset(&mut self) {
        self.cancel_countdown();
        self.abort_recording();
        self.discard_clip();
        self.last_duration = Duration::ZERO;
        let preview = self.live_preview();
        self.status.send_modify(|s| s.preview = preview);
    }

    /// Hand the clip URL to the caller. The component no longer revokes it.
    pub fn accept(&mut self) -> Option<String> {
        let url = self.status.borrow().clip_url.clone()?;
        let preview = self.live_preview();
        self.status.send_modify(|s| {
            s.clip_url = None;
            s.preview = preview;
        });
        tracing::info!("Recording accepted: {}", url);
        Some(url)
    }

    /// Stop the device tracks and revoke any outstanding clip URL.
    /// Safe to call more than once.
    pub fn release(&mut self) {
        self.cancel_countdown();
        self.abort_recording();
        self.discard_clip();
        self.last_duration = Duration::ZERO;

        if let Some(stream) = self.stream.take() {
            stream.stop();
            tracing::info!("Camera released (stream {})", stream.id());
        }

        self.status.send_modify(|s| {
            s.camera = CameraState::Inactive;
            s.preview = PreviewSource::None;
        });
    }

    fn cancel_countdown(&mut self) -> bool {
        let Some(token) = self.countdown.take() else {
            return false;
        };
        token.cancel();
        self.status.send_modify(|s| s.countdown = 0);
        true
    }

    fn abort_recording(&mut self) {
        if let Some(recording) = self.recording.take() {
            recording.cancel.cancel();
            recording.pump.abort();
            recording.stream.finish_recording();
            tracing::info!("Recording discarded");
        }
        self.status.send_modify(|s| s.is_recording = false);
    }

    fn discard_clip(&mut self) {
        let url = self.status.borrow().clip_url.clone();
        if let Some(url) = url {
            self.clips.revoke(&url);
            self.status.send_modify(|s| s.clip_url = None);
        }
    }
}

impl Drop for CaptureComponent {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::fake::{FakeCamera, FakeOutcome};

    fn component(camera: Arc<FakeCamera>, auto_acquire: bool) -> (CaptureComponent, Arc<ClipRegistry>) {
        let clips = Arc::new(ClipRegistry::new());
        let options = CaptureOptions {
            constraints: StreamConstraints::default(),
            auto_acquire,
            countdown: Duration::ZERO,
        };
        (CaptureComponent::new(camera, clips.clone(), options), clips)
    }

    #[tokio::test]
    async fn test_acquire_starts_live_preview() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Grant));
        let (mut capture, _) = component(camera.clone(), false);

        capture.acquire().await.unwrap();

        assert_eq!(capture.camera_state(), CameraState::Active);
        let stream = camera.last_stream().unwrap();
        assert_eq!(
            capture.preview(),
            PreviewSource::Live {
                stream_id: stream.id().to_string()
            }
        );

        // Second acquire reuses the held stream.
        capture.acquire().await.unwrap();
        assert_eq!(camera.acquire_count(), 1);
    }

    #[test]
    fn test_list_cameras_delegates_to_source() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Grant));
        let (capture, _) = component(camera, false);

        let cameras = capture.list_cameras();
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].name, "Fake Camera");
    }

    #[tokio::test]
    async fn test_permission_denied_reaches_error_state() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Deny));
        let (mut capture, _) = component(camera, false);

        let err = capture.acquire().await.unwrap_err();

        assert!(matches!(err, CaptureError::PermissionDenied(_)));
        assert!(matches!(capture.camera_state(), CameraState::Error(_)));
        assert_eq!(capture.preview(), PreviewSource::None);
    }

    #[tokio::test]
    async fn test_missing_device_can_be_retried() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::NoDevice));
        let (mut capture, _) = component(camera, true);

        let err = capture.start_recording().await.unwrap_err();

        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
        assert!(matches!(capture.camera_state(), CameraState::Error(_)));
        assert!(!capture.is_recording());
        // The error state is terminal, not stuck in Requesting.
        assert_ne!(capture.camera_state(), CameraState::Requesting);
    }

    #[tokio::test]
    async fn test_start_without_stream_is_not_ready() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Grant));
        let (mut capture, _) = component(camera.clone(), false);

        assert_eq!(capture.start_recording().await, Err(CaptureError::NotReady));
        assert_eq!(camera.acquire_count(), 0);
    }

    #[tokio::test]
    async fn test_auto_acquire_then_record() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Grant));
        let (mut capture, _) = component(camera.clone(), true);

        capture.start_recording().await.unwrap();

        assert_eq!(camera.acquire_count(), 1);
        assert!(capture.is_recording());
        assert_eq!(
            capture.start_recording().await,
            Err(CaptureError::AlreadyRecording)
        );
    }

    #[tokio::test]
    async fn test_stop_assembles_segments_in_order() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Grant));
        let (mut capture, clips) = component(camera.clone(), false);
        capture.acquire().await.unwrap();
        capture.start_recording().await.unwrap();

        let stream = camera.last_stream().unwrap();
        stream.emit(b"seg1-");
        stream.emit(b"");
        stream.emit(b"seg2");

        let url = capture.stop_recording().await.unwrap().unwrap();
        let clip = clips.resolve(&url).unwrap();

        assert_eq!(clip.data, b"seg1-seg2");
        assert_eq!(clip.segment_count, 2);
        assert_eq!(capture.preview(), PreviewSource::Clip { url: url.clone() });
        assert!(!capture.is_recording());
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Grant));
        let (mut capture, clips) = component(camera, false);

        assert_eq!(capture.stop_recording().await, Ok(None));
        assert_eq!(clips.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_stop_then_reset_revokes_exactly_one_url() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Grant));
        let (mut capture, clips) = component(camera.clone(), false);
        capture.acquire().await.unwrap();
        let stream = camera.last_stream().unwrap();

        capture.start_recording().await.unwrap();
        stream.emit(b"frame");
        let url = capture.stop_recording().await.unwrap().unwrap();
        assert_eq!(clips.outstanding(), 1);

        capture.reset();

        assert_eq!(clips.outstanding(), 0);
        assert!(clips.resolve(&url).is_none());
        assert!(stream.is_live());
        assert_eq!(
            capture.preview(),
            PreviewSource::Live {
                stream_id: stream.id().to_string()
            }
        );
        assert_eq!(capture.recording_elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_accepted_clip_survives_release() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Grant));
        let (mut capture, clips) = component(camera.clone(), false);
        capture.acquire().await.unwrap();
        capture.start_recording().await.unwrap();
        let url = capture.stop_recording().await.unwrap().unwrap();

        assert_eq!(capture.accept(), Some(url.clone()));
        assert_eq!(capture.accept(), None);
        capture.release();

        assert!(clips.resolve(&url).is_some());
    }

    #[tokio::test]
    async fn test_release_is_idempotent_and_stops_tracks() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Grant));
        let (mut capture, clips) = component(camera.clone(), false);
        capture.acquire().await.unwrap();
        capture.start_recording().await.unwrap();
        let stream = camera.last_stream().unwrap();

        capture.release();
        capture.release();

        assert!(!stream.is_live());
        assert_eq!(stream.stop_count(), 1);
        assert_eq!(capture.camera_state(), CameraState::Inactive);
        assert!(!capture.is_recording());
        assert_eq!(clips.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_drop_releases_camera_and_clip() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Grant));
        let (mut capture, clips) = component(camera.clone(), false);
        capture.acquire().await.unwrap();
        capture.start_recording().await.unwrap();
        capture.stop_recording().await.unwrap();
        let stream = camera.last_stream().unwrap();

        drop(capture);

        assert!(!stream.is_live());
        assert_eq!(clips.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_runs_before_recording() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Grant));
        let clips = Arc::new(ClipRegistry::new());
        let options = CaptureOptions {
            constraints: StreamConstraints::default(),
            auto_acquire: true,
            countdown: Duration::from_secs(3),
        };
        let mut capture = CaptureComponent::new(camera, clips, options);
        let mut status = capture.subscribe();

        let started = Instant::now();
        capture.start_recording().await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(status.has_changed().unwrap());
        let snapshot = status.borrow_and_update().clone();
        assert_eq!(snapshot.countdown, 0);
        assert!(snapshot.is_recording);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recording_elapsed_freezes_after_stop() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Grant));
        let (mut capture, _) = component(camera, true);
        capture.start_recording().await.unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        capture.stop_recording().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(capture.recording_elapsed().as_secs(), 5);
    }

    #[tokio::test]
    async fn test_reset_discards_take_in_progress() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Grant));
        let (mut capture, clips) = component(camera.clone(), false);
        capture.acquire().await.unwrap();
        let stream = camera.last_stream().unwrap();

        capture.start_recording().await.unwrap();
        stream.emit(b"old-take-");
        capture.reset();

        assert!(!capture.is_recording());
        assert!(!capture.status().is_recording);
        assert_eq!(stream.open_taps(), 0);

        capture.start_recording().await.unwrap();
        stream.emit(b"new");
        let url = capture.stop_recording().await.unwrap().unwrap();

        assert_eq!(clips.resolve(&url).unwrap().data, b"new");
    }

    #[tokio::test]
    async fn test_release_mid_take_allows_new_take() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Grant));
        let (mut capture, _) = component(camera.clone(), true);
        capture.start_recording().await.unwrap();

        capture.release();
        assert!(!capture.is_recording());

        capture.start_recording().await.unwrap();
        assert_eq!(camera.acquire_count(), 2);
        assert!(capture.is_recording());
    }

    #[tokio::test]
    async fn test_stop_closes_tap_and_waits_for_trailing_segments() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Grant));
        let (mut capture, clips) = component(camera.clone(), false);
        capture.acquire().await.unwrap();
        capture.start_recording().await.unwrap();
        let stream = camera.last_stream().unwrap();
        stream.emit(b"moov");
        stream.emit(b"moof");

        let url = capture.stop_recording().await.unwrap().unwrap();

        assert_eq!(stream.open_taps(), 0);
        assert!(stream.is_live());
        assert_eq!(clips.resolve(&url).unwrap().data, b"moovmoof");
    }

    #[tokio::test]
    async fn test_countdown_outside_component_can_be_cancelled() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Grant));
        let (mut capture, clips) = component(camera.clone(), true);

        let token = capture.prepare_recording().await.unwrap();
        assert!(capture.is_counting_down());
        assert!(matches!(
            capture.prepare_recording().await,
            Err(CaptureError::AlreadyRecording)
        ));

        assert_eq!(capture.stop_recording().await, Ok(None));
        assert!(token.is_cancelled());
        assert!(!countdown_tick(&token).await);
        assert_eq!(
            capture.begin_recording(&token),
            Err(CaptureError::CountdownCancelled)
        );
        assert!(!capture.is_recording());
        assert_eq!(clips.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prepare_then_begin_records() {
        let camera = Arc::new(FakeCamera::new(FakeOutcome::Grant));
        let (mut capture, _) = component(camera, true);

        let token = capture.prepare_recording().await.unwrap();
        capture.show_countdown(1);
        assert_eq!(capture.status().countdown, 1);
        assert!(countdown_tick(&token).await);
        assert!(!capture.is_recording());

        capture.begin_recording(&token).unwrap();
        assert!(capture.is_recording());
        assert!(!capture.is_counting_down());
        assert_eq!(capture.status().countdown, 0);
    }
}
