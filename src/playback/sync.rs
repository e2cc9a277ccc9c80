//! Dual playback synchronization
//!
//! Drives the reference and user elements as one transport. The reference
//! element is the clock: its duration maps scrub fractions to seconds and
//! its position is what the time display shows.

use super::element::{MediaElement, PlaybackResult};
use crate::utils::ScheduledTask;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Default volume applied when videos are loaded
pub const DEFAULT_VOLUME: f64 = 0.5;

/// Transport state shared by both elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub muted: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume: DEFAULT_VOLUME,
            muted: false,
        }
    }
}

impl PlaybackState {
    /// Scrub bar position, 0..=100
    pub fn progress_percent(&self) -> f64 {
        progress_percent(self.current_time, self.duration)
    }
}

/// Percentage of `duration` reached at `current`; 0 while duration is unknown
pub fn progress_percent(current: f64, duration: f64) -> f64 {
    if known_duration(duration).is_none() {
        return 0.0;
    }
    (current / duration * 100.0).clamp(0.0, 100.0)
}

/// Convert a 0..=100 slider value into a seek fraction
pub fn fraction_from_percent(percent: f64) -> f64 {
    (percent / 100.0).clamp(0.0, 1.0)
}

fn known_duration(duration: f64) -> Option<f64> {
    (duration.is_finite() && duration > 0.0).then_some(duration)
}

/// Two media elements driven as one
pub struct DualPlaybackSync {
    reference: Arc<dyn MediaElement>,
    user: Arc<dyn MediaElement>,
    state: Mutex<PlaybackState>,
    drift_tolerance: Option<f64>,
    corrections: AtomicU64,
    status: watch::Sender<PlaybackState>,
}

impl DualPlaybackSync {
    /// `drift_tolerance` is the largest offset (seconds) allowed between the
    /// elements while playing; `None` never corrects.
    pub fn new(
        reference: Arc<dyn MediaElement>,
        user: Arc<dyn MediaElement>,
        drift_tolerance: Option<f64>,
    ) -> Self {
        let state = PlaybackState::default();
        let (status, _) = watch::channel(state.clone());
        let sync = Self {
            reference,
            user,
            state: Mutex::new(state),
            drift_tolerance,
            corrections: AtomicU64::new(0),
            status,
        };
        sync.apply_audio();
        sync
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.status.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        self.state.lock().clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().is_playing
    }

    /// Number of drift corrections applied so far
    pub fn corrections(&self) -> u64 {
        self.corrections.load(Ordering::Relaxed)
    }

    /// Offset between the two elements in seconds
    pub fn drift(&self) -> f64 {
        (self.user.current_time() - self.reference.current_time()).abs()
    }

    fn each(&self) -> [&Arc<dyn MediaElement>; 2] {
        [&self.reference, &self.user]
    }

    fn update<F: FnOnce(&mut PlaybackState)>(&self, f: F) {
        let snapshot = {
            let mut state = self.state.lock();
            f(&mut state);
            state.clone()
        };
        self.status.send_replace(snapshot);
    }

    fn apply_audio(&self) {
        let (volume, muted) = {
            let state = self.state.lock();
            (state.volume, state.muted)
        };
        for element in self.each() {
            element.set_volume(volume);
            element.set_muted(muted);
        }
    }

    /// Point both elements at new sources and rewind the transport
    pub fn load(&self, reference_url: &str, user_url: &str) {
        for element in self.each() {
            element.pause();
        }
        self.reference.set_source(reference_url);
        self.user.set_source(user_url);
        self.apply_audio();
        self.update(|s| {
            s.is_playing = false;
            s.current_time = 0.0;
            s.duration = 0.0;
        });
        tracing::info!("Loaded reference {} and user {}", reference_url, user_url);
    }

    /// Start both elements in the same turn.
    ///
    /// If either refuses, both are paused and the transport stays stopped.
    pub async fn play(&self) -> PlaybackResult<()> {
        let (reference, user) = tokio::join!(self.reference.play(), self.user.play());

        if let Err(e) = reference.and(user) {
            tracing::error!("Error playing videos: {}", e);
            self.revert_to_paused();
            return Err(e);
        }

        self.update(|s| s.is_playing = true);
        tracing::debug!("Playback started");
        Ok(())
    }

    pub fn pause(&self) {
        for element in self.each() {
            element.pause();
        }
        self.update(|s| s.is_playing = false);
    }

    pub async fn toggle_playback(&self) -> PlaybackResult<()> {
        if self.is_playing() {
            self.pause();
            Ok(())
        } else {
            self.play().await
        }
    }

    /// A play request the host reported as refused after the fact.
    pub fn on_play_rejected(&self, element: &str, reason: &str) {
        tracing::warn!("Playback rejected by {}: {}", element, reason);
        self.revert_to_paused();
    }

    fn revert_to_paused(&self) {
        for element in self.each() {
            element.pause();
        }
        self.update(|s| s.is_playing = false);
    }

    /// Seek both elements to `fraction` of the reference duration.
    ///
    /// Returns `false` (and does nothing) while the duration is unknown.
    pub fn seek(&self, fraction: f64) -> bool {
        let Some(duration) = known_duration(self.reference.duration()) else {
            tracing::debug!("Ignoring seek: reference duration unknown");
            return false;
        };
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.apply_time(fraction * duration);
        true
    }

    /// Seek both elements to an absolute position in seconds
    pub fn seek_to(&self, seconds: f64) {
        let mut target = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        if let Some(duration) = known_duration(self.reference.duration()) {
            target = target.min(duration);
        }
        self.apply_time(target);
    }

    fn apply_time(&self, seconds: f64) {
        for element in self.each() {
            element.set_current_time(seconds);
        }
        self.update(|s| s.current_time = seconds);
    }

    /// Rewind both elements and play
    pub async fn restart(&self) -> PlaybackResult<()> {
        self.apply_time(0.0);
        self.play().await
    }

    /// Pause and rewind both elements
    pub fn stop(&self) {
        self.pause();
        self.apply_time(0.0);
    }

    pub fn set_volume(&self, volume: f64) {
        let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 };
        self.update(|s| {
            s.volume = volume;
            if volume > 0.0 && s.muted {
                s.muted = false;
            }
        });
        self.apply_audio();
    }

    pub fn toggle_mute(&self) -> bool {
        let mut muted = false;
        self.update(|s| {
            s.muted = !s.muted;
            muted = s.muted;
        });
        self.apply_audio();
        muted
    }

    /// Refresh time/duration from the reference element and correct drift.
    pub fn tick(&self) -> PlaybackState {
        let current_time = self.reference.current_time();
        let duration = known_duration(self.reference.duration()).unwrap_or(0.0);
        let playing = self.is_playing();

        if let (true, Some(tolerance)) = (playing, self.drift_tolerance) {
            let drift = (self.user.current_time() - current_time).abs();
            if drift > tolerance {
                self.user.set_current_time(current_time);
                self.corrections.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    "Corrected {:.3}s drift on {} at {:.3}s",
                    drift,
                    self.user.label(),
                    current_time
                );
            }
        }

        self.update(|s| {
            s.current_time = current_time;
            s.duration = duration;
        });
        self.state()
    }

    /// Poll [`tick`](Self::tick) every `period` for as long as the returned
    /// handle lives.
    pub fn start_ticker(self: &Arc<Self>, period: Duration) -> ScheduledTask {
        let weak = Arc::downgrade(self);
        ScheduledTask::every("playback-tick", period, move || {
            if let Some(sync) = weak.upgrade() {
                sync.tick();
            }
        })
    }
}

impl std::fmt::Debug for DualPlaybackSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualPlaybackSync")
            .field("reference", &self.reference.label())
            .field("user", &self.user.label())
            .field("state", &*self.state.lock())
            .field("drift_tolerance", &self.drift_tolerance)
            .finish()
    }
}
