//! Fullscreen comparison overlay
//!
//! Tracks whether the two-pane view is fullscreen and whether the transport
//! controls are shown. While fullscreen and playing, controls hide after an
//! idle timeout; any pointer movement shows them again and restarts the
//! timer.

use crate::utils::ScheduledTask;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;

/// Default idle time before controls hide
pub const DEFAULT_IDLE_HIDE: Duration = Duration::from_millis(3000);

/// Overlay snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayState {
    pub is_fullscreen: bool,
    pub controls_visible: bool,
    /// Pointer is over the control bar
    pub hovering: bool,
    pub is_playing: bool,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self {
            is_fullscreen: false,
            controls_visible: true,
            hovering: false,
            is_playing: false,
        }
    }
}

impl OverlayState {
    /// Whether the control bar should be drawn
    pub fn show_controls(&self) -> bool {
        self.controls_visible || self.hovering
    }
}

struct Inner {
    state: OverlayState,
    idle_timer: Option<ScheduledTask>,
    generation: u64,
}

struct Shared {
    inner: Mutex<Inner>,
    status: watch::Sender<OverlayState>,
}

impl Shared {
    fn publish(&self, state: &OverlayState) {
        self.status.send_replace(state.clone());
    }

    fn on_idle(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }
        inner.idle_timer = None;
        if inner.state.is_fullscreen && inner.state.is_playing && inner.state.controls_visible {
            inner.state.controls_visible = false;
            tracing::debug!("Hiding controls after idle timeout");
            self.publish(&inner.state);
        }
    }
}

/// Fullscreen / control visibility state machine
pub struct OverlayController {
    shared: Arc<Shared>,
    idle_timeout: Duration,
}

impl Default for OverlayController {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_HIDE)
    }
}

impl OverlayController {
    pub fn new(idle_timeout: Duration) -> Self {
        let state = OverlayState::default();
        let (status, _) = watch::channel(state.clone());
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state,
                    idle_timer: None,
                    generation: 0,
                }),
                status,
            }),
            idle_timeout,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<OverlayState> {
        self.shared.status.subscribe()
    }

    pub fn state(&self) -> OverlayState {
        self.shared.inner.lock().state.clone()
    }

    /// Whether an idle timer is pending
    pub fn timer_armed(&self) -> bool {
        self.shared
            .inner
            .lock()
            .idle_timer
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    fn arm_timer(&self, inner: &mut Inner) {
        inner.generation += 1;
        let generation = inner.generation;
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        // Replacing the handle aborts the previous timer.
        inner.idle_timer = Some(ScheduledTask::after(
            "overlay-idle",
            self.idle_timeout,
            move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_idle(generation);
                }
            },
        ));
    }

    fn disarm_timer(inner: &mut Inner) {
        inner.generation += 1;
        inner.idle_timer = None;
    }

    pub fn enter_fullscreen(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.state.is_fullscreen {
            return;
        }
        inner.state.is_fullscreen = true;
        inner.state.controls_visible = true;
        self.arm_timer(&mut inner);
        tracing::info!("Entered fullscreen comparison");
        self.shared.publish(&inner.state);
    }

    /// Leave fullscreen. Always lands on the canonical state: windowed with
    /// controls visible, no timer pending.
    pub fn exit_fullscreen(&self) {
        let mut inner = self.shared.inner.lock();
        Self::disarm_timer(&mut inner);
        let was_fullscreen = inner.state.is_fullscreen;
        inner.state.is_fullscreen = false;
        inner.state.controls_visible = true;
        inner.state.hovering = false;
        if was_fullscreen {
            tracing::info!("Exited fullscreen comparison");
        }
        self.shared.publish(&inner.state);
    }

    pub fn toggle_fullscreen(&self) {
        if self.state().is_fullscreen {
            self.exit_fullscreen();
        } else {
            self.enter_fullscreen();
        }
    }

    /// The platform reported a fullscreen change (e.g. the user pressed
    /// Escape).
    pub fn on_fullscreen_change(&self, is_fullscreen: bool) {
        if is_fullscreen {
            self.enter_fullscreen();
        } else {
            self.exit_fullscreen();
        }
    }

    /// Show controls and restart the idle timer. Ignored outside fullscreen.
    pub fn on_pointer_move(&self) {
        let mut inner = self.shared.inner.lock();
        if !inner.state.is_fullscreen {
            return;
        }
        let changed = !inner.state.controls_visible;
        inner.state.controls_visible = true;
        self.arm_timer(&mut inner);
        if changed {
            self.shared.publish(&inner.state);
        }
    }

    /// Mirror the transport state; controls only auto-hide while playing.
    pub fn set_playing(&self, is_playing: bool) {
        let mut inner = self.shared.inner.lock();
        if inner.state.is_playing == is_playing {
            return;
        }
        inner.state.is_playing = is_playing;
        if is_playing {
            if inner.state.is_fullscreen {
                self.arm_timer(&mut inner);
            }
        } else {
            Self::disarm_timer(&mut inner);
            inner.state.controls_visible = true;
        }
        self.shared.publish(&inner.state);
    }

    pub fn set_hovering(&self, hovering: bool) {
        let mut inner = self.shared.inner.lock();
        if inner.state.hovering != hovering {
            inner.state.hovering = hovering;
            self.shared.publish(&inner.state);
        }
    }

    /// Cancel any pending timer
    pub fn shutdown(&self) {
        Self::disarm_timer(&mut self.shared.inner.lock());
    }
}

impl Drop for OverlayController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE: Duration = Duration::from_millis(3000);

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_controls_hide_after_idle_while_playing() {
        let overlay = OverlayController::new(IDLE);
        overlay.enter_fullscreen();
        overlay.set_playing(true);

        advance(2900).await;
        assert!(overlay.state().controls_visible);

        advance(200).await;
        let state = overlay.state();
        assert!(state.is_fullscreen);
        assert!(!state.controls_visible);
        assert!(!state.show_controls());
    }

    #[tokio::test(start_paused = true)]
    async fn test_controls_stay_while_paused() {
        let overlay = OverlayController::new(IDLE);
        overlay.enter_fullscreen();

        advance(5000).await;

        assert!(overlay.state().controls_visible);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pointer_move_restarts_timer() {
        let overlay = OverlayController::new(IDLE);
        overlay.enter_fullscreen();
        overlay.set_playing(true);

        advance(2000).await;
        overlay.on_pointer_move();
        advance(2000).await;
        // 4s since fullscreen, only 2s since the last move.
        assert!(overlay.state().controls_visible);

        advance(1100).await;
        assert!(!overlay.state().controls_visible);

        overlay.on_pointer_move();
        assert!(overlay.state().controls_visible);
        assert!(overlay.timer_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fullscreen_round_trip_restores_canonical_state() {
        // Exit with the timer pending.
        let overlay = OverlayController::new(IDLE);
        overlay.set_playing(true);
        overlay.toggle_fullscreen();
        advance(1000).await;
        overlay.toggle_fullscreen();
        let state = overlay.state();
        assert!(!state.is_fullscreen);
        assert!(state.controls_visible);
        assert!(!overlay.timer_armed());

        // Exit after the timer already hid the controls.
        overlay.toggle_fullscreen();
        advance(3500).await;
        assert!(!overlay.state().controls_visible);
        overlay.toggle_fullscreen();
        let state = overlay.state();
        assert!(!state.is_fullscreen);
        assert!(state.controls_visible);

        // A stale timer cannot hide controls after exit.
        advance(5000).await;
        assert!(overlay.state().controls_visible);
    }

    #[tokio::test(start_paused = true)]
    async fn test_platform_exit_notification() {
        let overlay = OverlayController::new(IDLE);
        overlay.set_playing(true);
        overlay.on_fullscreen_change(true);
        advance(3100).await;
        assert!(!overlay.state().controls_visible);

        overlay.on_fullscreen_change(false);

        let state = overlay.state();
        assert!(!state.is_fullscreen && state.controls_visible);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_shows_controls_and_cancels_timer() {
        let overlay = OverlayController::new(IDLE);
        overlay.enter_fullscreen();
        overlay.set_playing(true);
        advance(3100).await;
        assert!(!overlay.state().controls_visible);

        overlay.set_playing(false);

        assert!(overlay.state().controls_visible);
        assert!(!overlay.timer_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pointer_move_ignored_when_windowed() {
        let overlay = OverlayController::new(IDLE);
        overlay.on_pointer_move();
        assert!(!overlay.timer_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hover_keeps_controls_shown() {
        let overlay = OverlayController::new(IDLE);
        overlay.enter_fullscreen();
        overlay.set_playing(true);
        overlay.set_hovering(true);
        advance(3100).await;

        let state = overlay.state();
        assert!(!state.controls_visible);
        assert!(state.show_controls());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_hide() {
        let overlay = OverlayController::new(IDLE);
        let mut rx = overlay.subscribe();
        overlay.enter_fullscreen();
        overlay.set_playing(true);

        advance(3100).await;

        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().controls_visible);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_clears_pending_timer() {
        let overlay = OverlayController::new(IDLE);
        let rx = overlay.subscribe();
        overlay.enter_fullscreen();
        overlay.set_playing(true);

        drop(overlay);
        advance(5000).await;

        // Last published state is from before the drop.
        assert!(rx.borrow().controls_visible);
    }
}
