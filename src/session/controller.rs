//! Session controller
//!
//! Owns the step machine and both video references. Child components report
//! completion through the `on_*` callbacks; each callback is only accepted
//! in the step it belongs to, so a duplicate completion cannot advance the
//! flow twice.

use super::state::{Session, Step};
use crate::capture::ClipRegistry;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Cannot {action} during the {step:?} step")]
    WrongStep { action: &'static str, step: Step },

    #[error("Session was reset")]
    Superseded,
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Events emitted as the session changes
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StepChanged { session_id: Uuid, step: Step },
    Analyzing { session_id: Uuid, active: bool },
    /// A fresh session replaced the previous one
    Reset { session_id: Uuid },
}

pub struct SessionController {
    session: RwLock<Session>,
    clips: Arc<ClipRegistry>,
    placeholder_url: String,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(clips: Arc<ClipRegistry>, placeholder_url: impl Into<String>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        let session = Session::new();
        tracing::info!("Session {} started", session.id);
        Self {
            session: RwLock::new(session),
            clips,
            placeholder_url: placeholder_url.into(),
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn snapshot(&self) -> Session {
        self.session.read().clone()
    }

    pub fn step(&self) -> Step {
        self.session.read().step
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    /// Move from `from` to the next step, applying `update` under the lock
    fn advance<F>(&self, action: &'static str, from: Step, to: Step, update: F) -> SessionResult<()>
    where
        F: FnOnce(&mut Session),
    {
        let session_id = {
            let mut session = self.session.write();
            if session.step != from {
                tracing::warn!("Ignoring {} in step {:?}", action, session.step);
                return Err(SessionError::WrongStep {
                    action,
                    step: session.step,
                });
            }
            update(&mut session);
            session.step = to;
            session.id
        };

        tracing::info!("Session {}: {:?} -> {:?}", session_id, from, to);
        self.emit(SessionEvent::StepChanged {
            session_id,
            step: to,
        });
        Ok(())
    }

    /// The reference video is ready
    pub fn on_reference_uploaded(&self, url: impl Into<String>) -> SessionResult<()> {
        let url = url.into();
        self.advance("set the reference video", Step::Upload, Step::Record, |s| {
            s.reference_video = Some(url);
        })
    }

    /// The user accepted a recording
    pub fn on_user_video_recorded(&self, url: impl Into<String>) -> SessionResult<()> {
        let url = url.into();
        self.advance("set the user video", Step::Record, Step::Compare, |s| {
            s.user_video = Some(url);
        })
    }

    /// Continue without uploading, using the placeholder video
    pub fn skip_upload(&self) -> SessionResult<()> {
        self.on_reference_uploaded(self.placeholder_url.clone())
    }

    /// Continue without recording, using the placeholder video
    pub fn skip_recording(&self) -> SessionResult<()> {
        self.on_user_video_recorded(self.placeholder_url.clone())
    }

    /// Jump straight to feedback
    pub fn on_get_feedback(&self) -> SessionResult<()> {
        self.advance("show feedback", Step::Compare, Step::Feedback, |s| {
            s.is_analyzing = false;
        })
    }

    /// Show the analyzing state for `delay`, then move to feedback.
    ///
    /// Fails with [`SessionError::Superseded`] if the session was reset while
    /// waiting.
    pub async fn request_feedback(&self, delay: Duration) -> SessionResult<()> {
        let session_id = {
            let mut session = self.session.write();
            if session.step != Step::Compare {
                return Err(SessionError::WrongStep {
                    action: "request feedback",
                    step: session.step,
                });
            }
            if session.is_analyzing {
                tracing::debug!("Feedback analysis already running");
                return Ok(());
            }
            session.is_analyzing = true;
            session.id
        };
        self.emit(SessionEvent::Analyzing {
            session_id,
            active: true,
        });
        tracing::info!("Analyzing session {}", session_id);

        tokio::time::sleep(delay).await;

        if self.session.read().id != session_id {
            return Err(SessionError::Superseded);
        }
        self.emit(SessionEvent::Analyzing {
            session_id,
            active: false,
        });
        self.on_get_feedback()
    }

    /// End the session: revoke owned clip URLs and start over at upload
    pub fn reset(&self) {
        let (old, session_id) = {
            let mut session = self.session.write();
            let fresh = Session::new();
            let session_id = fresh.id;
            (std::mem::replace(&mut *session, fresh), session_id)
        };

        for url in [old.reference_video, old.user_video].into_iter().flatten() {
            if ClipRegistry::is_clip_url(&url) && self.clips.revoke(&url) {
                tracing::debug!("Revoked {}", url);
            }
        }

        tracing::info!("Session {} ended, started {}", old.id, session_id);
        self.emit(SessionEvent::Reset { session_id });
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session", &*self.session.read())
            .finish()
    }
}
