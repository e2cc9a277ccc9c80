//! Upload step
//!
//! Tracks progress and the user-facing error message for the reference
//! upload and hands the resulting playback URL to the session.

use super::client::{is_video_mime, video_mime_for_path, UploadClient};
use super::{UploadError, UploadResult};
use crate::session::{SessionController, SessionResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatus {
    pub is_uploading: bool,
    /// 0 while in flight, 100 once the server answered
    pub progress: u8,
    pub error: Option<String>,
    /// Playback URL of the last successful upload
    pub preview_url: Option<String>,
}

pub struct UploadStep {
    client: UploadClient,
    session: Arc<SessionController>,
    status: watch::Sender<UploadStatus>,
    in_flight: Mutex<Option<CancellationToken>>,
}

/// Clears the in-flight marker even if the upload future is dropped
struct InFlight<'a> {
    step: &'a UploadStep,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.step.in_flight.lock().take();
        self.step.status.send_if_modified(|s| {
            let was = s.is_uploading;
            s.is_uploading = false;
            was
        });
    }
}

impl UploadStep {
    pub fn new(client: UploadClient, session: Arc<SessionController>) -> Self {
        let (status, _) = watch::channel(UploadStatus::default());
        Self {
            client,
            session,
            status,
            in_flight: Mutex::new(None),
        }
    }

    pub fn client(&self) -> &UploadClient {
        &self.client
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> UploadStatus {
        self.status.borrow().clone()
    }

    pub fn is_uploading(&self) -> bool {
        self.status.borrow().is_uploading
    }

    fn reject(&self) -> UploadResult<String> {
        let err = UploadError::NotAVideo;
        let message = err.to_string();
        self.status.send_modify(|s| s.error = Some(message));
        Err(err)
    }

    fn fail(&self, err: &UploadError) {
        let message = format!("Failed to process video: {}", err);
        tracing::error!("{}", message);
        self.status.send_modify(|s| {
            s.is_uploading = false;
            s.progress = 100;
            s.error = Some(message);
        });
    }

    /// Upload a video file chosen from disk
    pub async fn upload_file(&self, path: &Path) -> UploadResult<String> {
        let Some(content_type) = video_mime_for_path(path) else {
            return self.reject();
        };
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video")
            .to_string();
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) => {
                let err = UploadError::Io(e);
                self.fail(&err);
                return Err(err);
            }
        };
        self.upload_bytes(filename, content_type.to_string(), data)
            .await
    }

    /// Upload an in-memory video. On success the session moves to the
    /// record step and the playback URL is returned.
    pub async fn upload_bytes(
        &self,
        filename: String,
        content_type: String,
        data: Vec<u8>,
    ) -> UploadResult<String> {
        if !is_video_mime(&content_type) {
            return self.reject();
        }

        let token = {
            let mut slot = self.in_flight.lock();
            if slot.is_some() {
                return Err(UploadError::InProgress);
            }
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };
        let _guard = InFlight { step: self };
        self.status.send_modify(|s| {
            s.is_uploading = true;
            s.progress = 0;
            s.error = None;
        });

        match self.client.upload(filename, content_type, data, &token).await {
            Ok(response) => {
                let url = self.client.playback_url(&response);
                self.status.send_modify(|s| {
                    s.is_uploading = false;
                    s.progress = 100;
                    s.preview_url = Some(url.clone());
                });
                if let Err(e) = self.session.on_reference_uploaded(url.clone()) {
                    tracing::warn!("Upload finished but the session moved on: {}", e);
                }
                Ok(url)
            }
            Err(UploadError::Cancelled) => {
                self.status.send_modify(|s| {
                    s.is_uploading = false;
                    s.progress = 0;
                });
                Err(UploadError::Cancelled)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Abort the upload in flight, if any
    pub fn cancel(&self) {
        if let Some(token) = self.in_flight.lock().as_ref() {
            token.cancel();
        }
    }

    /// Continue with the placeholder reference video
    pub fn skip(&self) -> SessionResult<()> {
        self.cancel();
        self.session.skip_upload()
    }

    /// Forget the previous attempt (new session)
    pub fn reset(&self) {
        self.cancel();
        self.status.send_modify(|s| {
            s.progress = 0;
            s.error = None;
            s.preview_url = None;
        });
    }
}
