//! HTTP client for the pose-processing server
//!
//! `POST /upload` takes a multipart `video` field. The server answers with
//! either the stored filenames (played back through `/compare_feed`) or
//! direct URLs to the processed video.

use super::multipart::MultipartForm;
use super::{UploadError, UploadResult};
use serde::{Deserialize, Serialize};
use std::io::{self, Cursor, Read};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Largest slice of the body handed to the socket between cancel checks
const BODY_CHUNK: usize = 64 * 1024;

/// Successful `/upload` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadResponse {
    Filenames {
        raw_filename: String,
        landmarks_filename: String,
    },
    Processed {
        video_url: String,
        #[serde(default)]
        landmark_url: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Container extension to MIME type, for the formats browsers record and play
pub fn video_mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "mp4" | "m4v" => Some("video/mp4"),
        "webm" => Some("video/webm"),
        "mov" => Some("video/quicktime"),
        "avi" => Some("video/x-msvideo"),
        "mkv" => Some("video/x-matroska"),
        "ogv" => Some("video/ogg"),
        _ => None,
    }
}

pub fn is_video_mime(content_type: &str) -> bool {
    content_type.starts_with("video/")
}

/// Request body that stops feeding the socket once `cancel` fires.
///
/// Fails with `ConnectionAborted` rather than `Interrupted`, which
/// `io::copy` would retry.
struct CancellableBody {
    inner: Cursor<Vec<u8>>,
    cancel: CancellationToken,
}

impl Read for CancellableBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "upload cancelled",
            ));
        }
        let len = buf.len().min(BODY_CHUNK);
        self.inner.read(&mut buf[..len])
    }
}

#[derive(Clone)]
pub struct UploadClient {
    agent: ureq::Agent,
    server_url: String,
}

impl std::fmt::Debug for UploadClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadClient")
            .field("server_url", &self.server_url)
            .finish()
    }
}

impl UploadClient {
    pub fn new(server_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            server_url: server_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Streaming comparison URL for an uploaded video and its landmarks
    pub fn compare_feed_url(&self, raw_filename: &str, landmarks_filename: &str) -> String {
        format!(
            "{}/compare_feed?video={}&landmarks={}",
            self.server_url,
            urlencoding::encode(raw_filename),
            urlencoding::encode(landmarks_filename)
        )
    }

    /// URL the reference pane should play for a successful upload
    pub fn playback_url(&self, response: &UploadResponse) -> String {
        match response {
            UploadResponse::Filenames {
                raw_filename,
                landmarks_filename,
            } => self.compare_feed_url(raw_filename, landmarks_filename),
            UploadResponse::Processed { video_url, .. } => video_url.clone(),
        }
    }

    /// Blocking upload. Call from a blocking context.
    ///
    /// The body is streamed, so cancelling `cancel` aborts the transfer and
    /// closes the connection.
    pub fn upload_blocking(
        &self,
        filename: &str,
        content_type: &str,
        data: &[u8],
        cancel: &CancellationToken,
    ) -> UploadResult<UploadResponse> {
        if !is_video_mime(content_type) {
            return Err(UploadError::NotAVideo);
        }

        let url = format!("{}/upload", self.server_url);
        let (form_type, body) = MultipartForm::new()
            .file("video", filename, content_type, data)
            .finish();

        tracing::info!("Uploading {} ({} bytes) to {}", filename, data.len(), url);

        let length = body.len();
        let body = CancellableBody {
            inner: Cursor::new(body),
            cancel: cancel.clone(),
        };
        let response = match self
            .agent
            .post(&url)
            .set("Content-Type", &form_type)
            .set("Content-Length", &length.to_string())
            .send(body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let text = response.into_string().unwrap_or_default();
                let message = serde_json::from_str::<ErrorBody>(&text)
                    .map(|b| b.error)
                    .unwrap_or_else(|_| format!("HTTP {}", code));
                tracing::warn!("Upload rejected with {}: {}", code, message);
                return Err(UploadError::Server(message));
            }
            Err(ureq::Error::Transport(_)) if cancel.is_cancelled() => {
                tracing::info!("Upload of {} aborted", filename);
                return Err(UploadError::Cancelled);
            }
            Err(ureq::Error::Transport(transport)) => {
                tracing::warn!("Upload transport error: {}", transport);
                return Err(UploadError::Transport(transport.to_string()));
            }
        };

        let text = response.into_string()?;
        let parsed: UploadResponse = serde_json::from_str(&text)
            .map_err(|e| UploadError::MalformedResponse(e.to_string()))?;
        tracing::info!("Upload accepted: {:?}", parsed);
        Ok(parsed)
    }

    /// Upload on the blocking pool. Resolves with
    /// [`UploadError::Cancelled`] as soon as `cancel` fires; the blocking
    /// side stops sending and drops the connection on its next write.
    pub async fn upload(
        &self,
        filename: String,
        content_type: String,
        data: Vec<u8>,
        cancel: &CancellationToken,
    ) -> UploadResult<UploadResponse> {
        let client = self.clone();
        let token = cancel.clone();
        let task = tokio::task::spawn_blocking(move || {
            client.upload_blocking(&filename, &content_type, &data, &token)
        });

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Upload cancelled");
                Err(UploadError::Cancelled)
            }
            joined = task => joined.map_err(|e| UploadError::TaskFailed(e.to_string()))?,
        }
    }

    /// Read a video file from disk and upload it
    pub async fn upload_file(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> UploadResult<UploadResponse> {
        let content_type = video_mime_for_path(path).ok_or(UploadError::NotAVideo)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video")
            .to_string();
        let data = tokio::fs::read(path).await?;
        self.upload(filename, content_type.to_string(), data, cancel)
            .await
    }
}
