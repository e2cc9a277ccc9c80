//! Reference video upload
//!
//! Client for the external processing server and the upload step that
//! feeds its result into the session.

pub mod client;
pub mod flow;
pub mod multipart;

#[cfg(test)]
pub(crate) mod test_server;

pub use client::{is_video_mime, video_mime_for_path, UploadClient, UploadResponse};
pub use flow::{UploadStatus, UploadStep};
pub use multipart::MultipartForm;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Please upload a video file")]
    NotAVideo,

    #[error("An upload is already in progress")]
    InProgress,

    #[error("{0}")]
    Transport(String),

    /// Message from the server's `error` field
    #[error("{0}")]
    Server(String),

    #[error("Unexpected server response: {0}")]
    MalformedResponse(String),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Upload task failed: {0}")]
    TaskFailed(String),
}

pub type UploadResult<T> = Result<T, UploadError>;
