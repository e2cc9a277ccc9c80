//! Recorded clips and their revocable URLs
//!
//! The registry plays the role of the browser's object-URL table: a clip is
//! reachable through its URL until the URL is revoked.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Prefix of every URL issued by [`ClipRegistry`]
pub const CLIP_URL_PREFIX: &str = "blob:dance-compare/";

/// An assembled recording
#[derive(Debug, Clone)]
pub struct Clip {
    pub mime_type: String,
    pub data: Vec<u8>,
    /// Number of segments the clip was assembled from
    pub segment_count: usize,
    pub created_at: DateTime<Utc>,
}

impl Clip {
    /// Concatenate recorded segments, in order, into one clip
    pub fn from_segments(mime_type: impl Into<String>, segments: Vec<Vec<u8>>) -> Self {
        let segment_count = segments.len();
        let data = segments.concat();
        Self {
            mime_type: mime_type.into(),
            data,
            segment_count,
            created_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// File extension matching the clip's container
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "video/mp4" => "mp4",
            _ => "webm",
        }
    }
}

/// Table of live clip URLs
#[derive(Default)]
pub struct ClipRegistry {
    clips: Mutex<HashMap<String, Arc<Clip>>>,
}

impl ClipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a clip and return its URL
    pub fn create_url(&self, clip: Clip) -> String {
        let url = format!("{}{}", CLIP_URL_PREFIX, Uuid::new_v4());
        tracing::debug!("Created clip URL {} ({} bytes)", url, clip.len());
        self.clips.lock().insert(url.clone(), Arc::new(clip));
        url
    }

    pub fn resolve(&self, url: &str) -> Option<Arc<Clip>> {
        self.clips.lock().get(url).cloned()
    }

    /// Revoke a URL. Returns `false` if it was unknown or already revoked.
    pub fn revoke(&self, url: &str) -> bool {
        let removed = self.clips.lock().remove(url).is_some();
        if removed {
            tracing::debug!("Revoked clip URL {}", url);
        }
        removed
    }

    /// Number of URLs that have not been revoked
    pub fn outstanding(&self) -> usize {
        self.clips.lock().len()
    }

    /// Whether `url` has the shape of a clip URL (issued here or not)
    pub fn is_clip_url(url: &str) -> bool {
        url.starts_with(CLIP_URL_PREFIX)
    }
}
