//! In-memory camera for tests

use super::traits::{
    CameraInfo, CameraSource, CaptureError, CaptureResult, MediaStream, Resolution, SegmentReceiver,
    StreamConstraints, TrackInfo, TrackKind,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy)]
pub enum FakeOutcome {
    Grant,
    Deny,
    NoDevice,
}

pub struct FakeCamera {
    outcome: FakeOutcome,
    acquired: AtomicUsize,
    last: Mutex<Option<Arc<FakeStream>>>,
}

impl FakeCamera {
    pub fn new(outcome: FakeOutcome) -> Self {
        Self {
            outcome,
            acquired: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn acquire_count(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn last_stream(&self) -> Option<Arc<FakeStream>> {
        self.last.lock().clone()
    }
}

#[async_trait]
impl CameraSource for FakeCamera {
    fn list_cameras(&self) -> Vec<CameraInfo> {
        vec![CameraInfo {
            id: "0".to_string(),
            name: "Fake Camera".to_string(),
            supported_resolutions: vec![Resolution {
                width: 640,
                height: 480,
            }],
        }]
    }

    async fn acquire(&self, constraints: &StreamConstraints) -> CaptureResult<Arc<dyn MediaStream>> {
        match self.outcome {
            FakeOutcome::Deny => Err(CaptureError::PermissionDenied("denied by user".to_string())),
            FakeOutcome::NoDevice => Err(CaptureError::DeviceUnavailable("no camera".to_string())),
            FakeOutcome::Grant => {
                let n = self.acquired.fetch_add(1, Ordering::SeqCst);
                let stream = Arc::new(FakeStream::new(format!("fake-stream-{n}"), constraints.audio));
                *self.last.lock() = Some(stream.clone());
                Ok(stream)
            }
        }
    }
}

pub struct FakeStream {
    id: String,
    audio: bool,
    live: AtomicBool,
    stops: AtomicUsize,
    taps: Mutex<Vec<mpsc::UnboundedSender<Vec<u8>>>>,
}

impl FakeStream {
    fn new(id: String, audio: bool) -> Self {
        Self {
            id,
            audio,
            live: AtomicBool::new(true),
            stops: AtomicUsize::new(0),
            taps: Mutex::new(Vec::new()),
        }
    }

    /// Deliver a segment to every open recorder tap
    pub fn emit(&self, data: &[u8]) {
        self.taps.lock().retain(|tap| tap.send(data.to_vec()).is_ok());
    }

    /// Recorder taps still open
    pub fn open_taps(&self) -> usize {
        self.taps.lock().len()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl MediaStream for FakeStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        let mut tracks = vec![TrackInfo {
            id: format!("{}-video", self.id),
            kind: TrackKind::Video,
            label: "Fake Camera".to_string(),
        }];
        if self.audio {
            tracks.push(TrackInfo {
                id: format!("{}-audio", self.id),
                kind: TrackKind::Audio,
                label: "Fake Microphone".to_string(),
            });
        }
        tracks
    }

    fn mime_type(&self) -> &str {
        "video/webm"
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn record(&self) -> CaptureResult<SegmentReceiver> {
        if !self.is_live() {
            return Err(CaptureError::StreamEnded);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.taps.lock().push(tx);
        Ok(rx)
    }

    fn finish_recording(&self) {
        self.taps.lock().clear();
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.taps.lock().clear();
        }
    }
}
