//! Webcam capture using nokhwa
//!
//! A dedicated thread owns the device and fans each raw frame out to the open
//! recorder taps. Each tap is an FFmpeg process that encodes H.264 into
//! fragmented MP4 on stdout, so the segments it produces concatenate into a
//! playable file. The camera is opened before `acquire` returns so that
//! permission and availability failures surface to the caller.

use super::traits::{
    CameraInfo, CameraSource, CaptureError, CaptureResult, MediaStream, Resolution, SegmentReceiver,
    StreamConstraints, TrackInfo, TrackKind,
};
use async_trait::async_trait;
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
};
use nokhwa::{Camera, NokhwaError};
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::process::{ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Container produced by every recorder tap
pub const RECORDING_MIME: &str = "video/mp4";

/// Bytes read from the encoder per segment
const SEGMENT_READ_SIZE: usize = 64 * 1024;

/// Get list of available cameras
pub fn get_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };

                CameraInfo {
                    id,
                    name: info.human_name(),
                    supported_resolutions: vec![
                        Resolution {
                            width: 1280,
                            height: 720,
                        },
                        Resolution {
                            width: 640,
                            height: 480,
                        },
                    ],
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

fn camera_index(device_id: Option<&str>) -> CameraIndex {
    match device_id {
        Some(id) => match id.parse::<u32>() {
            Ok(idx) => CameraIndex::Index(idx),
            Err(_) => CameraIndex::String(id.to_string()),
        },
        None => CameraIndex::Index(0),
    }
}

fn classify(error: &NokhwaError) -> CaptureError {
    let message = error.to_string();
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
        CaptureError::PermissionDenied(message)
    } else {
        CaptureError::DeviceUnavailable(message)
    }
}

/// How raw camera frames are handed to FFmpeg
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncoderInput {
    /// Concatenated JPEG frames
    Mjpeg,
    /// Fixed-size frames in the given FFmpeg pixel format
    Raw(&'static str),
}

impl EncoderInput {
    fn for_format(format: FrameFormat) -> Self {
        match format {
            FrameFormat::MJPEG => EncoderInput::Mjpeg,
            FrameFormat::YUYV => EncoderInput::Raw("yuyv422"),
            FrameFormat::NV12 => EncoderInput::Raw("nv12"),
            FrameFormat::RAWRGB => EncoderInput::Raw("rgb24"),
            other => {
                tracing::warn!("Unknown camera format {:?}, assuming yuyv422", other);
                EncoderInput::Raw("yuyv422")
            }
        }
    }
}

/// What the camera actually delivers once opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameGeometry {
    width: u32,
    height: u32,
    fps: u32,
    input: EncoderInput,
}

/// FFmpeg arguments: camera frames on stdin, fragmented H.264 MP4 on stdout
fn encoder_args(geometry: &FrameGeometry) -> Vec<String> {
    let fps = geometry.fps.max(1);
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-nostats"]
        .iter()
        .map(|a| a.to_string())
        .collect();

    match geometry.input {
        EncoderInput::Mjpeg => {
            args.extend(["-f".into(), "mjpeg".into()]);
        }
        EncoderInput::Raw(pixel_format) => {
            args.extend([
                "-f".into(),
                "rawvideo".into(),
                "-pixel_format".into(),
                pixel_format.to_string(),
                "-video_size".into(),
                format!("{}x{}", geometry.width, geometry.height),
            ]);
        }
    }

    args.extend([
        "-framerate".into(),
        fps.to_string(),
        "-i".into(),
        "-".into(),
        "-an".into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "veryfast".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-crf".into(),
        "23".into(),
        "-g".into(),
        (fps * 2).to_string(),
        // Fragments can be emitted as they are encoded and simply concatenated.
        "-movflags".into(),
        "frag_keyframe+empty_moov+default_base_moof".into(),
        "-f".into(),
        "mp4".into(),
        "-".into(),
    ]);
    args
}

/// Recorder tap: the stdin of one FFmpeg encoder. Dropping it ends the take.
struct EncoderTap {
    stdin: ChildStdin,
    frames: u64,
}

impl EncoderTap {
    fn write_frame(&mut self, data: &[u8]) -> bool {
        match self.stdin.write_all(data) {
            Ok(()) => {
                self.frames += 1;
                true
            }
            Err(e) => {
                tracing::warn!("Encoder rejected frame {}: {}", self.frames, e);
                false
            }
        }
    }
}

/// Start an encoder and a reader thread that forwards its output as segments
fn spawn_encoder(geometry: &FrameGeometry) -> CaptureResult<(EncoderTap, SegmentReceiver)> {
    let mut child = Command::new("ffmpeg")
        .args(encoder_args(geometry))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| CaptureError::Encoder(format!("failed to start ffmpeg: {e}")))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| CaptureError::Encoder("ffmpeg stdin unavailable".to_string()))?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| CaptureError::Encoder("ffmpeg stdout unavailable".to_string()))?;

    tracing::info!(
        "Started FFmpeg encoder: {}x{} @ {}fps, input={:?}",
        geometry.width,
        geometry.height,
        geometry.fps,
        geometry.input
    );

    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let mut buf = vec![0u8; SEGMENT_READ_SIZE];
        let mut total = 0usize;
        loop {
            match stdout.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    total += n;
                    if tx.send(buf[..n].to_vec()).is_err() {
                        // Take was discarded.
                        let _ = child.kill();
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("Failed to read encoder output: {}", e);
                    break;
                }
            }
        }
        // Closing the channel is what ends the take for the recorder.
        drop(tx);

        match child.wait_with_output() {
            Ok(output) if !output.status.success() => tracing::warn!(
                "FFmpeg exited with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ),
            Ok(_) => tracing::info!("FFmpeg encoder finished: {} bytes", total),
            Err(e) => tracing::warn!("Failed to wait for FFmpeg: {}", e),
        }
    });

    Ok((EncoderTap { stdin, frames: 0 }, rx))
}

/// Camera source backed by the platform's native capture API
#[derive(Debug, Default)]
pub struct NokhwaCameraSource;

impl NokhwaCameraSource {
    pub fn new() -> Self {
        Self
    }
}

struct Opened {
    label: String,
    geometry: FrameGeometry,
}

#[derive(Default)]
struct Shared {
    live: AtomicBool,
    taps: Mutex<Vec<EncoderTap>>,
}

#[async_trait]
impl CameraSource for NokhwaCameraSource {
    fn list_cameras(&self) -> Vec<CameraInfo> {
        get_cameras()
    }

    async fn acquire(&self, constraints: &StreamConstraints) -> CaptureResult<Arc<dyn MediaStream>> {
        if constraints.audio {
            tracing::warn!("Audio capture is not supported by the webcam backend; recording video only");
        }

        let index = camera_index(constraints.device_id.as_deref());
        let requested = CameraFormat::new_from(
            constraints.resolution.width,
            constraints.resolution.height,
            FrameFormat::MJPEG,
            constraints.fps,
        );
        let shared = Arc::new(Shared::default());
        shared.live.store(true, Ordering::SeqCst);

        let (ready_tx, ready_rx) = oneshot::channel::<CaptureResult<Opened>>();
        let thread_shared = shared.clone();

        std::thread::spawn(move || {
            let format = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(requested));
            let mut camera = match Camera::new(index.clone(), format) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Failed to open camera {:?}: {:?}", index, e);
                    let _ = ready_tx.send(Err(classify(&e)));
                    return;
                }
            };

            if let Err(e) = camera.open_stream() {
                tracing::error!("Failed to open camera stream: {:?}", e);
                let _ = ready_tx.send(Err(classify(&e)));
                return;
            }

            let camera_format = camera.camera_format();
            tracing::info!(
                "Webcam opened: {}x{} @ {}fps, format={:?}",
                camera_format.resolution().width(),
                camera_format.resolution().height(),
                camera_format.frame_rate(),
                camera_format.format()
            );

            let opened = Opened {
                label: camera.info().human_name(),
                geometry: FrameGeometry {
                    width: camera_format.resolution().width(),
                    height: camera_format.resolution().height(),
                    fps: camera_format.frame_rate(),
                    input: EncoderInput::for_format(camera_format.format()),
                },
            };
            if ready_tx.send(Ok(opened)).is_err() {
                // Caller went away before the camera opened.
                let _ = camera.stop_stream();
                return;
            }

            let mut frame_count: u64 = 0;
            while thread_shared.live.load(Ordering::SeqCst) {
                // Blocks until the camera delivers the next frame.
                match camera.frame() {
                    Ok(frame) => {
                        let data = frame.buffer();
                        thread_shared
                            .taps
                            .lock()
                            .retain_mut(|tap| tap.write_frame(data));
                        frame_count += 1;
                    }
                    Err(e) => {
                        tracing::debug!("Failed to capture frame: {:?}", e);
                    }
                }
            }

            if let Err(e) = camera.stop_stream() {
                tracing::warn!("Error stopping camera stream: {:?}", e);
            }
            tracing::info!("Webcam capture thread stopped after {} frames", frame_count);
        });

        let opened = ready_rx
            .await
            .map_err(|_| CaptureError::DeviceUnavailable("capture thread exited".to_string()))??;

        Ok(Arc::new(WebcamStream {
            id: uuid::Uuid::new_v4().to_string(),
            label: opened.label,
            geometry: opened.geometry,
            shared,
        }))
    }
}

/// Live stream from [`NokhwaCameraSource`]
pub struct WebcamStream {
    id: String,
    label: String,
    geometry: FrameGeometry,
    shared: Arc<Shared>,
}

impl MediaStream for WebcamStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        vec![TrackInfo {
            id: format!("{}-video", self.id),
            kind: TrackKind::Video,
            label: self.label.clone(),
        }]
    }

    fn mime_type(&self) -> &str {
        RECORDING_MIME
    }

    fn is_live(&self) -> bool {
        self.shared.live.load(Ordering::SeqCst)
    }

    fn record(&self) -> CaptureResult<SegmentReceiver> {
        if !self.is_live() {
            return Err(CaptureError::StreamEnded);
        }
        let (tap, segments) = spawn_encoder(&self.geometry)?;
        self.shared.taps.lock().push(tap);
        Ok(segments)
    }

    fn finish_recording(&self) {
        let taps = std::mem::take(&mut *self.shared.taps.lock());
        for tap in &taps {
            tracing::info!("Closing encoder after {} frames", tap.frames);
        }
    }

    fn stop(&self) {
        if self.shared.live.swap(false, Ordering::SeqCst) {
            self.shared.taps.lock().clear();
            tracing::info!("Webcam stream {} stopped", self.id);
        }
    }
}

impl Drop for WebcamStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_index_parsing() {
        assert_eq!(camera_index(None), CameraIndex::Index(0));
        assert_eq!(camera_index(Some("2")), CameraIndex::Index(2));
        assert_eq!(
            camera_index(Some("/dev/video4")),
            CameraIndex::String("/dev/video4".to_string())
        );
    }

    #[test]
    fn test_encoder_input_for_format() {
        assert_eq!(EncoderInput::for_format(FrameFormat::MJPEG), EncoderInput::Mjpeg);
        assert_eq!(EncoderInput::for_format(FrameFormat::YUYV), EncoderInput::Raw("yuyv422"));
        assert_eq!(EncoderInput::for_format(FrameFormat::NV12), EncoderInput::Raw("nv12"));
    }

    #[test]
    fn test_raw_encoder_args() {
        let args = encoder_args(&FrameGeometry {
            width: 640,
            height: 480,
            fps: 30,
            input: EncoderInput::Raw("yuyv422"),
        });
        let joined = args.join(" ");

        assert!(joined.contains("-f rawvideo -pixel_format yuyv422 -video_size 640x480"));
        assert!(joined.contains("-framerate 30 -i -"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-g 60"));
        assert!(joined.contains("-movflags frag_keyframe+empty_moov+default_base_moof"));
        assert!(joined.ends_with("-f mp4 -"));
    }

    #[test]
    fn test_mjpeg_encoder_args_skip_geometry() {
        let args = encoder_args(&FrameGeometry {
            width: 1280,
            height: 720,
            fps: 0,
            input: EncoderInput::Mjpeg,
        });
        let joined = args.join(" ");

        assert!(joined.contains("-f mjpeg -framerate 1 -i -"));
        assert!(!joined.contains("-video_size"));
    }
}
