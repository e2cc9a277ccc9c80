//! Overlay drawing
//!
//! [`draw_pose`] renders bones and joints onto any [`Canvas`].
//! [`FrameCanvas`] rasterizes onto an `image` buffer with `imageproc` and can
//! be snapshotted as PNG.

use super::landmarks::{PoseLandmarks, POSE_CONNECTIONS};
use anyhow::{bail, Context};
use image::RgbaImage;
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const GREEN: Rgba = Rgba([0x00, 0xFF, 0x00, 0xFF]);
    pub const RED: Rgba = Rgba([0xFF, 0x00, 0x00, 0xFF]);
    pub const TRANSPARENT: Rgba = Rgba([0, 0, 0, 0]);
}

/// Drawing surface in pixel coordinates
pub trait Canvas {
    fn size(&self) -> (u32, u32);
    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), color: Rgba, width: f32);
    fn draw_dot(&mut self, center: (f32, f32), radius: f32, color: Rgba);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawingStyle {
    pub connector_color: Rgba,
    pub connector_width: f32,
    pub landmark_color: Rgba,
    pub landmark_radius: f32,
}

impl Default for DrawingStyle {
    fn default() -> Self {
        Self {
            connector_color: Rgba::GREEN,
            connector_width: 4.0,
            landmark_color: Rgba::RED,
            landmark_radius: 3.0,
        }
    }
}

/// What [`draw_pose`] actually drew
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub lines: usize,
    pub dots: usize,
}

/// Draw connectors first, then landmarks on top. Keypoints below the
/// visibility threshold are skipped along with their bones.
pub fn draw_pose<C: Canvas + ?Sized>(
    canvas: &mut C,
    landmarks: &PoseLandmarks,
    style: &DrawingStyle,
) -> DrawStats {
    let (width, height) = canvas.size();
    let mut stats = DrawStats::default();

    for (a, b) in POSE_CONNECTIONS {
        let (Some(from), Some(to)) = (landmarks.visible(a), landmarks.visible(b)) else {
            continue;
        };
        canvas.draw_line(
            from.to_pixel(width, height),
            to.to_pixel(width, height),
            style.connector_color,
            style.connector_width,
        );
        stats.lines += 1;
    }

    for keypoint in landmarks.keypoints.iter().filter(|k| k.is_visible()) {
        canvas.draw_dot(
            keypoint.to_pixel(width, height),
            style.landmark_radius,
            style.landmark_color,
        );
        stats.dots += 1;
    }

    stats
}

/// Clip a segment to the rectangle `[0, max_x] x [0, max_y]`
/// (Liang-Barsky). `None` when nothing of it is inside.
fn clip_segment(
    from: (f32, f32),
    to: (f32, f32),
    max_x: f32,
    max_y: f32,
) -> Option<((f32, f32), (f32, f32))> {
    if ![from.0, from.1, to.0, to.1].iter().all(|v| v.is_finite()) {
        return None;
    }
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let (mut t0, mut t1) = (0.0f32, 1.0f32);

    for (p, q) in [
        (-dx, from.0),
        (dx, max_x - from.0),
        (-dy, from.1),
        (dy, max_y - from.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    Some((
        (from.0 + t0 * dx, from.1 + t0 * dy),
        (from.0 + t1 * dx, from.1 + t1 * dy),
    ))
}

/// RGBA8 raster backed by an [`RgbaImage`]
#[derive(Debug, Clone, PartialEq)]
pub struct FrameCanvas {
    image: RgbaImage,
}

impl FrameCanvas {
    /// Transparent canvas
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    /// Wrap an existing RGBA frame
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> anyhow::Result<Self> {
        let len = pixels.len();
        match RgbaImage::from_raw(width, height, pixels) {
            Some(image) => Ok(Self { image }),
            None => bail!(
                "frame is {} bytes, expected {} for {}x{} RGBA",
                len,
                width as usize * height as usize * 4,
                width,
                height
            ),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        self.image.get_pixel_checked(x, y).map(|p| Rgba(p.0))
    }

    pub fn clear(&mut self) {
        self.image.fill(0);
    }

    /// Encode the current contents as PNG
    pub fn encode_png(&self) -> anyhow::Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut encoder = png::Encoder::new(&mut out, self.width(), self.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .context("Failed to write PNG header")?;
        writer
            .write_image_data(self.image.as_raw())
            .context("Failed to write PNG data")?;
        writer.finish().context("Failed to finish PNG")?;
        Ok(out)
    }
}

impl Canvas for FrameCanvas {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Thick lines are drawn as parallel strokes along the segment normal.
    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), color: Rgba, width: f32) {
        let (w, h) = self.image.dimensions();
        if w == 0 || h == 0 {
            return;
        }
        let (max_x, max_y) = ((w - 1) as f32, (h - 1) as f32);
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let length = dx.hypot(dy);
        if !length.is_finite() {
            return;
        }
        if length == 0.0 {
            self.draw_dot(from, width / 2.0, color);
            return;
        }

        let (nx, ny) = (-dy / length, dx / length);
        let half = width.max(1.0) / 2.0;
        let strokes = (width.max(1.0) * 2.0).ceil() as usize;
        let pixel = image::Rgba(color.0);

        for k in 0..=strokes {
            let offset = -half + k as f32 * (2.0 * half / strokes as f32);
            let start = (from.0 + nx * offset, from.1 + ny * offset);
            let end = (to.0 + nx * offset, to.1 + ny * offset);
            if let Some((start, end)) = clip_segment(start, end, max_x, max_y) {
                draw_line_segment_mut(&mut self.image, start, end, pixel);
            }
        }
    }

    fn draw_dot(&mut self, center: (f32, f32), radius: f32, color: Rgba) {
        let (w, h) = self.image.dimensions();
        let r = radius.round().max(1.0);
        let inside = center.0.is_finite()
            && center.1.is_finite()
            && center.0 >= -r
            && center.1 >= -r
            && center.0 <= w as f32 + r
            && center.1 <= h as f32 + r;
        if !inside {
            return;
        }
        draw_filled_circle_mut(
            &mut self.image,
            (center.0.round() as i32, center.1.round() as i32),
            r as i32,
            image::Rgba(color.0),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::landmarks::{Keypoint, Landmark, LANDMARK_COUNT};

    #[derive(Default)]
    struct RecordingCanvas {
        lines: Vec<((f32, f32), (f32, f32))>,
        dots: Vec<(f32, f32)>,
    }

    impl Canvas for RecordingCanvas {
        fn size(&self) -> (u32, u32) {
            (100, 200)
        }

        fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), _color: Rgba, _width: f32) {
            self.lines.push((from, to));
        }

        fn draw_dot(&mut self, center: (f32, f32), _radius: f32, _color: Rgba) {
            self.dots.push(center);
        }
    }

    fn hidden_pose() -> Vec<Keypoint> {
        vec![Keypoint::new(0.0, 0.0, 0.0); LANDMARK_COUNT]
    }

    #[test]
    fn test_only_visible_bones_are_drawn() {
        let mut keypoints = hidden_pose();
        keypoints[Landmark::LeftShoulder.index()] = Keypoint::new(0.25, 0.125, 0.9);
        keypoints[Landmark::LeftElbow.index()] = Keypoint::new(0.5, 0.5, 0.9);
        // Wrist is occluded, so the forearm is skipped.
        keypoints[Landmark::LeftWrist.index()] = Keypoint::new(0.75, 0.875, 0.1);
        let pose = PoseLandmarks::new(keypoints);

        let mut canvas = RecordingCanvas::default();
        let stats = draw_pose(&mut canvas, &pose, &DrawingStyle::default());

        assert_eq!(stats, DrawStats { lines: 1, dots: 2 });
        assert_eq!(canvas.lines, vec![((25.0, 25.0), (50.0, 100.0))]);
    }

    #[test]
    fn test_empty_pose_draws_nothing() {
        let mut canvas = RecordingCanvas::default();
        let stats = draw_pose(&mut canvas, &PoseLandmarks::default(), &DrawingStyle::default());
        assert_eq!(stats, DrawStats::default());
    }

    #[test]
    fn test_frame_canvas_rasterizes() {
        let mut keypoints = hidden_pose();
        keypoints[Landmark::LeftHip.index()] = Keypoint::new(0.25, 0.5, 1.0);
        keypoints[Landmark::RightHip.index()] = Keypoint::new(0.75, 0.5, 1.0);
        let pose = PoseLandmarks::new(keypoints);

        let mut canvas = FrameCanvas::new(40, 20);
        draw_pose(&mut canvas, &pose, &DrawingStyle::default());

        // Midpoint of the hip line is green, the joints are red.
        assert_eq!(canvas.pixel(20, 10), Some(Rgba::GREEN));
        assert_eq!(canvas.pixel(10, 10), Some(Rgba::RED));
        assert_eq!(canvas.pixel(0, 0), Some(Rgba::TRANSPARENT));
        assert_eq!(canvas.pixel(40, 0), None);
    }

    #[test]
    fn test_off_frame_bone_is_clipped() {
        let mut keypoints = hidden_pose();
        keypoints[Landmark::LeftHip.index()] = Keypoint::new(0.5, 0.5, 1.0);
        keypoints[Landmark::RightHip.index()] = Keypoint::new(20000.0, 0.5, 1.0);
        let pose = PoseLandmarks::new(keypoints);

        let mut canvas = FrameCanvas::new(640, 480);
        let started = std::time::Instant::now();
        let stats = draw_pose(&mut canvas, &pose, &DrawingStyle::default());

        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert_eq!(stats.lines, 1);
        // The visible part runs to the right edge.
        assert_eq!(canvas.pixel(600, 240), Some(Rgba::GREEN));
        assert_eq!(canvas.pixel(639, 240), Some(Rgba::GREEN));
        assert_eq!(canvas.pixel(600, 100), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn test_clip_segment() {
        assert_eq!(
            clip_segment((-8.0, 5.0), (24.0, 5.0), 7.0, 7.0),
            Some(((0.0, 5.0), (7.0, 5.0)))
        );
        assert_eq!(clip_segment((-8.0, -1.0), (24.0, -1.0), 7.0, 7.0), None);
        assert_eq!(clip_segment((f32::NAN, 0.0), (1.0, 1.0), 7.0, 7.0), None);
    }

    #[test]
    fn test_from_rgba_checks_length() {
        assert!(FrameCanvas::from_rgba(2, 2, vec![0; 16]).is_ok());
        assert!(FrameCanvas::from_rgba(2, 2, vec![0; 15]).is_err());
    }

    #[test]
    fn test_png_snapshot_decodes() {
        let mut canvas = FrameCanvas::new(8, 4);
        canvas.draw_dot((4.0, 2.0), 1.0, Rgba::RED);
        let bytes = canvas.encode_png().unwrap();

        let decoder = png::Decoder::new(std::io::Cursor::new(bytes));
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();

        assert_eq!((info.width, info.height), (8, 4));
        assert_eq!(info.color_type, png::ColorType::Rgba);
        assert_eq!(&buf[..info.buffer_size()], canvas.pixels());
    }
}
