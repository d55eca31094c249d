mod cursor;
pub mod geometry;
mod image_dir;
mod memory;
#[cfg(feature = "video")]
pub mod video;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cursor::FrameCursor;
pub use geometry::{Point, Rect};
pub use image_dir::ImageDirSource;
pub use memory::MemorySource;

/// Height every frame is normalized to before any recognition runs.
/// Tile positions and template rectangles are expressed in this space.
pub const CANONICAL_HEIGHT: u32 = 720;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("stream ended at frame {position}, expected {expected} frames")]
    Truncated { position: usize, expected: usize },

    #[error("failed to open {0}")]
    Open(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "video")]
    #[error("ffmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// A normalized frame plus its absolute index in the source.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: usize,
    pub image: RgbaImage,
}

/// Sequential, seekable access to the raw frames of a recording.
pub trait FrameSource {
    fn fps(&self) -> f64;

    /// Declared number of frames in the recording.
    fn total_frames(&self) -> usize;

    /// Height of the raw (un-normalized) frames.
    fn frame_height(&self) -> u32;

    /// Decode the next frame. `Ok(None)` means the underlying stream is exhausted.
    fn read(&mut self) -> CaptureResult<Option<RgbaImage>>;

    /// Position the source so the next `read` yields frame `index`.
    fn seek(&mut self, index: usize) -> CaptureResult<()>;
}

/// Normalized screen region (0.0-1.0 coordinates relative to an image)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRegion {
    pub fn full() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }
}

/// Crop a region from an image using normalized coordinates
pub fn crop_region(frame: &RgbaImage, region: &ScreenRegion) -> RgbaImage {
    let (w, h) = (frame.width(), frame.height());
    let x = (region.x * w as f64) as u32;
    let y = (region.y * h as f64) as u32;
    let rw = (region.width * w as f64) as u32;
    let rh = (region.height * h as f64) as u32;

    // Clamp to image bounds
    let x = x.min(w.saturating_sub(1));
    let y = y.min(h.saturating_sub(1));
    let rw = rw.min(w - x).max(1);
    let rh = rh.min(h - y).max(1);

    image::imageops::crop_imm(frame, x, y, rw, rh).to_image()
}

/// Resize a raw frame by `scale`. A scale of 1.0 returns the frame untouched.
pub fn normalize(image: RgbaImage, scale: f64) -> RgbaImage {
    if (scale - 1.0).abs() < 1e-6 {
        return image;
    }
    let w = ((image.width() as f64 * scale).round() as u32).max(1);
    let h = ((image.height() as f64 * scale).round() as u32).max(1);
    image::imageops::resize(&image, w, h, image::imageops::FilterType::Triangle)
}
