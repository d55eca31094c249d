use crate::{CaptureResult, FrameSource, CANONICAL_HEIGHT};
use image::RgbaImage;

/// Frames held in memory. Used for synthetic recordings and tests.
pub struct MemorySource {
    frames: Vec<RgbaImage>,
    fps: f64,
    declared_total: usize,
    next: usize,
}

impl MemorySource {
    pub fn new(frames: Vec<RgbaImage>, fps: f64) -> Self {
        let declared_total = frames.len();
        Self {
            frames,
            fps,
            declared_total,
            next: 0,
        }
    }

    /// `count` blank frames already at canonical height, so no resizing happens.
    pub fn blank(count: usize, fps: f64) -> Self {
        Self::new(vec![RgbaImage::new(2, CANONICAL_HEIGHT); count], fps)
    }

    /// Report a different frame count than the frames actually held,
    /// e.g. to model a truncated file.
    pub fn with_declared_total(mut self, total: usize) -> Self {
        self.declared_total = total;
        self
    }
}

impl FrameSource for MemorySource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn total_frames(&self) -> usize {
        self.declared_total
    }

    fn frame_height(&self) -> u32 {
        self.frames
            .first()
            .map(|f| f.height())
            .unwrap_or(CANONICAL_HEIGHT)
    }

    fn read(&mut self) -> CaptureResult<Option<RgbaImage>> {
        let frame = self.frames.get(self.next).cloned();
        if frame.is_some() {
            self.next += 1;
        }
        Ok(frame)
    }

    fn seek(&mut self, index: usize) -> CaptureResult<()> {
        self.next = index;
        Ok(())
    }
}
