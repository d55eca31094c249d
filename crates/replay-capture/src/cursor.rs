use crate::{normalize, CaptureError, CaptureResult, Frame, FrameSource, CANONICAL_HEIGHT};
use tracing::debug;

/// The single owner of a frame source's read position.
///
/// Stages borrow the cursor mutably one at a time; moving between phases or
/// re-sampling a clip is an explicit `seek`. Every frame handed out is
/// normalized to [`CANONICAL_HEIGHT`].
pub struct FrameCursor<S> {
    source: S,
    position: usize,
    scale: f64,
}

impl<S: FrameSource> FrameCursor<S> {
    pub fn new(source: S) -> Self {
        let height = source.frame_height().max(1);
        let scale = CANONICAL_HEIGHT as f64 / height as f64;
        debug!(
            "Frame cursor: {} frames @ {:.2} fps, scale {:.3}",
            source.total_frames(),
            source.fps(),
            scale
        );
        Self {
            source,
            position: 0,
            scale,
        }
    }

    pub fn fps(&self) -> f64 {
        self.source.fps()
    }

    pub fn total_frames(&self) -> usize {
        self.source.total_frames()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Index of the frame the next `next_frame` call will return.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of frames to advance per sample to approximate `rate` samples per second.
    pub fn step_for(&self, rate: f64) -> usize {
        let fps = self.fps();
        if rate > 0.0 && fps > rate {
            ((fps / rate) as usize).max(1)
        } else {
            1
        }
    }

    /// Read and normalize the frame at the cursor.
    ///
    /// Returns `Ok(None)` once the declared frame count has been consumed. A
    /// source that runs dry before that point is reported as truncated.
    pub fn next_frame(&mut self) -> CaptureResult<Option<Frame>> {
        if self.position >= self.total_frames() {
            return Ok(None);
        }
        let raw = self.pull()?;
        let frame = Frame {
            index: self.position,
            image: normalize(raw, self.scale),
        };
        self.position += 1;
        Ok(Some(frame))
    }

    /// Advance past `count` frames without normalizing them.
    /// Stops quietly at the declared end of the stream.
    pub fn skip(&mut self, count: usize) -> CaptureResult<()> {
        for _ in 0..count {
            if self.position >= self.total_frames() {
                break;
            }
            self.pull()?;
            self.position += 1;
        }
        Ok(())
    }

    pub fn seek(&mut self, index: usize) -> CaptureResult<()> {
        self.source.seek(index)?;
        self.position = index;
        Ok(())
    }

    fn pull(&mut self) -> CaptureResult<image::RgbaImage> {
        self.source
            .read()?
            .ok_or(CaptureError::Truncated {
                position: self.position,
                expected: self.total_frames(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySource;
    use image::RgbaImage;

    #[test]
    fn test_frames_are_normalized() {
        let frames = vec![RgbaImage::new(20, 1440); 3];
        let mut cursor = FrameCursor::new(MemorySource::new(frames, 30.0));
        assert!((cursor.scale() - 0.5).abs() < 1e-9);

        let frame = cursor.next_frame().unwrap().unwrap();
        assert_eq!(frame.index, 0);
        assert_eq!(frame.image.dimensions(), (10, 720));
    }

    #[test]
    fn test_skip_and_end_of_stream() {
        let mut cursor = FrameCursor::new(MemorySource::blank(5, 30.0));
        cursor.skip(3).unwrap();
        assert_eq!(cursor.next_frame().unwrap().unwrap().index, 3);
        cursor.skip(10).unwrap();
        assert_eq!(cursor.position(), 5);
        assert!(cursor.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_seek_back() {
        let mut cursor = FrameCursor::new(MemorySource::blank(10, 30.0));
        cursor.skip(8).unwrap();
        cursor.seek(2).unwrap();
        assert_eq!(cursor.next_frame().unwrap().unwrap().index, 2);
    }

    #[test]
    fn test_truncated_stream_is_an_error() {
        let source = MemorySource::blank(3, 30.0).with_declared_total(6);
        let mut cursor = FrameCursor::new(source);
        cursor.skip(3).unwrap();
        assert!(matches!(
            cursor.next_frame(),
            Err(CaptureError::Truncated { position: 3, expected: 6 })
        ));
    }

    #[test]
    fn test_step_for_rate() {
        let cursor = FrameCursor::new(MemorySource::blank(1, 30.0));
        assert_eq!(cursor.step_for(5.0), 6);
        assert_eq!(cursor.step_for(60.0), 1);
        assert_eq!(cursor.step_for(30.0), 1);
    }
}
