use crate::{CaptureError, CaptureResult, FrameSource};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::info;

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// A recording exported as one image per frame, ordered by file name.
pub struct ImageDirSource {
    files: Vec<PathBuf>,
    fps: f64,
    height: u32,
    next: usize,
}

impl ImageDirSource {
    pub fn open(dir: &Path, fps: f64) -> CaptureResult<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| FRAME_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        let first = files
            .first()
            .ok_or_else(|| CaptureError::Open(format!("no frame images in {}", dir.display())))?;
        let (_, height) = image::image_dimensions(first)?;

        info!(
            "Image sequence opened: {} frames from {}, height {}",
            files.len(),
            dir.display(),
            height
        );

        Ok(Self {
            files,
            fps,
            height,
            next: 0,
        })
    }
}

impl FrameSource for ImageDirSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn total_frames(&self) -> usize {
        self.files.len()
    }

    fn frame_height(&self) -> u32 {
        self.height
    }

    fn read(&mut self) -> CaptureResult<Option<RgbaImage>> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        let img = image::open(path)?.to_rgba8();
        self.next += 1;
        Ok(Some(img))
    }

    fn seek(&mut self, index: usize) -> CaptureResult<()> {
        self.next = index;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageDirSource::open(dir.path(), 30.0).is_err());
    }

    #[test]
    fn test_reads_in_name_order() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        for (name, width) in [("0002.png", 3), ("0001.png", 2)] {
            RgbaImage::new(width, 8).save(dir.join(name)).unwrap();
        }

        let mut source = ImageDirSource::open(dir, 30.0).unwrap();
        assert_eq!(source.total_frames(), 2);
        assert_eq!(source.frame_height(), 8);
        assert_eq!(source.read().unwrap().unwrap().width(), 2);
        assert_eq!(source.read().unwrap().unwrap().width(), 3);
        assert!(source.read().unwrap().is_none());

        source.seek(1).unwrap();
        assert_eq!(source.read().unwrap().unwrap().width(), 3);
    }
}
