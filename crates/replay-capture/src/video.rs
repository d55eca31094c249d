use crate::{CaptureError, CaptureResult, FrameSource};
use ffmpeg_next::format::context::Input;
use ffmpeg_next::software::scaling;
use image::RgbaImage;
use std::path::Path;
use tracing::{debug, info};

const AV_TIME_BASE: f64 = 1_000_000.0;

/// Decodes a video file frame by frame with ffmpeg-next.
///
/// Seeking jumps to the preceding keyframe and then decodes forward, dropping
/// frames until the requested index is reached.
pub struct VideoSource {
    input: Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    time_base: f64,
    start_seconds: f64,
    fps: f64,
    total_frames: usize,
    width: u32,
    height: u32,
    next_index: usize,
    drop_before: usize,
    eof_sent: bool,
}

impl VideoSource {
    pub fn open(path: &Path) -> CaptureResult<Self> {
        ffmpeg_next::init()?;

        let input = ffmpeg_next::format::input(path)
            .map_err(|e| CaptureError::Open(format!("{}: {}", path.display(), e)))?;

        let video_stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CaptureError::Open(format!("no video stream in {}", path.display())))?;

        let stream_index = video_stream.index();
        let time_base = f64::from(video_stream.time_base());
        let start_pts = video_stream.start_time();
        let start_seconds = if start_pts == i64::MIN {
            0.0
        } else {
            start_pts as f64 * time_base
        };

        let mut fps = f64::from(video_stream.avg_frame_rate());
        if !fps.is_finite() || fps <= 0.0 {
            fps = f64::from(video_stream.rate());
        }
        if !fps.is_finite() || fps <= 0.0 {
            return Err(CaptureError::Open(format!(
                "unknown frame rate in {}",
                path.display()
            )));
        }

        let declared = video_stream.frames();
        let total_frames = if declared > 0 {
            declared as usize
        } else {
            (input.duration().max(0) as f64 / AV_TIME_BASE * fps) as usize
        };

        let decoder_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(video_stream.parameters())?;
        let decoder = decoder_ctx.decoder().video()?;

        let scaler = scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGBA,
            decoder.width(),
            decoder.height(),
            scaling::Flags::BILINEAR,
        )?;

        info!(
            "Video opened: {}x{}, {:.2} fps, {} frames, format {:?}",
            decoder.width(),
            decoder.height(),
            fps,
            total_frames,
            decoder.format()
        );

        let width = decoder.width();
        let height = decoder.height();

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            time_base,
            start_seconds,
            fps,
            total_frames,
            width,
            height,
            next_index: 0,
            drop_before: 0,
            eof_sent: false,
        })
    }

    /// Frame index of a decoded frame, from its presentation timestamp when present.
    fn frame_index(&self, frame: &ffmpeg_next::frame::Video) -> usize {
        match frame.timestamp() {
            Some(pts) => {
                let seconds = pts as f64 * self.time_base - self.start_seconds;
                (seconds * self.fps).round().max(0.0) as usize
            }
            None => self.next_index,
        }
    }

    fn to_rgba(&mut self, decoded: &ffmpeg_next::frame::Video) -> CaptureResult<RgbaImage> {
        let mut rgba_frame = ffmpeg_next::frame::Video::empty();
        self.scaler.run(decoded, &mut rgba_frame)?;

        let data = rgba_frame.data(0);
        let stride = rgba_frame.stride(0);
        let (width, height) = (self.width, self.height);

        // Copy row-by-row in case stride != width*4
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height as usize {
            let row_start = y * stride;
            let row_end = row_start + (width as usize * 4);
            pixels.extend_from_slice(&data[row_start..row_end]);
        }

        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| CaptureError::Decode("frame buffer size mismatch".to_string()))
    }
}

impl FrameSource for VideoSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn total_frames(&self) -> usize {
        self.total_frames
    }

    fn frame_height(&self) -> u32 {
        self.height
    }

    fn read(&mut self) -> CaptureResult<Option<RgbaImage>> {
        loop {
            let mut decoded = ffmpeg_next::frame::Video::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let index = self.frame_index(&decoded);
                if index < self.drop_before {
                    continue;
                }
                self.next_index = index + 1;
                return self.to_rgba(&decoded).map(Some);
            }

            if self.eof_sent {
                return Ok(None);
            }

            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        self.decoder.send_packet(&packet)?;
                    }
                }
                Err(ffmpeg_next::Error::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn seek(&mut self, index: usize) -> CaptureResult<()> {
        let seconds = self.start_seconds + index as f64 / self.fps;
        let ts = (seconds * AV_TIME_BASE) as i64;
        self.input.seek(ts, ..ts)?;
        self.decoder.flush();
        self.eof_sent = false;
        self.drop_before = index;
        self.next_index = index;
        debug!("Video seek to frame {} ({:.3}s)", index, seconds);
        Ok(())
    }
}
