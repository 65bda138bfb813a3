//! Video file capture through FFmpeg
//!
//! Opens any container FFmpeg can demux (mp4, avi, mkv, mjpeg, ...). Frames
//! are decoded in stream order and converted to RGB; seeking jumps to the
//! preceding keyframe and decodes forward to the requested frame.

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;
use image::RgbImage;
use tracing::{debug, info};

use crate::capture::{Capture, Captured};
use crate::error::{IngestionError, Result};

/// Targets further ahead than this are reached by seeking instead of decoding
const SEEK_WINDOW: u64 = 48;

/// `AV_TIME_BASE` units per second
const TIME_BASE: f64 = 1_000_000.0;

/// Seekable capture over a video file
pub struct FfmpegFileCapture {
    path: PathBuf,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    time_base: f64,
    start_pts: i64,
    fps: f64,
    frame_count: u64,

    position: u64,
    next_index: u64,
    drained: bool,
    current: Option<(u64, RgbImage)>,
}

impl std::fmt::Debug for FfmpegFileCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegFileCapture")
            .field("path", &self.path)
            .field("frame_count", &self.frame_count)
            .field("fps", &self.fps)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl FfmpegFileCapture {
    /// Open the best video stream of `path`
    ///
    /// `fallback_fps` is used when the container does not declare a rate.
    ///
    /// # Errors
    /// `NoOpenableSource` if FFmpeg cannot open the file or it has no video
    /// stream.
    pub fn open(path: &Path, fallback_fps: f64) -> Result<Self> {
        let desc = path.display().to_string();
        let unopenable = |e: ffmpeg::Error| IngestionError::no_openable_source(&desc, e.to_string());

        ffmpeg::init().map_err(unopenable)?;
        let input = ffmpeg::format::input(&path).map_err(unopenable)?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| IngestionError::no_openable_source(&desc, "file has no video stream"))?;

        let stream_index = stream.index();
        let time_base = f64::from(stream.time_base());
        let start_pts = stream.start_time().max(0);
        let fps = [f64::from(stream.avg_frame_rate()), f64::from(stream.rate())]
            .into_iter()
            .find(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(if fallback_fps.is_finite() && fallback_fps > 0.0 {
                fallback_fps
            } else {
                24.0
            });
        let duration_secs = if stream.duration() > 0 {
            stream.duration() as f64 * time_base
        } else {
            input.duration().max(0) as f64 / TIME_BASE
        };
        let frame_count = estimate_frame_count(stream.frames(), duration_secs, fps);

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(unopenable)?;
        let decoder = context.decoder().video().map_err(unopenable)?;
        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(unopenable)?;

        info!(
            path = %desc,
            width = decoder.width(),
            height = decoder.height(),
            fps,
            frame_count,
            "opened video file"
        );
        Ok(Self {
            path: path.to_path_buf(),
            input,
            stream_index,
            decoder,
            scaler,
            time_base,
            start_pts,
            fps,
            frame_count,
            position: 0,
            next_index: 0,
            drained: false,
            current: None,
        })
    }

    fn read_error(&self, e: impl std::fmt::Display) -> IngestionError {
        IngestionError::read_failed(self.describe(), e.to_string())
    }

    /// Reposition the demuxer at or before `target` and drop decoder state
    fn seek_stream(&mut self, target: u64) -> Result<()> {
        let ts = (target as f64 / self.fps * TIME_BASE) as i64;
        self.input.seek(ts, ..ts).map_err(|e| self.read_error(e))?;
        self.decoder.flush();
        self.drained = false;
        self.current = None;
        self.next_index = target;
        debug!(path = %self.path.display(), target, "video file seeked");
        Ok(())
    }

    /// Next frame in decode order with its frame index; `None` at end of file
    fn decode_next(&mut self) -> Result<Option<(u64, RgbImage)>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let index = decoded.timestamp().map_or(self.next_index, |ts| {
                    frame_index(ts, self.start_pts, self.time_base, self.fps)
                });
                self.next_index = index + 1;

                let mut rgb = ffmpeg::frame::Video::empty();
                self.scaler
                    .run(&decoded, &mut rgb)
                    .map_err(|e| self.read_error(e))?;
                return Ok(Some((index, to_rgb_image(&rgb).map_err(|e| self.read_error(e))?)));
            }
            if self.drained {
                return Ok(None);
            }

            let packet = self
                .input
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));
            match packet {
                Some((index, packet)) if index == self.stream_index => {
                    self.decoder
                        .send_packet(&packet)
                        .map_err(|e| self.read_error(e))?;
                }
                Some(_) => {}
                None => {
                    self.decoder.send_eof().map_err(|e| self.read_error(e))?;
                    self.drained = true;
                }
            }
        }
    }
}

impl Capture for FfmpegFileCapture {
    fn grab(&mut self) -> Result<Captured> {
        let target = self.position;
        if let Some((index, image)) = &self.current {
            if *index == target {
                return Ok(Captured::Pixels(image.clone()));
            }
        }

        let needs_seek = match &self.current {
            Some((index, _)) => *index > target || target - *index > SEEK_WINDOW,
            None => target != self.next_index,
        };
        if needs_seek {
            self.seek_stream(target)?;
        }

        while let Some((index, image)) = self.decode_next()? {
            let reached = index >= target;
            self.current = Some((index, image));
            if reached {
                break;
            }
        }

        // Past the last decodable frame the last one stands in
        match &self.current {
            Some((_, image)) => Ok(Captured::Pixels(image.clone())),
            None => Err(self.read_error(format!("no frame {target}"))),
        }
    }

    fn seek(&mut self, n: u64) -> Result<()> {
        self.position = match self.frame_count {
            0 => n,
            count => n.min(count - 1),
        };
        Ok(())
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn native_fps(&self) -> f64 {
        self.fps
    }

    fn is_live(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Frame index of a presentation timestamp
fn frame_index(ts: i64, start_pts: i64, time_base: f64, fps: f64) -> u64 {
    let secs = ts.saturating_sub(start_pts) as f64 * time_base;
    (secs * fps).round().max(0.0) as u64
}

/// Declared frame count, or one derived from the duration
fn estimate_frame_count(declared: i64, duration_secs: f64, fps: f64) -> u64 {
    if declared > 0 {
        return declared as u64;
    }
    if duration_secs.is_finite() && duration_secs > 0.0 {
        (duration_secs * fps).round() as u64
    } else {
        0
    }
}

/// Copy an RGB24 frame into a tightly packed image, dropping row padding
fn to_rgb_image(frame: &ffmpeg::frame::Video) -> std::result::Result<RgbImage, String> {
    let (width, height) = (frame.width(), frame.height());
    let row_bytes = width as usize * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let line = data
            .get(start..start + row_bytes)
            .ok_or_else(|| format!("frame row {row} is out of bounds"))?;
        pixels.extend_from_slice(line);
    }
    RgbImage::from_raw(width, height, pixels).ok_or_else(|| "frame buffer size mismatch".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_index_from_timestamp() {
        // 1/90000 time base at 30 fps: 3000 ticks per frame
        let tb = 1.0 / 90_000.0;
        assert_eq!(frame_index(0, 0, tb, 30.0), 0);
        assert_eq!(frame_index(3000, 0, tb, 30.0), 1);
        assert_eq!(frame_index(30_000, 0, tb, 30.0), 10);
        assert_eq!(frame_index(33_000, 3000, tb, 30.0), 10);
        // Timestamps before the stream start clamp to the first frame
        assert_eq!(frame_index(0, 3000, tb, 30.0), 0);
    }

    #[test]
    fn test_frame_count_estimate() {
        assert_eq!(estimate_frame_count(120, 0.0, 30.0), 120);
        assert_eq!(estimate_frame_count(0, 4.0, 25.0), 100);
        assert_eq!(estimate_frame_count(0, f64::NAN, 25.0), 0);
        assert_eq!(estimate_frame_count(-1, 0.0, 25.0), 0);
    }

    #[test]
    fn test_open_missing_file() {
        let err = FfmpegFileCapture::open(Path::new("/nonexistent/clip.mp4"), 24.0).unwrap_err();
        assert!(matches!(err, IngestionError::NoOpenableSource { .. }));
    }

    #[test]
    fn test_open_rejects_empty_file() {
        let file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
        assert!(FfmpegFileCapture::open(file.path(), 24.0).is_err());
    }
}
