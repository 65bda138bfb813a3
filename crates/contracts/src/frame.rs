//! Frame - Frame Source output
//!
//! One acquired image, carried both compressed (for raw video sinks) and
//! decoded (for detectors).

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};

use crate::ContractError;

/// JPEG quality used whenever a frame has to be re-encoded
pub const JPEG_QUALITY: u8 = 85;

/// Acquired image frame
///
/// Cheap to clone: both representations are reference counted.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Acquisition sequence number (diagnostics only)
    pub seq: u64,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    /// JPEG-compressed bytes, sent verbatim to raw video sinks
    pub jpeg: Bytes,

    /// Decoded RGB pixels
    pub pixels: Arc<RgbImage>,
}

impl Frame {
    /// Build a frame from already-compressed JPEG bytes
    pub fn from_jpeg(seq: u64, jpeg: Bytes) -> Result<Self, ContractError> {
        let pixels = decode_jpeg(&jpeg)?;
        Ok(Self {
            seq,
            width: pixels.width(),
            height: pixels.height(),
            jpeg,
            pixels: Arc::new(pixels),
        })
    }

    /// Build a frame from decoded pixels, compressing them once
    pub fn from_pixels(seq: u64, pixels: RgbImage) -> Result<Self, ContractError> {
        let jpeg = encode_jpeg(&pixels, JPEG_QUALITY)?;
        Ok(Self {
            seq,
            width: pixels.width(),
            height: pixels.height(),
            jpeg,
            pixels: Arc::new(pixels),
        })
    }

    /// Zero-filled placeholder frame
    pub fn blank(width: u32, height: u32) -> Result<Self, ContractError> {
        Self::from_pixels(0, RgbImage::new(width.max(1), height.max(1)))
    }

    /// (width, height)
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Decode JPEG bytes into RGB pixels
pub fn decode_jpeg(data: &[u8]) -> Result<RgbImage, ContractError> {
    image::load_from_memory_with_format(data, ImageFormat::Jpeg)
        .map(|img| img.to_rgb8())
        .map_err(|e| ContractError::frame_codec(format!("jpeg decode: {e}")))
}

/// Encode RGB pixels as JPEG
pub fn encode_jpeg(pixels: &RgbImage, quality: u8) -> Result<Bytes, ContractError> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(pixels)
        .map_err(|e| ContractError::frame_codec(format!("jpeg encode: {e}")))?;
    Ok(Bytes::from(buf.into_inner()))
}
