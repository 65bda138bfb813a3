//! V4L2 device capture
//!
//! Requests MJPEG from `/dev/video{id}` so that frames arrive compressed and
//! can be forwarded to raw video sinks without re-encoding.

use bytes::Bytes;
use ouroboros::self_referencing;
use tracing::{info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture as _;

use crate::capture::{Capture, Captured};
use crate::error::{IngestionError, Result};

const BUFFER_COUNT: u32 = 4;

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

/// Live V4L2 capture
pub struct V4l2Capture {
    path: String,
    state: DeviceState,
    width: u32,
    height: u32,
}

impl V4l2Capture {
    pub fn open(id: u32) -> Result<Self> {
        let path = format!("/dev/video{id}");
        let unopenable = |e: std::io::Error| IngestionError::no_openable_source(&path, e.to_string());

        let device = v4l::Device::with_path(&path).map_err(unopenable)?;
        let mut format = device.format().map_err(unopenable)?;
        format.fourcc = v4l::FourCC::new(b"MJPG");
        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                warn!(device = %path, error = %err, "failed to request MJPG format");
                device.format().map_err(unopenable)?
            }
        };
        if format.fourcc != v4l::FourCC::new(b"MJPG") {
            return Err(IngestionError::no_openable_source(
                &path,
                format!("device does not offer MJPG (got {})", format.fourcc),
            ));
        }

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, BUFFER_COUNT)
            },
        }
        .try_build()
        .map_err(unopenable)?;

        info!(device = %path, width = format.width, height = format.height, "opened v4l2 device");
        Ok(Self {
            path,
            state,
            width: format.width,
            height: format.height,
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Capture for V4l2Capture {
    fn grab(&mut self) -> Result<Captured> {
        let (buf, meta) = self
            .state
            .with_mut(|fields| fields.stream.next())
            .map_err(|e| IngestionError::read_failed(&self.path, e.to_string()))?;
        let used = (meta.bytesused as usize).min(buf.len());
        Ok(Captured::Jpeg(Bytes::copy_from_slice(&buf[..used])))
    }

    fn describe(&self) -> String {
        format!("device:{}", self.path)
    }
}
