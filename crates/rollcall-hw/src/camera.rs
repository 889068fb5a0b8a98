//! V4L2 camera capture via the `v4l` crate.

use rollcall_core::Frame;
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const CAPTURE_WIDTH: u32 = 640;
const CAPTURE_HEIGHT: u32 = 480;
const STREAM_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
}

/// Negotiated pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel, Y channel extracted).
    Yuyv,
    /// Motion-JPEG (decoded per frame).
    Mjpeg,
}

/// An open V4L2 video capture device.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open a camera device by path (e.g., "/dev/video0") and negotiate
    /// a capture format. Prefers YUYV, accepts MJPG.
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;
        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(CameraError::StreamingNotSupported);
        }

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = CAPTURE_WIDTH;
        fmt.height = CAPTURE_HEIGHT;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let pixel_format = if negotiated.fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else if negotiated.fourcc == FourCC::new(b"MJPG") {
            PixelFormat::Mjpeg
        } else {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {:?} (need YUYV or MJPG)",
                negotiated.fourcc
            )));
        };

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            format = ?pixel_format,
            "negotiated capture format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            pixel_format,
        })
    }

    /// Start streaming. The stream borrows the camera and holds the
    /// kernel buffers until dropped.
    pub fn start_stream(&self) -> Result<CameraStream<'_>, CameraError> {
        let stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;
        Ok(CameraStream {
            stream,
            width: self.width,
            height: self.height,
            pixel_format: self.pixel_format,
        })
    }
}

/// A live capture stream; each read blocks until the driver delivers the
/// next frame, which paces the recognition loop.
pub struct CameraStream<'a> {
    stream: MmapStream<'a>,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
}

impl CameraStream<'_> {
    /// Block for the next frame and convert it to grayscale.
    pub fn read_frame(&mut self) -> Result<Frame, CameraError> {
        let (buf, _meta) = self
            .stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

        match self.pixel_format {
            PixelFormat::Yuyv => yuyv_to_gray(buf, self.width, self.height),
            PixelFormat::Mjpeg => mjpeg_to_gray(buf),
        }
    }

    /// Read and discard `count` frames (camera AGC/AE stabilization).
    pub fn warmup(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        tracing::info!(count, "discarding warmup frames");
        for _ in 0..count {
            if let Err(err) = self.read_frame() {
                tracing::warn!(error = %err, "warmup frame read failed");
                return;
            }
        }
    }
}

/// Extract the Y channel from packed YUYV ([Y0, U, Y1, V] per pixel pair).
fn yuyv_to_gray(buf: &[u8], width: u32, height: u32) -> Result<Frame, CameraError> {
    let expected = (width * height * 2) as usize;
    if buf.len() < expected {
        return Err(CameraError::CaptureFailed(format!(
            "YUYV buffer too short: expected {expected}, got {}",
            buf.len()
        )));
    }
    Ok(Frame {
        data: buf[..expected].iter().step_by(2).copied().collect(),
        width,
        height,
    })
}

/// Decode one MJPEG frame; dimensions come from the JPEG itself.
fn mjpeg_to_gray(buf: &[u8]) -> Result<Frame, CameraError> {
    let img = image::load_from_memory(buf)
        .map_err(|e| CameraError::CaptureFailed(format!("MJPEG decode failed: {e}")))?;
    Ok(Frame::from_luma(img.to_luma8()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_extracts_even_bytes() {
        // 2x1 image: [Y0=100, U=128, Y1=200, V=128]
        let frame = yuyv_to_gray(&[100, 128, 200, 128], 2, 1).unwrap();
        assert_eq!(frame.data, vec![100, 200]);
        assert_eq!((frame.width, frame.height), (2, 1));
    }

    #[test]
    fn yuyv_rejects_short_buffers() {
        assert!(yuyv_to_gray(&[100, 128], 2, 1).is_err());
    }

    #[test]
    fn yuyv_ignores_trailing_padding() {
        let buf = [10, 0, 20, 0, 30, 0, 40, 0, 99, 99];
        let frame = yuyv_to_gray(&buf, 4, 1).unwrap();
        assert_eq!(frame.data, vec![10, 20, 30, 40]);
    }

    #[test]
    fn mjpeg_decodes_a_real_jpeg() {
        let img = image::GrayImage::from_pixel(16, 8, image::Luma([180]));
        let mut jpeg = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut jpeg),
            image::ImageFormat::Jpeg,
        )
        .unwrap();

        let frame = mjpeg_to_gray(&jpeg).unwrap();
        assert_eq!((frame.width, frame.height), (16, 8));
    }

    #[test]
    fn mjpeg_rejects_garbage() {
        assert!(mjpeg_to_gray(&[0xde, 0xad, 0xbe, 0xef]).is_err());
    }
}
