//! rollcall-hw — V4L2 webcam capture.
//!
//! Opens a video device, negotiates a pixel format, and produces grayscale
//! core frames from a persistent memory-mapped capture stream.

pub mod camera;

pub use camera::{Camera, CameraError, CameraStream, PixelFormat};
