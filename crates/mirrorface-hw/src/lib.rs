//! mirrorface-hw — Hardware abstraction for camera capture.
//!
//! Provides V4L2-based frame acquisition producing grayscale frames for
//! the identification pipeline.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, PixelFormat};
pub use frame::Frame;
