//! Frame sources
//!
//! The engine pulls frames from a [`FrameSource`]. A live camera source is
//! available behind the `camera` feature; [`SyntheticSource`] renders a
//! moving test pattern and needs no hardware.

#[cfg(feature = "camera")]
mod capture;
mod synthetic;

use std::time::Instant;

use image::RgbaImage;

#[cfg(feature = "camera")]
pub use capture::{CameraCapture, CameraError, CameraInfo};
pub use synthetic::SyntheticSource;

/// A captured video frame
#[derive(Clone, Debug)]
pub struct Frame {
    /// RGBA pixels
    pub image: RgbaImage,
    /// Frame number from the source
    pub frame_number: u64,
    /// Capture time
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(image: RgbaImage, frame_number: u64) -> Self {
        Self {
            image,
            frame_number,
            timestamp: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Anything that can hand the engine its latest frame
pub trait FrameSource {
    /// Frame dimensions; `(0, 0)` while unknown
    fn dimensions(&self) -> (u32, u32);

    /// Whether frames can be pulled
    fn is_ready(&self) -> bool;

    /// Most recent frame, if any has arrived
    fn latest_frame(&self) -> Option<Frame>;
}
