mod still;
#[cfg(feature = "camera")]
mod v4l_capture;

pub use still::StillImageSource;
#[cfg(feature = "camera")]
pub use v4l_capture::WebcamCapture;

use anyhow::Result;
use image::RgbaImage;

/// Trait for camera capture sources
pub trait CaptureSource {
    /// Capture a single RGBA frame
    fn capture_frame(&mut self) -> Result<RgbaImage>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);

    /// Whether the source is currently delivering frames
    fn is_streaming(&self) -> bool;

    /// Stop delivering frames. Safe to call more than once.
    fn stop(&mut self) -> Result<()>;
}

impl<T: CaptureSource + ?Sized> CaptureSource for Box<T> {
    fn capture_frame(&mut self) -> Result<RgbaImage> {
        (**self).capture_frame()
    }

    fn resolution(&self) -> (u32, u32) {
        (**self).resolution()
    }

    fn is_streaming(&self) -> bool {
        (**self).is_streaming()
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }
}
