mod file;
#[cfg(feature = "loopback")]
mod loopback;
mod yuyv;

pub use file::ImageFileOutput;
#[cfg(feature = "loopback")]
pub use loopback::V4L2Output;
pub use yuyv::rgba_to_yuyv;

use anyhow::Result;
use image::RgbaImage;

/// Trait for display sinks
pub trait OutputSink {
    /// Present a frame
    fn write_frame(&mut self, frame: &RgbaImage) -> Result<()>;

    /// Get the expected output resolution
    fn resolution(&self) -> (u32, u32);
}

impl<T: OutputSink + ?Sized> OutputSink for Box<T> {
    fn write_frame(&mut self, frame: &RgbaImage) -> Result<()> {
        (**self).write_frame(frame)
    }

    fn resolution(&self) -> (u32, u32) {
        (**self).resolution()
    }
}
