use super::CaptureSource;
use anyhow::{bail, Context, Result};
use image::RgbaImage;
use std::path::Path;

/// Replays one image as an endless stream of identical frames
///
/// Useful for tuning the recolor on a photo without a camera attached.
pub struct StillImageSource {
    frame: RgbaImage,
    streaming: bool,
}

impl StillImageSource {
    pub fn new(frame: RgbaImage) -> Self {
        Self {
            frame,
            streaming: true,
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let frame = image::open(path)
            .with_context(|| format!("Failed to decode image {}", path.display()))?
            .to_rgba8();
        tracing::info!(
            "Loaded still image {} ({}x{})",
            path.display(),
            frame.width(),
            frame.height()
        );
        Ok(Self::new(frame))
    }
}

impl CaptureSource for StillImageSource {
    fn capture_frame(&mut self) -> Result<RgbaImage> {
        if !self.streaming {
            bail!("Still image source has been stopped");
        }
        Ok(self.frame.clone())
    }

    fn resolution(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn stop(&mut self) -> Result<()> {
        self.streaming = false;
        Ok(())
    }
}
