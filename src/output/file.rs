use super::OutputSink;
use anyhow::{Context, Result};
use image::RgbaImage;
use std::path::{Path, PathBuf};

/// Writes each presented frame over a single image file
///
/// The format follows the file extension.
pub struct ImageFileOutput {
    path: PathBuf,
    resolution: (u32, u32),
    frames_written: u64,
}

impl ImageFileOutput {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            resolution: (0, 0),
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl OutputSink for ImageFileOutput {
    fn write_frame(&mut self, frame: &RgbaImage) -> Result<()> {
        frame
            .save(&self.path)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        if self.frames_written == 0 {
            tracing::info!("Writing frames to {}", self.path.display());
        }
        self.resolution = frame.dimensions();
        self.frames_written += 1;
        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }
}
