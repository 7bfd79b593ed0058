use super::CaptureSource;
use anyhow::{bail, Context, Result};
use image::{DynamicImage, RgbaImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;

pub struct WebcamCapture {
    camera: Camera,
    width: u32,
    height: u32,
    streaming: bool,
}

impl WebcamCapture {
    /// Open `device_index` asking for the closest format to
    /// `width`x`height` at `fps`
    pub fn new(device_index: u32, width: u32, height: u32, fps: u32) -> Result<Self> {
        tracing::info!(
            "Initializing webcam {} at {}x{}@{}",
            device_index,
            width,
            height,
            fps
        );

        let index = CameraIndex::Index(device_index);
        let wanted = CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, fps);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(wanted));

        let mut camera = Camera::new(index, requested)
            .context("Failed to open camera")?;

        camera.open_stream()
            .context("Failed to open camera stream")?;

        let actual = camera.resolution();
        tracing::info!(
            "Webcam initialized at {}x{}",
            actual.width(),
            actual.height()
        );

        Ok(Self {
            camera,
            width: actual.width(),
            height: actual.height(),
            streaming: true,
        })
    }
}

impl CaptureSource for WebcamCapture {
    fn capture_frame(&mut self) -> Result<RgbaImage> {
        if !self.streaming {
            bail!("Webcam stream is stopped");
        }
        let frame = self
            .camera
            .frame()
            .context("Failed to capture frame")?;

        let decoded = frame.decode_image::<RgbFormat>()
            .context("Failed to decode frame")?;

        let rgba = DynamicImage::ImageRgb8(decoded).to_rgba8();
        self.width = rgba.width();
        self.height = rgba.height();
        Ok(rgba)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn stop(&mut self) -> Result<()> {
        if !self.streaming {
            return Ok(());
        }
        self.streaming = false;
        self.camera
            .stop_stream()
            .context("Failed to stop camera stream")?;
        tracing::info!("Webcam stream stopped");
        Ok(())
    }
}
