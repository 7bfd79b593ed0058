use super::preprocess::Preprocessor;
use super::types::{SegmentationMask, SegmentationModel};
use anyhow::{Context, Result};
use image::RgbaImage;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::time::Duration;

/// ONNX hair segmentation model
///
/// Takes a 512x512 RGB frame plus the previous frame's hair probability as
/// a fourth channel, and returns background/hair scores per pixel.
/// Feeding the last probability back keeps the mask steady between frames.
pub struct HairSegmenter {
    session: Option<Session>,
    preprocessor: Preprocessor,
    width: u32,
    height: u32,

    /// Hair probability above which a pixel is labelled hair
    threshold: f32,

    // Previous hair probability at model resolution
    prior: Option<Vec<f32>>,
    // Frame size the prior was computed for
    prior_frame: (u32, u32),
}

impl HairSegmenter {
    /// Load a hair segmentation model from an ONNX file
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    ///
    /// # Default Configuration
    /// - Input size: 512x512
    /// - Hair threshold: 0.5
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading hair segmentation model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!("Hair segmentation model loaded successfully");

        let width = 512;
        let height = 512;

        Ok(Self {
            session: Some(session),
            preprocessor: Preprocessor::new(width, height),
            width,
            height,
            threshold: 0.5,
            prior: None,
            prior_frame: (0, 0),
        })
    }
}

impl SegmentationModel for HairSegmenter {
    fn segment(&mut self, frame: &RgbaImage, timestamp: Duration) -> Result<SegmentationMask> {
        let _span = tracing::debug_span!("hair_segment", ts_ms = timestamp.as_millis() as u64).entered();

        let session = self.session.as_mut().context("Segmenter has been closed")?;

        // A new frame size means a new scene; the old prior doesn't line up
        let (frame_width, frame_height) = frame.dimensions();
        if self.prior_frame != (frame_width, frame_height) {
            self.prior = None;
            self.prior_frame = (frame_width, frame_height);
        }

        let tensor = self.preprocessor.preprocess(frame, self.prior.as_deref())?;
        let shape = [1usize, self.height as usize, self.width as usize, 4];
        let input = Tensor::from_array((shape, tensor.into_raw_vec()))
            .context("Failed to build input tensor")?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = session
            .run(ort::inputs![input])
            .context("Failed to run inference")?;
        drop(_infer_span);

        let (out_shape, out_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Model output is not a float tensor")?;
        let dims: Vec<i64> = out_shape.iter().copied().collect();
        let probability = self.preprocessor.hair_probability(&dims, out_data)?;

        let labels =
            self.preprocessor
                .category_mask(&probability, self.threshold, frame_width, frame_height);
        self.prior = Some(probability);

        Ok(SegmentationMask::from_bytes(frame_width, frame_height, labels))
    }

    fn reset_state(&mut self) {
        tracing::info!("Resetting hair segmenter prior");
        self.prior = None;
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn close(&mut self) {
        if self.session.take().is_some() {
            tracing::info!("Hair segmentation model released");
        }
        self.prior = None;
    }
}
