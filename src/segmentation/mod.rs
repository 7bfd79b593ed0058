#[cfg(feature = "onnx")]
mod hair;
mod preprocess;
pub mod types;

#[cfg(feature = "onnx")]
pub use hair::HairSegmenter;
pub use preprocess::Preprocessor;
pub use types::{MaskHandle, MaskSource, SegmentationMask, SegmentationModel};

/// Create the default segmentation model (ONNX hair segmenter)
#[cfg(feature = "onnx")]
pub fn create_default_model(model_path: &str) -> anyhow::Result<Box<dyn SegmentationModel>> {
    let model = HairSegmenter::new(model_path)?;
    Ok(Box::new(model))
}
