use anyhow::{bail, Result};
use image::{imageops, GrayImage, RgbaImage};
use ndarray::Array4;

/// Converts frames to hair-model input tensors and model output back to
/// frame-sized category masks
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    /// Preprocess an RGBA frame into a normalized NHWC tensor
    ///
    /// Steps:
    /// 1. Resize to target dimensions
    /// 2. Convert RGB to float and normalize to [0, 1]
    /// 3. Put the previous hair probability (or 0) in the fourth channel
    ///
    /// Returns: Array4<f32> with shape [1, height, width, 4]
    pub fn preprocess(&self, image: &RgbaImage, prior: Option<&[f32]>) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        let (width, height) = (self.target_width, self.target_height);
        let plane = (width * height) as usize;
        if let Some(prior) = prior {
            if prior.len() != plane {
                bail!("prior mask has {} values, expected {}", prior.len(), plane);
            }
        }

        let resized;
        let source = if image.dimensions() != (width, height) {
            resized = imageops::resize(image, width, height, imageops::FilterType::Triangle);
            &resized
        } else {
            image
        };

        let mut tensor = Array4::<f32>::zeros((1, height as usize, width as usize, 4));
        for (x, y, pixel) in source.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            tensor[[0, y, x, 0]] = pixel[0] as f32 / 255.0;
            tensor[[0, y, x, 1]] = pixel[1] as f32 / 255.0;
            tensor[[0, y, x, 2]] = pixel[2] as f32 / 255.0;
            if let Some(prior) = prior {
                tensor[[0, y, x, 3]] = prior[y * width as usize + x];
            }
        }

        Ok(tensor)
    }

    /// Pull the hair probability plane out of the raw model output
    ///
    /// Handles a single probability plane, two-class NHWC `[1, H, W, 2]`
    /// and two-class NCHW `[1, 2, H, W]`. Two-class scores are softmaxed.
    pub fn hair_probability(&self, shape: &[i64], data: &[f32]) -> Result<Vec<f32>> {
        let plane = (self.target_width * self.target_height) as usize;

        if data.len() == plane {
            return Ok(data.iter().map(|v| v.clamp(0.0, 1.0)).collect());
        }
        if data.len() != plane * 2 {
            bail!(
                "unexpected model output of {} values with shape {:?}",
                data.len(),
                shape
            );
        }

        let planar = shape.len() == 4 && shape[1] == 2 && shape[3] != 2;
        let softmax = |background: f32, hair: f32| 1.0 / (1.0 + (background - hair).exp());

        let probability = if planar {
            let (background, hair) = data.split_at(plane);
            background
                .iter()
                .zip(hair)
                .map(|(&b, &h)| softmax(b, h))
                .collect()
        } else {
            data.chunks_exact(2).map(|c| softmax(c[0], c[1])).collect()
        };
        Ok(probability)
    }

    /// Threshold a model-resolution probability plane into a category
    /// mask at frame resolution
    pub fn category_mask(
        &self,
        probability: &[f32],
        threshold: f32,
        frame_width: u32,
        frame_height: u32,
    ) -> Vec<u8> {
        let _span = tracing::debug_span!("postprocess").entered();

        let (width, height) = (self.target_width, self.target_height);
        let labels = GrayImage::from_fn(width, height, |x, y| {
            let idx = (y * width + x) as usize;
            image::Luma([u8::from(probability[idx] > threshold)])
        });

        if (frame_width, frame_height) == (width, height) {
            return labels.into_raw();
        }

        imageops::resize(
            &labels,
            frame_width,
            frame_height,
            imageops::FilterType::Nearest,
        )
        .into_raw()
    }
}
