use crate::config::Tuning;
use crate::error::{RecolorError, RecolorResult};
use crate::fingerprint::MaskFingerprint;
use image::GrayImage;

/// Feathered hair membership in [0, 1], row-major
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmoothMask {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl SmoothMask {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[(y * self.width + x) as usize]
    }

    fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height && self.values.len() == (width * height) as usize
    }

    /// Render as an 8-bit grayscale image for inspection
    pub fn to_luma_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let value = (self.get(x, y) * 255.0).clamp(0.0, 255.0) as u8;
            image::Luma([value])
        })
    }
}

/// Precomputed circular Gaussian kernel
#[derive(Debug, Clone)]
struct Kernel {
    radius: usize,
    /// (dx, dy, weight) for every offset inside the disc
    taps: Vec<(isize, isize, f32)>,
    weight_sum: f32,
}

impl Kernel {
    fn new(radius: usize, sigma: f32) -> Self {
        let r = radius as isize;
        let sigma2 = 2.0 * sigma * sigma;
        let mut taps = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                let dist2 = dx * dx + dy * dy;
                if dist2 <= r * r {
                    taps.push((dx, dy, (-(dist2 as f32) / sigma2).exp()));
                }
            }
        }
        let weight_sum = taps.iter().map(|t| t.2).sum();
        Self {
            radius,
            taps,
            weight_sum,
        }
    }
}

/// Turns a raw binary mask into a feathered alpha mask
///
/// Holds the previous output and the fingerprint of the mask it came from,
/// so an unchanged mask costs one sampled checksum.
pub struct MaskSmoother {
    kernel: Kernel,
    hash_stride: usize,
    last_fingerprint: Option<MaskFingerprint>,
    buffer: SmoothMask,
    scratch: Vec<f32>,
    cache_hits: u64,
}

impl MaskSmoother {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            kernel: Kernel::new(tuning.smooth_radius, tuning.smooth_sigma),
            hash_stride: tuning.mask_hash_stride,
            last_fingerprint: None,
            buffer: SmoothMask::default(),
            scratch: Vec::new(),
            cache_hits: 0,
        }
    }

    /// Smooth `raw` (0 = background, >0 = hair)
    ///
    /// Returns the cached buffer untouched when the sampled fingerprint and
    /// dimensions match the previous call.
    pub fn smooth(&mut self, raw: &[u8], width: u32, height: u32) -> RecolorResult<&SmoothMask> {
        let expected = (width * height) as usize;
        if raw.len() != expected {
            return Err(RecolorError::InvalidMaskShape {
                expected,
                actual: raw.len(),
            });
        }

        let fingerprint = MaskFingerprint::of(raw, self.hash_stride);
        if self.last_fingerprint == Some(fingerprint) && self.buffer.matches(width, height) {
            self.cache_hits += 1;
            tracing::trace!("smooth mask cache hit");
            return Ok(&self.buffer);
        }

        let _span = tracing::debug_span!("smooth").entered();
        self.last_fingerprint = Some(fingerprint);

        if !self.buffer.matches(width, height) {
            tracing::debug!("Allocating smooth mask buffer {}x{}", width, height);
            self.buffer = SmoothMask {
                width,
                height,
                values: vec![0.0; expected],
            };
        }

        let out = &mut self.buffer.values;
        for (dst, &label) in out.iter_mut().zip(raw) {
            *dst = if label > 0 { 1.0 } else { 0.0 };
        }

        self.scratch.clear();
        self.scratch.extend_from_slice(out);
        Self::feather(&self.kernel, &self.scratch, out, width as usize, height as usize);

        for value in out.iter_mut() {
            if *value > 0.0 && *value < 1.0 {
                let t = *value;
                *value = t * t * (3.0 - 2.0 * t);
            }
        }

        Ok(&self.buffer)
    }

    /// Gaussian pass over pixels touching hair. A `radius`-wide border is
    /// left as the binarized input.
    fn feather(kernel: &Kernel, src: &[f32], dst: &mut [f32], width: usize, height: usize) {
        let r = kernel.radius;
        if width <= 2 * r || height <= 2 * r {
            return;
        }

        for y in r..height - r {
            for x in r..width - r {
                let idx = y * width + x;
                let touches_hair = src[idx] > 0.0
                    || src[idx - width] > 0.0
                    || src[idx + width] > 0.0
                    || src[idx - 1] > 0.0
                    || src[idx + 1] > 0.0;
                if !touches_hair {
                    continue;
                }

                let mut sum = 0.0;
                for &(dx, dy, weight) in &kernel.taps {
                    let sx = (x as isize + dx) as usize;
                    let sy = (y as isize + dy) as usize;
                    sum += src[sy * width + sx] * weight;
                }
                dst[idx] = sum / kernel.weight_sum;
            }
        }
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    /// Forget the cached mask so the next call recomputes
    pub fn invalidate(&mut self) {
        self.last_fingerprint = None;
    }

    /// Drop the buffers at session end
    pub fn release(&mut self) {
        self.last_fingerprint = None;
        self.buffer = SmoothMask::default();
        self.scratch = Vec::new();
    }
}
