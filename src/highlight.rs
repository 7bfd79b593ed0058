use crate::color::luma;
use crate::config::Tuning;
use crate::error::{RecolorError, RecolorResult};
use crate::fingerprint::SettingsFingerprint;
use crate::settings::RecolorSettings;
use crate::smoother::SmoothMask;
use image::RgbaImage;
use std::f32::consts::PI;

/// Synthetic highlight strength in [0, 1], row-major
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighlightMask {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl HighlightMask {
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

    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    /// Resize to `width`x`height` and zero every value
    fn reset(&mut self, width: u32, height: u32) {
        let len = (width * height) as usize;
        self.width = width;
        self.height = height;
        self.values.clear();
        self.values.resize(len, 0.0);
    }
}

/// Inclusive pixel bounds of the detected hair region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HairBounds {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl HairBounds {
    /// Scan `mask` on a `stride` grid for samples above `threshold`.
    /// Returns `None` when the box has no width or no height.
    pub fn detect(mask: &SmoothMask, stride: usize, threshold: f32) -> Option<Self> {
        let (width, height) = (mask.width(), mask.height());
        let mut bounds: Option<Self> = None;

        for y in (0..height).step_by(stride) {
            for x in (0..width).step_by(stride) {
                if mask.get(x, y) <= threshold {
                    continue;
                }
                let b = bounds.get_or_insert(Self {
                    left: x,
                    top: y,
                    right: x,
                    bottom: y,
                });
                b.left = b.left.min(x);
                b.top = b.top.min(y);
                b.right = b.right.max(x);
                b.bottom = b.bottom.max(y);
            }
        }

        bounds.filter(|b| b.right > b.left && b.bottom > b.top)
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.left..=self.right).contains(&x) && (self.top..=self.bottom).contains(&y)
    }
}

/// Places highlight strands inside the hair region
///
/// The output is cached by settings fingerprint only. Hair moving under
/// unchanged settings keeps the previous strands until a setting or the
/// frame size changes.
pub struct HighlightSynthesizer {
    scan_stride: usize,
    box_threshold: f32,
    mask_threshold: f32,
    strand_count: usize,
    active: Vec<bool>,
    last_fingerprint: Option<SettingsFingerprint>,
    buffer: HighlightMask,
    bounds: Option<HairBounds>,
}

impl HighlightSynthesizer {
    pub fn new(tuning: &Tuning) -> Self {
        let mut active = vec![false; tuning.strand_count];
        for &idx in &tuning.active_strands {
            if let Some(slot) = active.get_mut(idx) {
                *slot = true;
            }
        }

        Self {
            scan_stride: tuning.highlight_scan_stride,
            box_threshold: tuning.highlight_box_threshold,
            mask_threshold: tuning.highlight_mask_threshold,
            strand_count: tuning.strand_count,
            active,
            last_fingerprint: None,
            buffer: HighlightMask::default(),
            bounds: None,
        }
    }

    /// Build the highlight mask for the current frame
    ///
    /// `frame` must be the frame before recoloring; its luma shapes the
    /// strands. `smooth` and `frame` must both be `width`x`height`.
    pub fn synthesize(
        &mut self,
        width: u32,
        height: u32,
        smooth: &SmoothMask,
        frame: &RgbaImage,
        settings: &RecolorSettings,
    ) -> RecolorResult<&HighlightMask> {
        let expected = (width * height) as usize;
        for (w, h) in [(smooth.width(), smooth.height()), frame.dimensions()] {
            if (w, h) != (width, height) {
                return Err(RecolorError::InvalidMaskShape {
                    expected,
                    actual: (w * h) as usize,
                });
            }
        }

        if !settings.highlights_enabled {
            // Re-enabling must recompute even if nothing else changed
            self.last_fingerprint = None;
            self.bounds = None;
            self.buffer.reset(width, height);
            return Ok(&self.buffer);
        }

        let fingerprint = SettingsFingerprint::new(settings, width, height);
        if self.last_fingerprint == Some(fingerprint)
            && self.buffer.width == width
            && self.buffer.height == height
        {
            tracing::trace!("highlight cache hit");
            return Ok(&self.buffer);
        }

        let _span = tracing::debug_span!("highlights").entered();
        self.last_fingerprint = Some(fingerprint);
        self.buffer.reset(width, height);

        self.bounds = HairBounds::detect(smooth, self.scan_stride, self.box_threshold);
        let Some(bounds) = self.bounds else {
            tracing::debug!("No hair region for highlights");
            return Ok(&self.buffer);
        };

        let strand_width = bounds.width() as f32 / self.strand_count as f32;
        let hair_height = bounds.height() as f32;
        let intensity = settings.highlight_intensity;

        for y in bounds.top..=bounds.bottom {
            let vertical_pos = (y - bounds.top) as f32 / hair_height;
            let vertical_gradient = vertical_pos * vertical_pos;

            for x in bounds.left..=bounds.right {
                let mask_value = smooth.get(x, y);
                if mask_value <= self.mask_threshold {
                    continue;
                }

                let relative_x = (x - bounds.left) as f32;
                let strand = (relative_x / strand_width).floor() as usize;
                if !self.active.get(strand).copied().unwrap_or(false) {
                    continue;
                }

                let pos_in_strand = (relative_x % strand_width) / strand_width;
                let strand_gradient = (pos_in_strand * PI).sin();
                let pixel = frame.get_pixel(x, y);
                let brightness = luma(pixel[0], pixel[1], pixel[2]);

                let strength =
                    mask_value * strand_gradient * brightness * vertical_gradient * intensity;
                self.buffer.values[(y * width + x) as usize] = strength.clamp(0.0, 1.0);
            }
        }

        Ok(&self.buffer)
    }

    /// Hair bounds found by the last recompute
    pub fn bounds(&self) -> Option<HairBounds> {
        self.bounds
    }

    /// Drop the cached strands so the next call recomputes
    pub fn invalidate(&mut self) {
        self.last_fingerprint = None;
    }

    pub fn release(&mut self) {
        self.last_fingerprint = None;
        self.bounds = None;
        self.buffer = HighlightMask::default();
    }
}
