use crate::color::{hsv_to_rgb, rgb_to_hsv, Hsv};
use crate::config::Tuning;
use crate::error::{RecolorError, RecolorResult};
use crate::fingerprint::SettingsFingerprint;
use crate::highlight::HighlightMask;
use crate::settings::RecolorSettings;
use crate::smoother::SmoothMask;
use image::RgbaImage;

/// HSV of the selected base and highlight colors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedHsv {
    pub base: Hsv,
    pub highlight: Hsv,
}

impl CachedHsv {
    pub fn from_settings(settings: &RecolorSettings) -> Self {
        Self {
            base: Hsv::from_rgb(settings.base.base),
            highlight: Hsv::from_rgb(settings.highlight.base),
        }
    }
}

/// Cheap hair check on every `stride`-th label
///
/// Very thin masks can fall between samples and skip a frame.
pub fn any_hair(labels: &[u8], stride: usize) -> bool {
    labels.iter().step_by(stride.max(1)).any(|&label| label > 0)
}

/// Recolors hair pixels of a frame in place
pub struct ColorCompositor {
    tuning: Tuning,
    cached: Option<(SettingsFingerprint, CachedHsv)>,
    hsv_refreshes: u64,
}

impl ColorCompositor {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            tuning: tuning.clone(),
            cached: None,
            hsv_refreshes: 0,
        }
    }

    /// Target colors for `settings`, recomputed only when the fingerprint
    /// moves
    pub fn target_hsv(&mut self, settings: &RecolorSettings, width: u32, height: u32) -> CachedHsv {
        let fingerprint = SettingsFingerprint::new(settings, width, height);
        match self.cached {
            Some((cached_fp, hsv)) if cached_fp == fingerprint => hsv,
            _ => {
                let hsv = CachedHsv::from_settings(settings);
                self.cached = Some((fingerprint, hsv));
                self.hsv_refreshes += 1;
                tracing::debug!(?hsv, "Target colors refreshed");
                hsv
            }
        }
    }

    /// Blend the selected colors into `frame` wherever `smooth` marks hair
    ///
    /// The frame is only touched once both masks are known to cover it.
    pub fn composite(
        &mut self,
        frame: &mut RgbaImage,
        smooth: &SmoothMask,
        highlight: &HighlightMask,
        settings: &RecolorSettings,
    ) -> RecolorResult<()> {
        let (width, height) = frame.dimensions();
        let expected = (width * height) as usize;
        for actual in [smooth.values().len(), highlight.values().len()] {
            if actual != expected {
                return Err(RecolorError::InvalidMaskShape { expected, actual });
            }
        }

        let _span = tracing::debug_span!("composite").entered();
        let targets = self.target_hsv(settings, width, height);
        let tuning = &self.tuning;
        let color_intensity = settings.color_intensity;

        let pixels = frame.as_mut().chunks_exact_mut(4);
        for ((pixel, &mask_value), &highlight_value) in
            pixels.zip(smooth.values()).zip(highlight.values())
        {
            if mask_value < tuning.negligible_mask {
                continue;
            }
            let recolored = recolor_pixel(
                [pixel[0], pixel[1], pixel[2]],
                mask_value,
                highlight_value,
                &targets,
                color_intensity,
                tuning,
            );
            pixel[..3].copy_from_slice(&recolored);
        }

        Ok(())
    }

    /// How many times the target HSV had to be recomputed
    pub fn hsv_refreshes(&self) -> u64 {
        self.hsv_refreshes
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

/// New RGB for one hair pixel
///
/// Works in HSV: hue comes from the target, saturation mostly from the
/// target, and value is pulled toward the target by the color intensity.
/// The result is alpha-blended over the original with softer edges and a
/// little of the original texture given back.
pub fn recolor_pixel(
    original: [u8; 3],
    mask_value: f32,
    highlight_value: f32,
    targets: &CachedHsv,
    color_intensity: f32,
    tuning: &Tuning,
) -> [u8; 3] {
    let source = rgb_to_hsv(original[0], original[1], original[2]);
    let brightness = source.v;

    let highlighted = highlight_value > tuning.highlight_activation;
    let target = if highlighted {
        targets.highlight
    } else {
        targets.base
    };

    let lift = color_intensity * tuning.brightness_lift;
    let mut value = brightness + (target.v - brightness) * lift;
    // HSV under-lightens dark hair when the target is light
    if target.v > tuning.light_target_value && brightness < tuning.dark_hair_value {
        value = value.max(target.v * tuning.light_on_dark_floor);
    }

    let weight = tuning.target_saturation_weight;
    let recolored = hsv_to_rgb(Hsv {
        h: target.h,
        s: (target.s * weight + source.s * (1.0 - weight)).min(1.0),
        v: value.clamp(0.0, 1.0),
    });

    let effective = if highlighted {
        highlight_value
    } else {
        mask_value * color_intensity
    };
    let edge = if mask_value < tuning.edge_threshold {
        (mask_value / tuning.edge_threshold).powf(tuning.edge_exponent)
    } else {
        1.0
    };
    let stray = (1.0 - brightness * tuning.stray_brightness_weight).max(tuning.stray_floor);
    let alpha = effective * stray * edge;

    let mut out = [0u8; 3];
    for ((dst, &orig), &new) in out.iter_mut().zip(&original).zip(&recolored) {
        let orig = orig as f32;
        let blended = new * alpha + orig * (1.0 - alpha);
        let textured = blended - (blended - orig) * tuning.texture_factor;
        *dst = textured.round().clamp(0.0, 255.0) as u8;
    }
    out
}
