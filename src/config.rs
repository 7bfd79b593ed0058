use crate::error::{RecolorError, RecolorResult};
use serde::Deserialize;
use std::path::Path;

/// Tunable constants for the smoothing, highlight and recolor stages
///
/// Every field has a default, so a JSON file only needs the values it
/// changes: `{ "texture_factor": 0.25, "smooth_radius": 3 }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tuning {
    // Mask smoother
    /// Gaussian kernel radius in pixels
    pub smooth_radius: usize,
    pub smooth_sigma: f32,
    /// Raw mask bytes skipped between fingerprint samples
    pub mask_hash_stride: usize,

    // Highlight synthesizer
    /// Grid step used to find the hair bounding box
    pub highlight_scan_stride: usize,
    /// Smoothed mask value a grid sample must exceed to count as hair
    pub highlight_box_threshold: f32,
    /// Smoothed mask value a pixel must exceed to receive highlights
    pub highlight_mask_threshold: f32,
    pub strand_count: usize,
    pub active_strands: Vec<usize>,

    // Color compositor
    /// Raw mask bytes skipped by the no-hair early-out
    pub early_out_stride: usize,
    /// Smoothed mask values below this are left untouched
    pub negligible_mask: f32,
    /// Highlight mask values above this switch to the highlight color
    pub highlight_activation: f32,
    /// Fraction of color intensity used to pull value toward the target
    pub brightness_lift: f32,
    pub light_target_value: f32,
    pub dark_hair_value: f32,
    /// Value floor, as a fraction of target value, for light-on-dark
    pub light_on_dark_floor: f32,
    /// Share of saturation taken from the target, the rest from the pixel
    pub target_saturation_weight: f32,
    pub edge_threshold: f32,
    pub edge_exponent: f32,
    pub stray_floor: f32,
    pub stray_brightness_weight: f32,
    /// Fraction of the blend delta given back to keep texture
    pub texture_factor: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            smooth_radius: 4,
            smooth_sigma: 2.2,
            mask_hash_stride: 200,
            highlight_scan_stride: 10,
            highlight_box_threshold: 0.3,
            highlight_mask_threshold: 0.15,
            strand_count: 8,
            active_strands: vec![1, 3, 5, 7],
            early_out_stride: 10,
            negligible_mask: 0.02,
            highlight_activation: 0.15,
            brightness_lift: 0.7,
            light_target_value: 0.6,
            dark_hair_value: 0.4,
            light_on_dark_floor: 0.75,
            target_saturation_weight: 0.85,
            edge_threshold: 0.3,
            edge_exponent: 0.5,
            stray_floor: 0.6,
            stray_brightness_weight: 0.2,
            texture_factor: 0.15,
        }
    }
}

fn unit(name: &str, value: f32) -> RecolorResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RecolorError::Config(format!("{name} must be within [0, 1], got {value}")))
    }
}

impl Tuning {
    /// Load a JSON tuning file and validate it
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> RecolorResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RecolorError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> RecolorResult<Self> {
        let tuning: Tuning =
            serde_json::from_str(text).map_err(|e| RecolorError::Config(e.to_string()))?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn validate(&self) -> RecolorResult<()> {
        if self.smooth_sigma <= 0.0 {
            return Err(RecolorError::Config("smooth_sigma must be positive".into()));
        }
        for (name, stride) in [
            ("mask_hash_stride", self.mask_hash_stride),
            ("early_out_stride", self.early_out_stride),
        ] {
            if stride == 0 {
                return Err(RecolorError::Config(format!("{name} must be at least 1")));
            }
        }
        if self.highlight_scan_stride < 3 {
            return Err(RecolorError::Config("highlight_scan_stride must be at least 3".into()));
        }
        if self.strand_count == 0 {
            return Err(RecolorError::Config("strand_count must be at least 1".into()));
        }
        if let Some(bad) = self.active_strands.iter().find(|&&s| s >= self.strand_count) {
            return Err(RecolorError::Config(format!(
                "active strand {bad} is outside 0..{}",
                self.strand_count
            )));
        }
        for (name, value) in [
            ("highlight_box_threshold", self.highlight_box_threshold),
            ("highlight_mask_threshold", self.highlight_mask_threshold),
            ("negligible_mask", self.negligible_mask),
            ("highlight_activation", self.highlight_activation),
            ("brightness_lift", self.brightness_lift),
            ("light_target_value", self.light_target_value),
            ("dark_hair_value", self.dark_hair_value),
            ("light_on_dark_floor", self.light_on_dark_floor),
            ("target_saturation_weight", self.target_saturation_weight),
            ("stray_floor", self.stray_floor),
            ("stray_brightness_weight", self.stray_brightness_weight),
            ("texture_factor", self.texture_factor),
        ] {
            unit(name, value)?;
        }
        if self.edge_threshold <= 0.0 || self.edge_threshold > 1.0 {
            return Err(RecolorError::Config("edge_threshold must be within (0, 1]".into()));
        }
        if self.edge_exponent <= 0.0 {
            return Err(RecolorError::Config("edge_exponent must be positive".into()));
        }
        Ok(())
    }
}
