use crate::compositor::{any_hair, ColorCompositor};
use crate::config::Tuning;
use crate::error::RecolorResult;
use crate::fingerprint::SettingsFingerprint;
use crate::highlight::HighlightSynthesizer;
use crate::segmentation::SegmentationMask;
use crate::settings::RecolorSettings;
use crate::smoother::{MaskSmoother, SmoothMask};
use image::RgbaImage;

/// What the pipeline shows for each processed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DisplayMode {
    /// Recolored camera frame
    #[default]
    Recolor,
    /// Smoothed hair mask as grayscale, for debugging segmentation
    Mask,
}

/// Result of running one frame through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecolorOutcome {
    /// Hair pixels were recolored
    Recolored,
    /// The sampled mask held no hair; the frame is untouched
    NoHair,
    /// The frame now shows the smoothed mask
    MaskRendered,
}

/// Settings cache state: each change invalidates the color and highlight
/// caches but never the smoothed mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettingsState {
    Invalidated,
    Stable(SettingsFingerprint),
}

/// Smoother, highlight synthesizer and compositor wired in order
///
/// Owns every cross-frame buffer of the session.
pub struct RecolorPipeline {
    early_out_stride: usize,
    smoother: MaskSmoother,
    highlights: HighlightSynthesizer,
    compositor: ColorCompositor,
    state: SettingsState,
}

impl RecolorPipeline {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            early_out_stride: tuning.early_out_stride,
            smoother: MaskSmoother::new(tuning),
            highlights: HighlightSynthesizer::new(tuning),
            compositor: ColorCompositor::new(tuning),
            state: SettingsState::Invalidated,
        }
    }

    /// Recolor `frame` in place using `mask`
    ///
    /// The mask is consumed so any native handle is closed on every path,
    /// including errors. On error the frame is left as it was.
    pub fn process(
        &mut self,
        frame: &mut RgbaImage,
        mask: SegmentationMask,
        settings: &RecolorSettings,
        mode: DisplayMode,
    ) -> RecolorResult<RecolorOutcome> {
        let (width, height) = frame.dimensions();
        let labels = mask.labels_for(width, height)?;

        if mode == DisplayMode::Mask {
            let smooth = self.smoother.smooth(labels, width, height)?;
            render_mask(frame, smooth);
            return Ok(RecolorOutcome::MaskRendered);
        }

        if !any_hair(labels, self.early_out_stride) {
            return Ok(RecolorOutcome::NoHair);
        }

        self.track_settings(settings, width, height);

        let smooth = self.smoother.smooth(labels, width, height)?;
        let highlight = self
            .highlights
            .synthesize(width, height, smooth, frame, settings)?;
        self.compositor
            .composite(frame, smooth, highlight, settings)?;

        Ok(RecolorOutcome::Recolored)
    }

    fn track_settings(&mut self, settings: &RecolorSettings, width: u32, height: u32) {
        let fingerprint = SettingsFingerprint::new(settings, width, height);
        if self.state == SettingsState::Stable(fingerprint) {
            return;
        }

        if let SettingsState::Stable(_) = self.state {
            tracing::debug!("Recolor settings changed, dropping color and highlight caches");
        }
        self.compositor.invalidate();
        self.highlights.invalidate();
        self.state = SettingsState::Stable(fingerprint);
    }

    pub fn smoother(&self) -> &MaskSmoother {
        &self.smoother
    }

    pub fn highlights(&self) -> &HighlightSynthesizer {
        &self.highlights
    }

    pub fn compositor(&self) -> &ColorCompositor {
        &self.compositor
    }

    /// Free every cached buffer at session end
    pub fn release(&mut self) {
        self.smoother.release();
        self.highlights.release();
        self.compositor.invalidate();
        self.state = SettingsState::Invalidated;
    }
}

/// Overwrite `frame` with the smoothed mask as opaque grayscale
fn render_mask(frame: &mut RgbaImage, smooth: &SmoothMask) {
    for (pixel, &value) in frame.pixels_mut().zip(smooth.values()) {
        let level = (value * 255.0).clamp(0.0, 255.0) as u8;
        *pixel = image::Rgba([level, level, level, 255]);
    }
}
