use crate::color::ColorSpec;
use crate::error::RecolorResult;
use crate::palette;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Slider range the UI offers for highlight intensity
pub const HIGHLIGHT_INTENSITY_RANGE: RangeInclusive<f32> = 0.2..=0.8;

/// Slider range the UI offers for color intensity
pub const COLOR_INTENSITY_RANGE: RangeInclusive<f32> = 0.3..=1.0;

/// User-adjustable recolor settings, read as a snapshot once per frame
#[derive(Debug, Clone, PartialEq)]
pub struct RecolorSettings {
    pub base: ColorSpec,
    pub highlight: ColorSpec,
    pub highlights_enabled: bool,
    pub highlight_intensity: f32,
    pub color_intensity: f32,
}

impl RecolorSettings {
    /// Palette defaults: Dark Chocolate, Platinum highlights off, 70% color
    pub fn palette_default() -> RecolorResult<Self> {
        Ok(Self {
            base: palette::base_color(palette::DEFAULT_BASE)?,
            highlight: palette::highlight_color(palette::DEFAULT_HIGHLIGHT)?,
            highlights_enabled: false,
            highlight_intensity: 0.4,
            color_intensity: 0.7,
        })
    }

    pub fn new(base: ColorSpec, highlight: ColorSpec) -> Self {
        Self {
            base,
            highlight,
            highlights_enabled: false,
            highlight_intensity: 0.4,
            color_intensity: 0.7,
        }
    }

    pub fn with_highlights(mut self, enabled: bool, intensity: f32) -> Self {
        self.highlights_enabled = enabled;
        self.highlight_intensity = intensity.clamp(0.0, 1.0);
        self
    }

    pub fn with_color_intensity(mut self, intensity: f32) -> Self {
        self.color_intensity = intensity.clamp(0.0, 1.0);
        self
    }
}

/// Coarse device capability used for pacing and capture constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DeviceClass {
    #[default]
    Desktop,
    Mobile,
}

const MOBILE_AGENTS: &[&str] = &[
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

/// Preferred capture format for a device class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl DeviceClass {
    /// Guess the class from a user-agent string
    pub fn from_user_agent(user_agent: &str) -> Self {
        let agent = user_agent.to_ascii_lowercase();
        if MOBILE_AGENTS.iter().any(|needle| agent.contains(needle)) {
            Self::Mobile
        } else {
            Self::Desktop
        }
    }

    /// Minimum time between two processed frames
    pub fn min_frame_interval(&self) -> Duration {
        match self {
            Self::Desktop => Duration::from_millis(80),
            Self::Mobile => Duration::from_millis(150),
        }
    }

    pub fn capture_constraints(&self) -> CaptureConstraints {
        match self {
            Self::Desktop => CaptureConstraints {
                width: 1280,
                height: 720,
                fps: 30,
            },
            Self::Mobile => CaptureConstraints {
                width: 640,
                height: 480,
                fps: 20,
            },
        }
    }
}
