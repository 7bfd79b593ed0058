//! Cache keys for the per-frame stages
//!
//! The mask fingerprint is a sampled rolling checksum, not a content hash.
//! Two different masks that agree on every sampled byte collide and the
//! smoother serves the previous buffer for one frame. That staleness is
//! accepted: hashing every byte would cost as much as the smoothing it
//! guards.

use crate::settings::RecolorSettings;

/// Sampled checksum of a raw mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaskFingerprint(i32);

impl MaskFingerprint {
    /// Fold every `stride`-th byte into a `hash * 31 + byte` checksum
    pub fn of(mask: &[u8], stride: usize) -> Self {
        let hash = mask.iter().step_by(stride.max(1)).fold(0i32, |hash, &byte| {
            (hash << 5).wrapping_sub(hash).wrapping_add(byte as i32)
        });
        Self(hash)
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

/// Every user setting that affects output, plus frame size
///
/// Intensities are compared bit for bit, so 0.4 and 0.40000001 differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SettingsFingerprint {
    base: [u8; 3],
    highlight: [u8; 3],
    highlights_enabled: bool,
    highlight_intensity: u32,
    color_intensity: u32,
    width: u32,
    height: u32,
}

impl SettingsFingerprint {
    pub fn new(settings: &RecolorSettings, width: u32, height: u32) -> Self {
        Self {
            base: settings.base.base.0,
            highlight: settings.highlight.base.0,
            highlights_enabled: settings.highlights_enabled,
            highlight_intensity: settings.highlight_intensity.to_bits(),
            color_intensity: settings.color_intensity.to_bits(),
            width,
            height,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorSpec;

    fn settings() -> RecolorSettings {
        RecolorSettings::new(
            ColorSpec::parse("#2d2823").unwrap(),
            ColorSpec::parse("#f5f5dc").unwrap(),
        )
    }

    #[test]
    fn identical_masks_share_a_fingerprint() {
        let a = vec![1u8; 1000];
        let b = a.clone();
        assert_eq!(MaskFingerprint::of(&a, 200), MaskFingerprint::of(&b, 200));
    }

    #[test]
    fn sampled_bytes_change_the_fingerprint() {
        let a = vec![0u8; 1000];
        let mut b = a.clone();
        b[400] = 1;
        assert_ne!(MaskFingerprint::of(&a, 200), MaskFingerprint::of(&b, 200));
    }

    #[test]
    fn unsampled_bytes_collide() {
        let a = vec![0u8; 1000];
        let mut b = a.clone();
        b[401] = 1;
        assert_eq!(MaskFingerprint::of(&a, 200), MaskFingerprint::of(&b, 200));
    }

    #[test]
    fn fingerprint_is_order_sensitive() {
        let a = [1u8, 0, 0, 0];
        let b = [0u8, 0, 0, 1];
        assert_ne!(MaskFingerprint::of(&a, 1), MaskFingerprint::of(&b, 1));
    }

    #[test]
    fn long_masks_wrap_instead_of_overflowing() {
        let mask = vec![255u8; 1 << 20];
        let _ = MaskFingerprint::of(&mask, 1);
    }

    #[test]
    fn any_setting_change_changes_the_fingerprint() {
        let base = SettingsFingerprint::new(&settings(), 640, 480);
        assert_eq!(base, SettingsFingerprint::new(&settings(), 640, 480));

        let toggled = settings().with_highlights(true, 0.4);
        assert_ne!(base, SettingsFingerprint::new(&toggled, 640, 480));

        let stronger = settings().with_color_intensity(0.9);
        assert_ne!(base, SettingsFingerprint::new(&stronger, 640, 480));

        let mut recolored = settings();
        recolored.highlight = ColorSpec::parse("#deb887").unwrap();
        assert_ne!(base, SettingsFingerprint::new(&recolored, 640, 480));

        assert_ne!(base, SettingsFingerprint::new(&settings(), 480, 640));
    }
}
