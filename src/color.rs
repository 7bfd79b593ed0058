use crate::error::{RecolorError, RecolorResult};
use image::Rgb;

/// Hue, saturation and value, each in [0, 1]
///
/// Hue is a fraction of a full turn, so red is 0.0 and wraps back at 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

impl Hsv {
    pub const BLACK: Hsv = Hsv {
        h: 0.0,
        s: 0.0,
        v: 0.0,
    };

    pub fn from_rgb(color: Rgb<u8>) -> Self {
        rgb_to_hsv(color[0], color[1], color[2])
    }
}

/// Convert 8-bit RGB to HSV
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;
    let s = if max == 0.0 { 0.0 } else { d / max };

    let h = if d == 0.0 {
        0.0
    } else if max == r {
        ((g - b) / d + if g < b { 6.0 } else { 0.0 }) / 6.0
    } else if max == g {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };

    Hsv { h, s, v: max }
}

/// Convert HSV back to RGB on the 0-255 scale, unrounded
pub fn hsv_to_rgb(hsv: Hsv) -> [f32; 3] {
    let Hsv { h, s, v } = hsv;
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    let (r, g, b) = match (sector as i32).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    [r * 255.0, g * 255.0, b * 255.0]
}

/// Rec. 601 luma normalized to [0, 1]
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> f32 {
    (r as f32 * 0.299 + g as f32 * 0.587 + b as f32 * 0.114) / 255.0
}

/// Parse `#rrggbb`, `rrggbb` or `r,g,b`
pub fn parse_rgb(input: &str) -> RecolorResult<Rgb<u8>> {
    let trimmed = input.trim();

    if trimmed.contains(',') {
        let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(RecolorError::InvalidColor(input.to_string()));
        }
        let mut channels = [0u8; 3];
        for (slot, part) in channels.iter_mut().zip(parts) {
            *slot = part
                .parse::<u8>()
                .map_err(|_| RecolorError::InvalidColor(input.to_string()))?;
        }
        return Ok(Rgb(channels));
    }

    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(RecolorError::InvalidColor(input.to_string()));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|_| RecolorError::InvalidColor(input.to_string()))
    };
    Ok(Rgb([channel(0..2)?, channel(2..4)?, channel(4..6)?]))
}

/// Format a color as lowercase `#rrggbb`
pub fn to_hex(color: Rgb<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

/// Which tonal variant of a [`ColorSpec`] to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Tone {
    #[default]
    Base,
    Light,
    Dark,
}

/// A named color with optional light and dark variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorSpec {
    pub name: String,
    pub base: Rgb<u8>,
    pub light: Option<Rgb<u8>>,
    pub dark: Option<Rgb<u8>>,
}

impl ColorSpec {
    pub fn new(name: impl Into<String>, base: Rgb<u8>) -> Self {
        Self {
            name: name.into(),
            base,
            light: None,
            dark: None,
        }
    }

    pub fn with_variants(mut self, light: Rgb<u8>, dark: Rgb<u8>) -> Self {
        self.light = Some(light);
        self.dark = Some(dark);
        self
    }

    /// Parse a free-form color value. The name is the normalized hex string.
    pub fn parse(input: &str) -> RecolorResult<Self> {
        let base = parse_rgb(input)?;
        Ok(Self::new(to_hex(base), base))
    }

    /// The variant for `tone`, falling back to the base color
    pub fn tone(&self, tone: Tone) -> Rgb<u8> {
        match tone {
            Tone::Base => self.base,
            Tone::Light => self.light.unwrap_or(self.base),
            Tone::Dark => self.dark.unwrap_or(self.base),
        }
    }

    /// Narrow this spec down to a single tone
    pub fn toned(&self, tone: Tone) -> Self {
        Self::new(self.name.clone(), self.tone(tone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(r: u8, g: u8, b: u8) -> [u8; 3] {
        let rgb = hsv_to_rgb(rgb_to_hsv(r, g, b));
        [
            rgb[0].round() as u8,
            rgb[1].round() as u8,
            rgb[2].round() as u8,
        ]
    }

    #[test]
    fn hsv_round_trip_stays_within_one_step() {
        for r in (0..=255u16).step_by(5) {
            for g in (0..=255u16).step_by(3) {
                for b in (0..=255u16).step_by(7) {
                    let (r, g, b) = (r as u8, g as u8, b as u8);
                    let out = round_trip(r, g, b);
                    for (orig, back) in [r, g, b].iter().zip(out.iter()) {
                        assert!(
                            (*orig as i16 - *back as i16).abs() <= 1,
                            "({r},{g},{b}) came back as {out:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn round_trip_covers_extremes() {
        for rgb in [
            [0, 0, 0],
            [255, 255, 255],
            [255, 0, 0],
            [0, 255, 0],
            [0, 0, 255],
            [255, 0, 255],
            [1, 0, 0],
            [254, 255, 255],
        ] {
            let out = round_trip(rgb[0], rgb[1], rgb[2]);
            assert_eq!(out, rgb);
        }
    }

    #[test]
    fn primary_hues() {
        assert_eq!(rgb_to_hsv(255, 0, 0).h, 0.0);
        assert!((rgb_to_hsv(0, 255, 0).h - 1.0 / 3.0).abs() < 1e-6);
        assert!((rgb_to_hsv(0, 0, 255).h - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(rgb_to_hsv(0, 0, 0), Hsv::BLACK);
    }

    #[test]
    fn luma_weights() {
        assert!((luma(255, 255, 255) - 1.0).abs() < 1e-5);
        assert_eq!(luma(0, 0, 0), 0.0);
        assert!(luma(0, 255, 0) > luma(255, 0, 0));
    }

    #[test]
    fn parses_hex_and_triplets() {
        assert_eq!(parse_rgb("#2d2823").unwrap(), Rgb([0x2d, 0x28, 0x23]));
        assert_eq!(parse_rgb("F5F5DC").unwrap(), Rgb([0xf5, 0xf5, 0xdc]));
        assert_eq!(parse_rgb("10, 20,30").unwrap(), Rgb([10, 20, 30]));
        assert!(parse_rgb("#12345").is_err());
        assert!(parse_rgb("1,2").is_err());
        assert!(parse_rgb("300,0,0").is_err());
        assert!(parse_rgb("#zzzzzz").is_err());
    }

    #[test]
    fn tone_falls_back_to_base() {
        let plain = ColorSpec::parse("#112233").unwrap();
        assert_eq!(plain.tone(Tone::Light), plain.base);

        let toned = plain
            .clone()
            .with_variants(Rgb([200, 200, 200]), Rgb([5, 5, 5]));
        assert_eq!(toned.tone(Tone::Light), Rgb([200, 200, 200]));
        assert_eq!(toned.toned(Tone::Dark).base, Rgb([5, 5, 5]));
    }
}
