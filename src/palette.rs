//! Built-in hair color palette
//!
//! Base colors are grouped by category and carry light/dark variants.
//! Highlight colors are single tones meant for the strand overlay.

use crate::color::{parse_rgb, ColorSpec};
use crate::error::{RecolorError, RecolorResult};

/// A palette category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub slug: &'static str,
    pub title: &'static str,
    pub swatch: &'static str,
}

/// A palette entry as hex strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    pub category: &'static str,
    pub title: &'static str,
    pub color: &'static str,
    pub light: &'static str,
    pub dark: &'static str,
}

/// A highlight tone as a hex string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightEntry {
    pub title: &'static str,
    pub color: &'static str,
}

pub const CATEGORIES: &[Category] = &[
    Category { slug: "red", title: "Red & Wine", swatch: "#6f3140" },
    Category { slug: "brown", title: "Modern Brown", swatch: "#2d2823" },
    Category { slug: "natural", title: "Natural", swatch: "#28282e" },
    Category { slug: "quartz", title: "Quartz", swatch: "#281c1e" },
    Category { slug: "variation", title: "Variation", swatch: "#a3a2a8" },
];

const fn entry(
    category: &'static str,
    title: &'static str,
    color: &'static str,
    light: &'static str,
    dark: &'static str,
) -> PaletteEntry {
    PaletteEntry { category, title, color, light, dark }
}

pub const PALETTE: &[PaletteEntry] = &[
    entry("red", "Dark Wine", "#231121", "#4a2342", "#150a13"),
    entry("red", "Wine", "#2c1c27", "#583848", "#1c0e19"),
    entry("red", "Light Wine", "#3c1e3c", "#6e3c6e", "#2a122a"),
    entry("red", "Cherry Red", "#6f3140", "#9e4660", "#4a1f2b"),
    entry("red", "Light Cherry Red", "#7c4650", "#b26878", "#562f38"),
    entry("red", "Fire Red", "#42050b", "#8a0a16", "#2a0307"),
    entry("red", "Light Fire Red", "#50141e", "#a0283c", "#350d14"),
    entry("brown", "Dark Chocolate", "#2d2823", "#5a5046", "#1d1a16"),
    entry("brown", "Nutella", "#5a463f", "#8c6e5f", "#3d2f2a"),
    entry("brown", "Cafe Latte", "#a6826f", "#d4b29f", "#7a5e4f"),
    entry("brown", "Mocha", "#463225", "#6e4e3a", "#2e2118"),
    entry("brown", "Ice Mocha", "#b9a07d", "#e5ccad", "#8a7559"),
    entry("brown", "Hot Chocolate", "#321e14", "#643c28", "#21130d"),
    entry("brown", "Mink", "#644b41", "#967161", "#44322b"),
    entry("brown", "White Chocolate", "#debeaa", "#f5e5d5", "#b59e8a"),
    entry("natural", "Black", "#000000", "#2a2a2a", "#000000"),
    entry("natural", "Dark Brown", "#28282e", "#50505c", "#1a1a1e"),
    entry("natural", "Very Dark Brown", "#0d0a15", "#1a142a", "#05030a"),
    entry("natural", "Brown", "#463a38", "#6e5e5c", "#2e2624"),
    entry("natural", "Light Brown", "#493c3c", "#735e5e", "#312828"),
    entry("natural", "Dark Blonde", "#4f3b32", "#7a5b4c", "#352721"),
    entry("natural", "Blonde", "#644632", "#966a4c", "#442f21"),
    entry("natural", "Light Blonde", "#7d583b", "#bc8459", "#563c28"),
    entry("natural", "Very Light Blonde", "#86643a", "#c89658", "#5e4528"),
    entry("natural", "Extra Light Blonde", "#d8be91", "#f5e5c9", "#b39e73"),
    entry("quartz", "Smoky Quartz", "#281c1e", "#50383c", "#1a1214"),
    entry("quartz", "Light Smoky Quartz", "#867072", "#b6a0a2", "#5e4e50"),
    entry("quartz", "Very Light Smoky Quartz", "#b09793", "#d8c7c3", "#886f6b"),
    entry("quartz", "Rose Quartz", "#b68e8e", "#d8b6b6", "#8e6666"),
    entry("quartz", "Light Rose Quartz", "#c6a0a0", "#e6c8c8", "#9e7878"),
    entry("variation", "Silver Variation", "#a3a2a8", "#d3d2d8", "#73727a"),
    entry("variation", "Green Variation", "#3c5055", "#5c7880", "#28383b"),
];

pub const HIGHLIGHTS: &[HighlightEntry] = &[
    HighlightEntry { title: "Platinum", color: "#F5F5DC" },
    HighlightEntry { title: "Champagne", color: "#E6D3A3" },
    HighlightEntry { title: "Honey", color: "#DEB887" },
    HighlightEntry { title: "Caramel", color: "#D2B48C" },
    HighlightEntry { title: "Light Gold", color: "#F0E68C" },
    HighlightEntry { title: "Cream", color: "#FFEFD5" },
    HighlightEntry { title: "Moccasin", color: "#FFE4B5" },
    HighlightEntry { title: "Lavender", color: "#E6E6FA" },
];

pub const DEFAULT_BASE: &str = "Dark Chocolate";
pub const DEFAULT_HIGHLIGHT: &str = "Platinum";

fn matches_name(title: &str, query: &str) -> bool {
    let slug: String = title
        .chars()
        .map(|c| if c == ' ' { '-' } else { c.to_ascii_lowercase() })
        .collect();
    title.eq_ignore_ascii_case(query) || slug == query.to_ascii_lowercase()
}

impl PaletteEntry {
    pub fn to_spec(&self) -> RecolorResult<ColorSpec> {
        Ok(ColorSpec::new(self.title, parse_rgb(self.color)?)
            .with_variants(parse_rgb(self.light)?, parse_rgb(self.dark)?))
    }
}

impl HighlightEntry {
    pub fn to_spec(&self) -> RecolorResult<ColorSpec> {
        Ok(ColorSpec::new(self.title, parse_rgb(self.color)?))
    }
}

/// Base colors belonging to `slug`
pub fn in_category(slug: &str) -> impl Iterator<Item = &'static PaletteEntry> + '_ {
    PALETTE.iter().filter(move |e| e.category == slug)
}

/// Find a base color by title or slug, e.g. "Cafe Latte" or "cafe-latte"
pub fn base_color(name: &str) -> RecolorResult<ColorSpec> {
    PALETTE
        .iter()
        .find(|e| matches_name(e.title, name))
        .ok_or_else(|| RecolorError::InvalidColor(format!("no palette color named '{name}'")))?
        .to_spec()
}

/// Find a highlight color by title or slug
pub fn highlight_color(name: &str) -> RecolorResult<ColorSpec> {
    HIGHLIGHTS
        .iter()
        .find(|e| matches_name(e.title, name))
        .ok_or_else(|| RecolorError::InvalidColor(format!("no highlight color named '{name}'")))?
        .to_spec()
}

/// Resolve a palette name first, then fall back to a literal color value
pub fn resolve_base(value: &str) -> RecolorResult<ColorSpec> {
    base_color(value).or_else(|_| ColorSpec::parse(value))
}

/// Same as [`resolve_base`] for highlight tones
pub fn resolve_highlight(value: &str) -> RecolorResult<ColorSpec> {
    highlight_color(value).or_else(|_| ColorSpec::parse(value))
}
