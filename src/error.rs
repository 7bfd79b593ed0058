use thiserror::Error;

/// Result alias for the recoloring core
pub type RecolorResult<T> = Result<T, RecolorError>;

/// Errors surfaced by the recoloring core
///
/// Cache staleness from fingerprint collisions is not represented here: a
/// stale buffer is served for at most one frame and never reported.
#[derive(Debug, Error)]
pub enum RecolorError {
    /// Mask dimensions don't match the frame. The frame is skipped.
    #[error("invalid mask shape: expected {expected} labels, got {actual}")]
    InvalidMaskShape { expected: usize, actual: usize },

    /// Mask handle did not expose a byte buffer. The frame is skipped.
    #[error("invalid mask format")]
    InvalidMaskFormat,

    /// The segmentation collaborator failed for this tick
    #[error("segmentation failed: {0}")]
    Segmentation(String),

    /// Camera or segmenter could not be started
    #[error("failed to acquire resource: {0}")]
    ResourceAcquisition(String),

    /// A color could not be parsed or found in the palette
    #[error("invalid color: {0}")]
    InvalidColor(String),

    /// Tuning or settings out of range
    #[error("configuration error: {0}")]
    Config(String),
}

impl RecolorError {
    /// Whether the session can keep running after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ResourceAcquisition(_) | Self::Config(_))
    }
}
