use crate::error::{RecolorError, RecolorResult};
use anyhow::Result;
use image::RgbaImage;
use std::time::Duration;

/// A mask owned by the segmentation backend
///
/// Native handles may need an explicit close; it runs when the owning
/// [`SegmentationMask`] is dropped.
pub trait MaskHandle: Send {
    /// Category labels, one byte per pixel. `None` if the handle does not
    /// hold a byte mask.
    fn as_bytes(&self) -> Option<&[u8]>;

    /// Release backend resources
    fn close(&mut self) {}
}

/// Where the mask bytes live
pub enum MaskSource {
    Bytes(Vec<u8>),
    Handle(Box<dyn MaskHandle>),
}

/// Per-frame category mask: 0 = not hair, >0 = hair
pub struct SegmentationMask {
    width: u32,
    height: u32,
    source: MaskSource,
}

impl SegmentationMask {
    pub fn from_bytes(width: u32, height: u32, labels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            source: MaskSource::Bytes(labels),
        }
    }

    pub fn from_handle(width: u32, height: u32, handle: Box<dyn MaskHandle>) -> Self {
        Self {
            width,
            height,
            source: MaskSource::Handle(handle),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Resolve the byte buffer and check it covers a `width`x`height` frame
    pub fn labels_for(&self, width: u32, height: u32) -> RecolorResult<&[u8]> {
        let bytes = match &self.source {
            MaskSource::Bytes(bytes) => bytes.as_slice(),
            MaskSource::Handle(handle) => handle.as_bytes().ok_or(RecolorError::InvalidMaskFormat)?,
        };

        let expected = (width * height) as usize;
        if (self.width, self.height) != (width, height) || bytes.len() != expected {
            return Err(RecolorError::InvalidMaskShape {
                expected,
                actual: bytes.len(),
            });
        }
        Ok(bytes)
    }
}

impl Drop for SegmentationMask {
    fn drop(&mut self) {
        if let MaskSource::Handle(handle) = &mut self.source {
            handle.close();
        }
    }
}

impl std::fmt::Debug for SegmentationMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.source {
            MaskSource::Bytes(_) => "bytes",
            MaskSource::Handle(_) => "handle",
        };
        f.debug_struct("SegmentationMask")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("source", &kind)
            .finish()
    }
}

/// Trait for hair segmentation models
/// Allows swapping backends (ONNX, remote, mocks in tests)
pub trait SegmentationModel: Send {
    /// Segment one frame
    ///
    /// # Arguments
    /// * `frame` - Input RGBA frame
    /// * `timestamp` - Capture time relative to session start
    ///
    /// # Returns
    /// * Category mask with the same dimensions as `frame`
    fn segment(&mut self, frame: &RgbaImage, timestamp: Duration) -> Result<SegmentationMask>;

    /// Reset internal state (for models that feed back the previous mask)
    ///
    /// Call this when:
    /// - Switching cameras
    /// - Frame dimensions change
    fn reset_state(&mut self) {
        // Default implementation: no-op for stateless models
    }

    /// Get the model's preferred input dimensions
    ///
    /// Returns (width, height)
    fn input_size(&self) -> (u32, u32);

    /// Release the model. Called once at teardown.
    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Native {
        labels: Option<Vec<u8>>,
        closed: Arc<AtomicUsize>,
    }

    impl MaskHandle for Native {
        fn as_bytes(&self) -> Option<&[u8]> {
            self.labels.as_deref()
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn byte_masks_resolve() {
        let mask = SegmentationMask::from_bytes(2, 2, vec![0, 1, 1, 0]);
        assert_eq!(mask.labels_for(2, 2).unwrap(), &[0, 1, 1, 0]);
    }

    #[test]
    fn wrong_dimensions_are_rejected() {
        let mask = SegmentationMask::from_bytes(2, 2, vec![0, 1, 1, 0]);
        assert!(matches!(
            mask.labels_for(4, 1),
            Err(RecolorError::InvalidMaskShape { .. })
        ));
        let short = SegmentationMask::from_bytes(2, 2, vec![0, 1, 1]);
        assert!(matches!(
            short.labels_for(2, 2),
            Err(RecolorError::InvalidMaskShape { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn handles_close_on_drop() {
        let closed = Arc::new(AtomicUsize::new(0));
        let mask = SegmentationMask::from_handle(
            1,
            2,
            Box::new(Native {
                labels: Some(vec![1, 1]),
                closed: closed.clone(),
            }),
        );
        assert_eq!(mask.labels_for(1, 2).unwrap(), &[1, 1]);
        drop(mask);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_handle_is_an_invalid_format() {
        let closed = Arc::new(AtomicUsize::new(0));
        let mask = SegmentationMask::from_handle(
            1,
            1,
            Box::new(Native {
                labels: None,
                closed: closed.clone(),
            }),
        );
        assert!(matches!(mask.labels_for(1, 1), Err(RecolorError::InvalidMaskFormat)));
        drop(mask);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
