//! Real-time hair recoloring for camera frames
//!
//! A segmentation model labels hair pixels; the mask is feathered, optional
//! highlight strands are synthesized inside the hair area and the selected
//! colors are blended in HSV space. [`scheduler::FrameScheduler`] drives the
//! whole loop at a device-dependent pace.

pub mod capture;
pub mod color;
pub mod compositor;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod highlight;
pub mod output;
pub mod palette;
pub mod pipeline;
pub mod scheduler;
pub mod segmentation;
pub mod settings;
pub mod smoother;

pub use color::{ColorSpec, Hsv, Tone};
pub use config::Tuning;
pub use error::{RecolorError, RecolorResult};
pub use pipeline::{DisplayMode, RecolorOutcome, RecolorPipeline};
pub use scheduler::{FrameScheduler, SchedulerConfig, SessionControl, SkipReason, TickOutcome};
pub use segmentation::{SegmentationMask, SegmentationModel};
pub use settings::{DeviceClass, RecolorSettings};
