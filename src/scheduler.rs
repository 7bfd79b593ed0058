use crate::capture::CaptureSource;
use crate::config::Tuning;
use crate::error::RecolorError;
use crate::output::OutputSink;
use crate::pipeline::{DisplayMode, RecolorOutcome, RecolorPipeline};
use crate::segmentation::{SegmentationMask, SegmentationModel};
use crate::settings::{DeviceClass, RecolorSettings};
use anyhow::anyhow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;

type SharedModel = Arc<Mutex<Box<dyn SegmentationModel>>>;

/// Lock the model even if an earlier call panicked while holding it
fn lock_model(model: &SharedModel) -> MutexGuard<'_, Box<dyn SegmentationModel>> {
    model.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pacing and reporting knobs for the frame loop
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    min_frame_interval: Duration,
    tick_period: Duration,
    display_mode: DisplayMode,
    failure_notice_after: u32,
    stats_every: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::for_device(DeviceClass::Desktop)
    }
}

impl SchedulerConfig {
    pub fn for_device(device: DeviceClass) -> Self {
        Self {
            min_frame_interval: device.min_frame_interval(),
            tick_period: Duration::from_millis(16),
            display_mode: DisplayMode::Recolor,
            failure_notice_after: 3,
            stats_every: 30,
        }
    }

    /// Minimum time between two processed frames
    pub fn with_min_frame_interval(mut self, interval: Duration) -> Self {
        self.min_frame_interval = interval;
        self
    }

    /// How often the loop wakes up to consider a frame
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period.max(Duration::from_millis(1));
        self
    }

    pub fn with_display_mode(mut self, mode: DisplayMode) -> Self {
        self.display_mode = mode;
        self
    }

    /// Consecutive segmentation failures before a user-facing notice
    pub fn with_failure_notice_after(mut self, failures: u32) -> Self {
        self.failure_notice_after = failures.max(1);
        self
    }

    pub fn min_frame_interval(&self) -> Duration {
        self.min_frame_interval
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }
}

/// Why a tick did no work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    CameraOff,
    SegmenterNotReady,
    Busy,
    /// Less than the minimum frame interval since the last processed frame
    Paced,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    /// A frame went through the pipeline and was presented
    Processed(RecolorOutcome),
    /// The mask was unusable; the frame was presented without recolor
    InvalidMask,
    /// The segmenter failed; `streak` counts consecutive failures
    SegmentationFailed { streak: u32 },
    CaptureFailed,
    OutputFailed,
    /// The session ended while this tick was running; its work was dropped
    Cancelled,
}

struct ControlInner {
    stopped: AtomicBool,
    notify: Notify,
}

/// Cloneable stop signal shared by the frame loop and whoever ends it
#[derive(Clone)]
pub struct SessionControl {
    inner: Arc<ControlInner>,
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionControl {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ControlInner {
                stopped: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Ask the session to end. Safe to call more than once.
    pub fn request_stop(&self) {
        if !self.inner.stopped.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Resolves once a stop has been requested
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }
}

/// Set while a frame is in flight
///
/// The guard travels with the segmentation call, so a tick that is dropped
/// mid-call keeps the loop busy until the model returns.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(flag.clone()))
        }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct StageTimings {
    frames: u64,
    capture: Duration,
    segment: Duration,
    recolor: Duration,
    output: Duration,
}

impl StageTimings {
    fn log(&self) {
        let avg = |total: Duration| total.as_secs_f64() * 1000.0 / self.frames as f64;
        let (capture, segment, recolor, output) = (
            avg(self.capture),
            avg(self.segment),
            avg(self.recolor),
            avg(self.output),
        );
        let total = capture + segment + recolor + output;
        tracing::info!(
            "Frame {}: capture={:.1}ms, segment={:.1}ms, recolor={:.1}ms, output={:.1}ms, total={:.1}ms",
            self.frames,
            capture,
            segment,
            recolor,
            output,
            total
        );
    }
}

/// Drives capture, segmentation, recolor and presentation once per tick
///
/// At most one frame is in flight. Frames are handled in capture order and
/// dropped rather than queued when the pipeline falls behind.
pub struct FrameScheduler<C: CaptureSource, O: OutputSink> {
    capture: C,
    output: O,
    segmenter: Option<SharedModel>,
    pipeline: RecolorPipeline,
    settings: watch::Receiver<RecolorSettings>,
    config: SchedulerConfig,
    control: SessionControl,
    busy: Arc<AtomicBool>,
    started: Instant,
    last_processed: Option<Instant>,
    frame_size: Option<(u32, u32)>,
    failure_streak: u32,
    last_failure: Option<RecolorError>,
    timings: StageTimings,
    torn_down: bool,
}

impl<C: CaptureSource, O: OutputSink> FrameScheduler<C, O> {
    pub fn new(
        capture: C,
        output: O,
        settings: watch::Receiver<RecolorSettings>,
        tuning: &Tuning,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            capture,
            output,
            segmenter: None,
            pipeline: RecolorPipeline::new(tuning),
            settings,
            config,
            control: SessionControl::new(),
            busy: Arc::new(AtomicBool::new(false)),
            started: Instant::now(),
            last_processed: None,
            frame_size: None,
            failure_streak: 0,
            last_failure: None,
            timings: StageTimings::default(),
            torn_down: false,
        }
    }

    /// Hand over a loaded segmenter. Ticks skip until this is called.
    pub fn attach_segmenter(&mut self, model: Box<dyn SegmentationModel>) {
        self.segmenter = Some(Arc::new(Mutex::new(model)));
    }

    /// Handle for ending the session from elsewhere
    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Consecutive segmentation failures so far
    pub fn failure_streak(&self) -> u32 {
        self.failure_streak
    }

    /// The most recent segmentation failure, cleared by the next success
    pub fn last_failure(&self) -> Option<&RecolorError> {
        self.last_failure.as_ref()
    }

    pub fn pipeline(&self) -> &RecolorPipeline {
        &self.pipeline
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    /// Run ticks until the session is stopped, then tear down
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut interval = tokio::time::interval(self.config.tick_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let control = self.control.clone();

        tracing::info!(
            "Starting frame loop (min interval {}ms, mode {:?})",
            self.config.min_frame_interval.as_millis(),
            self.config.display_mode
        );

        loop {
            tokio::select! {
                _ = control.cancelled() => break,
                _ = interval.tick() => {
                    let outcome = self.tick(Instant::now()).await;
                    tracing::trace!(?outcome, "tick");
                }
            }
        }

        self.teardown();
        Ok(())
    }

    /// One pass of the loop at time `now`
    pub async fn tick(&mut self, now: Instant) -> TickOutcome {
        if self.control.is_stopped() {
            return TickOutcome::Cancelled;
        }
        if !self.capture.is_streaming() {
            return TickOutcome::Skipped(SkipReason::CameraOff);
        }
        let Some(model) = self.segmenter.clone() else {
            return TickOutcome::Skipped(SkipReason::SegmenterNotReady);
        };
        let Some(busy) = BusyGuard::acquire(&self.busy) else {
            return TickOutcome::Skipped(SkipReason::Busy);
        };
        if let Some(last) = self.last_processed {
            if now.saturating_duration_since(last) < self.config.min_frame_interval {
                return TickOutcome::Skipped(SkipReason::Paced);
            }
        }

        self.last_processed = Some(now);
        self.process_frame(model, now, busy).await
    }

    async fn process_frame(
        &mut self,
        model: SharedModel,
        now: Instant,
        busy: BusyGuard,
    ) -> TickOutcome {
        let capture_start = Instant::now();
        let frame = match self.capture.capture_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Failed to capture frame: {:#}", e);
                return TickOutcome::CaptureFailed;
            }
        };
        let capture_time = capture_start.elapsed();

        let dimensions = frame.dimensions();
        if self.frame_size.replace(dimensions) != Some(dimensions) && self.timings.frames > 0 {
            tracing::info!("Frame size changed to {}x{}", dimensions.0, dimensions.1);
            lock_model(&model).reset_state();
        }

        let settings = self.settings.borrow().clone();
        let timestamp = now.saturating_duration_since(self.started);

        let segment_start = Instant::now();
        let task_model = model.clone();
        let task = tokio::task::spawn_blocking(move || {
            let mask = lock_model(&task_model).segment(&frame, timestamp);
            (frame, mask, busy)
        });

        let control = self.control.clone();
        let joined = tokio::select! {
            joined = task => joined,
            _ = control.cancelled() => {
                tracing::debug!("Session ended during segmentation, dropping frame");
                return TickOutcome::Cancelled;
            }
        };
        if control.is_stopped() {
            return TickOutcome::Cancelled;
        }
        let segment_time = segment_start.elapsed();

        let (mut frame, mask, _busy) = match joined {
            Ok(result) => result,
            Err(e) => {
                // A panicking model may have left its temporal state half-updated
                lock_model(&model).reset_state();
                return self.segmentation_failed(anyhow!("segmenter task failed: {e}"));
            }
        };

        let recolor_start = Instant::now();
        let outcome = match mask {
            Ok(mask) => {
                self.failure_streak = 0;
                self.last_failure = None;
                self.recolor(&mut frame, mask, &settings)
            }
            Err(e) => self.segmentation_failed(e),
        };
        let recolor_time = recolor_start.elapsed();

        // Unrecolored frames are still shown so the preview never freezes
        let output_start = Instant::now();
        if let Err(e) = self.output.write_frame(&frame) {
            tracing::warn!("Failed to present frame: {:#}", e);
            return TickOutcome::OutputFailed;
        }
        let output_time = output_start.elapsed();

        self.timings.frames += 1;
        self.timings.capture += capture_time;
        self.timings.segment += segment_time;
        self.timings.recolor += recolor_time;
        self.timings.output += output_time;
        if self.timings.frames % self.config.stats_every == 0 {
            self.timings.log();
        }

        outcome
    }

    fn recolor(
        &mut self,
        frame: &mut image::RgbaImage,
        mask: SegmentationMask,
        settings: &RecolorSettings,
    ) -> TickOutcome {
        match self
            .pipeline
            .process(frame, mask, settings, self.config.display_mode)
        {
            Ok(outcome) => TickOutcome::Processed(outcome),
            Err(e) => {
                tracing::warn!("Skipping recolor for this frame: {}", e);
                TickOutcome::InvalidMask
            }
        }
    }

    fn segmentation_failed(&mut self, error: anyhow::Error) -> TickOutcome {
        let error = RecolorError::Segmentation(format!("{error:#}"));
        self.failure_streak += 1;
        if self.failure_streak == self.config.failure_notice_after {
            tracing::warn!(
                "Hair detection has failed {} frames in a row: {}",
                self.failure_streak,
                error
            );
        } else {
            tracing::debug!("{}", error);
        }
        self.last_failure = Some(error);
        TickOutcome::SegmentationFailed {
            streak: self.failure_streak,
        }
    }

    /// Stop capture, release the segmenter and drop cached buffers
    ///
    /// Idempotent. A segmentation call still running is left to finish on
    /// its own thread and its result is discarded.
    pub fn teardown(&mut self) {
        self.control.request_stop();
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Err(e) = self.capture.stop() {
            tracing::warn!("Failed to stop capture: {:#}", e);
        }

        if let Some(model) = self.segmenter.take() {
            match model.try_lock() {
                Ok(mut model) => model.close(),
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().close(),
                Err(TryLockError::WouldBlock) => {
                    tracing::debug!("Segmenter still busy, it is dropped when the call returns")
                }
            }
        }

        self.pipeline.release();
        tracing::info!("Session ended after {} frames", self.timings.frames);
    }
}

impl<C: CaptureSource, O: OutputSink> Drop for FrameScheduler<C, O> {
    fn drop(&mut self) {
        self.teardown();
    }
}
