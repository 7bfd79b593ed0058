use anyhow::{bail, Result};
use hairtint::capture::CaptureSource;
use hairtint::output::OutputSink;
use hairtint::{
    ColorSpec, DeviceClass, FrameScheduler, RecolorError, RecolorOutcome, RecolorSettings,
    SchedulerConfig, SegmentationMask, SegmentationModel, SkipReason, TickOutcome, Tuning,
};
use image::{Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

const GRAY: Rgba<u8> = Rgba([128, 128, 128, 255]);

struct MockCapture {
    frame: RgbaImage,
    streaming: bool,
    stops: Arc<AtomicUsize>,
}

impl MockCapture {
    fn new(stops: Arc<AtomicUsize>) -> Self {
        Self {
            frame: RgbaImage::from_pixel(8, 8, GRAY),
            streaming: true,
            stops,
        }
    }
}

impl CaptureSource for MockCapture {
    fn capture_frame(&mut self) -> Result<RgbaImage> {
        Ok(self.frame.clone())
    }

    fn resolution(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn stop(&mut self) -> Result<()> {
        self.streaming = false;
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    frames: Arc<Mutex<Vec<RgbaImage>>>,
}

impl RecordingSink {
    fn frames(&self) -> Vec<RgbaImage> {
        self.frames.lock().unwrap().clone()
    }
}

impl OutputSink for RecordingSink {
    fn write_frame(&mut self, frame: &RgbaImage) -> Result<()> {
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (8, 8)
    }
}

enum Behavior {
    FullHair,
    WrongSize,
    Fail,
    /// Panic on the first call, then find hair
    PanicOnce,
    /// Block until the test releases the call
    Gated(mpsc::Receiver<()>),
}

struct MockSegmenter {
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl MockSegmenter {
    fn boxed(behavior: Behavior) -> (Box<dyn SegmentationModel>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let closes = Arc::new(AtomicUsize::new(0));
        let model = Box::new(Self {
            behavior,
            calls: calls.clone(),
            closes: closes.clone(),
        });
        (model, calls, closes)
    }
}

impl SegmentationModel for MockSegmenter {
    fn segment(&mut self, frame: &RgbaImage, _timestamp: Duration) -> Result<SegmentationMask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (w, h) = frame.dimensions();
        match &self.behavior {
            Behavior::FullHair => Ok(SegmentationMask::from_bytes(w, h, vec![1; (w * h) as usize])),
            Behavior::WrongSize => Ok(SegmentationMask::from_bytes(w + 1, h, vec![1; 3])),
            Behavior::Fail => bail!("model exploded"),
            Behavior::PanicOnce => {
                if self.calls.load(Ordering::SeqCst) == 1 {
                    panic!("backend crashed");
                }
                Ok(SegmentationMask::from_bytes(w, h, vec![1; (w * h) as usize]))
            }
            Behavior::Gated(release) => {
                release.recv().ok();
                Ok(SegmentationMask::from_bytes(w, h, vec![1; (w * h) as usize]))
            }
        }
    }

    fn input_size(&self) -> (u32, u32) {
        (8, 8)
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn black_hair() -> RecolorSettings {
    RecolorSettings::new(
        ColorSpec::parse("#000000").unwrap(),
        ColorSpec::parse("#f5f5dc").unwrap(),
    )
    .with_color_intensity(1.0)
}

struct Harness {
    scheduler: FrameScheduler<MockCapture, RecordingSink>,
    sink: RecordingSink,
    stops: Arc<AtomicUsize>,
    settings: watch::Sender<RecolorSettings>,
}

async fn wait_until_idle(scheduler: &FrameScheduler<MockCapture, RecordingSink>) {
    for _ in 0..200 {
        if !scheduler.is_busy() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("segmentation call never finished");
}

fn harness(config: SchedulerConfig) -> Harness {
    let stops = Arc::new(AtomicUsize::new(0));
    let sink = RecordingSink::default();
    let (settings, rx) = watch::channel(black_hair());
    let scheduler = FrameScheduler::new(
        MockCapture::new(stops.clone()),
        sink.clone(),
        rx,
        &Tuning::default(),
        config,
    );
    Harness {
        scheduler,
        sink,
        stops,
        settings,
    }
}

#[tokio::test]
async fn skips_until_segmenter_is_attached() {
    let mut h = harness(SchedulerConfig::default());
    let outcome = h.scheduler.tick(Instant::now()).await;
    assert_eq!(outcome, TickOutcome::Skipped(SkipReason::SegmenterNotReady));
    assert!(h.sink.frames().is_empty());
}

#[tokio::test]
async fn camera_off_skips() {
    let stops = Arc::new(AtomicUsize::new(0));
    let mut capture = MockCapture::new(stops);
    capture.streaming = false;
    let (_tx, rx) = watch::channel(black_hair());
    let mut scheduler = FrameScheduler::new(
        capture,
        RecordingSink::default(),
        rx,
        &Tuning::default(),
        SchedulerConfig::default(),
    );
    let (model, calls, _) = MockSegmenter::boxed(Behavior::FullHair);
    scheduler.attach_segmenter(model);

    let outcome = scheduler.tick(Instant::now()).await;
    assert_eq!(outcome, TickOutcome::Skipped(SkipReason::CameraOff));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn processed_frame_is_recolored_and_presented() {
    let mut h = harness(SchedulerConfig::default());
    let (model, calls, _) = MockSegmenter::boxed(Behavior::FullHair);
    h.scheduler.attach_segmenter(model);

    let outcome = h.scheduler.tick(Instant::now()).await;
    assert_eq!(outcome, TickOutcome::Processed(RecolorOutcome::Recolored));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!h.scheduler.is_busy());

    let frames = h.sink.frames();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].get_pixel(3, 3)[0] < 128);
}

#[tokio::test]
async fn desktop_pacing_drops_early_ticks() {
    let mut h = harness(SchedulerConfig::for_device(DeviceClass::Desktop));
    let (model, calls, _) = MockSegmenter::boxed(Behavior::FullHair);
    h.scheduler.attach_segmenter(model);

    let t0 = Instant::now();
    assert!(matches!(h.scheduler.tick(t0).await, TickOutcome::Processed(_)));
    assert_eq!(
        h.scheduler.tick(t0 + Duration::from_millis(40)).await,
        TickOutcome::Skipped(SkipReason::Paced)
    );
    assert!(matches!(
        h.scheduler.tick(t0 + Duration::from_millis(80)).await,
        TickOutcome::Processed(_)
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn mobile_pacing_is_slower() {
    let mut h = harness(SchedulerConfig::for_device(DeviceClass::Mobile));
    let (model, _, _) = MockSegmenter::boxed(Behavior::FullHair);
    h.scheduler.attach_segmenter(model);

    let t0 = Instant::now();
    h.scheduler.tick(t0).await;
    assert_eq!(
        h.scheduler.tick(t0 + Duration::from_millis(100)).await,
        TickOutcome::Skipped(SkipReason::Paced)
    );
    assert!(matches!(
        h.scheduler.tick(t0 + Duration::from_millis(150)).await,
        TickOutcome::Processed(_)
    ));
}

#[tokio::test]
async fn failures_count_up_and_frames_still_show() {
    let mut h = harness(SchedulerConfig::default().with_failure_notice_after(3));
    let (model, _, _) = MockSegmenter::boxed(Behavior::Fail);
    h.scheduler.attach_segmenter(model);

    let t0 = Instant::now();
    for (i, streak) in (1..=3).enumerate() {
        let now = t0 + Duration::from_millis(100 * i as u64);
        assert_eq!(
            h.scheduler.tick(now).await,
            TickOutcome::SegmentationFailed { streak }
        );
    }
    assert_eq!(h.scheduler.failure_streak(), 3);
    assert!(matches!(
        h.scheduler.last_failure(),
        Some(RecolorError::Segmentation(msg)) if msg.contains("model exploded")
    ));

    let frames = h.sink.frames();
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|f| f.pixels().all(|p| *p == GRAY)));
}

#[tokio::test]
async fn invalid_mask_skips_recolor_only() {
    let mut h = harness(SchedulerConfig::default());
    let (model, _, _) = MockSegmenter::boxed(Behavior::WrongSize);
    h.scheduler.attach_segmenter(model);

    assert_eq!(h.scheduler.tick(Instant::now()).await, TickOutcome::InvalidMask);
    let frames = h.sink.frames();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].pixels().all(|p| *p == GRAY));
    assert_eq!(h.scheduler.failure_streak(), 0);
}

#[tokio::test]
async fn settings_changes_apply_on_the_next_tick() {
    let mut h = harness(SchedulerConfig::default());
    let (model, _, _) = MockSegmenter::boxed(Behavior::FullHair);
    h.scheduler.attach_segmenter(model);

    let t0 = Instant::now();
    h.scheduler.tick(t0).await;
    h.settings
        .send(black_hair().with_color_intensity(0.0))
        .unwrap();
    h.scheduler.tick(t0 + Duration::from_millis(100)).await;

    let frames = h.sink.frames();
    assert!(frames[0].get_pixel(0, 0)[0] < 128);
    assert_eq!(*frames[1].get_pixel(0, 0), GRAY);
}

#[tokio::test]
async fn teardown_is_idempotent() {
    let mut h = harness(SchedulerConfig::default());
    let (model, _, closes) = MockSegmenter::boxed(Behavior::FullHair);
    h.scheduler.attach_segmenter(model);
    h.scheduler.tick(Instant::now()).await;

    h.scheduler.teardown();
    h.scheduler.teardown();

    assert_eq!(h.stops.load(Ordering::SeqCst), 1);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(h.scheduler.control().is_stopped());
    assert_eq!(
        h.scheduler.tick(Instant::now() + Duration::from_secs(1)).await,
        TickOutcome::Cancelled
    );
    assert_eq!(h.sink.frames().len(), 1);
}

#[tokio::test]
async fn in_flight_result_is_dropped_after_stop() {
    let mut h = harness(SchedulerConfig::default());
    let (release_tx, release_rx) = mpsc::channel();
    let (model, _, _) = MockSegmenter::boxed(Behavior::Gated(release_rx));
    h.scheduler.attach_segmenter(model);
    let control = h.scheduler.control();

    let stopper = async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        control.request_stop();
        release_tx.send(()).ok();
    };
    let (outcome, ()) = tokio::join!(h.scheduler.tick(Instant::now()), stopper);

    assert_eq!(outcome, TickOutcome::Cancelled);
    assert!(h.sink.frames().is_empty());
    wait_until_idle(&h.scheduler).await;
}

#[tokio::test]
async fn abandoned_tick_keeps_the_loop_busy() {
    let mut h = harness(SchedulerConfig::default());
    let (release_tx, release_rx) = mpsc::channel();
    let (model, calls, _) = MockSegmenter::boxed(Behavior::Gated(release_rx));
    h.scheduler.attach_segmenter(model);

    let t0 = Instant::now();
    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), h.scheduler.tick(t0)).await;
    assert!(abandoned.is_err());
    assert!(h.scheduler.is_busy());

    assert_eq!(
        h.scheduler.tick(t0 + Duration::from_millis(200)).await,
        TickOutcome::Skipped(SkipReason::Busy)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // one release for the stuck call, one for the next frame
    release_tx.send(()).unwrap();
    release_tx.send(()).unwrap();
    wait_until_idle(&h.scheduler).await;

    assert!(matches!(
        h.scheduler.tick(t0 + Duration::from_millis(400)).await,
        TickOutcome::Processed(_)
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn segmenter_recovers_after_a_panic() {
    let mut h = harness(SchedulerConfig::default());
    let (model, calls, closes) = MockSegmenter::boxed(Behavior::PanicOnce);
    h.scheduler.attach_segmenter(model);

    let t0 = Instant::now();
    assert_eq!(
        h.scheduler.tick(t0).await,
        TickOutcome::SegmentationFailed { streak: 1 }
    );
    let failure = h.scheduler.last_failure().expect("failure is reported");
    assert!(matches!(failure, RecolorError::Segmentation(_)));
    assert!(failure.is_recoverable());

    for i in 1..5u64 {
        assert_eq!(
            h.scheduler.tick(t0 + Duration::from_millis(100 * i)).await,
            TickOutcome::Processed(RecolorOutcome::Recolored)
        );
    }
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(h.scheduler.failure_streak(), 0);
    assert!(h.scheduler.last_failure().is_none());

    h.scheduler.teardown();
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn run_loop_stops_on_request() {
    let config = SchedulerConfig::default()
        .with_tick_period(Duration::from_millis(5))
        .with_min_frame_interval(Duration::from_millis(10));
    let mut h = harness(config);
    let (model, _, _) = MockSegmenter::boxed(Behavior::FullHair);
    h.scheduler.attach_segmenter(model);
    let control = h.scheduler.control();

    let stopper = async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        control.request_stop();
    };
    let (result, ()) = tokio::join!(h.scheduler.run(), stopper);

    result.unwrap();
    assert!(!h.sink.frames().is_empty());
    assert_eq!(h.stops.load(Ordering::SeqCst), 1);
    assert!(h.scheduler.pipeline().highlights().bounds().is_none());
}
