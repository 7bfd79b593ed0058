use anyhow::{Context, Result};
use clap::Parser;
use hairtint::capture::{CaptureSource, StillImageSource, WebcamCapture};
use hairtint::color::{to_hex, Tone};
use hairtint::output::{ImageFileOutput, OutputSink, V4L2Output};
use hairtint::palette;
use hairtint::scheduler::{FrameScheduler, SchedulerConfig};
use hairtint::segmentation;
use hairtint::{DeviceClass, DisplayMode, RecolorError, RecolorSettings, Tuning};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Replay a still image instead of opening a camera
    #[arg(long)]
    input_image: Option<PathBuf>,

    /// Output v4l2loopback device path
    #[arg(short, long, default_value = "/dev/video10")]
    output_device: String,

    /// Write frames to an image file instead of a loopback device
    #[arg(long)]
    output_image: Option<PathBuf>,

    /// Capture width (defaults to the device class preference)
    #[arg(long)]
    capture_width: Option<u32>,

    /// Capture height (defaults to the device class preference)
    #[arg(long)]
    capture_height: Option<u32>,

    /// Path to the hair segmentation model (ONNX file)
    #[arg(long, default_value = "models/hair_segmentation.onnx")]
    model: String,

    /// Base hair color: palette name or hex
    #[arg(long, default_value = palette::DEFAULT_BASE)]
    color: String,

    /// Tonal variant of the base color
    #[arg(long, value_enum, default_value_t = Tone::Base)]
    tone: Tone,

    /// Highlight color: palette name or hex
    #[arg(long, default_value = palette::DEFAULT_HIGHLIGHT)]
    highlight_color: String,

    /// Paint highlight strands
    #[arg(long)]
    highlights: bool,

    /// Highlight strength, 0.2 to 0.8 recommended
    #[arg(long, default_value_t = 0.4)]
    highlight_intensity: f32,

    /// Color strength, 0.3 to 1.0 recommended
    #[arg(long, default_value_t = 0.7)]
    color_intensity: f32,

    /// Device class for pacing; guessed from --user-agent when omitted
    #[arg(long, value_enum)]
    device_class: Option<DeviceClass>,

    /// User-agent string used to guess the device class
    #[arg(long)]
    user_agent: Option<String>,

    /// Show the smoothed hair mask instead of the recolored video
    #[arg(long)]
    show_mask: bool,

    /// JSON file overriding recolor tuning constants
    #[arg(long)]
    tuning: Option<PathBuf>,

    /// Print the built-in palette and exit
    #[arg(long)]
    list_colors: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if args.list_colors {
        print_palette();
        return Ok(());
    }

    tracing::info!("hairtint starting");

    let tuning = match &args.tuning {
        Some(path) => Tuning::from_json_file(path)
            .with_context(|| format!("Invalid tuning file {}", path.display()))?,
        None => Tuning::default(),
    };
    let settings = build_settings(&args)?;
    tracing::info!(
        "Color: {} ({}), highlights: {}",
        settings.base.name,
        to_hex(settings.base.base),
        if settings.highlights_enabled {
            settings.highlight.name.as_str()
        } else {
            "off"
        }
    );

    let device = args.device_class.unwrap_or_else(|| {
        args.user_agent
            .as_deref()
            .map(DeviceClass::from_user_agent)
            .unwrap_or_default()
    });
    let constraints = device.capture_constraints();
    let width = args.capture_width.unwrap_or(constraints.width);
    let height = args.capture_height.unwrap_or(constraints.height);
    tracing::info!("Device class: {:?}", device);

    let capture: Box<dyn CaptureSource> = match &args.input_image {
        Some(path) => Box::new(StillImageSource::open(path)?),
        None => {
            tracing::info!("Capture: {}x{}@{}", width, height, constraints.fps);
            Box::new(
                WebcamCapture::new(args.input_device, width, height, constraints.fps)
                    .map_err(|e| RecolorError::ResourceAcquisition(format!("{e:#}")))
                    .context("Failed to initialize webcam capture")?,
            )
        }
    };
    let (out_width, out_height) = capture.resolution();

    let output: Box<dyn OutputSink> = match &args.output_image {
        Some(path) => Box::new(ImageFileOutput::new(path)),
        None => Box::new(
            V4L2Output::new(&args.output_device, out_width, out_height)
                .context("Failed to initialize v4l2loopback output")?,
        ),
    };

    let display_mode = if args.show_mask {
        DisplayMode::Mask
    } else {
        DisplayMode::Recolor
    };
    let config = SchedulerConfig::for_device(device).with_display_mode(display_mode);

    // The sender stays alive for the whole session; settings are fixed from the CLI
    let (_settings_tx, settings_rx) = watch::channel(settings);
    let mut scheduler = FrameScheduler::new(capture, output, settings_rx, &tuning, config);

    tracing::info!("Loading hair segmentation model from {}", args.model);
    let model = segmentation::create_default_model(&args.model)
        .map_err(|e| RecolorError::ResourceAcquisition(format!("{e:#}")))
        .context("Failed to load hair segmentation model")?;
    scheduler.attach_segmenter(model);
    tracing::info!("Segmentation model loaded");

    let control = scheduler.control();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupted, stopping");
                control.request_stop();
            }
            Err(e) => tracing::warn!("Cannot listen for Ctrl+C: {}", e),
        }
    });

    tracing::info!("Press Ctrl+C to stop");
    scheduler.run().await
}

fn build_settings(args: &Args) -> Result<RecolorSettings> {
    let base = palette::resolve_base(&args.color)?.toned(args.tone);
    let highlight = palette::resolve_highlight(&args.highlight_color)?;
    Ok(RecolorSettings::new(base, highlight)
        .with_highlights(args.highlights, args.highlight_intensity)
        .with_color_intensity(args.color_intensity))
}

fn print_palette() {
    for category in palette::CATEGORIES {
        println!("{} ({})", category.title, category.slug);
        for entry in palette::in_category(category.slug) {
            println!(
                "  {:<22} {}  light {}  dark {}",
                entry.title, entry.color, entry.light, entry.dark
            );
        }
    }
    println!("Highlights");
    for entry in palette::HIGHLIGHTS {
        println!("  {:<22} {}", entry.title, entry.color);
    }
}
