use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use clap::{Parser, Subcommand};

use facestream_core::capture::frame_source::FrameSource;
use facestream_core::capture::infrastructure::ffmpeg_capture::FfmpegCapture;
use facestream_core::config::config_store::{ConfigSource, FileConfigStore};
use facestream_core::config::settings::Settings;
use facestream_core::detection::domain::face_detector::FaceDetector;
use facestream_core::detection::domain::face_encoder::FaceEncoder;
use facestream_core::detection::infrastructure::known_faces::load_gallery;
use facestream_core::detection::infrastructure::model_resolver;
use facestream_core::detection::infrastructure::onnx_face_encoder::OnnxFaceEncoder;
use facestream_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use facestream_core::detection::infrastructure::tracker_factory::create_tracker_factory;
use facestream_core::notification::domain::event_log::EventLog;
use facestream_core::notification::infrastructure::event_image_store::EventImageStore;
use facestream_core::notification::infrastructure::settings_channel_provider::SettingsChannelProvider;
use facestream_core::notification::notification_throttle::NotificationThrottle;
use facestream_core::notification::retention_sweeper::RetentionSweeper;
use facestream_core::pipeline::live_pipeline::{LivePipeline, DEFAULT_QUEUE_CAPACITY};
use facestream_core::pipeline::processor::{Processor, ProcessorParts};
use facestream_core::shared::clock::{Clock, SystemClock};
use facestream_core::shared::constants::{
    DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL, ENCODER_MODEL_NAME, ENCODER_MODEL_URL,
};
use facestream_core::shared::frame::Frame;
use facestream_core::trigger::domain::trigger_descriptor::TriggerDescriptor;
use facestream_core::trigger::infrastructure::file_trigger_channel::{
    write_descriptor, FileTriggerChannel,
};
use facestream_core::trigger::trigger_watch::TriggerWatch;

const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);

/// Live face recognition on a camera stream with throttled notifications.
#[derive(Parser)]
#[command(name = "facestream")]
struct Cli {
    /// Directory holding config.json, event images and the event log.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the capture and recognition pipeline until interrupted.
    Run {
        /// Directory searched for ONNX models before the download cache.
        #[arg(long)]
        models_dir: Option<PathBuf>,

        /// Keep the latest annotated frame at this path (JPEG).
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Frames buffered between stages.
        #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
        queue_capacity: usize,
    },
    /// Start a recognition window for a running pipeline.
    Trigger {
        /// Window length in seconds.
        #[arg(long, default_value = "5")]
        duration: f64,

        /// Detection passes per second inside the window.
        #[arg(long, default_value = "3")]
        fps: f64,

        /// End the window at the first known face.
        #[arg(long)]
        stop_on_match: bool,
    },
    /// Delete old event images and prune the event log.
    Sweep {
        /// Maximum image age in days (defaults to the configured value).
        #[arg(long)]
        days: Option<i64>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    let store = FileConfigStore::open(&data_dir.join("config.json"), &data_dir)?;
    log::info!("Using config {}", store.path().display());

    match cli.command {
        Command::Run {
            models_dir,
            snapshot,
            queue_capacity,
        } => run_pipeline(
            Arc::new(store),
            models_dir.as_deref(),
            snapshot.as_deref(),
            queue_capacity,
        ),
        Command::Trigger {
            duration,
            fps,
            stop_on_match,
        } => run_trigger(&store.snapshot(), duration, fps, stop_on_match),
        Command::Sweep { days } => run_sweep(&store.snapshot(), days),
    }
}

fn run_pipeline(
    config: Arc<dyn ConfigSource>,
    models_dir: Option<&Path>,
    snapshot: Option<&Path>,
    queue_capacity: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = config.snapshot();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (mut detector, mut encoder) = build_models(&settings, models_dir)?;
    let gallery = load_gallery(&settings.known_faces_dir, detector.as_mut(), encoder.as_mut());
    let trackers = create_tracker_factory(&settings.tracker)?;
    let notifier = NotificationThrottle::new(
        Arc::clone(&config),
        Arc::clone(&clock),
        Box::new(SettingsChannelProvider),
    )?;

    let processor = Processor::new(ProcessorParts {
        detector,
        encoder,
        gallery,
        trackers,
        notifier: Box::new(notifier),
        trigger: TriggerWatch::new(Box::new(FileTriggerChannel::new(&settings.trigger_file))),
        config: Arc::clone(&config),
        clock: Arc::clone(&clock),
    });
    let source = FrameSource::new(
        Box::new(FfmpegCapture::new()),
        TriggerWatch::new(Box::new(FileTriggerChannel::new(&settings.trigger_file))),
        Arc::clone(&config),
        clock,
    );

    let pipeline = LivePipeline::start(source, processor, queue_capacity)?;
    let stop = pipeline.stop_flag();
    ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))?;

    let mut last_snapshot: Option<Instant> = None;
    let mut consumed: u64 = 0;
    while pipeline.is_running() && !pipeline.stop_flag().load(Ordering::Relaxed) {
        let Some(frame) = pipeline.processed().pop_timeout(Duration::from_millis(500)) else {
            continue;
        };
        consumed += 1;
        if let Some(path) = snapshot {
            if last_snapshot.map_or(true, |t| t.elapsed() >= SNAPSHOT_INTERVAL) {
                if let Err(e) = write_snapshot(path, &frame) {
                    log::warn!("Failed to write snapshot {}: {e}", path.display());
                }
                last_snapshot = Some(Instant::now());
            }
        }
    }

    pipeline.join()?;
    log::info!("Pipeline stopped after {consumed} frames");
    Ok(())
}

fn build_models(
    settings: &Settings,
    models_dir: Option<&Path>,
) -> Result<(Box<dyn FaceDetector>, Box<dyn FaceEncoder>), Box<dyn std::error::Error>> {
    log::info!("Resolving model: {DETECTOR_MODEL_NAME}");
    let detector_path = model_resolver::resolve(DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL, models_dir)?;
    log::info!("Resolving model: {ENCODER_MODEL_NAME}");
    let encoder_path = model_resolver::resolve(ENCODER_MODEL_NAME, ENCODER_MODEL_URL, models_dir)?;

    let detector = OnnxYoloDetector::new(&detector_path, settings.detection_confidence)?;
    let encoder = OnnxFaceEncoder::new(&encoder_path)?;
    Ok((Box::new(detector), Box::new(encoder)))
}

fn run_trigger(
    settings: &Settings,
    duration: f64,
    fps: f64,
    stop_on_match: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let descriptor = TriggerDescriptor::new(SystemClock.now(), duration, fps, stop_on_match);
    write_descriptor(&settings.trigger_file, &descriptor)?;
    log::info!(
        "Trigger written to {} ({}s at {}Hz)",
        settings.trigger_file.display(),
        descriptor.duration,
        descriptor.cadence_hz
    );
    Ok(())
}

fn run_sweep(settings: &Settings, days: Option<i64>) -> Result<(), Box<dyn std::error::Error>> {
    let days = days.unwrap_or(settings.eventimage_cleanup_days);
    if days <= 0 {
        log::info!("Retention disabled (days = {days}), nothing to do");
        return Ok(());
    }
    let sweeper = RetentionSweeper::new(
        EventImageStore::new(&settings.image_path),
        EventLog::new(&settings.log_file),
    );
    let report = sweeper.sweep_and_prune(days, SystemTime::now())?;
    log::info!("Deleted {} event images older than {days} days", report.deleted.len());
    if let Some(pruned) = report.pruned {
        log::info!(
            "Event log: kept {} entries, removed {}",
            pruned.kept,
            pruned.removed
        );
    }
    Ok(())
}

/// Save `frame` as JPEG, replacing the previous snapshot atomically.
fn write_snapshot(path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
    let img = frame.to_rgb_image().ok_or("frame is not RGB")?;
    let temp_path = path.with_extension("part");
    img.save_with_format(&temp_path, image::ImageFormat::Jpeg)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

fn default_data_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    dirs::data_dir()
        .map(|d| d.join("facestream"))
        .ok_or_else(|| "could not determine data directory, pass --data-dir".into())
}
