use std::path::PathBuf;
use std::process;

use clap::Parser;

use facetrack_core::detection::infrastructure::detector_factory::{
    create_face_detector, DetectorConfig,
};
use facetrack_core::fusion::fusion_config::FusionConfig;
use facetrack_core::fusion::fusion_controller::FusionController;
use facetrack_core::inference::domain::inference_backend::ExecutionMode;
use facetrack_core::inference::infrastructure::ort_backend::OrtBackend;
use facetrack_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facetrack_core::pipeline::track_faces_use_case::TrackFacesUseCase;
use facetrack_core::shared::constants::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_CORNER_QUALITY, DEFAULT_DETECTION_CADENCE,
    DEFAULT_ENLARGE_COEFFICIENT, DEFAULT_FB_TOLERANCE, DEFAULT_FLOW_EPSILON,
    DEFAULT_FLOW_ITERATIONS, DEFAULT_FLOW_WINDOW, DEFAULT_MAX_POINTS_PER_FACE,
    DEFAULT_MIN_CORNER_DISTANCE, DEFAULT_PYRAMID_LEVELS,
};
use facetrack_core::tracking::infrastructure::pyramidal_lucas_kanade::{
    FlowConfig, PyramidalLucasKanade,
};
use facetrack_core::tracking::infrastructure::shi_tomasi_selector::{
    CornerConfig, ShiTomasiSelector,
};
use facetrack_core::video::domain::overlay_sink::OverlaySink;
use facetrack_core::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use facetrack_core::video::infrastructure::json_lines_sink::JsonLinesSink;
use facetrack_core::video::infrastructure::png_sequence_sink::PngSequenceSink;

/// Real-time face detection with optical-flow tracking between detections.
#[derive(Parser)]
#[command(name = "facetrack")]
struct Cli {
    /// Input video file.
    input: PathBuf,

    /// SSD face detection model (.onnx). Labels are read from `<model>.labels`.
    #[arg(long, short = 'm')]
    model: PathBuf,

    /// Inference device: CPU, GPU or AUTO.
    #[arg(long, short = 'd', default_value = "CPU")]
    device: String,

    /// Run detection asynchronously while frames are decoded and tracked.
    #[arg(long = "async")]
    async_mode: bool,

    /// Detection confidence threshold (0.0-1.0).
    #[arg(long, short = 't', default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    threshold: f64,

    /// Log every accepted detection proposal.
    #[arg(long = "raw-output")]
    raw_output: bool,

    /// Frames between detector submissions.
    #[arg(long, default_value_t = DEFAULT_DETECTION_CADENCE)]
    cadence: usize,

    /// Scale applied to the squared detection boxes.
    #[arg(long, default_value_t = DEFAULT_ENLARGE_COEFFICIENT)]
    enlarge: f64,

    /// Feature points tracked per detected face.
    #[arg(long, default_value_t = DEFAULT_MAX_POINTS_PER_FACE)]
    max_points_per_face: usize,

    /// Forward-backward tracking tolerance in pixels.
    #[arg(long, default_value_t = DEFAULT_FB_TOLERANCE)]
    fb_tolerance: f32,

    /// Optical-flow window size in pixels.
    #[arg(long, default_value_t = DEFAULT_FLOW_WINDOW)]
    window_size: usize,

    /// Optical-flow iterations per pyramid level.
    #[arg(long, default_value_t = DEFAULT_FLOW_ITERATIONS)]
    flow_iterations: usize,

    /// Optical-flow convergence threshold in pixels.
    #[arg(long, default_value_t = DEFAULT_FLOW_EPSILON)]
    flow_epsilon: f32,

    /// Pyramid levels above full resolution.
    #[arg(long, default_value_t = DEFAULT_PYRAMID_LEVELS)]
    pyramid_levels: usize,

    /// Corner quality relative to the strongest corner (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CORNER_QUALITY)]
    corner_quality: f64,

    /// Minimum distance between feature points in pixels.
    #[arg(long, default_value_t = DEFAULT_MIN_CORNER_DISTANCE)]
    min_corner_distance: f64,

    /// Class count to use when the model does not declare one.
    #[arg(long)]
    num_classes: Option<usize>,

    /// Track every buffered frame for display while detection is running.
    #[arg(long)]
    live_tracking: bool,

    /// Write annotated frames as PNG files into this directory.
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,

    /// Write one JSON object per frame to this file (default: stdout).
    #[arg(long)]
    json: Option<PathBuf>,

    /// Report backend performance counters at the end.
    #[arg(long)]
    perf_counts: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let backend = OrtBackend::new(&cli.device).with_num_classes(cli.num_classes);
    let detector_config = DetectorConfig {
        model_path: Some(cli.model.clone()),
        mode: if cli.async_mode {
            ExecutionMode::Async
        } else {
            ExecutionMode::Sync
        },
        threshold: cli.threshold,
        enlarge_coefficient: cli.enlarge,
        raw_output_messages: cli.raw_output,
    };
    let detector = create_face_detector(&backend, &detector_config)?;

    let flow = PyramidalLucasKanade::new(FlowConfig {
        window_size: cli.window_size,
        max_iterations: cli.flow_iterations,
        epsilon: cli.flow_epsilon,
        pyramid_levels: cli.pyramid_levels,
    });
    let selector = ShiTomasiSelector::new(CornerConfig {
        quality_level: cli.corner_quality,
        min_distance: cli.min_corner_distance,
        ..CornerConfig::default()
    });
    let fusion_config = FusionConfig {
        max_points_per_face: cli.max_points_per_face,
        fb_tolerance: cli.fb_tolerance,
        live_tracking: cli.live_tracking,
        ..FusionConfig::with_cadence(cli.cadence)
    };
    let controller = FusionController::new(
        detector,
        Box::new(selector),
        Box::new(flow),
        fusion_config,
    );

    let sink: Box<dyn OverlaySink> = match (&cli.output_dir, &cli.json) {
        (Some(dir), _) => Box::new(PngSequenceSink::new(dir)?),
        (None, Some(path)) => Box::new(JsonLinesSink::create(path)?),
        (None, None) => Box::new(JsonLinesSink::from_writer(std::io::stdout())),
    };

    let mut use_case = TrackFacesUseCase::new(
        Box::new(FfmpegFrameSource::new()),
        controller,
        sink,
        Box::new(StdoutPipelineLogger::new(cli.cadence)),
    )
    .with_perf_counts(cli.perf_counts);
    let summary = use_case.execute(&cli.input)?;

    log::info!(
        "Processed {} frames with {} detection cycles",
        summary.frames,
        summary.detection_cycles
    );
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if !cli.model.exists() {
        return Err(format!("Model file not found: {}", cli.model.display()).into());
    }
    if cli.output_dir.is_some() && cli.json.is_some() {
        return Err("--output-dir and --json are mutually exclusive".into());
    }
    if !(0.0..=1.0).contains(&cli.threshold) {
        return Err(format!(
            "Threshold must be between 0.0 and 1.0, got {}",
            cli.threshold
        )
        .into());
    }
    if cli.cadence == 0 {
        return Err("Cadence must be at least 1 frame".into());
    }
    if cli.enlarge <= 0.0 {
        return Err(format!("Enlarge coefficient must be positive, got {}", cli.enlarge).into());
    }
    if cli.max_points_per_face == 0 {
        return Err("Max points per face must be at least 1".into());
    }
    if cli.fb_tolerance <= 0.0 {
        return Err(format!(
            "Forward-backward tolerance must be positive, got {}",
            cli.fb_tolerance
        )
        .into());
    }
    if cli.window_size < 3 {
        return Err(format!("Window size must be at least 3, got {}", cli.window_size).into());
    }
    if cli.flow_iterations == 0 {
        return Err("Flow iterations must be at least 1".into());
    }
    if cli.flow_epsilon <= 0.0 {
        return Err(format!("Flow epsilon must be positive, got {}", cli.flow_epsilon).into());
    }
    if !(0.0..=1.0).contains(&cli.corner_quality) || cli.corner_quality == 0.0 {
        return Err(format!(
            "Corner quality must be in (0.0, 1.0], got {}",
            cli.corner_quality
        )
        .into());
    }
    if cli.min_corner_distance < 0.0 {
        return Err(format!(
            "Minimum corner distance must not be negative, got {}",
            cli.min_corner_distance
        )
        .into());
    }
    if cli.num_classes == Some(0) {
        return Err("Number of classes must be at least 1".into());
    }
    Ok(())
}
