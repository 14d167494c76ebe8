//! Neglect Lens - headless runner
//!
//! Pulls frames from a synthetic pattern (or a camera with the `camera`
//! feature), runs them through the neglect engine at a fixed tick rate and
//! writes periodic PNG snapshots of the output.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;

use neglect_lens::camera::{FrameSource, SyntheticSource};
use neglect_lens::detection::{Detector, MotionDetector};
use neglect_lens::spatial::{SpatialRegionMode, SpatialStyle};
use neglect_lens::telemetry::{init_logging, FrameProfiler, LogConfig};
use neglect_lens::{EngineSettings, NeglectEngine};

#[derive(Parser, Debug)]
#[command(name = "neglect-lens", version, about = "Detection-driven neglect effects")]
struct Args {
    /// Settings file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective settings to this file and exit
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Number of ticks to render (0 runs until the source runs dry)
    #[arg(long, default_value_t = 300)]
    frames: u64,

    /// Target tick rate
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Synthetic source width
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Synthetic source height
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// RNG seed (overrides the settings file)
    #[arg(long)]
    seed: Option<u64>,

    /// Use the compound hemifield style
    #[arg(long)]
    compound: bool,

    /// Use the breathing hemifield band
    #[arg(long)]
    breathing: bool,

    /// Draw the midline and detection boxes
    #[arg(long)]
    debug_overlays: bool,

    /// Directory for PNG snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Write a snapshot every N ticks
    #[arg(long, default_value_t = 30)]
    snapshot_every: u64,

    /// Seconds between timing reports
    #[arg(long, default_value_t = 5)]
    stats_every: u64,

    /// Default log filter
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Capture from this camera instead of the synthetic pattern
    #[cfg(feature = "camera")]
    #[arg(long)]
    camera: Option<u32>,

    /// YOLOv8 ONNX model; falls back to motion detection when absent
    #[cfg(feature = "onnx")]
    #[arg(long)]
    model: Option<PathBuf>,
}

impl Args {
    fn settings(&self) -> Result<EngineSettings, Box<dyn std::error::Error>> {
        let mut settings = match &self.config {
            Some(path) => {
                log::info!("Loading settings from {:?}", path);
                EngineSettings::load_from_file(path)?
            }
            None => EngineSettings::default(),
        };
        if self.seed.is_some() {
            settings.seed = self.seed;
        }
        if self.compound {
            settings.spatial_style = SpatialStyle::Compound;
        }
        if self.breathing {
            settings.spatial_region = SpatialRegionMode::Breathing;
        }
        if self.debug_overlays {
            settings.show_midline = true;
            settings.show_boxes = true;
        }
        Ok(settings.clamped())
    }

    fn detector(&self) -> Result<Box<dyn Detector>, Box<dyn std::error::Error>> {
        #[cfg(feature = "onnx")]
        if let Some(model) = &self.model {
            return Ok(Box::new(neglect_lens::detection::YoloDetector::new(model)?));
        }
        Ok(Box::new(MotionDetector::default()))
    }

    fn source(&self) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
        #[cfg(feature = "camera")]
        if let Some(index) = self.camera {
            for info in neglect_lens::camera::CameraCapture::list_cameras() {
                log::info!("Camera {}: {}", info.index, info.name);
            }
            return Ok(Box::new(neglect_lens::camera::CameraCapture::open(index)?));
        }
        Ok(Box::new(SyntheticSource::new(self.width, self.height)))
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let settings = args.settings()?;

    if let Some(path) = &args.save_config {
        settings.save_to_file(path)?;
        log::info!("Settings written to {:?}", path);
        return Ok(());
    }

    if let Some(dir) = &args.snapshot_dir {
        std::fs::create_dir_all(dir)?;
    }

    let source = args.source()?;
    let mut engine = NeglectEngine::new(settings);
    engine.start(source.as_ref(), args.detector()?)?;
    log::info!(
        "Running {} ticks at {} fps with {} detector",
        args.frames,
        args.fps,
        engine.detector_name().unwrap_or("no")
    );

    let frame_duration = Duration::from_nanos(1_000_000_000u64 / args.fps.max(1) as u64);
    let stats_every = Duration::from_secs(args.stats_every.max(1));
    let mut profiler = FrameProfiler::new();
    let mut next_tick_at = Instant::now();
    let mut last_report = Instant::now();
    let mut rendered = 0u64;

    while args.frames == 0 || rendered < args.frames {
        let now = Instant::now();
        if now < next_tick_at {
            std::thread::sleep(next_tick_at - now);
        }
        next_tick_at += frame_duration;

        // Reset if too far behind
        let now = Instant::now();
        if now > next_tick_at + frame_duration * 2 {
            next_tick_at = now + frame_duration;
        }

        let Some(frame) = source.latest_frame() else {
            if !source.is_ready() {
                log::warn!("Frame source stopped");
                break;
            }
            continue;
        };

        profiler.begin_frame_at(now);
        let Some(output) = engine.tick(&frame, now) else { break };
        profiler.end_frame();

        if let Some(dir) = &args.snapshot_dir {
            if args.snapshot_every > 0 && rendered % args.snapshot_every == 0 {
                let path = dir.join(format!("frame_{:06}.png", rendered));
                if let Err(e) = output.save(&path) {
                    log::warn!("Failed to write snapshot {:?}: {}", path, e);
                }
            }
        }
        rendered += 1;

        if now.duration_since(last_report) >= stats_every {
            last_report = now;
            log::info!(
                "{:.1} fps, tick {}, {} detections, {} active",
                profiler.fps(),
                profiler.stats(),
                engine.detections().len(),
                engine.registry().len()
            );
            if let Some(status) = engine.detection_status() {
                if let Some(error) = &status.last_error {
                    log::warn!("{} detection failures, last: {}", status.failed, error);
                }
            }
        }
    }

    log::info!("Rendered {} ticks; {}", rendered, profiler.stats());
    engine.stop();
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_config = LogConfig {
        default_level: args.log_level.clone(),
        ..Default::default()
    };
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    log::info!("Neglect Lens v{}", env!("CARGO_PKG_VERSION"));

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
