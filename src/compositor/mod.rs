//! Neglect engine
//!
//! Owns every piece of per-session state and runs one render tick at a time:
//! mirror the frame into the working raster, exchange frames and results
//! with the detection worker, apply object effects to the left half of each
//! active detection, then the hemifield effect, then the debug overlays.
//!
//! Effects sample the pristine working raster of the current tick, never
//! the partially composited output, so object effects are not re-sampled
//! by the hemifield pass.

pub mod overlay;

use std::time::{Duration, Instant};

use image::{imageops, RgbaImage};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::camera::{Frame, FrameSource};
use crate::detection::{Detection, DetectionError, DetectionStatus, DetectionWorker, Detector};
use crate::effects::Region;
use crate::identity::resolve;
use crate::registry::ObjectEffectRegistry;
use crate::settings::EngineSettings;
use crate::spatial::{SpatialDecision, SpatialNeglectController};

/// Engine errors surfaced to the caller
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Frame source unavailable: {0}")]
    FrameSourceUnavailable(String),
    #[error(transparent)]
    Detection(#[from] DetectionError),
}

/// Rasters reused across ticks
struct Canvas {
    /// Mirrored copy of the incoming frame; read-only after step 1
    working: RgbaImage,
    /// Composited result
    output: RgbaImage,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        Self {
            working: RgbaImage::new(width, height),
            output: RgbaImage::new(width, height),
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        self.working.dimensions()
    }
}

/// Detection-driven neglect effect engine
pub struct NeglectEngine {
    settings: EngineSettings,
    rng: StdRng,
    canvas: Canvas,
    worker: Option<DetectionWorker>,
    /// Generation of the last installed worker snapshot
    seen_generation: u64,
    /// Current detection list, already filtered and capped
    detections: Vec<Detection>,
    registry: ObjectEffectRegistry,
    /// Time of the last accepted detection submission
    last_detect_at: Option<Instant>,
    /// Time of the first tick after `start`
    started_at: Option<Instant>,
    running: bool,
    /// Ticks rendered since `start`
    tick_count: u64,
}

impl NeglectEngine {
    /// Create a stopped engine; seeds from `settings.seed` or the OS
    pub fn new(settings: EngineSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(settings, rng)
    }

    /// Create a stopped engine with a fixed seed
    pub fn with_seed(settings: EngineSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: EngineSettings, rng: StdRng) -> Self {
        Self {
            settings: settings.clamped(),
            rng,
            canvas: Canvas::new(0, 0),
            worker: None,
            seen_generation: 0,
            detections: Vec::new(),
            registry: ObjectEffectRegistry::new(),
            last_detect_at: None,
            started_at: None,
            running: false,
            tick_count: 0,
        }
    }

    /// Start a session on `source` with `detector` running in the background
    ///
    /// Fails with [`EngineError::FrameSourceUnavailable`] if the source has no
    /// frames to offer; the engine stays stopped in that case. Starting a
    /// running engine restarts it.
    pub fn start(
        &mut self,
        source: &dyn FrameSource,
        detector: Box<dyn Detector>,
    ) -> Result<(), EngineError> {
        if self.running {
            log::info!("Engine already running, restarting");
            self.stop();
        }

        let (width, height) = source.dimensions();
        if !source.is_ready() || width == 0 || height == 0 {
            return Err(EngineError::FrameSourceUnavailable(format!(
                "source not ready ({}x{})",
                width, height
            )));
        }

        let worker = DetectionWorker::spawn(detector)?;
        self.worker = Some(worker);
        self.canvas = Canvas::new(width, height);
        self.running = true;

        log::info!("Neglect engine started ({}x{})", width, height);
        Ok(())
    }

    /// Stop the session and drop all per-session state
    ///
    /// Joins the detection worker, so no late result can arrive afterwards.
    pub fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
        self.registry.clear();
        self.detections.clear();
        self.seen_generation = 0;
        self.last_detect_at = None;
        self.started_at = None;
        if self.running {
            log::info!("Neglect engine stopped after {} ticks", self.tick_count);
        }
        self.tick_count = 0;
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Render one tick; `None` while stopped
    pub fn tick(&mut self, frame: &Frame, now: Instant) -> Option<&RgbaImage> {
        if !self.running {
            return None;
        }
        let started_at = *self.started_at.get_or_insert(now);

        self.load_frame(&frame.image);
        self.exchange_detections(frame.frame_number, now);

        let canvas = &mut self.canvas;
        canvas.output.copy_from_slice(canvas.working.as_raw());

        if self.settings.object_effects_enabled {
            self.apply_object_effects(now);
        }

        let (width, height) = self.canvas.dimensions();
        let decision = SpatialNeglectController::decide(
            &self.settings.spatial_params(),
            now.saturating_duration_since(started_at),
            width,
            height,
            &mut self.rng,
        );
        if let Some(decision) = decision {
            self.apply_spatial(&decision);
        }

        self.draw_overlays(now);

        self.tick_count += 1;
        Some(&self.canvas.output)
    }

    /// Step 1: copy the frame into the working raster
    fn load_frame(&mut self, image: &RgbaImage) {
        if image.dimensions() != self.canvas.dimensions() {
            log::debug!(
                "Frame size changed {:?} -> {:?}",
                self.canvas.dimensions(),
                image.dimensions()
            );
            self.canvas = Canvas::new(image.width(), image.height());
        }
        self.canvas.working.copy_from_slice(image.as_raw());
        if self.settings.mirror {
            imageops::flip_horizontal_in_place(&mut self.canvas.working);
        }
    }

    /// Step 2: install the newest result and offer the worker a new frame
    fn exchange_detections(&mut self, frame_number: u64, now: Instant) {
        let Some(worker) = &self.worker else { return };

        if let Some(snapshot) = worker.newer_than(self.seen_generation) {
            self.seen_generation = snapshot.generation;
            self.detections = snapshot.detections;
        }

        let due = match self.last_detect_at {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.settings.detection_interval(),
        };
        if due && worker.submit(&self.canvas.working, frame_number, &self.settings.to_filter()) {
            self.last_detect_at = Some(now);
        }
    }

    /// Step 4: per-object effects on the left half of each active detection
    fn apply_object_effects(&mut self, now: Instant) {
        let params = self.settings.sweep_params();
        if self.registry.sweep_due(now, params.refresh_period) {
            self.registry
                .sweep(now, &self.detections, &params, &mut self.rng);
        }

        let intensity = self.settings.object_intensity;
        let canvas = &mut self.canvas;
        for detection in &self.detections {
            let key = resolve(detection, params.bucket);
            let Some(mode) = self.registry.active(&key, now) else { continue };
            mode.effect_kind().apply(
                &mut canvas.output,
                &canvas.working,
                detection.bbox.left_half(),
                intensity,
                &mut self.rng,
            );
        }
    }

    /// Step 5: hemifield effect
    ///
    /// Every step reads the working raster, including the later sampling
    /// steps of a compound decision.
    fn apply_spatial(&mut self, decision: &SpatialDecision) {
        let canvas = &mut self.canvas;
        let region = decision.region;

        for step in &decision.steps {
            log::trace!(
                "Hemifield {} at {:.2} over {}px",
                step.kind.display_name(),
                step.intensity,
                region.width
            );
            step.kind.apply(
                &mut canvas.output,
                &canvas.working,
                region,
                step.intensity,
                &mut self.rng,
            );
        }
    }

    /// Step 6: debug overlays
    fn draw_overlays(&mut self, now: Instant) {
        if self.settings.show_boxes {
            let registry = &self.registry;
            let bucket = self.settings.identity_bucket;
            let objects_on = self.settings.object_effects_enabled;
            overlay::draw_detections(&mut self.canvas.output, &self.detections, |d| {
                objects_on && registry.active(&resolve(d, bucket), now).is_some()
            });
        }
        if self.settings.show_midline {
            overlay::draw_midline(&mut self.canvas.output);
        }
    }

    /// Replace the detection list directly, through the same filter and cap
    /// the worker applies
    pub fn install_detections(&mut self, detections: Vec<Detection>) {
        self.detections = self.settings.to_filter().apply(detections);
    }

    /// Replace the settings; they are clamped first
    ///
    /// Turning object effects off drops every registry entry. The current
    /// detection list is re-filtered so threshold and class changes show up
    /// on the next tick.
    pub fn set_settings(&mut self, settings: EngineSettings) {
        let settings = settings.clamped();
        if !settings.object_effects_enabled && self.settings.object_effects_enabled {
            self.registry.clear();
        }
        self.settings = settings;
        let detections = std::mem::take(&mut self.detections);
        self.install_detections(detections);
    }

    /// Modify the settings in place
    pub fn update_settings<F>(&mut self, f: F)
    where
        F: FnOnce(&mut EngineSettings),
    {
        let mut settings = self.settings.clone();
        f(&mut settings);
        self.set_settings(settings);
    }

    /// Make the detector drop its learned state (e.g. a motion background)
    pub fn reset_detector(&self) {
        if let Some(worker) = &self.worker {
            worker.request_reset();
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn registry(&self) -> &ObjectEffectRegistry {
        &self.registry
    }

    /// Worker health; `None` while stopped
    pub fn detection_status(&self) -> Option<DetectionStatus> {
        self.worker.as_ref().map(|w| w.status())
    }

    /// Name of the running detector
    pub fn detector_name(&self) -> Option<&str> {
        self.worker.as_ref().map(|w| w.detector_name())
    }

    /// Ticks rendered since `start`
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Time since the first tick of the session
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.started_at
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or_default()
    }

    /// Output of the last tick
    pub fn output(&self) -> &RgbaImage {
        &self.canvas.output
    }

    /// Left hemifield of the current canvas
    pub fn hemifield(&self) -> Region {
        let (w, h) = self.canvas.dimensions();
        Region::new(0, 0, w / 2, h)
    }
}

impl Drop for NeglectEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
