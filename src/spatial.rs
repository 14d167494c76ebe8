//! Spatial neglect controller
//!
//! Decides once per tick whether the left hemifield is degraded, how wide
//! the affected band is and which transforms run on it.

use std::time::Duration;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::effects::{clamp_intensity, EffectKind, Region};

/// Default breathing angular rate (rad/s)
pub const DEFAULT_BREATHING_RATE: f32 = 0.6;

/// Breathing band width as a fraction of the canvas: `BASE + SWING * (sin + 1)`
const BREATHING_BASE: f32 = 0.25;
const BREATHING_SWING: f32 = 0.125;

/// Fog strength relative to the spatial intensity when layered over blur
pub const LAYERED_FOG_FACTOR: f32 = 0.6;

/// Shift+noise strength relative to the spatial intensity in compound mode
const COMPOUND_SHIFT_FACTOR: f32 = 0.5;

/// Bonus pixelate in compound mode
const COMPOUND_PIXELATE_P: f64 = 0.35;
const COMPOUND_PIXELATE_FACTOR: f32 = 0.5;

/// Bonus erase in compound mode
const COMPOUND_ERASE_P: f64 = 0.20;
const COMPOUND_ERASE_FACTOR: f32 = 0.4;

/// How wide the affected band is
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpatialRegionMode {
    /// Fixed `floor(width / 2)`
    #[default]
    HalfField,
    /// Oscillates between a quarter and half of the width
    Breathing,
}

/// Which transforms run on the band
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpatialStyle {
    /// One of fog, blur+fog or shift-noise
    #[default]
    Single,
    /// Layered blur, shift-noise and fog with random extras
    Compound,
}

/// One transform in a spatial decision
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpatialStep {
    pub kind: EffectKind,
    pub intensity: f32,
}

impl SpatialStep {
    fn new(kind: EffectKind, intensity: f32) -> Self {
        Self {
            kind,
            intensity: clamp_intensity(intensity),
        }
    }
}

/// Outcome of a successful trial; lives for one tick
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialDecision {
    pub region: Region,
    /// Applied in order
    pub steps: Vec<SpatialStep>,
}

/// Controller parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpatialParams {
    pub enabled: bool,
    pub probability: f64,
    pub intensity: f32,
    pub region_mode: SpatialRegionMode,
    pub style: SpatialStyle,
    pub breathing_rate: f32,
}

impl Default for SpatialParams {
    fn default() -> Self {
        Self {
            enabled: true,
            probability: 0.5,
            intensity: 0.6,
            region_mode: SpatialRegionMode::HalfField,
            style: SpatialStyle::Single,
            breathing_rate: DEFAULT_BREATHING_RATE,
        }
    }
}

/// Stateless per-tick hemifield decision
pub struct SpatialNeglectController;

impl SpatialNeglectController {
    /// Run the tick's Bernoulli trial
    ///
    /// `elapsed` is the time since the engine started and only matters in
    /// breathing mode. Returns `None` when disabled, when the trial fails or
    /// when the band would be empty.
    pub fn decide(
        params: &SpatialParams,
        elapsed: Duration,
        canvas_width: u32,
        canvas_height: u32,
        rng: &mut dyn RngCore,
    ) -> Option<SpatialDecision> {
        if !params.enabled {
            return None;
        }
        let p = if params.probability.is_nan() {
            0.0
        } else {
            params.probability.clamp(0.0, 1.0)
        };
        if !rng.random_bool(p) {
            return None;
        }

        let width = band_width(params, elapsed, canvas_width);
        let region = Region::new(0, 0, width, canvas_height);
        if region.is_empty() {
            return None;
        }

        let intensity = clamp_intensity(params.intensity);
        let steps = match params.style {
            SpatialStyle::Single => single_steps(intensity, rng),
            SpatialStyle::Compound => compound_steps(intensity, rng),
        };

        Some(SpatialDecision { region, steps })
    }
}

/// Width of the affected band for this tick
pub fn band_width(params: &SpatialParams, elapsed: Duration, canvas_width: u32) -> u32 {
    match params.region_mode {
        SpatialRegionMode::HalfField => canvas_width / 2,
        SpatialRegionMode::Breathing => {
            let rate = if params.breathing_rate.is_finite() {
                params.breathing_rate
            } else {
                DEFAULT_BREATHING_RATE
            };
            let phase = (rate as f64 * elapsed.as_secs_f64()).sin() as f32;
            let fraction = BREATHING_BASE + BREATHING_SWING * (phase + 1.0);
            (canvas_width as f32 * fraction).floor() as u32
        }
    }
}

fn single_steps(intensity: f32, rng: &mut dyn RngCore) -> Vec<SpatialStep> {
    match rng.random_range(0..3u32) {
        0 => vec![SpatialStep::new(EffectKind::Fog, intensity)],
        1 => vec![
            SpatialStep::new(EffectKind::Blur, intensity),
            SpatialStep::new(EffectKind::Fog, intensity * LAYERED_FOG_FACTOR),
        ],
        _ => vec![SpatialStep::new(EffectKind::ShiftNoise, intensity)],
    }
}

fn compound_steps(intensity: f32, rng: &mut dyn RngCore) -> Vec<SpatialStep> {
    let mut steps = vec![
        SpatialStep::new(EffectKind::Blur, intensity),
        SpatialStep::new(EffectKind::ShiftNoise, intensity * COMPOUND_SHIFT_FACTOR),
    ];
    if rng.random_bool(COMPOUND_PIXELATE_P) {
        steps.push(SpatialStep::new(
            EffectKind::Pixelate,
            intensity * COMPOUND_PIXELATE_FACTOR,
        ));
    }
    steps.push(SpatialStep::new(
        EffectKind::Fog,
        intensity * LAYERED_FOG_FACTOR,
    ));
    if rng.random_bool(COMPOUND_ERASE_P) {
        steps.push(SpatialStep::new(
            EffectKind::Erase,
            intensity * COMPOUND_ERASE_FACTOR,
        ));
    }
    steps
}
