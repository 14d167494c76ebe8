//! Object effect registry
//!
//! Maps identity keys to the neglect mode currently shown on that object.
//! The registry is refreshed by periodic sweeps on its own cadence, so a
//! mode stays on screen for many render ticks instead of flickering, yet
//! still gets re-rolled every refresh period.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::{Rng, RngCore};

use crate::detection::Detection;
use crate::effects::EffectKind;
use crate::identity::{resolve, IdentityKey};

/// Expiry as a multiple of the refresh period, in tenths (1.2x)
pub const EXPIRY_TENTHS: u32 = 12;

/// Modes an object can be assigned
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectMode {
    Erase,
    Fog,
    Pixelate,
    Blur,
}

impl ObjectMode {
    pub const ALL: [ObjectMode; 4] = [
        ObjectMode::Erase,
        ObjectMode::Fog,
        ObjectMode::Pixelate,
        ObjectMode::Blur,
    ];

    /// Uniformly random mode
    pub fn random(rng: &mut dyn RngCore) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    /// Region effect implementing this mode
    pub fn effect_kind(&self) -> EffectKind {
        match self {
            ObjectMode::Erase => EffectKind::Erase,
            ObjectMode::Fog => EffectKind::Fog,
            ObjectMode::Pixelate => EffectKind::Pixelate,
            ObjectMode::Blur => EffectKind::Blur,
        }
    }
}

/// Active assignment for one object
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectAssignment {
    pub mode: ObjectMode,
    pub expires_at: Instant,
}

impl EffectAssignment {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at < now
    }
}

/// Parameters for one sweep
#[derive(Clone, Copy, Debug)]
pub struct SweepParams {
    /// Time between sweeps
    pub refresh_period: Duration,
    /// Chance a present object gets (re)assigned a mode
    pub activation_probability: f64,
    /// Identity quantization bucket in pixels
    pub bucket: f32,
}

/// Time-bounded identity key -> assignment map
#[derive(Default)]
pub struct ObjectEffectRegistry {
    assignments: HashMap<IdentityKey, EffectAssignment>,
    last_sweep: Option<Instant>,
}

impl ObjectEffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a sweep is due at `now`
    pub fn sweep_due(&self, now: Instant, refresh_period: Duration) -> bool {
        match self.last_sweep {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= refresh_period,
        }
    }

    /// Re-roll assignments for the current detections and drop stale entries
    ///
    /// After a sweep every entry belongs to a current detection, so the
    /// registry never holds more entries than there are detections.
    pub fn sweep(
        &mut self,
        now: Instant,
        detections: &[Detection],
        params: &SweepParams,
        rng: &mut dyn RngCore,
    ) {
        let p = if params.activation_probability.is_nan() {
            0.0
        } else {
            params.activation_probability.clamp(0.0, 1.0)
        };
        let expires_at = now + params.refresh_period * EXPIRY_TENTHS / 10;

        let mut present = Vec::with_capacity(detections.len());
        for detection in detections {
            let key = resolve(detection, params.bucket);
            if rng.random_bool(p) {
                let mode = ObjectMode::random(rng);
                self.assignments
                    .insert(key.clone(), EffectAssignment { mode, expires_at });
            } else {
                self.assignments.remove(&key);
            }
            present.push(key);
        }

        self.assignments
            .retain(|key, assignment| present.contains(key) && !assignment.is_expired(now));
        self.last_sweep = Some(now);

        log::trace!(
            "Registry sweep: {} detections, {} active",
            detections.len(),
            self.assignments.len()
        );
    }

    /// Current assignment for a key
    pub fn lookup(&self, key: &IdentityKey) -> Option<&EffectAssignment> {
        self.assignments.get(key)
    }

    /// Assignment for a key that is still live at `now`
    pub fn active(&self, key: &IdentityKey, now: Instant) -> Option<ObjectMode> {
        self.lookup(key)
            .filter(|a| !a.is_expired(now))
            .map(|a| a.mode)
    }

    /// Drop every assignment and the sweep clock
    pub fn clear(&mut self) {
        self.assignments.clear();
        self.last_sweep = None;
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Iterate over all assignments
    pub fn iter(&self) -> impl Iterator<Item = (&IdentityKey, &EffectAssignment)> {
        self.assignments.iter()
    }
}
