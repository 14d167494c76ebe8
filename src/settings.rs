//! Engine settings
//!
//! The live parameter surface of the engine. Values are clamped into range,
//! never rejected, and can be loaded from / saved to a JSON file.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detection::{DetectionFilter, MAX_DETECTIONS, MAX_DETECTIONS_RANGE};
use crate::identity::DEFAULT_BUCKET;
use crate::registry::SweepParams;
use crate::spatial::{SpatialParams, SpatialRegionMode, SpatialStyle, DEFAULT_BREATHING_RATE};

/// Allowed detection interval (ms)
const DETECTION_INTERVAL_RANGE: (u64, u64) = (16, 10_000);

/// Allowed object refresh period (ms)
const REFRESH_PERIOD_RANGE: (u64, u64) = (50, 60_000);

/// Allowed identity bucket (px)
const BUCKET_RANGE: (f32, f32) = (1.0, 200.0);

/// Allowed breathing rate (rad/s)
const BREATHING_RATE_RANGE: (f32, f32) = (0.0, 10.0);

/// All run-time parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Minimum time between detection submissions
    pub detection_interval_ms: u64,
    /// Detections below this score are dropped
    pub score_threshold: f32,
    /// Only these labels are kept; `None` keeps everything
    pub class_filter: Option<Vec<String>>,
    /// Flip the frame horizontally before anything else
    pub mirror: bool,

    pub object_effects_enabled: bool,
    /// Chance per sweep that a present object gets a mode
    pub object_activation_probability: f64,
    /// Time between registry sweeps
    pub object_refresh_period_ms: u64,
    /// Intensity of per-object effects
    pub object_intensity: f32,

    pub spatial_effects_enabled: bool,
    /// Chance per tick that the hemifield effect runs
    pub spatial_probability: f64,
    pub spatial_intensity: f32,
    pub spatial_region: SpatialRegionMode,
    pub spatial_style: SpatialStyle,
    /// Breathing angular rate (rad/s)
    pub breathing_rate: f32,

    /// Draw the vertical midline
    pub show_midline: bool,
    /// Draw detection boxes
    pub show_boxes: bool,

    /// Detection cap per cycle (10-12)
    pub max_detections: usize,
    /// Identity quantization bucket (px)
    pub identity_bucket: f32,
    /// RNG seed; `None` seeds from the OS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            detection_interval_ms: 300,
            score_threshold: 0.5,
            class_filter: None,
            mirror: true,
            object_effects_enabled: true,
            object_activation_probability: 0.5,
            object_refresh_period_ms: 1500,
            object_intensity: 0.75,
            spatial_effects_enabled: true,
            spatial_probability: 0.5,
            spatial_intensity: 0.6,
            spatial_region: SpatialRegionMode::default(),
            spatial_style: SpatialStyle::default(),
            breathing_rate: DEFAULT_BREATHING_RATE,
            show_midline: false,
            show_boxes: false,
            max_detections: MAX_DETECTIONS,
            identity_bucket: DEFAULT_BUCKET,
            seed: None,
        }
    }
}

fn unit_f32(value: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn unit_f64(value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl EngineSettings {
    /// Clamp every value into its valid range; NaN falls back to the default
    pub fn clamp(&mut self) {
        let defaults = Self::default();

        self.detection_interval_ms = self
            .detection_interval_ms
            .clamp(DETECTION_INTERVAL_RANGE.0, DETECTION_INTERVAL_RANGE.1);
        self.score_threshold = unit_f32(self.score_threshold, defaults.score_threshold);
        self.object_activation_probability = unit_f64(
            self.object_activation_probability,
            defaults.object_activation_probability,
        );
        self.object_refresh_period_ms = self
            .object_refresh_period_ms
            .clamp(REFRESH_PERIOD_RANGE.0, REFRESH_PERIOD_RANGE.1);
        self.object_intensity = unit_f32(self.object_intensity, defaults.object_intensity);
        self.spatial_probability = unit_f64(self.spatial_probability, defaults.spatial_probability);
        self.spatial_intensity = unit_f32(self.spatial_intensity, defaults.spatial_intensity);

        self.breathing_rate = if self.breathing_rate.is_finite() {
            self.breathing_rate
                .clamp(BREATHING_RATE_RANGE.0, BREATHING_RATE_RANGE.1)
        } else {
            defaults.breathing_rate
        };
        self.max_detections = self
            .max_detections
            .clamp(MAX_DETECTIONS_RANGE.0, MAX_DETECTIONS_RANGE.1);
        self.identity_bucket = if self.identity_bucket.is_finite() {
            self.identity_bucket.clamp(BUCKET_RANGE.0, BUCKET_RANGE.1)
        } else {
            defaults.identity_bucket
        };

        // An empty filter list means "no filter"
        if self.class_filter.as_ref().is_some_and(|c| c.is_empty()) {
            self.class_filter = None;
        }
    }

    /// Return a clamped copy
    pub fn clamped(mut self) -> Self {
        self.clamp();
        self
    }

    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }

    pub fn object_refresh_period(&self) -> Duration {
        Duration::from_millis(self.object_refresh_period_ms)
    }

    /// Filter applied to detector output
    pub fn to_filter(&self) -> DetectionFilter {
        DetectionFilter {
            score_threshold: self.score_threshold,
            classes: self
                .class_filter
                .as_ref()
                .map(|c| c.iter().cloned().collect::<HashSet<String>>()),
            max_detections: self.max_detections,
        }
    }

    /// Registry sweep parameters
    pub fn sweep_params(&self) -> SweepParams {
        SweepParams {
            refresh_period: self.object_refresh_period(),
            activation_probability: self.object_activation_probability,
            bucket: self.identity_bucket,
        }
    }

    /// Spatial controller parameters
    pub fn spatial_params(&self) -> SpatialParams {
        SpatialParams {
            enabled: self.spatial_effects_enabled,
            probability: self.spatial_probability,
            intensity: self.spatial_intensity,
            region_mode: self.spatial_region,
            style: self.spatial_style,
            breathing_rate: self.breathing_rate,
        }
    }

    /// Load settings from a JSON file; missing fields take their defaults
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&contents)?;
        Ok(settings.clamped())
    }

    /// Save settings to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Settings file errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = EngineSettings::default();
        assert_eq!(settings.object_intensity, 0.75);
        assert_eq!(settings.max_detections, 10);
        assert_eq!(settings.identity_bucket, 10.0);
        assert!(settings.class_filter.is_none());
        assert_eq!(settings.clone().clamped(), settings);
    }

    #[test]
    fn test_clamping() {
        let mut settings = EngineSettings {
            score_threshold: 1.5,
            object_activation_probability: -0.2,
            spatial_probability: f64::NAN,
            spatial_intensity: 7.0,
            object_intensity: f32::NAN,
            max_detections: 40,
            identity_bucket: 0.0,
            detection_interval_ms: 0,
            breathing_rate: f32::INFINITY,
            class_filter: Some(Vec::new()),
            ..Default::default()
        };
        settings.clamp();

        assert_eq!(settings.score_threshold, 1.0);
        assert_eq!(settings.object_activation_probability, 0.0);
        assert_eq!(settings.spatial_probability, 0.5);
        assert_eq!(settings.spatial_intensity, 1.0);
        assert_eq!(settings.object_intensity, 0.75);
        assert_eq!(settings.max_detections, 12);
        assert_eq!(settings.identity_bucket, 1.0);
        assert_eq!(settings.detection_interval_ms, 16);
        assert_eq!(settings.breathing_rate, DEFAULT_BREATHING_RATE);
        assert!(settings.class_filter.is_none());
    }

    #[test]
    fn test_json_is_camel_case_with_defaults() {
        let json = r#"{ "spatialEffectsEnabled": false, "classFilter": ["person"], "spatialRegion": "breathing" }"#;
        let settings: EngineSettings = serde_json::from_str(json).unwrap();
        assert!(!settings.spatial_effects_enabled);
        assert_eq!(settings.spatial_region, SpatialRegionMode::Breathing);
        assert_eq!(settings.object_refresh_period_ms, 1500);

        let filter = settings.to_filter();
        assert!(filter.classes.unwrap().contains("person"));

        let out = serde_json::to_string(&EngineSettings::default()).unwrap();
        assert!(out.contains("\"objectActivationProbability\""));
        assert!(!out.contains("\"seed\""));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("neglect-settings-{}.json", std::process::id()));
        let settings = EngineSettings {
            mirror: false,
            seed: Some(7),
            spatial_style: SpatialStyle::Compound,
            ..Default::default()
        };
        settings.save_to_file(&path).unwrap();
        let loaded = EngineSettings::load_from_file(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_errors() {
        let missing = EngineSettings::load_from_file(Path::new("/nonexistent/neglect.json"));
        assert!(matches!(missing, Err(SettingsError::Io(_))));

        let path = std::env::temp_dir().join(format!("neglect-bad-{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();
        let bad = EngineSettings::load_from_file(&path);
        let _ = fs::remove_file(&path);
        assert!(matches!(bad, Err(SettingsError::Json(_))));
    }
}
