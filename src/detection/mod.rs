//! Detection adapters
//!
//! The engine never detects anything itself. It consumes bounding-box
//! detections from a [`Detector`] running on a background worker and keeps
//! only the most recent completed list.

pub mod motion;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod worker;

use std::collections::HashSet;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::effects::Region;

pub use motion::MotionDetector;
#[cfg(feature = "onnx")]
pub use onnx::YoloDetector;
pub use worker::{DetectionSnapshot, DetectionStatus, DetectionWorker};

/// Default cap on detections per cycle
pub const MAX_DETECTIONS: usize = 10;

/// Allowed range for the detection cap
pub const MAX_DETECTIONS_RANGE: (usize, usize) = (10, 12);

/// Axis-aligned box in source-frame pixel coordinates
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        let inter = (x1 - x0).max(0.0) * (y1 - y0).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Integer pixel region covered by the box
    pub fn to_region(&self) -> Region {
        if !(self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite())
        {
            return Region::default();
        }
        Region::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.width.max(0.0).round() as u32,
            self.height.max(0.0).round() as u32,
        )
    }

    /// Left half of the box: `[x, x + floor(w / 2))`
    ///
    /// The half width comes from the unrounded box width, so the column at
    /// `x + floor(w / 2)` is never part of the left half.
    pub fn left_half(&self) -> Region {
        let region = self.to_region();
        if region.is_empty() {
            return region;
        }
        let half = (self.width.max(0.0) / 2.0).floor() as u32;
        Region::new(region.x, region.y, half, region.height)
    }
}

/// A single detection result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Class label (e.g. "person")
    pub label: String,
    /// Confidence score in `[0, 1]`
    pub score: f32,
    /// Box in source pixel space
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, score: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            score,
            bbox,
        }
    }
}

/// Errors raised by detection adapters
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("Model load failed: {0}")]
    ModelLoad(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Unexpected model output: {0}")]
    Postprocess(String),
    #[error("Detection worker unavailable: {0}")]
    Worker(String),
}

/// Common interface for detection adapters
pub trait Detector: Send {
    /// Detect objects in a frame
    fn detect(&mut self, frame: &RgbaImage) -> Result<Vec<Detection>, DetectionError>;

    /// Detector name for logs
    fn name(&self) -> &str;

    /// Drop any per-session state (background models etc.)
    fn reset(&mut self) {}
}

/// Post-detection filter: score threshold, class filter and cap
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionFilter {
    pub score_threshold: f32,
    pub classes: Option<HashSet<String>>,
    pub max_detections: usize,
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            classes: None,
            max_detections: MAX_DETECTIONS,
        }
    }
}

impl DetectionFilter {
    /// Keep detections that pass the threshold and class filter, capped
    ///
    /// Input order is preserved; adapters report their strongest results
    /// first.
    pub fn apply(&self, detections: Vec<Detection>) -> Vec<Detection> {
        let (min_cap, max_cap) = MAX_DETECTIONS_RANGE;
        let cap = self.max_detections.clamp(min_cap, max_cap);
        detections
            .into_iter()
            .filter(|d| d.score >= self.score_threshold)
            .filter(|d| match &self.classes {
                Some(classes) => classes.contains(&d.label),
                None => true,
            })
            .take(cap)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, score: f32) -> Detection {
        Detection::new(label, score, BoundingBox::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn test_filter_caps_list() {
        let filter = DetectionFilter {
            score_threshold: 0.0,
            ..Default::default()
        };
        let list: Vec<Detection> = (0..15).map(|_| det("person", 0.9)).collect();
        assert_eq!(filter.apply(list).len(), MAX_DETECTIONS);
    }

    #[test]
    fn test_filter_cap_is_bounded() {
        let list: Vec<Detection> = (0..15).map(|_| det("person", 0.9)).collect();
        let high = DetectionFilter {
            max_detections: 50,
            ..Default::default()
        };
        assert_eq!(high.apply(list.clone()).len(), 12);
        let low = DetectionFilter {
            max_detections: 1,
            ..Default::default()
        };
        assert_eq!(low.apply(list).len(), 10);
    }

    #[test]
    fn test_filter_threshold_and_classes() {
        let filter = DetectionFilter {
            score_threshold: 0.5,
            classes: Some(["person".to_string()].into_iter().collect()),
            max_detections: MAX_DETECTIONS,
        };
        let list = vec![det("person", 0.9), det("person", 0.3), det("cup", 0.99)];
        let kept = filter.apply(list);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].label, "person");
    }

    #[test]
    fn test_left_half() {
        let bbox = BoundingBox::new(100.0, 50.0, 41.0, 30.0);
        assert_eq!(bbox.left_half(), Region::new(100, 50, 20, 30));
        let bbox = BoundingBox::new(10.0, 10.0, 1.0, 5.0);
        assert!(bbox.left_half().is_empty());
    }

    #[test]
    fn test_left_half_fractional_width() {
        // 41.6 rounds to 42 but floor(41.6 / 2) is 20
        let bbox = BoundingBox::new(90.0, 30.0, 41.6, 50.0);
        let half = bbox.left_half();
        assert_eq!(half, Region::new(90, 30, 20, 50));
        assert_eq!(half.right(), 110);

        let bbox = BoundingBox::new(0.0, 0.0, 3.9, 10.0);
        assert_eq!(bbox.left_half().width, 1);
    }

    #[test]
    fn test_to_region_rejects_nan() {
        let bbox = BoundingBox::new(f32::NAN, 0.0, 10.0, 10.0);
        assert!(bbox.to_region().is_empty());
    }

    #[test]
    fn test_iou() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(a.iou(&BoundingBox::new(20.0, 20.0, 5.0, 5.0)), 0.0);
    }

    #[test]
    fn test_detection_json_uses_camel_case() {
        let json = serde_json::to_string(&det("dog", 0.75)).unwrap();
        assert!(json.contains("\"label\":\"dog\""));
        assert!(json.contains("\"bbox\""));
    }
}
