//! Identity resolution for detections
//!
//! There is no real object tracking. A detection is recognised as "the same
//! object" across detection cycles when its label and its bounding box,
//! quantized to a coarse grid, are unchanged. Two distinct objects that
//! land in the same cell share a key; that is accepted.

use crate::detection::Detection;

/// Default quantization bucket in pixels
pub const DEFAULT_BUCKET: f32 = 10.0;

/// Jitter-tolerant key for a detection
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub label: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.label, self.x, self.y, self.width, self.height
        )
    }
}

/// Resolve a detection to its identity key
///
/// Buckets below one pixel are treated as one pixel. Halfway values round
/// to even (20.5 -> 20, 21.5 -> 22).
pub fn resolve(detection: &Detection, bucket: f32) -> IdentityKey {
    let q = if bucket.is_finite() { bucket.max(1.0) } else { DEFAULT_BUCKET };
    let quantize = |v: f32| (v / q).round_ties_even() as i32;
    let bbox = &detection.bbox;
    IdentityKey {
        label: detection.label.clone(),
        x: quantize(bbox.x),
        y: quantize(bbox.y),
        width: quantize(bbox.width),
        height: quantize(bbox.height),
    }
}
