//! Background-subtraction motion detector
//!
//! Keeps a running-average RGB background and reports the padded bounding
//! box of every pixel that differs from it as a single "motion" detection.
//! Needs no model files, so it is the default adapter.

use image::RgbaImage;

use super::{BoundingBox, Detection, DetectionError, Detector};

/// Label reported for motion boxes
pub const MOTION_LABEL: &str = "motion";

/// Motion detector tuning
#[derive(Clone, Debug, PartialEq)]
pub struct MotionConfig {
    /// Background learning rate per frame
    pub learning_rate: f32,
    /// Mean absolute RGB difference that counts as motion
    pub threshold: f32,
    /// Padding added around the motion box (pixels)
    pub padding: u32,
    /// Boxes smaller than this area are ignored (square pixels)
    pub min_area: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.02,
            threshold: 30.0,
            padding: 8,
            min_area: 1000,
        }
    }
}

/// Running-average background subtraction
pub struct MotionDetector {
    config: MotionConfig,
    /// Background RGB, three floats per pixel
    background: Vec<f32>,
    /// Background dimensions
    width: u32,
    height: u32,
}

impl MotionDetector {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            background: Vec::new(),
            width: 0,
            height: 0,
        }
    }

    /// Forget the background; the next frame becomes the new one
    pub fn reset_background(&mut self) {
        self.background.clear();
        self.width = 0;
        self.height = 0;
    }

    fn learn(&mut self, frame: &RgbaImage) {
        let (w, h) = frame.dimensions();
        self.width = w;
        self.height = h;
        self.background = frame
            .pixels()
            .flat_map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
            .collect();
    }
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}

impl Detector for MotionDetector {
    fn detect(&mut self, frame: &RgbaImage) -> Result<Vec<Detection>, DetectionError> {
        let (w, h) = frame.dimensions();
        if w == 0 || h == 0 {
            return Ok(Vec::new());
        }
        if self.background.is_empty() || (w, h) != (self.width, self.height) {
            self.learn(frame);
            return Ok(Vec::new());
        }

        let alpha = self.config.learning_rate;
        let mut min = (w, h);
        let mut max = (0u32, 0u32);
        let mut any = false;

        for (x, y, p) in frame.enumerate_pixels() {
            let i = ((y * w + x) * 3) as usize;
            let bg = &mut self.background[i..i + 3];
            let mut diff = 0.0;
            for c in 0..3 {
                let v = p[c] as f32;
                bg[c] = bg[c] * (1.0 - alpha) + v * alpha;
                diff += (v - bg[c]).abs();
            }
            if diff / 3.0 > self.config.threshold {
                any = true;
                min = (min.0.min(x), min.1.min(y));
                max = (max.0.max(x), max.1.max(y));
            }
        }

        if !any {
            return Ok(Vec::new());
        }

        let pad = self.config.padding;
        let x0 = min.0.saturating_sub(pad);
        let y0 = min.1.saturating_sub(pad);
        let x1 = (max.0 + pad).min(w - 1);
        let y1 = (max.1 + pad).min(h - 1);
        let (bw, bh) = (x1 - x0, y1 - y0);
        if bw * bh < self.config.min_area {
            return Ok(Vec::new());
        }

        Ok(vec![Detection::new(
            MOTION_LABEL,
            1.0,
            BoundingBox::new(x0 as f32, y0 as f32, bw as f32, bh as f32),
        )])
    }

    fn name(&self) -> &str {
        "motion"
    }

    fn reset(&mut self) {
        self.reset_background();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn frame_with_square(x0: u32, y0: u32, size: u32) -> RgbaImage {
        RgbaImage::from_fn(160, 120, |x, y| {
            if x >= x0 && x < x0 + size && y >= y0 && y < y0 + size {
                Rgba([250, 250, 250, 255])
            } else {
                Rgba([20, 20, 20, 255])
            }
        })
    }

    #[test]
    fn test_first_frame_only_learns() {
        let mut detector = MotionDetector::default();
        let detections = detector.detect(&frame_with_square(0, 0, 0)).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn test_detects_new_object() {
        let mut detector = MotionDetector::default();
        detector.detect(&frame_with_square(0, 0, 0)).unwrap();
        let detections = detector.detect(&frame_with_square(50, 40, 40)).unwrap();

        assert_eq!(detections.len(), 1);
        let d = &detections[0];
        assert_eq!(d.label, MOTION_LABEL);
        assert_eq!(d.bbox, BoundingBox::new(42.0, 32.0, 55.0, 55.0));
    }

    #[test]
    fn test_small_motion_is_ignored() {
        let mut detector = MotionDetector::default();
        detector.detect(&frame_with_square(0, 0, 0)).unwrap();
        let detections = detector.detect(&frame_with_square(50, 40, 4)).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn test_reset_relearns_background() {
        let mut detector = MotionDetector::default();
        detector.detect(&frame_with_square(0, 0, 0)).unwrap();
        detector.reset();
        let detections = detector.detect(&frame_with_square(50, 40, 40)).unwrap();
        assert!(detections.is_empty());
        let detections = detector.detect(&frame_with_square(50, 40, 40)).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn test_resolution_change_relearns() {
        let mut detector = MotionDetector::default();
        detector.detect(&RgbaImage::new(10, 10)).unwrap();
        let detections = detector.detect(&frame_with_square(50, 40, 40)).unwrap();
        assert!(detections.is_empty());
    }
}
