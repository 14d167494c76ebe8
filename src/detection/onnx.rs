//! YOLOv8 object detector via ONNX Runtime
//!
//! Expects a COCO-trained YOLOv8 export with a `[1, 3, 640, 640]` input and a
//! `[1, 84, N]` output (4 box values + 80 class scores per candidate).

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use ndarray::Array4;

use super::{BoundingBox, Detection, DetectionError, Detector};

/// Model input edge length
const INPUT_SIZE: u32 = 640;

/// IoU above which same-class boxes are suppressed
const NMS_IOU: f32 = 0.45;

/// Candidates below this score are dropped before NMS
const MIN_CANDIDATE_SCORE: f32 = 0.25;

/// COCO class labels in model output order
pub const COCO_LABELS: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

/// YOLOv8 detector
pub struct YoloDetector {
    session: ort::session::Session,
}

impl YoloDetector {
    /// Load a model from disk
    pub fn new(model_path: &Path) -> Result<Self, DetectionError> {
        if !model_path.exists() {
            return Err(DetectionError::ModelLoad(format!(
                "Model not found: {:?}",
                model_path
            )));
        }

        ort::init()
            .with_name("NeglectLens")
            .commit()
            .map_err(|e| DetectionError::ModelLoad(format!("Failed to initialize ORT: {}", e)))?;

        let session = ort::session::Session::builder()
            .map_err(|e| DetectionError::ModelLoad(format!("Failed to create session builder: {}", e)))?
            .with_intra_threads(2)
            .map_err(|e| DetectionError::ModelLoad(format!("Failed to set threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| DetectionError::ModelLoad(format!("Failed to load model: {}", e)))?;

        log::info!("Loaded detection model from {:?}", model_path);
        Ok(Self { session })
    }

    /// Resize to the model input and convert to normalized NCHW
    fn preprocess(frame: &RgbaImage) -> Result<Array4<f32>, DetectionError> {
        let resized = imageops::resize(frame, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
        let size = INPUT_SIZE as usize;
        let plane = size * size;
        let mut input = vec![0.0f32; 3 * plane];

        for (x, y, p) in resized.enumerate_pixels() {
            let idx = y as usize * size + x as usize;
            input[idx] = p[0] as f32 / 255.0;
            input[plane + idx] = p[1] as f32 / 255.0;
            input[2 * plane + idx] = p[2] as f32 / 255.0;
        }

        Array4::from_shape_vec((1, 3, size, size), input)
            .map_err(|e| DetectionError::Inference(format!("Failed to create input array: {}", e)))
    }
}

/// Decode a `[1, 4 + classes, N]` output into frame-space detections
fn decode_output(
    dims: &[usize],
    data: &[f32],
    frame_width: u32,
    frame_height: u32,
) -> Result<Vec<Detection>, DetectionError> {
    if dims.len() != 3 || dims[1] < 5 {
        return Err(DetectionError::Postprocess(format!("shape {:?}", dims)));
    }
    let channels = dims[1];
    let candidates = dims[2];
    if data.len() < channels * candidates {
        return Err(DetectionError::Postprocess(format!(
            "{} values for shape {:?}",
            data.len(),
            dims
        )));
    }

    let scale_x = frame_width as f32 / INPUT_SIZE as f32;
    let scale_y = frame_height as f32 / INPUT_SIZE as f32;
    let at = |c: usize, i: usize| data[c * candidates + i];

    let mut detections = Vec::new();
    for i in 0..candidates {
        let (class_id, score) = (4..channels)
            .map(|c| (c - 4, at(c, i)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        if score < MIN_CANDIDATE_SCORE {
            continue;
        }
        let Some(label) = COCO_LABELS.get(class_id) else { continue };

        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        let bbox = BoundingBox::new(
            ((cx - w / 2.0) * scale_x).max(0.0),
            ((cy - h / 2.0) * scale_y).max(0.0),
            w * scale_x,
            h * scale_y,
        );
        detections.push(Detection::new(*label, score.min(1.0), bbox));
    }

    Ok(non_max_suppression(detections))
}

/// Class-aware NMS; the result is sorted by descending score
fn non_max_suppression(mut detections: Vec<Detection>) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Detection> = Vec::new();
    for det in detections {
        let suppressed = keep
            .iter()
            .any(|k| k.label == det.label && k.bbox.iou(&det.bbox) >= NMS_IOU);
        if !suppressed {
            keep.push(det);
        }
    }
    keep
}

impl Detector for YoloDetector {
    fn detect(&mut self, frame: &RgbaImage) -> Result<Vec<Detection>, DetectionError> {
        let (width, height) = frame.dimensions();
        let input = Self::preprocess(frame)?;

        let input_tensor = ort::value::Tensor::from_array(input)
            .map_err(|e| DetectionError::Inference(format!("Failed to create tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| DetectionError::Inference(format!("Inference failed: {}", e)))?;

        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| DetectionError::Postprocess("no output tensor".to_string()))?;

        let (shape, data) = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectionError::Postprocess(format!("Failed to extract output: {}", e)))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        decode_output(&dims, data, width, height)
    }

    fn name(&self) -> &str {
        "yolov8"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a `[1, 84, n]` tensor from (cx, cy, w, h, class, score) rows
    fn tensor(rows: &[(f32, f32, f32, f32, usize, f32)]) -> (Vec<usize>, Vec<f32>) {
        let n = rows.len();
        let mut data = vec![0.0; 84 * n];
        for (i, &(cx, cy, w, h, class, score)) in rows.iter().enumerate() {
            data[i] = cx;
            data[n + i] = cy;
            data[2 * n + i] = w;
            data[3 * n + i] = h;
            data[(4 + class) * n + i] = score;
        }
        (vec![1, 84, n], data)
    }

    #[test]
    fn test_decode_scales_to_frame() {
        let (dims, data) = tensor(&[(320.0, 320.0, 64.0, 128.0, 0, 0.9)]);
        let dets = decode_output(&dims, &data, 1280, 640).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label, "person");
        assert_eq!(dets[0].bbox, BoundingBox::new(576.0, 256.0, 128.0, 128.0));
    }

    #[test]
    fn test_nms_suppresses_same_class_only() {
        let (dims, data) = tensor(&[
            (100.0, 100.0, 50.0, 50.0, 0, 0.9),
            (102.0, 101.0, 50.0, 50.0, 0, 0.8),
            (102.0, 101.0, 50.0, 50.0, 16, 0.7),
            (400.0, 400.0, 50.0, 50.0, 0, 0.1),
        ]);
        let dets = decode_output(&dims, &data, 640, 640).unwrap();
        let labels: Vec<&str> = dets.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["person", "dog"]);
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        assert!(decode_output(&[1, 4, 10], &[0.0; 40], 640, 640).is_err());
        assert!(decode_output(&[1, 84, 10], &[0.0; 10], 640, 640).is_err());
    }
}
