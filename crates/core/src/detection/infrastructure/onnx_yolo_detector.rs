/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Letterboxes the frame to the model input, runs inference, filters by
/// confidence and applies greedy NMS. Keypoints, if the model emits them,
/// are ignored.
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

use super::onnx_session::load_session;

/// Fallback model input resolution when the model doesn't specify one.
const DEFAULT_INPUT_SIZE: u32 = 640;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;

const NMS_IOU_THRESH: f64 = 0.45;

/// Letterbox padding value (YOLO convention).
const PAD_VALUE: f32 = 114.0 / 255.0;

pub struct OnnxYoloDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model. Input size is read from its NCHW input shape.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "Loaded face detector {} (input {input_size}px, confidence {confidence})",
            model_path.display()
        );
        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
        if frame.channels() != 3 || frame.width() == 0 || frame.height() == 0 {
            return Err("detector expects a non-empty RGB frame".into());
        }
        let lb = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(lb.tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
        }
        // Either [1, features, detections] or [1, detections, features].
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        if num_feats < 5 {
            return Ok(Vec::new());
        }
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;
        let at = |det: usize, feat: usize| -> f64 {
            if transposed {
                data[feat * num_dets + det] as f64
            } else {
                data[det * num_feats + feat] as f64
            }
        };

        let mut raw = Vec::new();
        for i in 0..num_dets {
            let conf = at(i, 4);
            if conf < self.confidence {
                continue;
            }
            let (cx, cy, w, h) = (at(i, 0), at(i, 1), at(i, 2), at(i, 3));
            raw.push(RawDetection {
                x1: (cx - w / 2.0 - lb.pad_x) / lb.scale,
                y1: (cy - h / 2.0 - lb.pad_y) / lb.scale,
                x2: (cx + w / 2.0 - lb.pad_x) / lb.scale,
                y2: (cy + h / 2.0 - lb.pad_y) / lb.scale,
                confidence: conf,
            });
        }

        Ok(nms(&mut raw, NMS_IOU_THRESH)
            .into_iter()
            .map(|d| BoundingBox::from_corners(d.x1, d.y1, d.x2, d.y2))
            .map(|b| b.clamped(frame.width(), frame.height()))
            .filter(|b| !b.is_empty())
            .collect())
    }
}

struct Letterboxed {
    tensor: ndarray::Array4<f32>,
    scale: f64,
    pad_x: f64,
    pad_y: f64,
}

/// Resize into a `target` x `target` square, preserving aspect ratio.
fn letterbox(frame: &Frame, target: u32) -> Letterboxed {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let scale = (target as f64 / fw).min(target as f64 / fh);
    let new_w = ((fw * scale).round() as u32).min(target);
    let new_h = ((fh * scale).round() as u32).min(target);
    let pad_x = (target - new_w) / 2;
    let pad_y = (target - new_h) / 2;

    let t = target as usize;
    let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, t, t), PAD_VALUE);

    let src = frame.data();
    let src_w = frame.width() as usize;
    let src_h = frame.height() as usize;
    for y in 0..new_h as usize {
        let sy = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let sx = ((x as f64 / scale) as usize).min(src_w - 1);
            let offset = (sy * src_w + sx) * 3;
            for c in 0..3 {
                tensor[[0, c, pad_y as usize + y, pad_x as usize + x]] = src[offset + c] as f32 / 255.0;
            }
        }
    }

    Letterboxed {
        tensor,
        scale,
        pad_x: pad_x as f64,
        pad_y: pad_y as f64,
    }
}

#[derive(Clone, Debug)]
struct RawDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
}

impl RawDetection {
    fn iou(&self, other: &RawDetection) -> f64 {
        let inter_w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let inter_h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = inter_w * inter_h;
        if inter == 0.0 {
            return 0.0;
        }
        let area = |d: &RawDetection| (d.x2 - d.x1) * (d.y2 - d.y1);
        inter / (area(self) + area(other) - inter)
    }
}

/// Greedy NMS: highest confidence first, drop anything overlapping a kept box.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut keep: Vec<RawDetection> = Vec::new();
    for d in dets.iter() {
        if keep.iter().all(|k| k.iou(d) <= iou_thresh) {
            keep.push(d.clone());
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn det(x1: f64, y1: f64, x2: f64, y2: f64, confidence: f64) -> RawDetection {
        RawDetection {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 3, 0);
        let lb = letterbox(&frame, 640);
        assert_eq!(lb.tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(lb.scale, 3.2, epsilon = 1e-9);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 160.0);
    }

    #[test]
    fn test_letterbox_pads_with_grey() {
        let frame = Frame::new(vec![255u8; 100 * 50 * 3], 100, 50, 3, 0);
        let lb = letterbox(&frame, 64);
        assert_relative_eq!(lb.tensor[[0, 0, 0, 0]], PAD_VALUE);
        let inside = lb.pad_y as usize + 1;
        assert_relative_eq!(lb.tensor[[0, 0, inside, 1]], 1.0);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let mut dets = vec![
            det(0.0, 0.0, 100.0, 100.0, 0.8),
            det(5.0, 5.0, 105.0, 105.0, 0.9),
        ];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_keeps_disjoint() {
        let mut dets = vec![
            det(0.0, 0.0, 50.0, 50.0, 0.9),
            det(200.0, 200.0, 250.0, 250.0, 0.8),
        ];
        assert_eq!(nms(&mut dets, 0.3).len(), 2);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(&mut [], 0.3).is_empty());
    }

    #[test]
    fn test_raw_iou() {
        let a = det(0.0, 0.0, 10.0, 10.0, 1.0);
        assert_relative_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&det(20.0, 20.0, 30.0, 30.0, 1.0)), 0.0);
    }
}
