/// Face descriptor encoder backed by an ONNX recognition model.
///
/// Each box is cropped from the frame (no landmark alignment), resampled to
/// the 112x112 model input and run through the network. The output is
/// L2-normalised so Euclidean distances fall in [0, 2].
use std::path::Path;

use crate::detection::domain::face_encoder::FaceEncoder;
use crate::detection::domain::face_matcher::Descriptor;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::DESCRIPTOR_LEN;
use crate::shared::frame::Frame;

use super::onnx_session::load_session;

const INPUT_SIZE: usize = 112;

pub struct OnnxFaceEncoder {
    session: ort::session::Session,
    warned_len: bool,
}

impl OnnxFaceEncoder {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path)?;
        log::info!("Loaded face encoder {}", model_path.display());
        Ok(Self {
            session,
            warned_len: false,
        })
    }

    fn embed(&mut self, frame: &Frame, bbox: BoundingBox) -> Result<Descriptor, Box<dyn std::error::Error>> {
        let tensor = preprocess(frame, bbox).ok_or("face box lies outside the frame")?;
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let mut values = {
            let outputs = self.session.run(ort::inputs![input_value])?;
            let array = outputs[0].try_extract_array::<f32>()?;
            array
                .as_slice()
                .ok_or("Cannot get embedding slice")?
                .to_vec()
        };
        if values.len() != DESCRIPTOR_LEN && !self.warned_len {
            log::warn!(
                "Encoder produced {} values, expected {DESCRIPTOR_LEN}; gallery must come from the same model",
                values.len()
            );
            self.warned_len = true;
        }
        l2_normalize(&mut values);
        Ok(Descriptor(values))
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode(
        &mut self,
        frame: &Frame,
        boxes: &[BoundingBox],
    ) -> Result<Vec<Descriptor>, Box<dyn std::error::Error>> {
        boxes.iter().map(|b| self.embed(frame, *b)).collect()
    }
}

/// Crop `bbox` and resample to 112x112 RGB, NCHW, raw 0..255 values.
fn preprocess(frame: &Frame, bbox: BoundingBox) -> Option<ndarray::Array4<f32>> {
    let b = bbox.clamped(frame.width(), frame.height());
    if b.is_empty() || frame.channels() < 3 {
        return None;
    }
    let stride = frame.width() as usize;
    let channels = frame.channels() as usize;
    let data = frame.data();
    let (bw, bh) = (b.width as usize, b.height as usize);

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for y in 0..INPUT_SIZE {
        let sy = b.top as usize + (((y as f64 + 0.5) * bh as f64 / INPUT_SIZE as f64) as usize).min(bh - 1);
        for x in 0..INPUT_SIZE {
            let sx =
                b.left as usize + (((x as f64 + 0.5) * bw as f64 / INPUT_SIZE as f64) as usize).min(bw - 1);
            let offset = (sy * stride + sx) * channels;
            for c in 0..3 {
                tensor[[0, c, y, x]] = data[offset + c] as f32;
            }
        }
    }
    Some(tensor)
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
