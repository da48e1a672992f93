/// Label used when no gallery entry is close enough.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Length of a face descriptor produced by the encoder.
pub const DESCRIPTOR_LEN: usize = 128;

/// The processing frame counter resets to 0 here; only its modulus matters.
pub const FRAME_COUNTER_WRAP: u64 = 1_000_000;

/// Queue depth is logged every this many processed frames.
pub const QUEUE_LOG_EVERY: u64 = 100;

pub const DETECTOR_MODEL_NAME: &str = "yolov8n-face.onnx";
pub const DETECTOR_MODEL_URL: &str =
    "https://github.com/akanametov/yolo-face/releases/download/v0.0.0/yolov8n-face.onnx";

pub const ENCODER_MODEL_NAME: &str = "face_recognition_sface_2021dec.onnx";
pub const ENCODER_MODEL_URL: &str =
    "https://github.com/opencv/opencv_zoo/raw/main/models/face_recognition_sface/face_recognition_sface_2021dec.onnx";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Path segment under the base URL that serves stored event images.
pub const EVENT_IMAGE_ROUTE: &str = "event-image";
