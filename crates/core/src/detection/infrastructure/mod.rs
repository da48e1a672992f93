pub mod known_faces;
pub mod model_resolver;
pub mod onnx_face_encoder;
pub mod onnx_session;
pub mod onnx_yolo_detector;
pub mod template_tracker;
pub mod tracker_factory;
