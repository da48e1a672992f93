use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

pub const MIN_SCALE_FACTOR: f64 = 0.25;
pub const MAX_SCALE_FACTOR: f64 = 1.0;
pub const MIN_MATCH_THRESHOLD: f64 = 0.30;
pub const MAX_MATCH_THRESHOLD: f64 = 0.80;
pub const MAX_GRACE_SECONDS: f64 = 600.0;
pub const MAX_CLEANUP_DAYS: i64 = 3650;

/// Immutable, typed view of the configuration document.
///
/// Built leniently: a key holding the wrong type falls back to its default
/// instead of failing, and numeric ranges are clamped on construction.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub input_stream_url: String,
    pub output_width: u32,
    pub output_height: u32,
    pub max_capture_retries: u32,

    pub overlay_color: [u8; 3],
    pub overlay_transparency: f64,
    pub overlay_border: u32,
    pub enable_face_overlay: bool,

    pub notification_delay: f64,
    pub custom_message_udp: String,
    pub custom_message_http: String,
    pub use_udp: bool,
    pub udp_service_url: String,
    pub udp_service_port: u16,
    pub use_web: bool,
    pub web_service_url: String,
    pub use_text_endpoint: bool,
    pub text_endpoint_host: String,
    pub text_endpoint_user: String,
    pub text_endpoint_pass: String,
    pub text_endpoint_input: String,
    pub announce_unknown_on_trigger: bool,

    pub enable_stream_suspend: bool,
    pub stream_suspend_grace_seconds: f64,
    pub enable_face_recognition_interval: bool,
    pub face_recognition_interval: u32,
    pub face_scale_factor: f64,
    pub face_match_threshold: f64,
    pub detection_confidence: f64,
    pub enable_clahe: bool,
    pub enable_blur_filter: bool,
    pub blur_threshold: f64,
    pub tracker: String,

    pub eventimage_cleanup_days: i64,
    pub image_path: PathBuf,
    pub log_file: PathBuf,
    pub trigger_file: PathBuf,
    pub known_faces_dir: PathBuf,
    pub base_url: String,
}

fn default_template() -> String {
    json!({
        "name": "[[name]]",
        "image_url": "[[image_url]]",
        "time": "[[time]]",
        "date": "[[date]]",
        "timestamp": "[[timestamp]]"
    })
    .to_string()
}

/// The document written when no configuration file exists yet.
pub fn default_document(data_dir: &Path) -> Map<String, Value> {
    let path = |name: &str| Value::String(data_dir.join(name).to_string_lossy().into_owned());
    let doc = json!({
        "input_stream_url": "",
        "output_width": 640,
        "output_height": 480,
        "max_capture_retries": 15,
        "overlay_color": [220, 220, 200],
        "overlay_transparency": 0.5,
        "overlay_border": 1,
        "enable_face_overlay": true,
        "notification_delay": 60,
        "custom_message_udp": default_template(),
        "custom_message_http": default_template(),
        "use_udp": false,
        "udp_service_url": "",
        "udp_service_port": 0,
        "use_web": false,
        "web_service_url": "",
        "use_text_endpoint": false,
        "text_endpoint_host": "",
        "text_endpoint_user": "",
        "text_endpoint_pass": "",
        "text_endpoint_input": "",
        "announce_unknown_on_trigger": true,
        "enable_stream_suspend": false,
        "stream_suspend_grace_seconds": 10,
        "enable_face_recognition_interval": true,
        "face_recognition_interval": 60,
        "face_scale_factor": 0.75,
        "face_match_threshold": 0.55,
        "detection_confidence": 0.5,
        "enable_clahe": false,
        "enable_blur_filter": false,
        "blur_threshold": 100.0,
        "tracker": "template",
        "eventimage_cleanup_days": 0,
        "image_path": path("saved_faces"),
        "log_file": path("event_log.json"),
        "trigger_file": path("trigger.json"),
        "known_faces_dir": path("knownfaces"),
        "base_url": "",
    });
    match doc {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl Settings {
    pub fn defaults(data_dir: &Path) -> Self {
        Self::from_map(&Map::new(), data_dir)
    }

    /// Read every field from `map`, falling back to defaults per key.
    pub fn from_map(map: &Map<String, Value>, data_dir: &Path) -> Self {
        let r = Reader { map };
        let path = |key: &str, name: &str| {
            let s = r.string(key, "");
            if s.is_empty() {
                data_dir.join(name)
            } else {
                PathBuf::from(s)
            }
        };

        Self {
            input_stream_url: r.string("input_stream_url", "").trim().to_string(),
            output_width: r.u32("output_width", 640).max(1),
            output_height: r.u32("output_height", 480).max(1),
            max_capture_retries: r.u32("max_capture_retries", 15).max(1),

            overlay_color: r.color("overlay_color", [220, 220, 200]),
            overlay_transparency: r.f64("overlay_transparency", 0.5).clamp(0.0, 1.0),
            overlay_border: r.u32("overlay_border", 1),
            enable_face_overlay: r.bool("enable_face_overlay", true),

            notification_delay: r.f64("notification_delay", 60.0).max(0.0),
            custom_message_udp: r.string_or("custom_message_udp", default_template),
            custom_message_http: r.string_or("custom_message_http", default_template),
            use_udp: r.bool("use_udp", false),
            udp_service_url: r.string("udp_service_url", "").trim().to_string(),
            udp_service_port: r.u32("udp_service_port", 0).min(u16::MAX as u32) as u16,
            use_web: r.bool("use_web", false),
            web_service_url: r.string("web_service_url", "").trim().to_string(),
            use_text_endpoint: r.bool_aliased("use_text_endpoint", "use_loxone_vti", false),
            text_endpoint_host: r.string_aliased("text_endpoint_host", "loxone_ip"),
            text_endpoint_user: r.string_aliased("text_endpoint_user", "loxone_user"),
            text_endpoint_pass: r.string_aliased("text_endpoint_pass", "loxone_pass"),
            text_endpoint_input: r.string_aliased("text_endpoint_input", "loxone_text_input"),
            announce_unknown_on_trigger: r.bool("announce_unknown_on_trigger", true),

            enable_stream_suspend: r.bool("enable_stream_suspend", false),
            stream_suspend_grace_seconds: r
                .f64("stream_suspend_grace_seconds", 10.0)
                .clamp(0.0, MAX_GRACE_SECONDS),
            enable_face_recognition_interval: r.bool("enable_face_recognition_interval", true),
            face_recognition_interval: r.u32("face_recognition_interval", 60).max(1),
            face_scale_factor: r
                .f64("face_scale_factor", 0.75)
                .clamp(MIN_SCALE_FACTOR, MAX_SCALE_FACTOR),
            face_match_threshold: r
                .f64("face_match_threshold", 0.55)
                .clamp(MIN_MATCH_THRESHOLD, MAX_MATCH_THRESHOLD),
            detection_confidence: r.f64("detection_confidence", 0.5).clamp(0.0, 1.0),
            enable_clahe: r.bool("enable_clahe", false),
            enable_blur_filter: r.bool("enable_blur_filter", false),
            blur_threshold: r.f64("blur_threshold", 100.0).max(0.0),
            tracker: r.string("tracker", "template").trim().to_lowercase(),

            eventimage_cleanup_days: (r.f64("eventimage_cleanup_days", 0.0) as i64)
                .clamp(0, MAX_CLEANUP_DAYS),
            image_path: path("image_path", "saved_faces"),
            log_file: path("log_file", "event_log.json"),
            trigger_file: path("trigger_file", "trigger.json"),
            known_faces_dir: path("known_faces_dir", "knownfaces"),
            base_url: r.string("base_url", "").trim().trim_end_matches('/').to_string(),
        }
    }

    /// Frame interval for unattended recognition, `None` when disabled.
    pub fn periodic_interval(&self) -> Option<u32> {
        (self.enable_face_recognition_interval && self.face_recognition_interval > 0)
            .then_some(self.face_recognition_interval)
    }
}

/// Lenient field reader over a JSON object.
struct Reader<'a> {
    map: &'a Map<String, Value>,
}

impl Reader<'_> {
    fn f64(&self, key: &str, default: f64) -> f64 {
        self.map
            .get(key)
            .and_then(value_as_f64)
            .filter(|v| v.is_finite())
            .unwrap_or(default)
    }

    fn u32(&self, key: &str, default: u32) -> u32 {
        self.map
            .get(key)
            .and_then(value_as_f64)
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v.min(u32::MAX as f64) as u32)
            .unwrap_or(default)
    }

    fn bool(&self, key: &str, default: bool) -> bool {
        self.map.get(key).and_then(value_as_bool).unwrap_or(default)
    }

    fn bool_aliased(&self, key: &str, legacy: &str, default: bool) -> bool {
        self.map
            .get(key)
            .or_else(|| self.map.get(legacy))
            .and_then(value_as_bool)
            .unwrap_or(default)
    }

    fn string(&self, key: &str, default: &str) -> String {
        match self.map.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => default.to_string(),
        }
    }

    fn string_or(&self, key: &str, default: fn() -> String) -> String {
        match self.map.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            _ => default(),
        }
    }

    fn string_aliased(&self, key: &str, legacy: &str) -> String {
        let primary = self.string(key, "");
        if primary.trim().is_empty() {
            self.string(legacy, "").trim().to_string()
        } else {
            primary.trim().to_string()
        }
    }

    /// Accepts `[r, g, b]` or a `#rrggbb` / `#rgb` string.
    fn color(&self, key: &str, default: [u8; 3]) -> [u8; 3] {
        match self.map.get(key) {
            Some(Value::Array(items)) if items.len() >= 3 => {
                let mut out = default;
                for (slot, item) in out.iter_mut().zip(items) {
                    match value_as_f64(item) {
                        Some(v) => *slot = v.clamp(0.0, 255.0) as u8,
                        None => return default,
                    }
                }
                out
            }
            Some(Value::String(s)) => parse_hex_color(s).unwrap_or(default),
            _ => default,
        }
    }
}

pub fn value_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// `true/false`, non-zero numbers, and `1/true/yes/on` strings (case-insensitive).
pub fn value_as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|x| x != 0.0),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            Some(matches!(s.as_str(), "1" | "true" | "yes" | "on"))
        }
        _ => None,
    }
}

fn parse_hex_color(s: &str) -> Option<[u8; 3]> {
    let hex = s.trim().trim_start_matches('#');
    let expanded: String = if hex.len() == 3 {
        hex.chars().flat_map(|c| [c, c]).collect()
    } else {
        hex.to_string()
    };
    if expanded.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}
