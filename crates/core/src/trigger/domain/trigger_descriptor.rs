use serde_json::{json, Value};
use thiserror::Error;

use crate::config::settings::{value_as_bool, value_as_f64};

pub const MIN_DURATION: f64 = 0.5;
pub const MAX_DURATION: f64 = 120.0;
pub const DEFAULT_DURATION: f64 = 5.0;
pub const MIN_CADENCE_HZ: f64 = 0.1;
pub const MAX_CADENCE_HZ: f64 = 10.0;
pub const DEFAULT_CADENCE_HZ: f64 = 3.0;

#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("trigger descriptor is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("trigger descriptor must be a JSON object")]
    NotAnObject,
    #[error("trigger descriptor has no usable timestamp")]
    MissingTimestamp,
}

/// One manual recognition request, as written by an external producer.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerDescriptor {
    pub timestamp: f64,
    pub duration: f64,
    pub cadence_hz: f64,
    pub stop_on_match: bool,
    pub force_notify: bool,
}

impl TriggerDescriptor {
    pub fn new(timestamp: f64, duration: f64, cadence_hz: f64, stop_on_match: bool) -> Self {
        Self {
            timestamp,
            duration: clamp_or(duration, MIN_DURATION, MAX_DURATION, DEFAULT_DURATION),
            cadence_hz: clamp_or(cadence_hz, MIN_CADENCE_HZ, MAX_CADENCE_HZ, DEFAULT_CADENCE_HZ),
            stop_on_match,
            force_notify: true,
        }
    }

    /// Parse `{timestamp, duration, fps, stop_on_match, force_notify}`.
    ///
    /// Only the timestamp is mandatory; everything else is defaulted and
    /// clamped.
    pub fn parse(raw: &[u8]) -> Result<Self, TriggerError> {
        let value: Value = serde_json::from_slice(raw)?;
        let obj = value.as_object().ok_or(TriggerError::NotAnObject)?;

        let timestamp = obj
            .get("timestamp")
            .and_then(value_as_f64)
            .filter(|t| t.is_finite() && *t > 0.0)
            .ok_or(TriggerError::MissingTimestamp)?;
        let number = |key: &str, default: f64| {
            obj.get(key).and_then(value_as_f64).unwrap_or(default)
        };
        let flag = |key: &str, default: bool| {
            obj.get(key).and_then(value_as_bool).unwrap_or(default)
        };

        let mut descriptor = Self::new(
            timestamp,
            number("duration", DEFAULT_DURATION),
            number("fps", DEFAULT_CADENCE_HZ),
            flag("stop_on_match", false),
        );
        descriptor.force_notify = flag("force_notify", true);
        Ok(descriptor)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "timestamp": self.timestamp,
            "duration": self.duration,
            "fps": self.cadence_hz,
            "stop_on_match": self.stop_on_match,
            "force_notify": self.force_notify,
        })
    }
}

fn clamp_or(v: f64, lo: f64, hi: f64, default: f64) -> f64 {
    if v.is_finite() {
        v.clamp(lo, hi)
    } else {
        default
    }
}
