// Analysis module - wheelie detection and display classification
//
// Pipeline per sample:
// - Calibrator (calibration module) turns the raw reading into a magnitude
// - EventDetector tracks the threshold-crossing state machine
// - AngleZone / GaugeCurve derive what the display shows
//
// The detector never touches rendering; everything it learns leaves through
// its return value.

pub mod detector;
pub mod zone;

pub use detector::{is_valid_angle, DetectorState, EventDetector, Phase, Transition};
pub use zone::{AngleZone, GaugeCurve};

/// Timestamped raw tilt reading as delivered by the sensor
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Sample {
    /// Raw angle in degrees; may be negative
    pub angle: f64,
    /// Milliseconds since the Unix epoch (or any fixed origin)
    pub timestamp_ms: u64,
}

impl Sample {
    pub fn new(angle: f64, timestamp_ms: u64) -> Self {
        Self {
            angle,
            timestamp_ms,
        }
    }
}

/// Per-sample display payload
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Reading {
    /// Calibrated angle in degrees
    pub angle: f64,
    pub zone: AngleZone,
    /// Gauge fill in percent, `[0, 100]`
    pub gauge_percent: f64,
    /// Seconds into the current event, if one is running
    pub live_duration_secs: Option<f64>,
    pub timestamp_ms: u64,
}

impl Reading {
    /// Angle rounded to one decimal, as shown on the dial
    pub fn display_angle(&self) -> f64 {
        if self.angle.is_finite() {
            (self.angle * 10.0).round() / 10.0
        } else {
            0.0
        }
    }
}
