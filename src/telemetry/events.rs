//! Core telemetry event types describing what the meter did, for CLI
//! reporting and diagnostic subscribers.

use serde::{Deserialize, Serialize};

/// Measurement lifecycle stages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    MeasurementStarted,
    MeasurementStopped,
    SessionReset,
}

/// Diagnostic error codes surfaced via telemetry metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticError {
    InvalidSample,
    SettingsWrite,
}

/// Meter events covering detections, calibration, persistence and errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    EventDetected {
        duration_secs: f64,
        max_angle: f64,
        average_angle: f64,
    },
    CalibrationChanged {
        offset: f64,
    },
    Lifecycle {
        phase: LifecyclePhase,
        timestamp_ms: u64,
    },
    SaveCompleted {
        count: usize,
    },
    SaveFailed {
        reason: String,
    },
    Error {
        code: DiagnosticError,
        context: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_error_wire_names() {
        let event = MetricEvent::Error {
            code: DiagnosticError::SettingsWrite,
            context: "read-only".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["payload"]["code"], "settings_write");

        let parsed: DiagnosticError = serde_json::from_str("\"invalid_sample\"").unwrap();
        assert_eq!(parsed, DiagnosticError::InvalidSample);
        assert!(serde_json::from_str::<DiagnosticError>("\"unknown\"").is_err());
    }
}
