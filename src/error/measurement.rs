// Measurement error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Measurement error code constants
///
/// Single source of truth for the numeric codes surfaced to status text and
/// telemetry.
///
/// Error code range: 3001-3006
pub struct MeasurementErrorCodes {}

impl MeasurementErrorCodes {
    /// Operation not allowed in the current measurement state
    pub const INVALID_OPERATION: i32 = 3001;

    /// Sample value is non-numeric or out of range
    pub const INVALID_INPUT: i32 = 3002;

    /// Measurement already running
    pub const ALREADY_MEASURING: i32 = 3003;

    /// Measurement not running
    pub const NOT_MEASURING: i32 = 3004;

    /// Nickname failed validation
    pub const INVALID_NICKNAME: i32 = 3005;

    /// No sensor reading received yet
    pub const NO_READING: i32 = 3006;
}

/// Log a measurement error with structured context
///
/// Logs the numeric code, the component and the human-readable message.
pub fn log_measurement_error(err: &MeasurementError, context: &str) {
    error!(
        "Measurement error in {}: code={}, component=MeterContext, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Measurement-related errors
///
/// These errors cover the measurement lifecycle: starting and stopping,
/// calibration and sample validation.
///
/// Error code range: 3001-3006
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementError {
    /// Operation rejected in the current state (e.g. calibrating while measuring)
    InvalidOperation { reason: String },

    /// Sample is NaN, infinite or outside the valid angle range
    InvalidInput { value: f64 },

    /// Measurement already running
    AlreadyMeasuring,

    /// Measurement not running
    NotMeasuring,

    /// Nickname must be 3-20 characters after trimming
    InvalidNickname { min: usize, max: usize },

    /// Calibration requested before any sensor reading arrived
    NoReading,
}

impl MeasurementError {
    /// Convenience constructor for the calibrate-while-measuring rejection
    pub fn calibration_while_measuring() -> Self {
        MeasurementError::InvalidOperation {
            reason: "stop the measurement before calibrating".to_string(),
        }
    }
}

impl ErrorCode for MeasurementError {
    fn code(&self) -> i32 {
        match self {
            MeasurementError::InvalidOperation { .. } => MeasurementErrorCodes::INVALID_OPERATION,
            MeasurementError::InvalidInput { .. } => MeasurementErrorCodes::INVALID_INPUT,
            MeasurementError::AlreadyMeasuring => MeasurementErrorCodes::ALREADY_MEASURING,
            MeasurementError::NotMeasuring => MeasurementErrorCodes::NOT_MEASURING,
            MeasurementError::InvalidNickname { .. } => MeasurementErrorCodes::INVALID_NICKNAME,
            MeasurementError::NoReading => MeasurementErrorCodes::NO_READING,
        }
    }

    fn message(&self) -> String {
        match self {
            MeasurementError::InvalidOperation { reason } => {
                format!("Invalid operation: {}", reason)
            }
            MeasurementError::InvalidInput { value } => {
                format!("Invalid angle sample: {}", value)
            }
            MeasurementError::AlreadyMeasuring => "Measurement already running".to_string(),
            MeasurementError::NotMeasuring => "Measurement not running".to_string(),
            MeasurementError::InvalidNickname { min, max } => {
                format!("Nickname must be {}-{} characters", min, max)
            }
            MeasurementError::NoReading => "No sensor reading available yet".to_string(),
        }
    }
}

impl fmt::Display for MeasurementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MeasurementError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for MeasurementError {}
