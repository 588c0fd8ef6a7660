// Error types for the wheelie meter
//
// This module defines custom error types for measurement, persistence and
// settings operations, each carrying a stable numeric code so orchestration
// layers can render status text without matching on variants.

mod measurement;
mod persistence;

pub use measurement::{log_measurement_error, MeasurementError, MeasurementErrorCodes};
pub use persistence::{
    log_persistence_error, PersistenceError, PersistenceErrorCodes, SettingsError,
    SettingsErrorCodes,
};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
