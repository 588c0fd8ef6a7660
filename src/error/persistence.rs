// Persistence and settings error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Persistence error code constants
///
/// Error code range: 4001-4005
pub struct PersistenceErrorCodes {}

impl PersistenceErrorCodes {
    /// Save requested with no unsaved records
    pub const NOTHING_TO_SAVE: i32 = 4001;

    /// Sink rejected the write
    pub const WRITE_FAILED: i32 = 4002;

    /// Row could not be serialized
    pub const SERIALIZATION: i32 = 4003;

    /// Background worker no longer accepting batches
    pub const WORKER_CLOSED: i32 = 4004;

    /// Previous save still in flight
    pub const IN_FLIGHT: i32 = 4005;
}

/// Settings error code constants
///
/// Error code range: 5001-5002
pub struct SettingsErrorCodes {}

impl SettingsErrorCodes {
    /// Settings file could not be read or written
    pub const IO: i32 = 5001;

    /// Settings file is not valid JSON
    pub const PARSE: i32 = 5002;
}

/// Log a persistence error with structured context
pub fn log_persistence_error(err: &PersistenceError, context: &str) {
    error!(
        "Persistence error in {}: code={}, component=PersistenceSink, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while writing session results to a sink
///
/// A failed write leaves the records marked unsaved; there are no retries.
///
/// Error code range: 4001-4005
#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceError {
    /// Save requested with no unsaved records
    NothingToSave,

    /// Sink rejected the write
    WriteFailed { reason: String },

    /// Row could not be serialized
    Serialization { reason: String },

    /// Background worker is no longer accepting batches
    WorkerClosed,

    /// A previous save has not reported back yet
    InFlight,
}

impl ErrorCode for PersistenceError {
    fn code(&self) -> i32 {
        match self {
            PersistenceError::NothingToSave => PersistenceErrorCodes::NOTHING_TO_SAVE,
            PersistenceError::WriteFailed { .. } => PersistenceErrorCodes::WRITE_FAILED,
            PersistenceError::Serialization { .. } => PersistenceErrorCodes::SERIALIZATION,
            PersistenceError::WorkerClosed => PersistenceErrorCodes::WORKER_CLOSED,
            PersistenceError::InFlight => PersistenceErrorCodes::IN_FLIGHT,
        }
    }

    fn message(&self) -> String {
        match self {
            PersistenceError::NothingToSave => "No results to save".to_string(),
            PersistenceError::WriteFailed { reason } => format!("Write failed: {}", reason),
            PersistenceError::Serialization { reason } => {
                format!("Failed to serialize results: {}", reason)
            }
            PersistenceError::WorkerClosed => "Persistence worker closed".to_string(),
            PersistenceError::InFlight => "A save is already in progress".to_string(),
        }
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PersistenceError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PersistenceError {}

/// Convert from std::io::Error to PersistenceError
impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        PersistenceError::WriteFailed {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization {
            reason: err.to_string(),
        }
    }
}

/// Errors raised by settings stores
///
/// Error code range: 5001-5002
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsError {
    /// Settings file could not be read or written
    Io { details: String },

    /// Settings file is not valid JSON
    Parse { details: String },
}

impl ErrorCode for SettingsError {
    fn code(&self) -> i32 {
        match self {
            SettingsError::Io { .. } => SettingsErrorCodes::IO,
            SettingsError::Parse { .. } => SettingsErrorCodes::PARSE,
        }
    }

    fn message(&self) -> String {
        match self {
            SettingsError::Io { details } => format!("Settings I/O error: {}", details),
            SettingsError::Parse { details } => format!("Settings parse error: {}", details),
        }
    }
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SettingsError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SettingsError {}

impl From<std::io::Error> for SettingsError {
    fn from(err: std::io::Error) -> Self {
        SettingsError::Io {
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(err: serde_json::Error) -> Self {
        SettingsError::Parse {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_codes() {
        assert_eq!(PersistenceError::NothingToSave.code(), 4001);
        assert_eq!(
            PersistenceError::WriteFailed {
                reason: "offline".to_string()
            }
            .code(),
            4002
        );
        assert_eq!(
            PersistenceError::Serialization {
                reason: "bad".to_string()
            }
            .code(),
            4003
        );
        assert_eq!(PersistenceError::WorkerClosed.code(), 4004);
        assert_eq!(PersistenceError::InFlight.code(), 4005);
    }

    #[test]
    fn test_code_tables_match_variants() {
        assert_eq!(
            PersistenceError::NothingToSave.code(),
            PersistenceErrorCodes::NOTHING_TO_SAVE
        );
        assert_eq!(
            PersistenceError::WorkerClosed.code(),
            PersistenceErrorCodes::WORKER_CLOSED
        );
        assert_eq!(
            PersistenceError::InFlight.code(),
            PersistenceErrorCodes::IN_FLIGHT
        );
        assert_eq!(
            SettingsError::Io {
                details: "denied".to_string()
            }
            .code(),
            SettingsErrorCodes::IO
        );
        assert_eq!(
            SettingsError::Parse {
                details: "eof".to_string()
            }
            .code(),
            SettingsErrorCodes::PARSE
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: PersistenceError = io_err.into();

        match err {
            PersistenceError::WriteFailed { reason } => assert!(reason.contains("read-only")),
            other => panic!("Expected WriteFailed variant, got {:?}", other),
        }

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SettingsError = io_err.into();
        assert_eq!(err.code(), 5001);
    }

    #[test]
    fn test_settings_parse_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: SettingsError = parse_err.into();
        assert_eq!(err.code(), 5002);
        assert!(format!("{}", err).contains("SettingsError"));
    }
}
