// Wheelie Meter Core
// Calibrated wheelie detection, session history and result persistence

// Module declarations
pub mod analysis;
pub mod calibration;
pub mod config;
pub mod context;
pub mod error;
pub mod fixtures;
pub mod managers;
pub mod persistence;
pub mod session;
pub mod telemetry;

// Re-exports for convenience
pub use analysis::{AngleZone, GaugeCurve, Reading, Sample};
pub use config::AppConfig;
pub use context::{MeterContext, SampleOutcome};
pub use session::{EventRecord, SessionHistory, SessionId};

/// Install a `tracing` subscriber for binaries and harnesses
///
/// `log` records from the error helpers are forwarded through the same
/// subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
