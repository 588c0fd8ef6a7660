// Calibrator - static offset correction for raw tilt readings
//
// The offset zeroes out the resting-position tilt of the mounted device.
// Raw readings and the offset can each be negative depending on how the
// device is held, so both are reduced to magnitudes before differencing.

use crate::error::MeasurementError;

/// Holds the calibration offset applied to every raw sample
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Calibrator {
    offset: f64,
}

impl Calibrator {
    /// Create a calibrator with an explicit offset (e.g. restored from settings)
    pub fn with_offset(offset: f64) -> Self {
        Self { offset }
    }

    /// Current offset in degrees
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Store a new offset
    ///
    /// # Errors
    /// `InvalidOperation` while a measurement is running; the offset is left
    /// unchanged in that case.
    pub fn set_offset(&mut self, value: f64, is_measuring: bool) -> Result<(), MeasurementError> {
        if is_measuring {
            return Err(MeasurementError::calibration_while_measuring());
        }
        if !value.is_finite() {
            return Err(MeasurementError::InvalidInput { value });
        }

        log::info!(
            "[Calibration] Offset changed from {:.1} to {:.1}",
            self.offset,
            value
        );
        self.offset = value;
        Ok(())
    }

    /// Apply the offset: `abs(abs(raw) - offset)`
    ///
    /// Never fails. Non-finite input produces a non-finite output, which the
    /// detector treats as below threshold.
    pub fn apply(&self, raw_angle: f64) -> f64 {
        (raw_angle.abs() - self.offset).abs()
    }
}
