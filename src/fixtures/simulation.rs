//! Seeded ride generator.
//!
//! Produces raw sensor samples with a known set of wheelies so the detector
//! can be exercised end to end without a device. Idle stretches stay well
//! below the threshold and wheelie stretches stay well above it, so every
//! planned wheelie yields exactly one record.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::f64::consts::PI;

use crate::analysis::Sample;
use crate::config::DetectionConfig;

use super::TraceFile;

/// Margin (degrees) kept between generated angles and the threshold.
const THRESHOLD_MARGIN: f64 = 2.0;

/// Wheelie the generator placed in the ride.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedWheelie {
    pub started_at_ms: u64,
    /// Timestamp of the first idle sample after the wheelie
    pub ended_at_ms: u64,
    pub peak_angle: f64,
}

impl PlannedWheelie {
    pub fn duration_secs(&self) -> f64 {
        (self.ended_at_ms - self.started_at_ms) as f64 / 1000.0
    }
}

/// Generated ride: raw samples plus the wheelies hidden in them.
#[derive(Debug, Clone, Serialize)]
pub struct SimulatedRide {
    pub seed: u64,
    /// Resting tilt added to every raw sample
    pub mount_offset: f64,
    pub samples: Vec<Sample>,
    pub wheelies: Vec<PlannedWheelie>,
}

impl SimulatedRide {
    /// Trace that replays this ride with the mount offset calibrated out.
    pub fn to_trace(&self, detection: &DetectionConfig) -> TraceFile {
        TraceFile {
            notes: Some(format!("simulated ride, seed {}", self.seed)),
            offset: self.mount_offset,
            detection: Some(detection.clone()),
            samples: self.samples.clone(),
        }
    }
}

/// Deterministic ride generator.
pub struct RideSimulator {
    seed: u64,
    rng: StdRng,
    detection: DetectionConfig,
    interval_ms: u64,
    mount_offset: f64,
}

impl RideSimulator {
    pub fn new(seed: u64, detection: DetectionConfig) -> Self {
        let interval_ms = detection.update_interval_ms.max(1);
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
            detection,
            interval_ms,
            mount_offset: 0.0,
        }
    }

    /// Resting tilt of the mounted device, added to every raw sample.
    pub fn with_mount_offset(mut self, offset: f64) -> Self {
        if offset.is_finite() {
            self.mount_offset = offset.abs();
        }
        self
    }

    /// Generate a ride containing `wheelies` events.
    pub fn generate(&mut self, wheelies: usize) -> SimulatedRide {
        let threshold = self.detection.wheelie_threshold;
        let mut samples = Vec::new();
        let mut planned = Vec::with_capacity(wheelies);
        let mut now_ms = 0u64;

        // Idle gap must outlast the re-arm window so the next wheelie counts
        let re_arm_ms = (self.detection.re_arm_delay_secs * 1000.0).ceil() as u64;
        let min_idle = (re_arm_ms / self.interval_ms + 2).max(5) as usize;

        self.push_idle(&mut samples, &mut now_ms, min_idle);

        for _ in 0..wheelies {
            let length = self.rng.gen_range(5..40usize);
            let peak = threshold + THRESHOLD_MARGIN + self.rng.gen_range(5.0..35.0);
            let started_at_ms = now_ms;

            for i in 0..length {
                let shape = (PI * (i as f64 + 0.5) / length as f64).sin();
                let floor = threshold + THRESHOLD_MARGIN;
                let calibrated = floor + (peak - floor) * shape;
                self.push_sample(&mut samples, &mut now_ms, calibrated);
            }

            let ended_at_ms = now_ms;
            let peak_angle = samples[samples.len() - length..]
                .iter()
                .map(|sample| (sample.angle.abs() - self.mount_offset).abs())
                .fold(f64::MIN, f64::max);
            planned.push(PlannedWheelie {
                started_at_ms,
                ended_at_ms,
                peak_angle,
            });

            let idle = self.rng.gen_range(min_idle..min_idle + 20);
            self.push_idle(&mut samples, &mut now_ms, idle);
        }

        SimulatedRide {
            seed: self.seed,
            mount_offset: self.mount_offset,
            samples,
            wheelies: planned,
        }
    }

    fn push_idle(&mut self, samples: &mut Vec<Sample>, now_ms: &mut u64, count: usize) {
        let ceiling = (self.detection.wheelie_threshold - THRESHOLD_MARGIN).max(0.0) / 2.0;
        for _ in 0..count {
            let calibrated = if ceiling > 0.0 {
                self.rng.gen_range(0.0..ceiling)
            } else {
                0.0
            };
            self.push_sample(samples, now_ms, calibrated);
        }
    }

    /// Record a calibrated angle as a raw reading with a random sign.
    fn push_sample(&mut self, samples: &mut Vec<Sample>, now_ms: &mut u64, calibrated: f64) {
        let magnitude = calibrated + self.mount_offset;
        let raw = if self.rng.gen_bool(0.5) {
            magnitude
        } else {
            -magnitude
        };
        samples.push(Sample::new(raw, *now_ms));
        *now_ms += self.interval_ms;
    }
}
