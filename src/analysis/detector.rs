use crate::config::DetectionConfig;
use crate::session::{EventRecord, SessionId};

use super::zone::AngleZone;

/// Largest calibrated angle accepted as a real reading (degrees)
pub const MAX_VALID_ANGLE: f64 = 360.0;

/// Whether a calibrated angle is a usable reading
pub fn is_valid_angle(angle: f64) -> bool {
    angle.is_finite() && (0.0..=MAX_VALID_ANGLE).contains(&angle)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    InEvent,
}

/// Live state of the detector
///
/// Accumulators are only meaningful while `phase == InEvent`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectorState {
    pub phase: Phase,
    pub started_at_ms: u64,
    pub max_angle: f64,
    pub sum: f64,
    pub count: u32,
}

/// What a single sample did to the detector
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Sample arrived inside the re-arm window and was dropped
    CoolingDown,
    /// Below threshold with no event in progress
    StayedIdle,
    /// First qualifying sample of a new event
    Started,
    /// Qualifying sample extending the current event
    Continued,
    /// First sub-threshold sample after an event
    Ended(EventRecord),
}

/// Threshold-crossing wheelie detector
///
/// Events start at the first sample `>= wheelie_threshold` and end at the
/// first sample below it; that sample's timestamp is the event end. Invalid
/// samples (NaN, infinite, outside `[0, 360]`) count as below threshold.
#[derive(Debug)]
pub struct EventDetector {
    wheelie_threshold: f64,
    danger_threshold: f64,
    re_arm_delay_ms: u64,
    state: DetectorState,
    last_end_ms: Option<u64>,
    rejected_samples: u64,
}

impl EventDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        let re_arm_delay_ms = if config.re_arm_delay_secs.is_finite() && config.re_arm_delay_secs > 0.0
        {
            (config.re_arm_delay_secs * 1000.0).round() as u64
        } else {
            0
        };

        Self {
            wheelie_threshold: config.wheelie_threshold,
            danger_threshold: config.danger_threshold,
            re_arm_delay_ms,
            state: DetectorState::default(),
            last_end_ms: None,
            rejected_samples: 0,
        }
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn is_in_event(&self) -> bool {
        self.state.phase == Phase::InEvent
    }

    /// Number of invalid samples seen since construction
    pub fn rejected_samples(&self) -> u64 {
        self.rejected_samples
    }

    /// Display classification of a calibrated angle
    pub fn classify(&self, angle: f64) -> AngleZone {
        AngleZone::classify(angle, self.wheelie_threshold, self.danger_threshold)
    }

    /// Seconds elapsed in the current event at `now_ms`, if one is running
    pub fn live_duration_secs(&self, now_ms: u64) -> Option<f64> {
        match self.state.phase {
            Phase::InEvent => Some(now_ms.saturating_sub(self.state.started_at_ms) as f64 / 1000.0),
            Phase::Idle => None,
        }
    }

    /// Discard any in-progress event and the re-arm window
    ///
    /// No record is emitted for a discarded event.
    pub fn reset(&mut self) {
        if self.is_in_event() {
            log::debug!(
                "[Detector] Discarding in-progress event started at {} ms ({} samples)",
                self.state.started_at_ms,
                self.state.count
            );
        }
        self.state = DetectorState::default();
        self.last_end_ms = None;
    }

    /// Feed one calibrated sample
    pub fn process(&mut self, angle: f64, timestamp_ms: u64, session_id: SessionId) -> Transition {
        if self.in_cooldown(timestamp_ms) {
            return Transition::CoolingDown;
        }

        let qualifies = if is_valid_angle(angle) {
            angle >= self.wheelie_threshold
        } else {
            self.rejected_samples += 1;
            false
        };

        match (self.state.phase, qualifies) {
            (Phase::Idle, false) => Transition::StayedIdle,
            (Phase::Idle, true) => {
                self.state = DetectorState {
                    phase: Phase::InEvent,
                    started_at_ms: timestamp_ms,
                    max_angle: angle,
                    sum: angle,
                    count: 1,
                };
                Transition::Started
            }
            (Phase::InEvent, true) => {
                self.state.max_angle = self.state.max_angle.max(angle);
                self.state.sum += angle;
                self.state.count += 1;
                Transition::Continued
            }
            (Phase::InEvent, false) => {
                let finished = std::mem::take(&mut self.state);
                self.last_end_ms = Some(timestamp_ms);
                Transition::Ended(EventRecord::new(
                    finished.started_at_ms,
                    timestamp_ms,
                    finished.max_angle,
                    finished.sum,
                    finished.count,
                    session_id,
                ))
            }
        }
    }

    fn in_cooldown(&self, timestamp_ms: u64) -> bool {
        match self.last_end_ms {
            Some(end) if self.re_arm_delay_ms > 0 => {
                timestamp_ms.saturating_sub(end) < self.re_arm_delay_ms
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(re_arm_delay_secs: f64) -> EventDetector {
        EventDetector::new(&DetectionConfig {
            wheelie_threshold: 20.0,
            danger_threshold: 45.0,
            re_arm_delay_secs,
            ..DetectionConfig::default()
        })
    }

    fn run(detector: &mut EventDetector, samples: &[(f64, u64)]) -> Vec<EventRecord> {
        let session = SessionId::new();
        samples
            .iter()
            .filter_map(|&(angle, t)| match detector.process(angle, t, session) {
                Transition::Ended(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_reference_scenario() {
        let mut detector = detector(0.0);
        let records = run(
            &mut detector,
            &[(5.0, 0), (25.0, 1_000), (30.0, 2_000), (28.0, 3_000), (10.0, 4_000)],
        );

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.max_angle, 30.0);
        assert!((record.average_angle - 27.67).abs() < 0.01);
        assert_eq!(record.duration_secs, 3.0);
        assert_eq!(record.started_at_ms, 1_000);
        assert_eq!(record.ended_at_ms, 4_000);
        assert_eq!(record.sample_count, 3);
        assert_eq!(detector.state().phase, Phase::Idle);
    }

    #[test]
    fn test_single_sample_event() {
        let mut detector = detector(0.0);
        let records = run(&mut detector, &[(22.0, 500), (3.0, 500)]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].max_angle, 22.0);
        assert_eq!(records[0].average_angle, 22.0);
        assert_eq!(records[0].duration_secs, 0.0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut detector = detector(0.0);
        let session = SessionId::new();
        assert_eq!(detector.process(20.0, 0, session), Transition::Started);
        assert_eq!(detector.process(20.0, 50, session), Transition::Continued);
        assert!(matches!(
            detector.process(19.999, 100, session),
            Transition::Ended(_)
        ));
        assert!(!detector.is_in_event());
        assert_eq!(detector.process(0.0, 200, session), Transition::StayedIdle);
    }

    #[test]
    fn test_open_event_emits_nothing() {
        let mut detector = detector(0.0);
        let records = run(&mut detector, &[(25.0, 0), (30.0, 100), (35.0, 200)]);
        assert!(records.is_empty());
        assert!(detector.is_in_event());
        assert_eq!(detector.live_duration_secs(700), Some(0.7));
    }

    #[test]
    fn test_one_record_per_run() {
        let mut detector = detector(0.0);
        let samples: Vec<(f64, u64)> = [0.0, 21.0, 25.0, 1.0, 2.0, 30.0, 1.0, 40.0, 41.0, 42.0, 0.0]
            .iter()
            .enumerate()
            .map(|(i, &a)| (a, i as u64 * 100))
            .collect();
        let records = run(&mut detector, &samples);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].max_angle, 25.0);
        assert_eq!(records[1].max_angle, 30.0);
        assert_eq!(records[2].max_angle, 42.0);
        assert!((records[2].average_angle - 41.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_within_run_bounds() {
        let mut detector = detector(0.0);
        let run_values = [20.5, 33.0, 27.25, 48.0, 21.0];
        let mut samples: Vec<(f64, u64)> = run_values
            .iter()
            .enumerate()
            .map(|(i, &a)| (a, i as u64 * 50))
            .collect();
        samples.push((0.0, 1_000));

        let records = run(&mut detector, &samples);
        let record = &records[0];
        assert_eq!(record.max_angle, 48.0);
        assert!(record.average_angle >= 20.5 && record.average_angle <= 48.0);
    }

    #[test]
    fn test_nan_closes_event() {
        let mut detector = detector(0.0);
        let records = run(&mut detector, &[(25.0, 0), (26.0, 100), (f64::NAN, 200)]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ended_at_ms, 200);
        assert_eq!(detector.rejected_samples(), 1);
    }

    #[test]
    fn test_out_of_range_is_below_threshold() {
        let mut detector = detector(0.0);
        let session = SessionId::new();
        assert_eq!(detector.process(400.0, 0, session), Transition::StayedIdle);
        assert_eq!(
            detector.process(f64::INFINITY, 10, session),
            Transition::StayedIdle
        );
        assert_eq!(detector.rejected_samples(), 2);
    }

    #[test]
    fn test_reset_discards_in_progress_event() {
        let mut detector = detector(0.0);
        let session = SessionId::new();
        detector.process(30.0, 0, session);
        detector.process(35.0, 100, session);
        assert!(detector.is_in_event());

        detector.reset();
        assert_eq!(*detector.state(), DetectorState::default());

        // The next sub-threshold sample must not produce a record
        assert_eq!(detector.process(5.0, 200, session), Transition::StayedIdle);
    }

    #[test]
    fn test_re_arm_delay() {
        let mut detector = detector(1.0);
        let session = SessionId::new();
        detector.process(25.0, 4_000, session);
        assert!(matches!(
            detector.process(5.0, 5_000, session),
            Transition::Ended(_)
        ));

        assert_eq!(detector.process(30.0, 5_500, session), Transition::CoolingDown);
        assert!(!detector.is_in_event());

        assert_eq!(detector.process(30.0, 6_100, session), Transition::Started);
    }

    #[test]
    fn test_re_arm_window_boundary() {
        let mut detector = detector(1.0);
        let session = SessionId::new();
        detector.process(25.0, 0, session);
        detector.process(5.0, 1_000, session);
        assert_eq!(detector.process(25.0, 1_999, session), Transition::CoolingDown);
        assert_eq!(detector.process(25.0, 2_000, session), Transition::Started);
    }

    #[test]
    fn test_reset_clears_cooldown() {
        let mut detector = detector(1.0);
        let session = SessionId::new();
        detector.process(25.0, 0, session);
        detector.process(5.0, 100, session);
        detector.reset();
        assert_eq!(detector.process(25.0, 200, session), Transition::Started);
    }

    #[test]
    fn test_classify_uses_danger_threshold() {
        let detector = detector(0.0);
        assert_eq!(detector.classify(10.0), AngleZone::Idle);
        assert_eq!(detector.classify(30.0), AngleZone::Active);
        assert_eq!(detector.classify(50.0), AngleZone::Danger);
    }
}
