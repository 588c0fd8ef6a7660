// MeterContext: owner of all measurement state
//
// One Calibrator, one EventDetector and one SessionHistory live here and are
// only reachable through `&mut self`, so the sample path has a single writer
// without any locking. Display consumers subscribe to broadcast channels and
// persistence happens through a sink or the background worker.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::analysis::{is_valid_angle, EventDetector, Reading, Transition};
use crate::calibration::{Calibrator, SettingsStore, ThemePreference};
use crate::config::AppConfig;
use crate::error::{
    log_measurement_error, log_persistence_error, MeasurementError, PersistenceError,
};
use crate::managers::{BroadcastChannelManager, ReadingStream, RecordStream};
use crate::persistence::{PersistenceSink, PersistenceWorker, SaveBatch, SaveOutcome};
use crate::session::{EventRecord, SessionHistory, SessionId};
use crate::telemetry::{self, DiagnosticError, LifecyclePhase};

/// What one sample produced while measuring
#[derive(Debug, Clone, PartialEq)]
pub struct SampleOutcome {
    pub reading: Reading,
    /// Set when this sample closed an event
    pub record: Option<EventRecord>,
    /// Sample fell inside the re-arm window and was not evaluated
    pub cooling_down: bool,
}

/// Measurement orchestrator
///
/// Lifecycle:
/// 1. `start_measurement` (nickname required the first time)
/// 2. `on_sample` for every sensor notification
/// 3. `save_session` / `submit_save` to persist unsaved records
/// 4. `reset_session` to discard everything and begin a new session
pub struct MeterContext {
    config: AppConfig,
    calibrator: Calibrator,
    detector: EventDetector,
    history: SessionHistory,
    session_id: SessionId,
    settings: Arc<dyn SettingsStore>,
    broadcasts: BroadcastChannelManager,
    nickname: Option<String>,
    is_measuring: bool,
    is_session_active: bool,
    last_raw_angle: Option<f64>,
    save_in_flight: Option<SessionId>,
}

impl MeterContext {
    /// Create a context, restoring the calibration offset from `settings`
    pub fn new(config: AppConfig, settings: Arc<dyn SettingsStore>) -> Self {
        let calibrator = match settings.load_offset() {
            Some(offset) => {
                info!(offset, "restored calibration offset");
                Calibrator::with_offset(offset)
            }
            None => Calibrator::default(),
        };
        let detector = EventDetector::new(&config.detection);

        Self {
            config,
            calibrator,
            detector,
            history: SessionHistory::new(),
            session_id: SessionId::new(),
            settings,
            broadcasts: BroadcastChannelManager::new(),
            nickname: None,
            is_measuring: false,
            is_session_active: false,
            last_raw_angle: None,
            save_in_flight: None,
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_measuring(&self) -> bool {
        self.is_measuring
    }

    pub fn is_session_active(&self) -> bool {
        self.is_session_active
    }

    pub fn is_in_event(&self) -> bool {
        self.detector.is_in_event()
    }

    pub fn detector(&self) -> &EventDetector {
        &self.detector
    }

    pub fn calibration_offset(&self) -> f64 {
        self.calibrator.offset()
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn has_unsaved(&self) -> bool {
        self.history.has_unsaved()
    }

    pub fn subscribe_readings(&self) -> tokio::sync::broadcast::Receiver<Reading> {
        self.broadcasts.subscribe_readings()
    }

    pub fn subscribe_records(&self) -> tokio::sync::broadcast::Receiver<EventRecord> {
        self.broadcasts.subscribe_records()
    }

    pub fn record_stream(&self) -> RecordStream {
        self.broadcasts.record_stream()
    }

    pub fn reading_stream(&self) -> ReadingStream {
        self.broadcasts.reading_stream()
    }

    // ========================================================================
    // MEASUREMENT LIFECYCLE
    // ========================================================================

    /// Begin measuring
    ///
    /// A nickname must be supplied the first time; a later `Some` replaces it.
    ///
    /// # Errors
    /// - `AlreadyMeasuring` if a measurement is running
    /// - `InvalidNickname` if no valid nickname is known
    pub fn start_measurement(&mut self, nickname: Option<&str>) -> Result<(), MeasurementError> {
        if self.is_measuring {
            let err = MeasurementError::AlreadyMeasuring;
            log_measurement_error(&err, "start_measurement");
            return Err(err);
        }

        match nickname {
            Some(candidate) => {
                let valid = self.validate_nickname(candidate).inspect_err(|err| {
                    log_measurement_error(err, "start_measurement");
                })?;
                self.nickname = Some(valid);
            }
            None if self.nickname.is_none() => {
                let err = self.nickname_error();
                log_measurement_error(&err, "start_measurement");
                return Err(err);
            }
            None => {}
        }

        self.is_session_active = true;
        self.is_measuring = true;
        info!(session = %self.session_id, "measurement started, waiting for wheelie");
        telemetry::hub().record_lifecycle(LifecyclePhase::MeasurementStarted);
        Ok(())
    }

    /// Stop measuring; an event still in progress is discarded without a record
    pub fn stop_measurement(&mut self) -> Result<(), MeasurementError> {
        if !self.is_measuring {
            return Err(MeasurementError::NotMeasuring);
        }

        self.detector.reset();
        self.is_measuring = false;
        info!(session = %self.session_id, "measurement stopped");
        telemetry::hub().record_lifecycle(LifecyclePhase::MeasurementStopped);
        Ok(())
    }

    /// Discard the session: stop measuring, drop any in-progress event and all
    /// records, and start a fresh session id
    pub fn reset_session(&mut self) {
        let discarded = self.history.len();
        self.detector.reset();
        self.history.clear();
        self.is_measuring = false;
        self.is_session_active = false;
        self.save_in_flight = None;
        self.session_id = SessionId::new();

        info!(
            discarded,
            session = %self.session_id,
            "session reset"
        );
        telemetry::hub().record_lifecycle(LifecyclePhase::SessionReset);
    }

    /// Handle one sensor notification
    ///
    /// The raw magnitude is remembered for `calibrate` even while idle; the
    /// detector only runs while measuring.
    pub fn on_sample(&mut self, raw_angle: f64, timestamp_ms: u64) -> Option<SampleOutcome> {
        if raw_angle.is_finite() {
            self.last_raw_angle = Some(raw_angle.abs());
        }

        if !self.is_measuring {
            return None;
        }

        let angle = self.calibrator.apply(raw_angle);
        let transition = self
            .detector
            .process(angle, timestamp_ms, self.session_id);

        let cooling_down = matches!(transition, Transition::CoolingDown);
        // Samples skipped by the re-arm window were never evaluated
        if !cooling_down && !is_valid_angle(angle) {
            debug!(raw_angle, angle, "invalid sample treated as below threshold");
            telemetry::hub().record_error(
                DiagnosticError::InvalidSample,
                format!("raw={} calibrated={}", raw_angle, angle),
            );
        }
        let record = match transition {
            Transition::Ended(record) => {
                self.finish_event(&record);
                Some(record)
            }
            Transition::Started => {
                debug!(angle, timestamp_ms, "wheelie started");
                None
            }
            _ => None,
        };

        let reading = Reading {
            angle,
            zone: self.detector.classify(angle),
            gauge_percent: self.config.gauge.curve.fill_percent(angle),
            live_duration_secs: self.detector.live_duration_secs(timestamp_ms),
            timestamp_ms,
        };
        self.broadcasts.publish_reading(reading.clone());

        Some(SampleOutcome {
            reading,
            record,
            cooling_down,
        })
    }

    fn finish_event(&mut self, record: &EventRecord) {
        info!(
            duration_secs = record.duration_secs,
            max_angle = record.max_angle,
            average_angle = record.average_angle,
            "wheelie finished"
        );
        self.history.push(record.clone());
        telemetry::hub().record_event(record);
        self.broadcasts.publish_record(record.clone());
    }

    // ========================================================================
    // CALIBRATION
    // ========================================================================

    /// Zero the meter at the current position (magnitude of the last raw sample)
    ///
    /// # Errors
    /// - `InvalidOperation` while measuring
    /// - `NoReading` if no finite sample has arrived yet
    pub fn calibrate(&mut self) -> Result<f64, MeasurementError> {
        if self.is_measuring {
            let err = MeasurementError::calibration_while_measuring();
            log_measurement_error(&err, "calibrate");
            return Err(err);
        }
        let raw = self.last_raw_angle.ok_or(MeasurementError::NoReading)?;
        self.set_calibration(raw)?;
        Ok(raw)
    }

    /// Set an explicit calibration offset and persist it
    ///
    /// A failing settings store does not undo the in-memory offset; the
    /// failure is logged and reported through telemetry.
    pub fn set_calibration(&mut self, offset: f64) -> Result<(), MeasurementError> {
        self.calibrator
            .set_offset(offset, self.is_measuring)
            .inspect_err(|err| log_measurement_error(err, "set_calibration"))?;

        if let Err(err) = self.settings.save_offset(offset) {
            warn!(%err, "failed to persist calibration offset");
            telemetry::hub().record_error(DiagnosticError::SettingsWrite, err.to_string());
        }
        telemetry::hub().record_calibration(offset);
        Ok(())
    }

    // ========================================================================
    // THEME (cosmetic passthrough)
    // ========================================================================

    pub fn theme(&self) -> ThemePreference {
        self.settings.load_theme()
    }

    /// Flip between light and dark and persist the choice
    pub fn toggle_theme(&self) -> ThemePreference {
        let next = match self.settings.load_theme() {
            ThemePreference::Dark => ThemePreference::Light,
            ThemePreference::Light => ThemePreference::Dark,
        };
        if let Err(err) = self.settings.save_theme(next) {
            warn!(%err, "failed to persist theme preference");
            telemetry::hub().record_error(DiagnosticError::SettingsWrite, err.to_string());
        }
        next
    }

    // ========================================================================
    // PERSISTENCE HOOKS
    // ========================================================================

    /// Rows for every unsaved record, newest first
    pub fn pending_batch(&self) -> Result<SaveBatch, PersistenceError> {
        if !self.history.has_unsaved() {
            return Err(PersistenceError::NothingToSave);
        }

        let nickname = self.nickname.as_deref().unwrap_or_default();
        Ok(SaveBatch::from_records(
            self.history.unsaved(),
            nickname,
            &self.config.persistence.device,
            &self.config.persistence.table,
            self.session_id,
        ))
    }

    /// Mark `count` records as persisted after a confirmed write
    pub fn confirm_saved(&mut self, count: usize) {
        self.history.confirm_saved(count);
    }

    /// Write unsaved records synchronously
    ///
    /// On failure the records stay unsaved for a later retry by the user.
    pub fn save_session(&mut self, sink: &dyn PersistenceSink) -> Result<usize, PersistenceError> {
        if self.save_in_flight.is_some() {
            return Err(PersistenceError::InFlight);
        }
        let batch = self.pending_batch()?;

        match sink.append(&batch.table, &batch.entries) {
            Ok(written) => {
                self.confirm_saved(batch.len());
                info!(
                    written,
                    session = %self.session_id.short(),
                    "session results saved"
                );
                telemetry::hub().record_save_completed(written);
                Ok(written)
            }
            Err(err) => {
                log_persistence_error(&err, "save_session");
                telemetry::hub().record_save_failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Queue unsaved records on the background worker without waiting
    ///
    /// Returns the number of rows queued. Call `apply_save_outcome` when the
    /// worker reports back.
    pub fn submit_save(&mut self, worker: &PersistenceWorker) -> Result<usize, PersistenceError> {
        if self.save_in_flight.is_some() {
            return Err(PersistenceError::InFlight);
        }
        let batch = self.pending_batch()?;
        let queued = batch.len();
        worker.submit(batch)?;
        self.save_in_flight = Some(self.session_id);
        Ok(queued)
    }

    /// Apply a worker outcome; returns `true` if records were confirmed
    ///
    /// Outcomes for a session that has since been reset are ignored.
    pub fn apply_save_outcome(&mut self, outcome: &SaveOutcome) -> bool {
        if outcome.session_id != self.session_id {
            debug!(session = %outcome.session_id, "ignoring save outcome from previous session");
            return false;
        }
        self.save_in_flight = None;

        match &outcome.result {
            Ok(_) => {
                self.confirm_saved(outcome.requested);
                true
            }
            Err(_) => false,
        }
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn nickname_error(&self) -> MeasurementError {
        MeasurementError::InvalidNickname {
            min: self.config.session.nickname_min_len,
            max: self.config.session.nickname_max_len,
        }
    }

    fn validate_nickname(&self, candidate: &str) -> Result<String, MeasurementError> {
        let trimmed = candidate.trim();
        let len = trimmed.chars().count();
        if len < self.config.session.nickname_min_len || len > self.config.session.nickname_max_len
        {
            return Err(self.nickname_error());
        }
        Ok(trimmed.to_string())
    }
}
