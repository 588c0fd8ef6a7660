//! Session data: finished event records and the per-session history.
//!
//! Records are immutable once built. The history keeps them most-recent-first
//! and tracks how many of the newest records have not been persisted yet.

use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier shared by every record of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Fresh random (v4) identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex characters, for status lines
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Summary of one completed wheelie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Seconds from the first qualifying sample to the first sub-threshold sample
    pub duration_secs: f64,
    /// Highest calibrated angle seen during the event (degrees)
    pub max_angle: f64,
    /// Mean of all calibrated in-event samples (degrees)
    pub average_angle: f64,
    /// Number of in-event samples
    pub sample_count: u32,
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    /// Local wall-clock time of the event end, `HH:MM:SS`
    pub time_label: String,
    pub session_id: SessionId,
}

impl EventRecord {
    pub(crate) fn new(
        started_at_ms: u64,
        ended_at_ms: u64,
        max_angle: f64,
        sum: f64,
        sample_count: u32,
        session_id: SessionId,
    ) -> Self {
        let duration_secs = ended_at_ms.saturating_sub(started_at_ms) as f64 / 1000.0;
        let average_angle = if sample_count == 0 {
            max_angle
        } else {
            sum / sample_count as f64
        };

        Self {
            duration_secs,
            max_angle,
            average_angle,
            sample_count,
            started_at_ms,
            ended_at_ms,
            time_label: time_label(ended_at_ms),
            session_id,
        }
    }

    /// One-line summary, e.g. `12:03:44: 2.35s (31.0°)`
    pub fn summary(&self) -> String {
        format!(
            "{}: {:.2}s ({:.1}°)",
            self.time_label, self.duration_secs, self.max_angle
        )
    }
}

fn time_label(timestamp_ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms as i64)
        .map(|utc| utc.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

/// Ordered event records of the current session, newest first
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    records: Vec<EventRecord>,
    unsaved: usize,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a finished record; it counts as unsaved
    pub fn push(&mut self, record: EventRecord) {
        self.records.insert(0, record);
        self.unsaved += 1;
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn latest(&self) -> Option<&EventRecord> {
        self.records.first()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_unsaved(&self) -> bool {
        self.unsaved > 0
    }

    /// Records not yet persisted, newest first
    pub fn unsaved(&self) -> &[EventRecord] {
        &self.records[..self.unsaved]
    }

    /// Mark the `count` oldest unsaved records as persisted
    ///
    /// Records pushed while a write was in flight stay unsaved. Records remain
    /// in the history for display.
    pub fn confirm_saved(&mut self, count: usize) {
        self.unsaved = self.unsaved.saturating_sub(count);
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.unsaved = 0;
    }
}
