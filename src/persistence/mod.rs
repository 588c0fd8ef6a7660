//! Persistence of finished session results.
//!
//! The core never performs writes itself: the orchestrator hands a
//! [`SaveBatch`] to a [`PersistenceSink`] (directly or through the
//! background [`PersistenceWorker`]) and confirms the records only after the
//! sink reports success.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::session::{EventRecord, SessionId};

pub mod worker;

pub use worker::{PersistenceWorker, SaveOutcome};

/// Longest device label stored with a row
pub const MAX_DEVICE_LEN: usize = 100;

/// One row of the results table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub nickname: String,
    /// Maximum angle, rounded to 0.1°
    pub angle: f64,
    /// Average angle, rounded to 0.1°
    pub average_angle: f64,
    /// Duration in seconds, rounded to 0.01 s
    pub duration: f64,
    /// RFC 3339 creation time
    pub created_at: String,
    pub device: String,
    pub session_id: SessionId,
}

impl ResultEntry {
    pub fn from_record(record: &EventRecord, nickname: &str, device: &str, created_at: &str) -> Self {
        Self {
            nickname: nickname.to_string(),
            angle: round_to(record.max_angle, 1),
            average_angle: round_to(record.average_angle, 1),
            duration: round_to(record.duration_secs, 2),
            created_at: created_at.to_string(),
            device: device.chars().take(MAX_DEVICE_LEN).collect(),
            session_id: record.session_id,
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Rows ready to be written, plus how many history records they cover
#[derive(Debug, Clone)]
pub struct SaveBatch {
    pub table: String,
    pub session_id: SessionId,
    pub entries: Vec<ResultEntry>,
}

impl SaveBatch {
    /// Build rows from unsaved records (newest first, as held by the history)
    pub fn from_records(
        records: &[EventRecord],
        nickname: &str,
        device: &str,
        table: &str,
        session_id: SessionId,
    ) -> Self {
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        Self {
            table: table.to_string(),
            session_id,
            entries: records
                .iter()
                .map(|record| ResultEntry::from_record(record, nickname, device, &created_at))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Destination for result rows (remote table, file, test double)
pub trait PersistenceSink: Send + Sync {
    /// Append rows to `table`, returning how many were written
    fn append(&self, table: &str, entries: &[ResultEntry]) -> Result<usize, PersistenceError>;
}

/// In-memory sink; can be switched into a failing mode for tests
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Mutex<Vec<(String, ResultEntry)>>,
    fail_with: Mutex<Option<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail with `reason` (or succeed again with `None`)
    pub fn set_failure(&self, reason: Option<&str>) {
        if let Ok(mut guard) = self.fail_with.lock() {
            *guard = reason.map(str::to_string);
        }
    }

    pub fn rows(&self) -> Vec<ResultEntry> {
        self.rows
            .lock()
            .map(|rows| rows.iter().map(|(_, entry)| entry.clone()).collect())
            .unwrap_or_default()
    }
}

impl PersistenceSink for MemorySink {
    fn append(&self, table: &str, entries: &[ResultEntry]) -> Result<usize, PersistenceError> {
        let failure = self
            .fail_with
            .lock()
            .map_err(|_| PersistenceError::WriteFailed {
                reason: "sink lock poisoned".to_string(),
            })?
            .clone();
        if let Some(reason) = failure {
            return Err(PersistenceError::WriteFailed { reason });
        }

        let mut rows = self.rows.lock().map_err(|_| PersistenceError::WriteFailed {
            reason: "sink lock poisoned".to_string(),
        })?;
        rows.extend(entries.iter().map(|entry| (table.to_string(), entry.clone())));
        Ok(entries.len())
    }
}

/// Appends one JSON object per row to a file
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    table: &'a str,
    #[serde(flatten)]
    entry: &'a ResultEntry,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistenceSink for JsonLinesSink {
    fn append(&self, table: &str, entries: &[ResultEntry]) -> Result<usize, PersistenceError> {
        // Serialize everything first so a bad row never leaves a partial batch
        let mut buffer = String::new();
        for entry in entries {
            buffer.push_str(&serde_json::to_string(&JsonLine { table, entry })?);
            buffer.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(buffer.as_bytes())?;
        file.flush()?;

        log::info!(
            "[Persistence] Appended {} rows to {:?} (table {})",
            entries.len(),
            self.path,
            table
        );
        Ok(entries.len())
    }
}
