//! Trace utilities for the deterministic CLI harness.
//!
//! This module discovers recorded sensor traces, parses optional expectation
//! JSON, and replays the samples through a `MeterContext` so detection can be
//! checked without a device. It is desktop-focused to support CI and QA
//! workflows.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::Sample;
use crate::calibration::MemorySettings;
use crate::config::{AppConfig, DetectionConfig};
use crate::context::MeterContext;
use crate::session::EventRecord;

pub mod simulation;

pub use simulation::{PlannedWheelie, RideSimulator, SimulatedRide};

/// Default location for trace JSON assets.
pub const DEFAULT_TRACE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

/// Nickname used when traces are replayed through a context.
const REPLAY_NICKNAME: &str = "replay";

/// Metadata describing an available trace.
#[derive(Clone, Debug)]
pub struct TraceMetadata {
    pub name: String,
    pub trace_path: PathBuf,
    pub expect_path: Option<PathBuf>,
}

/// On-disk trace schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Calibration offset applied before replay
    #[serde(default)]
    pub offset: f64,
    /// Detection overrides; defaults apply when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection: Option<DetectionConfig>,
    pub samples: Vec<Sample>,
}

/// Loaded trace with optional expectations.
pub struct TraceData {
    pub metadata: TraceMetadata,
    pub trace: TraceFile,
    pub expectations: Option<TraceExpectations>,
}

/// JSON expectation schema for trace verification.
#[derive(Debug, Clone, Deserialize)]
pub struct TraceExpectations {
    pub trace: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub events: Vec<ExpectedEvent>,
}

impl TraceExpectations {
    /// Compare finished records (oldest first) against the expected events.
    pub fn verify(&self, actual: &[EventRecord]) -> std::result::Result<(), ExpectationDiff> {
        let mut failures = Vec::new();

        for (idx, expected) in self.events.iter().enumerate() {
            match actual.get(idx) {
                Some(record) => {
                    let angle_delta = (record.max_angle - expected.max_angle).abs();
                    let duration_delta = (record.duration_secs - expected.duration_secs).abs();
                    let average_off = expected.average_angle.is_some_and(|avg| {
                        (record.average_angle - avg).abs() > expected.tolerance_deg
                    });

                    if angle_delta > expected.tolerance_deg
                        || duration_delta > expected.tolerance_secs
                        || average_off
                    {
                        failures.push(ExpectationFailure {
                            index: idx,
                            expected: Some(expected.clone()),
                            actual: Some(record.clone()),
                            angle_delta: Some(angle_delta),
                            duration_delta: Some(duration_delta),
                        });
                    }
                }
                None => failures.push(ExpectationFailure {
                    index: idx,
                    expected: Some(expected.clone()),
                    actual: None,
                    angle_delta: None,
                    duration_delta: None,
                }),
            }
        }

        for (idx, record) in actual.iter().enumerate().skip(self.events.len()) {
            failures.push(ExpectationFailure {
                index: idx,
                expected: None,
                actual: Some(record.clone()),
                angle_delta: None,
                duration_delta: None,
            });
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExpectationDiff { failures })
        }
    }
}

/// Expected event definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedEvent {
    pub max_angle: f64,
    pub duration_secs: f64,
    #[serde(default)]
    pub average_angle: Option<f64>,
    #[serde(default = "default_tolerance_deg")]
    pub tolerance_deg: f64,
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: f64,
}

fn default_tolerance_deg() -> f64 {
    0.5
}

fn default_tolerance_secs() -> f64 {
    0.05
}

/// Outcome of comparing actual records with expectations.
#[derive(Debug)]
pub struct ExpectationDiff {
    pub failures: Vec<ExpectationFailure>,
}

impl ExpectationDiff {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "failures": self.failures.iter().map(|failure| {
                serde_json::json!({
                    "index": failure.index,
                    "expected": failure.expected,
                    "actual": failure.actual,
                    "angle_delta": failure.angle_delta,
                    "duration_delta": failure.duration_delta,
                })
            }).collect::<Vec<_>>()
        })
    }
}

/// Detailed diff entry for a single failure.
///
/// `expected` is `None` for surplus records, `actual` is `None` for missing ones.
#[derive(Debug)]
pub struct ExpectationFailure {
    pub index: usize,
    pub expected: Option<ExpectedEvent>,
    pub actual: Option<EventRecord>,
    pub angle_delta: Option<f64>,
    pub duration_delta: Option<f64>,
}

/// Catalog responsible for discovering traces on disk.
pub struct TraceCatalog {
    root: PathBuf,
}

impl TraceCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List all traces by their metadata.
    ///
    /// Expectation files (`*.expect.json`) are not traces themselves.
    pub fn discover(&self) -> Result<Vec<TraceMetadata>> {
        let mut traces = Vec::new();
        if !self.root.exists() {
            return Ok(traces);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
            let is_expectation = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(".expect.json"));
            if is_json && !is_expectation {
                traces.push(self.metadata_for_path(&path)?);
            }
        }

        traces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(traces)
    }

    /// Load trace samples + expectations for provided name or path.
    pub fn load(&self, trace: &str, override_expect: Option<PathBuf>) -> Result<TraceData> {
        let trace_path = self.resolve_trace_path(trace)?;
        let metadata = self.metadata_for_path(&trace_path)?;

        let json = fs::read_to_string(&trace_path)
            .with_context(|| format!("reading trace {}", trace_path.display()))?;
        let trace: TraceFile = serde_json::from_str(&json)
            .with_context(|| format!("parsing {}", trace_path.display()))?;

        let expectation_path = override_expect.or(metadata.expect_path.clone());
        let expectations = match expectation_path {
            Some(path) => {
                let json = fs::read_to_string(&path)
                    .with_context(|| format!("reading expectation {}", path.display()))?;
                Some(
                    serde_json::from_str(&json)
                        .with_context(|| format!("parsing {}", path.display()))?,
                )
            }
            None => None,
        };

        Ok(TraceData {
            metadata,
            trace,
            expectations,
        })
    }

    fn resolve_trace_path(&self, trace: &str) -> Result<PathBuf> {
        let as_path = Path::new(trace);
        if as_path.is_file() {
            return Ok(as_path.to_path_buf());
        }

        let candidate = self.root.join(format!("{trace}.json"));
        if candidate.exists() {
            Ok(candidate)
        } else {
            Err(anyhow!(
                "Trace '{trace}' not found in {}",
                self.root.display()
            ))
        }
    }

    fn metadata_for_path(&self, trace_path: &Path) -> Result<TraceMetadata> {
        let name = trace_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("Invalid trace name for {}", trace_path.display()))?
            .to_string();
        let expect_path = trace_path.with_extension("expect.json");
        Ok(TraceMetadata {
            name,
            trace_path: trace_path.to_path_buf(),
            expect_path: expect_path.exists().then_some(expect_path),
        })
    }
}

impl Default for TraceCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_ROOT)
    }
}

/// Summary of one replay.
#[derive(Debug, Clone, Serialize)]
pub struct TraceRun {
    /// Finished records, oldest first
    pub records: Vec<EventRecord>,
    pub samples_processed: usize,
    pub cooling_down_samples: usize,
    pub rejected_samples: u64,
    /// True when the trace ended in the middle of an event
    pub open_event: bool,
}

/// Replays traces through a fresh `MeterContext`.
pub struct TraceProcessor {
    config: AppConfig,
}

impl TraceProcessor {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, trace: &TraceFile) -> Result<TraceRun> {
        let mut config = self.config.clone();
        if let Some(detection) = &trace.detection {
            config.detection = detection.clone();
        }
        let config = config.sanitized();

        let mut context = MeterContext::new(config, Arc::new(MemorySettings::new()));
        context
            .set_calibration(trace.offset)
            .map_err(|err| anyhow!("applying trace offset: {err}"))?;
        context
            .start_measurement(Some(REPLAY_NICKNAME))
            .map_err(|err| anyhow!("starting replay: {err}"))?;

        let mut records = Vec::new();
        let mut cooling_down_samples = 0;
        for sample in &trace.samples {
            if let Some(outcome) = context.on_sample(sample.angle, sample.timestamp_ms) {
                if outcome.cooling_down {
                    cooling_down_samples += 1;
                }
                records.extend(outcome.record);
            }
        }

        Ok(TraceRun {
            records,
            samples_processed: trace.samples.len(),
            cooling_down_samples,
            rejected_samples: context.detector().rejected_samples(),
            open_event: context.is_in_event(),
        })
    }
}

impl Default for TraceProcessor {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}
