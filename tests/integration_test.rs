//! Integration tests for MeterContext
//!
//! These tests validate the full measurement lifecycle across the crate:
//! - Start/stop/reset with nickname validation
//! - Event detection feeding the history and broadcast channels
//! - Synchronous and background persistence of unsaved records
//! - Error propagation and typed error handling

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use wheelie_meter::calibration::MemorySettings;
use wheelie_meter::config::AppConfig;
use wheelie_meter::context::MeterContext;
use wheelie_meter::error::{ErrorCode, MeasurementError, PersistenceError};
use wheelie_meter::persistence::{JsonLinesSink, MemorySink, PersistenceWorker};
use wheelie_meter::telemetry::{self, MetricEvent};
use wheelie_meter::AngleZone;

fn init_test_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build test runtime")
}

fn new_context() -> MeterContext {
    MeterContext::new(AppConfig::default(), Arc::new(MemorySettings::new()))
}

fn feed(context: &mut MeterContext, samples: &[(f64, u64)]) -> usize {
    samples
        .iter()
        .filter_map(|&(angle, t)| context.on_sample(angle, t))
        .filter(|outcome| outcome.record.is_some())
        .count()
}

/// Reference ride: one wheelie from 1 s to 4 s peaking at 30°
#[test]
fn test_reference_ride() {
    let mut context = new_context();
    context.start_measurement(Some("Valentino")).unwrap();

    let mut statuses = Vec::new();
    for &(angle, t) in &[(5.0, 0), (25.0, 1_000), (30.0, 2_000), (28.0, 3_000), (10.0, 4_000)] {
        let outcome = context.on_sample(angle, t).unwrap();
        statuses.push(outcome.reading.zone);
    }

    assert_eq!(
        statuses,
        vec![
            AngleZone::Idle,
            AngleZone::Active,
            AngleZone::Active,
            AngleZone::Active,
            AngleZone::Idle
        ]
    );

    let record = context.history().latest().expect("one record");
    assert_eq!(record.duration_secs, 3.0);
    assert_eq!(record.max_angle, 30.0);
    assert!((record.average_angle - 83.0 / 3.0).abs() < 1e-9);
    assert_eq!(record.sample_count, 3);
    assert_eq!(record.time_label.len(), 8);
}

/// History is most-recent-first across several wheelies
#[test]
fn test_history_order_and_session_tagging() {
    let mut context = new_context();
    context.start_measurement(Some("rider")).unwrap();

    let finished = feed(
        &mut context,
        &[
            (25.0, 0),
            (5.0, 500),
            (35.0, 1_000),
            (5.0, 2_000),
            (-50.0, 3_000),
            (0.0, 3_100),
        ],
    );
    assert_eq!(finished, 3);

    let maxima: Vec<f64> = context.history().records().iter().map(|r| r.max_angle).collect();
    assert_eq!(maxima, vec![50.0, 35.0, 25.0]);
    assert!(context
        .history()
        .records()
        .iter()
        .all(|r| r.session_id == context.session_id()));
}

/// Stop, restart and reset interplay
#[test]
fn test_lifecycle_errors() {
    let mut context = new_context();

    let err = context.start_measurement(Some("ab")).unwrap_err();
    assert_eq!(err.code(), 3005);

    context.start_measurement(Some("rider")).unwrap();
    assert_eq!(
        context.start_measurement(None).unwrap_err(),
        MeasurementError::AlreadyMeasuring
    );

    context.stop_measurement().unwrap();
    assert_eq!(
        context.stop_measurement().unwrap_err(),
        MeasurementError::NotMeasuring
    );

    context.reset_session();
    assert!(!context.is_session_active());
    // Nickname survives a reset
    assert!(context.start_measurement(None).is_ok());
}

/// Calibrated offset carries through to detection
#[test]
fn test_calibration_then_measure() {
    let settings = Arc::new(MemorySettings::new());
    let mut context = MeterContext::new(AppConfig::default(), settings.clone());

    context.on_sample(-12.0, 0);
    assert_eq!(context.calibrate().unwrap(), 12.0);

    context.start_measurement(Some("rider")).unwrap();
    // 30 raw -> 18 calibrated, below threshold
    assert_eq!(feed(&mut context, &[(30.0, 100), (10.0, 200)]), 0);
    // 40 raw -> 28 calibrated
    assert_eq!(feed(&mut context, &[(40.0, 300), (12.0, 700)]), 1);
    assert_eq!(context.history().latest().unwrap().max_angle, 28.0);

    // A second context restores the persisted offset
    let restored = MeterContext::new(AppConfig::default(), settings);
    assert_eq!(restored.calibration_offset(), 12.0);
}

/// Synchronous save through a JSON-lines sink
#[test]
fn test_save_session_to_json_lines() {
    let path = std::env::temp_dir().join(format!(
        "wheelie_results_{}.jsonl",
        wheelie_meter::SessionId::new().short()
    ));
    let sink = JsonLinesSink::new(&path);

    let mut context = new_context();
    context.start_measurement(Some("rider")).unwrap();
    feed(&mut context, &[(25.0, 0), (5.0, 1_234), (31.26, 2_000), (0.0, 2_500)]);

    assert_eq!(context.save_session(&sink), Ok(2));
    assert!(!context.has_unsaved());

    let contents = std::fs::read_to_string(&path).unwrap();
    let rows: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["table"], "wheelie_results");
    assert_eq!(rows[0]["nickname"], "rider");
    assert_eq!(rows[0]["angle"], 31.3);
    assert_eq!(rows[1]["duration"], 1.23);

    let _ = std::fs::remove_file(&path);
}

/// Background save: outcome confirms records; a second submit waits for it
#[test]
fn test_background_save_round_trip() {
    let runtime = init_test_runtime();
    let _guard = runtime.enter();

    let sink = Arc::new(MemorySink::new());
    let (worker, mut outcomes) = PersistenceWorker::spawn(sink.clone());

    let mut context = new_context();
    context.start_measurement(Some("rider")).unwrap();
    feed(&mut context, &[(25.0, 0), (5.0, 1_000)]);

    assert_eq!(context.submit_save(&worker), Ok(1));
    assert_eq!(
        context.submit_save(&worker),
        Err(PersistenceError::InFlight)
    );

    let outcome = runtime
        .block_on(async { tokio::time::timeout(Duration::from_secs(5), outcomes.recv()).await })
        .expect("worker reported in time")
        .expect("outcome channel open");

    assert!(context.apply_save_outcome(&outcome));
    assert!(!context.has_unsaved());
    assert_eq!(sink.rows().len(), 1);
}

/// A failed background write leaves records for a manual retry
#[test]
fn test_background_save_failure() {
    let runtime = init_test_runtime();
    let _guard = runtime.enter();

    let sink = Arc::new(MemorySink::new());
    sink.set_failure(Some("network down"));
    let (worker, mut outcomes) = PersistenceWorker::spawn(sink.clone());

    let mut context = new_context();
    context.start_measurement(Some("rider")).unwrap();
    feed(&mut context, &[(25.0, 0), (5.0, 1_000)]);
    context.submit_save(&worker).unwrap();

    let outcome = runtime
        .block_on(outcomes.recv())
        .expect("outcome channel open");
    assert!(outcome.result.is_err());
    assert!(!context.apply_save_outcome(&outcome));
    assert!(context.has_unsaved());

    sink.set_failure(None);
    assert_eq!(context.submit_save(&worker), Ok(1));
}

/// Outcomes that arrive after a reset belong to the discarded session
#[test]
fn test_stale_outcome_ignored_after_reset() {
    let runtime = init_test_runtime();
    let _guard = runtime.enter();

    let sink = Arc::new(MemorySink::new());
    let (worker, mut outcomes) = PersistenceWorker::spawn(sink);

    let mut context = new_context();
    context.start_measurement(Some("rider")).unwrap();
    feed(&mut context, &[(25.0, 0), (5.0, 1_000)]);
    context.submit_save(&worker).unwrap();
    context.reset_session();

    context.start_measurement(None).unwrap();
    feed(&mut context, &[(25.0, 2_000), (5.0, 3_000)]);

    let outcome = runtime.block_on(outcomes.recv()).unwrap();
    assert!(!context.apply_save_outcome(&outcome));
    assert!(context.has_unsaved());
}

/// Display subscribers receive finished records as a stream
#[test]
fn test_record_stream_subscriber() {
    let runtime = init_test_runtime();

    let mut context = new_context();
    let mut stream = context.record_stream();
    context.start_measurement(Some("rider")).unwrap();
    feed(&mut context, &[(25.0, 0), (5.0, 1_000), (40.0, 2_000), (5.0, 2_100)]);

    let first = runtime.block_on(stream.next()).expect("first record");
    let second = runtime.block_on(stream.next()).expect("second record");
    assert_eq!(first.max_angle, 25.0);
    assert_eq!(second.max_angle, 40.0);
}

/// Telemetry subscribers see detected events
#[test]
fn test_telemetry_records_detected_event() {
    let mut metrics = telemetry::hub().collector().subscribe();

    let mut context = new_context();
    context.start_measurement(Some("rider")).unwrap();
    feed(&mut context, &[(25.0, 0), (77.7, 100), (5.0, 1_000)]);

    let mut found = false;
    while let Ok(event) = metrics.try_recv() {
        if matches!(event, MetricEvent::EventDetected { max_angle, .. } if max_angle == 77.7) {
            found = true;
        }
    }
    assert!(found, "EventDetected not published");
}
