//! Diagnostics telemetry collector and helpers.
//!
//! The collector multiplexes detections, calibration changes, lifecycle
//! transitions and persistence outcomes into a bounded history plus an async
//! broadcast stream.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use tokio::sync::broadcast;

use crate::session::EventRecord;

pub mod events;

pub use events::{DiagnosticError, LifecyclePhase, MetricEvent};

/// Global telemetry hub shared across the crate.
static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Access the global telemetry hub.
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    fn history(&self) -> MutexGuard<'_, VecDeque<MetricEvent>> {
        // History is append-only; a poisoned guard still holds consistent data
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = self.history();
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = self.history();
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Top-level hub wrapping the collector with typed recorders.
pub struct TelemetryHub {
    collector: TelemetryCollector,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.collector.snapshot()
    }

    pub fn record_event(&self, record: &EventRecord) {
        self.collector.publish(MetricEvent::EventDetected {
            duration_secs: record.duration_secs,
            max_angle: record.max_angle,
            average_angle: record.average_angle,
        });
    }

    pub fn record_calibration(&self, offset: f64) {
        self.collector
            .publish(MetricEvent::CalibrationChanged { offset });
    }

    pub fn record_lifecycle(&self, phase: LifecyclePhase) {
        self.collector.publish(MetricEvent::Lifecycle {
            phase,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn record_save_completed(&self, count: usize) {
        self.collector.publish(MetricEvent::SaveCompleted { count });
    }

    pub fn record_save_failed(&self, reason: impl Into<String>) {
        self.collector.publish(MetricEvent::SaveFailed {
            reason: reason.into(),
        });
    }

    pub fn record_error(&self, code: DiagnosticError, context: impl Into<String>) {
        self.collector.publish(MetricEvent::Error {
            code,
            context: context.into(),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Wall-clock milliseconds since the Unix epoch
pub fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;

    fn sample_record(max_angle: f64) -> EventRecord {
        EventRecord::new(0, 1_500, max_angle, max_angle * 2.0, 2, SessionId::new())
    }

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3);
        collector.publish(MetricEvent::CalibrationChanged { offset: 1.0 });
        collector.publish(MetricEvent::CalibrationChanged { offset: 2.0 });
        collector.publish(MetricEvent::SaveCompleted { count: 4 });

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 3);
        assert!(
            matches!(snapshot.recent[0], MetricEvent::CalibrationChanged { offset } if (offset - 1.0).abs() < f64::EPSILON)
        );
        assert!(matches!(
            snapshot.recent[2],
            MetricEvent::SaveCompleted { count: 4 }
        ));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let collector = TelemetryCollector::new(8, 2);
        collector.publish(MetricEvent::CalibrationChanged { offset: 1.0 });
        collector.publish(MetricEvent::CalibrationChanged { offset: 3.0 });
        collector.publish(MetricEvent::CalibrationChanged { offset: 5.0 });

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.dropped_events, 1);
        assert_eq!(snapshot.total_events, 3);
        assert!(
            matches!(snapshot.recent[0], MetricEvent::CalibrationChanged { offset } if (offset - 3.0).abs() < f64::EPSILON)
        );
    }

    #[test]
    fn hub_records_detections_and_saves() {
        let hub = TelemetryHub::new(8, 8);
        hub.record_event(&sample_record(31.0));
        hub.record_save_completed(1);
        hub.record_save_failed("offline");

        let snapshot = hub.snapshot();
        assert_eq!(snapshot.total_events, 3);
        assert!(snapshot
            .recent
            .iter()
            .any(|event| matches!(event, MetricEvent::EventDetected { max_angle, .. } if *max_angle == 31.0)));
        assert!(snapshot
            .recent
            .iter()
            .any(|event| matches!(event, MetricEvent::SaveFailed { .. })));
    }

    #[test]
    fn subscribers_receive_published_events() {
        let hub = TelemetryHub::new(8, 8);
        let mut rx = hub.collector().subscribe();
        hub.record_lifecycle(LifecyclePhase::SessionReset);

        match rx.try_recv().unwrap() {
            MetricEvent::Lifecycle { phase, .. } => assert_eq!(phase, LifecyclePhase::SessionReset),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn metric_event_json_is_tagged() {
        let json = serde_json::to_value(MetricEvent::SaveCompleted { count: 2 }).unwrap();
        assert_eq!(json["type"], "save_completed");
        assert_eq!(json["payload"]["count"], 2);
    }
}
