// BroadcastChannelManager: tokio broadcast channels for display subscribers
// Single Responsibility: channel lifecycle and subscription

use std::pin::Pin;

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::analysis::Reading;
use crate::session::EventRecord;

/// Live readings arrive at sensor rate (tens of Hz); ~5 s of backlog
const READING_BUFFER: usize = 256;
const RECORD_BUFFER: usize = 32;

/// Manages the broadcast channels fed by the sample path
///
/// # Channel Types
/// - Readings: per-sample display payload (angle, zone, gauge, live duration)
/// - Records: finished wheelie events
///
/// Sending never blocks. Subscribers that fall behind lose the oldest
/// messages (`RecvError::Lagged`) instead of slowing the detector down.
pub struct BroadcastChannelManager {
    readings: broadcast::Sender<Reading>,
    records: broadcast::Sender<EventRecord>,
}

impl BroadcastChannelManager {
    pub fn new() -> Self {
        let (readings, _) = broadcast::channel(READING_BUFFER);
        let (records, _) = broadcast::channel(RECORD_BUFFER);
        Self { readings, records }
    }

    /// Publish a reading; returns the number of subscribers reached
    pub fn publish_reading(&self, reading: Reading) -> usize {
        // No subscribers is not an error
        self.readings.send(reading).unwrap_or(0)
    }

    /// Publish a finished record; returns the number of subscribers reached
    pub fn publish_record(&self, record: EventRecord) -> usize {
        self.records.send(record).unwrap_or(0)
    }

    pub fn subscribe_readings(&self) -> broadcast::Receiver<Reading> {
        self.readings.subscribe()
    }

    pub fn subscribe_records(&self) -> broadcast::Receiver<EventRecord> {
        self.records.subscribe()
    }

    /// Finished records as a stream; lagged gaps are skipped
    ///
    /// The stream ends once the manager is dropped.
    pub fn record_stream(&self) -> RecordStream {
        let stream = BroadcastStream::new(self.records.subscribe()).filter_map(|result| async move {
            match result {
                Ok(record) => Some(record),
                Err(_) => None,
            }
        });
        Box::pin(stream)
    }

    pub fn reading_stream(&self) -> ReadingStream {
        let stream = BroadcastStream::new(self.readings.subscribe())
            .filter_map(|result| async move { result.ok() });
        Box::pin(stream)
    }
}

pub type RecordStream = Pin<Box<dyn Stream<Item = EventRecord> + Send>>;
pub type ReadingStream = Pin<Box<dyn Stream<Item = Reading> + Send>>;

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}
