// PersistenceWorker: background writer for session results
//
// Batches go in over an mpsc channel, the blocking sink call runs on tokio's
// blocking pool, and outcomes come back on an unbounded channel. The sample
// path never awaits a write.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::{PersistenceSink, SaveBatch};
use crate::error::{log_persistence_error, PersistenceError};
use crate::session::SessionId;
use crate::telemetry;

/// Result of one background write
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub session_id: SessionId,
    /// Rows in the batch that was attempted
    pub requested: usize,
    pub result: Result<usize, PersistenceError>,
}

/// Handle for submitting batches to the background writer
#[derive(Clone)]
pub struct PersistenceWorker {
    tx: mpsc::Sender<SaveBatch>,
}

impl PersistenceWorker {
    /// Spawn the writer task on the current tokio runtime
    ///
    /// # Returns
    /// The submission handle and the receiver of write outcomes. The task
    /// exits once every handle has been dropped.
    pub fn spawn(sink: Arc<dyn PersistenceSink>) -> (Self, mpsc::UnboundedReceiver<SaveOutcome>) {
        let (tx, mut rx) = mpsc::channel::<SaveBatch>(16);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(batch) = rx.recv().await {
                let session_id = batch.session_id;
                let requested = batch.len();
                let sink = Arc::clone(&sink);

                let result = tokio::task::spawn_blocking(move || {
                    sink.append(&batch.table, &batch.entries)
                })
                .await
                .unwrap_or_else(|join_err| {
                    Err(PersistenceError::WriteFailed {
                        reason: join_err.to_string(),
                    })
                });

                match &result {
                    Ok(count) => telemetry::hub().record_save_completed(*count),
                    Err(err) => {
                        log_persistence_error(err, "persistence_worker");
                        telemetry::hub().record_save_failed(err.to_string());
                    }
                }

                let outcome = SaveOutcome {
                    session_id,
                    requested,
                    result,
                };
                if outcome_tx.send(outcome).is_err() {
                    log::debug!("[Persistence] Outcome receiver dropped, stopping worker");
                    break;
                }
            }
        });

        (Self { tx }, outcome_rx)
    }

    /// Queue a batch without waiting for the write
    pub fn submit(&self, batch: SaveBatch) -> Result<(), PersistenceError> {
        if batch.is_empty() {
            return Err(PersistenceError::NothingToSave);
        }
        self.tx.try_send(batch).map_err(|err| match err {
            mpsc::error::TrySendError::Closed(_) => PersistenceError::WorkerClosed,
            mpsc::error::TrySendError::Full(_) => PersistenceError::WriteFailed {
                reason: "persistence queue full".to_string(),
            },
        })
    }
}
