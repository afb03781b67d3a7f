/// Background task that persists decoded records
use log::{error, info, warn};
use time::OffsetDateTime;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::database::operations::store_sensor_record;
use crate::models::SensorRecord;

/// Records waiting to be written before new ones are dropped
const SINK_QUEUE_SIZE: usize = 64;

struct PendingRecord {
    device_address: String,
    record: SensorRecord,
    received_at: OffsetDateTime,
}

/// Handle for queueing records; writes happen off the streaming path
#[derive(Clone)]
pub struct RecordSink {
    tx: mpsc::Sender<PendingRecord>,
}

impl RecordSink {
    /// Spawn the writer task for `database_url`
    pub fn spawn(database_url: String) -> Self {
        let (tx, mut rx) = mpsc::channel::<PendingRecord>(SINK_QUEUE_SIZE);

        tokio::spawn(async move {
            while let Some(pending) = rx.recv().await {
                match store_sensor_record(
                    &pending.device_address,
                    &pending.record,
                    pending.received_at,
                    &database_url,
                )
                .await
                {
                    Ok(()) => info!(
                        "Stored record {} from {}",
                        pending.record.message_id, pending.device_address
                    ),
                    Err(e) => error!(
                        "Failed to store record from {}: {}",
                        pending.device_address, e
                    ),
                }
            }
        });

        RecordSink { tx }
    }

    /// Queue a record; drops it with a warning when the writer is behind
    pub fn submit(&self, device_address: &str, record: SensorRecord) {
        let pending = PendingRecord {
            device_address: device_address.to_string(),
            record,
            received_at: OffsetDateTime::now_utc(),
        };

        match self.tx.try_send(pending) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => warn!(
                "Record queue full, dropping record {} from {}",
                dropped.record.message_id, dropped.device_address
            ),
            Err(TrySendError::Closed(_)) => error!("Record writer has stopped"),
        }
    }
}
