/// Database operations for storing decoded sensor records
use crate::database::connection::execute_with_retry;
use crate::models::SensorRecord;
use time::OffsetDateTime;

/// Insert one decoded record into the sensor_records table
///
/// # Arguments
/// * `device_address` - Bluetooth address the record came from
/// * `record` - Record as it stood after the merge
/// * `received_at` - When the packet was decoded
/// * `database_url` - PostgreSQL connection string
pub async fn store_sensor_record(
    device_address: &str,
    record: &SensorRecord,
    received_at: OffsetDateTime,
    database_url: &str,
) -> Result<(), String> {
    // Clone data for move into async closure
    let device_address = device_address.to_string();
    let record = record.clone();

    execute_with_retry(database_url, move |client| {
        let device_address = device_address.clone();
        let record = record.clone();
        async move {
            let channels: Vec<String> = record.channels.to_vec();
            client.execute(
                "INSERT INTO sensor_records(device_address, site_id, device_id, message_id, time, channels,
                     ntc_indoor, ntc_outdoor, lte_signal, battery_level, reset_flag, packet_count, received_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
                &[
                    &device_address,
                    &record.site_id,
                    &record.device_id,
                    &record.message_id,
                    &record.time,
                    &channels,
                    &record.ntc_indoor,
                    &record.ntc_outdoor,
                    &record.lte_signal,
                    &record.battery_level,
                    &record.reset_flag,
                    &record.packet_count,
                    &received_at,
                ],
            ).await
        }
    }).await
}
