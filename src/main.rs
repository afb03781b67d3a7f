use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::time::{sleep, Duration};

use sensor_stream_gateway::bluetooth::{
    open_adapter, scan_devices, ChunkTransport, GattTransport, SerialTransport,
};
use sensor_stream_gateway::config::{GatewayConfig, TransportKind};
use sensor_stream_gateway::database::RecordSink;
use sensor_stream_gateway::models::{ChannelStatus, SensorRecord};
use sensor_stream_gateway::protocol::{StreamFramer, PACKET_GRAMMAR};
use sensor_stream_gateway::session::{ConnectionSession, LineOutcome};
use sensor_stream_gateway::utils::{bytes_to_chunk, format_datetime, now_local};

/// List nearby devices so the user can pick a SENSOR_ADDRESS
async fn run_discovery(
    adapter: &bluer::Adapter,
    config: &GatewayConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let transport = match config.transport {
        TransportKind::Serial => bluer::DiscoveryTransport::Auto,
        TransportKind::Ble => bluer::DiscoveryTransport::Le,
    };

    info!("Scanning for {} seconds", config.scan_duration_secs);
    let devices = scan_devices(
        adapter,
        transport,
        Duration::from_secs(config.scan_duration_secs),
    )
    .await?;

    if devices.is_empty() {
        warn!("No devices found");
    }
    for device in &devices {
        info!(
            "{}  {}{}",
            device.id,
            device.display_name,
            if device.paired { "  (paired)" } else { "" }
        );
    }

    Ok(())
}

fn log_channel_status(record: &SensorRecord, management_value: u32) {
    match record.channel_status(management_value) {
        Some(ChannelStatus::Danger) => warn!(
            "  DANGER: channel 1 at {} exceeds management value {}",
            record.channels[0], management_value
        ),
        Some(ChannelStatus::Safe) => info!(
            "  Safe: channel 1 at {} (management value {})",
            record.channels[0], management_value
        ),
        None => info!("  Channel 1: --- (management value {})", management_value),
    }
}

fn log_record(record: &SensorRecord, management_value: u32) {
    info!(
        "Site {} device {} message {} at {}",
        record.site_id, record.device_id, record.message_id, record.time
    );
    info!("  Channels: {}", record.channels.join(", "));
    info!(
        "  NTC indoor/outdoor: {} / {}",
        record.ntc_indoor, record.ntc_outdoor
    );
    info!(
        "  LTE: {}  Battery: {}  Reset flag: {}  Count: {}",
        record.lte_signal, record.battery_level, record.reset_flag, record.packet_count
    );
    log_channel_status(record, management_value);
}

fn report_status(session: &ConnectionSession, management_value: u32) {
    info!("Status at {}:", format_datetime(&now_local()));
    log_record(session.current_record(), management_value);

    if let Some(line) = session.last_failure() {
        warn!("  Last malformed packet: '{}'", line);
        warn!("  Expected format: {}", PACKET_GRAMMAR);
    }

    for entry in session.recent_log() {
        debug!("  {}", entry);
    }
}

fn handle_chunk(
    session: &mut ConnectionSession,
    bytes: &[u8],
    device_address: &str,
    management_value: u32,
    sink: Option<&RecordSink>,
) {
    let chunk = bytes_to_chunk(bytes);

    for outcome in session.on_chunk(&chunk) {
        if let LineOutcome::Decoded(record) = outcome {
            log_record(&record, management_value);
            if let Some(sink) = sink {
                sink.submit(device_address, record);
            }
        }
    }
}

/// Stream from one transmitter forever, reconnecting when the link drops
///
/// The session outlives individual connections, so the last decoded record
/// stays available while reconnecting.
async fn run_transport<T: ChunkTransport>(
    transport: &mut T,
    config: &GatewayConfig,
    sink: Option<RecordSink>,
) -> Result<(), Box<dyn std::error::Error>> {
    let framer = StreamFramer::with_options(config.marker_fallback, config.max_buffer_bytes);
    let mut session = ConnectionSession::new(framer);
    let mut status = tokio::time::interval(Duration::from_secs(config.status_interval_secs));

    loop {
        info!(
            "Connecting to {} ({})",
            transport.display_name(),
            transport.address()
        );

        match transport.connect().await {
            Ok(mut chunks) => {
                session.reset();

                loop {
                    tokio::select! {
                        chunk = chunks.next() => match chunk {
                            Some(bytes) => handle_chunk(
                                &mut session,
                                &bytes,
                                transport.address(),
                                config.management_value,
                                sink.as_ref(),
                            ),
                            None => {
                                warn!("Link to {} closed", transport.address());
                                break;
                            }
                        },
                        _ = status.tick() => report_status(&session, config.management_value),
                    }
                }
            }
            Err(e) => error!("Failed to connect to {}: {}", transport.address(), e),
        }

        if let Err(e) = transport.disconnect().await {
            warn!("Failed to disconnect from {}: {}", transport.address(), e);
        }

        info!("Reconnecting in {} seconds", config.reconnect_delay_secs);
        sleep(Duration::from_secs(config.reconnect_delay_secs)).await;
    }
}

async fn main_loop(config: GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting sensor stream gateway");

    // The bluer session must stay alive while the adapter is in use
    let (_bt_session, adapter) = open_adapter().await?;

    let address = match &config.address {
        Some(address) => address.clone(),
        None => return run_discovery(&adapter, &config).await,
    };

    let sink = config.database_url.clone().map(RecordSink::spawn);
    let connect_timeout = Duration::from_secs(config.connect_timeout_secs);

    match config.transport {
        TransportKind::Serial => {
            let mut transport =
                SerialTransport::new(&adapter, &address, config.rfcomm_channel, connect_timeout)
                    .await?;
            run_transport(&mut transport, &config, sink).await
        }
        TransportKind::Ble => {
            let mut transport = GattTransport::new(&adapter, &address, connect_timeout).await?;
            run_transport(&mut transport, &config, sink).await
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match GatewayConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                // Keep the sender alive so the service isn't mistaken for stopped
                std::future::pending::<()>().await;
            }
        }
    });

    // Run main loop or wait for shutdown signal
    tokio::select! {
        result = main_loop(config) => {
            match result {
                Ok(_) => info!("Program completed successfully"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
