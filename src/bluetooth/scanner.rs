/// Bluetooth adapter setup and device discovery
use futures_util::StreamExt;
use log::{debug, error, warn};
use std::collections::HashMap;
use tokio::time::{timeout, Duration};

use crate::models::DeviceInfo;

/// Name shown for devices that do not advertise one
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown device";

/// Open the default Bluetooth adapter and make sure it is powered
///
/// The returned session must be kept alive for as long as the adapter is
/// used.
pub async fn open_adapter() -> Result<(bluer::Session, bluer::Adapter), Box<dyn std::error::Error>>
{
    // Initialize Bluetooth session
    let session = match bluer::Session::new().await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to create Bluetooth session: {}", e);
            return Err(e.into());
        }
    };

    // Get the default Bluetooth adapter
    let adapter = match session.default_adapter().await {
        Ok(adapter) => adapter,
        Err(e) => {
            error!("Failed to get default Bluetooth adapter: {}", e);
            return Err(e.into());
        }
    };

    // Ensure Bluetooth adapter is powered on
    if let Err(e) = adapter.set_powered(true).await {
        error!("Failed to power on adapter: {}", e);
        return Err(e.into());
    }

    Ok((session, adapter))
}

/// Discover nearby devices for a fixed duration
///
/// Devices BlueZ already knows about (paired ones included) are reported
/// alongside newly discovered ones. Each address appears once.
///
/// # Arguments
/// * `adapter` - Powered adapter to scan with
/// * `transport` - Classic, LE, or both
/// * `duration` - How long to keep discovery running
pub async fn scan_devices(
    adapter: &bluer::Adapter,
    transport: bluer::DiscoveryTransport,
    duration: Duration,
) -> Result<Vec<DeviceInfo>, Box<dyn std::error::Error>> {
    let filter = bluer::DiscoveryFilter {
        transport,
        duplicate_data: false, // Filter out duplicate advertisements
        ..Default::default()
    };

    // Apply the discovery filter (warn if it fails, but continue)
    if let Err(e) = adapter.set_discovery_filter(filter).await {
        warn!("Failed to set discovery filter: {}", e);
    }

    let discovery = match adapter.discover_devices().await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to start device discovery: {}", e);
            return Err(e.into());
        }
    };

    // Drain discovery events until the scan window closes
    let mut discovered = Vec::new();
    let collect = async {
        let mut stream = Box::pin(discovery);
        while let Some(event) = stream.next().await {
            if let bluer::AdapterEvent::DeviceAdded(addr) = event {
                debug!("Discovered {}", addr);
                discovered.push(addr);
            }
        }
    };
    let _ = timeout(duration, collect).await;

    // Known devices are not necessarily re-announced during discovery
    let known = match adapter.device_addresses().await {
        Ok(addresses) => addresses,
        Err(e) => {
            error!("Failed to get device addresses: {}", e);
            return Err(e.into());
        }
    };

    let mut devices: HashMap<String, DeviceInfo> = HashMap::new();
    for addr in discovered.into_iter().chain(known) {
        let id = addr.to_string().to_uppercase();
        if devices.contains_key(&id) {
            continue;
        }

        let device = match adapter.device(addr) {
            Ok(device) => device,
            Err(_) => continue,
        };

        let display_name = match device.name().await {
            Ok(Some(name)) => name,
            _ => UNKNOWN_DEVICE_NAME.to_string(),
        };
        let paired = device.is_paired().await.unwrap_or(false);

        devices.insert(
            id.clone(),
            DeviceInfo {
                id,
                display_name,
                paired,
            },
        );
    }

    let mut devices: Vec<DeviceInfo> = devices.into_values().collect();
    sort_devices(&mut devices);
    Ok(devices)
}

/// Paired devices first, then by name, then by address
fn sort_devices(devices: &mut [DeviceInfo]) {
    devices.sort_by(|a, b| {
        b.paired
            .cmp(&a.paired)
            .then_with(|| a.display_name.cmp(&b.display_name))
            .then_with(|| a.id.cmp(&b.id))
    });
}
