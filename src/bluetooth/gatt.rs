/// Bluetooth LE link over the Nordic UART Service
///
/// The transmitter pushes its text output as notifications on the UART TX
/// characteristic, each at most one MTU long.
use bluer::gatt::remote::Characteristic;
use bluer::Uuid;
use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio::time::{sleep, timeout, Duration};

use crate::bluetooth::error::{TransportError, TransportResult};
use crate::bluetooth::transport::{ChunkStream, ChunkTransport, DeviceHandle};

pub const NORDIC_UART_SERVICE: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);
pub const NORDIC_UART_TX_CHAR: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

const SERVICES_POLL_INTERVAL_MS: u64 = 100;

pub struct GattTransport {
    handle: DeviceHandle,
    connect_timeout: Duration,
}

impl GattTransport {
    pub async fn new(
        adapter: &bluer::Adapter,
        address: &str,
        connect_timeout: Duration,
    ) -> TransportResult<Self> {
        Ok(GattTransport {
            handle: DeviceHandle::open(adapter, address).await?,
            connect_timeout,
        })
    }

    /// Wait until BlueZ has finished resolving the remote GATT database
    async fn wait_for_services(&self) -> TransportResult<()> {
        while !self.handle.device.is_services_resolved().await? {
            sleep(Duration::from_millis(SERVICES_POLL_INTERVAL_MS)).await;
        }
        Ok(())
    }

    async fn find_tx_characteristic(&self) -> TransportResult<Characteristic> {
        for service in self.handle.device.services().await? {
            if service.uuid().await? != NORDIC_UART_SERVICE {
                continue;
            }
            for characteristic in service.characteristics().await? {
                if characteristic.uuid().await? == NORDIC_UART_TX_CHAR {
                    return Ok(characteristic);
                }
            }
        }
        Err(TransportError::ServiceNotFound)
    }

    async fn open_notifications(&self) -> TransportResult<ChunkStream> {
        let device = &self.handle.device;
        if !device.is_connected().await? {
            timeout(self.connect_timeout, device.connect())
                .await
                .map_err(|_| TransportError::ConnectTimeout)??;
        }

        timeout(self.connect_timeout, self.wait_for_services())
            .await
            .map_err(|_| TransportError::DiscoverTimeout)??;

        let characteristic = self.find_tx_characteristic().await?;
        debug!("Subscribing to UART TX on {}", self.handle.address_str);
        let notifications = characteristic.notify().await?;

        Ok(notifications.boxed_local())
    }
}

impl ChunkTransport for GattTransport {
    fn address(&self) -> &str {
        &self.handle.address_str
    }

    fn display_name(&self) -> &str {
        &self.handle.name
    }

    async fn connect(&mut self) -> TransportResult<ChunkStream> {
        match self.open_notifications().await {
            Ok(stream) => {
                info!(
                    "GATT link open to {} ({})",
                    self.handle.name, self.handle.address_str
                );
                Ok(stream)
            }
            Err(e) => {
                // Don't leave a half-open link behind
                if let Err(disconnect_err) = self.handle.disconnect().await {
                    warn!("Failed to drop link after error: {}", disconnect_err);
                }
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        self.handle.disconnect().await
    }
}
