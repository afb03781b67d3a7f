/// Bluetooth Classic serial link (RFCOMM)
///
/// The transmitter exposes a serial port profile; bytes arrive exactly as
/// written, with whatever fragmentation the radio link imposes.
use bluer::rfcomm::{SocketAddr, Stream};
use log::info;
use tokio::time::{timeout, Duration};

use crate::bluetooth::error::{TransportError, TransportResult};
use crate::bluetooth::transport::{read_chunks, ChunkStream, ChunkTransport, DeviceHandle};

pub struct SerialTransport {
    handle: DeviceHandle,
    channel: u8,
    connect_timeout: Duration,
}

impl SerialTransport {
    pub async fn new(
        adapter: &bluer::Adapter,
        address: &str,
        channel: u8,
        connect_timeout: Duration,
    ) -> TransportResult<Self> {
        Ok(SerialTransport {
            handle: DeviceHandle::open(adapter, address).await?,
            channel,
            connect_timeout,
        })
    }
}

impl ChunkTransport for SerialTransport {
    fn address(&self) -> &str {
        &self.handle.address_str
    }

    fn display_name(&self) -> &str {
        &self.handle.name
    }

    async fn connect(&mut self) -> TransportResult<ChunkStream> {
        let target = SocketAddr::new(self.handle.address, self.channel);

        let stream = timeout(self.connect_timeout, Stream::connect(target))
            .await
            .map_err(|_| TransportError::ConnectTimeout)??;

        info!(
            "RFCOMM link open to {} ({}) on channel {}",
            self.handle.name, self.handle.address_str, self.channel
        );
        Ok(read_chunks(stream))
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        self.handle.disconnect().await
    }
}
