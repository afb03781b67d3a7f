/// Common interface over the serial and GATT links
use futures_util::stream::{self, LocalBoxStream, StreamExt};
use log::warn;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::bluetooth::error::{TransportError, TransportResult};
use crate::bluetooth::scanner::UNKNOWN_DEVICE_NAME;

/// Read size for socket-backed links
const READ_BUFFER_SIZE: usize = 1024;

/// Raw byte chunks as delivered by the link, in order
pub type ChunkStream = LocalBoxStream<'static, Vec<u8>>;

/// A link to one transmitter
///
/// `connect` yields the chunk stream, which ends when the link drops.
/// Calling `connect` again after that re-establishes the link.
#[allow(async_fn_in_trait)] // driven from a single task, Send futures aren't needed
pub trait ChunkTransport {
    fn address(&self) -> &str;

    fn display_name(&self) -> &str;

    /// Open the link and start delivering chunks
    async fn connect(&mut self) -> TransportResult<ChunkStream>;

    /// Tear the link down; safe to call when not connected
    async fn disconnect(&mut self) -> TransportResult<()>;
}

/// Handle to a known device plus the name to show for it
pub(crate) struct DeviceHandle {
    pub device: bluer::Device,
    pub address: bluer::Address,
    pub address_str: String,
    pub name: String,
}

impl DeviceHandle {
    pub async fn open(adapter: &bluer::Adapter, address: &str) -> TransportResult<Self> {
        let parsed: bluer::Address = address
            .trim()
            .parse()
            .map_err(|_| TransportError::InvalidAddress(address.to_string()))?;

        let device = adapter.device(parsed)?;
        let name = match device.name().await {
            Ok(Some(name)) => name,
            _ => UNKNOWN_DEVICE_NAME.to_string(),
        };

        Ok(DeviceHandle {
            device,
            address: parsed,
            address_str: parsed.to_string().to_uppercase(),
            name,
        })
    }

    /// Drop the ACL link if it is still up
    pub async fn disconnect(&self) -> TransportResult<()> {
        if self.device.is_connected().await? {
            self.device.disconnect().await?;
        }
        Ok(())
    }
}

/// Turn a byte reader into a chunk stream that ends on EOF or error
pub fn read_chunks<R>(reader: R) -> ChunkStream
where
    R: AsyncRead + Unpin + 'static,
{
    stream::unfold(reader, |mut reader| async move {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        match reader.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((buf, reader))
            }
            Err(e) => {
                warn!("Read error, closing stream: {}", e);
                None
            }
        }
    })
    .boxed_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_read_chunks_until_eof() {
        let (mut writer, reader) = tokio::io::duplex(64);
        writer.write_all(b"#S1,D1,M1;0,01\r\n").await.unwrap();
        drop(writer);

        let chunks: Vec<Vec<u8>> = read_chunks(reader).collect().await;
        let joined: Vec<u8> = chunks.concat();

        assert_eq!(joined, b"#S1,D1,M1;0,01\r\n");
    }

    #[tokio::test]
    async fn test_read_chunks_empty_stream() {
        let (writer, reader) = tokio::io::duplex(8);
        drop(writer);

        let chunks: Vec<Vec<u8>> = read_chunks(reader).collect().await;
        assert!(chunks.is_empty());
    }
}
