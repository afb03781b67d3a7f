pub mod error;
pub mod gatt;
pub mod scanner;
pub mod serial;
pub mod transport;

pub use error::TransportError;
pub use gatt::GattTransport;
pub use scanner::{open_adapter, scan_devices};
pub use serial::SerialTransport;
pub use transport::ChunkTransport;
