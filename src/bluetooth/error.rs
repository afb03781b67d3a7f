//! Error types for the Bluetooth transports.

use thiserror::Error;

/// Errors raised while connecting to or streaming from a transmitter.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The configured device address could not be parsed.
    #[error("invalid device address: {0}")]
    InvalidAddress(String),

    /// BlueZ reported an error.
    #[error("bluetooth error: {0}")]
    Bluetooth(#[from] bluer::Error),

    /// Socket I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The link did not come up in time.
    #[error("connection timed out")]
    ConnectTimeout,

    /// Connected, but GATT services were not resolved in time.
    #[error("service discovery timed out")]
    DiscoverTimeout,

    /// The device does not expose the UART service or its TX characteristic.
    #[error("uart service not found on device")]
    ServiceNotFound,
}

pub type TransportResult<T> = Result<T, TransportError>;
