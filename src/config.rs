use log::info;
use std::env;
use std::str::FromStr;

use crate::protocol::framer::DEFAULT_MAX_BUFFER_BYTES;

/// Which link the transmitter is reached over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Bluetooth Classic serial port (RFCOMM)
    Serial,
    /// Bluetooth LE, Nordic UART notifications
    Ble,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" | "rfcomm" | "classic" => Ok(TransportKind::Serial),
            "ble" | "gatt" | "le" => Ok(TransportKind::Ble),
            other => Err(format!(
                "unknown transport '{}', expected 'serial' or 'ble'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub transport: TransportKind,
    /// Device to connect to; None means scan and list devices instead
    pub address: Option<String>,
    pub rfcomm_channel: u8,
    pub connect_timeout_secs: u64,
    pub scan_duration_secs: u64,
    pub reconnect_delay_secs: u64,
    pub status_interval_secs: u64,
    pub max_buffer_bytes: usize,
    /// Emit unterminated `#...;...` remainders, for links that strip terminators
    pub marker_fallback: bool,
    /// Channel 1 alarm threshold
    pub management_value: u32,
    pub database_url: Option<String>,
}

/// Default channel 1 alarm threshold
pub const DEFAULT_MANAGEMENT_VALUE: u32 = 70;

impl GatewayConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let transport = match env::var("SENSOR_TRANSPORT") {
            Ok(value) => value.parse()?,
            Err(_) => TransportKind::Serial,
        };

        let address = non_empty_var("SENSOR_ADDRESS").map(|a| a.to_uppercase());
        let database_url = non_empty_var("DATABASE_URL");

        let config = GatewayConfig {
            transport,
            address,
            rfcomm_channel: parse_var("RFCOMM_CHANNEL", 1)?,
            connect_timeout_secs: parse_var("CONNECT_TIMEOUT_SECS", 10)?,
            scan_duration_secs: parse_var("SCAN_DURATION_SECS", 10)?,
            reconnect_delay_secs: parse_var("RECONNECT_DELAY_SECS", 5)?,
            status_interval_secs: parse_var("STATUS_INTERVAL_SECS", 30)?,
            max_buffer_bytes: parse_var("MAX_BUFFER_BYTES", DEFAULT_MAX_BUFFER_BYTES)?,
            marker_fallback: parse_var("MARKER_FALLBACK", false)?,
            management_value: clamp_management_value(parse_var(
                "MANAGEMENT_VALUE",
                f64::from(DEFAULT_MANAGEMENT_VALUE),
            )?),
            database_url,
        };

        if config.status_interval_secs == 0 {
            return Err("STATUS_INTERVAL_SECS must be greater than zero".into());
        }

        info!("Transport: {:?}", config.transport);
        info!("Management value: {}", config.management_value);
        if config.marker_fallback {
            info!("Marker fallback enabled, unterminated packets are framed on '#...;'");
        }
        match &config.address {
            Some(address) => info!("Target device: {}", address),
            None => info!("SENSOR_ADDRESS not set, running discovery only"),
        }
        if config.database_url.is_none() {
            info!("DATABASE_URL not set, decoded records will not be stored");
        }

        Ok(config)
    }
}

/// Round to a whole threshold; negative or non-finite values become 0
fn clamp_management_value(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    value.round().min(f64::from(u32::MAX)) as u32
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a typed variable, using `default` when it is unset
fn parse_var<T>(key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_var(key) {
        Some(value) => value
            .parse()
            .map_err(|e| format!("Invalid {} '{}': {}", key, value, e).into()),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_parsing() {
        assert_eq!("serial".parse::<TransportKind>(), Ok(TransportKind::Serial));
        assert_eq!(" BLE ".parse::<TransportKind>(), Ok(TransportKind::Ble));
        assert_eq!("gatt".parse::<TransportKind>(), Ok(TransportKind::Ble));
        assert!("usb".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_clamp_management_value() {
        assert_eq!(clamp_management_value(70.0), 70);
        assert_eq!(clamp_management_value(69.6), 70);
        assert_eq!(clamp_management_value(69.4), 69);
        assert_eq!(clamp_management_value(-5.0), 0);
        assert_eq!(clamp_management_value(f64::NAN), 0);
    }

    #[test]
    fn test_marker_fallback_flag_parsing() {
        env::set_var("GATEWAY_TEST_FALLBACK_ON", "true");
        assert!(parse_var("GATEWAY_TEST_FALLBACK_ON", false).unwrap());

        env::remove_var("GATEWAY_TEST_FALLBACK_UNSET");
        assert!(!parse_var("GATEWAY_TEST_FALLBACK_UNSET", false).unwrap());

        env::set_var("GATEWAY_TEST_FALLBACK_BAD", "sometimes");
        assert!(parse_var("GATEWAY_TEST_FALLBACK_BAD", false).is_err());
    }

    #[test]
    fn test_parse_var_default_and_invalid() {
        // Keys are unique to this test so parallel tests can't interfere
        env::remove_var("GATEWAY_TEST_UNSET");
        assert_eq!(parse_var("GATEWAY_TEST_UNSET", 7u64).unwrap(), 7);

        env::set_var("GATEWAY_TEST_NUMBER", " 42 ");
        assert_eq!(parse_var("GATEWAY_TEST_NUMBER", 0u64).unwrap(), 42);

        env::set_var("GATEWAY_TEST_BAD", "forty");
        assert!(parse_var("GATEWAY_TEST_BAD", 0u64).is_err());
    }
}
