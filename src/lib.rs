//! Sensor stream gateway
//!
//! Connects to a sensor transmitter over Bluetooth (RFCOMM serial or the
//! Nordic UART GATT service), reassembles its text packets from the chunked
//! byte stream and decodes them into sensor records.
//!
//! - [`protocol`]: hex fields, packet decoding and line framing
//! - [`session`]: per-connection state and diagnostics
//! - [`bluetooth`]: discovery and the two link adapters
//! - [`database`]: optional PostgreSQL record sink

pub mod bluetooth;
pub mod config;
pub mod database;
pub mod models;
pub mod protocol;
pub mod session;
pub mod utils;
