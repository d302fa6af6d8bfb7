//! Bluetooth Serial (SPP) transport link for robotics peripherals.
//!
//! The crate manages a single serial-over-Bluetooth connection - discovery,
//! pairing, connect/disconnect, writes - and reassembles the inbound byte
//! stream into delimiter-framed messages delivered as events.

pub mod domain;
pub mod infrastructure;

pub use domain::models::{ConnectionState, PeerDevice, TransportEvent};
pub use domain::settings::{LogSettings, Settings, SettingsService};
pub use infrastructure::bluetooth::{
    BluetoothAdapter, BluetoothSerial, FrameBuffer, SerialStream, TransportError,
};
pub use infrastructure::logging::{init_logger, LoggingGuard};
