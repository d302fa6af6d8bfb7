//! Bluetooth Serial (SPP) transport.
//!
//! Turns one raw Bluetooth byte stream into delimiter-framed application
//! messages, with a connection lifecycle the UI layer drives through
//! request/response operations and observes through events.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    BluetoothSerial                       │
//! │  (Facade - operations, pending requests, event stream)   │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼──────────────┐
//!         │             │              │
//!         ▼             ▼              ▼
//! ┌────────────┐ ┌─────────────┐ ┌───────────┐
//! │ Connection │ │ Connection  │ │  Frame    │
//! │  Manager   │ │             │ │  Buffer   │
//! │            │ │ - reader    │ │           │
//! │ - at most  │ │   thread    │ │ - append  │
//! │   one link │ │ - blocking  │ │ - extract │
//! │ - supersede│ │   write     │ │   until   │
//! └─────┬──────┘ └─────────────┘ └───────────┘
//!       │
//!       ▼
//! ┌──────────────────┐
//! │ BluetoothAdapter │  platform port: adapter state, discovery,
//! │  + SerialStream  │  bonding, RFCOMM socket creation
//! └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`adapter`] - platform capability traits
//! - [`framing`] - delimiter-based stream reassembly
//! - [`connection`] - one stream, one reader thread
//! - [`manager`] - single-connection state machine
//! - [`service`] - the facade the UI layer talks to
//! - [`error`] - transport error taxonomy

pub mod adapter;
pub mod connection;
pub mod error;
pub mod framing;
pub mod manager;
pub mod service;

pub use adapter::{BluetoothAdapter, SerialStream};
pub use error::TransportError;
pub use framing::FrameBuffer;
pub use service::BluetoothSerial;
