//! Platform Bluetooth capability port.
//!
//! The transport core never talks to a platform Bluetooth stack directly.
//! It is handed a [`BluetoothAdapter`] at construction time and calls
//! through it for adapter state, discovery, bonding, and RFCOMM socket
//! creation. Flows the platform completes asynchronously (the enable
//! prompt, a discovery scan, a bonding handshake) are *started* here and
//! *finished* through the notification methods on
//! [`super::service::BluetoothSerial`].

use crate::domain::models::PeerDevice;
use crate::infrastructure::bluetooth::error::TransportError;
use std::io;

/// One duplex RFCOMM byte stream to a remote peer.
///
/// Methods take `&self` so a single stream can be shared between the
/// dedicated reader thread, writer callers, and a closer on a third
/// thread. `connect` and `read` block; `shutdown` must force both to
/// return with an error, which is the only cancellation mechanism the
/// transport uses.
pub trait SerialStream: Send + Sync {
    /// Establish the connection. Blocking, single attempt, no retry.
    fn connect(&self) -> io::Result<()>;

    /// Blocking read. `Ok(0)` means the peer closed the stream.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write the whole buffer to the stream.
    fn write_all(&self, buf: &[u8]) -> io::Result<()>;

    /// Close the stream, unblocking any in-flight `connect` or `read`.
    /// Idempotent.
    fn shutdown(&self) -> io::Result<()>;
}

/// Platform Bluetooth adapter capability.
pub trait BluetoothAdapter: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Power the adapter on without user interaction.
    fn enable(&self) -> Result<(), TransportError>;

    /// Power the adapter off.
    fn disable(&self) -> Result<(), TransportError>;

    /// Open the platform enable prompt. The user's answer arrives later
    /// via `BluetoothSerial::notify_enable_result`.
    fn request_enable(&self) -> Result<(), TransportError>;

    fn set_name(&self, name: &str) -> Result<(), TransportError>;

    /// Peers the platform has bonded with. Read fresh on every call.
    fn bonded_peers(&self) -> Result<Vec<PeerDevice>, TransportError>;

    /// Start a discovery scan. Found peers and scan completion arrive via
    /// `notify_peer_found` / `notify_discovery_finished`.
    fn start_discovery(&self) -> Result<(), TransportError>;

    fn cancel_discovery(&self) -> Result<(), TransportError>;

    /// Start bonding with a peer. Completion arrives via
    /// `notify_bond_changed`.
    fn create_bond(&self, peer_id: &str) -> Result<(), TransportError>;

    fn remove_bond(&self, peer_id: &str) -> Result<(), TransportError>;

    /// Create an RFCOMM socket to `peer_id` (not yet connected).
    fn create_stream(&self, peer_id: &str) -> Result<Box<dyn SerialStream>, TransportError>;

    /// Alternative socket-creation strategy, tried once after the primary
    /// strategy fails. Some stacks need a different channel allocation.
    fn create_stream_fallback(
        &self,
        peer_id: &str,
    ) -> Result<Box<dyn SerialStream>, TransportError>;
}
