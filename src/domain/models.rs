use serde::{Deserialize, Serialize};

/// A remote Bluetooth peer, as reported by the platform adapter.
///
/// Always read fresh from the bonded-device list or a discovery scan;
/// never cached by the transport core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDevice {
    /// Platform-stable address string ("AA:BB:CC:DD:EE:FF" on most stacks).
    pub id: String,
    /// Display name, if the peer advertised one.
    pub name: Option<String>,
    /// Bluetooth device-class code, if known.
    pub class: Option<u32>,
}

impl PeerDevice {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            class: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Connection lifecycle state. Exactly one value at a time, mutated only
/// under the connection manager's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and no attempt in flight.
    Idle,
    /// An outgoing connection attempt is in progress.
    Connecting,
    /// A duplex stream to a remote peer is established.
    Connected,
}

/// Events delivered to transport subscribers.
///
/// Fire-and-forget: subscribers that lag are not replayed missed events.
/// For a given connection attempt the order is success/failure, then zero
/// or more data frames, then lost.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The platform adapter turned on.
    AdapterEnabled,
    /// The platform adapter turned off.
    AdapterDisabled,
    /// An outgoing connection attempt succeeded.
    ConnectionSuccess { message: String },
    /// An outgoing connection attempt failed (after the fallback strategy).
    ConnectionFailed { message: String },
    /// An established connection dropped.
    ConnectionLost { message: String },
    /// One delimiter-terminated frame extracted from the inbound stream.
    DataFrame { data: String },
    /// An operation-scoped failure; does not imply connection teardown.
    Error { message: String },
}
