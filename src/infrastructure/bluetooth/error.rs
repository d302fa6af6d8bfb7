//! Transport error taxonomy.
//!
//! Operation-scoped failures reject their own pending request and surface as
//! an `Error` event; they never tear the process down. Read failures close
//! the connection, write failures do not.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bluetooth adapter is not available")]
    AdapterUnavailable,

    #[error("user did not enable bluetooth")]
    UserDeclinedEnable,

    #[error("peer {0} not found")]
    PeerNotFound(String),

    #[error("socket create failed: {0}")]
    SocketCreate(#[source] std::io::Error),

    #[error("socket connect failed: {0}")]
    SocketConnect(#[source] std::io::Error),

    #[error("pairing with {peer} failed: {reason}")]
    PairingFailed { peer: String, reason: String },

    #[error("write failed: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("platform event subscription failed: {0}")]
    ReceiverRegistration(String),

    #[error("request superseded by a newer request of the same kind")]
    RequestSuperseded,

    #[error("inbound buffer exceeded {limit} bytes without a delimiter match")]
    BufferOverflow { limit: usize },

    #[error("write payload is not valid base64: {0}")]
    InvalidPayload(#[source] base64::DecodeError),
}
