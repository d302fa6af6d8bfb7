//! Single-connection lifecycle management.
//!
//! The manager enforces "at most one active or in-flight connection".
//! A new connect supersedes whatever is running: an in-flight attempt has
//! its half-open stream closed, an established connection is torn down,
//! and only the newest attempt is allowed to report a completion. Every
//! state transition and active-connection swap happens under one lock.
//!
//! Connect attempts run on their own thread because socket creation and
//! `connect` block. Each attempt carries a generation number; an attempt
//! that finds a newer generation when it resumes closes its stream and
//! exits without emitting anything.

use crate::domain::models::ConnectionState;
use crate::infrastructure::bluetooth::adapter::{BluetoothAdapter, SerialStream};
use crate::infrastructure::bluetooth::connection::{Connection, ConnectionId, ConnectionSink};
use crate::infrastructure::bluetooth::error::TransportError;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Callbacks from the manager into the facade layer.
pub(crate) trait LinkCallbacks: Send + Sync {
    fn on_connection_success(&self, message: String);
    fn on_connection_failed(&self, reason: TransportError);
    fn on_connection_lost(&self, reason: Option<TransportError>);
    fn on_error(&self, error: &TransportError);
    fn on_data(&self, chunk: &[u8]);
}

struct ManagerState {
    state: ConnectionState,
    /// Generation counter; bumped by every connect and disconnect. An
    /// attempt whose number no longer matches has been superseded.
    attempt: u64,
    /// Half-open stream of the in-flight attempt, kept so a superseding
    /// call can close it and unblock the connect.
    pending_stream: Option<Arc<dyn SerialStream>>,
    active: Option<Connection>,
}

pub(crate) struct ConnectionManager {
    adapter: Arc<dyn BluetoothAdapter>,
    callbacks: Arc<dyn LinkCallbacks>,
    read_chunk_size: usize,
    inner: Mutex<ManagerState>,
}

enum AttemptError {
    /// A newer connect or disconnect took over; finish silently.
    Superseded,
    Failed(TransportError),
}

impl ConnectionManager {
    pub(crate) fn new(
        adapter: Arc<dyn BluetoothAdapter>,
        callbacks: Arc<dyn LinkCallbacks>,
        read_chunk_size: usize,
    ) -> Self {
        Self {
            adapter,
            callbacks,
            read_chunk_size,
            inner: Mutex::new(ManagerState {
                state: ConnectionState::Idle,
                attempt: 0,
                pending_stream: None,
                active: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Start a connection attempt to `peer_id`, superseding any attempt or
    /// connection currently in place.
    pub(crate) fn connect(self: &Arc<Self>, peer_id: &str) {
        info!("connect to {peer_id}");

        let (attempt, previous) = {
            let mut st = self.lock();
            if let Some(pending) = st.pending_stream.take() {
                let _ = pending.shutdown();
            }
            let previous = st.active.take();
            st.attempt += 1;
            st.state = ConnectionState::Connecting;
            (st.attempt, previous)
        };
        if let Some(conn) = previous {
            conn.close();
        }

        let manager = Arc::clone(self);
        let peer = peer_id.to_string();
        std::thread::spawn(move || manager.run_attempt(attempt, peer));
    }

    /// Tear everything down and return to `Idle`. Unconditional and
    /// idempotent; emits no events of its own.
    pub(crate) fn disconnect(&self) {
        let (pending, previous) = {
            let mut st = self.lock();
            st.attempt += 1;
            st.state = ConnectionState::Idle;
            (st.pending_stream.take(), st.active.take())
        };
        if let Some(stream) = pending {
            let _ = stream.shutdown();
        }
        if let Some(conn) = previous {
            conn.close();
        }
        debug!("disconnected");
    }

    /// Forward bytes to the active connection. A write while not connected
    /// is a no-op, not an error. Write failures are reported but do not
    /// close the connection; only read failures do.
    pub(crate) fn write(&self, bytes: &[u8]) {
        let stream = {
            let st = self.lock();
            if st.state != ConnectionState::Connected {
                debug!("write ignored, not connected");
                return;
            }
            st.active.as_ref().map(Connection::stream)
        };
        // Write outside the lock so a slow peer cannot stall state changes
        if let Some(stream) = stream {
            if let Err(e) = stream.write_all(bytes) {
                warn!("write failed: {e}");
                self.callbacks.on_error(&TransportError::WriteFailed(e));
            }
        }
    }

    fn run_attempt(self: Arc<Self>, attempt: u64, peer_id: String) {
        // Discovery competes with RFCOMM connects for the radio
        let _ = self.adapter.cancel_discovery();

        let stream = match self.open_and_connect(attempt, &peer_id, false) {
            Ok(stream) => stream,
            Err(AttemptError::Superseded) => {
                debug!(attempt, "attempt superseded");
                return;
            }
            Err(AttemptError::Failed(primary)) => {
                warn!("connect to {peer_id} failed: {primary}, trying fallback socket");
                self.callbacks.on_error(&primary);
                match self.open_and_connect(attempt, &peer_id, true) {
                    Ok(stream) => stream,
                    Err(AttemptError::Superseded) => return,
                    Err(AttemptError::Failed(fallback)) => {
                        warn!("fallback connect to {peer_id} failed: {fallback}");
                        self.finish_failed(attempt, fallback);
                        return;
                    }
                }
            }
        };

        self.finish_connected(attempt, stream, &peer_id);
    }

    /// One socket-creation strategy plus the blocking connect.
    fn open_and_connect(
        &self,
        attempt: u64,
        peer_id: &str,
        fallback: bool,
    ) -> Result<Arc<dyn SerialStream>, AttemptError> {
        let created = if fallback {
            self.adapter.create_stream_fallback(peer_id)
        } else {
            self.adapter.create_stream(peer_id)
        };
        let stream: Arc<dyn SerialStream> = match created {
            Ok(stream) => Arc::from(stream),
            Err(e) => return Err(AttemptError::Failed(e)),
        };

        // Publish the half-open stream so a superseding call can close it
        // and unblock the connect below.
        {
            let mut st = self.lock();
            if st.attempt != attempt {
                drop(st);
                let _ = stream.shutdown();
                return Err(AttemptError::Superseded);
            }
            st.pending_stream = Some(Arc::clone(&stream));
        }

        debug!(attempt, "connecting socket");
        match stream.connect() {
            Ok(()) => Ok(stream),
            Err(e) => {
                let superseded = {
                    let mut st = self.lock();
                    if st.attempt == attempt {
                        st.pending_stream = None;
                        false
                    } else {
                        true
                    }
                };
                if superseded {
                    Err(AttemptError::Superseded)
                } else {
                    let _ = stream.shutdown();
                    Err(AttemptError::Failed(TransportError::SocketConnect(e)))
                }
            }
        }
    }

    fn finish_connected(self: &Arc<Self>, attempt: u64, stream: Arc<dyn SerialStream>, peer_id: &str) {
        let mut st = self.lock();
        if st.attempt != attempt {
            drop(st);
            let _ = stream.shutdown();
            return;
        }
        st.pending_stream = None;
        st.state = ConnectionState::Connected;
        info!("connected to {peer_id}");

        // Success is reported before the reader thread exists, so no data
        // frame can be observed ahead of it.
        self.callbacks
            .on_connection_success(format!("Connected to {peer_id}"));

        let sink: Arc<dyn ConnectionSink> = Arc::clone(self) as Arc<dyn ConnectionSink>;
        st.active = Some(Connection::spawn(attempt, stream, sink, self.read_chunk_size));
    }

    fn finish_failed(&self, attempt: u64, reason: TransportError) {
        {
            let mut st = self.lock();
            if st.attempt != attempt {
                return;
            }
            st.pending_stream = None;
            st.state = ConnectionState::Idle;
        }
        self.callbacks.on_connection_failed(reason);
    }
}

impl ConnectionSink for ConnectionManager {
    fn on_data(&self, id: ConnectionId, chunk: &[u8]) {
        let live = {
            let st = self.lock();
            st.active.as_ref().map(Connection::id) == Some(id)
        };
        if !live {
            // Chunk from a connection already superseded or torn down
            return;
        }
        self.callbacks.on_data(chunk);
    }

    fn on_closed(&self, id: ConnectionId, cause: Option<io::Error>) {
        let lost = {
            let mut st = self.lock();
            if st.active.as_ref().map(Connection::id) == Some(id) {
                st.active = None;
                st.state = ConnectionState::Idle;
                true
            } else {
                false
            }
        };
        if lost {
            info!(id, "connection lost");
            self.callbacks.on_connection_lost(
                cause.map(|e| TransportError::ConnectionLost(e.to_string())),
            );
        }
    }
}
