//! Bluetooth Serial transport facade.
//!
//! [`BluetoothSerial`] is the boundary the UI layer talks to: it exposes
//! the request/response operations (enable, list, discover, pair, connect,
//! write, framed reads) and a broadcast event stream. At most one request
//! per kind is outstanding at a time; issuing another of the same kind
//! resolves the previous caller with `RequestSuperseded` and takes over
//! the slot.
//!
//! Platform flows that complete asynchronously (the enable prompt, a
//! discovery scan, bonding) are finished through the `notify_*` methods,
//! which the platform glue calls on the facade instance it was handed at
//! construction time.

use crate::domain::models::{ConnectionState, PeerDevice, TransportEvent};
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::adapter::BluetoothAdapter;
use crate::infrastructure::bluetooth::error::TransportError;
use crate::infrastructure::bluetooth::framing::{decode_latin1, encode_latin1, FrameBuffer};
use crate::infrastructure::bluetooth::manager::{ConnectionManager, LinkCallbacks};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

/// Single outstanding-request slot. Registering a new request resolves the
/// previous one with [`TransportError::RequestSuperseded`].
struct RequestSlot<T> {
    slot: Mutex<Option<oneshot::Sender<Result<T, TransportError>>>>,
}

impl<T> RequestSlot<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    fn begin(&self) -> oneshot::Receiver<Result<T, TransportError>> {
        let (tx, rx) = oneshot::channel();
        let stale = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            slot.replace(tx)
        };
        if let Some(stale) = stale {
            let _ = stale.send(Err(TransportError::RequestSuperseded));
        }
        rx
    }

    /// Resolve the outstanding request, if any. Returns whether one was
    /// resolved; a slot is consumed exactly once.
    fn resolve(&self, result: Result<T, TransportError>) -> bool {
        let taken = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            slot.take()
        };
        match taken {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }
}

async fn await_slot<T>(
    rx: oneshot::Receiver<Result<T, TransportError>>,
) -> Result<T, TransportError> {
    match rx.await {
        Ok(result) => result,
        // Sender dropped without resolving; treat as superseded
        Err(_) => Err(TransportError::RequestSuperseded),
    }
}

struct PendingRequests {
    enable: RequestSlot<bool>,
    connect: RequestSlot<String>,
    discover: RequestSlot<Vec<PeerDevice>>,
    pair: RequestSlot<bool>,
}

struct Inbound {
    buffer: FrameBuffer,
    delimiter: String,
}

/// Shared state between the facade surface and the manager callbacks.
struct LinkCore {
    events: broadcast::Sender<TransportEvent>,
    inbound: Mutex<Inbound>,
    requests: PendingRequests,
    discovered: Mutex<Vec<PeerDevice>>,
    max_buffered_bytes: usize,
}

impl LinkCore {
    fn inbound(&self) -> MutexGuard<'_, Inbound> {
        self.inbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: TransportEvent) {
        // No subscribers is fine; events are fire-and-forget
        let _ = self.events.send(event);
    }

    fn emit_error(&self, error: &TransportError) {
        self.emit(TransportEvent::Error {
            message: error.to_string(),
        });
    }
}

impl LinkCallbacks for LinkCore {
    fn on_connection_success(&self, message: String) {
        self.emit(TransportEvent::ConnectionSuccess {
            message: message.clone(),
        });
        self.requests.connect.resolve(Ok(message));
    }

    fn on_connection_failed(&self, reason: TransportError) {
        self.emit_error(&reason);
        self.emit(TransportEvent::ConnectionFailed {
            message: "Unable to connect to device".to_string(),
        });
        self.requests.connect.resolve(Err(reason));
    }

    fn on_connection_lost(&self, reason: Option<TransportError>) {
        if let Some(reason) = reason {
            self.emit_error(&reason);
        }
        self.emit(TransportEvent::ConnectionLost {
            message: "Device connection was lost".to_string(),
        });
    }

    fn on_error(&self, error: &TransportError) {
        self.emit_error(error);
    }

    fn on_data(&self, chunk: &[u8]) {
        let frame = {
            let mut inbound = self.inbound();
            inbound.buffer.append(chunk);

            if inbound.buffer.len() > self.max_buffered_bytes {
                inbound.buffer.clear();
                drop(inbound);
                let err = TransportError::BufferOverflow {
                    limit: self.max_buffered_bytes,
                };
                warn!("{err}");
                self.emit_error(&err);
                return;
            }

            // One extraction per inbound chunk: a second complete frame
            // stays buffered until the next read triggers another pass.
            match encode_latin1(&inbound.delimiter) {
                Some(delim) if !delim.is_empty() => inbound.buffer.extract_until(&delim),
                _ => None,
            }
        };

        if let Some(frame) = frame {
            self.emit(TransportEvent::DataFrame {
                data: decode_latin1(&frame),
            });
        }
    }
}

/// Bluetooth Serial transport: the public API of this crate.
pub struct BluetoothSerial {
    adapter: Arc<dyn BluetoothAdapter>,
    manager: Arc<ConnectionManager>,
    core: Arc<LinkCore>,
}

impl BluetoothSerial {
    pub fn new(adapter: Arc<dyn BluetoothAdapter>, settings: &Settings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let core = Arc::new(LinkCore {
            events,
            inbound: Mutex::new(Inbound {
                buffer: FrameBuffer::new(),
                delimiter: settings.delimiter.clone(),
            }),
            requests: PendingRequests {
                enable: RequestSlot::new(),
                connect: RequestSlot::new(),
                discover: RequestSlot::new(),
                pair: RequestSlot::new(),
            },
            discovered: Mutex::new(Vec::new()),
            max_buffered_bytes: settings.max_buffered_bytes,
        });

        let callbacks: Arc<dyn LinkCallbacks> = Arc::clone(&core) as Arc<dyn LinkCallbacks>;
        let manager = Arc::new(ConnectionManager::new(
            Arc::clone(&adapter),
            callbacks,
            settings.read_chunk_size,
        ));

        if let Some(name) = &settings.adapter_name {
            if let Err(e) = adapter.set_name(name) {
                warn!("could not set adapter name: {e}");
            }
        }

        // Report the adapter state to whoever subscribes first thing
        if adapter.is_enabled() {
            core.emit(TransportEvent::AdapterEnabled);
        } else {
            core.emit(TransportEvent::AdapterDisabled);
        }

        info!("bluetooth serial transport started");
        Self {
            adapter,
            manager,
            core,
        }
    }

    /// Subscribe to the transport event stream. Missed events are not
    /// replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.core.events.subscribe()
    }

    pub fn is_enabled(&self) -> bool {
        self.adapter.is_enabled()
    }

    /// Power the adapter on without the platform prompt.
    pub fn enable(&self) -> Result<bool, TransportError> {
        if !self.adapter.is_enabled() {
            self.adapter.enable()?;
        }
        Ok(true)
    }

    pub fn disable(&self) -> Result<bool, TransportError> {
        if self.adapter.is_enabled() {
            self.adapter.disable()?;
        }
        Ok(true)
    }

    /// Ask the user to enable the adapter. Resolves immediately when the
    /// adapter is already on; otherwise the platform prompt's outcome
    /// arrives through [`Self::notify_enable_result`].
    pub fn request_enable(&self) -> impl Future<Output = Result<bool, TransportError>> {
        let rx = if self.adapter.is_enabled() {
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(Ok(true));
            rx
        } else {
            let rx = self.core.requests.enable.begin();
            if let Err(e) = self.adapter.request_enable() {
                warn!("enable request failed: {e}");
                self.core.emit_error(&e);
                self.core.requests.enable.resolve(Err(e));
            }
            rx
        };
        await_slot(rx)
    }

    pub fn set_adapter_name(&self, name: &str) -> Result<bool, TransportError> {
        self.adapter.set_name(name)?;
        Ok(true)
    }

    /// Peers the platform has already bonded with.
    pub fn list(&self) -> Result<Vec<PeerDevice>, TransportError> {
        self.adapter.bonded_peers()
    }

    /// Scan for unpaired peers. Resolves with everything found once the
    /// platform reports the scan window closed.
    pub fn discover_unpaired(&self) -> impl Future<Output = Result<Vec<PeerDevice>, TransportError>> {
        debug!("discover unpaired peers");
        let rx = self.core.requests.discover.begin();
        self.core
            .discovered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        if let Err(e) = self.adapter.start_discovery() {
            warn!("discovery failed to start: {e}");
            self.core.emit_error(&e);
            self.core.requests.discover.resolve(Err(e));
        }
        await_slot(rx)
    }

    pub fn cancel_discovery(&self) -> bool {
        if let Err(e) = self.adapter.cancel_discovery() {
            self.core.emit_error(&e);
        }
        true
    }

    /// Start bonding with a peer; completion arrives through
    /// [`Self::notify_bond_changed`].
    pub fn pair(&self, peer_id: &str) -> impl Future<Output = Result<bool, TransportError>> {
        debug!("pair {peer_id}");
        let rx = self.core.requests.pair.begin();
        if let Err(e) = self.adapter.create_bond(peer_id) {
            warn!("pairing failed to start: {e}");
            self.core.emit_error(&e);
            self.core.requests.pair.resolve(Err(e));
        }
        await_slot(rx)
    }

    pub fn unpair(&self, peer_id: &str) -> impl Future<Output = Result<bool, TransportError>> {
        debug!("unpair {peer_id}");
        let rx = self.core.requests.pair.begin();
        if let Err(e) = self.adapter.remove_bond(peer_id) {
            warn!("unpairing failed to start: {e}");
            self.core.emit_error(&e);
            self.core.requests.pair.resolve(Err(e));
        }
        await_slot(rx)
    }

    /// Connect to a peer. Supersedes any attempt or connection currently
    /// in place; only the newest request is ever resolved.
    pub fn connect(&self, peer_id: &str) -> impl Future<Output = Result<String, TransportError>> {
        let rx = self.core.requests.connect.begin();
        self.manager.connect(peer_id);
        await_slot(rx)
    }

    /// Tear down the connection, if any. Always succeeds.
    pub fn disconnect(&self) -> bool {
        self.manager.disconnect();
        true
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Queue raw bytes for the peer. Accepted (not delivery-confirmed);
    /// a write while disconnected is a no-op.
    pub fn write(&self, bytes: &[u8]) -> bool {
        self.manager.write(bytes);
        true
    }

    /// Write a base64-encoded payload, as delivered by the UI bridge.
    pub fn write_base64(&self, payload: &str) -> Result<bool, TransportError> {
        let bytes = BASE64.decode(payload).map_err(TransportError::InvalidPayload)?;
        self.manager.write(&bytes);
        Ok(true)
    }

    /// Set the frame delimiter. Governs only future extractions; bytes
    /// already buffered are not reframed.
    pub fn set_delimiter(&self, delimiter: &str) -> bool {
        self.core.inbound().delimiter = delimiter.to_string();
        true
    }

    /// Return and clear everything currently buffered.
    pub fn read_available(&self) -> String {
        decode_latin1(&self.core.inbound().buffer.drain_all())
    }

    /// Extract one framed message, or return the empty string when no
    /// complete frame is buffered.
    pub fn read_until(&self, delimiter: &str) -> String {
        let mut inbound = self.core.inbound();
        match encode_latin1(delimiter) {
            Some(delim) => inbound
                .buffer
                .extract_until(&delim)
                .map(|frame| decode_latin1(&frame))
                .unwrap_or_default(),
            None => String::new(),
        }
    }

    /// Number of buffered inbound bytes.
    pub fn available(&self) -> usize {
        self.core.inbound().buffer.len()
    }

    /// Wipe the inbound buffer.
    pub fn clear(&self) -> bool {
        self.core.inbound().buffer.clear();
        true
    }

    // Platform notification surface: the platform glue calls these on the
    // facade instance it was given at construction time.

    /// Outcome of the platform enable prompt.
    pub fn notify_enable_result(&self, enabled: bool) {
        if enabled {
            debug!("user enabled bluetooth");
            self.core.requests.enable.resolve(Ok(true));
        } else {
            debug!("user did not enable bluetooth");
            self.core
                .requests
                .enable
                .resolve(Err(TransportError::UserDeclinedEnable));
        }
    }

    /// Adapter power state changed outside our control.
    pub fn notify_adapter_state(&self, enabled: bool) {
        if enabled {
            self.core.emit(TransportEvent::AdapterEnabled);
        } else {
            self.core.emit(TransportEvent::AdapterDisabled);
        }
    }

    /// A peer turned up during the discovery scan.
    pub fn notify_peer_found(&self, peer: PeerDevice) {
        debug!("peer found: {}", peer.id);
        self.core
            .discovered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(peer);
    }

    /// The discovery scan window closed.
    pub fn notify_discovery_finished(&self) {
        let found = {
            let mut discovered = self
                .core
                .discovered
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *discovered)
        };
        debug!("discovery finished, {} peers", found.len());
        self.core.requests.discover.resolve(Ok(found));
    }

    /// A bond was created or removed; resolves a pending pair/unpair.
    pub fn notify_bond_changed(&self, peer_id: &str, bonded: bool) {
        debug!("bond state for {peer_id}: bonded={bonded}");
        self.core.requests.pair.resolve(Ok(true));
    }
}
