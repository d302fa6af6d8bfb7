//! Established-connection handling.
//!
//! A [`Connection`] owns one connected duplex stream and its dedicated
//! reader thread. The reader performs blocking reads and forwards each
//! chunk to the sink; a read error or end-of-stream stops the loop and
//! reports the closure. No retry and no backoff here: the connection
//! manager decides what happens next.

use crate::infrastructure::bluetooth::adapter::SerialStream;
use std::io;
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) type ConnectionId = u64;

/// Callbacks invoked from a connection's reader thread.
pub(crate) trait ConnectionSink: Send + Sync {
    fn on_data(&self, id: ConnectionId, chunk: &[u8]);
    fn on_closed(&self, id: ConnectionId, cause: Option<io::Error>);
}

pub(crate) struct Connection {
    id: ConnectionId,
    stream: Arc<dyn SerialStream>,
}

impl Connection {
    /// Wrap an already-connected stream and start its reader thread.
    pub(crate) fn spawn(
        id: ConnectionId,
        stream: Arc<dyn SerialStream>,
        sink: Arc<dyn ConnectionSink>,
        read_chunk_size: usize,
    ) -> Self {
        let reader_stream = Arc::clone(&stream);
        std::thread::spawn(move || {
            debug!(id, "reader loop started");
            let mut buf = vec![0u8; read_chunk_size.max(1)];
            loop {
                match reader_stream.read(&mut buf) {
                    Ok(0) => {
                        debug!(id, "stream ended");
                        sink.on_closed(id, None);
                        break;
                    }
                    Ok(n) => sink.on_data(id, &buf[..n]),
                    Err(e) => {
                        warn!(id, "read failed: {e}");
                        sink.on_closed(id, Some(e));
                        break;
                    }
                }
            }
            debug!(id, "reader loop exited");
        });

        Self { id, stream }
    }

    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }

    pub(crate) fn stream(&self) -> Arc<dyn SerialStream> {
        Arc::clone(&self.stream)
    }

    /// Close the underlying stream, unblocking the reader thread. Safe to
    /// call from any thread, any number of times.
    pub(crate) fn close(&self) {
        if let Err(e) = self.stream.shutdown() {
            warn!(id = self.id, "shutdown failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Condvar, Mutex};
    use std::time::Duration;

    /// Stream scripted with a fixed chunk sequence, then end-of-stream.
    struct ScriptedStream {
        chunks: Mutex<Vec<Vec<u8>>>,
        closed: AtomicBool,
    }

    impl SerialStream for ScriptedStream {
        fn connect(&self) -> io::Result<()> {
            Ok(())
        }

        fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            let mut chunks = self.chunks.lock().unwrap();
            if chunks.is_empty() {
                return Ok(0);
            }
            let chunk = chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }

        fn write_all(&self, _buf: &[u8]) -> io::Result<()> {
            Ok(())
        }

        fn shutdown(&self) -> io::Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        state: Mutex<(Vec<Vec<u8>>, bool)>,
        done: Condvar,
    }

    impl RecordingSink {
        fn wait_closed(&self) -> Vec<Vec<u8>> {
            let guard = self.state.lock().unwrap();
            let (guard, timeout) = self
                .done
                .wait_timeout_while(guard, Duration::from_secs(5), |(_, closed)| !*closed)
                .unwrap();
            assert!(!timeout.timed_out(), "reader never reported closure");
            guard.0.clone()
        }
    }

    impl ConnectionSink for RecordingSink {
        fn on_data(&self, _id: ConnectionId, chunk: &[u8]) {
            self.state.lock().unwrap().0.push(chunk.to_vec());
        }

        fn on_closed(&self, _id: ConnectionId, _cause: Option<io::Error>) {
            self.state.lock().unwrap().1 = true;
            self.done.notify_all();
        }
    }

    #[test]
    fn reader_forwards_chunks_then_reports_end_of_stream() {
        let stream = Arc::new(ScriptedStream {
            chunks: Mutex::new(vec![b"ab".to_vec(), b"cde".to_vec()]),
            closed: AtomicBool::new(false),
        });
        let sink = Arc::new(RecordingSink::default());

        let _conn = Connection::spawn(1, stream, sink.clone(), 16);

        let chunks = sink.wait_closed();
        assert_eq!(chunks, vec![b"ab".to_vec(), b"cde".to_vec()]);
    }
}
