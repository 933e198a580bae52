//! Broadcast hub for live-reload WebSocket clients.
//!
//! # Architecture
//!
//! ```text
//! accept loop ──subscribe──► [handshake + receive loop]  (one thread per client)
//!                                      │ registers
//!                                      ▼
//! watcher ──broadcast──► clients: id → WebSocket ──► browsers
//! ```
//!
//! Only the per-client receive loop removes a client (on close or read
//! error). A failed write during broadcast is logged and otherwise ignored;
//! delivery is best-effort and at most once.

use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::message::{ChangeEvent, EventSink};

/// Receive-loop poll interval while the socket has nothing to read.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

type Client = Arc<Mutex<WebSocket<TcpStream>>>;

struct Inner {
    clients: Mutex<FxHashMap<u64, Client>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

/// Set of live connections. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<Inner>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                clients: Mutex::new(FxHashMap::default()),
                next_id: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Take over a freshly accepted TCP connection.
    ///
    /// Handshake and liveness polling run on a dedicated thread, so this
    /// returns immediately.
    pub fn subscribe(&self, stream: TcpStream) {
        if self.inner.closed.load(Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        thread::spawn(move || Self::serve_client(&inner, stream));
    }

    fn serve_client(inner: &Inner, stream: TcpStream) {
        // Blocking during the handshake, non-blocking once registered
        let ws = match tungstenite::accept(stream) {
            Ok(ws) => ws,
            Err(e) => {
                crate::debug!("ws"; "handshake failed: {}", e);
                return;
            }
        };
        if let Err(e) = ws.get_ref().set_nonblocking(true) {
            crate::debug!("ws"; "set_nonblocking failed: {}", e);
            return;
        }

        let id = inner.next_id.fetch_add(1, Ordering::SeqCst);
        let client: Client = Arc::new(Mutex::new(ws));
        {
            let mut clients = inner.clients.lock();
            // Shutdown may have drained the map while we were handshaking
            if inner.closed.load(Ordering::SeqCst) {
                let _ = client.lock().close(None);
                return;
            }
            clients.insert(id, Arc::clone(&client));
            crate::debug!("ws"; "client connected (total: {})", clients.len());
        }

        Self::receive_loop(inner, &client);

        let remaining = {
            let mut clients = inner.clients.lock();
            clients.remove(&id);
            clients.len()
        };
        crate::debug!("ws"; "client disconnected (total: {})", remaining);
    }

    /// Liveness detection: return once the client is gone.
    fn receive_loop(inner: &Inner, client: &Client) {
        loop {
            if inner.closed.load(Ordering::SeqCst) {
                return;
            }
            let read = client.lock().read();
            match read {
                Ok(Message::Close(_)) => {
                    // Let tungstenite finish the closing handshake
                    let _ = client.lock().flush();
                    return;
                }
                Ok(_) => {}
                Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(POLL_INTERVAL);
                }
                Err(_) => return,
            }
        }
    }

    /// Send `event` to every registered client.
    pub fn broadcast(&self, event: &ChangeEvent) {
        if self.inner.closed.load(Ordering::SeqCst) {
            return;
        }
        let json = event.to_json();
        // Snapshot so slow sockets never block subscribe/remove
        let clients: Vec<Client> = self.inner.clients.lock().values().cloned().collect();
        if clients.is_empty() {
            crate::debug!("ws"; "no clients connected");
            return;
        }

        for client in &clients {
            let mut ws = client.lock();
            match ws.send(Message::Text(json.clone().into())) {
                Ok(()) => {}
                // Queued; flushed by the next read or write
                Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => crate::debug!("ws"; "send failed: {}", e),
            }
        }
        crate::debug!("ws"; "broadcast to {} clients: {}", clients.len(), json);
    }

    #[cfg(test)]
    pub fn client_count(&self) -> usize {
        self.inner.clients.lock().len()
    }

    /// Stop accepting clients and close every connection. Idempotent.
    pub fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let clients: Vec<Client> = self.inner.clients.lock().drain().map(|(_, c)| c).collect();
        for client in clients {
            let mut ws = client.lock();
            let _ = ws.close(None);
            let _ = ws.flush();
        }
        crate::debug!("ws"; "hub closed");
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl EventSink for Hub {
    fn send_event(&self, event: ChangeEvent) {
        self.broadcast(&event);
    }
}
