//! Process-wide shutdown state.
//!
//! `SHUTDOWN` is set once by the Ctrl+C handler. Registered HTTP servers are
//! unblocked so their request loops return, and the shutdown channel wakes
//! background loops that wait on it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crossbeam::channel::Sender;
use parking_lot::Mutex;
use tiny_http::Server;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// HTTP servers to unblock on shutdown (app + asset origin)
static SERVERS: Mutex<Vec<Arc<Server>>> = Mutex::new(Vec::new());

/// Shutdown signal sender for background loops
static SHUTDOWN_TX: OnceLock<Sender<()>> = OnceLock::new();

/// Setup the global Ctrl+C handler. Call once at program start
///
/// Before any server is registered the process exits immediately,
/// afterwards shutdown is graceful.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        let servers = SERVERS.lock().clone();
        if servers.is_empty() {
            std::process::exit(0);
        }
        crate::log!("serve"; "shutting down...");
        request_shutdown();
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Register an HTTP server for graceful shutdown
pub fn register_server(server: Arc<Server>) {
    SERVERS.lock().push(server);
}

/// Register the sender half of the shutdown signal
pub fn register_shutdown_signal(tx: Sender<()>) {
    let _ = SHUTDOWN_TX.set(tx);
}

/// Flip the shutdown flag, wake background loops and unblock servers.
///
/// Safe to call more than once.
pub fn request_shutdown() {
    if SHUTDOWN.swap(true, Ordering::SeqCst) {
        return;
    }
    if let Some(tx) = SHUTDOWN_TX.get() {
        let _ = tx.send(());
    }
    for server in SERVERS.lock().iter() {
        server.unblock();
    }
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
