//! Listener binding and shutdown wiring.

use std::fmt::Display;
use std::io;
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use tiny_http::Server;

use crate::core::{register_server, register_shutdown_signal};
use crate::log;
use crate::reload::Hub;

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// How often the live reload accept loop checks for shutdown.
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// Bind with `bind`, walking up from `base_port` while ports are taken.
///
/// Port 0 asks the OS for a free port and is tried once.
fn bind_retrying<T, E: Display>(
    interface: IpAddr,
    base_port: u16,
    mut bind: impl FnMut(SocketAddr) -> Result<T, E>,
) -> Result<T> {
    let attempts = if base_port == 0 { 1 } else { MAX_PORT_RETRIES };
    let mut last_error = String::new();

    for offset in 0..attempts {
        let Some(port) = base_port.checked_add(offset) else {
            break;
        };
        match bind(SocketAddr::new(interface, port)) {
            Ok(bound) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok(bound);
            }
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(anyhow!(
        "failed to bind {} after {} attempts (starting at port {}): {}",
        interface,
        attempts,
        base_port,
        last_error
    ))
}

/// Bind an HTTP server, returning it with the address actually bound.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let server = bind_retrying(interface, base_port, Server::http)?;
    let addr = server
        .server_addr()
        .to_ip()
        .ok_or_else(|| anyhow!("server is not bound to an IP address"))?;
    Ok((server, addr))
}

/// Bind the live reload TCP listener.
pub fn bind_listener_with_retry(
    interface: IpAddr,
    base_port: u16,
) -> Result<(TcpListener, SocketAddr)> {
    let listener = bind_retrying(interface, base_port, TcpListener::bind)?;
    let addr = listener.local_addr()?;
    Ok((listener, addr))
}

/// Register servers with the Ctrl+C handler and create the shutdown signal.
pub fn register_for_shutdown(servers: &[&Arc<Server>]) -> Receiver<()> {
    for server in servers {
        register_server(Arc::clone(server));
    }
    let (shutdown_tx, shutdown_rx) = channel::unbounded();
    register_shutdown_signal(shutdown_tx);
    shutdown_rx
}

/// Accept live reload connections until shutdown, handing each to `hub`.
pub fn spawn_ws_acceptor(
    listener: TcpListener,
    hub: Hub,
    shutdown_rx: Receiver<()>,
) -> Result<JoinHandle<()>> {
    listener.set_nonblocking(true)?;
    Ok(thread::spawn(move || {
        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    crate::debug!("ws"; "connection from {}", peer);
                    if let Err(e) = hand_over(&hub, stream) {
                        crate::debug!("ws"; "dropping {}: {}", peer, e);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    match shutdown_rx.recv_timeout(ACCEPT_POLL) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                Err(e) => crate::debug!("ws"; "accept failed: {}", e),
            }
            if crate::core::is_shutdown() {
                break;
            }
        }
    }))
}

/// Accepted sockets may inherit non-blocking mode from the listener.
fn hand_over(hub: &Hub, stream: TcpStream) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    hub.subscribe(stream);
    Ok(())
}

/// Join a background thread, giving up after two seconds.
pub fn wait_for(handle: JoinHandle<()>) {
    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[test]
    fn test_port_zero_picks_free_port() {
        let (_server, addr) = bind_with_retry(LOCALHOST, 0).unwrap();
        assert_ne!(addr.port(), 0);
        let (_listener, ws_addr) = bind_listener_with_retry(LOCALHOST, 0).unwrap();
        assert_ne!(ws_addr.port(), 0);
    }

    #[test]
    fn test_taken_port_moves_up() {
        let (taken, addr) = bind_listener_with_retry(LOCALHOST, 0).unwrap();
        let base = addr.port();
        // The next port may be taken by another process; only check the skip
        if let Ok((_listener, next)) = bind_listener_with_retry(LOCALHOST, base) {
            assert!(next.port() > base && next.port() < base.saturating_add(MAX_PORT_RETRIES));
        }
        drop(taken);
    }

    #[test]
    fn test_bind_error_reported() {
        let err = bind_retrying(LOCALHOST, 4000, |_| Err::<(), _>("boom")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("10 attempts"), "{message}");
        assert!(message.contains("boom"), "{message}");
    }

    #[test]
    fn test_acceptor_stops_on_signal() {
        let (listener, _) = bind_listener_with_retry(LOCALHOST, 0).unwrap();
        let (tx, rx) = channel::unbounded();
        let handle = spawn_ws_acceptor(listener, Hub::new(), rx).unwrap();
        tx.send(()).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !handle.is_finished() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(handle.is_finished());
    }
}
