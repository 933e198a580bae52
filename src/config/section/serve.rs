//! `[serve]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 0                    # Viewer port (0 = pick a free port)
//! asset_port = 0              # Raw-file origin port (0 = pick a free port)
//! ws_port = 0                 # Live reload port (0 = pick a free port)
//! watch = true                # Push change events to open tabs
//! open = true                 # Open the browser after startup
//! threads = 4                 # Request handler pool size
//! ```
//!
//! Repository files are served from a second origin so that HTML inside the
//! repository cannot script the viewer.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

/// Server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// Viewer port. Non-zero ports are retried upwards when taken.
    pub port: u16,

    /// Raw repository file origin port.
    pub asset_port: u16,

    /// Live reload WebSocket port.
    pub ws_port: u16,

    /// Enable the file watcher and live reload.
    pub watch: bool,

    /// Open the viewer in the default browser.
    pub open: bool,

    /// Number of request handler threads.
    pub threads: usize,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 0,
            asset_port: 0,
            ws_port: 0,
            watch: true,
            open: true,
            threads: 4,
        }
    }
}
