//! Live reload.
//!
//! ```text
//! RepoWatcher ──ChangeEvent──► Hub ──WebSocket──► Browser
//!  (notify)                  (broadcast)        (re-fetch)
//! ```
//!
//! # Modules
//!
//! - `message` - Change events pushed to clients
//! - `hub` - Connection set and fan-out
//! - `watcher` - Directory watches and event classification

pub mod hub;
pub mod message;
pub mod watcher;

pub use hub::Hub;
pub use watcher::RepoWatcher;
