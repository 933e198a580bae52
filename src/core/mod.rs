//! Core types - pure abstractions shared across the codebase.

mod error;
mod link;
mod state;

pub use error::{RepoError, RepoResult};
pub use link::LinkKind;
pub use state::{
    is_shutdown, register_server, register_shutdown_signal,
    setup_shutdown_handler,
};
