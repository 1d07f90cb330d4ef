//! Session management for standalone serving.
//!
//! The proxy normally owns the session; when the services run on their
//! own, this module keeps each session's state bag in redb, with an
//! in-memory cache and background cleanup.

pub mod cleanup;
pub mod config;
pub mod store;
pub mod types;

pub use cleanup::spawn_cleanup_task;
pub use config::SessionConfig;
pub use store::SessionStore;
pub use types::{Session, SessionId};
