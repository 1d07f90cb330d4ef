//! User consent workflow.
//!
//! Filters the released attributes, parks the response in the session,
//! shows a consent page and then either forwards the response or aborts
//! the authentication. Accepted consents are written to an audit log.

pub mod audit;
pub mod config;
pub mod page;
pub mod service;
pub mod state;

pub use audit::{AuditLog, AuditRecord};
pub use config::ConsentConfig;
pub use service::UserConsent;
pub use state::ConsentState;
