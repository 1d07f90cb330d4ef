//! File alias service.

pub mod config;
pub mod resolver;

pub use config::AliasConfig;
pub use resolver::AliasResolver;
