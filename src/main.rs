//! SVS plugin services
//!
//! Response and request micro services for an identity federation proxy:
//! a file alias resolver, an IdP metadata info extractor and a user
//! consent step with an audit log. Runs standalone behind the proxy.

mod alias;
mod config;
mod consent;
mod error;
mod host;
mod metainfo;
mod server;
mod session;
mod transaction;

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use config::SvsConfig;
use metainfo::MetadataStore;
use server::Gateway;
use session::{spawn_cleanup_task, SessionStore};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "svs-plugins")]
#[command(about = "Alias, metadata info and consent services for the SVS proxy")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(long, short = 'c', default_value = "/etc/svs/plugins.json", env = "SVS_CONFIG")]
    config: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8090", env = "SVS_LISTEN")]
    listen: SocketAddr,

    /// Enable verbose logging
    #[arg(short, long, env = "SVS_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "{}={},transaction=info",
            env!("CARGO_CRATE_NAME"),
            log_level
        ))
        .json()
        .init();

    info!("Starting SVS plugin services");

    let config = SvsConfig::load(&args.config)?;
    info!(
        config = ?args.config,
        alias_locations = config.alias.locations.len(),
        consent_attributes = config.consent.attributes.len(),
        "Configuration loaded"
    );

    let metadata = match config.metainfo.metadata_path.as_deref() {
        Some(path) if config.metainfo.enabled => {
            let store = MetadataStore::load(std::path::Path::new(path))?;
            info!(path = %path, entities = store.len(), "Metadata store loaded");
            Some(Arc::new(store))
        }
        _ => None,
    };

    let session_store = Arc::new(
        SessionStore::open(
            PathBuf::from(&config.session.store_path),
            config.session.ttl_secs,
        )
        .context("Failed to initialize session store")?,
    );
    info!(path = %config.session.store_path, "Session store initialized");

    let _cleanup_handle = spawn_cleanup_task(
        Arc::clone(&session_store),
        config.session.cleanup_interval_secs,
    );

    let gateway = Arc::new(Gateway::from_config(&config, session_store, metadata));
    let app = server::router(gateway);

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    info!(listen = %args.listen, "Serving");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["svs-plugins"]);
        assert_eq!(args.listen.port(), 8090);
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_override() {
        let args = Args::parse_from([
            "svs-plugins",
            "--config",
            "/tmp/svs.json",
            "--listen",
            "0.0.0.0:9000",
            "-v",
        ]);
        assert_eq!(args.config, PathBuf::from("/tmp/svs.json"));
        assert_eq!(args.listen.port(), 9000);
        assert!(args.verbose);
    }
}
