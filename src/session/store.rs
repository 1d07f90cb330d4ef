//! Session store backed by redb embedded database.
//!
//! Holds the state bag of every in-flight authentication between the
//! consent redirect and the user's decision:
//! - In-memory cache for hot sessions
//! - TTL-based expiry

use anyhow::{Context, Result};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::{debug, warn};

use super::types::{Session, SessionId};

/// redb table for sessions (key: session_id hex, value: MessagePack bytes).
const SESSIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("svs_sessions");

/// Session store with in-memory cache and persistent storage.
pub struct SessionStore {
    /// redb database handle.
    db: Database,

    /// In-memory cache for frequently accessed sessions.
    cache: RwLock<HashMap<SessionId, Session>>,

    /// Default session TTL in seconds.
    default_ttl_secs: u64,

    /// Maximum number of sessions to keep in cache.
    max_cache_size: usize,
}

impl SessionStore {
    /// Open or create a session store at the given path.
    pub fn open(path: PathBuf, default_ttl_secs: u64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let db = Database::create(&path)
            .with_context(|| format!("Failed to open session database: {:?}", path))?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SESSIONS_TABLE)?;
        }
        write_txn.commit()?;

        let store = Self {
            db,
            cache: RwLock::new(HashMap::new()),
            default_ttl_secs,
            max_cache_size: 10_000,
        };

        let mut live = Vec::new();
        store.scan(|_, decoded| {
            if let Ok(session) = decoded {
                if !session.is_expired() {
                    live.push(session);
                }
            }
        })?;
        for session in &live {
            store.remember(session);
        }
        debug!(sessions = live.len(), "Loaded active sessions into cache");

        Ok(store)
    }

    /// Get default TTL in seconds.
    pub fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }

    /// Create and store a fresh session.
    pub fn create(&self, router: &str) -> Result<Session> {
        let session = Session::new(router, self.default_ttl_secs);
        self.save(&session)?;
        Ok(session)
    }

    /// Live session by ID, with `last_accessed` refreshed.
    pub fn get(&self, id: SessionId) -> Result<Option<Session>> {
        let cached = self
            .cache
            .read()
            .ok()
            .and_then(|cache| cache.get(&id).cloned());

        let mut session = match cached {
            Some(session) => session,
            None => match self.read(&id.to_hex())? {
                Some(session) => session,
                None => return Ok(None),
            },
        };

        if session.is_expired() {
            // The stored row is left for the cleanup task.
            self.forget(id);
            return Ok(None);
        }

        session.touch();
        self.remember(&session);
        Ok(Some(session))
    }

    /// Persist a session (state bag included) and refresh the cache.
    pub fn save(&self, session: &Session) -> Result<()> {
        let data = rmp_serde::to_vec(session).context("Failed to serialize session")?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSIONS_TABLE)?;
            table.insert(session.id.to_hex().as_str(), data.as_slice())?;
        }
        write_txn.commit()?;

        self.remember(session);
        Ok(())
    }

    /// Delete a session by ID. Returns whether it was stored.
    pub fn delete(&self, id: SessionId) -> Result<bool> {
        self.forget(id);
        self.remove_keys(&[id.to_hex()]).map(|n| n > 0)
    }

    /// Evict all expired sessions, plus rows that no longer decode.
    /// Returns the number of rows removed.
    pub fn evict_expired(&self) -> Result<usize> {
        if let Ok(mut cache) = self.cache.write() {
            cache.retain(|_, session| !session.is_expired());
        }

        let mut stale = Vec::new();
        self.scan(|key, decoded| match decoded {
            Ok(session) if session.is_expired() => stale.push(key.to_string()),
            Ok(_) => {}
            Err(e) => {
                warn!(key, error = %e, "Undecodable session row, removing");
                stale.push(key.to_string());
            }
        })?;

        if stale.is_empty() {
            return Ok(0);
        }
        self.remove_keys(&stale)
    }

    /// Number of stored sessions, expired ones included until cleanup.
    pub fn session_count(&self) -> Result<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSIONS_TABLE)?;
        Ok(usize::try_from(table.len()?)?)
    }

    fn read(&self, key: &str) -> Result<Option<Session>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSIONS_TABLE)?;
        let Some(value) = table.get(key)? else {
            return Ok(None);
        };
        let session = rmp_serde::from_slice(value.value()).context("Failed to deserialize session")?;
        Ok(Some(session))
    }

    /// Visit every stored row with its decoded session.
    fn scan<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&str, Result<Session, rmp_serde::decode::Error>),
    {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSIONS_TABLE)?;
        for entry in table.iter()? {
            let (key, value) = entry?;
            visit(key.value(), rmp_serde::from_slice(value.value()));
        }
        Ok(())
    }

    fn remove_keys(&self, keys: &[String]) -> Result<usize> {
        let mut removed = 0;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSIONS_TABLE)?;
            for key in keys {
                if table.remove(key.as_str())?.is_some() {
                    removed += 1;
                }
            }
        }
        write_txn.commit()?;
        Ok(removed)
    }

    /// Cache a session, dropping the least recently accessed one when full.
    fn remember(&self, session: &Session) {
        let Ok(mut cache) = self.cache.write() else {
            return;
        };
        if cache.len() >= self.max_cache_size && !cache.contains_key(&session.id) {
            let oldest = cache
                .iter()
                .min_by_key(|(_, s)| s.last_accessed)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                cache.remove(&oldest);
            }
        }
        cache.insert(session.id, session.clone());
    }

    fn forget(&self, id: SessionId) {
        if let Ok(mut cache) = self.cache.write() {
            cache.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::ConsentState;
    use crate::host::InternalResponse;
    use chrono::Utc;
    use tempfile::tempdir;

    fn test_store() -> (SessionStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions.redb");
        let store = SessionStore::open(path, 3600).unwrap();
        (store, dir)
    }

    #[test]
    fn test_session_create_and_get() {
        let (store, _dir) = test_store();

        let session = store.create("router-1").unwrap();
        let retrieved = store.get(session.id).unwrap().unwrap();
        assert_eq!(retrieved.state.router, "router-1");
        assert_eq!(retrieved.state.session_id, session.id.to_hex());
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions.redb");

        let id = {
            let store = SessionStore::open(path.clone(), 3600).unwrap();
            let mut session = store.create("router-1").unwrap();
            let consent = ConsentState {
                internal_response: InternalResponse::new("https://idp.example.org"),
                filter: ["mail".to_string()].into_iter().collect(),
                requester_display_name: Some("RP".to_string()),
                requester_logo: None,
            };
            consent.store(&mut session.state).unwrap();
            store.save(&session).unwrap();
            session.id
        };

        let store = SessionStore::open(path, 3600).unwrap();
        let session = store.get(id).unwrap().unwrap();
        let consent = ConsentState::load(&session.state).unwrap();
        assert_eq!(consent.requester_display_name.as_deref(), Some("RP"));
        assert_eq!(consent.internal_response.issuer(), "https://idp.example.org");
    }

    #[test]
    fn test_session_expiry() {
        let (store, _dir) = test_store();

        let mut session = Session::new("router-1", 3600);
        session.expires_at = Utc::now() - chrono::Duration::seconds(10);
        store.save(&session).unwrap();

        assert!(store.get(session.id).unwrap().is_none());
    }

    #[test]
    fn test_session_delete() {
        let (store, _dir) = test_store();

        let session = store.create("router-1").unwrap();
        assert!(store.get(session.id).unwrap().is_some());

        assert!(store.delete(session.id).unwrap());
        assert!(store.get(session.id).unwrap().is_none());
        assert!(!store.delete(session.id).unwrap());
    }

    #[test]
    fn test_evict_expired() {
        let (store, _dir) = test_store();

        let mut session = Session::new("router-1", 3600);
        session.expires_at = Utc::now() - chrono::Duration::seconds(10);
        store.save(&session).unwrap();
        store.create("router-1").unwrap();

        assert_eq!(store.evict_expired().unwrap(), 1);
        assert_eq!(store.session_count().unwrap(), 1);
    }
}
