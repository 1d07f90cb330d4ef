//! Session types for persisting the state bag between requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::host::StateBag;

/// Unique session identifier (16-byte random value, hex-encoded for storage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId([u8; 16]);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(rand::random())
    }

    /// Convert to hex string for storage/cookies.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 16] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A stored session carrying the state bag of one authentication flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,

    pub created_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,

    /// Updated on each request.
    pub last_accessed: DateTime<Utc>,

    pub state: StateBag,
}

impl Session {
    /// Create a new session with an empty state bag.
    pub fn new(router: &str, ttl_secs: u64) -> Self {
        let id = SessionId::new();
        let now = Utc::now();
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        Self {
            id,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl),
            last_accessed: now,
            state: StateBag::new(id.to_hex(), router),
        }
    }

    /// Check if the session is expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Update last accessed time.
    pub fn touch(&mut self) {
        self.last_accessed = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_roundtrip() {
        let id = SessionId::new();
        let hex = id.to_hex();
        let parsed = SessionId::from_hex(&hex).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_session_id_invalid_hex() {
        assert!(SessionId::from_hex("not-valid-hex").is_none());
        assert!(SessionId::from_hex("abcd").is_none()); // too short
        assert!(SessionId::from_hex("").is_none());
    }

    #[test]
    fn test_session_expiry() {
        let mut session = Session::new("router-1", 3600);
        assert!(!session.is_expired());

        session.expires_at = Utc::now() - chrono::Duration::seconds(10);
        assert!(session.is_expired());
    }

    #[test]
    fn test_state_bag_bound_to_session() {
        let session = Session::new("router-1", 3600);
        assert_eq!(session.state.session_id, session.id.to_hex());
        assert_eq!(session.state.router, "router-1");
        assert!(session.state.is_empty());
    }
}
