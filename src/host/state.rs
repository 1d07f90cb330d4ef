//! Session-scoped state bag shared by the services of one authentication flow.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SvsError;

/// Slot holding the pending consent decision.
pub const CONSENT_KEY: &str = "CONSENT";
/// Slot holding requester presentation data seeded by the host.
pub const REQUESTER_KEY: &str = "REQUESTER";
/// Slot holding alias response body substitutions (search → replace).
pub const SUBSTITUTIONS_KEY: &str = "substitutions";
/// Slot holding facts extracted from identity provider metadata.
pub const METADATA_KEY: &str = "metadata";

/// Key/value store that survives the redirect round trip of one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateBag {
    pub session_id: String,
    /// Router identifier assigned by the proxy.
    #[serde(default)]
    pub router: String,
    #[serde(default)]
    slots: Map<String, Value>,
}

impl StateBag {
    pub fn new(session_id: impl Into<String>, router: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            router: router.into(),
            slots: Map::new(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Read a slot as `T` without removing it.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SvsError> {
        self.slots
            .get(key)
            .map(|v| T::deserialize(v).map_err(|e| slot_error(key, e)))
            .transpose()
    }

    /// Store `value` under `key`, replacing what was there.
    pub fn insert<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), SvsError> {
        let value = serde_json::to_value(value).map_err(|e| slot_error(key, e))?;
        self.slots.insert(key.to_string(), value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.slots.shift_remove(key)
    }

    /// Remove a slot and read it as `T`.
    pub fn take<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>, SvsError> {
        self.remove(key)
            .map(|v| serde_json::from_value(v).map_err(|e| slot_error(key, e)))
            .transpose()
    }

    /// Search → replace pairs in insertion order. Non-string values are skipped.
    pub fn substitutions(&self) -> Vec<(String, String)> {
        match self.slots.get(SUBSTITUTIONS_KEY) {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(search, replace)| {
                    replace.as_str().map(|r| (search.clone(), r.to_string()))
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn slot_error(key: &str, source: serde_json::Error) -> SvsError {
    SvsError::State {
        slot: key.to_string(),
        source,
    }
}
