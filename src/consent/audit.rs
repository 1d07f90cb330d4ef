//! Append-only audit log of accepted consents, one JSON object per line.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::SvsError;
use crate::host::{Attributes, InternalResponse, StateBag};

/// One accepted consent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub router: String,
    #[serde(rename = "sessionid")]
    pub session_id: String,
    pub timestamp: String,
    pub idp: String,
    pub rp: Option<String>,
    #[serde(rename = "attr")]
    pub attributes: Attributes,
}

impl AuditRecord {
    pub fn new(state: &StateBag, response: &InternalResponse) -> Self {
        Self {
            router: state.router.clone(),
            session_id: state.session_id.clone(),
            timestamp: response.auth_info.timestamp.clone(),
            idp: response.auth_info.issuer.clone(),
            rp: response.requester.clone(),
            attributes: response.attributes.clone(),
        }
    }
}

/// Audit log file. Every append opens, writes one line, flushes and
/// closes while holding the lock, so concurrent accepts never interleave.
pub struct AuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn append(&self, record: &AuditRecord) -> Result<(), SvsError> {
        let mut line = serde_json::to_string(record).map_err(|e| SvsError::State {
            slot: "audit".to_string(),
            source: e,
        })?;
        line.push('\n');

        // A poisoned lock only means another writer panicked; the file is
        // still line-consistent.
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}
