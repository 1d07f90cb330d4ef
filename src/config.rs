//! Service configuration file.
//!
//! One JSON document with a section per service:
//!
//! ```json
//! {
//!   "session": { "store_path": "/var/lib/svs/sessions.redb" },
//!   "alias": { "enabled": true, "locations": { "static": "/var/www/static" } },
//!   "metainfo": { "enabled": true, "metadata_path": "/etc/svs/metadata.json" },
//!   "consent": { "enabled": true, "attributes": { "mail": "Email address" } }
//! }
//! ```

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::alias::AliasConfig;
use crate::consent::ConsentConfig;
use crate::metainfo::MetaInfoConfig;
use crate::session::SessionConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SvsConfig {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub alias: AliasConfig,

    #[serde(default)]
    pub metainfo: MetaInfoConfig,

    #[serde(default)]
    pub consent: ConsentConfig,
}

impl SvsConfig {
    /// Read and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: SvsConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config.validate().map_err(|e| anyhow!("Invalid configuration: {}", e))?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.session.validate()?;
        self.alias.validate()?;
        self.metainfo.validate()?;
        self.consent.validate()?;

        if self.alias.enabled && self.consent.enabled {
            let consent_prefix = self.consent.base_path.trim_matches('/');
            if self.alias.normalized_locations().contains_key(consent_prefix) {
                return Err(format!("alias prefix {} shadows the consent endpoints", consent_prefix));
            }
        }

        Ok(())
    }
}
