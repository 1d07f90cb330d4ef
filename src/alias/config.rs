//! Alias resolver configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// URL prefix → filesystem directory table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasConfig {
    /// Enable the alias resolver.
    #[serde(default)]
    pub enabled: bool,

    /// e.g. {"static": "/var/www/static"}; leading/trailing `/` on the
    /// prefix are ignored.
    #[serde(default)]
    pub locations: BTreeMap<String, String>,
}

impl AliasConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }

        for (prefix, base) in &self.locations {
            if prefix.trim_matches('/').is_empty() {
                return Err(format!("alias prefix for {} is empty", base));
            }
            if base.is_empty() {
                return Err(format!("alias {} has no base path", prefix));
            }
        }

        Ok(())
    }

    /// Prefix table with normalized keys.
    pub fn normalized_locations(&self) -> BTreeMap<String, String> {
        self.locations
            .iter()
            .map(|(prefix, base)| (prefix.trim_matches('/').to_string(), base.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        let mut config = AliasConfig::default();
        assert!(config.validate().is_ok());

        config.enabled = true;
        config.locations.insert("/".to_string(), "/data".to_string());
        assert!(config.validate().is_err());

        config.locations.clear();
        config.locations.insert("/files/".to_string(), "/data/docs".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.normalized_locations()["files"], "/data/docs");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<AliasConfig, _> =
            serde_json::from_str(r#"{"enabled": true, "location": {}}"#);
        assert!(result.is_err());
    }
}
