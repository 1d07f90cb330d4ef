//! Metadata info extractor configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetaInfoConfig {
    /// Enable the extractor in the response chain.
    #[serde(default)]
    pub enabled: bool,

    /// Attribute receiving the IdP display name.
    #[serde(default = "default_displayname")]
    pub displayname: String,

    /// Attribute receiving the IdP country.
    #[serde(default = "default_country")]
    pub country: String,

    /// Country overrides keyed by issuer or registration authority.
    #[serde(default)]
    pub exceptions: HashMap<String, String>,

    /// Preferred display name language.
    #[serde(default = "default_language")]
    pub language: String,

    /// JSON metadata store to load at start (optional).
    #[serde(default)]
    pub metadata_path: Option<String>,
}

fn default_displayname() -> String {
    "idp_name".to_string()
}

fn default_country() -> String {
    "idp_country".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for MetaInfoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            displayname: default_displayname(),
            country: default_country(),
            exceptions: HashMap::new(),
            language: default_language(),
            metadata_path: None,
        }
    }
}

impl MetaInfoConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if self.displayname.is_empty() || self.country.is_empty() {
            return Err("metainfo attribute names must not be empty".to_string());
        }
        if self.displayname == self.country {
            return Err("metainfo displayname and country attributes must differ".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: MetaInfoConfig = serde_json::from_str(r#"{"enabled": true}"#).unwrap();
        assert_eq!(config.displayname, "idp_name");
        assert_eq!(config.country, "idp_country");
        assert_eq!(config.language, "en");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = MetaInfoConfig {
            enabled: true,
            ..Default::default()
        };
        config.country = config.displayname.clone();
        assert!(config.validate().is_err());
    }
}
