//! User consent configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// User consent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsentConfig {
    /// Enable the consent step in the response chain.
    #[serde(default)]
    pub enabled: bool,

    /// Attribute release policy: internal attribute name → label shown to the user.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Base for relative requester logo paths.
    #[serde(default)]
    pub logo_base_path: String,

    /// Privacy policy linked from the consent page.
    #[serde(default = "default_privacy_url")]
    pub privacy_url: String,

    /// Append-only audit log of accepted consents.
    #[serde(default = "default_log_target")]
    pub log_target: String,

    /// URL base of the consent endpoints (without slashes).
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Transaction flow order of the consent request.
    #[serde(default = "default_process_entry_order")]
    pub process_entry_order: u32,

    /// Transaction flow order of an accepted consent.
    #[serde(default = "default_consent_exit_order")]
    pub consent_exit_order: u32,

    /// Transaction flow order of a denied consent.
    #[serde(default = "default_deny_exit_order")]
    pub deny_exit_order: u32,
}

fn default_privacy_url() -> String {
    "https://inacademia.org/privacy-and-data-protection/".to_string()
}

fn default_log_target() -> String {
    "consent.log".to_string()
}

fn default_base_path() -> String {
    "consent".to_string()
}

fn default_process_entry_order() -> u32 {
    700
}

fn default_consent_exit_order() -> u32 {
    1000
}

fn default_deny_exit_order() -> u32 {
    1010
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            attributes: BTreeMap::new(),
            logo_base_path: String::new(),
            privacy_url: default_privacy_url(),
            log_target: default_log_target(),
            base_path: default_base_path(),
            process_entry_order: default_process_entry_order(),
            consent_exit_order: default_consent_exit_order(),
            deny_exit_order: default_deny_exit_order(),
        }
    }
}

impl ConsentConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if self.base_path.trim_matches('/').is_empty() {
            return Err("consent base_path is required".to_string());
        }
        if self.log_target.is_empty() {
            return Err("consent log_target is required".to_string());
        }
        Ok(())
    }

    /// Path of the consent page, e.g. `consent/handle_consent`.
    pub fn handler_path(&self) -> String {
        format!("{}/handle_consent", self.base_path.trim_matches('/'))
    }
}
