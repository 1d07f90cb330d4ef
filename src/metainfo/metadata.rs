//! Already-parsed SAML metadata, keyed by entity ID.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Text with an optional `xml:lang`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// A metadata extension element (UI info, registration info, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionElement {
    #[serde(default)]
    pub display_name: Vec<LocalizedText>,
    #[serde(default)]
    pub registration_authority: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extensions {
    #[serde(default)]
    pub extension_elements: Vec<ExtensionElement>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoDescriptor {
    #[serde(default)]
    pub extensions: Option<Extensions>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    #[serde(default)]
    pub organization_display_name: Vec<LocalizedText>,
}

/// One entity of the metadata store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    #[serde(default)]
    pub idpsso_descriptor: Vec<SsoDescriptor>,
    #[serde(default)]
    pub extensions: Option<Extensions>,
    #[serde(default)]
    pub organization: Option<Organization>,
}

impl EntityDescriptor {
    /// UI display names of all IdP SSO descriptors, in document order.
    pub fn ui_display_names(&self) -> impl Iterator<Item = &LocalizedText> {
        self.idpsso_descriptor
            .iter()
            .filter_map(|d| d.extensions.as_ref())
            .flat_map(|e| e.extension_elements.iter())
            .flat_map(|ee| ee.display_name.iter())
    }

    /// Registration authority from the entity-level extensions.
    pub fn registration_authority(&self) -> Option<&str> {
        self.extensions
            .as_ref()?
            .extension_elements
            .iter()
            .find_map(|ee| ee.registration_authority.as_deref())
    }
}

/// Metadata store populated outside this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataStore {
    entities: HashMap<String, EntityDescriptor>,
}

impl MetadataStore {
    pub fn new(entities: HashMap<String, EntityDescriptor>) -> Self {
        Self { entities }
    }

    /// Load a JSON document mapping entity ID → descriptor.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read metadata store: {:?}", path))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse metadata store: {:?}", path))
    }

    pub fn get(&self, entity_id: &str) -> Option<&EntityDescriptor> {
        self.entities.get(entity_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mds.json");
        std::fs::write(
            &path,
            r#"{
                "https://idp.example.se": {
                    "idpsso_descriptor": [{
                        "extensions": {"extension_elements": [
                            {"display_name": [{"lang": "en", "text": "Example University"}]}
                        ]}
                    }],
                    "extensions": {"extension_elements": [
                        {"registration_authority": "http://www.swamid.se/"}
                    ]}
                }
            }"#,
        )
        .unwrap();

        let store = MetadataStore::load(&path).unwrap();
        assert_eq!(store.len(), 1);
        let entity = store.get("https://idp.example.se").unwrap();
        assert_eq!(entity.registration_authority(), Some("http://www.swamid.se/"));
        assert_eq!(entity.ui_display_names().count(), 1);
        assert!(store.get("https://other.example").is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = MetadataStore::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read metadata store"));
    }
}
