//! Authentication result record handed over by the proxy.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Attribute name → ordered values.
pub type Attributes = HashMap<String, Vec<String>>;

/// Where and when the authentication happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationInfo {
    /// Entity ID of the asserting identity provider.
    pub issuer: String,
    /// Authentication instant as reported by the proxy.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_class_ref: Option<String>,
}

/// The authentication result being proxied towards the relying party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalResponse {
    pub auth_info: AuthenticationInfo,

    /// Relying party that will receive the released attributes.
    #[serde(rename = "to", default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,

    #[serde(rename = "attr", default)]
    pub attributes: Attributes,
}

impl InternalResponse {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            auth_info: AuthenticationInfo {
                issuer: issuer.into(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                auth_class_ref: None,
            },
            requester: None,
            subject_id: None,
            attributes: Attributes::new(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.auth_info.issuer
    }

    /// Set a single-valued attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), vec![value.into()]);
    }
}

/// Keep exactly the attributes named in `allow`.
pub fn filter_attributes(attributes: &Attributes, allow: &BTreeSet<String>) -> Attributes {
    attributes
        .iter()
        .filter(|(name, _)| allow.contains(*name))
        .map(|(name, values)| (name.clone(), values.clone()))
        .collect()
}

/// Requester presentation data seeded by the host before the consent step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterInfo {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_filter_is_intersection() {
        let mut resp = InternalResponse::new("https://idp.example.org");
        resp.set_attribute("mail", "user@example.org");
        resp.attributes.insert(
            "affiliation".to_string(),
            vec!["member".to_string(), "student".to_string()],
        );
        resp.set_attribute("secret", "do-not-release");

        let filtered = filter_attributes(&resp.attributes, &allow(&["affiliation", "mail", "name"]));
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered["affiliation"], vec!["member", "student"]);
        assert!(!filtered.contains_key("secret"));
        assert!(!filtered.contains_key("name"));
    }

    #[test]
    fn test_filter_with_empty_allow_list() {
        let mut resp = InternalResponse::new("https://idp.example.org");
        resp.set_attribute("mail", "user@example.org");
        assert!(filter_attributes(&resp.attributes, &BTreeSet::new()).is_empty());
    }

    #[test]
    fn test_wire_names() {
        let mut resp = InternalResponse::new("https://idp.example.org");
        resp.requester = Some("https://rp.example.org".to_string());
        resp.set_attribute("mail", "user@example.org");

        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["to"], "https://rp.example.org");
        assert_eq!(value["attr"]["mail"][0], "user@example.org");
        assert_eq!(value["auth_info"]["issuer"], "https://idp.example.org");

        let back: InternalResponse = serde_json::from_value(value).unwrap();
        assert_eq!(back, resp);
    }
}
