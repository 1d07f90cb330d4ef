//! Attaches identity provider metadata facts to the outgoing response.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use super::config::MetaInfoConfig;
use super::metadata::{EntityDescriptor, LocalizedText};
use crate::error::SvsError;
use crate::host::state::METADATA_KEY;
use crate::host::{Context, InternalResponse, Outcome, ResponseMicroService};

const UNKNOWN: &str = "Unknown";

/// Facts shared with downstream services through the state bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFacts {
    /// Registration authority.
    pub ra: Option<String>,
    pub name: String,
    pub country: String,
}

pub struct MetaInfo {
    displayname_attr: String,
    country_attr: String,
    exceptions: HashMap<String, String>,
    language: String,
}

impl MetaInfo {
    pub fn new(config: &MetaInfoConfig) -> Self {
        info!(
            displayname = %config.displayname,
            country = %config.country,
            "MetaInfo service is active"
        );
        Self {
            displayname_attr: config.displayname.clone(),
            country_attr: config.country.clone(),
            exceptions: config.exceptions.clone(),
            language: config.language.clone(),
        }
    }

    /// Facts for `issuer` as described by `entity`.
    pub fn extract(&self, issuer: &str, entity: &EntityDescriptor) -> MetadataFacts {
        let name = display_name(entity, &self.language);
        let ra = entity.registration_authority().map(str::to_string);
        let country = self.resolve_country(issuer, ra.as_deref());
        MetadataFacts { ra, name, country }
    }

    /// Override by issuer, then by registration authority, then the
    /// authority's trailing domain label.
    pub fn resolve_country(&self, issuer: &str, ra: Option<&str>) -> String {
        if let Some(country) = self.exceptions.get(issuer) {
            return country.clone();
        }
        let Some(ra) = ra else {
            return UNKNOWN.to_string();
        };
        if let Some(country) = self.exceptions.get(ra) {
            return country.clone();
        }
        ra_suffix(ra).unwrap_or_else(|| UNKNOWN.to_string())
    }
}

impl ResponseMicroService for MetaInfo {
    fn name(&self) -> &str {
        "metainfo"
    }

    fn process(&self, ctx: &mut Context, mut response: InternalResponse) -> Result<Outcome, SvsError> {
        let issuer = response.issuer().to_string();
        debug!(issuer = %issuer, "Processing MetaInfo");

        let Some(store) = ctx.metadata_store.clone() else {
            debug!("No metadata store, skipping MetaInfo");
            return Ok(Outcome::Continue(response));
        };
        let Some(entity) = store.get(&issuer) else {
            debug!(issuer = %issuer, "Issuer not in metadata store, skipping MetaInfo");
            return Ok(Outcome::Continue(response));
        };

        let facts = self.extract(&issuer, entity);
        info!(
            issuer = %issuer,
            name = %facts.name,
            registration_authority = ?facts.ra,
            country = %facts.country,
            "Extracted IdP metadata"
        );

        response.set_attribute(self.displayname_attr.clone(), facts.name.clone());
        response.set_attribute(self.country_attr.clone(), facts.country.clone());
        ctx.state.insert(METADATA_KEY, &facts)?;

        Ok(Outcome::Continue(response))
    }
}

/// Exact language match first, else the last name seen. Falls back to the
/// organization display name with the same rule.
fn display_name(entity: &EntityDescriptor, language: &str) -> String {
    if let Some(name) = pick_localized(entity.ui_display_names(), language) {
        return name;
    }
    entity
        .organization
        .as_ref()
        .and_then(|org| pick_localized(org.organization_display_name.iter(), language))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn pick_localized<'a>(
    names: impl Iterator<Item = &'a LocalizedText>,
    language: &str,
) -> Option<String> {
    let mut last = None;
    for name in names {
        let text = name.text.clone().unwrap_or_else(|| UNKNOWN.to_string());
        if name.lang.as_deref() == Some(language) {
            return Some(text);
        }
        last = Some(text);
    }
    last
}

/// `http://www.swamid.se/` → `se`.
fn ra_suffix(ra: &str) -> Option<String> {
    let trimmed = ra.trim_end_matches('/');
    let suffix = trimmed.rsplit(['.', '/']).next()?;
    if suffix.is_empty() {
        None
    } else {
        Some(suffix.to_string())
    }
}
