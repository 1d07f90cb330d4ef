//! Identity provider metadata extraction.
//!
//! Looks up the asserting IdP in the metadata store and adds its display
//! name and country to the released attributes.

pub mod config;
pub mod extractor;
pub mod metadata;

pub use config::MetaInfoConfig;
pub use extractor::{MetaInfo, MetadataFacts};
pub use metadata::{EntityDescriptor, MetadataStore};
