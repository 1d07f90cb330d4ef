//! Per-request context and the responses services hand back to the proxy.

use std::collections::HashMap;
use std::sync::Arc;

use super::state::StateBag;
use super::types::InternalResponse;
use crate::metainfo::MetadataStore;

/// Request-scoped view handed to every service.
#[derive(Debug, Clone)]
pub struct Context {
    /// Request path without the leading `/`.
    pub path: String,
    /// Query and form parameters.
    pub request: HashMap<String, String>,
    pub state: StateBag,
    /// Metadata store populated by the proxy, if any.
    pub metadata_store: Option<Arc<MetadataStore>>,
}

impl Context {
    pub fn new(path: &str, state: StateBag) -> Self {
        Self {
            path: path.trim_start_matches('/').to_string(),
            request: HashMap::new(),
            state,
            metadata_store: None,
        }
    }

    pub fn with_request(mut self, request: HashMap<String, String>) -> Self {
        self.request = request;
        self
    }

    pub fn with_metadata_store(mut self, store: Option<Arc<MetadataStore>>) -> Self {
        self.metadata_store = store;
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.request.get(name).map(|s| s.as_str())
    }
}

/// HTTP response produced by a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    /// Redirect target, sent as `Location`.
    pub location: Option<String>,
}

impl Response {
    pub fn ok(body: Vec<u8>, content_type: &str) -> Self {
        Self {
            status: 200,
            content_type: content_type.to_string(),
            body,
            location: None,
        }
    }

    pub fn html(page: String) -> Self {
        Self::ok(page.into_bytes(), "text/html")
    }

    pub fn json(body: &serde_json::Value) -> Self {
        Self::ok(body.to_string().into_bytes(), "application/json")
    }

    pub fn not_found(body: String) -> Self {
        Self {
            status: 404,
            content_type: "text/html".to_string(),
            body: body.into_bytes(),
            location: None,
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: "text/html".to_string(),
            body: message.as_bytes().to_vec(),
            location: None,
        }
    }

    pub fn redirect(location: String) -> Self {
        Self {
            status: 302,
            content_type: "text/html".to_string(),
            body: Vec::new(),
            location: Some(location),
        }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// What a service step decided.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Hand the (possibly modified) response to the next stage.
    Continue(InternalResponse),
    /// Stop the chain and answer the user agent directly.
    Respond(Response),
}
