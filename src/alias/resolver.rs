//! Serves files from configured directories under URL prefixes.

use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use super::config::AliasConfig;
use crate::host::{Context, Endpoint, Outcome, RequestMicroService, Response, Route};

/// Alias resolver service.
#[derive(Clone)]
pub struct AliasResolver {
    locations: BTreeMap<String, String>,
}

impl AliasResolver {
    pub fn new(config: &AliasConfig) -> Self {
        Self {
            locations: config.normalized_locations(),
        }
    }

    /// Filesystem path for a request path `<prefix>/<rest>`.
    ///
    /// `..` segments are passed through; the proxy is expected to have
    /// normalized the path before it reaches us.
    pub fn resolve_path(&self, path: &str) -> Option<PathBuf> {
        let (prefix, rest) = path.split_once('/')?;
        let base = self.locations.get(prefix)?;
        if rest.split('/').any(|segment| segment == "..") {
            debug!(path = %path, "Alias path contains parent segments");
        }
        Some(PathBuf::from(format!("{}/{}", base, rest)))
    }

    /// Answer a request for `path`, applying `substitutions` to the body.
    pub fn handle(&self, path: &str, substitutions: &[(String, String)]) -> Response {
        let mut response = match self.resolve_path(path) {
            Some(file) => match std::fs::read(&file) {
                Ok(bytes) => {
                    let content_type = content_type_for(&file);
                    info!(path = %path, file = %file.display(), content_type, "Serving alias");
                    Response::ok(bytes, content_type)
                }
                Err(e) => {
                    debug!(file = %file.display(), error = %e, "Alias target unreadable");
                    Response::not_found(format!("File not found /{}", path))
                }
            },
            None => Response::not_found(format!("File not found /{}", path)),
        };

        for (search, replace) in substitutions {
            debug!(search = %search, replace = %replace, "Applying substitution");
            response.body = replace_bytes(&response.body, search.as_bytes(), replace.as_bytes());
        }

        response
    }
}

impl RequestMicroService for AliasResolver {
    fn name(&self) -> &str {
        "custom_alias"
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        self.locations
            .iter()
            .map(|(prefix, base)| {
                info!(prefix = %prefix, base = %base, "Registering alias");
                let resolver = self.clone();
                Endpoint::new(Route::Prefix(format!("{}/", prefix)), move |ctx: &mut Context| {
                    let substitutions = ctx.state.substitutions();
                    Ok(Outcome::Respond(resolver.handle(&ctx.path, &substitutions)))
                })
            })
            .collect()
    }
}

/// Content type guessed from the file extension.
fn content_type_for(path: &std::path::Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/vnd.microsoft.icon",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => "text/html",
    }
}

/// Replace every non-overlapping occurrence of `search`.
fn replace_bytes(haystack: &[u8], search: &[u8], replace: &[u8]) -> Vec<u8> {
    if search.is_empty() {
        return haystack.to_vec();
    }

    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(search) {
            out.extend_from_slice(replace);
            i += search.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}
