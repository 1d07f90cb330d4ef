//! Standalone HTTP surface.
//!
//! `POST /internal/response` is the proxy's ingress for a fresh
//! authentication result. Every other path is offered to the endpoints the
//! services registered. The session travels in a cookie; requests of one
//! session are serialized, each loading the state bag before it runs and
//! storing any change after.

use anyhow::{Context as _, Result};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::alias::AliasResolver;
use crate::config::SvsConfig;
use crate::consent::UserConsent;
use crate::error::SvsError;
use crate::host::state::{REQUESTER_KEY, SUBSTITUTIONS_KEY};
use crate::host::{
    Context, Dispatcher, InternalResponse, RequesterInfo, Response, ResponseStage,
};
use crate::metainfo::{MetaInfo, MetadataStore};
use crate::session::{Session, SessionConfig, SessionId, SessionStore};

/// Path of the ingress endpoint.
pub const INGRESS_PATH: &str = "/internal/response";

/// Body of an ingress request.
#[derive(Debug, Clone, Deserialize)]
pub struct IngressRequest {
    pub response: InternalResponse,

    /// Requester presentation data for the consent page.
    #[serde(default)]
    pub requester: Option<RequesterInfo>,

    /// Alias body substitutions, applied in document order.
    #[serde(default)]
    pub substitutions: Option<serde_json::Map<String, serde_json::Value>>,

    /// Router recorded on a new session.
    #[serde(default)]
    pub router: Option<String>,
}

/// Final stage: hands the released response back as JSON.
pub struct JsonFrontend;

impl ResponseStage for JsonFrontend {
    fn complete(&self, ctx: &mut Context, response: InternalResponse) -> Result<Response, SvsError> {
        let body = serde_json::to_value(&response).map_err(|source| SvsError::State {
            slot: "internal_response".to_string(),
            source,
        })?;
        info!(
            session_id = %ctx.state.session_id,
            issuer = %response.issuer(),
            attributes = response.attributes.len(),
            "Authentication response released"
        );
        Ok(Response::json(&body))
    }
}

/// Answer produced for one request, plus the session it ran in.
#[derive(Debug)]
pub struct Reply {
    pub response: Response,
    pub session_id: String,
}

/// Services, dispatcher and session store behind the HTTP layer.
pub struct Gateway {
    dispatcher: Dispatcher,
    sessions: Arc<SessionStore>,
    metadata: Option<Arc<MetadataStore>>,
    session_config: SessionConfig,
    /// One lock per session in use; held from load until save.
    session_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Gateway {
    /// Wire up the enabled services. Metadata info runs before consent so its
    /// attributes are subject to the release policy.
    pub fn from_config(
        config: &SvsConfig,
        sessions: Arc<SessionStore>,
        metadata: Option<Arc<MetadataStore>>,
    ) -> Self {
        let mut dispatcher = Dispatcher::new(Arc::new(JsonFrontend));

        if config.alias.enabled {
            let alias = AliasResolver::new(&config.alias);
            dispatcher.register_request_service(&alias);
        }

        if config.metainfo.enabled {
            dispatcher.register_response_service(Arc::new(MetaInfo::new(&config.metainfo)));
        }

        if config.consent.enabled {
            dispatcher.register_response_service(Arc::new(UserConsent::new(&config.consent)));
        }

        info!(
            alias = config.alias.enabled,
            metainfo = config.metainfo.enabled,
            consent = config.consent.enabled,
            chain = dispatcher.chain_len(),
            "Services registered"
        );

        Self {
            dispatcher,
            sessions,
            metadata,
            session_config: config.session.clone(),
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    /// Run the response chain for a fresh authentication result.
    pub fn ingress(&self, session_id: Option<&str>, request: IngressRequest) -> Result<Reply> {
        self.with_session(session_id, request.router.as_deref(), |session| {
            if let Some(router) = &request.router {
                session.state.router = router.clone();
            }
            if let Some(requester) = &request.requester {
                session.state.insert(REQUESTER_KEY, requester)?;
            }
            if let Some(substitutions) = &request.substitutions {
                session.state.insert(SUBSTITUTIONS_KEY, substitutions)?;
            }

            info!(
                session_id = %session.id,
                issuer = %request.response.issuer(),
                "Processing authentication response"
            );

            let mut ctx = self.context(INGRESS_PATH, session);
            let result = self.dispatcher.process_response(&mut ctx, request.response);
            session.state = ctx.state;
            Ok(respond(result))
        })
    }

    /// Answer a request aimed at a registered endpoint.
    pub fn handle(
        &self,
        session_id: Option<&str>,
        path: &str,
        params: HashMap<String, String>,
    ) -> Result<Reply> {
        self.with_session(session_id, None, |session| {
            let mut ctx = self.context(path, session).with_request(params);
            let response = match self.dispatcher.dispatch(&mut ctx) {
                Some(result) => respond(result),
                None => {
                    debug!(path = %path, "No endpoint registered");
                    Response::not_found(format!("Not found /{}", ctx.path))
                }
            };
            session.state = ctx.state;
            Ok(response)
        })
    }

    /// Load, work on and store one session while holding its lock, so
    /// concurrent requests of a session see each other's state changes.
    /// Unchanged state is not written back; a bag emptied by the request
    /// removes the stored session.
    fn with_session<F>(&self, session_id: Option<&str>, router: Option<&str>, work: F) -> Result<Reply>
    where
        F: FnOnce(&mut Session) -> Result<Response>,
    {
        let lock = session_id.map(|id| (id, self.session_lock(id)));
        let guard = lock
            .as_ref()
            .map(|(_, l)| l.lock().unwrap_or_else(|e| e.into_inner()));

        let outcome = self.run_locked(session_id, router, work);

        drop(guard);
        if let Some((id, l)) = lock {
            self.release_session_lock(id, l);
        }
        outcome
    }

    fn run_locked<F>(&self, session_id: Option<&str>, router: Option<&str>, work: F) -> Result<Reply>
    where
        F: FnOnce(&mut Session) -> Result<Response>,
    {
        let (mut session, fresh) = self.load_session(session_id, router)?;
        let before = session.state.clone();

        let response = work(&mut session)?;

        if session.state.is_empty() {
            if !fresh {
                self.sessions.delete(session.id)?;
            }
        } else if fresh || session.state != before {
            self.sessions.save(&session)?;
        }

        Ok(Reply {
            response,
            session_id: session.id.to_hex(),
        })
    }

    fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(session_id.to_string()).or_default())
    }

    /// Drop the map entry once no other request holds or waits for it.
    fn release_session_lock(&self, session_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.session_locks.lock().unwrap_or_else(|e| e.into_inner());
        // The map and `lock` itself account for two references.
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(session_id);
        }
    }

    fn context(&self, path: &str, session: &Session) -> Context {
        Context::new(path, session.state.clone()).with_metadata_store(self.metadata.clone())
    }

    /// Existing live session for `session_id`, or a new unsaved one.
    fn load_session(&self, session_id: Option<&str>, router: Option<&str>) -> Result<(Session, bool)> {
        if let Some(id) = session_id.and_then(SessionId::from_hex) {
            if let Some(session) = self.sessions.get(id).context("Failed to load session")? {
                return Ok((session, false));
            }
            debug!(session_id = %id, "Session unknown or expired, starting a new one");
        }

        let router = router.unwrap_or(&self.session_config.router);
        Ok((Session::new(router, self.sessions.default_ttl_secs()), true))
    }
}

/// Turn a service failure into the answer the user agent sees.
pub fn respond(result: Result<Response, SvsError>) -> Response {
    match result {
        Ok(response) => response,
        Err(e) => {
            let status = e.status();
            match &e {
                SvsError::ConsentDenied { message } => {
                    info!("Authentication aborted by user");
                    Response::error(status, message)
                }
                SvsError::NoPendingConsent { .. } => {
                    warn!(error = %e, "Consent decision without pending request");
                    Response::error(status, &e.to_string())
                }
                _ => {
                    error!(error = %e, "Service failed");
                    Response::error(status, "Internal error")
                }
            }
        }
    }
}

/// Build the axum router around a gateway.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route(INGRESS_PATH, post(internal_response))
        .fallback(dispatch_request)
        .with_state(gateway)
}

async fn internal_response(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    Json(request): Json<IngressRequest>,
) -> axum::response::Response {
    let session_id = session_cookie(&gateway, &headers);
    let worker = Arc::clone(&gateway);
    let result =
        tokio::task::spawn_blocking(move || worker.ingress(session_id.as_deref(), request)).await;
    finish(&gateway, result)
}

async fn dispatch_request(
    State(gateway): State<Arc<Gateway>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let form = if method == Method::POST && is_form(&headers) {
        Some(body.as_ref())
    } else {
        None
    };
    let params = match request_params(uri.query(), form) {
        Ok(params) => params,
        Err(e) => {
            debug!(error = %e, "Malformed request parameters");
            return (StatusCode::BAD_REQUEST, "Malformed request parameters").into_response();
        }
    };

    let session_id = session_cookie(&gateway, &headers);
    let path = uri.path().to_string();
    let worker = Arc::clone(&gateway);
    let result =
        tokio::task::spawn_blocking(move || worker.handle(session_id.as_deref(), &path, params))
            .await;
    finish(&gateway, result)
}

fn session_cookie(gateway: &Gateway, headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| gateway.session_config().parse_session_cookie(cookies))
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// Query parameters merged with a urlencoded form body; form values win.
pub fn request_params(
    query: Option<&str>,
    form: Option<&[u8]>,
) -> Result<HashMap<String, String>, serde_urlencoded::de::Error> {
    let mut params: HashMap<String, String> = match query {
        Some(q) => serde_urlencoded::from_str::<Vec<(String, String)>>(q)?
            .into_iter()
            .collect(),
        None => HashMap::new(),
    };
    if let Some(body) = form {
        params.extend(serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)?);
    }
    Ok(params)
}

fn finish(
    gateway: &Gateway,
    result: Result<Result<Reply>, tokio::task::JoinError>,
) -> axum::response::Response {
    match result {
        Ok(Ok(reply)) => {
            let cookie = gateway.session_config().build_cookie(&reply.session_id);
            into_http(reply.response, Some(cookie))
        }
        Ok(Err(e)) => {
            error!(error = ?e, "Request failed");
            into_http(Response::error(500, "Internal error"), None)
        }
        Err(e) => {
            error!(error = %e, "Request worker panicked");
            into_http(Response::error(500, "Internal error"), None)
        }
    }
}

fn into_http(response: Response, cookie: Option<String>) -> axum::response::Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = axum::http::Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, response.content_type);

    if let Some(location) = response.location {
        builder = builder.header(header::LOCATION, location);
    }
    if let Some(cookie) = cookie {
        builder = builder.header(header::SET_COOKIE, cookie);
    }

    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CONSENT_DENIED_MESSAGE;
    use crate::metainfo::EntityDescriptor;
    use tempfile::{tempdir, TempDir};

    fn metadata() -> Arc<MetadataStore> {
        let entity: EntityDescriptor = serde_json::from_value(serde_json::json!({
            "idpsso_descriptor": [{
                "extensions": {
                    "extension_elements": [
                        { "display_name": [ { "lang": "en", "text": "Example University" } ] }
                    ]
                }
            }],
            "extensions": {
                "extension_elements": [
                    { "registration_authority": "http://www.swamid.se/" }
                ]
            }
        }))
        .unwrap();
        let mut entities = HashMap::new();
        entities.insert("https://idp.example.org".to_string(), entity);
        Arc::new(MetadataStore::new(entities))
    }

    fn gateway(dir: &TempDir) -> Gateway {
        let mut config = SvsConfig::default();
        config.session.store_path = dir.path().join("sessions.redb").display().to_string();
        config.metainfo.enabled = true;
        config.consent.enabled = true;
        config.consent.log_target = dir.path().join("consent.log").display().to_string();
        for name in ["mail", "idp_name", "idp_country"] {
            config.consent.attributes.insert(name.to_string(), name.to_string());
        }
        config.alias.enabled = true;
        std::fs::create_dir(dir.path().join("static")).unwrap();
        std::fs::write(dir.path().join("static/hello.txt"), "Hello ACME").unwrap();
        config
            .alias
            .locations
            .insert("static".to_string(), dir.path().join("static").display().to_string());

        let sessions = Arc::new(
            SessionStore::open(config.session.store_path.clone().into(), config.session.ttl_secs)
                .unwrap(),
        );
        Gateway::from_config(&config, sessions, Some(metadata()))
    }

    fn ingress_request() -> IngressRequest {
        let mut response = InternalResponse::new("https://idp.example.org");
        response.set_attribute("mail", "user@example.org");
        response.set_attribute("secret", "do-not-release");
        IngressRequest {
            response,
            requester: Some(RequesterInfo {
                display_name: Some("Student Discounts".to_string()),
                logo: None,
            }),
            substitutions: None,
            router: Some("inacademia".to_string()),
        }
    }

    #[test]
    fn test_full_consent_flow() {
        let dir = tempdir().unwrap();
        let gw = gateway(&dir);

        let reply = gw.ingress(None, ingress_request()).unwrap();
        assert_eq!(reply.response.status, 302);
        assert_eq!(reply.response.location.as_deref(), Some("/consent/handle_consent"));
        let sid = reply.session_id;

        let page = gw
            .handle(Some(&sid), "/consent/handle_consent", HashMap::new())
            .unwrap();
        assert_eq!(page.response.status, 200);
        assert!(page.response.body_text().contains("Student Discounts"));
        assert!(page.response.body_text().contains("Example University"));

        let done = gw.handle(Some(&sid), "/consent/handle_consent/allow", HashMap::new()).unwrap();
        assert_eq!(done.response.status, 200);
        assert_eq!(done.response.content_type, "application/json");
        let released: serde_json::Value = serde_json::from_slice(&done.response.body).unwrap();
        assert_eq!(released["attr"]["mail"][0], "user@example.org");
        assert_eq!(released["attr"]["idp_country"][0], "se");
        assert!(released["attr"].get("secret").is_none());

        let log = std::fs::read_to_string(dir.path().join("consent.log")).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("\"router\":\"inacademia\""));

        let again = gw.handle(Some(&sid), "/consent/handle_consent/allow", HashMap::new()).unwrap();
        assert_eq!(again.response.status, 400);
    }

    #[test]
    fn test_concurrent_accepts_release_once() {
        let dir = tempdir().unwrap();
        let gw = gateway(&dir);
        let sid = gw.ingress(None, ingress_request()).unwrap().session_id;

        let barrier = std::sync::Barrier::new(4);
        let mut statuses: Vec<u16> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        gw.handle(Some(&sid), "/consent/handle_consent/allow", HashMap::new())
                            .unwrap()
                            .response
                            .status
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        statuses.sort_unstable();

        assert_eq!(statuses, vec![200, 400, 400, 400]);
        let log = std::fs::read_to_string(dir.path().join("consent.log")).unwrap();
        assert_eq!(log.lines().count(), 1);

        let page = gw
            .handle(Some(&sid), "/consent/handle_consent", HashMap::new())
            .unwrap();
        assert_eq!(page.response.status, 400);
        assert!(gw.session_locks.lock().unwrap().is_empty());
    }

    #[test]
    fn test_deny_aborts() {
        let dir = tempdir().unwrap();
        let gw = gateway(&dir);

        let sid = gw.ingress(None, ingress_request()).unwrap().session_id;
        let reply = gw.handle(Some(&sid), "/consent/handle_consent/deny", HashMap::new()).unwrap();
        assert_eq!(reply.response.status, 403);
        assert_eq!(reply.response.body_text(), CONSENT_DENIED_MESSAGE);
        assert!(!dir.path().join("consent.log").exists());
    }

    #[test]
    fn test_decision_in_other_session_fails() {
        let dir = tempdir().unwrap();
        let gw = gateway(&dir);

        gw.ingress(None, ingress_request()).unwrap();
        let reply = gw.handle(None, "/consent/handle_consent/allow", HashMap::new()).unwrap();
        assert_eq!(reply.response.status, 400);
    }

    #[test]
    fn test_alias_uses_session_substitutions() {
        let dir = tempdir().unwrap();
        let gw = gateway(&dir);

        let mut request = ingress_request();
        let mut subs = serde_json::Map::new();
        subs.insert("ACME".to_string(), serde_json::Value::from("Acme Corp"));
        request.substitutions = Some(subs);
        let sid = gw.ingress(None, request).unwrap().session_id;

        let reply = gw.handle(Some(&sid), "/static/hello.txt", HashMap::new()).unwrap();
        assert_eq!(reply.response.status, 200);
        assert_eq!(reply.response.body_text(), "Hello Acme Corp");
    }

    #[test]
    fn test_unmatched_path_is_not_found() {
        let dir = tempdir().unwrap();
        let gw = gateway(&dir);

        let reply = gw.handle(None, "/nowhere", HashMap::new()).unwrap();
        assert_eq!(reply.response.status, 404);
        assert_eq!(gw.sessions.session_count().unwrap(), 0);
    }

    #[test]
    fn test_respond_maps_errors() {
        let denied = respond(Err(SvsError::consent_denied()));
        assert_eq!(denied.status, 403);
        assert_eq!(denied.body_text(), CONSENT_DENIED_MESSAGE);

        let internal = respond(Err(SvsError::Config("broken".to_string())));
        assert_eq!(internal.status, 500);
        assert!(!internal.body_text().contains("broken"));
    }

    #[test]
    fn test_request_params_merge() {
        let params = request_params(Some("lang=nl&a=1"), Some(b"a=2&b=x%20y")).unwrap();
        assert_eq!(params["lang"], "nl");
        assert_eq!(params["a"], "2");
        assert_eq!(params["b"], "x y");

        assert!(request_params(None, None).unwrap().is_empty());
    }
}
