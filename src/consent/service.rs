//! User consent step: asks the user before attributes leave the proxy.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

use super::audit::{AuditLog, AuditRecord};
use super::config::ConsentConfig;
use super::page::{render_page, PageContext};
use super::state::ConsentState;
use crate::error::SvsError;
use crate::host::state::REQUESTER_KEY;
use crate::host::{
    filter_attributes, Context, Endpoint, InternalResponse, Outcome, RequesterInfo, Response,
    ResponseMicroService, Route,
};
use crate::transaction::{transaction_log, Direction, FlowEvent, Outcome as FlowOutcome};

const COMPONENT: &str = "user_consent";
const DEFAULT_LANGUAGE: &str = "en";

/// Consent workflow: process → render* → accept | deny.
#[derive(Clone)]
pub struct UserConsent {
    /// Internal attribute name → label.
    attributes: BTreeMap<String, String>,
    allow_list: BTreeSet<String>,
    logo_base_path: String,
    privacy_url: String,
    handler_path: String,
    audit: Arc<AuditLog>,
    process_entry_order: u32,
    consent_exit_order: u32,
    deny_exit_order: u32,
}

impl UserConsent {
    pub fn new(config: &ConsentConfig) -> Self {
        info!(
            attributes = config.attributes.len(),
            log_target = %config.log_target,
            "UserConsent service is active"
        );
        Self {
            allow_list: config.attributes.keys().cloned().collect(),
            attributes: config.attributes.clone(),
            logo_base_path: config.logo_base_path.clone(),
            privacy_url: config.privacy_url.clone(),
            handler_path: config.handler_path(),
            audit: Arc::new(AuditLog::new(&config.log_target)),
            process_entry_order: config.process_entry_order,
            consent_exit_order: config.consent_exit_order,
            deny_exit_order: config.deny_exit_order,
        }
    }

    /// Absolute URL of the consent page.
    fn form_action(&self) -> String {
        format!("/{}", self.handler_path)
    }

    /// Start → AwaitingDecision.
    fn request_consent(&self, ctx: &mut Context, mut response: InternalResponse) -> Result<Outcome, SvsError> {
        transaction_log(
            &ctx.state,
            &FlowEvent {
                order: self.process_entry_order,
                component: COMPONENT,
                step: "process",
                direction: Direction::Entry,
                outcome: FlowOutcome::Success,
                message: "Requesting consent",
                actor: None,
            },
        );

        response.attributes = filter_attributes(&response.attributes, &self.allow_list);
        let requester: RequesterInfo = ctx.state.take(REQUESTER_KEY)?.unwrap_or_default();

        let consent = ConsentState {
            internal_response: response,
            filter: self.allow_list.clone(),
            requester_display_name: requester.display_name,
            requester_logo: requester.logo,
        };
        consent.store(&mut ctx.state)?;

        Ok(Outcome::Respond(Response::redirect(self.form_action())))
    }

    /// AwaitingDecision → AwaitingDecision. Reads state only.
    pub fn render(&self, ctx: &Context) -> Result<Response, SvsError> {
        let consent = ConsentState::load(&ctx.state)?;
        let language = ctx.param("lang").unwrap_or(DEFAULT_LANGUAGE);

        let requester_name = consent
            .requester_display_name
            .clone()
            .or_else(|| consent.internal_response.requester.clone())
            .unwrap_or_default();
        let requester_logo = consent
            .requester_logo
            .as_deref()
            .map(|logo| self.normalize_logo(logo));

        let released = self.released_claims(&consent.internal_response);
        info!(
            session_id = %ctx.state.session_id,
            released = ?released.keys().collect::<Vec<_>>(),
            "Rendering consent page"
        );

        let form_action = self.form_action();
        let page = render_page(&PageContext {
            requester_name: &requester_name,
            requester_logo: requester_logo.as_deref(),
            privacy_url: &self.privacy_url,
            released_claims: &released,
            form_action: &form_action,
            language,
        });
        Ok(Response::html(page))
    }

    /// AwaitingDecision → Accepted. Continues the chain with the stored response.
    pub fn accept(&self, ctx: &mut Context) -> Result<Outcome, SvsError> {
        let consent = ConsentState::take(&mut ctx.state)?;
        let response = consent.internal_response;

        let record = AuditRecord::new(&ctx.state, &response);
        if let Err(e) = self.audit.append(&record) {
            error!(
                error = %e,
                log_target = %self.audit.path().display(),
                session_id = %ctx.state.session_id,
                "Failed to write consent audit record"
            );
        }

        transaction_log(
            &ctx.state,
            &FlowEvent {
                order: self.consent_exit_order,
                component: COMPONENT,
                step: "accept",
                direction: Direction::Exit,
                outcome: FlowOutcome::Success,
                message: "Consent given by the user",
                actor: None,
            },
        );

        Ok(Outcome::Continue(response))
    }

    /// AwaitingDecision → Denied. Always ends in an error.
    pub fn deny(&self, ctx: &mut Context) -> Result<Outcome, SvsError> {
        ConsentState::take(&mut ctx.state)?;

        transaction_log(
            &ctx.state,
            &FlowEvent {
                order: self.deny_exit_order,
                component: COMPONENT,
                step: "deny",
                direction: Direction::Exit,
                outcome: FlowOutcome::Cancel,
                message: "Consent denied by the user",
                actor: Some("user"),
            },
        );

        Err(SvsError::consent_denied())
    }

    /// Label → values for every policy attribute with a value.
    fn released_claims(&self, response: &InternalResponse) -> BTreeMap<String, Vec<String>> {
        self.attributes
            .iter()
            .filter_map(|(attribute, label)| {
                response
                    .attributes
                    .get(attribute)
                    .filter(|values| !values.is_empty())
                    .map(|values| (label.clone(), values.clone()))
            })
            .collect()
    }

    /// Absolute http(s) URLs and absolute paths pass through; relative
    /// paths are joined to the logo base path.
    fn normalize_logo(&self, logo: &str) -> String {
        match Url::parse(logo) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => logo.to_string(),
            _ if logo.starts_with('/') => logo.to_string(),
            _ => format!("{}/{}", self.logo_base_path.trim_end_matches('/'), logo),
        }
    }
}

impl ResponseMicroService for UserConsent {
    fn name(&self) -> &str {
        COMPONENT
    }

    fn process(&self, ctx: &mut Context, response: InternalResponse) -> Result<Outcome, SvsError> {
        self.request_consent(ctx, response)
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        let base = self.handler_path.clone();

        let render = self.clone();
        let accept = self.clone();
        let deny = self.clone();

        vec![
            Endpoint::new(Route::Exact(base.clone()), move |ctx: &mut Context| {
                render.render(ctx).map(Outcome::Respond)
            }),
            Endpoint::new(Route::Prefix(format!("{}/allow", base)), move |ctx: &mut Context| {
                accept.accept(ctx)
            }),
            Endpoint::new(Route::Prefix(format!("{}/deny", base)), move |ctx: &mut Context| {
                deny.deny(ctx)
            }),
        ]
    }
}
