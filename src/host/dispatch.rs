//! Service registration and URL dispatch.

use std::sync::Arc;
use tracing::debug;

use super::context::{Context, Outcome, Response};
use super::types::InternalResponse;
use crate::error::SvsError;

/// Handler bound to a registered route.
pub type EndpointHandler = Arc<dyn Fn(&mut Context) -> Result<Outcome, SvsError> + Send + Sync>;

/// How a registered route matches the request path (no leading `/`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Exact(String),
    Prefix(String),
}

impl Route {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Route::Exact(p) => path == p,
            Route::Prefix(p) => path.starts_with(p.as_str()),
        }
    }
}

/// One URL binding offered by a service.
#[derive(Clone)]
pub struct Endpoint {
    pub route: Route,
    pub handler: EndpointHandler,
}

impl Endpoint {
    pub fn new<F>(route: Route, handler: F) -> Self
    where
        F: Fn(&mut Context) -> Result<Outcome, SvsError> + Send + Sync + 'static,
    {
        Self {
            route,
            handler: Arc::new(handler),
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint").field("route", &self.route).finish()
    }
}

/// Service that only answers its own URLs.
pub trait RequestMicroService: Send + Sync {
    fn name(&self) -> &str;
    fn endpoints(&self) -> Vec<Endpoint>;
}

/// Service placed in the post-authentication chain.
pub trait ResponseMicroService: Send + Sync {
    fn name(&self) -> &str;

    fn process(&self, ctx: &mut Context, response: InternalResponse) -> Result<Outcome, SvsError>;

    /// URLs this service answers. An endpoint returning [`Outcome::Continue`]
    /// resumes the chain after this service.
    fn endpoints(&self) -> Vec<Endpoint> {
        Vec::new()
    }
}

/// Receives the final response once every service has passed it on.
pub trait ResponseStage: Send + Sync {
    fn complete(&self, ctx: &mut Context, response: InternalResponse) -> Result<Response, SvsError>;
}

struct Binding {
    endpoint: Endpoint,
    /// Position in the response chain, for endpoints owned by response services.
    chain_position: Option<usize>,
}

/// Routes requests to registered endpoints and drives the response chain.
pub struct Dispatcher {
    bindings: Vec<Binding>,
    chain: Vec<Arc<dyn ResponseMicroService>>,
    terminal: Arc<dyn ResponseStage>,
}

impl Dispatcher {
    pub fn new(terminal: Arc<dyn ResponseStage>) -> Self {
        Self {
            bindings: Vec::new(),
            chain: Vec::new(),
            terminal,
        }
    }

    pub fn register_request_service(&mut self, service: &dyn RequestMicroService) {
        for endpoint in service.endpoints() {
            debug!(service = service.name(), route = ?endpoint.route, "Registering endpoint");
            self.bindings.push(Binding {
                endpoint,
                chain_position: None,
            });
        }
    }

    /// Append a service to the response chain and register its endpoints.
    pub fn register_response_service(&mut self, service: Arc<dyn ResponseMicroService>) {
        let position = self.chain.len();
        for endpoint in service.endpoints() {
            debug!(service = service.name(), route = ?endpoint.route, "Registering endpoint");
            self.bindings.push(Binding {
                endpoint,
                chain_position: Some(position),
            });
        }
        self.chain.push(service);
    }

    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    /// Run the whole chain for a fresh authentication result.
    pub fn process_response(
        &self,
        ctx: &mut Context,
        response: InternalResponse,
    ) -> Result<Response, SvsError> {
        self.run_chain(0, ctx, response)
    }

    /// Answer a request aimed at a registered URL. `None` when nothing matches.
    pub fn dispatch(&self, ctx: &mut Context) -> Option<Result<Response, SvsError>> {
        let binding = self
            .bindings
            .iter()
            .find(|b| b.endpoint.route.matches(&ctx.path))?;

        let outcome = match (binding.endpoint.handler)(ctx) {
            Ok(outcome) => outcome,
            Err(e) => return Some(Err(e)),
        };

        Some(match outcome {
            Outcome::Respond(response) => Ok(response),
            Outcome::Continue(response) => {
                let next = binding.chain_position.map_or(self.chain.len(), |p| p + 1);
                self.run_chain(next, ctx, response)
            }
        })
    }

    fn run_chain(
        &self,
        start: usize,
        ctx: &mut Context,
        mut response: InternalResponse,
    ) -> Result<Response, SvsError> {
        for service in self.chain.iter().skip(start) {
            debug!(service = service.name(), "Running response service");
            match service.process(ctx, response)? {
                Outcome::Continue(next) => response = next,
                Outcome::Respond(reply) => return Ok(reply),
            }
        }
        self.terminal.complete(ctx, response)
    }
}
