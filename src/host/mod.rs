//! Contracts shared with the proxy: request context, session state bag,
//! authentication result record and URL dispatch.

pub mod context;
pub mod dispatch;
pub mod state;
pub mod types;

pub use context::{Context, Outcome, Response};
pub use dispatch::{Dispatcher, Endpoint, RequestMicroService, ResponseMicroService, ResponseStage, Route};
pub use state::StateBag;
pub use types::{filter_attributes, Attributes, AuthenticationInfo, InternalResponse, RequesterInfo};
