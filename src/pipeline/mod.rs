//! Request pipeline: session resolution, route access policy and preferences.
//!
//! Stages run in a fixed order. Each one either hands the request context on
//! or terminates the request with a response of its own. On the way out every
//! stage that was entered gets to post-process the response, in reverse order,
//! whether the request reached a handler or not.

pub mod guard;
pub mod identity;
pub mod preferences;
pub mod session;

pub use guard::{GuardStage, RouteDecision, RoutePolicy};
pub use identity::{onboarding_gate, Identities, IdentityError};
pub use preferences::{PreferenceStage, RequestConfig};
pub use session::{SessionHandle, SessionStage};

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::config::Config;
use crate::identity::IdentityService;
use crate::AppState;

/// Per-request state accumulated by the stages and handed to handlers.
#[derive(Clone, Default)]
pub struct RequestContext {
    pub session: Option<Arc<SessionHandle>>,
    pub config: Option<RequestConfig>,
}

impl RequestContext {
    pub fn session(&self) -> Result<&Arc<SessionHandle>, ApiError> {
        self.session
            .as_ref()
            .ok_or_else(|| ApiError::internal("Session was not resolved for this request"))
    }

    /// Preferences, or the built-in defaults when the preference stage did not run
    pub fn preferences(&self) -> RequestConfig {
        self.config.clone().unwrap_or_default()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| ApiError::internal("Request pipeline did not run"))
    }
}

/// Outcome of a stage's `enter`
pub enum Flow {
    Continue(RequestContext),
    Terminate(Response),
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn enter(&self, request: &mut Request, ctx: RequestContext) -> Flow;

    async fn leave(&self, _ctx: &RequestContext, response: Response) -> Response {
        response
    }
}

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Session resolution, then the access guard, then preferences
    pub fn standard(config: &Config, identity: Arc<dyn IdentityService>) -> Self {
        let development = config.server.is_development();
        Self::new(vec![
            Box::new(SessionStage::new(identity, !development, development)),
            Box::new(GuardStage::new(RoutePolicy::from_config(&config.access))),
            Box::new(PreferenceStage::new(&config.preferences)),
        ])
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, mut request: Request, next: Next) -> Response {
        let mut ctx = RequestContext::default();
        let mut entered = 0;
        let mut terminated = None;

        for stage in &self.stages {
            entered += 1;
            match stage.enter(&mut request, ctx.clone()).await {
                Flow::Continue(next_ctx) => ctx = next_ctx,
                Flow::Terminate(response) => {
                    tracing::debug!(stage = stage.name(), "Request terminated by stage");
                    terminated = Some(response);
                    break;
                }
            }
        }

        let mut response = match terminated {
            Some(response) => response,
            None => {
                request.extensions_mut().insert(ctx.clone());
                next.run(request).await
            }
        };

        for stage in self.stages[..entered].iter().rev() {
            response = stage.leave(&ctx, response).await;
        }
        response
    }
}

/// Middleware entry point, installed with `middleware::from_fn_with_state`
pub async fn handle(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    state.pipeline.run(request, next).await
}
