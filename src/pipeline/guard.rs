//! Route access policy.
//!
//! A pure decision over the path, method, query and whether a session is
//! present. Anonymous users are kept out of protected pages; signed-in users
//! are sent home from the public auth pages unless they are submitting a form
//! or finishing a password recovery.

use axum::{
    async_trait,
    extract::{Query, Request},
    http::Method,
    response::{IntoResponse, Redirect, Response},
};
use std::collections::HashMap;
use tracing::debug;

use super::{Flow, RequestContext, Stage};
use crate::config::AccessConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    RedirectSignin,
    RedirectHome,
}

#[derive(Debug, Clone)]
pub struct RoutePolicy {
    public_prefixes: Vec<String>,
    write_methods: Vec<Method>,
    recovery_param: String,
    recovery_value: String,
    signin_path: String,
    home_path: String,
}

impl RoutePolicy {
    pub fn from_config(access: &AccessConfig) -> Self {
        Self {
            public_prefixes: access
                .public_prefixes
                .iter()
                .map(|p| p.trim_end_matches('/').to_string())
                .collect(),
            write_methods: access
                .write_methods
                .iter()
                .filter_map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()).ok())
                .collect(),
            recovery_param: access.recovery_param.clone(),
            recovery_value: access.recovery_value.clone(),
            signin_path: access.signin_path.clone(),
            home_path: access.home_path.clone(),
        }
    }

    /// Whether a path is at or below one of the public prefixes.
    ///
    /// Matching is per segment: `/auth` covers `/auth/password` but not `/authors`.
    pub fn is_public(&self, path: &str) -> bool {
        self.public_prefixes.iter().any(|prefix| {
            prefix.is_empty()
                || path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    pub fn evaluate(
        &self,
        path: &str,
        method: &Method,
        query: &HashMap<String, String>,
        session_present: bool,
    ) -> RouteDecision {
        let public = self.is_public(path);

        if !session_present {
            return if public {
                RouteDecision::Allow
            } else {
                RouteDecision::RedirectSignin
            };
        }

        if public && !self.write_methods.contains(method) && !self.is_recovery(query) {
            return RouteDecision::RedirectHome;
        }

        RouteDecision::Allow
    }

    fn is_recovery(&self, query: &HashMap<String, String>) -> bool {
        query.get(&self.recovery_param).map(String::as_str) == Some(self.recovery_value.as_str())
    }

    /// Redirect target of a decision, `None` for `Allow`
    pub fn target(&self, decision: RouteDecision) -> Option<&str> {
        match decision {
            RouteDecision::Allow => None,
            RouteDecision::RedirectSignin => Some(&self.signin_path),
            RouteDecision::RedirectHome => Some(&self.home_path),
        }
    }

    /// 303 response for a redirecting decision
    pub fn respond(&self, decision: RouteDecision) -> Option<Response> {
        self.target(decision)
            .map(|target| Redirect::to(target).into_response())
    }
}

pub struct GuardStage {
    policy: RoutePolicy,
}

impl GuardStage {
    pub fn new(policy: RoutePolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Stage for GuardStage {
    fn name(&self) -> &'static str {
        "guard"
    }

    async fn enter(&self, request: &mut Request, ctx: RequestContext) -> Flow {
        let session_present = match &ctx.session {
            Some(handle) => handle.get_session().await.is_some(),
            None => false,
        };
        let query = Query::<HashMap<String, String>>::try_from_uri(request.uri())
            .map(|Query(q)| q)
            .unwrap_or_default();

        let path = request.uri().path();
        let decision = self
            .policy
            .evaluate(path, request.method(), &query, session_present);

        match self.policy.respond(decision) {
            None => Flow::Continue(ctx),
            Some(response) => {
                debug!(path, ?decision, "Access guard redirect");
                Flow::Terminate(response)
            }
        }
    }
}
