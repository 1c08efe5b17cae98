//! Landing endpoints for links sent by the identity service.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use super::error::ApiError;
use super::page;
use crate::pipeline::RequestContext;
use crate::AppState;

const RECOVERY_PAGE: &str = "/auth/password?type=recovery";

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

fn error_page_url(message: &str) -> String {
    format!("/auth/error?message={}", urlencoding::encode(message))
}

/// GET /auth/callback
pub async fn callback(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let access = &state.config.access;
    let kind = params.kind.as_deref().filter(|k| !k.is_empty());

    if params.error.as_deref().is_some_and(|e| !e.is_empty()) {
        let message = params
            .error_description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or("Authentication failed.");
        return Ok(Redirect::to(&error_page_url(message)).into_response());
    }

    if let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) {
        if let Err(e) = ctx.session()?.auth().exchange_auth_code(code).await {
            if !state.config.server.is_development() {
                error!(error = %e, "Auth code exchange failed");
            }
            return Ok(Redirect::to(&format!("{}&error=oauth_failed", access.signin_path))
                .into_response());
        }

        let target = if kind == Some("recovery") {
            RECOVERY_PAGE
        } else {
            access.home_path.as_str()
        };
        return Ok(Redirect::to(target).into_response());
    }

    match kind {
        Some("recovery") => Ok(Redirect::to(RECOVERY_PAGE).into_response()),
        Some("signup") => Ok(Redirect::to(&access.signin_path).into_response()),
        Some(other) => Err(ApiError::bad_request(format!(
            "Invalid callback type: \"{}\"",
            other
        ))),
        None => Ok(
            Redirect::to(&error_page_url("Callback parameters missing or invalid."))
                .into_response(),
        ),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorPageParams {
    #[serde(default)]
    pub message: String,
}

/// GET /auth/error
pub async fn error_page(Query(params): Query<ErrorPageParams>) -> Result<Response, ApiError> {
    page::render("Error", &json!({ "message": params.message }))
}
