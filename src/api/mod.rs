pub mod auth;
pub mod callback;
pub mod error;
pub mod layout;
pub mod messages;
pub mod page;
pub mod password;

use axum::{
    extract::State,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::pipeline::RequestContext;
use crate::AppState;
use error::ApiError;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public pages
    let auth_routes = Router::new()
        .route("/auth", get(auth::auth_page).post(auth::submit))
        .route("/auth/signout", post(auth::sign_out))
        .route("/auth/password", get(password::password_page).post(password::submit))
        .route("/auth/password_reset", get(password::password_reset_page))
        .route("/auth/callback", get(callback::callback))
        .route("/auth/error", get(callback::error_page))
        .route("/info", get(info_page));

    // Private area, behind the onboarding gate
    let private_routes = Router::new()
        .route("/", get(layout::home))
        .route("/units", get(layout::units))
        .route("/unit", get(layout::unit))
        .route("/requests", get(layout::requests))
        .route("/account", get(layout::account))
        .route(
            "/onboarding",
            get(layout::onboarding_page).post(layout::create_user),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            layout::onboarding_guard,
        ));

    // Every page, and unknown paths, go through the request pipeline
    let pages = Router::new()
        .merge(auth_routes)
        .merge(private_routes)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::pipeline::handle,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(pages)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "auth_listener": state.auth_listener.is_started(),
    }))
}

async fn info_page(ctx: RequestContext) -> Result<Response, ApiError> {
    page::render("Info", &json!({ "config": ctx.preferences() }))
}

async fn not_found() -> Response {
    ApiError::not_found("Page not found").into_response()
}
