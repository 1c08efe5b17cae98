//! Password reset requests and password recovery.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::{ApiError, FormFailure};
use super::messages::{Lang, Message};
use super::page;
use crate::identity::CredentialsUpdate;
use crate::pipeline::RequestContext;
use crate::AppState;

const MIN_PASSWORD_LENGTH: usize = 8;

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[\w\-.]+@([\w-]+\.)+[\w-]{2,4}$").unwrap();
}

#[derive(Debug, Default, Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// GET /auth/password?type=reset|recovery
pub async fn password_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let route = state
        .config
        .route("password")
        .map_err(|e| ApiError::internal(e.to_string()))?;

    match page::allowed_value(route, "type", &query) {
        Some(kind) => page::render("Password", &json!({ "type": kind })),
        None => {
            let default = route.default_value("type").unwrap_or_default();
            Ok(page::found(&format!("{}?type={}", route.path, default)))
        }
    }
}

/// GET /auth/password_reset?type=recovery, or with no type
pub async fn password_reset_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let route = state
        .config
        .route("password-reset")
        .map_err(|e| ApiError::internal(e.to_string()))?;

    match page::allowed_value(route, "type", &query) {
        Some(kind) => page::render(
            "Password reset",
            &json!({ "type": kind, "types": route.allowed("type") }),
        ),
        None => Ok(page::found(&route.path)),
    }
}

/// POST /auth/password?type=reset|recovery
pub async fn submit(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(query): Query<HashMap<String, String>>,
    Form(form): Form<PasswordForm>,
) -> Result<Response, ApiError> {
    match query.get("type").map(String::as_str) {
        Some("reset") => request_reset(&state, &ctx, form).await,
        Some("recovery") => recover(&state, &ctx, form).await,
        other => Err(ApiError::bad_request(format!(
            "Unknown password action: {}",
            other.unwrap_or("")
        ))),
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

async fn request_reset(
    state: &AppState,
    ctx: &RequestContext,
    form: PasswordForm,
) -> Result<Response, ApiError> {
    let lang = Lang::from(&ctx.preferences());
    let email = form.email.trim();

    if !is_valid_email(email) {
        return Ok(FormFailure::new(Message::InvalidEmail.text(lang)).into_response());
    }

    let redirect_to = format!(
        "{}/auth/callback?type=recovery",
        state.config.server.public_url.trim_end_matches('/')
    );
    if let Err(e) = ctx
        .session()?
        .auth()
        .send_recovery_email(email, &redirect_to)
        .await
    {
        debug!(error = %e, "Recovery email rejected");
        let message = if e.is_email_not_confirmed() {
            Message::RecoveryEmailNotConfirmed
        } else {
            Message::RecoveryEmailFailed
        };
        return Ok(FormFailure::new(message.text(lang)).into_response());
    }

    Ok(Redirect::to(&state.config.access.signin_path).into_response())
}

/// Check a new password pair; the first problem found wins
fn check_new_password(password: &str, confirm: &str) -> Option<Message> {
    if password.is_empty() || confirm.is_empty() {
        return Some(Message::PasswordRequired);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Some(Message::PasswordTooShort);
    }
    if password != confirm {
        return Some(Message::PasswordsDoNotMatch);
    }
    None
}

async fn recover(
    state: &AppState,
    ctx: &RequestContext,
    form: PasswordForm,
) -> Result<Response, ApiError> {
    let lang = Lang::from(&ctx.preferences());

    if let Some(problem) = check_new_password(&form.password, &form.confirm_password) {
        return Ok(FormFailure::new(problem.text(lang)).into_response());
    }

    let update = CredentialsUpdate {
        email: None,
        password: Some(form.password),
    };
    if let Err(e) = ctx.session()?.auth().update_credentials(update).await {
        warn!(error = %e, "Password update failed");
        let message = if e.is_same_password() {
            Message::SamePassword
        } else {
            Message::PasswordUpdateFailed
        };
        return Ok(FormFailure::new(message.text(lang)).into_response());
    }

    Ok(Redirect::to(&state.config.access.home_path).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_router;
    use crate::identity::AuthError;
    use crate::testing::{app_state, FakeIdentity};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("owner@example.com"));
        assert!(is_valid_email("first.last-1@mail.example.co"));
        assert!(!is_valid_email("owner@"));
        assert!(!is_valid_email("owner example.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_new_password_checks() {
        assert_eq!(check_new_password("", "x"), Some(Message::PasswordRequired));
        assert_eq!(check_new_password("short", "short"), Some(Message::PasswordTooShort));
        assert_eq!(
            check_new_password("longenough", "longenougX"),
            Some(Message::PasswordsDoNotMatch)
        );
        assert_eq!(check_new_password("longenough", "longenough"), None);
    }

    #[tokio::test]
    async fn test_password_page_defaults_type() {
        let identity = FakeIdentity::anonymous();
        let app = create_router(app_state(&identity));

        let response = app
            .oneshot(Request::get("/auth/password").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/auth/password?type=reset");
    }

    #[tokio::test]
    async fn test_password_reset_page_accepts_missing_type() {
        let identity = FakeIdentity::anonymous();
        let app = create_router(app_state(&identity));

        let response = app
            .clone()
            .oneshot(Request::get("/auth/password_reset").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get("/auth/password_reset?type=signup")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/auth/password_reset");
    }

    #[tokio::test]
    async fn test_reset_sends_recovery_link() {
        let identity = FakeIdentity::anonymous();
        let app = create_router(app_state(&identity));

        let response = app
            .oneshot(form_post("/auth/password?type=reset", "email=+owner%40example.com+"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/auth?action=signin");
        assert_eq!(
            identity.last_recovery_redirect().as_deref(),
            Some("http://localhost:8080/auth/callback?type=recovery")
        );
    }

    #[tokio::test]
    async fn test_signed_in_recovery_submission_reaches_handler() {
        let identity = FakeIdentity::signed_in("tenant@example.com");
        let app = create_router(app_state(&identity));

        let response = app
            .oneshot(form_post(
                "/auth/password?type=recovery",
                "password=newpassword&confirm_password=newpassword",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
        assert_eq!(identity.calls().update_credentials, 1);
        assert_eq!(
            identity.last_update().and_then(|u| u.password).as_deref(),
            Some("newpassword")
        );
    }

    #[tokio::test]
    async fn test_same_password_is_worded_apart() {
        let identity = FakeIdentity::signed_in("tenant@example.com").with_auth_error(
            AuthError::new(
                Some("same_password"),
                "New password should be different from the old password",
            ),
        );
        let app = create_router(app_state(&identity));

        let response = app
            .oneshot(form_post(
                "/auth/password?type=recovery",
                "password=newpassword&confirm_password=newpassword",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body["message"],
            "Debes ingresar una contraseña diferente a la anterior."
        );
    }
}
