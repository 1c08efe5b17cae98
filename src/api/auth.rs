//! Sign-in, sign-up and sign-out.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::{ApiError, FormFailure};
use super::messages::{Lang, Message};
use super::page;
use crate::identity::SignUpOptions;
use crate::pipeline::RequestContext;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// GET /auth?action=signin|signup
pub async fn auth_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let route = state.config.route("auth").map_err(|e| ApiError::internal(e.to_string()))?;

    match page::allowed_value(route, "action", &query) {
        Some(action) => page::render(
            "Auth",
            &json!({ "action": action, "actions": route.allowed("action") }),
        ),
        None => {
            let default = route.default_value("action").unwrap_or_default();
            Ok(page::found(&format!("{}?action={}", route.path, default)))
        }
    }
}

/// POST /auth?action=signin|signup
pub async fn submit(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(query): Query<HashMap<String, String>>,
    Form(form): Form<CredentialsForm>,
) -> Result<Response, ApiError> {
    match query.get("action").map(String::as_str) {
        Some("signin") => sign_in(&state, &ctx, form).await,
        Some("signup") => sign_up(&state, &ctx, form).await,
        other => Err(ApiError::bad_request(format!(
            "Unknown auth action: {}",
            other.unwrap_or("")
        ))),
    }
}

async fn sign_in(
    state: &AppState,
    ctx: &RequestContext,
    form: CredentialsForm,
) -> Result<Response, ApiError> {
    let lang = Lang::from(&ctx.preferences());

    if let Err(e) = ctx.session()?.auth().sign_in(&form.email, &form.password).await {
        debug!(error = %e, "Sign-in rejected");
        let message = if e.is_email_not_confirmed() {
            Message::EmailNotConfirmed
        } else {
            Message::InvalidCredentials
        };
        return Ok(FormFailure::new(message.text(lang)).into_response());
    }

    Ok(Redirect::to(&state.config.access.home_path).into_response())
}

async fn sign_up(
    state: &AppState,
    ctx: &RequestContext,
    form: CredentialsForm,
) -> Result<Response, ApiError> {
    let lang = Lang::from(&ctx.preferences());

    if form.password != form.confirm_password {
        return Ok(FormFailure::new(Message::PasswordsDoNotMatch.text(lang)).into_response());
    }

    let options = SignUpOptions {
        email_redirect_to: Some(format!(
            "{}/auth/callback?type=signup",
            state.config.server.public_url.trim_end_matches('/')
        )),
        data: None,
    };

    if let Err(e) = ctx
        .session()?
        .auth()
        .sign_up(&form.email, &form.password, options)
        .await
    {
        debug!(error = %e, "Sign-up rejected");
        let message = if e.message.is_empty() {
            Message::SignUpFailed.text(lang).to_string()
        } else {
            e.message
        };
        return Ok(FormFailure::new(message).into_response());
    }

    Ok(Redirect::to(&state.config.access.signin_path).into_response())
}

/// POST /auth/signout
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<Response, ApiError> {
    if let Err(e) = ctx.session()?.auth().sign_out().await {
        warn!(error = %e, "Sign-out failed at the identity service");
    }
    Ok(Redirect::to(&state.config.access.signin_path).into_response())
}

#[cfg(test)]
mod tests {
    use crate::api::create_router;
    use crate::identity::AuthError;
    use crate::testing::{app_state, FakeIdentity};
    use axum::body::{to_bytes, Body};
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

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_action_redirects_to_default() {
        let identity = FakeIdentity::anonymous();
        let app = create_router(app_state(&identity));

        let response = app
            .oneshot(Request::get("/auth?action=delete").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/auth?action=signin");
    }

    #[tokio::test]
    async fn test_signup_password_mismatch_never_calls_identity_service() {
        let identity = FakeIdentity::anonymous();
        let app = create_router(app_state(&identity));

        let response = app
            .oneshot(form_post(
                "/auth?action=signup",
                "email=new%40example.com&password=abcdefgh&confirm_password=abcdefgi",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["message"],
            "Las contraseñas no coinciden."
        );
        assert_eq!(identity.calls().sign_up, 0);
    }

    #[tokio::test]
    async fn test_signup_success_goes_to_signin() {
        let identity = FakeIdentity::anonymous();
        let app = create_router(app_state(&identity));

        let response = app
            .oneshot(form_post(
                "/auth?action=signup",
                "email=new%40example.com&password=abcdefgh&confirm_password=abcdefgh",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/auth?action=signin");
        assert_eq!(identity.calls().sign_up, 1);
    }

    #[tokio::test]
    async fn test_signin_unconfirmed_email_message() {
        let identity = FakeIdentity::anonymous()
            .with_auth_error(AuthError::new(Some("email_not_confirmed"), "Email not confirmed"));
        let app = create_router(app_state(&identity));

        let mut request = form_post("/auth?action=signin", "email=a%40b.co&password=secret123");
        request
            .headers_mut()
            .insert(header::COOKIE, "lang=en".parse().unwrap());
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["message"],
            "You must confirm your email before signing in."
        );
    }

    #[tokio::test]
    async fn test_signin_bad_credentials_message() {
        let identity = FakeIdentity::anonymous()
            .with_auth_error(AuthError::new(Some("invalid_credentials"), "Invalid login credentials"));
        let app = create_router(app_state(&identity));

        let response = app
            .oneshot(form_post("/auth?action=signin", "email=a%40b.co&password=wrong"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["message"],
            "Credenciales incorrectas. Verifica tu correo y contraseña."
        );
        assert_eq!(identity.calls().sign_in, 1);
    }

    #[tokio::test]
    async fn test_signout_redirects_to_signin() {
        let identity = FakeIdentity::signed_in("tenant@example.com");
        let app = create_router(app_state(&identity));

        let response = app
            .oneshot(form_post("/auth/signout", ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/auth?action=signin");
        assert_eq!(identity.calls().sign_out, 1);
    }
}
