//! HTTP client for a GoTrue-compatible identity service.
//!
//! The session lives in a cookie holding `base64-<json>`, split into numbered
//! chunks when it grows past the cookie size limit. Expired sessions are
//! refreshed transparently and the new tokens written back through the bridge.

use async_trait::async_trait;
use axum_extra::extract::cookie::Cookie;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{
    AuthApi, AuthError, AuthEvent, AuthEvents, AuthenticatedIdentity, BoundClient, CookieBridge,
    CredentialsUpdate, IdentityService, Session, SignUpOptions,
};
use crate::config::IdentityConfig;
use crate::store::PostgrestStore;

/// Refresh this many seconds before the access token actually expires
const EXPIRY_MARGIN_SECS: i64 = 10;

const BASE64_PREFIX: &str = "base64-";

const VERIFIER_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Codec for the session cookie and its PKCE verifier companion.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: String,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn verifier_name(&self) -> String {
        format!("{}-code-verifier", self.name)
    }

    pub fn load(&self, cookies: &CookieBridge) -> Option<Session> {
        let raw = cookies.get_chunked(&self.name)?;
        match decode_session(&raw) {
            Some(session) => Some(session),
            None => {
                warn!(cookie = %self.name, "Ignoring undecodable session cookie");
                None
            }
        }
    }

    pub fn store(&self, cookies: &CookieBridge, session: &Session) {
        cookies.set_chunked(&self.name, &encode_session(session));
    }

    pub fn clear(&self, cookies: &CookieBridge) {
        cookies.remove_chunked(&self.name);
    }
}

pub fn encode_session(session: &Session) -> String {
    let json = serde_json::to_string(session).unwrap_or_default();
    format!("{}{}", BASE64_PREFIX, URL_SAFE_NO_PAD.encode(json))
}

pub fn decode_session(raw: &str) -> Option<Session> {
    let json = match raw.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => String::from_utf8(URL_SAFE_NO_PAD.decode(encoded).ok()?).ok()?,
        None => raw.to_string(),
    };
    serde_json::from_str(&json).ok()
}

/// Generate a PKCE code verifier
fn generate_verifier() -> String {
    let mut rng = rand::rng();
    (0..64)
        .map(|_| VERIFIER_ALPHABET[rng.random_range(0..VERIFIER_ALPHABET.len())] as char)
        .collect()
}

/// S256 code challenge for a verifier
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Translate an identity-service error body into an `AuthError`.
///
/// Handles both the `{error_code, msg}` and the OAuth `{error, error_description}` shapes.
pub fn parse_error(status: u16, body: &str) -> AuthError {
    let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

    let code = text("error_code").or_else(|| text("code")).or_else(|| text("error"));
    let message = text("msg")
        .or_else(|| text("message"))
        .or_else(|| text("error_description"))
        .or_else(|| text("error"))
        .unwrap_or_else(|| format!("Identity service returned {}", status));

    AuthError {
        code,
        message,
        status: Some(status),
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    user: Option<AuthenticatedIdentity>,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> Session {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| now + self.expires_in.unwrap_or(3600));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            user: self.user,
        }
    }
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

/// Process-wide factory; owns the connection pool shared by all bound clients.
pub struct GoTrueService {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    cookie: SessionCookie,
    events: AuthEvents,
}

impl GoTrueService {
    pub fn new(config: &IdentityConfig, events: AuthEvents) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            cookie: SessionCookie::new(config.cookie_name.clone()),
            events,
        }
    }
}

impl IdentityService for GoTrueService {
    fn bind(&self, cookies: Arc<CookieBridge>) -> BoundClient {
        let auth = GoTrueClient {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            anon_key: self.anon_key.clone(),
            cookie: self.cookie.clone(),
            cookies: cookies.clone(),
            events: self.events.clone(),
        };
        let data = PostgrestStore::new(
            self.client.clone(),
            &self.base_url,
            &self.anon_key,
            self.cookie.clone(),
            cookies,
        );

        BoundClient {
            auth: Arc::new(auth),
            data: Arc::new(data),
        }
    }
}

/// Auth client bound to one request's cookies.
pub struct GoTrueClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    cookie: SessionCookie,
    cookies: Arc<CookieBridge>,
    events: AuthEvents,
}

impl GoTrueClient {
    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Send a request and return the decoded JSON body (`Null` for empty bodies)
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        bearer: Option<&str>,
    ) -> Result<Value, AuthError> {
        let token = bearer.unwrap_or(&self.anon_key);
        let response = request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(AuthError::network)?;

        self.cookies.record_transport_headers(response.headers());

        let status = response.status();
        let body = response.text().await.map_err(AuthError::network)?;
        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| AuthError::new(Some("unexpected_response"), e.to_string()))
    }

    /// Persist a token response as the current session
    fn store_tokens(&self, body: Value) -> Result<Session, AuthError> {
        let tokens: TokenResponse = serde_json::from_value(body)
            .map_err(|e| AuthError::new(Some("unexpected_response"), e.to_string()))?;
        let session = tokens.into_session(chrono::Utc::now().timestamp());
        self.cookie.store(&self.cookies, &session);
        Ok(session)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let body = self
            .send(
                self.client
                    .post(self.url("token"))
                    .query(&[("grant_type", "refresh_token")])
                    .json(&json!({ "refresh_token": refresh_token })),
                None,
            )
            .await?;
        self.store_tokens(body)
    }

    /// Create and remember a PKCE verifier, returning its challenge
    fn start_pkce(&self) -> String {
        let verifier = generate_verifier();
        let challenge = code_challenge(&verifier);
        let mut cookie = Cookie::new(self.cookie.verifier_name(), verifier);
        cookie.set_http_only(true);
        self.cookies.set(cookie);
        challenge
    }
}

#[async_trait]
impl AuthApi for GoTrueClient {
    async fn validate_session(&self) -> Option<Session> {
        let session = self.cookie.load(&self.cookies)?;
        let now = chrono::Utc::now().timestamp();
        if !session.expires_within(now, EXPIRY_MARGIN_SECS) {
            return Some(session);
        }

        debug!("Session expired, refreshing");
        match self.refresh(&session.refresh_token).await {
            Ok(refreshed) => {
                self.events.publish(AuthEvent::TokenRefreshed);
                Some(refreshed)
            }
            Err(e) if e.is_rejection() => {
                warn!(error = %e, "Session refresh rejected, clearing session");
                self.cookie.clear(&self.cookies);
                None
            }
            // The tokens may still be good once the provider is reachable again.
            Err(e) => {
                warn!(error = %e, "Session refresh failed");
                None
            }
        }
    }

    async fn current_identity(&self) -> Option<AuthenticatedIdentity> {
        let session = self.validate_session().await?;
        let body = match self
            .send(self.client.get(self.url("user")), Some(&session.access_token))
            .await
        {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to fetch current identity");
                return None;
            }
        };

        match serde_json::from_value(body) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!(error = %e, "Identity service returned an unreadable user");
                None
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let body = self
            .send(
                self.client
                    .post(self.url("token"))
                    .query(&[("grant_type", "password")])
                    .json(&PasswordGrant { email, password }),
                None,
            )
            .await?;
        self.store_tokens(body)?;
        self.events.publish(AuthEvent::SignedIn);
        Ok(())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        options: SignUpOptions,
    ) -> Result<(), AuthError> {
        let challenge = self.start_pkce();
        let mut request = self.client.post(self.url("signup")).json(&json!({
            "email": email,
            "password": password,
            "data": options.data,
            "code_challenge": challenge,
            "code_challenge_method": "s256",
        }));
        if let Some(redirect_to) = &options.email_redirect_to {
            request = request.query(&[("redirect_to", redirect_to)]);
        }

        let body = self.send(request, None).await?;

        // With auto-confirm the provider answers with a session right away.
        if body.get("access_token").is_some() {
            self.store_tokens(body)?;
            self.events.publish(AuthEvent::SignedIn);
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(session) = self.cookie.load(&self.cookies) {
            let result = self
                .send(
                    self.client
                        .post(self.url("logout"))
                        .query(&[("scope", "global")]),
                    Some(&session.access_token),
                )
                .await;

            // A session the provider no longer knows is already signed out.
            if let Err(e) = result {
                if !matches!(e.status, Some(401) | Some(403) | Some(404)) {
                    return Err(e);
                }
            }
        }

        self.cookie.clear(&self.cookies);
        self.events.publish(AuthEvent::SignedOut);
        Ok(())
    }

    async fn send_recovery_email(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        let challenge = self.start_pkce();
        self.send(
            self.client
                .post(self.url("recover"))
                .query(&[("redirect_to", redirect_to)])
                .json(&json!({
                    "email": email,
                    "code_challenge": challenge,
                    "code_challenge_method": "s256",
                })),
            None,
        )
        .await?;
        self.events.publish(AuthEvent::PasswordRecovery);
        Ok(())
    }

    async fn update_credentials(&self, update: CredentialsUpdate) -> Result<(), AuthError> {
        let mut session = self
            .validate_session()
            .await
            .ok_or_else(AuthError::session_missing)?;

        let body = self
            .send(
                self.client.put(self.url("user")).json(&update),
                Some(&session.access_token),
            )
            .await?;

        if let Ok(identity) = serde_json::from_value::<AuthenticatedIdentity>(body) {
            session.user = Some(identity);
            self.cookie.store(&self.cookies, &session);
        }
        self.events.publish(AuthEvent::UserUpdated);
        Ok(())
    }

    async fn exchange_auth_code(&self, code: &str) -> Result<(), AuthError> {
        let verifier_name = self.cookie.verifier_name();
        let verifier = self.cookies.get(&verifier_name).ok_or_else(|| {
            AuthError::new(
                Some("pkce_verifier_missing"),
                "Code verifier not found in storage",
            )
        })?;

        let body = self
            .send(
                self.client
                    .post(self.url("token"))
                    .query(&[("grant_type", "pkce")])
                    .json(&json!({ "auth_code": code, "code_verifier": verifier })),
                None,
            )
            .await?;

        self.store_tokens(body)?;
        self.cookies.remove(&verifier_name);
        self.events.publish(AuthEvent::SignedIn);
        Ok(())
    }
}
