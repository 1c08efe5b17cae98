//! Identity service boundary.
//!
//! The identity provider owns sessions and credentials. This module defines the
//! narrow surface the request pipeline and form handlers consume, plus the
//! HTTP implementation used in deployments.

pub mod cookies;
pub mod events;
pub mod gotrue;

pub use cookies::CookieBridge;
pub use events::{AuthEvent, AuthEvents, AuthListener};
pub use gotrue::GoTrueService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::store::DataStore;

/// Opaque proof of authentication carried in cookies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) after which the access token is no longer accepted
    pub expires_at: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthenticatedIdentity>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Whether the access token expires within `margin_secs` of `now`
    pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at <= now + margin_secs
    }
}

/// Account record owned by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Failure reported by the identity provider.
///
/// Surfaced to form handlers as data; never raised across the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AuthError {
    /// Machine-readable code when the provider sent one (e.g. `email_not_confirmed`)
    pub code: Option<String>,
    pub message: String,
    pub status: Option<u16>,
}

impl AuthError {
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_string),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn network(err: impl std::fmt::Display) -> Self {
        Self::new(Some("network_error"), format!("Identity service unreachable: {}", err))
    }

    pub fn session_missing() -> Self {
        Self::new(Some("session_missing"), "Auth session missing!")
    }

    /// The provider answered and refused the request. Network failures and 5xx
    /// answers are not rejections.
    pub fn is_rejection(&self) -> bool {
        self.status.is_some_and(|status| (400..500).contains(&status))
    }

    pub fn is_email_not_confirmed(&self) -> bool {
        self.code.as_deref() == Some("email_not_confirmed") || self.message == "Email not confirmed"
    }

    pub fn is_same_password(&self) -> bool {
        self.code.as_deref() == Some("same_password")
            || self.message == "New password should be different from the old password"
    }
}

/// Options accepted by sign-up
#[derive(Debug, Clone, Default, Serialize)]
pub struct SignUpOptions {
    /// Where the confirmation link should land
    #[serde(skip)]
    pub email_redirect_to: Option<String>,
    /// Arbitrary user metadata stored by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Attributes changed by `update_credentials`
#[derive(Debug, Clone, Default, Serialize)]
pub struct CredentialsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Authentication operations of a cookie-bound client.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Current session, refreshed if needed. Any failure reads as `None`.
    async fn validate_session(&self) -> Option<Session>;

    /// Identity behind the current session. Any failure reads as `None`.
    async fn current_identity(&self) -> Option<AuthenticatedIdentity>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        options: SignUpOptions,
    ) -> Result<(), AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn send_recovery_email(&self, email: &str, redirect_to: &str) -> Result<(), AuthError>;

    async fn update_credentials(&self, update: CredentialsUpdate) -> Result<(), AuthError>;

    async fn exchange_auth_code(&self, code: &str) -> Result<(), AuthError>;
}

/// Identity and data access bound to one request's cookie jar.
#[derive(Clone)]
pub struct BoundClient {
    pub auth: Arc<dyn AuthApi>,
    pub data: Arc<dyn DataStore>,
}

/// Factory for request-scoped clients.
pub trait IdentityService: Send + Sync {
    /// Bind a client that reads and writes exactly this cookie bridge
    fn bind(&self, cookies: Arc<CookieBridge>) -> BoundClient;
}
