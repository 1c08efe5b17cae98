//! Identity materialization and the onboarding gate.

use axum::response::Redirect;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::AccessConfig;
use crate::identity::{AuthenticatedIdentity, BoundClient};
use crate::models::{DeserializationError, Record, User};
use crate::store::{Query, QueryError};

/// Domain user lookup failed; the request cannot proceed as anonymous
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Domain user lookup failed: {0}")]
    Lookup(#[from] QueryError),

    #[error(transparent)]
    Malformed(#[from] DeserializationError),
}

/// The authenticated identity joined to its domain user.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Identities {
    pub auth_user: Option<AuthenticatedIdentity>,
    pub app_user: Option<User>,
}

impl Identities {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Signed in but no domain user yet
    pub fn needs_onboarding(&self) -> bool {
        self.auth_user.is_some() && self.app_user.is_none()
    }
}

pub(crate) async fn materialize(client: &BoundClient) -> Result<Identities, IdentityError> {
    let Some(auth_user) = client.auth.current_identity().await else {
        return Ok(Identities::anonymous());
    };

    let Some(email) = auth_user.email.clone() else {
        debug!(id = %auth_user.id, "Identity has no email, skipping user lookup");
        return Ok(Identities {
            auth_user: Some(auth_user),
            app_user: None,
        });
    };

    let row = client
        .data
        .fetch_optional(&Query::table("user").select("*").eq("email", &email))
        .await?;
    let app_user = row.map(User::from_json).transpose()?;

    Ok(Identities {
        auth_user: Some(auth_user),
        app_user,
    })
}

/// Gate for the private area.
///
/// No identity behind the session (revoked token, identity service down) goes to
/// sign-in. Users without a domain record are kept on the onboarding page, and
/// users with one are kept off it.
pub fn onboarding_gate(
    path: &str,
    identities: &Identities,
    access: &AccessConfig,
) -> Option<Redirect> {
    let on_onboarding = path == access.onboarding_path;

    if identities.auth_user.is_none() {
        return Some(Redirect::to(&access.signin_path));
    }
    if identities.needs_onboarding() && !on_onboarding {
        return Some(Redirect::to(&access.onboarding_path));
    }
    if identities.app_user.is_some() && on_onboarding {
        return Some(Redirect::to(&access.home_path));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    use serde_json::json;

    fn identity() -> AuthenticatedIdentity {
        AuthenticatedIdentity {
            id: "7d1c".to_string(),
            email: Some("owner@example.com".to_string()),
            email_confirmed_at: Some("2025-01-01T00:00:00Z".to_string()),
            created_at: None,
        }
    }

    fn user() -> User {
        User::from_json(json!({
            "id": 12,
            "first_name": "Lucía",
            "last_name": "Mora",
            "email": "owner@example.com",
            "account_type": "Propietario",
            "invite_code": "AB12-CD34",
            "country_id": 7
        }))
        .unwrap()
    }

    fn location(redirect: Option<Redirect>) -> Option<String> {
        redirect.map(|r| {
            let response = r.into_response();
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            response.headers()[header::LOCATION].to_str().unwrap().to_string()
        })
    }

    #[test]
    fn test_gate_sends_new_identity_to_onboarding() {
        let access = AccessConfig::default();
        let identities = Identities {
            auth_user: Some(identity()),
            app_user: None,
        };
        assert_eq!(
            location(onboarding_gate("/units", &identities, &access)).as_deref(),
            Some("/onboarding")
        );
        assert!(onboarding_gate("/onboarding", &identities, &access).is_none());
    }

    #[test]
    fn test_gate_sends_onboarded_user_home() {
        let access = AccessConfig::default();
        let identities = Identities {
            auth_user: Some(identity()),
            app_user: Some(user()),
        };
        assert_eq!(
            location(onboarding_gate("/onboarding", &identities, &access)).as_deref(),
            Some("/")
        );
        assert!(onboarding_gate("/units", &identities, &access).is_none());
    }

    #[test]
    fn test_gate_sends_missing_identity_to_signin() {
        let access = AccessConfig::default();
        for path in ["/units", "/", "/onboarding"] {
            assert_eq!(
                location(onboarding_gate(path, &Identities::anonymous(), &access)).as_deref(),
                Some("/auth?action=signin")
            );
        }
    }
}
