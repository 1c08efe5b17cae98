//! In-memory identity service and data store for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::identity::{
    AuthApi, AuthError, AuthEvents, AuthenticatedIdentity, BoundClient, CookieBridge,
    CredentialsUpdate, IdentityService, Session, SignUpOptions,
};
use crate::store::{DataStore, Query, QueryError};
use crate::AppState;

/// How many times each collaborator method was called
#[derive(Debug, Clone, Default)]
pub struct Calls {
    pub validate_session: usize,
    pub current_identity: usize,
    pub sign_in: usize,
    pub sign_up: usize,
    pub sign_out: usize,
    pub send_recovery_email: usize,
    pub update_credentials: usize,
    pub exchange_auth_code: usize,
    pub fetch: usize,
    pub insert: usize,
}

#[derive(Default)]
struct FakeState {
    identity: Option<AuthenticatedIdentity>,
    identity_revoked: bool,
    auth_error: Option<AuthError>,
    store_failure: bool,
    tables: HashMap<String, Vec<Value>>,
    calls: Calls,
    last_recovery_redirect: Option<String>,
    last_update: Option<CredentialsUpdate>,
}

#[derive(Clone, Default)]
pub struct FakeIdentity {
    state: Arc<Mutex<FakeState>>,
}

impl FakeIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(email: &str) -> Self {
        let fake = Self::default();
        fake.state.lock().identity = Some(AuthenticatedIdentity {
            id: "00000000-0000-0000-0000-000000000001".to_string(),
            email: Some(email.to_string()),
            email_confirmed_at: Some("2025-01-01T00:00:00Z".to_string()),
            created_at: Some("2025-01-01T00:00:00Z".to_string()),
        });
        fake
    }

    /// The session cookie still validates but the identity service no longer
    /// returns an identity for it
    pub fn with_revoked_identity(self) -> Self {
        self.state.lock().identity_revoked = true;
        self
    }

    /// Add a row to the `user` table
    pub fn with_user(self, row: Value) -> Self {
        self.with_row("user", row)
    }

    pub fn with_row(self, table: &str, row: Value) -> Self {
        self.state
            .lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row);
        self
    }

    /// Every identity-service call that can fail fails with this error
    pub fn with_auth_error(self, error: AuthError) -> Self {
        self.state.lock().auth_error = Some(error);
        self
    }

    /// Every data-store call fails
    pub fn with_store_failure(self) -> Self {
        self.state.lock().store_failure = true;
        self
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().calls.clone()
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state.lock().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn last_recovery_redirect(&self) -> Option<String> {
        self.state.lock().last_recovery_redirect.clone()
    }

    pub fn last_update(&self) -> Option<CredentialsUpdate> {
        self.state.lock().last_update.clone()
    }
}

impl IdentityService for FakeIdentity {
    fn bind(&self, _cookies: Arc<CookieBridge>) -> BoundClient {
        BoundClient {
            auth: Arc::new(self.clone()),
            data: Arc::new(self.clone()),
        }
    }
}

impl FakeIdentity {
    fn outcome(&self) -> Result<(), AuthError> {
        match &self.state.lock().auth_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AuthApi for FakeIdentity {
    async fn validate_session(&self) -> Option<Session> {
        let mut state = self.state.lock();
        state.calls.validate_session += 1;
        state.identity.as_ref().map(|identity| Session {
            access_token: "access-token".to_string(),
            refresh_token: "refresh-token".to_string(),
            expires_at: i64::MAX,
            token_type: "bearer".to_string(),
            user: Some(identity.clone()),
        })
    }

    async fn current_identity(&self) -> Option<AuthenticatedIdentity> {
        let mut state = self.state.lock();
        state.calls.current_identity += 1;
        if state.identity_revoked {
            return None;
        }
        state.identity.clone()
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<(), AuthError> {
        self.state.lock().calls.sign_in += 1;
        self.outcome()
    }

    async fn sign_up(
        &self,
        _email: &str,
        _password: &str,
        _options: SignUpOptions,
    ) -> Result<(), AuthError> {
        self.state.lock().calls.sign_up += 1;
        self.outcome()
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.state.lock().calls.sign_out += 1;
        self.outcome()
    }

    async fn send_recovery_email(&self, _email: &str, redirect_to: &str) -> Result<(), AuthError> {
        {
            let mut state = self.state.lock();
            state.calls.send_recovery_email += 1;
            state.last_recovery_redirect = Some(redirect_to.to_string());
        }
        self.outcome()
    }

    async fn update_credentials(&self, update: CredentialsUpdate) -> Result<(), AuthError> {
        {
            let mut state = self.state.lock();
            state.calls.update_credentials += 1;
            state.last_update = Some(update);
        }
        self.outcome()
    }

    async fn exchange_auth_code(&self, _code: &str) -> Result<(), AuthError> {
        self.state.lock().calls.exchange_auth_code += 1;
        self.outcome()
    }
}

fn matches(row: &Value, filters: &[(String, String)]) -> bool {
    filters.iter().all(|(field, expected)| match row.get(field) {
        Some(Value::String(s)) => s == expected,
        Some(other) => other.to_string() == *expected,
        None => false,
    })
}

#[async_trait]
impl DataStore for FakeIdentity {
    async fn fetch(&self, query: &Query) -> Result<Vec<Value>, QueryError> {
        let mut state = self.state.lock();
        state.calls.fetch += 1;
        if state.store_failure {
            return Err(QueryError::Transport("connection refused".to_string()));
        }
        Ok(state
            .tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches(row, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, table: &str, mut row: Value) -> Result<Value, QueryError> {
        let mut state = self.state.lock();
        state.calls.insert += 1;
        if state.store_failure {
            return Err(QueryError::Transport("connection refused".to_string()));
        }
        let rows = state.tables.entry(table.to_string()).or_default();
        row["id"] = json!(rows.len() + 1);
        rows.push(row.clone());
        Ok(row)
    }
}

pub fn app_state(identity: &FakeIdentity) -> Arc<AppState> {
    let mut config = Config::default();
    config.server.environment = crate::config::Environment::Development;
    Arc::new(AppState::new(config, Arc::new(identity.clone()), AuthEvents::new()))
}

pub fn owner_row(email: &str) -> Value {
    json!({
        "id": 12,
        "first_name": "Lucía",
        "last_name": "Mora",
        "email": email,
        "account_type": "Propietario",
        "invite_code": "AB12-CD34",
        "country_id": 7
    })
}
