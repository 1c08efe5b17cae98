//! Session resolution.
//!
//! Binds the request's cookies to an identity client and exposes the session
//! and the materialized identities as lazily computed, per-request memos.

use axum::{async_trait, extract::Request, response::Response};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use super::identity::{materialize, Identities, IdentityError};
use super::{Flow, RequestContext, Stage};
use crate::identity::{AuthApi, BoundClient, CookieBridge, IdentityService, Session};
use crate::store::DataStore;

/// Request-scoped identity state. Dropped with the request.
pub struct SessionHandle {
    client: BoundClient,
    cookies: Arc<CookieBridge>,
    session: OnceCell<Option<Session>>,
    identities: OnceCell<Arc<Identities>>,
}

impl SessionHandle {
    pub fn new(client: BoundClient, cookies: Arc<CookieBridge>) -> Self {
        Self {
            client,
            cookies,
            session: OnceCell::new(),
            identities: OnceCell::new(),
        }
    }

    pub fn auth(&self) -> &dyn AuthApi {
        self.client.auth.as_ref()
    }

    pub fn data(&self) -> &dyn DataStore {
        self.client.data.as_ref()
    }

    pub fn cookies(&self) -> &CookieBridge {
        &self.cookies
    }

    /// The validated session, computed on first use
    pub async fn get_session(&self) -> Option<Session> {
        self.session
            .get_or_init(|| async { self.client.auth.validate_session().await })
            .await
            .clone()
    }

    /// Identity and domain user, computed on first use.
    ///
    /// Only a successful lookup is memoized; a failed one is retried on the next call.
    pub async fn get_identities(&self) -> Result<Arc<Identities>, IdentityError> {
        self.identities
            .get_or_try_init(|| async { materialize(&self.client).await.map(Arc::new) })
            .await
            .cloned()
    }
}

pub struct SessionStage {
    identity: Arc<dyn IdentityService>,
    secure_cookies: bool,
    log_paths: bool,
}

impl SessionStage {
    pub fn new(identity: Arc<dyn IdentityService>, secure_cookies: bool, log_paths: bool) -> Self {
        Self {
            identity,
            secure_cookies,
            log_paths,
        }
    }
}

#[async_trait]
impl Stage for SessionStage {
    fn name(&self) -> &'static str {
        "session"
    }

    async fn enter(&self, request: &mut Request, mut ctx: RequestContext) -> Flow {
        if self.log_paths {
            debug!(path = %request.uri().path(), "Resolving session");
        }

        let cookies = Arc::new(CookieBridge::from_headers(
            request.headers(),
            self.secure_cookies,
        ));
        let client = self.identity.bind(cookies.clone());
        ctx.session = Some(Arc::new(SessionHandle::new(client, cookies)));
        Flow::Continue(ctx)
    }

    async fn leave(&self, ctx: &RequestContext, mut response: Response) -> Response {
        if let Some(handle) = &ctx.session {
            handle.cookies().apply(response.headers_mut());
        }
        response
    }
}
