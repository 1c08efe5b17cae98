//! PostgREST client for the hosted data store.
//!
//! Requests are authorized with the caller's access token when the request
//! carries a session, so row-level security applies per user.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{DataStore, Query, QueryError};
use crate::identity::gotrue::SessionCookie;
use crate::identity::CookieBridge;

pub struct PostgrestStore {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    session_cookie: SessionCookie,
    cookies: Arc<CookieBridge>,
}

impl PostgrestStore {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        anon_key: &str,
        session_cookie: SessionCookie,
        cookies: Arc<CookieBridge>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            session_cookie,
            cookies,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn bearer(&self) -> String {
        let token = self
            .session_cookie
            .load(&self.cookies)
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.anon_key.clone());
        format!("Bearer {}", token)
    }

    async fn read_rows(&self, response: reqwest::Response) -> Result<Vec<Value>, QueryError> {
        self.cookies.record_transport_headers(response.headers());

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Rejected {
                status: status.as_u16(),
                message: rejection_message(&body),
            });
        }

        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| QueryError::Decode(e.to_string()))
    }
}

/// PostgREST query string for a select: `select=...&field=eq.value`
pub fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), query.columns.clone())];
    params.extend(
        query
            .filters
            .iter()
            .map(|(field, value)| (field.clone(), format!("eq.{}", value))),
    );
    params
}

fn rejection_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl DataStore for PostgrestStore {
    async fn fetch(&self, query: &Query) -> Result<Vec<Value>, QueryError> {
        let response = self
            .client
            .get(self.table_url(&query.table))
            .query(&query_params(query))
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| QueryError::Transport(e.to_string()))?;

        self.read_rows(response).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, QueryError> {
        let response = self
            .client
            .post(self.table_url(table))
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer())
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(|e| QueryError::Transport(e.to_string()))?;

        self.read_rows(response)
            .await?
            .pop()
            .ok_or_else(|| QueryError::NotFound(table.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_use_eq_operator() {
        let query = Query::table("user").eq("email", "owner@example.com");
        assert_eq!(
            query_params(&query),
            vec![
                ("select".to_string(), "*".to_string()),
                ("email".to_string(), "eq.owner@example.com".to_string()),
            ]
        );
    }

    #[test]
    fn test_rejection_message_prefers_json_message() {
        assert_eq!(
            rejection_message(r#"{"code":"42501","message":"permission denied"}"#),
            "permission denied"
        );
        assert_eq!(rejection_message("bad gateway"), "bad gateway");
    }
}
