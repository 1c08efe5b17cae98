//! Display preferences from the `theme` and `lang` cookies.

use axum::{
    async_trait,
    body::{to_bytes, Body, HttpBody},
    extract::Request,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use lazy_static::lazy_static;
use regex::{NoExpand, Regex};
use serde::Serialize;
use tracing::warn;

use super::{Flow, RequestContext, Stage};
use crate::config::PreferencesConfig;

pub const THEME_COOKIE: &str = "theme";
pub const LANG_COOKIE: &str = "lang";

/// Largest HTML body buffered for the root tag rewrite
pub const MAX_REWRITE_BYTES: usize = 2 * 1024 * 1024;

lazy_static! {
    /// Opening root tag, with or without attributes
    static ref HTML_ROOT_TAG: Regex = Regex::new(r"(?i)<html(?:\s[^>]*)?>").unwrap();
}

/// Per-request display configuration. Values are not validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestConfig {
    pub theme: String,
    pub lang: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self::from_defaults(&PreferencesConfig::default())
    }
}

impl RequestConfig {
    fn from_defaults(defaults: &PreferencesConfig) -> Self {
        Self {
            theme: defaults.default_theme.clone(),
            lang: defaults.default_lang.clone(),
        }
    }

    /// Read preferences from cookies; missing or empty values fall back to defaults
    pub fn from_cookies(jar: &CookieJar, defaults: &PreferencesConfig) -> Self {
        let read = |name: &str, fallback: &str| {
            jar.get(name)
                .map(|c| c.value().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };

        Self {
            theme: read(THEME_COOKIE, &defaults.default_theme),
            lang: read(LANG_COOKIE, &defaults.default_lang),
        }
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Replace the first `<html ...>` tag with one carrying `lang` and the theme class
pub fn rewrite_root_tag(html: &str, lang: &str, theme: &str) -> String {
    let tag = format!(
        r#"<html lang="{}" class="{}">"#,
        escape_attr(lang),
        escape_attr(theme)
    );
    HTML_ROOT_TAG.replace(html, NoExpand(&tag)).into_owned()
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"))
}

pub struct PreferenceStage {
    defaults: PreferencesConfig,
}

impl PreferenceStage {
    pub fn new(defaults: &PreferencesConfig) -> Self {
        Self {
            defaults: defaults.clone(),
        }
    }
}

#[async_trait]
impl Stage for PreferenceStage {
    fn name(&self) -> &'static str {
        "preferences"
    }

    async fn enter(&self, request: &mut Request, mut ctx: RequestContext) -> Flow {
        let jar = CookieJar::from_headers(request.headers());
        ctx.config = Some(RequestConfig::from_cookies(&jar, &self.defaults));
        Flow::Continue(ctx)
    }

    async fn leave(&self, ctx: &RequestContext, response: Response) -> Response {
        if !is_html(&response) {
            return response;
        }
        let config = ctx.preferences();

        let (mut parts, body) = response.into_parts();
        if body.size_hint().lower() > MAX_REWRITE_BYTES as u64 {
            warn!(
                size = body.size_hint().lower(),
                "HTML response too large to rewrite, passing through"
            );
            return Response::from_parts(parts, body);
        }

        let bytes = match to_bytes(body, MAX_REWRITE_BYTES).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to buffer HTML response");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let body = match std::str::from_utf8(&bytes) {
            Ok(html) => Body::from(rewrite_root_tag(html, &config.lang, &config.theme)),
            Err(_) => Body::from(bytes),
        };
        parts.headers.remove(header::CONTENT_LENGTH);
        Response::from_parts(parts, body)
    }
}
