//! Minimal HTML document shell for page responses.
//!
//! The page data is embedded as JSON for the client bundle to hydrate from.

use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde::Serialize;
use std::collections::HashMap;

use super::error::ApiError;
use crate::config::RouteEntry;

pub fn render<T: Serialize>(title: &str, data: &T) -> Result<Response, ApiError> {
    let json = serde_json::to_string(data)
        .map_err(|e| ApiError::internal(format!("Failed to serialize page data: {}", e)))?;

    let document = format!(
        concat!(
            "<!doctype html>\n",
            "<html>\n",
            "<head><meta charset=\"utf-8\"><title>{}</title></head>\n",
            "<body><script id=\"page-data\" type=\"application/json\">{}</script></body>\n",
            "</html>\n"
        ),
        escape_text(title),
        // Keep a `</script>` inside a string value from closing the tag
        json.replace("</", "<\\/")
    );
    Ok(Html(document).into_response())
}

/// 302 redirect, used when a page is opened with an invalid query
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// The query value for `param` if the route allows it; a missing parameter counts as empty
pub fn allowed_value(
    route: &RouteEntry,
    param: &str,
    query: &HashMap<String, String>,
) -> Option<String> {
    let value = query.get(param).cloned().unwrap_or_default();
    route.allowed(param).contains(&value).then_some(value)
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::json;

    #[tokio::test]
    async fn test_render_embeds_data() {
        let response = render("Inicio", &json!({"note": "</script><b>"})).unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("<html>"));
        assert!(body.contains("<title>Inicio</title>"));
        assert!(body.contains(r#"{"note":"<\/script><b>"}"#));
    }

    #[test]
    fn test_allowed_value() {
        let config = crate::config::Config::default();
        let reset = config.route("password-reset").unwrap();
        let mut query = HashMap::new();

        assert_eq!(allowed_value(reset, "type", &query).as_deref(), Some(""));
        query.insert("type".to_string(), "recovery".to_string());
        assert_eq!(allowed_value(reset, "type", &query).as_deref(), Some("recovery"));
        query.insert("type".to_string(), "magic".to_string());
        assert_eq!(allowed_value(reset, "type", &query), None);

        let auth = config.route("auth").unwrap();
        assert_eq!(allowed_value(auth, "action", &HashMap::new()), None);
    }

    #[test]
    fn test_found_is_302() {
        let response = found("/auth?action=signin");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/auth?action=signin");
    }
}
