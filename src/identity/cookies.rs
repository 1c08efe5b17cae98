//! Request-scoped cookie bridge between the HTTP exchange and identity clients.
//!
//! Reads see the incoming jar overlaid with writes made earlier in the same
//! request. Writes are buffered and flushed onto the response by the session
//! stage, so refreshed tokens survive even when the request ends in a redirect.
//! Upstream transport headers are only collected here for the page data; they
//! never become response headers.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::warn;

/// Transport headers from the identity/data service that may reach the page data.
pub const ALLOWED_TRANSPORT_HEADERS: [&str; 2] = ["content-range", "x-supabase-api-version"];

/// Largest value stored in a single cookie before splitting into `name.0`, `name.1`, ...
pub const MAX_CHUNK_SIZE: usize = 3180;

pub struct CookieBridge {
    incoming: CookieJar,
    pending: Mutex<Vec<Cookie<'static>>>,
    transport: Mutex<HeaderMap>,
    secure: bool,
}

impl CookieBridge {
    /// Build a bridge over the request's `Cookie` headers.
    ///
    /// `secure` marks every written cookie `Secure`; it is off only in development.
    pub fn from_headers(headers: &HeaderMap, secure: bool) -> Self {
        Self {
            incoming: CookieJar::from_headers(headers),
            pending: Mutex::new(Vec::new()),
            transport: Mutex::new(HeaderMap::new()),
            secure,
        }
    }

    /// Current value of a cookie; a pending removal hides the incoming value.
    pub fn get(&self, name: &str) -> Option<String> {
        let pending = self.pending.lock();
        if let Some(cookie) = pending.iter().rev().find(|c| c.name() == name) {
            if cookie.value().is_empty() {
                return None;
            }
            return Some(cookie.value().to_string());
        }
        drop(pending);

        self.incoming.get(name).map(|c| c.value().to_string())
    }

    /// Queue a cookie write, forcing `Path=/` and the bridge's `Secure` flag
    pub fn set(&self, mut cookie: Cookie<'static>) {
        cookie.set_path("/");
        cookie.set_secure(self.secure);
        if cookie.same_site().is_none() {
            cookie.set_same_site(SameSite::Lax);
        }

        let mut pending = self.pending.lock();
        pending.retain(|c| c.name() != cookie.name());
        pending.push(cookie);
    }

    /// Queue a removal of a cookie
    pub fn remove(&self, name: &str) {
        let mut cookie = Cookie::new(name.to_string(), String::new());
        cookie.make_removal();
        self.set(cookie);
    }

    /// Read a value that may have been split across numbered chunks
    pub fn get_chunked(&self, name: &str) -> Option<String> {
        if let Some(value) = self.get(name) {
            return Some(value);
        }

        let mut value = String::new();
        let mut index = 0;
        while let Some(chunk) = self.get(&format!("{}.{}", name, index)) {
            value.push_str(&chunk);
            index += 1;
        }
        (!value.is_empty()).then_some(value)
    }

    /// Write a value, splitting it into numbered chunks when it is too large
    pub fn set_chunked(&self, name: &str, value: &str) {
        let stale_chunks = self.chunk_count(name);

        if value.len() <= MAX_CHUNK_SIZE {
            self.set(session_cookie(name.to_string(), value.to_string()));
            for index in 0..stale_chunks {
                self.remove(&format!("{}.{}", name, index));
            }
            return;
        }

        let chunks = split_chunks(value, MAX_CHUNK_SIZE);
        for (index, chunk) in chunks.iter().enumerate() {
            self.set(session_cookie(format!("{}.{}", name, index), chunk.clone()));
        }
        for index in chunks.len()..stale_chunks {
            self.remove(&format!("{}.{}", name, index));
        }
        if self.get(name).is_some() {
            self.remove(name);
        }
    }

    /// Remove a value and any chunks it was split into
    pub fn remove_chunked(&self, name: &str) {
        if self.get(name).is_some() {
            self.remove(name);
        }
        for index in 0..self.chunk_count(name) {
            self.remove(&format!("{}.{}", name, index));
        }
    }

    fn chunk_count(&self, name: &str) -> usize {
        let mut count = 0;
        while self.get(&format!("{}.{}", name, count)).is_some() {
            count += 1;
        }
        count
    }

    /// Remember transport headers from an upstream response; only allow-listed ones are kept
    pub fn record_transport_headers(&self, headers: &HeaderMap) {
        let filtered = filter_transport_headers(headers);
        let mut transport = self.transport.lock();
        for (name, value) in filtered.iter() {
            transport.insert(name.clone(), value.clone());
        }
    }

    /// Allow-listed upstream headers seen so far, for embedding in page data
    pub fn transport_headers(&self) -> BTreeMap<String, String> {
        self.transport
            .lock()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect()
    }

    /// Flush buffered cookie writes onto a response
    pub fn apply(&self, headers: &mut HeaderMap) {
        for cookie in self.pending.lock().iter() {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(e) => warn!(cookie = %cookie.name(), error = %e, "Dropping unencodable cookie"),
            }
        }
    }
}

/// Keep only the allow-listed transport headers
pub fn filter_transport_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::new();
    for name in ALLOWED_TRANSPORT_HEADERS {
        if let Some(value) = headers.get(name) {
            filtered.insert(HeaderName::from_static(name), value.clone());
        }
    }
    filtered
}

fn session_cookie(name: String, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.make_permanent();
    cookie.set_http_only(true);
    cookie
}

// Splits on char boundaries so multi-byte values never produce invalid chunks.
fn split_chunks(value: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in value.chars() {
        if current.len() + ch.len_utf8() > max {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
