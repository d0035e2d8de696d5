use super::request::HeaderVec;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;

/// Reason phrase for a status code, `"Unknown"` when the code has none.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// A finished HTTP response.
///
/// Once a handler (or a transformer) produced one of these, no further
/// negotiation happens: it is handed to the client verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers (stack-allocated for ≤16 headers)
    pub headers: HeaderVec,
    /// Encoded body
    pub body: Vec<u8>,
}

impl Response {
    /// Empty response with the given status.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    /// Plain text response.
    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        let mut resp = Self::new(status).with_body(body.into().into_bytes());
        resp.set_header("Content-Type", "text/plain".to_string());
        resp
    }

    /// Compact JSON response.
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        let mut resp = Self::new(status).with_body(body.to_string().into_bytes());
        resp.set_header("Content-Type", "application/json".to_string());
        resp
    }

    /// Replace the body (builder style).
    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Get a header by name
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Append every header in `headers`; repeated names are all kept.
    pub fn extend_headers(&mut self, headers: &HeaderVec) {
        self.headers.extend(
            headers
                .iter()
                .map(|(name, value)| (Arc::clone(name), value.clone())),
        );
    }

    /// All values of a header, in insertion order.
    pub fn get_headers<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body decoded as UTF-8 (lossy).
    #[must_use]
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body parsed as JSON, `None` if it is not JSON.
    #[must_use]
    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}
