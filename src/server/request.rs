use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::negotiation::AcceptList;
use http::Method;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum number of path/query parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Maximum inline headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated parameter storage.
///
/// Param names use `Arc<str>` because they come from the static rule table
/// and are cloned into every matching request.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Stack-allocated header storage, shared by requests and responses.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// An inbound request as seen by resources.
///
/// The host fills `endpoint` and `path_params` once a rule matched; everything
/// else comes from the client.
#[derive(Debug, Clone)]
pub struct Request {
    /// Correlation id (taken from `X-Request-Id` when valid)
    pub request_id: RequestId,
    /// HTTP method
    pub method: Method,
    /// Request path without the query string
    pub path: String,
    /// Endpoint of the matched rule, if any
    pub endpoint: Option<String>,
    /// Parameters extracted from the matched rule
    pub path_params: ParamVec,
    /// Decoded query string parameters
    pub query_params: ParamVec,
    /// Request headers
    pub headers: HeaderVec,
    /// Request body parsed as JSON
    pub body: Option<Value>,
}

impl Request {
    /// Build a request for `target`, which may carry a query string.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        let query_params = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
            .collect();
        Self {
            request_id: RequestId::new(),
            method,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            endpoint: None,
            path_params: ParamVec::new(),
            query_params,
            headers: HeaderVec::new(),
            body: None,
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target)
    }

    /// Add a header (builder style). `X-Request-Id` also updates [`Request::request_id`].
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if name.eq_ignore_ascii_case(REQUEST_ID_HEADER) {
            self.request_id = RequestId::from_header_or_new(Some(value));
        }
        self.headers.push((Arc::from(name), value.to_string()));
        self
    }

    /// Set the `Accept` header.
    #[must_use]
    pub fn accept(self, value: &str) -> Self {
        self.with_header("Accept", value)
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a path parameter by name ("last write wins" on duplicates)
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name ("last write wins" on duplicates)
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Path parameters as a map. Allocates.
    #[must_use]
    pub fn path_params_map(&self) -> HashMap<String, String> {
        self.path_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Parsed `Accept` header. A missing header yields an empty list.
    #[must_use]
    pub fn accept_list(&self) -> AcceptList {
        self.get_header("accept")
            .map(AcceptList::parse)
            .unwrap_or_default()
    }
}
