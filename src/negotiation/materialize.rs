//! Turning handler return values into responses.
//!
//! A handler returns a [`Reply`]. Unless it already is a finished
//! [`Response`], the reply is unpacked into `(payload, status, headers)` and
//! handed to the transformer negotiated from the request's `Accept` header.

use super::accept::AcceptList;
use super::registry::{normalize, MediaTypeRegistry};
use crate::error::ApiError;
use crate::server::{HeaderVec, Response};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

/// Media type rendered without a registered transformer.
pub const TEXT_PLAIN: &str = "text/plain";

/// What a resource handler hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A payload still to be represented, with optional status and headers.
    Data {
        payload: Value,
        status: Option<u16>,
        headers: HeaderVec,
    },
    /// A loosely shaped `[payload, status?, headers?]` value, checked by [`unpack`].
    Parts(Vec<Value>),
    /// A finished response; negotiation is skipped.
    Response(Response),
}

impl Reply {
    /// Payload answered with the default status.
    pub fn data(payload: impl Into<Value>) -> Self {
        Reply::Data {
            payload: payload.into(),
            status: None,
            headers: HeaderVec::new(),
        }
    }

    /// Payload with an explicit status.
    pub fn with_status(payload: impl Into<Value>, status: u16) -> Self {
        Reply::Data {
            payload: payload.into(),
            status: Some(status),
            headers: HeaderVec::new(),
        }
    }

    /// Add a header to a `Data` reply (builder style). Other shapes are returned unchanged.
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        if let Reply::Data { headers, .. } = &mut self {
            headers.push((Arc::from(name), value.into()));
        }
        self
    }

    #[must_use]
    pub fn is_response(&self) -> bool {
        matches!(self, Reply::Response(_))
    }
}

impl From<Value> for Reply {
    fn from(payload: Value) -> Self {
        Reply::data(payload)
    }
}

impl From<(Value, u16)> for Reply {
    fn from((payload, status): (Value, u16)) -> Self {
        Reply::with_status(payload, status)
    }
}

impl From<(Value, u16, HeaderVec)> for Reply {
    fn from((payload, status, headers): (Value, u16, HeaderVec)) -> Self {
        Reply::Data {
            payload,
            status: Some(status),
            headers,
        }
    }
}

impl From<Response> for Reply {
    fn from(resp: Response) -> Self {
        Reply::Response(resp)
    }
}

/// Normalize a non-response reply into `(payload, status, headers)`.
///
/// The status defaults to 200 and the headers to empty. A finished response,
/// more than three parts, a status outside `100..=999` or non-string header
/// values are contract violations.
pub fn unpack(reply: Reply) -> Result<(Value, u16, HeaderVec), ApiError> {
    match reply {
        Reply::Data {
            payload,
            status,
            headers,
        } => {
            let status = checked_status(status.map_or(200, u64::from))?;
            Ok((payload, status, headers))
        }
        Reply::Parts(parts) => unpack_parts(parts),
        Reply::Response(_) => Err(ApiError::contract(
            "a finished response cannot be unpacked",
        )),
    }
}

fn unpack_parts(parts: Vec<Value>) -> Result<(Value, u16, HeaderVec), ApiError> {
    if parts.len() > 3 {
        return Err(ApiError::contract(format!(
            "too many values to unpack: expected at most 3, got {}",
            parts.len()
        )));
    }
    let mut parts = parts.into_iter();
    let payload = parts
        .next()
        .ok_or_else(|| ApiError::contract("empty reply: a payload is required"))?;
    let status = match parts.next() {
        None => 200,
        Some(Value::Number(n)) => {
            let raw = n
                .as_u64()
                .ok_or_else(|| ApiError::contract(format!("status must be an integer, got {n}")))?;
            checked_status(raw)?
        }
        Some(other) => {
            return Err(ApiError::contract(format!(
                "status must be an integer, got {other}"
            )))
        }
    };
    let headers = match parts.next() {
        None | Some(Value::Null) => HeaderVec::new(),
        Some(Value::Object(map)) => map
            .into_iter()
            .map(|(name, value)| match value {
                Value::String(v) => Ok((Arc::from(name.as_str()), v)),
                other => Err(ApiError::contract(format!(
                    "header '{name}' must be a string, got {other}"
                ))),
            })
            .collect::<Result<HeaderVec, _>>()?,
        Some(other) => {
            return Err(ApiError::contract(format!(
                "headers must be an object, got {other}"
            )))
        }
    };
    Ok((payload, status, headers))
}

fn checked_status(raw: u64) -> Result<u16, ApiError> {
    u16::try_from(raw)
        .ok()
        .filter(|s| http::StatusCode::from_u16(*s).is_ok())
        .ok_or_else(|| ApiError::contract(format!("invalid status code {raw}")))
}

/// API-level materialization.
///
/// Finished responses pass through untouched. Otherwise the best registered
/// type for `accept` (or `fallback`) is rendered by its transformer and the
/// `Content-Type` is stamped to it. An unregistered `text/plain` fallback is
/// rendered from the payload's string form.
pub fn materialize(
    reply: Reply,
    registry: &MediaTypeRegistry,
    accept: &AcceptList,
    fallback: Option<&str>,
) -> Result<Response, ApiError> {
    if let Reply::Response(resp) = reply {
        return Ok(resp);
    }
    let (payload, status, headers) = unpack(reply)?;
    represent(payload, status, headers, registry, accept, fallback)
}

/// Negotiate and render an already unpacked payload.
pub fn represent(
    payload: Value,
    status: u16,
    headers: HeaderVec,
    registry: &MediaTypeRegistry,
    accept: &AcceptList,
    fallback: Option<&str>,
) -> Result<Response, ApiError> {
    let Some(media_type) = registry.best_match(accept, fallback) else {
        debug!(accept = ?accept.media_types(), "No acceptable media type");
        return Err(ApiError::NotAcceptable);
    };

    if let Some((media_type, transformer)) = registry.entry(media_type) {
        debug!(media_type = %media_type, status = status, "Representation selected");
        let mut resp = transformer(payload, status, headers)?;
        resp.set_header("Content-Type", media_type.to_string());
        return Ok(resp);
    }

    if normalize(media_type) == TEXT_PLAIN {
        let body = match payload {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let mut resp = Response::new(status).with_body(body.into_bytes());
        resp.extend_headers(&headers);
        resp.set_header("Content-Type", TEXT_PLAIN.to_string());
        return Ok(resp);
    }

    error!(
        media_type = %media_type,
        registered = ?registry.media_types().collect::<Vec<_>>(),
        "Negotiated media type has no transformer"
    );
    Err(ApiError::internal(format!(
        "no transformer registered for negotiated media type {media_type}"
    )))
}

/// Resource-level materialization.
///
/// Only requests whose best match lies inside the resource's own table are
/// rendered here; anything else is returned unchanged for the API layer.
pub fn materialize_resource(
    reply: Reply,
    representations: Option<&MediaTypeRegistry>,
    accept: &AcceptList,
) -> Result<Reply, ApiError> {
    let Some(registry) = representations else {
        return Ok(reply);
    };
    if reply.is_response() {
        return Ok(reply);
    }
    let Some(media_type) = registry.best_match(accept, None) else {
        return Ok(reply);
    };
    let Some((media_type, transformer)) = registry.entry(media_type) else {
        return Ok(reply);
    };
    let (payload, status, headers) = unpack(reply)?;
    debug!(media_type = %media_type, status = status, "Resource representation selected");
    let mut resp = transformer(payload, status, headers)?;
    resp.set_header("Content-Type", media_type.to_string());
    Ok(Reply::Response(resp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiation::JsonSettings;
    use serde_json::json;

    fn json_registry() -> MediaTypeRegistry {
        MediaTypeRegistry::with_json(JsonSettings::default())
    }

    #[test]
    fn test_unpack_defaults() {
        let (payload, status, headers) = unpack(Reply::data(json!({"a": 1}))).unwrap();
        assert_eq!(payload, json!({"a": 1}));
        assert_eq!(status, 200);
        assert!(headers.is_empty());
    }

    #[test]
    fn test_unpack_triple() {
        let reply = Reply::with_status(json!("x"), 201).header("X", "1");
        let (payload, status, headers) = unpack(reply).unwrap();
        assert_eq!(payload, json!("x"));
        assert_eq!(status, 201);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].0.as_ref(), "X");
        assert_eq!(headers[0].1, "1");
    }

    #[test]
    fn test_unpack_parts_shapes() {
        let (_, status, headers) =
            unpack(Reply::Parts(vec![json!(1), json!(202), json!({"X": "1"})])).unwrap();
        assert_eq!(status, 202);
        assert_eq!(headers.len(), 1);

        let too_many = Reply::Parts(vec![json!(1), json!(200), json!({}), json!(0)]);
        assert!(matches!(unpack(too_many), Err(ApiError::ContractViolation { .. })));

        let bad_status = Reply::Parts(vec![json!(1), json!("200")]);
        assert!(matches!(unpack(bad_status), Err(ApiError::ContractViolation { .. })));

        let bad_header = Reply::Parts(vec![json!(1), json!(200), json!({"X": 1})]);
        assert!(matches!(unpack(bad_header), Err(ApiError::ContractViolation { .. })));
    }

    #[test]
    fn test_unpack_rejects_out_of_range_status() {
        assert!(unpack(Reply::with_status(json!(null), 42)).is_err());
        assert!(unpack(Reply::Parts(vec![json!(null), json!(70000)])).is_err());
    }

    #[test]
    fn test_materialize_passes_responses_through() {
        let resp = Response::text(418, "teapot");
        let out = materialize(resp.clone().into(), &json_registry(), &AcceptList::parse("image/png"), None).unwrap();
        assert_eq!(out, resp);
    }

    #[test]
    fn test_materialize_stamps_content_type() {
        let mut registry = json_registry();
        registry.register("application/vnd.api+json", |payload, status, headers| {
            let mut resp = output_json_for_test(&payload, status, &headers);
            resp.set_header("Content-Type", "application/json".to_string());
            Ok(resp)
        });
        let accept = AcceptList::parse("application/vnd.api+json");
        let resp = materialize(Reply::data(json!({})), &registry, &accept, None).unwrap();
        assert_eq!(resp.get_header("content-type"), Some("application/vnd.api+json"));
    }

    fn output_json_for_test(payload: &Value, status: u16, headers: &HeaderVec) -> Response {
        crate::negotiation::output_json(payload, status, headers, JsonSettings::default()).unwrap()
    }

    #[test]
    fn test_materialize_not_acceptable_without_fallback() {
        let accept = AcceptList::parse("application/xml");
        let err = materialize(Reply::data(json!({})), &json_registry(), &accept, None).unwrap_err();
        assert_eq!(err, ApiError::NotAcceptable);
    }

    #[test]
    fn test_materialize_text_plain_fallback() {
        let accept = AcceptList::parse("application/xml");
        let reply = Reply::with_status(json!("hello"), 202).header("X-A", "b");
        let resp = materialize(reply, &json_registry(), &accept, Some(TEXT_PLAIN)).unwrap();
        assert_eq!(resp.status, 202);
        assert_eq!(resp.body_text(), "hello");
        assert_eq!(resp.get_header("content-type"), Some(TEXT_PLAIN));
        assert_eq!(resp.get_header("x-a"), Some("b"));
    }

    #[test]
    fn test_materialize_unhandled_fallback_is_internal_error() {
        let accept = AcceptList::parse("application/xml");
        let err = materialize(Reply::data(json!({})), &json_registry(), &accept, Some("application/xml"))
            .unwrap_err();
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_materialize_fallback_is_case_insensitive() {
        let accept = AcceptList::parse("application/xml");
        let registry = json_registry();
        let fallback = Some("Application/JSON");
        let resp = materialize(Reply::data(json!([1])), &registry, &accept, fallback).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.get_header("content-type"), Some("application/json"));

        let resp =
            materialize(Reply::data(json!("hi")), &registry, &accept, Some("Text/Plain")).unwrap();
        assert_eq!(resp.body_text(), "hi");
    }

    #[test]
    fn test_materialize_keeps_repeated_headers() {
        let reply = Reply::data(json!({}))
            .header("Set-Cookie", "a=1")
            .header("Set-Cookie", "b=2");
        let accept = AcceptList::parse("application/json");
        let resp = materialize(reply, &json_registry(), &accept, None).unwrap();
        let cookies: Vec<_> = resp.get_headers("set-cookie").collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
        assert_eq!(resp.get_headers("content-type").count(), 1);
    }

    #[test]
    fn test_resource_level_only_handles_its_own_types() {
        let mut own = MediaTypeRegistry::new();
        own.register("text/csv", |payload, status, _| Ok(Response::text(status, payload.to_string())));

        let csv = materialize_resource(Reply::data(json!(1)), Some(&own), &AcceptList::parse("text/csv")).unwrap();
        assert!(csv.is_response());

        let json_req = AcceptList::parse("application/json");
        let untouched = materialize_resource(Reply::data(json!(1)), Some(&own), &json_req).unwrap();
        assert_eq!(untouched, Reply::data(json!(1)));

        let none = materialize_resource(Reply::data(json!(1)), None, &AcceptList::parse("text/csv")).unwrap();
        assert!(!none.is_response());
    }
}
