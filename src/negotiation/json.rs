use crate::error::ApiError;
use crate::server::{HeaderVec, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Encoding knobs for the default JSON representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonSettings {
    /// Indent the output
    pub pretty: bool,
    /// Terminate the body with `\n`
    pub trailing_newline: bool,
}

/// Render `payload` as `application/json`.
pub fn output_json(
    payload: &Value,
    status: u16,
    headers: &HeaderVec,
    settings: JsonSettings,
) -> Result<Response, ApiError> {
    let encoded = if settings.pretty {
        serde_json::to_vec_pretty(payload)
    } else {
        serde_json::to_vec(payload)
    };
    let mut body = encoded.map_err(|e| ApiError::internal(format!("json encoding failed: {e}")))?;
    if settings.trailing_newline {
        body.push(b'\n');
    }
    let mut resp = Response::new(status).with_body(body);
    resp.extend_headers(headers);
    Ok(resp)
}
