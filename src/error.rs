//! Error taxonomy shared by registration and request handling.
//!
//! Errors fall in two families:
//!
//! - **Registration-time** (`EndpointConflict`, `AlreadyRegistered`,
//!   `InvalidRule`, `Unbound`): programmer errors surfaced while the
//!   application is being assembled. They are returned from `add_resource`,
//!   `init_app` and `App::register_blueprint` and should abort startup.
//! - **Per-request** (`NotAcceptable`, `MethodNotAllowed`, `NotFound`,
//!   `Abort`, `InternalServerError`, `ContractViolation`): mapped to an HTTP
//!   status via [`ApiError::status`] and rendered into a well-formed response
//!   by the host or by [`crate::api::Api::handle_error`].

use http::Method;
use thiserror::Error;

/// Errors produced by the resource layer and the bundled host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No registered media type satisfies the `Accept` header and no fallback is configured.
    #[error("The resource identified by the request is only capable of generating response entities which have content characteristics not acceptable according to the accept headers sent in the request.")]
    NotAcceptable,

    /// A media type was negotiated but nothing can render it.
    #[error("internal server error: {reason}")]
    InternalServerError {
        /// What went wrong
        reason: String,
    },

    /// An endpoint name is already bound to a different resource type.
    #[error("endpoint '{endpoint}' is already set to the resource {existing}, cannot bind it to {attempted}")]
    EndpointConflict {
        /// The contested endpoint name
        endpoint: String,
        /// Resource currently owning the endpoint
        existing: String,
        /// Resource that tried to take it over
        attempted: String,
    },

    /// A mount point (blueprint) was bound more than once.
    #[error("'{mount}' can only be registered once")]
    AlreadyRegistered {
        /// Name of the mount point
        mount: String,
    },

    /// The resource has no handler for the request method.
    #[error("method {method} is not allowed for this resource")]
    MethodNotAllowed {
        /// Method of the rejected request
        method: Method,
        /// Methods the resource does implement
        allowed: Vec<Method>,
    },

    /// A handler returned something that cannot be turned into a response.
    #[error("handler contract violated: {reason}")]
    ContractViolation {
        /// Description of the malformed value
        reason: String,
    },

    /// No route matched the request path.
    #[error("the requested URL {path} was not found on the server")]
    NotFound {
        /// Path of the unmatched request
        path: String,
    },

    /// A handler aborted the request with an explicit HTTP status.
    #[error("{message}")]
    Abort {
        /// HTTP status to answer with
        status: u16,
        /// Human readable description
        message: String,
    },

    /// Reverse URL construction failed.
    #[error("could not build url for endpoint '{endpoint}': {reason}")]
    UrlBuild {
        /// Endpoint that was looked up
        endpoint: String,
        /// Why building failed
        reason: String,
    },

    /// The API is not attached to an application yet.
    #[error("the api is not bound to an application")]
    Unbound,

    /// A URL rule could not be compiled.
    #[error("invalid url rule '{rule}': {reason}")]
    InvalidRule {
        /// The offending rule
        rule: String,
        /// Compiler message
        reason: String,
    },
}

impl ApiError {
    /// Shorthand for [`ApiError::ContractViolation`].
    pub fn contract(reason: impl Into<String>) -> Self {
        ApiError::ContractViolation {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ApiError::InternalServerError`].
    pub fn internal(reason: impl Into<String>) -> Self {
        ApiError::InternalServerError {
            reason: reason.into(),
        }
    }

    /// Abort the current request with `status`, using the standard reason phrase as message.
    pub fn abort(status: u16) -> Self {
        ApiError::Abort {
            status,
            message: crate::server::status_reason(status).to_string(),
        }
    }

    /// Abort the current request with `status` and a custom message.
    pub fn abort_with(status: u16, message: impl Into<String>) -> Self {
        ApiError::Abort {
            status,
            message: message.into(),
        }
    }

    /// HTTP status this error is rendered with.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            ApiError::NotAcceptable => 406,
            ApiError::MethodNotAllowed { .. } => 405,
            ApiError::NotFound { .. } => 404,
            ApiError::Abort { status, .. } => *status,
            ApiError::InternalServerError { .. }
            | ApiError::EndpointConflict { .. }
            | ApiError::AlreadyRegistered { .. }
            | ApiError::ContractViolation { .. }
            | ApiError::UrlBuild { .. }
            | ApiError::Unbound
            | ApiError::InvalidRule { .. } => 500,
        }
    }

    /// Stable name of the error, used as key into the custom error map.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::NotAcceptable => "NotAcceptable",
            ApiError::InternalServerError { .. } => "InternalServerError",
            ApiError::EndpointConflict { .. } => "EndpointConflict",
            ApiError::AlreadyRegistered { .. } => "AlreadyRegistered",
            ApiError::MethodNotAllowed { .. } => "MethodNotAllowed",
            ApiError::ContractViolation { .. } => "ContractViolation",
            ApiError::NotFound { .. } => "NotFound",
            ApiError::UrlBuild { .. } => "UrlBuild",
            ApiError::Unbound => "Unbound",
            ApiError::InvalidRule { .. } => "InvalidRule",
            ApiError::Abort { status, .. } => abort_kind(*status),
        }
    }

    /// Headers the error response has to carry.
    #[must_use]
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        match self {
            ApiError::MethodNotAllowed { allowed, .. } => {
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                vec![("Allow", allow)]
            }
            _ => Vec::new(),
        }
    }
}

fn abort_kind(status: u16) -> &'static str {
    match status {
        400 => "BadRequest",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "NotFound",
        405 => "MethodNotAllowed",
        406 => "NotAcceptable",
        409 => "Conflict",
        410 => "Gone",
        412 => "PreconditionFailed",
        415 => "UnsupportedMediaType",
        422 => "UnprocessableEntity",
        429 => "TooManyRequests",
        500 => "InternalServerError",
        501 => "NotImplemented",
        503 => "ServiceUnavailable",
        _ => "HTTPException",
    }
}
