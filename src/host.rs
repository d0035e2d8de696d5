//! Contracts the resource layer consumes from its host framework.
//!
//! The [`crate::api::Api`] never routes requests itself. It hands finished
//! views to a [`RouteSink`]: an application ([`Host`]), a not yet bound
//! sub-application ([`MountPoint`]), or the [`SetupState`] a mount point
//! receives while being bound. [`crate::app`] ships a reference host
//! implementing all three.

use crate::app::SetupState;
use crate::error::ApiError;
use crate::resource::View;
use crate::server::{Request, Response};
use http::Method;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Prefix-to-path function of a deferred rule.
pub type DeferredPath = Arc<dyn Fn(Option<&str>) -> String + Send + Sync>;

/// Callback a mount point runs when it is bound to a host.
pub type DeferredSetup = Arc<dyn Fn(&Arc<SetupState>) -> Result<(), ApiError> + Send + Sync>;

/// Hook offered every error raised while a host serves a request.
///
/// Returning `Some` claims the error; `None` lets the next hook (or the
/// host's generic rendering) have it.
pub type ErrorHandler = Arc<dyn Fn(&Request, &ApiError) -> Option<Response> + Send + Sync>;

/// A URL rule: either final, or a function of the mount prefix known later.
#[derive(Clone)]
pub enum RoutePath {
    Resolved(String),
    Deferred(DeferredPath),
}

impl RoutePath {
    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn(Option<&str>) -> String + Send + Sync + 'static,
    {
        RoutePath::Deferred(Arc::new(f))
    }

    /// Final path for `prefix`. Resolved rules ignore the prefix.
    #[must_use]
    pub fn resolve(&self, prefix: Option<&str>) -> String {
        match self {
            RoutePath::Resolved(path) => path.clone(),
            RoutePath::Deferred(f) => f(prefix),
        }
    }

    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, RoutePath::Deferred(_))
    }
}

impl From<&str> for RoutePath {
    fn from(path: &str) -> Self {
        RoutePath::Resolved(path.to_string())
    }
}

impl From<String> for RoutePath {
    fn from(path: String) -> Self {
        RoutePath::Resolved(path)
    }
}

impl fmt::Debug for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutePath::Resolved(path) => f.debug_tuple("Resolved").field(path).finish(),
            RoutePath::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Extra rule options forwarded untouched to the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOptions {
    /// Methods the rule accepts; the view's own methods when `None`
    pub methods: Option<Vec<Method>>,
    pub subdomain: Option<String>,
    /// Values injected for parameters the rule does not capture
    pub defaults: BTreeMap<String, String>,
}

impl RouteOptions {
    #[must_use]
    pub fn methods(mut self, methods: Vec<Method>) -> Self {
        self.methods = Some(methods);
        self
    }

    #[must_use]
    pub fn subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    #[must_use]
    pub fn default_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }
}

/// Anything that accepts URL rules.
pub trait RouteSink: Send + Sync {
    /// Register `view` under `rule` as `endpoint`.
    fn add_url_rule(
        &self,
        rule: RoutePath,
        endpoint: &str,
        view: View,
        options: RouteOptions,
    ) -> Result<(), ApiError>;

    /// View currently bound to `endpoint`, when the sink keeps an endpoint table.
    fn view(&self, endpoint: &str) -> Option<View>;
}

/// An application that routes requests.
pub trait Host: RouteSink {
    fn name(&self) -> &str;

    /// Build the URL of `endpoint` from `values`.
    fn url_for(&self, endpoint: &str, values: &[(String, String)]) -> Result<String, ApiError>;

    fn register_error_handler(&self, handler: ErrorHandler);
}

/// A sub-application whose URL prefix is only known once it is bound.
pub trait MountPoint: RouteSink {
    fn name(&self) -> &str;

    /// Run `callback` when the mount point is bound to a host.
    fn record(&self, callback: DeferredSetup);
}
