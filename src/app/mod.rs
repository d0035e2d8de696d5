//! # App Module
//!
//! A small synchronous reference host: URL rules, an endpoint table, error
//! hooks and reverse URL building. It exists so the resource layer can be
//! exercised end to end without a network server; any framework that
//! implements the [`crate::host`] traits can take its place.
//!
//! ## Request flow
//!
//! 1. The rule table is matched on path, then method (`HEAD` rides on `GET`;
//!    `OPTIONS` is answered automatically with the `Allow` list).
//! 2. The matched endpoint's [`View`] is called with the path parameters and
//!    rule defaults filled in.
//! 3. A [`Reply`] that is not yet a response is finished here: strings as
//!    `text/plain`, any other JSON as `application/json`.
//! 4. Errors are offered to the registered error hooks in order, then
//!    rendered as `{"error": message}`.

mod blueprint;
mod setup;

pub use blueprint::{Blueprint, BlueprintOptions};
pub use setup::{PrefixRuleAdder, RuleAdder, SetupState};

use crate::error::ApiError;
use crate::host::{ErrorHandler, Host, RoutePath, RouteOptions, RouteSink};
use crate::negotiation::{unpack, Reply};
use crate::resource::View;
use crate::router::{RouteLookup, RouteTable, Rule};
use crate::server::{Request, Response};
use http::Method;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn};

struct AppInner {
    name: String,
    routes: RwLock<RouteTable>,
    views: RwLock<HashMap<String, View>>,
    blueprints: Mutex<HashSet<String>>,
    error_handlers: RwLock<Vec<ErrorHandler>>,
}

/// Reference host application. Clones share the same tables.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl App {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(AppInner {
                name: name.into(),
                routes: RwLock::new(RouteTable::new()),
                views: RwLock::new(HashMap::new()),
                blueprints: Mutex::new(HashSet::new()),
                error_handlers: RwLock::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Route `rule` to `view` under `endpoint`.
    ///
    /// Deferred rules resolve with no prefix. Binding an endpoint that already
    /// belongs to a different resource (or, for plain views, a different
    /// function) fails with [`ApiError::EndpointConflict`].
    pub fn add_url_rule(
        &self,
        rule: RoutePath,
        endpoint: &str,
        view: View,
        options: RouteOptions,
    ) -> Result<(), ApiError> {
        let path = rule.resolve(None);
        {
            let views = self.inner.views.read();
            if let Some(existing) = views.get(endpoint) {
                let conflict = match (existing.resource(), view.resource()) {
                    (None, None) => !existing.same_function(&view),
                    (a, b) => a != b,
                };
                if conflict {
                    return Err(ApiError::EndpointConflict {
                        endpoint: endpoint.to_string(),
                        existing: existing.owner(),
                        attempted: view.owner(),
                    });
                }
            }
        }

        let mut methods = options.methods.unwrap_or_else(|| view.methods().to_vec());
        if methods.is_empty() {
            methods.push(Method::GET);
        }
        let compiled = Rule::new(&path, endpoint, methods, options.subdomain, options.defaults)?;

        self.inner.routes.write().add(compiled);
        self.inner.views.write().insert(endpoint.to_string(), view);
        Ok(())
    }

    /// Shorthand for a plain view function.
    pub fn route<F>(
        &self,
        rule: &str,
        endpoint: &str,
        methods: Vec<Method>,
        f: F,
    ) -> Result<(), ApiError>
    where
        F: Fn(&Request) -> Result<Reply, ApiError> + Send + Sync + 'static,
    {
        let view = View::new(endpoint, methods, f);
        self.add_url_rule(RoutePath::from(rule), endpoint, view, RouteOptions::default())
    }

    #[must_use]
    pub fn view(&self, endpoint: &str) -> Option<View> {
        self.inner.views.read().get(endpoint).cloned()
    }

    /// `(rule, endpoint)` pairs in registration order.
    #[must_use]
    pub fn url_map(&self) -> Vec<(String, String)> {
        self.inner
            .routes
            .read()
            .rules()
            .map(|r| (r.pattern.clone(), r.endpoint.clone()))
            .collect()
    }

    /// Build the URL of `endpoint`; values without a placeholder become the query string.
    pub fn url_for(&self, endpoint: &str, values: &[(String, String)]) -> Result<String, ApiError> {
        self.inner.routes.read().build(endpoint, values)
    }

    /// Append an error hook; hooks run in registration order.
    pub fn register_error_handler(&self, handler: ErrorHandler) {
        self.inner.error_handlers.write().push(handler);
    }

    /// Mount `blueprint`, running everything it recorded against this app.
    ///
    /// The registration prefix (and subdomain) override the blueprint's own.
    /// The first error raised by a recorded callback aborts the registration.
    pub fn register_blueprint(
        &self,
        blueprint: &Blueprint,
        options: BlueprintOptions,
    ) -> Result<(), ApiError> {
        let first_registration = self
            .inner
            .blueprints
            .lock()
            .insert(blueprint.name().to_string());
        let url_prefix = options
            .url_prefix
            .or_else(|| blueprint.prefix().map(str::to_string));
        let subdomain = options
            .subdomain
            .or_else(|| blueprint.default_subdomain().map(str::to_string));
        let host: Arc<dyn Host> = Arc::new(self.clone());
        let setup = Arc::new(SetupState::new(
            host,
            blueprint.name().to_string(),
            url_prefix,
            subdomain,
            blueprint.url_defaults().clone(),
            first_registration,
        ));

        let callbacks = blueprint.callbacks();
        for callback in &callbacks {
            callback(&setup)?;
        }
        info!(
            app = %self.inner.name,
            blueprint = %blueprint.name(),
            url_prefix = ?setup.url_prefix(),
            first_registration,
            callbacks = callbacks.len(),
            "Blueprint registered"
        );
        Ok(())
    }

    /// Serve one request.
    pub fn handle(&self, mut request: Request) -> Response {
        let span = info_span!(
            "request",
            request_id = %request.request_id,
            method = %request.method,
            path = %request.path
        );
        let _guard = span.enter();

        let lookup = self.inner.routes.read().route(&request.method, &request.path);
        let result = match lookup {
            RouteLookup::Matched(m) => {
                request.endpoint = Some(m.endpoint.clone());
                request.path_params = m.path_params;
                match self.view(&m.endpoint) {
                    Some(view) => view.call(&request).and_then(finish_reply),
                    None => Err(ApiError::internal(format!(
                        "endpoint '{}' has a rule but no view",
                        m.endpoint
                    ))),
                }
            }
            RouteLookup::MethodMismatch { allowed } if request.method == Method::OPTIONS => {
                let mut resp = Response::new(200);
                resp.set_header("Allow", join_methods(&allowed));
                Ok(resp)
            }
            RouteLookup::MethodMismatch { allowed } => {
                warn!(method = %request.method, path = %request.path, "Method not allowed");
                Err(ApiError::MethodNotAllowed {
                    method: request.method.clone(),
                    allowed,
                })
            }
            RouteLookup::NotFound => {
                warn!(method = %request.method, path = %request.path, "No route matched");
                Err(ApiError::NotFound {
                    path: request.path.clone(),
                })
            }
        };

        let mut resp = match result {
            Ok(resp) => resp,
            Err(err) => self.render_error(&request, &err),
        };
        if request.method == Method::HEAD {
            resp.body.clear();
        }
        debug!(status = resp.status, endpoint = ?request.endpoint, "Request completed");
        resp
    }

    fn render_error(&self, request: &Request, err: &ApiError) -> Response {
        let handlers = self.inner.error_handlers.read().clone();
        for handler in &handlers {
            if let Some(resp) = handler(request, err) {
                return resp;
            }
        }

        let status = err.status();
        if status >= 500 {
            error!(
                error = %err,
                endpoint = ?request.endpoint,
                "Unhandled error while serving request"
            );
        }
        let mut resp = Response::json(status, &json!({ "error": err.to_string() }));
        for (name, value) in err.headers() {
            resp.set_header(name, value);
        }
        resp
    }
}

/// Finish a reply the way the host does when nothing negotiated it.
fn finish_reply(reply: Reply) -> Result<Response, ApiError> {
    if let Reply::Response(resp) = reply {
        return Ok(resp);
    }
    let (payload, status, headers) = unpack(reply)?;
    let (body, content_type) = match payload {
        Value::String(text) => (text, "text/plain"),
        other => (other.to_string(), "application/json"),
    };
    let mut resp = Response::new(status).with_body(body.into_bytes());
    resp.extend_headers(&headers);
    if resp.get_header("Content-Type").is_none() {
        resp.set_header("Content-Type", content_type.to_string());
    }
    Ok(resp)
}

fn join_methods(methods: &[Method]) -> String {
    methods.iter().map(Method::as_str).collect::<Vec<_>>().join(", ")
}

impl RouteSink for App {
    fn add_url_rule(
        &self,
        rule: RoutePath,
        endpoint: &str,
        view: View,
        options: RouteOptions,
    ) -> Result<(), ApiError> {
        App::add_url_rule(self, rule, endpoint, view, options)
    }

    fn view(&self, endpoint: &str) -> Option<View> {
        App::view(self, endpoint)
    }
}

impl Host for App {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn url_for(&self, endpoint: &str, values: &[(String, String)]) -> Result<String, ApiError> {
        App::url_for(self, endpoint, values)
    }

    fn register_error_handler(&self, handler: ErrorHandler) {
        App::register_error_handler(self, handler);
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("name", &self.inner.name)
            .field("rules", &self.inner.routes.read().len())
            .finish_non_exhaustive()
    }
}
