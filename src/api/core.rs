use super::registration::Registration;
use crate::config::{ApiConfig, ConfigError, ErrorSpec, UrlPartOrder};
use crate::error::ApiError;
use crate::host::{Host, MountPoint, RoutePath, RouteOptions};
use crate::negotiation::{
    represent, unpack, MediaTypeRegistry, Reply, Transformer, TEXT_PLAIN,
};
use crate::resource::{view_fn, ResourceArgs, ResourceDef, ViewDecorator, ViewFn};
use crate::server::{HeaderVec, Request, Response};
use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// Per-registration options of [`Api::add_resource`].
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Endpoint name; the resource's lower-cased name when `None`
    pub endpoint: Option<String>,
    /// Constructor arguments of the per-request resource instance
    pub args: ResourceArgs,
    /// Passed through to the host's rule registration
    pub route: RouteOptions,
}

impl RegisterOptions {
    #[must_use]
    pub fn endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: ResourceArgs) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_route(mut self, route: RouteOptions) -> Self {
        self.route = route;
        self
    }
}

/// What views and error hooks need from an API at request time.
pub(crate) struct ApiCore {
    config: ApiConfig,
    decorators: Vec<ViewDecorator>,
    representations: ArcSwap<MediaTypeRegistry>,
    endpoints: RwLock<HashSet<String>>,
}

impl ApiCore {
    pub(crate) fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn representations(&self) -> Arc<MediaTypeRegistry> {
        self.representations.load_full()
    }

    pub(crate) fn complete_url(&self, url: &str, registration_prefix: &str) -> String {
        self.config
            .url_part_order
            .assemble(registration_prefix, &self.config.prefix, url)
    }

    pub(crate) fn deferred_url(&self, url: &str) -> RoutePath {
        let order: UrlPartOrder = self.config.url_part_order;
        let prefix = self.config.prefix.clone();
        let url = url.to_string();
        RoutePath::deferred(move |registration_prefix| {
            order.assemble(registration_prefix.unwrap_or(""), &prefix, &url)
        })
    }

    pub(crate) fn track_endpoint(&self, endpoint: &str) {
        self.endpoints.write().insert(endpoint.to_string());
    }

    /// Whether errors of `request` are rendered by this API.
    pub(crate) fn owns(&self, request: &Request, error: &ApiError) -> bool {
        if self.config.catch_all_404s && error.status() == 404 {
            return true;
        }
        request
            .endpoint
            .as_deref()
            .is_some_and(|e| self.endpoints.read().contains(e))
    }

    pub(crate) fn make_response(
        &self,
        request: &Request,
        payload: Value,
        status: u16,
        headers: HeaderVec,
        fallback: Option<&str>,
    ) -> Result<Response, ApiError> {
        let fallback = fallback.or(self.config.default_mediatype.as_deref());
        represent(
            payload,
            status,
            headers,
            &self.representations(),
            &request.accept_list(),
            fallback,
        )
    }

    /// Pipe non-response replies of `view` through API-level negotiation.
    pub(crate) fn output(self: &Arc<Self>, view: ViewFn) -> ViewFn {
        let core = Arc::clone(self);
        view_fn(move |request| {
            let reply = view(request)?;
            if reply.is_response() {
                return Ok(reply);
            }
            let (payload, status, headers) = unpack(reply)?;
            core.make_response(request, payload, status, headers, None)
                .map(Reply::Response)
        })
    }

    /// Wrap `view` with the global decorators, re-wrapping in list order.
    pub(crate) fn decorate(&self, mut view: ViewFn) -> ViewFn {
        for decorator in &self.decorators {
            view = decorator(view);
        }
        view
    }

    pub(crate) fn unauthorized(&self, mut response: Response) -> Response {
        if self.config.serve_challenge_on_401 && response.status == 401 {
            response.set_header(
                "WWW-Authenticate",
                format!("Basic realm=\"{}\"", self.config.realm),
            );
        }
        response
    }

    pub(crate) fn handle_error(&self, request: &Request, err: &ApiError) -> Response {
        let mut status = err.status();
        let mut data = Map::new();
        data.insert("message".to_string(), Value::String(err.to_string()));
        if let Some(custom) = self.config.errors.get(err.kind()) {
            apply_error_spec(custom, &mut status, &mut data);
        }

        if status >= 500 {
            error!(
                error = %err,
                kind = err.kind(),
                status,
                endpoint = ?request.endpoint,
                "Request failed"
            );
        } else {
            debug!(error = %err, kind = err.kind(), status, "Request rejected");
        }

        let mut headers = HeaderVec::new();
        for (name, value) in err.headers() {
            headers.push((Arc::from(name), value));
        }

        let fallback = if status == 406 && self.config.default_mediatype.is_none() {
            let representations = self.representations();
            let first = representations
                .media_types()
                .next()
                .unwrap_or(TEXT_PLAIN)
                .to_string();
            Some(first)
        } else {
            None
        };

        let payload = Value::Object(data);
        let resp = self
            .make_response(request, payload.clone(), status, headers.clone(), fallback.as_deref())
            .unwrap_or_else(|_| {
                let mut resp = Response::text(status, payload.to_string());
                resp.extend_headers(&headers);
                resp
            });

        if status == 401 {
            self.unauthorized(resp)
        } else {
            resp
        }
    }
}

fn apply_error_spec(custom: &ErrorSpec, status: &mut u16, data: &mut Map<String, Value>) {
    if let Some(message) = &custom.message {
        data.insert("message".to_string(), Value::String(message.clone()));
    }
    for (key, value) in &custom.extra {
        data.insert(key.clone(), value.clone());
    }
    if let Some(custom_status) = custom.status {
        *status = custom_status;
    }
}

/// Entry point: registers resources on a host and shapes their responses.
///
/// ```rust
/// use brrtrest::api::Api;
/// use brrtrest::app::App;
/// use brrtrest::resource::ResourceDef;
/// use brrtrest::server::Request;
/// use serde_json::json;
///
/// #[derive(Default)]
/// struct HelloWorld;
///
/// let app = App::new("demo");
/// let api = Api::default();
/// let hello = ResourceDef::of::<HelloWorld>()
///     .get(|_, _| Ok(json!({"hello": "world"}).into()))
///     .build();
/// api.add_resource(&hello, &["/", "/hello"], Default::default()).unwrap();
/// api.init_app(&app).unwrap();
///
/// let resp = app.handle(Request::get("/hello").accept("application/json"));
/// assert_eq!(resp.status, 200);
/// assert_eq!(resp.body_text(), r#"{"hello":"world"}"#);
/// ```
///
/// Clones share registrations and representations.
#[derive(Clone)]
pub struct Api {
    core: Arc<ApiCore>,
    registration: Arc<Mutex<Registration>>,
}

impl Default for Api {
    fn default() -> Self {
        Self::new(ApiConfig::default())
    }
}

impl Api {
    /// API with the default JSON representation and no decorators.
    ///
    /// `config` is taken as is; [`Api::try_new`] validates it first.
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        ApiBuilder::new(config).build()
    }

    /// Like [`Api::new`], rejecting a configuration [`ApiConfig::validate`] refuses.
    pub fn try_new(config: ApiConfig) -> Result<Self, ConfigError> {
        ApiBuilder::new(config).try_build()
    }

    #[must_use]
    pub fn builder() -> ApiBuilder {
        ApiBuilder::new(ApiConfig::default())
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.core.config
    }

    /// Attach to an application; queued resources are registered now.
    ///
    /// An API binds once; a second call fails with [`ApiError::AlreadyRegistered`].
    pub fn init_app<H>(&self, app: &H) -> Result<(), ApiError>
    where
        H: Host + Clone + 'static,
    {
        let host: Arc<dyn Host> = Arc::new(app.clone());
        self.registration.lock().bind_app(&self.core, host)
    }

    /// Attach to a blueprint; registration happens when it is bound to an application.
    pub fn init_blueprint<M>(&self, mount: &M) -> Result<(), ApiError>
    where
        M: MountPoint + Clone + 'static,
    {
        let mount: Arc<dyn MountPoint> = Arc::new(mount.clone());
        Registration::bind_mount(&self.registration, &self.core, mount)
    }

    /// Register `resource` under `urls`.
    ///
    /// Before [`Api::init_app`] the registration is queued. Re-using an
    /// endpoint name for a different resource fails with
    /// [`ApiError::EndpointConflict`]; re-registering the same resource does not.
    pub fn add_resource(
        &self,
        resource: &ResourceDef,
        urls: &[&str],
        options: RegisterOptions,
    ) -> Result<(), ApiError> {
        let urls = urls.iter().map(|u| (*u).to_string()).collect();
        self.registration
            .lock()
            .add(&self.core, resource, urls, options)
    }

    /// Decorator form of [`Api::add_resource`]: registers and hands the resource back.
    pub fn resource<'a>(
        &'a self,
        urls: &'a [&'a str],
        options: RegisterOptions,
    ) -> impl FnOnce(ResourceDef) -> Result<ResourceDef, ApiError> + 'a {
        move |resource| {
            self.add_resource(&resource, urls, options)?;
            Ok(resource)
        }
    }

    /// Register (or replace) the transformer for `media_type`.
    ///
    /// Meant for start-up: requests already in flight keep the table they loaded.
    pub fn representation<F>(&self, media_type: &str, transformer: F)
    where
        F: Fn(Value, u16, HeaderVec) -> Result<Response, ApiError> + Send + Sync + 'static,
    {
        let transformer: Transformer = Arc::new(transformer);
        self.core.representations.rcu(|current| {
            let mut next = MediaTypeRegistry::clone(current);
            next.insert(media_type, Arc::clone(&transformer));
            next
        });
        debug!(media_type = %media_type, "Representation registered");
    }

    /// Registered media types, in precedence order.
    #[must_use]
    pub fn representations(&self) -> Vec<String> {
        self.core
            .representations()
            .media_types()
            .map(str::to_string)
            .collect()
    }

    /// Render `payload` for `request` by negotiation.
    ///
    /// `fallback` replaces the configured default media type.
    pub fn make_response(
        &self,
        request: &Request,
        payload: Value,
        status: u16,
        headers: HeaderVec,
        fallback: Option<&str>,
    ) -> Result<Response, ApiError> {
        self.core
            .make_response(request, payload, status, headers, fallback)
    }

    /// Media types of the request's `Accept` header, best first.
    #[must_use]
    pub fn mediatypes(&self, request: &Request) -> Vec<String> {
        request
            .accept_list()
            .media_types()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// URL of `resource`, built by the host.
    pub fn url_for(
        &self,
        resource: &ResourceDef,
        values: &[(String, String)],
    ) -> Result<String, ApiError> {
        let (endpoint, host) = {
            let reg = self.registration.lock();
            (reg.qualified_endpoint(resource)?, reg.host()?)
        };
        host.url_for(&endpoint, values)
    }

    /// Add the `WWW-Authenticate` challenge to a 401 response when enabled.
    #[must_use]
    pub fn unauthorized(&self, response: Response) -> Response {
        self.core.unauthorized(response)
    }

    /// Render `err` the way the API renders errors of its own endpoints.
    #[must_use]
    pub fn handle_error(&self, request: &Request, err: &ApiError) -> Response {
        self.core.handle_error(request, err)
    }

    /// Qualified endpoints registered so far.
    #[must_use]
    pub fn endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self.core.endpoints.read().iter().cloned().collect();
        endpoints.sort();
        endpoints
    }

    /// Whether the API is attached to an application or blueprint.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.registration.lock().is_bound()
    }
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("config", &self.core.config)
            .field("decorators", &self.core.decorators.len())
            .field("representations", &self.core.representations())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Api`].
///
/// ```rust
/// use brrtrest::api::Api;
///
/// let api = Api::builder()
///     .prefix("/v1")
///     .default_mediatype(None)
///     .catch_all_404s(true)
///     .build();
/// assert_eq!(api.config().prefix, "/v1");
/// ```
pub struct ApiBuilder {
    config: ApiConfig,
    decorators: Vec<ViewDecorator>,
    representations: Vec<(String, Transformer)>,
}

impl ApiBuilder {
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            decorators: Vec::new(),
            representations: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(mut self, config: ApiConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn default_mediatype(mut self, media_type: Option<&str>) -> Self {
        self.config.default_mediatype = media_type.map(str::to_string);
        self
    }

    #[must_use]
    pub fn catch_all_404s(mut self, enabled: bool) -> Self {
        self.config.catch_all_404s = enabled;
        self
    }

    #[must_use]
    pub fn serve_challenge_on_401(mut self, enabled: bool) -> Self {
        self.config.serve_challenge_on_401 = enabled;
        self
    }

    #[must_use]
    pub fn url_part_order(mut self, order: UrlPartOrder) -> Self {
        self.config.url_part_order = order;
        self
    }

    #[must_use]
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.config.realm = realm.into();
        self
    }

    /// Custom rendering for errors of `kind`.
    #[must_use]
    pub fn error(mut self, kind: impl Into<String>, spec: ErrorSpec) -> Self {
        self.config.errors.insert(kind.into(), spec);
        self
    }

    /// Decorator applied to every resource view.
    ///
    /// Each decorator wraps the view built so far, so the last one added is
    /// outermost: with `.decorator(a).decorator(b)` a request runs `b`, then
    /// `a`, then the resource.
    #[must_use]
    pub fn decorator(mut self, decorator: ViewDecorator) -> Self {
        self.decorators.push(decorator);
        self
    }

    /// Representation registered after the default JSON one.
    #[must_use]
    pub fn representation<F>(mut self, media_type: &str, transformer: F) -> Self
    where
        F: Fn(Value, u16, HeaderVec) -> Result<Response, ApiError> + Send + Sync + 'static,
    {
        self.representations
            .push((media_type.to_string(), Arc::new(transformer)));
        self
    }

    /// Build without checking the configuration; see [`ApiBuilder::try_build`].
    #[must_use]
    pub fn build(self) -> Api {
        let mut registry = MediaTypeRegistry::with_json(self.config.json);
        for (media_type, transformer) in self.representations {
            registry.insert(&media_type, transformer);
        }
        Api {
            core: Arc::new(ApiCore {
                config: self.config,
                decorators: self.decorators,
                representations: ArcSwap::from_pointee(registry),
                endpoints: RwLock::new(HashSet::new()),
            }),
            registration: Arc::new(Mutex::new(Registration::new())),
        }
    }

    /// Build after [`ApiConfig::validate`] accepted the configuration.
    pub fn try_build(self) -> Result<Api, ConfigError> {
        self.config.validate()?;
        Ok(self.build())
    }
}
