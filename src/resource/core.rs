use crate::error::ApiError;
use crate::negotiation::{MediaTypeRegistry, Reply};
use crate::server::{HeaderVec, Request, Response};
use http::Method;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Result of every handler, decorator and view.
pub type HandlerResult = Result<Reply, ApiError>;

/// A verb handler already bound to its per-request resource instance.
pub type BoundHandler = Arc<dyn for<'a> Fn(&Call<'a>) -> HandlerResult + Send + Sync>;

/// Wraps a bound verb handler (the per-resource `method_decorators`).
pub type MethodDecorator = Arc<dyn Fn(BoundHandler) -> BoundHandler + Send + Sync>;

/// A routable view function as handed to the host.
pub type ViewFn = Arc<dyn Fn(&Request) -> HandlerResult + Send + Sync>;

/// Wraps a whole view (the API-wide `decorators`).
pub type ViewDecorator = Arc<dyn Fn(ViewFn) -> ViewFn + Send + Sync>;

/// Share a closure as a [`BoundHandler`].
pub fn bound_handler<F>(f: F) -> BoundHandler
where
    F: for<'a> Fn(&Call<'a>) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Share a closure as a [`MethodDecorator`].
pub fn method_decorator<F>(f: F) -> MethodDecorator
where
    F: Fn(BoundHandler) -> BoundHandler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Share a closure as a [`ViewFn`].
pub fn view_fn<F>(f: F) -> ViewFn
where
    F: Fn(&Request) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Share a closure as a [`ViewDecorator`].
pub fn view_decorator<F>(f: F) -> ViewDecorator
where
    F: Fn(ViewFn) -> ViewFn + Send + Sync + 'static,
{
    Arc::new(f)
}

type TypedHandler<R> = Arc<dyn for<'a> Fn(&R, &Call<'a>) -> HandlerResult + Send + Sync>;
type Factory<R> = Arc<dyn Fn(&ResourceArgs) -> Result<R, ApiError> + Send + Sync>;

/// Identity of a resource type.
///
/// Two registrations refer to the same resource when their Rust types match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId {
    type_id: TypeId,
    type_name: &'static str,
}

impl ResourceId {
    #[must_use]
    pub fn of<R: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<R>(),
            type_name: std::any::type_name::<R>(),
        }
    }

    /// Short type name, without module path or generics.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let base = self.type_name.split('<').next().unwrap_or(self.type_name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Constructor arguments forwarded to a resource factory on every request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceArgs {
    pub positional: Vec<Value>,
    pub named: Map<String, Value>,
}

impl ResourceArgs {
    #[must_use]
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            named: Map::new(),
        }
    }

    /// Add a keyword argument (builder style).
    #[must_use]
    pub fn named(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.named.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    #[must_use]
    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.named.get(key)
    }
}

/// Everything a verb handler sees about the call it serves.
#[derive(Debug)]
pub struct Call<'a> {
    pub request: &'a Request,
    pub endpoint: &'a str,
    mediatypes: Vec<String>,
}

impl<'a> Call<'a> {
    pub(crate) fn new(request: &'a Request, endpoint: &'a str, mediatypes: Vec<String>) -> Self {
        Self {
            request,
            endpoint,
            mediatypes,
        }
    }

    /// Requested media types by descending quality, followed by the API default.
    #[must_use]
    pub fn mediatypes(&self) -> &[String] {
        &self.mediatypes
    }

    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&'a str> {
        self.request.get_path_param(name)
    }

    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&'a str> {
        self.request.get_query_param(name)
    }
}

/// Which decorators wrap which verb handler.
#[derive(Clone)]
pub enum DecoratorSpec {
    /// The same list for every verb.
    Uniform(Vec<MethodDecorator>),
    /// A list per verb; verbs without an entry are left undecorated.
    PerVerb(HashMap<Method, Vec<MethodDecorator>>),
}

impl Default for DecoratorSpec {
    fn default() -> Self {
        DecoratorSpec::Uniform(Vec::new())
    }
}

impl DecoratorSpec {
    /// Decorators for requests made with `method`.
    #[must_use]
    pub fn for_method(&self, method: &Method) -> &[MethodDecorator] {
        match self {
            DecoratorSpec::Uniform(list) => list,
            DecoratorSpec::PerVerb(map) => map.get(method).map_or(&[], Vec::as_slice),
        }
    }

    /// Re-wrap `handler` once per decorator, in list order.
    #[must_use]
    pub fn apply(&self, method: &Method, mut handler: BoundHandler) -> BoundHandler {
        for decorator in self.for_method(method) {
            handler = decorator(handler);
        }
        handler
    }
}

impl fmt::Debug for DecoratorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoratorSpec::Uniform(list) => write!(f, "Uniform({} decorators)", list.len()),
            DecoratorSpec::PerVerb(map) => {
                let verbs: Vec<_> = map.keys().map(Method::as_str).collect();
                write!(f, "PerVerb({verbs:?})")
            }
        }
    }
}

/// Type-erased access to a resource's verb table.
trait VerbTable: Send + Sync {
    fn methods(&self) -> Vec<Method>;
    fn supports(&self, method: &Method) -> bool;
    fn bind(&self, args: &ResourceArgs, method: &Method) -> Result<BoundHandler, ApiError>;
}

struct TypedVerbTable<R> {
    factory: Factory<R>,
    handlers: IndexMap<Method, TypedHandler<R>>,
}

impl<R: Send + Sync + 'static> VerbTable for TypedVerbTable<R> {
    fn methods(&self) -> Vec<Method> {
        self.handlers.keys().cloned().collect()
    }

    fn supports(&self, method: &Method) -> bool {
        self.handlers.contains_key(method)
    }

    fn bind(&self, args: &ResourceArgs, method: &Method) -> Result<BoundHandler, ApiError> {
        let handler = self
            .handlers
            .get(method)
            .map(Arc::clone)
            .ok_or_else(|| ApiError::MethodNotAllowed {
                method: method.clone(),
                allowed: self.methods(),
            })?;
        let instance = Arc::new((self.factory)(args)?);
        Ok(bound_handler(move |call| handler(&*instance, call)))
    }
}

/// A declared REST resource: a verb table plus per-resource options.
///
/// Cheap to clone; registrations share the same definition.
#[derive(Clone)]
pub struct ResourceDef {
    id: ResourceId,
    name: String,
    verbs: Arc<dyn VerbTable>,
    representations: Option<MediaTypeRegistry>,
    method_decorators: DecoratorSpec,
}

impl ResourceDef {
    /// Start declaring resource `R`, built per request by `factory`.
    pub fn builder<R, F>(factory: F) -> ResourceBuilder<R>
    where
        R: Send + Sync + 'static,
        F: Fn(&ResourceArgs) -> Result<R, ApiError> + Send + Sync + 'static,
    {
        ResourceBuilder {
            factory: Arc::new(factory),
            handlers: IndexMap::new(),
            name: None,
            representations: None,
            method_decorators: DecoratorSpec::default(),
        }
    }

    /// Start declaring a resource without constructor arguments.
    pub fn of<R>() -> ResourceBuilder<R>
    where
        R: Default + Send + Sync + 'static,
    {
        Self::builder(|_| Ok(R::default()))
    }

    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Display name; defaults to the short type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Endpoint used when a registration does not name one.
    #[must_use]
    pub fn default_endpoint(&self) -> String {
        self.name.to_lowercase()
    }

    /// Implemented verbs, with `HEAD` implied by `GET`.
    #[must_use]
    pub fn methods(&self) -> Vec<Method> {
        let mut methods = self.verbs.methods();
        if methods.contains(&Method::GET) && !methods.contains(&Method::HEAD) {
            methods.push(Method::HEAD);
        }
        methods
    }

    #[must_use]
    pub fn representations(&self) -> Option<&MediaTypeRegistry> {
        self.representations.as_ref()
    }

    #[must_use]
    pub fn method_decorators(&self) -> &DecoratorSpec {
        &self.method_decorators
    }

    /// Handler verb serving `method`; `HEAD` falls back to `GET`.
    #[must_use]
    pub fn resolve_verb(&self, method: &Method) -> Option<Method> {
        if self.verbs.supports(method) {
            Some(method.clone())
        } else if *method == Method::HEAD && self.verbs.supports(&Method::GET) {
            Some(Method::GET)
        } else {
            None
        }
    }

    /// Construct an instance and bind the handler for `verb` to it.
    pub fn bind(&self, args: &ResourceArgs, verb: &Method) -> Result<BoundHandler, ApiError> {
        self.verbs.bind(args, verb)
    }
}

impl fmt::Debug for ResourceDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDef")
            .field("name", &self.name)
            .field("methods", &self.verbs.methods())
            .field("representations", &self.representations)
            .field("method_decorators", &self.method_decorators)
            .finish()
    }
}

/// Fluent declaration of a [`ResourceDef`].
///
/// ```rust
/// use brrtrest::resource::ResourceDef;
/// use serde_json::json;
///
/// #[derive(Default)]
/// struct HelloWorld;
///
/// let hello = ResourceDef::of::<HelloWorld>()
///     .get(|_, _| Ok(json!({"hello": "world"}).into()))
///     .build();
/// assert_eq!(hello.default_endpoint(), "helloworld");
/// ```
pub struct ResourceBuilder<R> {
    factory: Factory<R>,
    handlers: IndexMap<Method, TypedHandler<R>>,
    name: Option<String>,
    representations: Option<MediaTypeRegistry>,
    method_decorators: DecoratorSpec,
}

impl<R: Send + Sync + 'static> ResourceBuilder<R> {
    /// Handle `method` with `handler`.
    #[must_use]
    pub fn handler<F>(mut self, method: Method, handler: F) -> Self
    where
        F: for<'a> Fn(&R, &Call<'a>) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers.insert(method, Arc::new(handler));
        self
    }

    #[must_use]
    pub fn get<F>(self, handler: F) -> Self
    where
        F: for<'a> Fn(&R, &Call<'a>) -> HandlerResult + Send + Sync + 'static,
    {
        self.handler(Method::GET, handler)
    }

    #[must_use]
    pub fn post<F>(self, handler: F) -> Self
    where
        F: for<'a> Fn(&R, &Call<'a>) -> HandlerResult + Send + Sync + 'static,
    {
        self.handler(Method::POST, handler)
    }

    #[must_use]
    pub fn put<F>(self, handler: F) -> Self
    where
        F: for<'a> Fn(&R, &Call<'a>) -> HandlerResult + Send + Sync + 'static,
    {
        self.handler(Method::PUT, handler)
    }

    #[must_use]
    pub fn patch<F>(self, handler: F) -> Self
    where
        F: for<'a> Fn(&R, &Call<'a>) -> HandlerResult + Send + Sync + 'static,
    {
        self.handler(Method::PATCH, handler)
    }

    #[must_use]
    pub fn delete<F>(self, handler: F) -> Self
    where
        F: for<'a> Fn(&R, &Call<'a>) -> HandlerResult + Send + Sync + 'static,
    {
        self.handler(Method::DELETE, handler)
    }

    #[must_use]
    pub fn head<F>(self, handler: F) -> Self
    where
        F: for<'a> Fn(&R, &Call<'a>) -> HandlerResult + Send + Sync + 'static,
    {
        self.handler(Method::HEAD, handler)
    }

    #[must_use]
    pub fn options<F>(self, handler: F) -> Self
    where
        F: for<'a> Fn(&R, &Call<'a>) -> HandlerResult + Send + Sync + 'static,
    {
        self.handler(Method::OPTIONS, handler)
    }

    /// Override the display name (and so the default endpoint).
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Resource-specific representation, consulted before the API's table.
    #[must_use]
    pub fn representation<F>(mut self, media_type: &str, transformer: F) -> Self
    where
        F: Fn(Value, u16, HeaderVec) -> Result<Response, ApiError> + Send + Sync + 'static,
    {
        self.representations
            .get_or_insert_with(MediaTypeRegistry::new)
            .register(media_type, transformer);
        self
    }

    #[must_use]
    pub fn method_decorators(mut self, spec: DecoratorSpec) -> Self {
        self.method_decorators = spec;
        self
    }

    #[must_use]
    pub fn build(self) -> ResourceDef {
        let id = ResourceId::of::<R>();
        ResourceDef {
            id,
            name: self.name.unwrap_or_else(|| id.short_name().to_string()),
            verbs: Arc::new(TypedVerbTable {
                factory: self.factory,
                handlers: self.handlers,
            }),
            representations: self.representations,
            method_decorators: self.method_decorators,
        }
    }
}

/// A named view function with the metadata the host routes on.
#[derive(Clone)]
pub struct View {
    name: String,
    resource: Option<ResourceId>,
    methods: Vec<Method>,
    func: ViewFn,
}

impl View {
    /// Plain view answering `methods`.
    pub fn new<F>(name: impl Into<String>, methods: Vec<Method>, func: F) -> Self
    where
        F: Fn(&Request) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            resource: None,
            methods,
            func: Arc::new(func),
        }
    }

    pub(crate) fn from_parts(
        name: String,
        resource: Option<ResourceId>,
        methods: Vec<Method>,
        func: ViewFn,
    ) -> Self {
        Self {
            name,
            resource,
            methods,
            func,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resource the view was built from, if any.
    #[must_use]
    pub fn resource(&self) -> Option<ResourceId> {
        self.resource
    }

    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn call(&self, request: &Request) -> HandlerResult {
        (self.func)(request)
    }

    /// Whether both views run the same function.
    #[must_use]
    pub fn same_function(&self, other: &View) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }

    /// Wrap the view function, keeping name and metadata.
    #[must_use]
    pub fn map_fn<F>(self, wrap: F) -> Self
    where
        F: FnOnce(ViewFn) -> ViewFn,
    {
        Self {
            func: wrap(self.func),
            ..self
        }
    }

    /// Label used in conflict reports: the resource name, else the view name.
    #[must_use]
    pub fn owner(&self) -> String {
        self.resource
            .map_or_else(|| self.name.clone(), |id| id.short_name().to_string())
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("name", &self.name)
            .field("resource", &self.resource)
            .field("methods", &self.methods)
            .finish()
    }
}
