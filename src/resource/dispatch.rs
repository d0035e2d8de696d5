use super::core::{view_fn, Call, HandlerResult, ResourceArgs, ResourceDef, View};
use crate::error::ApiError;
use crate::negotiation::materialize_resource;
use crate::server::Request;
use std::sync::Arc;
use tracing::debug;

/// Per-registration dispatcher: routes a request to the resource's verb handler.
///
/// Holds the definition, the endpoint it was registered under and the
/// constructor arguments for the per-request instance.
#[derive(Debug, Clone)]
pub struct ResourceView {
    def: ResourceDef,
    endpoint: String,
    args: ResourceArgs,
    default_mediatype: Option<String>,
}

impl ResourceView {
    #[must_use]
    pub fn new(
        def: ResourceDef,
        endpoint: impl Into<String>,
        args: ResourceArgs,
        default_mediatype: Option<String>,
    ) -> Self {
        Self {
            def,
            endpoint: endpoint.into(),
            args,
            default_mediatype,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn def(&self) -> &ResourceDef {
        &self.def
    }

    /// Media types a handler should consider, best first, then the API default.
    #[must_use]
    pub fn mediatypes(&self, request: &Request) -> Vec<String> {
        let mut types: Vec<String> = request
            .accept_list()
            .media_types()
            .into_iter()
            .map(str::to_string)
            .collect();
        if let Some(default) = &self.default_mediatype {
            types.push(default.clone());
        }
        types
    }

    /// Serve one request.
    ///
    /// A reply that is already a response is returned untouched. Otherwise the
    /// resource's own representations get the first chance to render it; what
    /// they do not claim is passed on unchanged.
    pub fn dispatch(&self, request: &Request) -> HandlerResult {
        let Some(verb) = self.def.resolve_verb(&request.method) else {
            debug!(
                endpoint = %self.endpoint,
                method = %request.method,
                "Method not implemented by resource"
            );
            return Err(ApiError::MethodNotAllowed {
                method: request.method.clone(),
                allowed: self.def.methods(),
            });
        };

        let handler = self.def.bind(&self.args, &verb)?;
        let handler = self.def.method_decorators().apply(&request.method, handler);

        let call = Call::new(request, &self.endpoint, self.mediatypes(request));
        debug!(
            endpoint = %self.endpoint,
            method = %request.method,
            verb = %verb,
            request_id = %request.request_id,
            "Dispatching to resource"
        );
        let reply = handler(&call)?;
        if reply.is_response() {
            return Ok(reply);
        }
        materialize_resource(reply, self.def.representations(), &request.accept_list())
    }

    /// Wrap the dispatcher into a routable [`View`].
    #[must_use]
    pub fn into_view(self) -> View {
        let name = self.endpoint.clone();
        let resource = Some(self.def.id());
        let methods = self.def.methods();
        let this = Arc::new(self);
        View::from_parts(
            name,
            resource,
            methods,
            view_fn(move |request| this.dispatch(request)),
        )
    }
}
