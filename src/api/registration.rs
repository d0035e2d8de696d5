//! Registration coordinator: queues resources until a host is known,
//! finalizes them against it, and implements the deferred blueprint mount.
//!
//! ## Deferred mount
//!
//! An [`crate::api::Api`] attached to a blueprint cannot know its final URLs:
//! the blueprint's prefix is only fixed when the blueprint is registered. Its
//! rules are therefore handed over as [`RoutePath::Deferred`] functions of
//! that prefix. When the blueprint is bound, the callback recorded by
//! [`Registration::bind_mount`] installs a [`DeferredRuleAdder`] on the setup
//! state (once per setup state, whatever the number of APIs sharing the
//! blueprint) that resolves those functions before the rules reach the host.

use super::core::{ApiCore, RegisterOptions};
use crate::app::{RuleAdder, SetupState};
use crate::error::ApiError;
use crate::host::{Host, MountPoint, RoutePath, RouteOptions, RouteSink};
use crate::resource::{ResourceDef, ResourceId, ResourceView, View};
use crate::server::Request;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Marker guarding the installation of [`DeferredRuleAdder`] on a setup state.
pub const DEFERRED_RULE_MARKER: &str = "brrtrest.deferred_rule";

/// Rule adder resolving deferred rules with the setup's prefix.
///
/// Resolved rules are delegated unchanged to the adder it wraps.
pub struct DeferredRuleAdder {
    inner: Arc<dyn RuleAdder>,
}

impl DeferredRuleAdder {
    #[must_use]
    pub fn new(inner: Arc<dyn RuleAdder>) -> Self {
        Self { inner }
    }
}

impl RuleAdder for DeferredRuleAdder {
    fn add_rule(
        &self,
        setup: &SetupState,
        rule: RoutePath,
        endpoint: &str,
        view: View,
        options: RouteOptions,
    ) -> Result<(), ApiError> {
        match rule {
            RoutePath::Deferred(resolve) => {
                let path = resolve(setup.url_prefix());
                debug!(
                    blueprint = %setup.blueprint_name(),
                    endpoint = %endpoint,
                    path = %path,
                    "Deferred rule resolved"
                );
                setup.add_to_host(path, endpoint, view, options)
            }
            resolved @ RoutePath::Resolved(_) => {
                self.inner.add_rule(setup, resolved, endpoint, view, options)
            }
        }
    }
}

/// Where finalized registrations go.
enum Target {
    Unbound,
    App(Arc<dyn Host>),
    Mount {
        mount: Arc<dyn MountPoint>,
        setup: Option<Arc<SetupState>>,
    },
}

struct Pending {
    def: ResourceDef,
    urls: Vec<String>,
    options: RegisterOptions,
}

/// Registration state of one API.
pub(crate) struct Registration {
    target: Target,
    pending: Vec<Pending>,
    /// Endpoint name -> resource bound to it
    owners: HashMap<String, ResourceId>,
    /// Resource -> endpoint it was last registered under
    resource_endpoints: HashMap<ResourceId, String>,
}

impl Registration {
    pub(crate) fn new() -> Self {
        Self {
            target: Target::Unbound,
            pending: Vec::new(),
            owners: HashMap::new(),
            resource_endpoints: HashMap::new(),
        }
    }

    pub(crate) fn is_bound(&self) -> bool {
        !matches!(self.target, Target::Unbound)
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Finalize now when a target is known, else queue.
    pub(crate) fn add(
        &mut self,
        core: &Arc<ApiCore>,
        def: &ResourceDef,
        urls: Vec<String>,
        options: RegisterOptions,
    ) -> Result<(), ApiError> {
        if self.is_bound() {
            return self.finalize(core, def, &urls, &options);
        }
        debug!(
            resource = %def.name(),
            urls = ?urls,
            "Resource queued until the api is bound"
        );
        self.pending.push(Pending {
            def: def.clone(),
            urls,
            options,
        });
        Ok(())
    }

    /// Bind to an application and flush the queue.
    pub(crate) fn bind_app(
        &mut self,
        core: &Arc<ApiCore>,
        host: Arc<dyn Host>,
    ) -> Result<(), ApiError> {
        if self.is_bound() {
            return Err(ApiError::AlreadyRegistered {
                mount: host.name().to_string(),
            });
        }
        install_error_hook(core, host.as_ref());
        info!(app = %host.name(), pending = self.pending.len(), "Api bound to application");
        self.target = Target::App(host);
        self.flush(core)
    }

    /// Attach to a mount point; finalization waits for its bind event.
    pub(crate) fn bind_mount(
        this: &Arc<Mutex<Registration>>,
        core: &Arc<ApiCore>,
        mount: Arc<dyn MountPoint>,
    ) -> Result<(), ApiError> {
        let mut reg = this.lock();
        if reg.is_bound() {
            return Err(ApiError::AlreadyRegistered {
                mount: mount.name().to_string(),
            });
        }
        let weak: Weak<Mutex<Registration>> = Arc::downgrade(this);
        let core = Arc::clone(core);
        mount.record(Arc::new(move |setup: &Arc<SetupState>| {
            deferred_mount_init(&weak, &core, setup)
        }));
        debug!(blueprint = %mount.name(), "Api waiting for blueprint registration");
        reg.target = Target::Mount { mount, setup: None };
        Ok(())
    }

    /// Endpoint `def` was registered under, qualified by the mount name.
    pub(crate) fn qualified_endpoint(&self, def: &ResourceDef) -> Result<String, ApiError> {
        let endpoint = self
            .resource_endpoints
            .get(&def.id())
            .ok_or_else(|| ApiError::UrlBuild {
                endpoint: def.default_endpoint(),
                reason: format!("resource {} is not registered", def.name()),
            })?;
        Ok(self.qualify(endpoint))
    }

    /// Host that builds URLs, once known.
    pub(crate) fn host(&self) -> Result<Arc<dyn Host>, ApiError> {
        match &self.target {
            Target::App(host) => Ok(Arc::clone(host)),
            Target::Mount {
                setup: Some(setup), ..
            } => Ok(Arc::clone(setup.host())),
            Target::Unbound | Target::Mount { setup: None, .. } => Err(ApiError::Unbound),
        }
    }

    fn qualify(&self, endpoint: &str) -> String {
        match &self.target {
            Target::Mount { mount, .. } => format!("{}.{}", mount.name(), endpoint),
            Target::Unbound | Target::App(_) => endpoint.to_string(),
        }
    }

    fn flush(&mut self, core: &Arc<ApiCore>) -> Result<(), ApiError> {
        for pending in std::mem::take(&mut self.pending) {
            self.finalize(core, &pending.def, &pending.urls, &pending.options)?;
        }
        Ok(())
    }

    /// Build the view for `def` and register it under every URL.
    fn finalize(
        &mut self,
        core: &Arc<ApiCore>,
        def: &ResourceDef,
        urls: &[String],
        options: &RegisterOptions,
    ) -> Result<(), ApiError> {
        let endpoint = options
            .endpoint
            .clone()
            .unwrap_or_else(|| def.default_endpoint());

        if let Some(owner) = self.owners.get(&endpoint) {
            if *owner != def.id() {
                return Err(ApiError::EndpointConflict {
                    endpoint,
                    existing: owner.short_name().to_string(),
                    attempted: def.name().to_string(),
                });
            }
        }
        let sink = self.sink()?;
        if let Some(existing) = sink.view(&endpoint) {
            if existing.resource() != Some(def.id()) {
                return Err(ApiError::EndpointConflict {
                    endpoint,
                    existing: existing.owner(),
                    attempted: def.name().to_string(),
                });
            }
        }

        let dispatcher = ResourceView::new(
            def.clone(),
            endpoint.clone(),
            options.args.clone(),
            core.config().default_mediatype.clone(),
        );
        let view = dispatcher
            .into_view()
            .map_fn(|f| core.output(f))
            .map_fn(|f| core.decorate(f));

        for url in urls {
            let rule = match &sink {
                Sink::Host(_) => RoutePath::Resolved(core.complete_url(url, "")),
                Sink::Setup(_) | Sink::Mount(_) => core.deferred_url(url),
            };
            sink.add_url_rule(rule, &endpoint, view.clone(), options.route.clone())?;
        }

        let qualified = self.qualify(&endpoint);
        core.track_endpoint(&qualified);
        self.owners.insert(endpoint.clone(), def.id());
        self.resource_endpoints.insert(def.id(), endpoint);
        info!(
            resource = %def.name(),
            endpoint = %qualified,
            urls = ?urls,
            methods = ?def.methods(),
            "Resource registered"
        );
        Ok(())
    }

    fn sink(&self) -> Result<Sink, ApiError> {
        match &self.target {
            Target::App(host) => Ok(Sink::Host(Arc::clone(host))),
            Target::Mount {
                setup: Some(setup), ..
            } => Ok(Sink::Setup(Arc::clone(setup))),
            Target::Mount { mount, setup: None } => Ok(Sink::Mount(Arc::clone(mount))),
            Target::Unbound => Err(ApiError::Unbound),
        }
    }
}

/// The concrete [`RouteSink`] a registration is finalized against.
enum Sink {
    Host(Arc<dyn Host>),
    Setup(Arc<SetupState>),
    Mount(Arc<dyn MountPoint>),
}

impl Sink {
    fn add_url_rule(
        &self,
        rule: RoutePath,
        endpoint: &str,
        view: View,
        options: RouteOptions,
    ) -> Result<(), ApiError> {
        match self {
            Sink::Host(host) => host.add_url_rule(rule, endpoint, view, options),
            Sink::Setup(setup) => setup.add_url_rule(rule, endpoint, view, options),
            Sink::Mount(mount) => mount.add_url_rule(rule, endpoint, view, options),
        }
    }

    fn view(&self, endpoint: &str) -> Option<View> {
        match self {
            Sink::Host(host) => host.view(endpoint),
            Sink::Setup(setup) => setup.view(endpoint),
            Sink::Mount(mount) => mount.view(endpoint),
        }
    }
}

/// Run at the blueprint's bind event.
fn deferred_mount_init(
    registration: &Weak<Mutex<Registration>>,
    core: &Arc<ApiCore>,
    setup: &Arc<SetupState>,
) -> Result<(), ApiError> {
    setup.install_rule_adder_once(DEFERRED_RULE_MARKER, |inner| {
        Arc::new(DeferredRuleAdder::new(inner))
    });

    let Some(registration) = registration.upgrade() else {
        warn!(
            blueprint = %setup.blueprint_name(),
            "Api dropped before its blueprint was registered"
        );
        return Ok(());
    };
    let mut reg = registration.lock();

    let already_bound = matches!(reg.target, Target::Mount { setup: Some(_), .. });
    if already_bound || !setup.first_registration() {
        return Err(ApiError::AlreadyRegistered {
            mount: setup.blueprint_name().to_string(),
        });
    }
    if let Target::Mount { setup: slot, .. } = &mut reg.target {
        *slot = Some(Arc::clone(setup));
    }
    install_error_hook(core, setup.host().as_ref());
    info!(
        blueprint = %setup.blueprint_name(),
        url_prefix = ?setup.url_prefix(),
        pending = reg.pending_len(),
        "Api bound through blueprint"
    );
    reg.flush(core)
}

fn install_error_hook(core: &Arc<ApiCore>, host: &dyn Host) {
    let core = Arc::clone(core);
    host.register_error_handler(Arc::new(move |request: &Request, error: &ApiError| {
        core.owns(request, error)
            .then(|| core.handle_error(request, error))
    }));
}
