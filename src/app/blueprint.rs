use crate::error::ApiError;
use crate::host::{DeferredSetup, MountPoint, RoutePath, RouteOptions, RouteSink};
use crate::resource::View;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A group of routes mounted onto an [`crate::app::App`] later.
///
/// Rules added to a blueprint are recorded and only reach a host when the
/// blueprint is registered. Clones share the recorded callbacks.
#[derive(Clone)]
pub struct Blueprint {
    name: String,
    url_prefix: Option<String>,
    subdomain: Option<String>,
    url_defaults: BTreeMap<String, String>,
    deferred: Arc<Mutex<Vec<DeferredSetup>>>,
}

impl Blueprint {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_prefix: None,
            subdomain: None,
            url_defaults: BTreeMap::new(),
            deferred: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    /// Value injected into every rule of the blueprint.
    #[must_use]
    pub fn url_default(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_defaults.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.url_prefix.as_deref()
    }

    #[must_use]
    pub fn default_subdomain(&self) -> Option<&str> {
        self.subdomain.as_deref()
    }

    #[must_use]
    pub fn url_defaults(&self) -> &BTreeMap<String, String> {
        &self.url_defaults
    }

    /// Record `callback` to run on every registration of this blueprint.
    pub fn record<F>(&self, callback: F)
    where
        F: Fn(&Arc<crate::app::SetupState>) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        self.deferred.lock().push(Arc::new(callback));
    }

    /// Snapshot of the recorded callbacks, in recording order.
    pub(crate) fn callbacks(&self) -> Vec<DeferredSetup> {
        self.deferred.lock().clone()
    }
}

impl RouteSink for Blueprint {
    fn add_url_rule(
        &self,
        rule: RoutePath,
        endpoint: &str,
        view: View,
        options: RouteOptions,
    ) -> Result<(), ApiError> {
        let endpoint = endpoint.to_string();
        self.record(move |setup| {
            setup.add_url_rule(rule.clone(), &endpoint, view.clone(), options.clone())
        });
        Ok(())
    }

    /// Blueprints keep no endpoint table of their own.
    fn view(&self, _endpoint: &str) -> Option<View> {
        None
    }
}

impl MountPoint for Blueprint {
    fn name(&self) -> &str {
        &self.name
    }

    fn record(&self, callback: DeferredSetup) {
        self.deferred.lock().push(callback);
    }
}

impl fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("name", &self.name)
            .field("url_prefix", &self.url_prefix)
            .field("subdomain", &self.subdomain)
            .field("url_defaults", &self.url_defaults)
            .field("recorded", &self.deferred.lock().len())
            .finish()
    }
}

/// Per-registration overrides for [`crate::app::App::register_blueprint`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlueprintOptions {
    /// Replaces the blueprint's own prefix
    pub url_prefix: Option<String>,
    /// Replaces the blueprint's own subdomain
    pub subdomain: Option<String>,
}

impl BlueprintOptions {
    #[must_use]
    pub fn url_prefix(prefix: impl Into<String>) -> Self {
        Self {
            url_prefix: Some(prefix.into()),
            subdomain: None,
        }
    }
}
