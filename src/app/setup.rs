use crate::error::ApiError;
use crate::host::{Host, RoutePath, RouteOptions, RouteSink};
use crate::resource::View;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Procedure a [`SetupState`] uses to put a blueprint's rule on its host.
pub trait RuleAdder: Send + Sync {
    fn add_rule(
        &self,
        setup: &SetupState,
        rule: RoutePath,
        endpoint: &str,
        view: View,
        options: RouteOptions,
    ) -> Result<(), ApiError>;
}

/// Default adder: prefixes the rule, namespaces the endpoint, merges
/// subdomain and URL defaults, then registers on the host.
///
/// Deferred rules are rejected; something must resolve them first.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrefixRuleAdder;

impl RuleAdder for PrefixRuleAdder {
    fn add_rule(
        &self,
        setup: &SetupState,
        rule: RoutePath,
        endpoint: &str,
        view: View,
        options: RouteOptions,
    ) -> Result<(), ApiError> {
        let RoutePath::Resolved(rule) = rule else {
            return Err(ApiError::contract(format!(
                "deferred rule for endpoint '{endpoint}' reached blueprint '{}' without a resolver",
                setup.blueprint_name()
            )));
        };
        let rule = match setup.url_prefix() {
            Some(prefix) if rule.is_empty() => prefix.to_string(),
            Some(prefix) => format!(
                "{}/{}",
                prefix.trim_end_matches('/'),
                rule.trim_start_matches('/')
            ),
            None => rule,
        };
        setup.add_to_host(rule, endpoint, view, options)
    }
}

/// State handed to a blueprint's recorded callbacks while it is bound to a host.
pub struct SetupState {
    host: Arc<dyn Host>,
    blueprint_name: String,
    url_prefix: Option<String>,
    subdomain: Option<String>,
    url_defaults: BTreeMap<String, String>,
    first_registration: bool,
    rule_adder: RwLock<Arc<dyn RuleAdder>>,
    installed: Mutex<HashSet<&'static str>>,
}

impl SetupState {
    pub(crate) fn new(
        host: Arc<dyn Host>,
        blueprint_name: String,
        url_prefix: Option<String>,
        subdomain: Option<String>,
        url_defaults: BTreeMap<String, String>,
        first_registration: bool,
    ) -> Self {
        Self {
            host,
            blueprint_name,
            url_prefix,
            subdomain,
            url_defaults,
            first_registration,
            rule_adder: RwLock::new(Arc::new(PrefixRuleAdder)),
            installed: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    #[must_use]
    pub fn blueprint_name(&self) -> &str {
        &self.blueprint_name
    }

    /// Effective prefix: the registration's, else the blueprint's own.
    #[must_use]
    pub fn url_prefix(&self) -> Option<&str> {
        self.url_prefix.as_deref()
    }

    #[must_use]
    pub fn subdomain(&self) -> Option<&str> {
        self.subdomain.as_deref()
    }

    #[must_use]
    pub fn url_defaults(&self) -> &BTreeMap<String, String> {
        &self.url_defaults
    }

    /// `true` the first time the host sees this blueprint.
    #[must_use]
    pub fn first_registration(&self) -> bool {
        self.first_registration
    }

    /// `endpoint` namespaced with the blueprint name.
    #[must_use]
    pub fn qualify(&self, endpoint: &str) -> String {
        format!("{}.{}", self.blueprint_name, endpoint)
    }

    /// Swap the rule adder for `wrap(current)` unless `marker` was installed before.
    ///
    /// Returns whether the wrapper was installed by this call.
    pub fn install_rule_adder_once<F>(&self, marker: &'static str, wrap: F) -> bool
    where
        F: FnOnce(Arc<dyn RuleAdder>) -> Arc<dyn RuleAdder>,
    {
        let mut installed = self.installed.lock();
        if !installed.insert(marker) {
            debug!(blueprint = %self.blueprint_name, marker, "Rule adder already installed");
            return false;
        }
        let mut adder = self.rule_adder.write();
        let current = Arc::clone(&*adder);
        *adder = wrap(current);
        debug!(blueprint = %self.blueprint_name, marker, "Rule adder installed");
        true
    }

    /// Register a final `path` on the host: endpoint namespaced, blueprint
    /// subdomain and URL defaults merged under the rule's own options.
    pub fn add_to_host(
        &self,
        path: String,
        endpoint: &str,
        view: View,
        mut options: RouteOptions,
    ) -> Result<(), ApiError> {
        if options.subdomain.is_none() {
            options.subdomain = self.subdomain.clone();
        }
        let mut defaults = self.url_defaults.clone();
        defaults.append(&mut options.defaults);
        options.defaults = defaults;
        self.host
            .add_url_rule(RoutePath::Resolved(path), &self.qualify(endpoint), view, options)
    }

    /// Whether `marker` has been installed.
    #[must_use]
    pub fn has_rule_adder(&self, marker: &'static str) -> bool {
        self.installed.lock().contains(marker)
    }
}

impl RouteSink for SetupState {
    fn add_url_rule(
        &self,
        rule: RoutePath,
        endpoint: &str,
        view: View,
        options: RouteOptions,
    ) -> Result<(), ApiError> {
        let adder = Arc::clone(&*self.rule_adder.read());
        adder.add_rule(self, rule, endpoint, view, options)
    }

    fn view(&self, endpoint: &str) -> Option<View> {
        self.host.view(&self.qualify(endpoint))
    }
}

impl fmt::Debug for SetupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupState")
            .field("host", &self.host.name())
            .field("blueprint_name", &self.blueprint_name)
            .field("url_prefix", &self.url_prefix)
            .field("subdomain", &self.subdomain)
            .field("url_defaults", &self.url_defaults)
            .field("first_registration", &self.first_registration)
            .finish_non_exhaustive()
    }
}
