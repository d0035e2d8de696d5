//! Rule table - compiled URL rules and reverse URL building.

use crate::error::ApiError;
use crate::server::ParamVec;
use http::Method;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One compiled URL rule.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Rule as written, e.g. `/todos/{id}`
    pub pattern: String,
    /// Endpoint the rule dispatches to
    pub endpoint: String,
    /// Methods accepted by the rule
    pub methods: Vec<Method>,
    /// Subdomain the rule is restricted to
    pub subdomain: Option<String>,
    /// Values injected for parameters the rule does not capture
    pub defaults: BTreeMap<String, String>,
    regex: Regex,
    param_names: Vec<Arc<str>>,
}

impl Rule {
    /// Compile `pattern` for `endpoint`.
    pub fn new(
        pattern: &str,
        endpoint: &str,
        methods: Vec<Method>,
        subdomain: Option<String>,
        defaults: BTreeMap<String, String>,
    ) -> Result<Self, ApiError> {
        let (regex, param_names) = RouteTable::path_to_regex(pattern)?;
        Ok(Self {
            pattern: pattern.to_string(),
            endpoint: endpoint.to_string(),
            methods,
            subdomain,
            defaults,
            regex,
            param_names,
        })
    }

    /// Names of the captured parameters, in rule order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.param_names.iter().map(|p| p.as_ref())
    }

    fn captures(&self, path: &str) -> Option<ParamVec> {
        let caps = self.regex.captures(path)?;
        let mut params = ParamVec::new();
        for (i, name) in self.param_names.iter().enumerate() {
            if let Some(value) = caps.get(i + 1) {
                let decoded = urlencoding::decode(value.as_str())
                    .map_or_else(|_| value.as_str().to_string(), |v| v.into_owned());
                params.push((Arc::clone(name), decoded));
            }
        }
        for (key, value) in &self.defaults {
            if !self.param_names.iter().any(|p| p.as_ref() == key) {
                params.push((Arc::from(key.as_str()), value.clone()));
            }
        }
        Some(params)
    }

    /// Fill the rule with `values`; unused values become the query string.
    ///
    /// Returns `None` when a captured parameter has no value.
    fn build(&self, values: &[(String, String)]) -> Option<String> {
        let lookup = |name: &str| {
            values
                .iter()
                .rfind(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
                .or_else(|| self.defaults.get(name).map(String::as_str))
        };

        let mut url = String::with_capacity(self.pattern.len());
        for (i, segment) in self.pattern.split('/').enumerate() {
            if i > 0 {
                url.push('/');
            }
            match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => url.push_str(&urlencoding::encode(lookup(name)?)),
                None => url.push_str(segment),
            }
        }

        let query: Vec<_> = values
            .iter()
            .filter(|(k, _)| {
                !self.param_names.iter().any(|p| p.as_ref() == k) && !self.defaults.contains_key(k)
            })
            .collect();
        if !query.is_empty() {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (k, v) in query {
                serializer.append_pair(k, v);
            }
            url.push('?');
            url.push_str(&serializer.finish());
        }
        Some(url)
    }
}

/// Result of a successful match.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// Endpoint of the matched rule
    pub endpoint: String,
    /// Rule pattern that matched
    pub pattern: String,
    /// Parameters extracted from the path (plus rule defaults)
    pub path_params: ParamVec,
}

/// Outcome of a lookup.
#[derive(Debug, Clone)]
pub enum RouteLookup {
    /// A rule matched path and method.
    Matched(RouteMatch),
    /// Rules matched the path but none accepts the method.
    MethodMismatch {
        /// Union of the methods the matching rules accept
        allowed: Vec<Method>,
    },
    /// Nothing matched the path.
    NotFound,
}

/// Ordered table of URL rules; first match wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<Rule>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a compiled rule.
    pub fn add(&mut self, rule: Rule) {
        info!(
            pattern = %rule.pattern,
            endpoint = %rule.endpoint,
            methods = ?rule.methods,
            subdomain = ?rule.subdomain,
            "URL rule added"
        );
        self.rules.push(rule);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Rules registered for `endpoint`, in registration order.
    pub fn rules_for<'a>(&'a self, endpoint: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| r.endpoint == endpoint)
    }

    /// Match `method` and `path` against the table.
    ///
    /// `HEAD` is accepted wherever `GET` is.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> RouteLookup {
        debug!(method = %method, path = %path, "Route match attempt");
        let start = Instant::now();
        let mut allowed: Vec<Method> = Vec::new();

        for rule in &self.rules {
            let Some(path_params) = rule.captures(path) else {
                continue;
            };
            let accepts = rule.methods.contains(method)
                || (*method == Method::HEAD && rule.methods.contains(&Method::GET));
            if accepts {
                let elapsed = start.elapsed();
                if elapsed > Duration::from_millis(1) {
                    warn!(
                        method = %method,
                        path = %path,
                        endpoint = %rule.endpoint,
                        duration_us = elapsed.as_micros(),
                        "Slow route matching detected"
                    );
                } else {
                    debug!(
                        method = %method,
                        path = %path,
                        endpoint = %rule.endpoint,
                        route_pattern = %rule.pattern,
                        path_params = ?path_params,
                        "Route matched"
                    );
                }
                return RouteLookup::Matched(RouteMatch {
                    endpoint: rule.endpoint.clone(),
                    pattern: rule.pattern.clone(),
                    path_params,
                });
            }
            for m in &rule.methods {
                if !allowed.contains(m) {
                    allowed.push(m.clone());
                }
            }
        }

        if allowed.is_empty() {
            debug!(method = %method, path = %path, "No route matched");
            RouteLookup::NotFound
        } else {
            if allowed.contains(&Method::GET) && !allowed.contains(&Method::HEAD) {
                allowed.push(Method::HEAD);
            }
            debug!(method = %method, path = %path, allowed = ?allowed, "Method not allowed");
            RouteLookup::MethodMismatch { allowed }
        }
    }

    /// Build a URL for `endpoint` from the first of its rules that `values` satisfies.
    pub fn build(&self, endpoint: &str, values: &[(String, String)]) -> Result<String, ApiError> {
        let mut seen = false;
        for rule in self.rules_for(endpoint) {
            seen = true;
            if let Some(url) = rule.build(values) {
                return Ok(url);
            }
        }
        Err(ApiError::UrlBuild {
            endpoint: endpoint.to_string(),
            reason: if seen {
                format!("missing values for its parameters (got {values:?})")
            } else {
                "no rule is registered for this endpoint".to_string()
            },
        })
    }

    /// Compile a `{param}` rule into an anchored regex and its parameter names.
    ///
    /// Literal segments are escaped. A trailing slash is significant.
    ///
    /// ```rust
    /// use brrtrest::router::RouteTable;
    ///
    /// let (re, params) = RouteTable::path_to_regex("/users/{id}").unwrap();
    /// assert_eq!(params.len(), 1);
    /// assert!(re.is_match("/users/123"));
    /// ```
    pub fn path_to_regex(path: &str) -> Result<(Regex, Vec<Arc<str>>), ApiError> {
        let invalid = |reason: String| ApiError::InvalidRule {
            rule: path.to_string(),
            reason,
        };
        if !path.starts_with('/') {
            return Err(invalid("rules must start with '/'".to_string()));
        }
        if path == "/" {
            let regex = Regex::new(r"^/$").map_err(|e| invalid(e.to_string()))?;
            return Ok((regex, Vec::new()));
        }

        let mut pattern = String::with_capacity(path.len() + 5);
        pattern.push('^');
        let mut param_names: Vec<Arc<str>> = Vec::with_capacity(path.matches('{').count());

        for segment in path.split('/').skip(1) {
            pattern.push('/');
            if let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                if name.is_empty() || name.contains(['{', '}']) {
                    return Err(invalid(format!("bad parameter segment '{segment}'")));
                }
                if param_names.iter().any(|p| p.as_ref() == name) {
                    return Err(invalid(format!("parameter '{name}' appears twice")));
                }
                pattern.push_str("([^/]+)");
                param_names.push(Arc::from(name));
            } else if segment.contains(['{', '}']) {
                return Err(invalid(format!("bad parameter segment '{segment}'")));
            } else {
                pattern.push_str(&regex::escape(segment));
            }
        }

        pattern.push('$');
        let regex = Regex::new(&pattern).map_err(|e| invalid(e.to_string()))?;
        Ok((regex, param_names))
    }
}
