//! # Configuration Module
//!
//! [`ApiConfig`] carries every data-shaped option of an [`crate::api::Api`]:
//! URL prefix, default media type, error handling flags, the URL part order
//! and the custom error map. Decorators are code and are passed through
//! [`crate::api::ApiBuilder`] instead.
//!
//! ## Sources
//!
//! - Defaults via [`ApiConfig::default`]
//! - YAML ([`ApiConfig::from_yaml_str`]) or TOML ([`ApiConfig::from_toml_str`]),
//!   or a file picked by extension with [`ApiConfig::load`]
//! - Environment overrides via [`ApiConfig::with_env_overrides`]
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! | --- | --- |
//! | `BRRTREST_PREFIX` | `prefix` |
//! | `BRRTREST_DEFAULT_MEDIATYPE` | `default_mediatype` (empty disables the fallback) |
//! | `BRRTREST_URL_PART_ORDER` | `url_part_order` |
//! | `BRRTREST_CATCH_ALL_404S` | `catch_all_404s` |
//! | `BRRTREST_SERVE_CHALLENGE_ON_401` | `serve_challenge_on_401` |
//! | `BRRTREST_AUTH_REALM` | `realm` |
//!
//! ## Example
//!
//! ```rust
//! use brrtrest::config::ApiConfig;
//!
//! let config = ApiConfig::from_yaml_str(
//!     "prefix: /api\nurl_part_order: aeb\ndefault_mediatype: null\n",
//! )
//! .unwrap();
//! assert_eq!(config.prefix, "/api");
//! assert_eq!(config.url_part_order.to_string(), "aeb");
//! assert!(config.default_mediatype.is_none());
//! ```

use crate::negotiation::{JsonSettings, APPLICATION_JSON};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Realm announced in `WWW-Authenticate` challenges unless configured.
pub const DEFAULT_REALM: &str = "brrtrest";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("url part order must be a permutation of 'b', 'a' and 'e', got '{value}'")]
    InvalidPartOrder { value: String },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// One of the three pieces a resource URL is assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlPart {
    /// Blueprint registration prefix (`b`)
    Blueprint,
    /// API prefix (`a`)
    Api,
    /// Path the resource was added with (`e`)
    Endpoint,
}

impl UrlPart {
    fn letter(self) -> char {
        match self {
            UrlPart::Blueprint => 'b',
            UrlPart::Api => 'a',
            UrlPart::Endpoint => 'e',
        }
    }
}

/// Concatenation order of the URL parts, written as a permutation of `bae`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UrlPartOrder([UrlPart; 3]);

impl UrlPartOrder {
    #[must_use]
    pub fn parts(&self) -> [UrlPart; 3] {
        self.0
    }

    /// Concatenate the parts in order, skipping empty ones.
    ///
    /// ```rust
    /// use brrtrest::config::UrlPartOrder;
    ///
    /// let order: UrlPartOrder = "aeb".parse().unwrap();
    /// assert_eq!(order.assemble("/bp", "/api", "/hi"), "/api/hi/bp");
    /// ```
    #[must_use]
    pub fn assemble(&self, blueprint: &str, api: &str, endpoint: &str) -> String {
        let mut url = String::with_capacity(blueprint.len() + api.len() + endpoint.len());
        for part in self.0 {
            url.push_str(match part {
                UrlPart::Blueprint => blueprint,
                UrlPart::Api => api,
                UrlPart::Endpoint => endpoint,
            });
        }
        url
    }
}

impl Default for UrlPartOrder {
    fn default() -> Self {
        UrlPartOrder([UrlPart::Blueprint, UrlPart::Api, UrlPart::Endpoint])
    }
}

impl FromStr for UrlPartOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidPartOrder {
            value: s.to_string(),
        };
        let parts: Vec<UrlPart> = s
            .chars()
            .map(|c| match c {
                'b' => Ok(UrlPart::Blueprint),
                'a' => Ok(UrlPart::Api),
                'e' => Ok(UrlPart::Endpoint),
                _ => Err(invalid()),
            })
            .collect::<Result<_, _>>()?;
        let order: [UrlPart; 3] = parts.try_into().map_err(|_| invalid())?;
        if order[0] == order[1] || order[0] == order[2] || order[1] == order[2] {
            return Err(invalid());
        }
        Ok(UrlPartOrder(order))
    }
}

impl TryFrom<String> for UrlPartOrder {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UrlPartOrder> for String {
    fn from(order: UrlPartOrder) -> Self {
        order.to_string()
    }
}

impl fmt::Display for UrlPartOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in self.0 {
            write!(f, "{}", part.letter())?;
        }
        Ok(())
    }
}

/// Custom rendering for one error kind.
///
/// `extra` fields are merged into the error body next to `message`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ErrorSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Options of an [`crate::api::Api`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Prefix for every route of the API, e.g. `/v1`
    pub prefix: String,
    /// Media type used when nothing in `Accept` is registered; `None` answers 406
    pub default_mediatype: Option<String>,
    /// Render every 404 of the host through the API's error handling
    pub catch_all_404s: bool,
    /// Add a `WWW-Authenticate` challenge to 401 responses
    pub serve_challenge_on_401: bool,
    pub url_part_order: UrlPartOrder,
    /// Realm of the `WWW-Authenticate` challenge
    pub realm: String,
    /// Settings of the default JSON representation
    pub json: JsonSettings,
    /// Custom error rendering keyed by error kind (`NotFound`, `Unauthorized`, ...)
    pub errors: BTreeMap<String, ErrorSpec>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            default_mediatype: Some(APPLICATION_JSON.to_string()),
            catch_all_404s: false,
            serve_challenge_on_401: false,
            url_part_order: UrlPartOrder::default(),
            realm: DEFAULT_REALM.to_string(),
            json: JsonSettings::default(),
            errors: BTreeMap::new(),
        }
    }
}

impl ApiConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a file: `.toml` as TOML, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::from_toml_str(&source),
            _ => Self::from_yaml_str(&source),
        }
    }

    /// Apply `BRRTREST_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from `lookup` (keyed by environment variable name).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(prefix) = lookup("BRRTREST_PREFIX") {
            self.prefix = prefix;
        }
        if let Some(mediatype) = lookup("BRRTREST_DEFAULT_MEDIATYPE") {
            let mediatype = mediatype.trim();
            self.default_mediatype = (!mediatype.is_empty()).then(|| mediatype.to_string());
        }
        if let Some(order) = lookup("BRRTREST_URL_PART_ORDER") {
            self.url_part_order = order.trim().parse()?;
        }
        if let Some(flag) = lookup("BRRTREST_CATCH_ALL_404S") {
            self.catch_all_404s = parse_flag("BRRTREST_CATCH_ALL_404S", &flag)?;
        }
        if let Some(flag) = lookup("BRRTREST_SERVE_CHALLENGE_ON_401") {
            self.serve_challenge_on_401 = parse_flag("BRRTREST_SERVE_CHALLENGE_ON_401", &flag)?;
        }
        if let Some(realm) = lookup("BRRTREST_AUTH_REALM") {
            self.realm = realm;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(mediatype) = &self.default_mediatype {
            if !mediatype.contains('/') {
                return Err(ConfigError::Invalid {
                    field: "default_mediatype",
                    reason: format!("'{mediatype}' is not a media type"),
                });
            }
        }
        if self.realm.contains('"') {
            return Err(ConfigError::Invalid {
                field: "realm",
                reason: "must not contain '\"'".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_flag(field: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            field,
            reason: format!("'{other}' is not a boolean"),
        }),
    }
}
