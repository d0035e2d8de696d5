use super::accept::AcceptList;
use super::json::{output_json, JsonSettings};
use crate::error::ApiError;
use crate::server::{HeaderVec, Response};
use indexmap::IndexMap;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Media type served by default.
pub const APPLICATION_JSON: &str = "application/json";

/// Converts `(payload, status, headers)` into a finished response for one media type.
pub type Transformer =
    Arc<dyn Fn(Value, u16, HeaderVec) -> Result<Response, ApiError> + Send + Sync>;

/// Ordered table of media-type transformers.
///
/// Insertion order is the tie-break precedence during negotiation.
/// Re-registering a media type swaps its transformer in place.
///
/// Reads are pure; the table is meant to be filled at start-up and then only
/// read (see [`crate::api::Api::representation`]).
#[derive(Clone, Default)]
pub struct MediaTypeRegistry {
    entries: IndexMap<String, Transformer>,
}

impl MediaTypeRegistry {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding only the `application/json` transformer.
    #[must_use]
    pub fn with_json(settings: JsonSettings) -> Self {
        let mut registry = Self::new();
        registry.register(APPLICATION_JSON, move |payload, status, headers| {
            output_json(&payload, status, &headers, settings)
        });
        registry
    }

    /// Insert or replace the transformer for `media_type`.
    ///
    /// Returns the previous transformer on replacement; the entry keeps its position.
    pub fn register<F>(&mut self, media_type: &str, transformer: F) -> Option<Transformer>
    where
        F: Fn(Value, u16, HeaderVec) -> Result<Response, ApiError> + Send + Sync + 'static,
    {
        self.insert(media_type, Arc::new(transformer))
    }

    /// Like [`MediaTypeRegistry::register`] for an already shared transformer.
    pub fn insert(&mut self, media_type: &str, transformer: Transformer) -> Option<Transformer> {
        self.entries
            .insert(normalize(media_type).into_owned(), transformer)
    }

    /// Transformer for `media_type`, compared case-insensitively.
    #[must_use]
    pub fn get(&self, media_type: &str) -> Option<&Transformer> {
        self.entries.get(normalize(media_type).as_ref())
    }

    /// Registered key and transformer for `media_type`.
    #[must_use]
    pub fn entry(&self, media_type: &str) -> Option<(&str, &Transformer)> {
        self.entries
            .get_key_value(normalize(media_type).as_ref())
            .map(|(key, transformer)| (key.as_str(), transformer))
    }

    #[must_use]
    pub fn contains(&self, media_type: &str) -> bool {
        self.entries.contains_key(normalize(media_type).as_ref())
    }

    /// Registered media types in precedence order.
    pub fn media_types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest-quality registered type for `accept`, earliest registration on ties.
    ///
    /// `fallback` is returned (as given) when no registered type is acceptable.
    pub fn best_match<'a>(
        &'a self,
        accept: &AcceptList,
        fallback: Option<&'a str>,
    ) -> Option<&'a str> {
        accept.best_match(self.media_types(), fallback)
    }
}

/// Media types are compared trimmed and lower-cased.
pub(crate) fn normalize(media_type: &str) -> Cow<'_, str> {
    let trimmed = media_type.trim();
    if trimmed.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(trimmed.to_ascii_lowercase())
    } else {
        Cow::Borrowed(trimmed)
    }
}

impl fmt::Debug for MediaTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(tag: &'static str) -> impl Fn(Value, u16, HeaderVec) -> Result<Response, ApiError> {
        move |_, status, _| Ok(Response::text(status, tag))
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut registry = MediaTypeRegistry::new();
        registry.register("application/json", tagged("json-1"));
        registry.register("application/xml", tagged("xml"));
        let previous = registry.register("application/json", tagged("json-2"));
        assert!(previous.is_some());
        assert_eq!(
            registry.media_types().collect::<Vec<_>>(),
            vec!["application/json", "application/xml"]
        );
        let resp = (registry.get("application/json").unwrap())(Value::Null, 200, HeaderVec::new()).unwrap();
        assert_eq!(resp.body_text(), "json-2");
    }

    #[test]
    fn test_keys_are_normalised() {
        let mut registry = MediaTypeRegistry::new();
        registry.register(" Application/JSON ", tagged("json"));
        assert!(registry.contains("application/json"));
        assert!(registry.contains("APPLICATION/json"));
        assert!(registry.get(" Application/Json").is_some());
        let (key, _) = registry.entry("Application/JSON").unwrap();
        assert_eq!(key, "application/json");
    }

    #[test]
    fn test_best_match_uses_registration_order_on_ties() {
        let mut registry = MediaTypeRegistry::new();
        registry.register("application/xml", tagged("xml"));
        registry.register("application/json", tagged("json"));
        let accept = AcceptList::parse("application/json, application/xml");
        assert_eq!(registry.best_match(&accept, None), Some("application/xml"));
    }
}
