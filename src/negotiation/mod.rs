//! # Negotiation Module
//!
//! Content negotiation between a client's `Accept` header and the
//! representations an API (or a single resource) knows how to produce.
//!
//! - [`AcceptList`] parses and ranks the client's preferences.
//! - [`MediaTypeRegistry`] is the ordered media type → transformer table.
//! - [`materialize`] turns a handler's [`Reply`] into a [`crate::server::Response`].
//!
//! ## Precedence
//!
//! Quality decides first. Among equally acceptable types the one registered
//! earliest wins, independent of the order the client listed them in.

mod accept;
mod json;
mod materialize;
mod registry;

pub use accept::{AcceptItem, AcceptList};
pub use json::{output_json, JsonSettings};
pub use materialize::{materialize, materialize_resource, represent, unpack, Reply, TEXT_PLAIN};
pub use registry::{MediaTypeRegistry, Transformer, APPLICATION_JSON};
