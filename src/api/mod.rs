//! # API Module
//!
//! The [`Api`] facade: registers resources on an application or blueprint,
//! negotiates every reply against its representation table and renders the
//! errors of its own endpoints.
//!
//! ## Binding
//!
//! An API is bound once, either with [`Api::init_app`] or
//! [`Api::init_blueprint`]. Resources added before that are queued and
//! registered when the binding happens; resources added afterwards are
//! registered immediately. Behind a blueprint, "immediately" means "when the
//! blueprint is registered on an application", see [`DeferredRuleAdder`].
//!
//! ## URL composition
//!
//! The final rule of a resource URL is the concatenation of up to three parts,
//! in the order given by [`crate::config::UrlPartOrder`]:
//!
//! | Part | Source |
//! |------|--------|
//! | `b`  | the blueprint's registration prefix |
//! | `a`  | [`crate::config::ApiConfig::prefix`] |
//! | `e`  | the URL passed to [`Api::add_resource`] |

mod core;
mod registration;

pub use core::{Api, ApiBuilder, RegisterOptions};
pub use registration::{DeferredRuleAdder, DEFERRED_RULE_MARKER};
