//! # Resource Module
//!
//! Declares REST resources and dispatches requests to their verb handlers.
//!
//! A [`ResourceDef`] is a verb table (`GET`, `POST`, ...) over a resource type
//! `R`. An instance of `R` is built from the registration's
//! [`ResourceArgs`] for every request, so handlers never share mutable state
//! through the resource itself.
//!
//! [`ResourceView`] is what gets routed: it resolves the verb (falling back
//! from `HEAD` to `GET`), applies the resource's method decorators, invokes the
//! handler and gives the resource's own representations a chance to render
//! the result.

mod core;
mod dispatch;

pub use core::{
    bound_handler, method_decorator, view_decorator, view_fn, BoundHandler, Call, DecoratorSpec,
    HandlerResult, MethodDecorator, ResourceArgs, ResourceBuilder, ResourceDef, ResourceId, View,
    ViewDecorator, ViewFn,
};
pub use dispatch::ResourceView;
