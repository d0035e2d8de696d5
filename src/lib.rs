//! # brrtrest
//!
//! **brrtrest** is a resource-oriented REST layer for Rust: declare a resource
//! as a table of verb handlers, mount it under one or more URLs, and let the
//! client's `Accept` header decide how the result is rendered.
//!
//! ## Overview
//!
//! A handler returns data, not bytes. The [`api::Api`] that registered the
//! resource picks the best registered representation for the request (JSON by
//! default) and turns the data into a [`server::Response`]. Errors raised by
//! handlers of the API's endpoints are rendered the same way, as
//! `{"message": ...}` bodies in the negotiated media type.
//!
//! ## Architecture
//!
//! - **[`negotiation`]** - `Accept` parsing, the media type registry and reply materialization
//! - **[`resource`]** - Resource definitions, verb dispatch and decorators
//! - **[`api`]** - The API facade: registration, URL composition, error rendering
//! - **[`app`]** - A minimal host: applications, blueprints and their setup state
//! - **[`router`]** - Rule compilation and path matching
//! - **[`host`]** - The contract between an API and whatever hosts its routes
//! - **[`server`]** - Request and response types
//! - **[`config`]** / **[`logging`]** - Configuration and tracing setup
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant App as App::handle
//!     participant Routes as RouteTable
//!     participant Api as Api (output + decorators)
//!     participant View as ResourceView
//!     participant Handler as Verb handler
//!
//!     Client->>App: GET /api/todos/1<br/>Accept: application/json
//!     App->>Routes: route(GET, "/api/todos/1")
//!     alt No rule matches
//!         Routes-->>App: NotFound
//!         App-->>Client: 404 (rendered by the Api with catch_all_404s)
//!     end
//!     Routes-->>App: Matched(endpoint "todo", {id: "1"})
//!     App->>Api: view(request)
//!     Api->>View: dispatch(request)
//!     View->>View: resolve verb (HEAD falls back to GET)
//!     View->>Handler: handler(instance, call)
//!     Handler-->>View: Reply::Data({...}, 200, headers)
//!     View->>View: resource representations
//!     View-->>Api: Reply
//!     Api->>Api: negotiate Accept against registry
//!     Api-->>App: Reply::Response
//!     App-->>Client: 200 application/json
//! ```
//!
//! ### Blueprint Mount Flow
//!
//! An API attached to a blueprint cannot know its URLs before the blueprint is
//! registered on an application. It records a callback instead:
//!
//! ```mermaid
//! sequenceDiagram
//!     participant User
//!     participant Api
//!     participant Blueprint
//!     participant App
//!     participant Setup as SetupState
//!
//!     User->>Api: init_blueprint(&bp)
//!     Api->>Blueprint: record(deferred mount init)
//!     User->>Api: add_resource(Todo, ["/todos"])
//!     Note over Api: queued
//!     User->>App: register_blueprint(&bp, options)
//!     App->>Setup: new(prefix, subdomain, first_registration)
//!     App->>Blueprint: run recorded callbacks
//!     Blueprint->>Api: deferred mount init(setup)
//!     Api->>Setup: install DeferredRuleAdder (once)
//!     Api->>Setup: add_url_rule(Deferred(prefix -> url))
//!     Setup->>App: add_url_rule("/bp/api/todos", "bp.todo")
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtrest::{Api, App, RegisterOptions, Request, ResourceDef};
//! use serde_json::json;
//!
//! #[derive(Default)]
//! struct Todo;
//!
//! let app = App::new("todos");
//! let api = Api::builder().prefix("/api").build();
//!
//! let todo = ResourceDef::of::<Todo>()
//!     .get(|_, call| {
//!         let id = call.path_param("id").unwrap_or_default().to_string();
//!         Ok(json!({ "id": id, "done": false }).into())
//!     })
//!     .build();
//!
//! api.add_resource(&todo, &["/todos/{id}"], RegisterOptions::default())?;
//! api.init_app(&app)?;
//!
//! let resp = app.handle(Request::get("/api/todos/7"));
//! assert_eq!(resp.status, 200);
//! assert_eq!(resp.get_header("content-type"), Some("application/json"));
//! # Ok::<(), brrtrest::ApiError>(())
//! ```
//!
//! ## Configuration
//!
//! [`config::ApiConfig`] can be built in code, loaded from YAML or TOML and
//! overridden from `BRRTREST_*` environment variables. Logging is configured
//! separately through [`logging::LogConfig`] (`BRRTREST_LOG_*`).
//!
//! ## Concurrency
//!
//! Registration takes locks and is meant for start-up. Request handling only
//! reads: the route table and view map behind read locks, the representation
//! table through an `arc-swap` snapshot. A fresh resource instance is built
//! for every request, so handlers share nothing unless their factory does.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod host;
pub mod ids;
pub mod logging;
pub mod negotiation;
pub mod resource;
pub mod router;
pub mod server;

pub use api::{Api, ApiBuilder, RegisterOptions};
pub use app::{App, Blueprint, BlueprintOptions};
pub use config::{ApiConfig, ConfigError, ErrorSpec, UrlPartOrder};
pub use error::ApiError;
pub use host::{Host, MountPoint, RouteOptions, RoutePath, RouteSink};
pub use ids::RequestId;
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogFormat};
pub use negotiation::{MediaTypeRegistry, Reply};
pub use resource::{Call, DecoratorSpec, ResourceArgs, ResourceDef, View};
pub use server::{Request, Response};
