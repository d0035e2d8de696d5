//! # Router Module
//!
//! URL rule matching and reverse URL building for the bundled host.
//!
//! ## Overview
//!
//! Rules use `{param}` segments (`/todos/{id}`). Each rule is compiled into an
//! anchored regex once, when it is added; matching walks the table in
//! registration order and the first rule accepting both path and method wins.
//!
//! When rules match the path but none accepts the method, the lookup reports
//! the union of the accepted methods so the host can answer `405` with an
//! `Allow` header.
//!
//! ## Example
//!
//! ```rust
//! use brrtrest::router::{Rule, RouteLookup, RouteTable};
//! use http::Method;
//!
//! let mut table = RouteTable::new();
//! table.add(Rule::new("/pets/{id}", "pet", vec![Method::GET], None, Default::default()).unwrap());
//!
//! match table.route(&Method::GET, "/pets/123") {
//!     RouteLookup::Matched(m) => assert_eq!(m.endpoint, "pet"),
//!     _ => unreachable!(),
//! }
//! assert_eq!(table.build("pet", &[("id".into(), "9".into())]).unwrap(), "/pets/9");
//! ```

mod core;

pub use core::{RouteLookup, RouteMatch, RouteTable, Rule};
