//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Api definitions (definition.rs)
//!     → builder.rs walks fields in declaration order
//!         → resolve.rs: does the field expose a Handler / AssetSource?
//!         → tag.rs: read method / route / group annotations
//!     → bindings + version groups + fallback
//!     → RouteTree (immutable axum::Router)
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Every malformed field is fatal: no partial router is served
//! - Version groups are cached so APIs sharing a version compose

pub mod builder;
pub mod definition;
pub mod error;
pub mod method;
pub mod resolve;
pub mod tag;

pub use builder::{RouteTree, RouteTreeBuilder, API_PREFIX};
pub use definition::{handler_fn, Api, Definition, Field, Handler, Value};
pub use error::{BuildError, BuildErrorKind};
pub use method::RouteMethod;
