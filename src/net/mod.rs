//! Network layer.
//!
//! Binds the listener the HTTP task serves on. The network family comes from
//! configuration: `tcp`, `tcp4`, `tcp6` or, on unix, `unix`.

pub mod listener;

pub use listener::{bind, BoundListener, ListenerError, NETWORKS};
