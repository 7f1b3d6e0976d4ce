//! Configuration errors raised while building the route tree.

use thiserror::Error;

use crate::routing::method::{RouteMethod, UnsupportedMethod};
use crate::routing::tag::TagError;

/// A malformed definition. Always fatal: no partial router is served.
#[derive(Debug, Error)]
#[error("failed to register {} under {group:?}: {kind}", .trail.join(" > "))]
pub struct BuildError {
    /// Enclosing `Type(field)` frames, outermost first.
    pub trail: Vec<String>,
    /// Group path the failing field was registered under.
    pub group: String,
    pub kind: BuildErrorKind,
}

#[derive(Debug, Error)]
pub enum BuildErrorKind {
    #[error("field is not exported")]
    Unexported,

    #[error(transparent)]
    Tag(#[from] TagError),

    #[error(transparent)]
    Method(#[from] UnsupportedMethod),

    #[error("{0} value is neither a capability nor a nested definition")]
    NotAGroup(&'static str),

    #[error("route {method} {path} is already bound")]
    DuplicateBinding { method: RouteMethod, path: String },

    #[error("route {path} is invalid: {reason}")]
    InvalidRoute { path: String, reason: String },

    #[error("a static asset fallback is already installed")]
    DuplicateFallback,
}

impl BuildError {
    pub(crate) fn new(owner: &str, field: &str, group: &str, kind: BuildErrorKind) -> Self {
        Self {
            trail: vec![format!("{owner}({field})")],
            group: group.to_string(),
            kind,
        }
    }

    /// Record an enclosing frame.
    pub(crate) fn within(mut self, frame: String) -> Self {
        self.trail.insert(0, frame);
        self
    }

    /// The innermost `Type(field)` frame.
    pub fn location(&self) -> &str {
        self.trail.last().map(String::as_str).unwrap_or_default()
    }
}
