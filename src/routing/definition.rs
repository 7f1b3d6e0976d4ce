//! Declarative API definitions.
//!
//! # Responsibilities
//! - Describe an HTTP surface as a tree of named fields
//! - Carry per-field annotations (methods, routes, group names)
//! - Express indirection layers explicitly so the resolver can walk them
//!
//! # Design Decisions
//! - Definitions are plain data; registration happens once, at build time
//! - Capabilities are trait objects behind `Arc` so the same handler can
//!   appear in several fields without cloning its state

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;

use crate::http::assets::AssetSource;
use crate::routing::tag::Tag;

/// Something that can serve a single request.
pub trait Handler: Send + Sync + 'static {
    fn serve(&self, request: Request) -> BoxFuture<'static, Response>;
}

/// Adapter turning an async closure into a [`Handler`].
#[derive(Clone)]
pub struct FnHandler<F>(F);

/// Wrap an async function taking the raw request.
pub fn handler_fn<F, Fut, R>(f: F) -> FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    FnHandler(f)
}

impl<F, Fut, R> Handler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn serve(&self, request: Request) -> BoxFuture<'static, Response> {
        let fut = (self.0)(request);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// A nested structure of fields.
pub trait Definition: Send + Sync + 'static {
    /// Fields in declaration order.
    fn fields(&self) -> Vec<Field>;

    /// Short type name used in diagnostics.
    fn type_name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }
}

/// A top-level, versioned API definition. Mounted under `/api/v<version>`.
pub trait Api: Definition {
    fn version(&self) -> u32;
}

/// The current value of a field.
///
/// `Boxed` and `Addressable` model the two directions of indirection:
/// a boxed value exposes its contents by unwrapping, an addressable value
/// only exposes its capability once promoted to its reference form.
#[derive(Clone)]
pub enum Value {
    /// The zero value. Never satisfies a capability.
    Nil,
    Handler(Arc<dyn Handler>),
    Assets(Arc<dyn AssetSource>),
    Struct(Arc<dyn Definition>),
    /// Plain data with no capability.
    Plain(String),
    /// One layer of wrapping, removed by downward resolution.
    Boxed(Box<Value>),
    /// A plain value whose reference form is the inner value.
    Addressable(Box<Value>),
}

impl Value {
    pub fn handler(handler: impl Handler) -> Self {
        Value::Handler(Arc::new(handler))
    }

    pub fn assets(source: impl AssetSource) -> Self {
        Value::Assets(Arc::new(source))
    }

    pub fn group(definition: impl Definition) -> Self {
        Value::Struct(Arc::new(definition))
    }

    pub fn plain(data: impl Into<String>) -> Self {
        Value::Plain(data.into())
    }

    /// Wrap in one more layer of boxing.
    pub fn boxed(self) -> Self {
        Value::Boxed(Box::new(self))
    }

    /// Hide behind one more layer that needs promotion to be seen.
    pub fn addressable(self) -> Self {
        Value::Addressable(Box::new(self))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Strip every layer of boxing and return the nested definition, if any.
    pub fn as_struct(&self) -> Option<&Arc<dyn Definition>> {
        match self {
            Value::Struct(definition) => Some(definition),
            Value::Boxed(inner) => inner.as_struct(),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Handler(_) => "handler",
            Value::Assets(_) => "assets",
            Value::Struct(_) => "struct",
            Value::Plain(_) => "plain",
            Value::Boxed(_) => "boxed",
            Value::Addressable(_) => "addressable",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Plain(data) => f.debug_tuple("Plain").field(data).finish(),
            Value::Boxed(inner) => f.debug_tuple("Boxed").field(inner).finish(),
            Value::Addressable(inner) => f.debug_tuple("Addressable").field(inner).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

/// One named field of a [`Definition`].
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    tag: Tag,
    value: Value,
    exported: bool,
}

impl Field {
    /// An exported field with the given annotation string.
    pub fn new(name: impl Into<String>, tag: &str, value: Value) -> Self {
        Self {
            name: name.into(),
            tag: Tag::new(tag),
            value,
            exported: true,
        }
    }

    /// Mark the field as unexported. Registration refuses such fields.
    pub fn private(mut self) -> Self {
        self.exported = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_exported(&self) -> bool {
        self.exported
    }
}
