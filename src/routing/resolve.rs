//! Capability resolution through bounded indirection.
//!
//! A field may hold its handler directly, behind boxes, or as a plain value
//! whose reference form carries the capability. Resolution first unwraps
//! downward, then promotes upward from the original value, each for at most
//! [`MAX_INDIRECTION`] steps. The zero value never resolves.

use std::sync::Arc;

use crate::http::assets::AssetSource;
use crate::routing::definition::{Handler, Value};

/// Maximum number of indirection steps taken in either direction.
pub const MAX_INDIRECTION: usize = 5;

/// A behavior a resolved value may satisfy.
pub trait Capability: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl Capability for Arc<dyn Handler> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Handler(handler) => Some(handler.clone()),
            _ => None,
        }
    }
}

impl Capability for Arc<dyn AssetSource> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Assets(source) => Some(source.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Remove one layer of wrapping.
    Down,
    /// Promote to the reference form.
    Up,
}

impl Direction {
    fn next(self, value: &Value) -> Option<&Value> {
        match (self, value) {
            (Direction::Down, Value::Boxed(inner)) => Some(&**inner),
            (Direction::Up, Value::Addressable(inner)) => Some(&**inner),
            _ => None,
        }
    }
}

/// Resolve `value` to capability `C`, preferring downward resolution.
pub fn resolve<C: Capability>(value: &Value) -> Option<C> {
    resolve_direction(value, Direction::Down, MAX_INDIRECTION)
        .or_else(|| resolve_direction(value, Direction::Up, MAX_INDIRECTION))
}

/// Resolve in a single direction, taking at most `steps` steps.
pub fn resolve_direction<C: Capability>(value: &Value, direction: Direction, steps: usize) -> Option<C> {
    let mut current = value;
    let mut remaining = steps;
    loop {
        if current.is_nil() {
            return None;
        }
        if let Some(found) = C::from_value(current) {
            return Some(found);
        }
        if remaining == 0 {
            return None;
        }
        current = direction.next(current)?;
        remaining -= 1;
    }
}
