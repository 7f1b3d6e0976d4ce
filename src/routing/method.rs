//! Supported HTTP methods for declared handlers.

use std::fmt;
use std::str::FromStr;

use axum::routing::MethodFilter;

/// The fixed set of methods a handler field may bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RouteMethod {
    Get,
    Head,
    Options,
    Post,
    Patch,
    Put,
    Delete,
}

/// Returned for anything outside [`RouteMethod`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported method {0}")]
pub struct UnsupportedMethod(pub String);

impl RouteMethod {
    pub const ALL: [RouteMethod; 7] = [
        RouteMethod::Get,
        RouteMethod::Head,
        RouteMethod::Options,
        RouteMethod::Post,
        RouteMethod::Patch,
        RouteMethod::Put,
        RouteMethod::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMethod::Get => "GET",
            RouteMethod::Head => "HEAD",
            RouteMethod::Options => "OPTIONS",
            RouteMethod::Post => "POST",
            RouteMethod::Patch => "PATCH",
            RouteMethod::Put => "PUT",
            RouteMethod::Delete => "DELETE",
        }
    }

    pub fn filter(&self) -> MethodFilter {
        match self {
            RouteMethod::Get => MethodFilter::GET,
            RouteMethod::Head => MethodFilter::HEAD,
            RouteMethod::Options => MethodFilter::OPTIONS,
            RouteMethod::Post => MethodFilter::POST,
            RouteMethod::Patch => MethodFilter::PATCH,
            RouteMethod::Put => MethodFilter::PUT,
            RouteMethod::Delete => MethodFilter::DELETE,
        }
    }
}

impl FromStr for RouteMethod {
    type Err = UnsupportedMethod;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        RouteMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == upper)
            .ok_or(UnsupportedMethod(upper))
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
