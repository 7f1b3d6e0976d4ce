//! Declarative HTTP surfaces and supervised application lifecycles.
//!
//! An application declares versioned API definitions whose fields are
//! handlers, static asset sources or nested groups. They are compiled into a
//! route tree served by one supervised task, next to any number of background
//! tasks sharing a single shutdown.

pub mod application;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use application::{Application, Context, StartupError};
pub use config::{AppConfig, NoArgs};
pub use http::{AssetSource, DirAssets, MemoryAssets};
pub use lifecycle::{Outcome, Shutdown, Supervisor, TaskError, TaskResult};
pub use routing::{handler_fn, Api, Definition, Field, Handler, Value};
