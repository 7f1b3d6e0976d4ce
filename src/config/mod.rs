//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! CLI flags / environment (args.rs)
//!     → optional config file (loader.rs, TOML)
//!     → overrides applied
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod args;
pub mod loader;
pub mod schema;
pub mod validation;

pub use args::{CommandLine, NoArgs, ServerArgs};
pub use loader::ConfigError;
pub use schema::{AppConfig, ListenerConfig, LogFormat, ObservabilityConfig, ShutdownConfig};
