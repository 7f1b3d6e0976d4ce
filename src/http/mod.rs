//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/unix connection
//!     → server.rs (Axum setup, middleware, graceful shutdown)
//!     → request.rs (request ID)
//!     → route tree (routing::builder)
//!     → no match: assets.rs fallback, or 404
//! ```

pub mod assets;
pub mod request;
pub mod server;

pub use assets::{AssetSource, DirAssets, MemoryAssets};
pub use request::X_REQUEST_ID;
pub use server::{HttpServer, ServeError};
