//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (application.rs):
//!     Parse args → Load config → Build route tree → Launch tasks
//!
//! Supervision (supervisor.rs):
//!     Tasks run → first error → trigger shutdown → bounded drain → Outcome
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - One shared shutdown per run; cancellation is cooperative
//! - Drain has a timeout: remaining tasks are abandoned after the deadline

pub mod shutdown;
pub mod signals;
pub mod supervisor;

pub use shutdown::Shutdown;
pub use supervisor::{Outcome, Supervisor, TaskError, TaskResult};
