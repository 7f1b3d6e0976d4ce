//! Supervision of concurrently running tasks.
//!
//! # State Machine
//! ```text
//! Idle ──spawn──▶ Running ──all ok──────────────────────▶ Completed (exit 0)
//!                    │
//!                    ├─shutdown──▶ Stopping ──all ok─────▶ Completed (exit 0)
//!                    │                 │
//!                    └─first error─▶ Draining ──all done─▶ Drained  (exit 1)
//!                                       │
//!                                       └──timeout──────▶ TimedOut (exit 1)
//! ```
//!
//! # Design Decisions
//! - First error wins: it triggers the shared shutdown and starts the drain
//!   clock; later errors are only logged
//! - A shutdown triggered without an error (signal, task) starts the same
//!   clock, so a task ignoring cancellation cannot hold the process
//! - A drain timeout of zero waits without bound
//! - Tasks still running at timeout are detached, never aborted

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{sleep_until, Instant};

use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Error returned by a supervised task.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a supervised task.
pub type TaskResult = Result<(), TaskError>;

/// How a supervised run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every task finished and none failed.
    Completed,
    /// A task failed; all tasks finished within the drain timeout.
    Drained { failures: usize },
    /// A task failed or shutdown was requested, and `abandoned` tasks were
    /// still running at the drain timeout.
    TimedOut { failures: usize, abandoned: usize },
}

impl Outcome {
    /// Process exit code: 0 only for a fully clean run.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Completed => 0,
            Outcome::Drained { .. } | Outcome::TimedOut { .. } => 1,
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, Outcome::Completed)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed => write!(f, "completed"),
            Outcome::Drained { failures } => write!(f, "drained after {} failure(s)", failures),
            Outcome::TimedOut { failures, abandoned } => write!(
                f,
                "timed out after {} failure(s), {} task(s) abandoned",
                failures, abandoned
            ),
        }
    }
}

/// Runs tasks under one shared shutdown with first-error-wins drain.
pub struct Supervisor {
    shutdown: Shutdown,
    drain_timeout: Duration,
    tasks: JoinSet<(String, TaskResult)>,
    launched: usize,
}

impl Supervisor {
    pub fn new(shutdown: Shutdown, drain_timeout: Duration) -> Self {
        Self {
            shutdown,
            drain_timeout,
            tasks: JoinSet::new(),
            launched: 0,
        }
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Number of tasks launched so far.
    pub fn launched(&self) -> usize {
        self.launched
    }

    /// Launch a task. It starts running immediately.
    ///
    /// A panic inside the task is reported as that task's error.
    pub fn spawn<F>(&mut self, name: impl Into<String>, task: F)
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        let name = name.into();
        tracing::debug!(task = %name, "Task launched");
        metrics::record_task_started();
        self.launched += 1;
        self.tasks.spawn(async move {
            let result = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err("task panicked".into()),
            };
            (name, result)
        });
    }

    /// Map a joined task to its name and error, if it failed.
    fn settle(joined: Result<(String, TaskResult), JoinError>) -> Option<(String, TaskError)> {
        match joined {
            Ok((name, Ok(()))) => {
                tracing::debug!(task = %name, "Task finished");
                None
            }
            Ok((name, Err(e))) => Some((name, e)),
            Err(e) => Some(("unknown".to_string(), e.into())),
        }
    }

    /// Wait for every task, draining on the first error.
    pub async fn wait(mut self) -> Outcome {
        let mut failures = 0usize;
        let mut draining = false;
        let mut deadline: Option<Instant> = None;
        let stopping = self.shutdown.clone();
        let bounded = !self.drain_timeout.is_zero();

        loop {
            let drain_deadline = deadline;
            let timeout = async move {
                match drain_deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                joined = self.tasks.join_next() => {
                    let Some(joined) = joined else { break };
                    let Some((name, error)) = Self::settle(joined) else { continue };

                    failures += 1;
                    metrics::record_task_failure();
                    tracing::error!(task = %name, error = %error, "Task returned an error");

                    if !draining {
                        draining = true;
                        self.shutdown.trigger();
                        if bounded && deadline.is_none() {
                            deadline = Some(Instant::now() + self.drain_timeout);
                        }
                        tracing::info!(
                            timeout = ?self.drain_timeout,
                            remaining = self.tasks.len(),
                            "Waiting for all tasks to exit"
                        );
                    }
                }
                () = stopping.wait(), if bounded && deadline.is_none() => {
                    deadline = Some(Instant::now() + self.drain_timeout);
                    tracing::info!(
                        timeout = ?self.drain_timeout,
                        remaining = self.tasks.len(),
                        "Shutdown requested, waiting for tasks to exit"
                    );
                }
                () = timeout => {
                    let abandoned = self.tasks.len();
                    tracing::warn!(
                        timeout = ?self.drain_timeout,
                        abandoned,
                        "Tasks did not finish before the drain timeout"
                    );
                    self.tasks.detach_all();
                    return Outcome::TimedOut { failures, abandoned };
                }
            }
        }

        tracing::info!("All tasks finished");
        if draining {
            Outcome::Drained { failures }
        } else {
            Outcome::Completed
        }
    }
}
