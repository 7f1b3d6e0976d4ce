//! OS signal handling.
//!
//! SIGINT (Ctrl+C) and SIGTERM trigger the shared shutdown. A signal is a
//! cooperative stop, not a task error. Once shutdown is under way, another
//! signal exits the process immediately with status 1.

use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;

/// Spawn a listener that triggers `shutdown` on the first termination signal.
///
/// The listener is not supervised; abort the handle once the run is over.
pub fn spawn_signal_listener(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            signal = termination_signal() => {
                tracing::info!(signal, "Shutdown signal received");
                shutdown.trigger();
            }
            _ = shutdown.wait() => {}
        }

        let signal = termination_signal().await;
        tracing::warn!(signal, "Second shutdown signal received, exiting without draining");
        std::process::exit(1);
    })
}

async fn termination_signal() -> &'static str {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                "SIGTERM"
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        name = ctrl_c => name,
        name = terminate => name,
    }
}
