//! HTTP server setup.
//!
//! # Responsibilities
//! - Wrap the compiled route tree in the middleware stack
//! - Bind the configured listener
//! - Serve until the shared shutdown is triggered
//!
//! # Design Decisions
//! - A clean stop after shutdown is a successful task completion
//! - Bind and accept failures surface as task errors

use axum::Router;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ListenerConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::Shutdown;
use crate::net::listener::{self, BoundListener, ListenerError};
use crate::observability::metrics;
use crate::routing::RouteTree;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("HTTP server failed: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for a compiled route tree.
pub struct HttpServer {
    router: Router,
    listener: ListenerConfig,
}

impl HttpServer {
    pub fn new(tree: RouteTree, listener: ListenerConfig) -> Self {
        Self {
            router: Self::build_router(tree.into_router()),
            listener,
        }
    }

    /// Add the middleware stack around the route tree.
    fn build_router(routes: Router) -> Router {
        routes
            .layer(axum::middleware::from_fn(metrics::track_requests))
            .layer(CorsLayer::permissive())
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// The router with middleware applied.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind the configured listener and serve until `shutdown` triggers.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), ServeError> {
        let listener = listener::bind(&self.listener.network, &self.listener.address).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: BoundListener, shutdown: Shutdown) -> Result<(), ServeError> {
        tracing::info!(
            network = %self.listener.network,
            address = %listener.local_addr(),
            "Serving http and listening"
        );

        match listener {
            BoundListener::Tcp(l) => {
                axum::serve(l, self.router)
                    .with_graceful_shutdown(shutdown.wait_owned())
                    .await?
            }
            #[cfg(unix)]
            BoundListener::Unix(l, _socket) => {
                axum::serve(l, self.router)
                    .with_graceful_shutdown(shutdown.wait_owned())
                    .await?
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
