//! Application entry point.
//!
//! # Responsibilities
//! - Parse arguments and resolve configuration
//! - Build the route tree from registered API definitions (fatal on error)
//! - Launch the HTTP task and every background task under one [`Supervisor`]
//! - Map the run's [`Outcome`] to a process exit code
//!
//! # Design Decisions
//! - The route tree is fully built before any task starts
//! - The HTTP task is launched only when at least one API is registered

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser};
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::config::{AppConfig, CommandLine, ConfigError, ObservabilityConfig};
use crate::http::HttpServer;
use crate::lifecycle::signals::spawn_signal_listener;
use crate::lifecycle::{Outcome, Shutdown, Supervisor, TaskError, TaskResult};
use crate::observability::{logging, metrics};
use crate::routing::{Api, BuildError, RouteTreeBuilder};

/// Drain timeout used when neither configuration nor builder sets one.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Name of the supervised HTTP task.
pub const HTTP_TASK: &str = "http";

/// Errors that stop an application before any task runs.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to initialize api: {0}")]
    Api(TaskError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Shared state handed to API factories and tasks.
pub struct Context<A> {
    inner: Arc<ContextInner<A>>,
}

struct ContextInner<A> {
    args: A,
    config: AppConfig,
    shutdown: Shutdown,
}

impl<A> Clone for Context<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A> Context<A> {
    pub fn new(args: A, config: AppConfig, shutdown: Shutdown) -> Self {
        Self {
            inner: Arc::new(ContextInner { args, config, shutdown }),
        }
    }

    /// Application-specific arguments.
    pub fn args(&self) -> &A {
        &self.inner.args
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn network(&self) -> &str {
        &self.inner.config.listener.network
    }

    pub fn address(&self) -> &str {
        &self.inner.config.listener.address
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.inner.shutdown
    }

    /// Resolves when the run is shutting down.
    pub async fn cancelled(&self) {
        self.inner.shutdown.wait().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.shutdown.is_triggered()
    }
}

type ApiFactory<A> = Box<dyn FnOnce(&Context<A>) -> Result<Box<dyn Api>, TaskError> + Send>;
type TaskFn<A> = Box<dyn FnOnce(Context<A>) -> BoxFuture<'static, TaskResult> + Send>;

/// Builder for a supervised application.
pub struct Application<A> {
    apis: Vec<ApiFactory<A>>,
    tasks: Vec<(String, TaskFn<A>)>,
    drain_timeout: Duration,
}

impl<A> Default for Application<A> {
    fn default() -> Self {
        Self {
            apis: Vec::new(),
            tasks: Vec::new(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl<A: Args + Send + Sync + 'static> Application<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an API definition.
    pub fn api(self, api: impl Api) -> Self {
        self.api_with(move |_| Ok::<_, TaskError>(api))
    }

    /// Register an API built from the context. A factory error is fatal.
    pub fn api_with<F, T, E>(mut self, factory: F) -> Self
    where
        F: FnOnce(&Context<A>) -> Result<T, E> + Send + 'static,
        T: Api,
        E: Into<TaskError>,
    {
        self.apis.push(Box::new(move |ctx: &Context<A>| {
            factory(ctx)
                .map(|api| Box::new(api) as Box<dyn Api>)
                .map_err(Into::into)
        }));
        self
    }

    /// Register a background task.
    pub fn task<F, Fut>(mut self, name: impl Into<String>, task: F) -> Self
    where
        F: FnOnce(Context<A>) -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        self.tasks
            .push((name.into(), Box::new(move |ctx: Context<A>| Box::pin(task(ctx)) as BoxFuture<'static, TaskResult>)));
        self
    }

    /// Default drain timeout; configuration overrides it. Zero waits forever.
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Parse the process command line and run. Returns the process exit code.
    pub async fn run(self) -> i32 {
        let cli = CommandLine::<A>::parse();

        let config = match cli.server.resolve() {
            Ok(config) => config,
            Err(e) => {
                logging::init(&ObservabilityConfig::default());
                tracing::error!(error = %e, "Failed to load configuration");
                return 1;
            }
        };
        logging::init(&config.observability);

        match self.start(cli.app, config).await {
            Ok(outcome) => outcome.exit_code(),
            Err(e) => {
                tracing::error!(error = %e, "Startup failed");
                1
            }
        }
    }

    /// Build routes, launch every task and wait for the supervised outcome.
    pub async fn start(self, args: A, config: AppConfig) -> Result<Outcome, StartupError> {
        tracing::info!(version = env!("CARGO_PKG_VERSION"), "Application starting");

        if config.observability.metrics_enabled {
            match config.observability.metrics_address.parse::<SocketAddr>() {
                Ok(addr) => metrics::init_metrics(addr),
                Err(e) => tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    error = %e,
                    "Failed to parse metrics address"
                ),
            }
        }

        let drain_timeout = config.drain_timeout(self.drain_timeout);
        let shutdown = Shutdown::new();
        let ctx = Context::new(args, config, shutdown.clone());

        let server = Self::build_server(self.apis, &ctx)?;

        let mut supervisor = Supervisor::new(shutdown.clone(), drain_timeout);
        if let Some(server) = server {
            let stop = shutdown.clone();
            supervisor.spawn(HTTP_TASK, async move { server.run(stop).await.map_err(TaskError::from) });
        }
        for (name, task) in self.tasks {
            supervisor.spawn(name, task(ctx.clone()));
        }

        tracing::info!(
            tasks = supervisor.launched(),
            drain_timeout = ?drain_timeout,
            "Application running"
        );

        let signals = spawn_signal_listener(shutdown);
        let outcome = supervisor.wait().await;
        signals.abort();

        if outcome.is_clean() {
            tracing::info!("All tasks finished, goodbye");
        } else {
            tracing::error!(outcome = %outcome, "Application stopped after a task error");
        }
        Ok(outcome)
    }

    fn build_server(apis: Vec<ApiFactory<A>>, ctx: &Context<A>) -> Result<Option<HttpServer>, StartupError> {
        if apis.is_empty() {
            return Ok(None);
        }

        let mut builder = RouteTreeBuilder::new();
        for factory in apis {
            let api = factory(ctx).map_err(StartupError::Api)?;
            if let Err(e) = builder.add_api(api.as_ref()) {
                tracing::error!(field = %e.location(), group = %e.group, error = %e.kind, "Failed to register field");
                return Err(e.into());
            }
        }
        Ok(Some(HttpServer::new(builder.build(), ctx.config().listener.clone())))
    }
}
