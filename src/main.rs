//! Demo application.
//!
//! Serves a small v1 API and, optionally, a single-page application from a
//! directory, next to a heartbeat task.
//!
//! ```text
//! GET       /api/v1/status
//! POST      /api/v1/echo
//! GET,HEAD  /api/v1/system, /api/v1/system/info
//! *         everything else → --static-dir (main.html for unknown paths)
//! ```

use std::path::PathBuf;
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::Json;
use clap::Args;
use serde_json::json;

use app_harness::{
    handler_fn, Api, Application, Context, Definition, DirAssets, Field, TaskError, TaskResult, Value,
};

#[derive(Debug, Clone, Args)]
struct DemoArgs {
    /// Directory served for paths outside the API
    #[arg(long, env = "DEMO_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Seconds between heartbeat log lines
    #[arg(long, default_value_t = 30)]
    heartbeat_secs: u64,
}

struct DemoApi {
    started: Instant,
    static_dir: Option<PathBuf>,
}

impl Definition for DemoApi {
    fn fields(&self) -> Vec<Field> {
        let started = self.started;
        let mut fields = vec![
            Field::new(
                "Status",
                r#"method:"GET" route:"status""#,
                Value::handler(handler_fn(move |_req: Request| async move {
                    Json(json!({ "status": "ok", "uptime_secs": started.elapsed().as_secs() }))
                })),
            ),
            Field::new(
                "Echo",
                r#"method:"POST" route:"echo""#,
                Value::handler(handler_fn(|req: Request| async move {
                    axum::body::to_bytes(req.into_body(), 64 * 1024)
                        .await
                        .map_err(|_| axum::http::StatusCode::PAYLOAD_TOO_LARGE)
                })),
            ),
            Field::new("System", r#"group:"system""#, Value::group(SystemGroup)),
        ];
        if let Some(dir) = &self.static_dir {
            fields.push(Field::new("Web", "", Value::assets(DirAssets::new(dir))));
        }
        fields
    }
}

impl Api for DemoApi {
    fn version(&self) -> u32 {
        1
    }
}

struct SystemGroup;

impl Definition for SystemGroup {
    fn fields(&self) -> Vec<Field> {
        vec![Field::new(
            "Info",
            r#"method:"GET,HEAD" route:",info""#,
            Value::handler(handler_fn(|_req: Request| async {
                Json(json!({ "name": env!("CARGO_PKG_NAME"), "version": env!("CARGO_PKG_VERSION") }))
            })),
        )]
    }
}

async fn heartbeat(ctx: Context<DemoArgs>) -> TaskResult {
    let mut ticker = tokio::time::interval(Duration::from_secs(ctx.args().heartbeat_secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => tracing::debug!("heartbeat"),
            _ = ctx.cancelled() => return Ok(()),
        }
    }
}

#[tokio::main]
async fn main() {
    let code = Application::<DemoArgs>::new()
        .api_with(|ctx: &Context<DemoArgs>| {
            Ok::<_, TaskError>(DemoApi {
                started: Instant::now(),
                static_dir: ctx.args().static_dir.clone(),
            })
        })
        .task("heartbeat", heartbeat)
        .run()
        .await;
    std::process::exit(code);
}
