//! Supervised lifecycle scenarios, run against a paused clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use app_harness::{AppConfig, Application, Context, NoArgs, Outcome, TaskError, TaskResult};
use tokio::time::{sleep, Instant};

fn app(timeout_ms: u64) -> Application<NoArgs> {
    Application::<NoArgs>::new().drain_timeout(Duration::from_millis(timeout_ms))
}

async fn after(ms: u64, result: TaskResult) -> TaskResult {
    sleep(Duration::from_millis(ms)).await;
    result
}

fn failure(msg: &str) -> TaskResult {
    Err::<(), TaskError>(msg.into())
}

#[tokio::test(start_paused = true)]
async fn test_drains_when_every_task_finishes_in_time() {
    let start = Instant::now();
    let outcome = app(200)
        .task("a", |_ctx: Context<NoArgs>| async { failure("a failed") })
        .task("b", |_ctx: Context<NoArgs>| after(50, Ok(())))
        .task("c", |_ctx: Context<NoArgs>| after(50, Ok(())))
        .start(NoArgs {}, AppConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Drained { failures: 1 });
    assert_eq!(outcome.exit_code(), 1);
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert!(start.elapsed() < Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_times_out_on_a_task_that_never_returns() {
    let start = Instant::now();
    let outcome = app(100)
        .task("a", |_ctx: Context<NoArgs>| async { failure("a failed") })
        .task("b", |_ctx: Context<NoArgs>| std::future::pending())
        .start(NoArgs {}, AppConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::TimedOut { failures: 1, abandoned: 1 });
    assert_eq!(outcome.exit_code(), 1);
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert!(start.elapsed() < Duration::from_millis(110));
}

#[tokio::test(start_paused = true)]
async fn test_completes_when_last_task_finishes() {
    let start = Instant::now();
    let outcome = app(100)
        .task("a", |_ctx: Context<NoArgs>| after(10, Ok(())))
        .task("b", |_ctx: Context<NoArgs>| after(40, Ok(())))
        .task("c", |_ctx: Context<NoArgs>| after(25, Ok(())))
        .start(NoArgs {}, AppConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(outcome.exit_code(), 0);
    assert!(start.elapsed() >= Duration::from_millis(40));
    assert!(start.elapsed() < Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_errors_during_drain_are_counted_once_each() {
    let outcome = app(200)
        .task("a", |_ctx: Context<NoArgs>| async { failure("first") })
        .task("b", |ctx: Context<NoArgs>| async move {
            ctx.cancelled().await;
            failure("second")
        })
        .task("c", |ctx: Context<NoArgs>| async move {
            ctx.cancelled().await;
            Ok(())
        })
        .start(NoArgs {}, AppConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Drained { failures: 2 });
}

#[tokio::test(start_paused = true)]
async fn test_zero_timeout_waits_for_slow_tasks() {
    let start = Instant::now();
    let outcome = app(0)
        .task("a", |_ctx: Context<NoArgs>| async { failure("a failed") })
        .task("slow", |_ctx: Context<NoArgs>| after(10_000, Ok(())))
        .start(NoArgs {}, AppConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Drained { failures: 1 });
    assert!(start.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_every_task_sees_the_same_shutdown() {
    let observed = Arc::new(AtomicUsize::new(0));
    let mut application = app(100).task("trigger", |ctx: Context<NoArgs>| async move {
        ctx.shutdown().trigger();
        Ok(())
    });
    for i in 0..4 {
        let observed = observed.clone();
        application = application.task(format!("worker-{i}"), move |ctx: Context<NoArgs>| async move {
            ctx.cancelled().await;
            observed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    let outcome = application.start(NoArgs {}, AppConfig::default()).await.unwrap();
    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(observed.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_requested_stop_cannot_be_held_by_a_stuck_task() {
    let start = Instant::now();
    let outcome = app(100)
        .task("stopper", |ctx: Context<NoArgs>| async move {
            sleep(Duration::from_millis(300)).await;
            ctx.shutdown().trigger();
            Ok(())
        })
        .task("stuck", |_ctx: Context<NoArgs>| std::future::pending())
        .start(NoArgs {}, AppConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::TimedOut { failures: 0, abandoned: 1 });
    assert!(start.elapsed() >= Duration::from_millis(400));
    assert!(start.elapsed() < Duration::from_millis(410));
}
