// tests/integration/timer_test.rs

//! Integration tests for timers and the keepalive on a live session
//! Tests: timers start on activation, share the write path, stop with the session

use super::test_helpers::*;
use mudlink::core::tasks::keepalive_timer;
use mudlink::core::{Link, MudlinkError, Registries, Timer};
use std::time::Duration;

#[tokio::test]
async fn test_timers_start_only_once_active() {
    let mut registries = Registries::new();
    registries.register_timer(keepalive_timer(Duration::from_secs(3600), "PING"));
    let mut ctx = TestContext::new(registries).await;

    ctx.send(LOGIN_PROMPT).await;
    // The credentials are the first thing written; no timer has run yet.
    assert_eq!(ctx.recv().await, CREDENTIALS);
    ctx.send(AUTH_SUCCESS).await;

    // Interval timers fire once as soon as they start.
    assert_eq!(ctx.recv().await, "PING");
    assert_eq!(ctx.try_recv(Duration::from_millis(100)).await, None);
}

#[tokio::test]
async fn test_interval_timer_repeats() {
    let mut registries = Registries::new();
    registries.register_timer(Timer::every("tick", Duration::from_millis(50), |link: Link| async move {
        link.write("TICK")
    }));
    let mut ctx = TestContext::new(registries).await;
    ctx.login().await;

    for _ in 0..3 {
        assert_eq!(ctx.recv().await, "TICK");
    }
}

#[tokio::test]
async fn test_timer_job_can_call() {
    let mut registries = Registries::new();
    registries.register_timer(Timer::every("who", Duration::from_secs(3600), |link: Link| async move {
        let count = link
            .call("WHO", r"^(\d+) players? online\.$", None, Some(1.into()))
            .await?;
        link.write(format!("say {count} online"))
    }));
    let mut ctx = TestContext::new(registries).await;
    ctx.login().await;

    assert_eq!(ctx.recv().await, "WHO");
    ctx.send("7 players online.").await;
    assert_eq!(ctx.recv().await, "say 7 online");
}

#[tokio::test]
async fn test_failing_timer_keeps_running() {
    let mut registries = Registries::new();
    registries.register_timer(Timer::every("flaky", Duration::from_millis(30), |link: Link| async move {
        link.write("try")?;
        Err::<(), MudlinkError>(MudlinkError::Handler("flaky".into()))
    }));
    let mut ctx = TestContext::new(registries).await;
    ctx.login().await;

    assert_eq!(ctx.recv().await, "try");
    assert_eq!(ctx.recv().await, "try");
    assert!(ctx.link.stats().handler_failures() >= 1);
}

#[tokio::test]
async fn test_timers_stop_with_the_session() {
    let mut registries = Registries::new();
    registries.register_timer(Timer::every("tick", Duration::from_millis(20), |link: Link| async move {
        link.write("TICK")
    }));
    let mut ctx = TestContext::new(registries).await;
    ctx.login().await;
    assert_eq!(ctx.recv().await, "TICK");

    ctx.disconnect_remote().await;
    assert!(ctx.finish().await.is_err());

    let sent = ctx.link.stats().lines_sent();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(ctx.link.stats().lines_sent(), sent);
}
