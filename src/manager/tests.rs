use super::*;
use crate::component::{ComponentFn, ComponentRef};
use crate::error::{ComponentError, ConductorError, Result};
use crate::signal::StartSignal;
use crate::strategy::{GracePeriod, Strategy};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

type Log = Arc<Mutex<Vec<String>>>;

fn spawn_run(manager: &Arc<Manager>, ctx: &CancellationToken) -> JoinHandle<Result<()>> {
    let manager = Arc::clone(manager);
    let ctx = ctx.clone();
    tokio::spawn(async move { manager.run(ctx).await })
}

/// Runs until cancelled, then spends `teardown` before returning `result`.
fn stopping_with(
    name: &str,
    teardown: Duration,
    result: fn() -> std::result::Result<(), ComponentError>,
) -> ComponentRef {
    ComponentFn::arc(name, move |ctx: CancellationToken, _started: StartSignal| async move {
        ctx.cancelled().await;
        sleep(teardown).await;
        result()
    })
}

fn recording(id: usize, log: &Log) -> ComponentRef {
    let log = Arc::clone(log);
    ComponentFn::arc(format!("c{}", id), move |ctx: CancellationToken, started: StartSignal| {
        let log = Arc::clone(&log);
        async move {
            log.lock().push(format!("start:{}", id));
            started.declare_started();
            ctx.cancelled().await;
            log.lock().push(format!("stop:{}", id));
            Ok(())
        }
    })
}

#[tokio::test(start_paused = true)]
async fn test_zero_components_stop_on_cancel() {
    let manager = Arc::new(Manager::new());
    let ctx = CancellationToken::new();
    let handle = spawn_run(&manager, &ctx);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(manager.state(), ManagerState::Started);
    ctx.cancel();

    assert!(handle.await.unwrap().is_ok());
    assert_eq!(manager.state(), ManagerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_one_component_stops_cleanly() {
    let manager = Arc::new(Manager::new());
    manager
        .add_ref(stopping_with("server", Duration::from_secs(1), || Ok(())))
        .unwrap();
    let ctx = CancellationToken::new();
    let handle = spawn_run(&manager, &ctx);

    sleep(Duration::from_secs(3)).await;
    ctx.cancel();

    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_add_after_start_is_rejected() {
    let manager = Arc::new(Manager::new());
    let ctx = CancellationToken::new();
    let handle = spawn_run(&manager, &ctx);

    sleep(Duration::from_millis(10)).await;
    let err = manager
        .add_ref(stopping_with("late", Duration::ZERO, || Ok(())))
        .unwrap_err();
    assert!(matches!(err, ConductorError::AlreadyStarted));
    assert!(err.is_registration_rejected());
    assert_eq!(
        err.to_string(),
        "can't accept new component as manager has already started"
    );

    ctx.cancel();
    assert!(handle.await.unwrap().is_ok());
    assert!(manager.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_add_after_stop_is_rejected() {
    let manager = Arc::new(Manager::new());
    let ctx = CancellationToken::new();
    let handle = spawn_run(&manager, &ctx);

    sleep(Duration::from_secs(1)).await;
    ctx.cancel();
    assert!(handle.await.unwrap().is_ok());

    let err = manager
        .add_ref(stopping_with("late", Duration::ZERO, || Ok(())))
        .unwrap_err();
    assert!(matches!(err, ConductorError::AlreadyStopping));
    assert_eq!(
        err.to_string(),
        "can't accept new component as stop procedure is already engaged"
    );
}

#[tokio::test]
async fn test_manager_runs_only_once() {
    let manager = Manager::new();
    let ctx = CancellationToken::new();
    ctx.cancel();

    assert!(manager.run(ctx.clone()).await.is_ok());
    assert!(matches!(
        manager.run(ctx).await,
        Err(ConductorError::AlreadyStarted)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_failure_while_running_triggers_shutdown() {
    let manager = Arc::new(Manager::new());
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    manager.add_ref(recording(1, &log)).unwrap();
    manager
        .add_ref(ComponentFn::arc("broken", |_ctx, _started| async {
            sleep(Duration::from_millis(100)).await;
            Err(ComponentError::msg("start error"))
        }))
        .unwrap();

    // The caller never cancels; the failure alone ends the run.
    let ctx = CancellationToken::new();
    let result = spawn_run(&manager, &ctx).await.unwrap();

    match result {
        Err(ConductorError::ComponentFailure(err)) => assert_eq!(err.to_string(), "start error"),
        other => panic!("expected component failure, got {:?}", other),
    }
    assert!(log.lock().contains(&"stop:1".to_string()));
    assert!(!ctx.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_results_are_swallowed() {
    let manager = Arc::new(Manager::new());
    manager
        .add_ref(stopping_with("plain", Duration::from_secs(2), || Ok(())))
        .unwrap();
    manager
        .add_ref(stopping_with("cancelled", Duration::from_secs(1), || {
            Err(ComponentError::Canceled)
        }))
        .unwrap();
    let ctx = CancellationToken::new();
    let handle = spawn_run(&manager, &ctx);

    sleep(Duration::from_secs(1)).await;
    ctx.cancel();

    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_component_returning_early_does_not_stop_the_group() {
    let manager = Arc::new(Manager::new());
    manager
        .add_ref(ComponentFn::arc("oneshot", |_ctx, _started| async { Ok(()) }))
        .unwrap();
    let ctx = CancellationToken::new();
    let handle = spawn_run(&manager, &ctx);

    sleep(Duration::from_secs(5)).await;
    assert!(!handle.is_finished());
    assert_eq!(manager.state(), ManagerState::Started);

    ctx.cancel();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_one_shutdown_error_is_reported_once() {
    let manager = Arc::new(Manager::new());
    manager
        .add_ref(stopping_with("a", Duration::from_secs(2), || Ok(())))
        .unwrap();
    manager
        .add_ref(stopping_with("b", Duration::from_secs(1), || {
            Err(ComponentError::msg("shutdown error"))
        }))
        .unwrap();
    let ctx = CancellationToken::new();
    let handle = spawn_run(&manager, &ctx);

    sleep(Duration::from_secs(1)).await;
    ctx.cancel();

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, ConductorError::Shutdown(_)));
    let message = err.to_string();
    assert_eq!(message.matches("shutdown error").count(), 1);
    assert_eq!(message, "1 error occurred:\n\t* shutdown error\n");
}

#[tokio::test(start_paused = true)]
async fn test_two_shutdown_errors_are_joined_in_any_order() {
    let manager = Arc::new(Manager::new());
    manager
        .add_ref(stopping_with("a", Duration::from_secs(2), || Ok(())))
        .unwrap();
    manager
        .add_ref(stopping_with("b", Duration::from_secs(3), || {
            Err(ComponentError::msg("shutdown error 1"))
        }))
        .unwrap();
    manager
        .add_ref(stopping_with("c", Duration::from_secs(2), || {
            Err(ComponentError::msg("shutdown error 2"))
        }))
        .unwrap();
    let ctx = CancellationToken::new();
    let handle = spawn_run(&manager, &ctx);

    sleep(Duration::from_secs(1)).await;
    ctx.cancel();

    let err = handle.await.unwrap().unwrap_err();
    let messages: Vec<String> = err
        .component_errors()
        .iter()
        .map(|e| e.to_string())
        .collect();
    assert_eq!(messages.len(), 2);
    assert!(messages.contains(&"shutdown error 1".to_string()));
    assert!(messages.contains(&"shutdown error 2".to_string()));

    // Arrival order is not part of the contract.
    let rendered = err.to_string();
    assert!(rendered.starts_with("2 errors occurred:\n"));
    assert!(
        rendered.ends_with("\t* shutdown error 1\n\t* shutdown error 2\n")
            || rendered.ends_with("\t* shutdown error 2\n\t* shutdown error 1\n")
    );
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_reported_before_shutdown_errors() {
    let manager = Arc::new(Manager::new());
    manager
        .add_ref(ComponentFn::arc("broken", |_ctx, _started| async {
            sleep(Duration::from_millis(10)).await;
            Err(ComponentError::msg("boom"))
        }))
        .unwrap();
    manager
        .add_ref(stopping_with("teardown", Duration::from_secs(1), || {
            Err(ComponentError::msg("teardown failed"))
        }))
        .unwrap();

    let err = spawn_run(&manager, &CancellationToken::new())
        .await
        .unwrap()
        .unwrap_err();
    let messages: Vec<String> = err
        .component_errors()
        .iter()
        .map(|e| e.to_string())
        .collect();
    assert!(matches!(err, ConductorError::Shutdown(_)));
    assert_eq!(messages, vec!["boom", "teardown failed"]);
}

#[tokio::test(start_paused = true)]
async fn test_grace_period_exceeded() {
    let manager = Arc::new(
        Manager::builder()
            .shutdown_timeout(Duration::from_secs(5))
            .build(),
    );
    manager
        .add_ref(stopping_with("quick", Duration::from_secs(1), || Ok(())))
        .unwrap();
    manager
        .add_ref(stopping_with("slow", Duration::from_secs(60), || Ok(())))
        .unwrap();
    let ctx = CancellationToken::new();
    let handle = spawn_run(&manager, &ctx);

    sleep(Duration::from_secs(1)).await;
    let cancelled_at = Instant::now();
    ctx.cancel();

    let err = handle.await.unwrap().unwrap_err();
    let elapsed = cancelled_at.elapsed();
    match &err {
        ConductorError::ShutdownTimeout { grace, errors } => {
            assert_eq!(*grace, GracePeriod::Bounded(Duration::from_secs(5)));
            assert!(errors.is_empty());
        }
        other => panic!("expected shutdown timeout, got {:?}", other),
    }
    assert_eq!(err.as_label(), "shutdown_timeout");
    assert!(elapsed >= Duration::from_secs(5));
    assert!(elapsed < Duration::from_secs(60));
    assert_eq!(manager.state(), ManagerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_grace_period_exceeded_keeps_component_errors() {
    let manager = Arc::new(
        Manager::builder()
            .shutdown_timeout(Duration::from_secs(2))
            .build(),
    );
    manager
        .add_ref(stopping_with("failing", Duration::from_millis(100), || {
            Err(ComponentError::msg("shutdown error"))
        }))
        .unwrap();
    manager
        .add_ref(stopping_with("stuck", Duration::from_secs(3600), || Ok(())))
        .unwrap();
    let ctx = CancellationToken::new();
    let handle = spawn_run(&manager, &ctx);

    sleep(Duration::from_secs(1)).await;
    ctx.cancel();

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, ConductorError::ShutdownTimeout { .. }));
    let messages: Vec<String> = err
        .component_errors()
        .iter()
        .map(|e| e.to_string())
        .collect();
    assert_eq!(messages, vec!["shutdown error"]);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_grace_period_waits_for_long_teardown() {
    let manager = Arc::new(Manager::new());
    assert!(manager.grace_period().is_unbounded());
    manager
        .add_ref(stopping_with("slow", Duration::from_secs(600), || Ok(())))
        .unwrap();
    let ctx = CancellationToken::new();
    let handle = spawn_run(&manager, &ctx);

    sleep(Duration::from_secs(1)).await;
    let cancelled_at = Instant::now();
    ctx.cancel();

    assert!(handle.await.unwrap().is_ok());
    assert!(cancelled_at.elapsed() >= Duration::from_secs(600));
}

#[tokio::test(start_paused = true)]
async fn test_huge_grace_period_behaves_as_unbounded() {
    let manager = Arc::new(
        Manager::builder()
            .shutdown_timeout(Duration::from_secs(u64::MAX))
            .build(),
    );
    assert!(!manager.grace_period().is_unbounded());
    manager
        .add_ref(stopping_with("quick", Duration::from_millis(10), || Ok(())))
        .unwrap();
    let ctx = CancellationToken::new();
    let handle = spawn_run(&manager, &ctx);

    sleep(Duration::from_secs(1)).await;
    ctx.cancel();

    assert!(handle.await.unwrap().is_ok());
    assert_eq!(manager.state(), ManagerState::Stopped);
}

fn explode() -> std::result::Result<(), ComponentError> {
    panic!("bad state")
}

#[tokio::test(start_paused = true)]
async fn test_panicking_component_is_a_failure() {
    let manager = Arc::new(Manager::new());
    manager
        .add_ref(ComponentFn::arc("panicky", |_ctx, _started| async {
            sleep(Duration::from_millis(10)).await;
            explode()
        }))
        .unwrap();

    let err = spawn_run(&manager, &CancellationToken::new())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, ConductorError::ComponentFailure(_)));
    assert!(err.to_string().contains("component 'panicky' panicked"));
}

#[tokio::test(start_paused = true)]
async fn test_ordered_start_and_reverse_stop() {
    let manager = Arc::new(Manager::builder().strategy(Strategy::Ordered).build());
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    for id in 1..=3 {
        manager.add_ref(recording(id, &log)).unwrap();
    }
    let ctx = CancellationToken::new();
    let handle = spawn_run(&manager, &ctx);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(*log.lock(), vec!["start:1", "start:2", "start:3"]);
    ctx.cancel();

    assert!(handle.await.unwrap().is_ok());
    assert_eq!(
        *log.lock(),
        vec!["start:1", "start:2", "start:3", "stop:3", "stop:2", "stop:1"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_ordered_start_waits_for_max_start_wait() {
    let max_wait = Duration::from_secs(2);
    let manager = Arc::new(
        Manager::builder()
            .strategy(Strategy::Ordered)
            .max_start_wait(max_wait)
            .build(),
    );
    let started_at: Arc<Mutex<Vec<(String, Instant)>>> = Arc::new(Mutex::new(Vec::new()));

    for (name, declares) in [("quiet", false), ("ready", true), ("last", true)] {
        let started_at = Arc::clone(&started_at);
        manager
            .add_ref(ComponentFn::arc(name, move |ctx: CancellationToken, started: StartSignal| {
                let started_at = Arc::clone(&started_at);
                async move {
                    started_at.lock().push((name.to_string(), Instant::now()));
                    if declares {
                        started.declare_started();
                    }
                    ctx.cancelled().await;
                    Ok(())
                }
            }))
            .unwrap();
    }

    let begin = Instant::now();
    let ctx = CancellationToken::new();
    let handle = spawn_run(&manager, &ctx);

    sleep(max_wait - Duration::from_millis(100)).await;
    assert_eq!(started_at.lock().len(), 1);

    sleep(Duration::from_secs(1)).await;
    ctx.cancel();
    assert!(handle.await.unwrap().is_ok());

    let started_at = started_at.lock();
    let names: Vec<&str> = started_at.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["quiet", "ready", "last"]);
    // Only the silent component holds up the next start.
    assert!(started_at[1].1 - begin >= max_wait);
    assert!(started_at[2].1 - started_at[1].1 < Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_ordered_start_skips_remaining() {
    let manager = Arc::new(
        Manager::builder()
            .strategy(Strategy::Ordered)
            .max_start_wait(Duration::from_secs(60))
            .build(),
    );
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    manager
        .add_ref(stopping_with("silent", Duration::ZERO, || Ok(())))
        .unwrap();
    manager.add_ref(recording(2, &log)).unwrap();
    let ctx = CancellationToken::new();
    let handle = spawn_run(&manager, &ctx);

    sleep(Duration::from_secs(1)).await;
    ctx.cancel();

    assert!(handle.await.unwrap().is_ok());
    assert!(log.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ordered_failure_unwinds_started_components() {
    let manager = Arc::new(Manager::builder().strategy(Strategy::Ordered).build());
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    manager.add_ref(recording(1, &log)).unwrap();
    manager.add_ref(recording(2, &log)).unwrap();
    manager
        .add_ref(ComponentFn::arc("broken", |_ctx, started: StartSignal| async move {
            started.declare_started();
            sleep(Duration::from_secs(1)).await;
            Err(ComponentError::msg("lost connection"))
        }))
        .unwrap();

    let err = spawn_run(&manager, &CancellationToken::new())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, ConductorError::ComponentFailure(_)));
    assert_eq!(
        *log.lock(),
        vec!["start:1", "start:2", "stop:2", "stop:1"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_nested_manager_reports_inner_errors() {
    let inner = Manager::builder().name("inner").build();
    inner
        .add_ref(stopping_with("inner-worker", Duration::from_secs(1), || {
            Err(ComponentError::msg("inner shutdown error"))
        }))
        .unwrap();

    let outer = Arc::new(Manager::builder().name("outer").build());
    outer.add(inner).unwrap();
    outer
        .add_ref(stopping_with("outer-worker", Duration::ZERO, || Ok(())))
        .unwrap();
    let ctx = CancellationToken::new();
    let handle = spawn_run(&outer, &ctx);

    sleep(Duration::from_secs(1)).await;
    ctx.cancel();

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, ConductorError::Shutdown(_)));
    assert_eq!(err.to_string().matches("inner shutdown error").count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_nested_manager_declares_started_for_ordered_parent() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let inner = Manager::builder()
        .name("inner")
        .strategy(Strategy::Ordered)
        .build();
    inner.add_ref(recording(1, &log)).unwrap();
    inner.add_ref(recording(2, &log)).unwrap();

    let outer = Arc::new(
        Manager::builder()
            .strategy(Strategy::Ordered)
            .max_start_wait(Duration::from_secs(600))
            .build(),
    );
    outer.add(inner).unwrap();
    outer.add_ref(recording(3, &log)).unwrap();

    let begin = Instant::now();
    let ctx = CancellationToken::new();
    let handle = spawn_run(&outer, &ctx);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(*log.lock(), vec!["start:1", "start:2", "start:3"]);
    assert!(begin.elapsed() < Duration::from_secs(600));

    ctx.cancel();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_all_groups_components() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let group = all(
        Duration::ZERO,
        vec![recording(1, &log), recording(2, &log)],
    );
    assert_eq!(group.len(), 2);
    assert!(group.grace_period().is_unbounded());
    assert_eq!(group.strategy(), Strategy::Concurrent);

    let outer = Arc::new(Manager::new());
    outer.add(group).unwrap();
    let ctx = CancellationToken::new();
    let handle = spawn_run(&outer, &ctx);

    sleep(Duration::from_secs(1)).await;
    ctx.cancel();
    assert!(handle.await.unwrap().is_ok());

    let log = log.lock();
    assert_eq!(log.len(), 4);
    assert!(log.contains(&"stop:1".to_string()));
    assert!(log.contains(&"stop:2".to_string()));
}

#[tokio::test]
async fn test_all_runs_directly() {
    let group = all(GracePeriod::Unbounded, vec![stopping_with("only", Duration::ZERO, || Ok(()))]);
    let ctx = CancellationToken::new();
    ctx.cancel();
    assert!(group.run(ctx).await.is_ok());
}
