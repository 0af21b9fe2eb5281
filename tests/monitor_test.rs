//! Health monitoring through the supervisor actor.
mod common;

use common::{quick_check, Harness};
use std::time::Duration;
use svc_supervisor::config::{RestartMode, RestartPolicy};
use svc_supervisor::supervisor::{
    run_monitor_loop, MonitorAction, MonitorOptions, ProbeResult, StartOutcome,
};
use svc_supervisor::{Registry, ServiceDefinition, SupervisorActor};
use tokio_util::sync::CancellationToken;

const URL: &str = "http://127.0.0.1:9/health";

fn checked(mode: RestartMode) -> ServiceDefinition {
    let mut policy = RestartPolicy::with_mode(mode);
    policy.retry_delay_seconds = 0;
    ServiceDefinition::new("./api")
        .with_health_check(quick_check(URL))
        .with_restart_policy(policy)
}

fn current_pid(h: &Harness) -> u32 {
    h.supervisor
        .store()
        .read_record("api")
        .unwrap()
        .map(|r| r.pid)
        .unwrap_or(0)
}

#[tokio::test]
async fn restart_happens_on_the_threshold_failure_and_resets_the_counter() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path()).with_service("api", checked(RestartMode::OnFailure))
    });
    let processes = h.processes.clone();
    let health = h.health.clone();
    let store = h.supervisor.store().clone();
    let (handle, _task) = SupervisorActor::spawn(h.supervisor).unwrap();

    assert!(handle.start("api").await.unwrap().is_running());
    health.set(URL, false);

    assert_eq!(
        handle.supervise("api").await.unwrap(),
        MonitorAction::RecordFailure { failures: 1 }
    );
    assert_eq!(
        handle.supervise("api").await.unwrap(),
        MonitorAction::RecordFailure { failures: 2 }
    );
    assert_eq!(store.failure_count("api"), 2);
    assert_eq!(processes.spawn_count("api"), 1);

    assert_eq!(handle.supervise("api").await.unwrap(), MonitorAction::Restart);
    assert_eq!(processes.spawn_count("api"), 2);
    assert_eq!(store.failure_count("api"), 0);
}

#[tokio::test]
async fn never_policy_counts_failures_without_restarting() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path()).with_service("api", checked(RestartMode::Never))
    });
    let processes = h.processes.clone();
    let health = h.health.clone();
    let (handle, _task) = SupervisorActor::spawn(h.supervisor).unwrap();

    handle.start("api").await.unwrap();
    health.set(URL, false);
    for expected in 1..=5 {
        assert_eq!(
            handle.supervise("api").await.unwrap(),
            MonitorAction::RecordFailure { failures: expected }
        );
    }
    assert_eq!(processes.spawn_count("api"), 1);
}

#[tokio::test]
async fn recovery_clears_the_counter() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path()).with_service("api", checked(RestartMode::Always))
    });
    let health = h.health.clone();
    let store = h.supervisor.store().clone();
    let (handle, _task) = SupervisorActor::spawn(h.supervisor).unwrap();

    handle.start("api").await.unwrap();
    health.set(URL, false);
    handle.supervise("api").await.unwrap();
    assert_eq!(store.failure_count("api"), 1);

    health.set(URL, true);
    assert_eq!(handle.supervise("api").await.unwrap(), MonitorAction::Reset);
    assert_eq!(store.failure_count("api"), 0);
}

#[tokio::test]
async fn crash_under_never_is_left_stopped_and_untracked() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path()).with_service("api", checked(RestartMode::Never))
    });
    let processes = h.processes.clone();
    let store = h.supervisor.store().clone();
    let (handle, _task) = SupervisorActor::spawn(h.supervisor).unwrap();

    let StartOutcome::Started { pid, .. } = handle.start("api").await.unwrap() else {
        panic!("start failed");
    };
    processes.crash(pid);

    assert_eq!(handle.supervise("api").await.unwrap(), MonitorAction::LeaveStopped);
    assert!(store.read_record("api").unwrap().is_none());
    assert!(handle.tracked().await.unwrap().is_empty());
}

#[tokio::test]
async fn crash_under_always_is_relaunched() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path()).with_service("api", checked(RestartMode::Always))
    });
    let processes = h.processes.clone();
    let (handle, _task) = SupervisorActor::spawn(h.supervisor).unwrap();

    let StartOutcome::Started { pid, .. } = handle.start("api").await.unwrap() else {
        panic!("start failed");
    };
    processes.crash(pid);

    assert!(matches!(
        handle.supervise("api").await.unwrap(),
        MonitorAction::Relaunch { .. }
    ));
    let outcome = handle.relaunch("api").await.unwrap();
    assert!(matches!(outcome, Some(StartOutcome::Started { .. })));
    assert_eq!(processes.spawn_count("api"), 2);
}

#[tokio::test]
async fn relaunch_is_skipped_once_the_service_was_stopped() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path()).with_service("api", checked(RestartMode::Always))
    });
    let (handle, _task) = SupervisorActor::spawn(h.supervisor).unwrap();

    handle.start("api").await.unwrap();
    handle.stop("api", false).await.unwrap();
    assert_eq!(handle.relaunch("api").await.unwrap(), None);
}

#[tokio::test]
async fn handle_reports_health_of_a_crashed_service_as_unhealthy() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path()).with_service("api", checked(RestartMode::Never))
    });
    h.supervisor.start("api").await.unwrap();
    let pid = current_pid(&h);
    let processes = h.processes.clone();
    let health = h.health.clone();
    let (handle, _task) = SupervisorActor::spawn(h.supervisor).unwrap();

    health.set(URL, true);
    assert_eq!(handle.probe("api").await.unwrap(), ProbeResult::Healthy);

    processes.crash(pid);
    let calls = health.calls();
    assert_eq!(handle.probe("api").await.unwrap(), ProbeResult::Unhealthy);
    assert_eq!(health.calls(), calls);
}

#[tokio::test]
async fn concurrent_starts_spawn_once() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path()).with_service("api", ServiceDefinition::new("./api"))
    });
    let processes = h.processes.clone();
    let (handle, _task) = SupervisorActor::spawn(h.supervisor).unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let handle = handle.clone();
            tokio::spawn(async move { handle.start("api").await })
        })
        .collect();

    let mut started = 0;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            StartOutcome::Started { .. } => started += 1,
            StartOutcome::AlreadyRunning { .. } => {}
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    assert_eq!(started, 1);
    assert_eq!(processes.spawn_count("api"), 1);
}

#[tokio::test]
async fn monitor_loop_relaunches_a_crashed_service() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path()).with_service("api", checked(RestartMode::Always))
    });
    let processes = h.processes.clone();
    let (handle, _task) = SupervisorActor::spawn(h.supervisor).unwrap();

    let StartOutcome::Started { pid, .. } = handle.start("api").await.unwrap() else {
        panic!("start failed");
    };
    processes.crash(pid);

    let cancel = CancellationToken::new();
    let mut options = MonitorOptions::new(Duration::from_millis(20));
    options.jitter = Duration::ZERO;
    let monitor = tokio::spawn(run_monitor_loop(handle.clone(), options, cancel.clone()));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while processes.spawn_count("api") < 2 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cancel.cancel();
    monitor.await.unwrap();

    assert_eq!(processes.spawn_count("api"), 2);
}

#[tokio::test]
async fn actor_tracks_services_recorded_before_it_started() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path()).with_service("api", checked(RestartMode::Always))
    });
    h.supervisor.start("api").await.unwrap();
    let pid = current_pid(&h);
    assert_ne!(pid, 0);

    let (handle, _task) = SupervisorActor::spawn(h.supervisor).unwrap();
    assert_eq!(handle.tracked().await.unwrap(), vec!["api".to_string()]);
}
