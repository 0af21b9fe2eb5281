//! Control socket, remote/local controller and the monitor's exclusivity.
mod common;

use common::Harness;
use std::time::Duration;
use svc_supervisor::control::{ControlClient, ControlRequest, ControlResponse, ControlServer, Controller};
use svc_supervisor::daemon::{run_monitor, MonitorGuard};
use svc_supervisor::supervisor::{StartOutcome, StopOutcome};
use svc_supervisor::{Error, Registry, ServiceDefinition, StateStore, SupervisorActor};
use tokio_util::sync::CancellationToken;

fn api_registry(dir: &tempfile::TempDir) -> Registry {
    Registry::new(dir.path()).with_service("api", ServiceDefinition::new("./api"))
}

#[tokio::test]
async fn requests_round_trip_over_the_socket() {
    let h = Harness::new(api_registry);
    let socket = h.dir.path().join("ctl.sock");
    let processes = h.processes.clone();
    let (handle, _task) = SupervisorActor::spawn(h.supervisor).unwrap();

    let server = ControlServer::bind(&socket, handle).unwrap();
    let cancel = CancellationToken::new();
    let server_task = tokio::spawn(server.serve(cancel.clone()));

    let mut client = ControlClient::connect(&socket).await.unwrap().unwrap();
    assert_eq!(
        client.request(ControlRequest::Ping).await.unwrap(),
        ControlResponse::Pong {
            pid: std::process::id()
        }
    );

    let started = client
        .request(ControlRequest::Start {
            name: "api".to_string(),
        })
        .await
        .unwrap();
    assert!(matches!(started, ControlResponse::Start(StartOutcome::Started { .. })));
    assert_eq!(processes.spawn_count("api"), 1);

    let err = client
        .request(ControlRequest::Start {
            name: "ghost".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ServiceNotFound(name) if name == "ghost"));

    cancel.cancel();
    server_task.await.unwrap();
    assert!(!socket.exists());
}

#[tokio::test]
async fn missing_socket_means_no_monitor() {
    let dir = tempfile::tempdir().unwrap();
    let client = ControlClient::connect(&dir.path().join("none.sock")).await.unwrap();
    assert!(client.is_none());
}

#[tokio::test]
async fn controller_falls_back_to_a_local_supervisor() {
    let h = Harness::new(api_registry);
    let socket = h.dir.path().join("absent.sock");
    let processes = h.processes.clone();
    let supervisor = h.supervisor;

    let mut controller = Controller::connect(&socket, move || Ok(supervisor))
        .await
        .unwrap();
    assert!(!controller.is_remote());

    assert!(controller.start("api").await.unwrap().is_running());
    assert!(matches!(
        controller.stop("api", false).await.unwrap(),
        StopOutcome::Stopped { .. }
    ));
    assert_eq!(processes.spawn_count("api"), 1);
}

#[tokio::test]
async fn controller_prefers_a_listening_monitor() {
    let h = Harness::new(api_registry);
    let socket = h.dir.path().join("ctl.sock");
    let processes = h.processes.clone();
    let (handle, _task) = SupervisorActor::spawn(h.supervisor).unwrap();
    let server = ControlServer::bind(&socket, handle).unwrap();
    let cancel = CancellationToken::new();
    tokio::spawn(server.serve(cancel.clone()));

    let mut controller = Controller::connect(&socket, || {
        Err(Error::Config("local supervisor should not be built".to_string()))
    })
    .await
    .unwrap();
    assert!(controller.is_remote());

    let report = controller.start_all().await.unwrap();
    assert_eq!(report.started, vec!["api".to_string()]);
    let statuses = controller.status(Some("api")).await.unwrap();
    assert!(statuses[0].pid.is_some());
    assert_eq!(processes.spawn_count("api"), 1);

    cancel.cancel();
}

#[tokio::test]
async fn second_monitor_guard_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path().join("state")).unwrap();

    let first = MonitorGuard::acquire(&store).unwrap();
    let second = MonitorGuard::acquire(&store).unwrap_err();
    assert!(matches!(second, Error::MonitorAlreadyRunning { pid } if pid == std::process::id()));

    drop(first);
    assert!(store.read_monitor().unwrap().is_none());
    MonitorGuard::acquire(&store).unwrap();
}

#[tokio::test]
async fn monitor_serves_the_socket_until_shutdown() {
    let h = Harness::new(api_registry);
    let store = h.supervisor.store().clone();
    let socket = store.socket_path();
    let shutdown = CancellationToken::new();
    let monitor = tokio::spawn(run_monitor(h.supervisor, shutdown.clone()));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !socket.exists() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let mut client = ControlClient::connect(&socket).await.unwrap().unwrap();
    assert!(matches!(
        client.request(ControlRequest::Ping).await.unwrap(),
        ControlResponse::Pong { .. }
    ));
    assert!(store.read_monitor().unwrap().is_some());

    shutdown.cancel();
    monitor.await.unwrap().unwrap();
    assert!(!socket.exists());
    assert!(store.read_monitor().unwrap().is_none());
}
