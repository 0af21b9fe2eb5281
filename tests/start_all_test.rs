//! Dependency-ordered bulk operations.
mod common;

use common::{fast_settings, Harness};
use proptest::prelude::*;
use svc_supervisor::{Registry, ServiceDefinition, Supervisor};

fn position(order: &[String], name: &str) -> usize {
    order
        .iter()
        .position(|n| n == name)
        .unwrap_or_else(|| panic!("{} missing from {:?}", name, order))
}

#[tokio::test]
async fn chain_starts_dependencies_first_and_stops_in_reverse() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path())
            .with_service("api", ServiceDefinition::new("./api").with_dependencies(["db", "cache"]))
            .with_service("cache", ServiceDefinition::new("./cache"))
            .with_service("db", ServiceDefinition::new("./db"))
            .with_service("web", ServiceDefinition::new("./web").with_dependencies(["api"]))
    });

    let report = h.supervisor.start_all().await.unwrap();
    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(report.started.len(), 4);

    let spawned = h.processes.spawned();
    assert!(position(&spawned, "db") < position(&spawned, "api"));
    assert!(position(&spawned, "cache") < position(&spawned, "api"));
    assert!(position(&spawned, "api") < position(&spawned, "web"));

    let stopped = h.supervisor.stop_all().await.unwrap();
    assert!(stopped.failed.is_empty());
    assert_eq!(stopped.stopped.len(), 4);
    assert!(position(&stopped.stopped, "web") < position(&stopped.stopped, "api"));
    assert!(position(&stopped.stopped, "api") < position(&stopped.stopped, "db"));
    assert!(h.supervisor.store().list_records().unwrap().is_empty());
}

#[tokio::test]
async fn missing_dependency_fails_only_the_dependent() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path())
            .with_service("b", ServiceDefinition::new("./b").with_dependencies(["a"]))
    });

    let report = h.supervisor.start_all().await.unwrap();
    assert!(report.started.is_empty());
    assert_eq!(report.failed_names(), vec!["b"]);
    assert!(report.failed[0].reason.contains("a"));
    assert!(h.processes.spawned().is_empty());
}

#[tokio::test]
async fn cycle_is_reported_as_failed_while_others_start() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path())
            .with_service("x", ServiceDefinition::new("./x").with_dependencies(["y"]))
            .with_service("y", ServiceDefinition::new("./y").with_dependencies(["x"]))
            .with_service("z", ServiceDefinition::new("./z"))
    });

    let report = h.supervisor.start_all().await.unwrap();
    assert_eq!(report.started, vec!["z".to_string()]);
    let mut failed = report.failed_names();
    failed.sort();
    assert_eq!(failed, vec!["x", "y"]);
}

#[tokio::test]
async fn disabled_and_manual_services_are_left_alone() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path())
            .with_service("off", ServiceDefinition::new("./off").disabled())
            .with_service("tool", ServiceDefinition::new("./tool").manual())
            .with_service("api", ServiceDefinition::new("./api"))
    });

    let report = h.supervisor.start_all().await.unwrap();
    assert_eq!(report.started, vec!["api".to_string()]);
    assert_eq!(report.skipped, vec!["off".to_string()]);
    assert!(report.is_success());
    assert_eq!(h.processes.spawn_count("tool"), 0);
}

#[tokio::test]
async fn launch_failure_blocks_dependents() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path())
            .with_service("db", ServiceDefinition::new("./db"))
            .with_service("api", ServiceDefinition::new("./api").with_dependencies(["db"]))
    });
    h.processes.die_at_launch("db");

    let report = h.supervisor.start_all().await.unwrap();
    let mut failed = report.failed_names();
    failed.sort();
    assert_eq!(failed, vec!["api", "db"]);
    assert_eq!(h.processes.spawn_count("api"), 0);
}

#[tokio::test]
async fn start_all_twice_is_idempotent() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path())
            .with_service("db", ServiceDefinition::new("./db"))
            .with_service("api", ServiceDefinition::new("./api").with_dependencies(["db"]))
    });

    h.supervisor.start_all().await.unwrap();
    let again = h.supervisor.start_all().await.unwrap();
    assert!(again.is_success());
    assert_eq!(h.processes.spawned().len(), 2);
}

#[tokio::test]
async fn stop_all_stops_orphans_first() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path())
            .with_service("api", ServiceDefinition::new("./api"))
            .with_service("legacy", ServiceDefinition::new("./legacy"))
    });
    h.supervisor.start_all().await.unwrap();

    // same state dir, but "legacy" has since been removed from the registry
    let trimmed = Supervisor::builder()
        .registry(Registry::new(h.dir.path()).with_service("api", ServiceDefinition::new("./api")))
        .settings(fast_settings(&h.dir))
        .process_backend(h.processes.clone())
        .health_checker(h.health.clone())
        .port_reservation(h.ports.clone())
        .build()
        .unwrap();

    let report = trimmed.stop_all().await.unwrap();
    assert_eq!(report.stopped, vec!["legacy".to_string(), "api".to_string()]);
}

#[tokio::test]
async fn restart_all_cycles_everything() {
    let h = Harness::new(|dir| {
        Registry::new(dir.path())
            .with_service("db", ServiceDefinition::new("./db"))
            .with_service("api", ServiceDefinition::new("./api").with_dependencies(["db"]))
    });
    h.supervisor.start_all().await.unwrap();

    let report = h.supervisor.restart_all().await.unwrap();
    assert_eq!(report.stop.stopped, vec!["api".to_string(), "db".to_string()]);
    assert_eq!(report.start.started, vec!["db".to_string(), "api".to_string()]);
}

/// Random DAG: service `i` may only depend on services with a lower index.
fn dag_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (2usize..8).prop_flat_map(|n| {
        (0..n)
            .map(|i| proptest::sample::subsequence((0..i).collect::<Vec<_>>(), 0..=i))
            .collect::<Vec<_>>()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn every_service_starts_after_its_dependencies(dag in dag_strategy()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let spawned = runtime.block_on(async {
            let h = Harness::new(|dir| {
                let mut registry = Registry::new(dir.path());
                for (i, deps) in dag.iter().enumerate() {
                    let deps: Vec<String> = deps.iter().map(|d| format!("svc{}", d)).collect();
                    registry = registry.with_service(
                        format!("svc{}", i),
                        ServiceDefinition::new("./run").with_dependencies(deps),
                    );
                }
                registry
            });
            let report = h.supervisor.start_all().await.unwrap();
            assert!(report.is_success());
            h.processes.spawned()
        });

        prop_assert_eq!(spawned.len(), dag.len());
        for (i, deps) in dag.iter().enumerate() {
            let me = position(&spawned, &format!("svc{}", i));
            for d in deps {
                let dep = format!("svc{}", d);
                prop_assert!(position(&spawned, &dep) < me, "{} before svc{}", dep, i);
            }
        }
    }
}
