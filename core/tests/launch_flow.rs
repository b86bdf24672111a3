//! End-to-end launch flow tests with real processes
//!
//! These tests run the supervisor against the real Unix process adapter and
//! the real HTTP probe, with a local hyper server standing in for the
//! backend's health endpoint.

#![cfg(unix)]

use devup_core::config::{CommandLine, LaunchConfig, ReadinessConfig};
use devup_core::{
    CoreError, HttpProbe, LaunchOutcome, LaunchPhase, Supervisor, UnixProcessAdapter,
};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Response, Server};
use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Start a hyper server that answers 200 on every path, returning its port
async fn start_health_server() -> u16 {
    let make_svc = make_service_fn(|_conn| async {
        Ok::<_, Infallible>(service_fn(|_req| async {
            Ok::<_, Infallible>(Response::new(Body::from("[]")))
        }))
    });

    let addr = ([127, 0, 0, 1], 0).into();
    let server = Server::bind(&addr).serve(make_svc);
    let port = server.local_addr().port();
    tokio::spawn(async move {
        let _ = server.await;
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    port
}

fn long_running(command: &str) -> CommandLine {
    CommandLine::new("sh", &["-c", command])
}

fn test_config(backend_root: &Path, frontend_root: &Path, health_port: u16) -> LaunchConfig {
    let mut cfg = LaunchConfig::default();
    cfg.toolchains = vec![];
    cfg.backend.root = backend_root.to_path_buf();
    cfg.backend.run = long_running("sleep 30");
    cfg.backend.prepare = Some(CommandLine::new("true", &[]));
    cfg.backend.health_url = format!("http://127.0.0.1:{}/api/v1/pets", health_port);
    cfg.frontend.root = frontend_root.to_path_buf();
    cfg.frontend.run = long_running("sleep 30");
    cfg.readiness = ReadinessConfig {
        settle_secs: 0,
        poll_interval_secs: 0,
        max_attempts: 5,
        timeout_secs: 2,
    };
    cfg
}

fn probe_for(cfg: &LaunchConfig) -> Arc<HttpProbe> {
    Arc::new(HttpProbe::new(
        cfg.backend.health_url.clone(),
        cfg.readiness.timeout(),
    ))
}

#[tokio::test]
async fn full_launch_and_interrupt() {
    let timeout = Duration::from_secs(30);
    tokio::time::timeout(timeout, async {
        let tmp = tempfile::tempdir().expect("tempdir");
        let backend_root = tmp.path().join("backend");
        let frontend_root = tmp.path().join("frontend");
        std::fs::create_dir_all(&backend_root).unwrap();
        std::fs::create_dir_all(frontend_root.join("node_modules")).unwrap();

        let port = start_health_server().await;
        let cfg = test_config(&backend_root, &frontend_root, port);
        let probe = probe_for(&cfg);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sup = Supervisor::new(cfg, Arc::new(UnixProcessAdapter::new()), probe, shutdown_rx);
        let mut phase_rx = sup.subscribe_phase();

        let mut sup = sup;
        let handle = tokio::spawn(async move { sup.run().await });

        phase_rx
            .wait_for(|p| *p == LaunchPhase::Running)
            .await
            .expect("should reach Running");
        shutdown_tx.send(true).unwrap();

        let outcome = handle.await.unwrap().expect("run should succeed");
        assert_eq!(outcome, LaunchOutcome::Interrupted);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn readiness_failure_aborts_and_cleans_up() {
    let timeout = Duration::from_secs(30);
    tokio::time::timeout(timeout, async {
        let tmp = tempfile::tempdir().expect("tempdir");
        let backend_root = tmp.path().join("backend");
        std::fs::create_dir_all(&backend_root).unwrap();

        // Bind-then-drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead_port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut cfg = test_config(&backend_root, &tmp.path().join("no-frontend"), dead_port);
        cfg.readiness.max_attempts = 2;
        let probe = probe_for(&cfg);

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut sup =
            Supervisor::new(cfg, Arc::new(UnixProcessAdapter::new()), probe, shutdown_rx);

        let err = sup.run().await.unwrap_err();
        assert!(matches!(err, CoreError::ReadinessFailed(_)));
        assert_eq!(sup.current_phase(), LaunchPhase::Terminated);
        assert_eq!(sup.owned_processes(), 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn backend_self_exit_is_reported() {
    let timeout = Duration::from_secs(30);
    tokio::time::timeout(timeout, async {
        let tmp = tempfile::tempdir().expect("tempdir");
        let backend_root = tmp.path().join("backend");
        std::fs::create_dir_all(&backend_root).unwrap();

        let port = start_health_server().await;
        let mut cfg = test_config(&backend_root, &tmp.path().join("no-frontend"), port);
        // Backend exits on its own shortly after passing readiness
        cfg.backend.run = long_running("sleep 0.2; exit 5");
        let probe = probe_for(&cfg);

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut sup =
            Supervisor::new(cfg, Arc::new(UnixProcessAdapter::new()), probe, shutdown_rx);

        let outcome = sup.run().await.expect("run should succeed");
        match outcome {
            LaunchOutcome::BackendExited(exit) => assert_eq!(exit.exit_code, Some(5)),
            other => panic!("Expected BackendExited, got {:?}", other),
        }
    })
    .await
    .expect("test timed out");
}
