//! End-to-end sandbox checks against a live Docker daemon.
//!
//! These are ignored by default: they need a reachable Docker socket and the
//! `python:3.9` image already pulled. Run with
//! `cargo test -p sandbox -- --ignored`.

use std::time::{Duration, Instant};

use arbiter_apis::TestCase;
use arbiter_config::RuntimeConfig;
use bollard::Docker;
use language_profile::Language;
use sandbox::{RunFailure, Sandbox};

fn runtime() -> RuntimeConfig {
    RuntimeConfig {
        execution_time_ms: 1000,
        ..Default::default()
    }
}

async fn docker() -> Docker {
    Docker::connect_with_local_defaults()
        .expect("docker socket")
        .negotiate_version()
        .await
        .expect("docker api version")
}

fn addition_case() -> TestCase {
    TestCase {
        id: 1,
        input: "1 2\n".to_string(),
        output: "3".to_string(),
    }
}

#[tokio::test]
#[ignore = "requires a local Docker daemon with the python:3.9 image"]
async fn python_addition_passes() {
    let code = b"a,b=map(int,input().split()); print(a+b)";
    let mut sandbox = Sandbox::create(docker().await, runtime(), Language::Python, code)
        .await
        .unwrap();
    let report = sandbox.run(&[addition_case()]).await.unwrap();
    sandbox.dispose().await;

    assert!(report.all_passed);
    assert!(report.failed.is_empty());
    assert!(report.metrics.avg_time_ms > 0.0);
}

#[tokio::test]
#[ignore = "requires a local Docker daemon with the python:3.9 image"]
async fn wrong_answer_reports_actual_output() {
    let mut sandbox = Sandbox::create(docker().await, runtime(), Language::Python, b"print(0)")
        .await
        .unwrap();
    let report = sandbox.run(&[addition_case()]).await.unwrap();
    sandbox.dispose().await;

    assert!(!report.all_passed);
    assert_eq!(report.failure, None);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].actual_output, "0");
}

#[tokio::test]
#[ignore = "requires a local Docker daemon with the python:3.9 image"]
async fn stderr_aborts_the_run() {
    let code = b"raise SystemExit(1)";
    let mut sandbox = Sandbox::create(docker().await, runtime(), Language::Python, code)
        .await
        .unwrap();
    let cases = [addition_case(), addition_case()];
    let report = sandbox.run(&cases).await.unwrap();
    sandbox.dispose().await;

    assert_eq!(report.failure, Some(RunFailure::ExecutionFailed));
    assert!(report.error_details.is_some());
}

#[tokio::test]
#[ignore = "requires a local Docker daemon with the python:3.9 image"]
async fn runaway_solution_times_out_within_grace() {
    let code = b"while True: pass";
    let mut sandbox = Sandbox::create(docker().await, runtime(), Language::Python, code)
        .await
        .unwrap();
    let started = Instant::now();
    let report = sandbox.run(&[addition_case()]).await.unwrap();
    let elapsed = started.elapsed();
    sandbox.dispose().await;

    assert_eq!(report.failure, Some(RunFailure::ExecutionTimeout));
    assert!(
        elapsed < Duration::from_secs(4),
        "timeout took {:?}, expected deadline + grace",
        elapsed
    );
}
