//! One hardened Docker container per submission.
//!
//! A [`Sandbox`] owns its container for the lifetime of a single evaluation:
//! it is created locked down (no network, read-only rootfs, dropped
//! capabilities, memory/CPU/pid limits), receives the source over an exec's
//! stdin, compiles when the language calls for it, streams every test case
//! through the run command, and is force-removed on the way out — the
//! [`Drop`] impl covers panics and cancelled callers.

mod exec;
pub mod gate;
mod memory;
mod report;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use arbiter_apis::{TestCase, TestCaseResult};
use arbiter_config::RuntimeConfig;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bollard::container::{Config, CreateContainerOptions, RemoveContainerOptions};
use bollard::models::HostConfig;
use bollard::Docker;
use language_profile::Language;
use uuid::Uuid;

pub use gate::{AdmissionError, AdmissionGate, AdmissionPermit};
pub use report::{RunFailure, RunMetrics, RunReport};

pub(crate) use report::CaseSample;

/// Working directory inside the container; also the tmpfs mount point.
pub const WORKSPACE_DIR: &str = "/workspace";

/// tmpfs backing `/workspace`: writable and executable, 100 MiB.
const WORKSPACE_TMPFS: &str = "rw,exec,nosuid,size=104857600";

#[derive(thiserror::Error, Debug)]
pub enum SandboxError {
    /// The compile step wrote to stderr or exited non-zero.
    #[error("compilation failed")]
    CompilationFailed { stderr: String },
    /// Source injection could not be verified inside the container.
    #[error("sandbox setup failed: {0}")]
    Setup(String),
    #[error("container runtime error")]
    Docker(#[from] bollard::errors::Error),
}

/// Lifecycle of one sandbox, for tracing and misuse checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Compiled,
    Running,
    Done,
    Failed,
    TimedOut,
}

pub struct Sandbox {
    docker: Docker,
    container_id: String,
    language: Language,
    limits: RuntimeConfig,
    state: State,
    disposed: bool,
}

impl Sandbox {
    /// Creates and starts the container, injects the source and compiles it.
    ///
    /// On any error the partially built sandbox is dropped, which schedules
    /// container removal; a [`SandboxError::CompilationFailed`] carries the
    /// compiler's stderr for the verdict.
    #[tracing::instrument(skip(docker, code), fields(language = %language))]
    pub async fn create(
        docker: Docker,
        limits: RuntimeConfig,
        language: Language,
        code: &[u8],
    ) -> Result<Sandbox, SandboxError> {
        let name = format!("judge-{}", Uuid::new_v4());
        let memory_bytes = limits.memory_limit_mb * 1024 * 1024;
        let host_config = HostConfig {
            memory: Some(memory_bytes),
            // Swap equal to memory disables swapping.
            memory_swap: Some(memory_bytes),
            nano_cpus: Some(limits.cpu_limit * 1_000_000_000),
            pids_limit: Some(limits.process_limit),
            cap_drop: Some(vec!["ALL".to_string()]),
            cap_add: Some(vec!["DAC_OVERRIDE".to_string()]),
            readonly_rootfs: Some(true),
            auto_remove: Some(true),
            network_mode: Some("none".to_string()),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            tmpfs: Some(HashMap::from([(
                WORKSPACE_DIR.to_string(),
                WORKSPACE_TMPFS.to_string(),
            )])),
            ..Default::default()
        };
        let config = Config {
            image: Some(language.image().to_string()),
            // A long-lived no-op entrypoint; execs drive the workload.
            entrypoint: Some(vec![
                "tail".to_string(),
                "-f".to_string(),
                "/dev/null".to_string(),
            ]),
            working_dir: Some(WORKSPACE_DIR.to_string()),
            tty: Some(false),
            network_disabled: Some(true),
            host_config: Some(host_config),
            ..Default::default()
        };

        let created = docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.as_str(),
                    platform: None,
                }),
                config,
            )
            .await?;
        docker.start_container::<String>(&created.id, None).await?;
        tracing::debug!(container = %created.id, "sandbox container started");

        let mut sandbox = Sandbox {
            docker,
            container_id: created.id,
            language,
            limits,
            state: State::Created,
            disposed: false,
        };
        sandbox.inject_source(code).await?;
        sandbox.compile().await?;
        Ok(sandbox)
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Writes the source into `/workspace` by piping its base64 encoding
    /// through `base64 -d`, then verifies the file is there and readable.
    async fn inject_source(&self, code: &[u8]) -> Result<(), SandboxError> {
        let filename = self.language.source_filename();
        let encoded = BASE64.encode(code);
        let write = exec::run(
            &self.docker,
            &self.container_id,
            &format!("base64 -d > {}/{}", WORKSPACE_DIR, filename),
            Some(encoded.as_bytes()),
        )
        .await?;
        if !write.stderr.is_empty() {
            return Err(SandboxError::Setup(format!(
                "source write failed: {}",
                write.stderr.trim()
            )));
        }
        let verify = exec::run(
            &self.docker,
            &self.container_id,
            &format!("ls {dir}/{file} && cat {dir}/{file}", dir = WORKSPACE_DIR, file = filename),
            None,
        )
        .await?;
        if !verify.stderr.is_empty() {
            return Err(SandboxError::Setup(format!(
                "source verification failed: {}",
                verify.stderr.trim()
            )));
        }
        Ok(())
    }

    async fn compile(&mut self) -> Result<(), SandboxError> {
        let Some(command) = self.language.compile_command() else {
            self.state = State::Compiled;
            return Ok(());
        };
        tracing::debug!(container = %self.container_id, "compiling");
        let out = exec::run(&self.docker, &self.container_id, command, None).await?;
        if !out.stderr.is_empty() || out.exit_code.unwrap_or(0) != 0 {
            self.state = State::Failed;
            let stderr = if out.stderr.is_empty() {
                out.stdout
            } else {
                out.stderr
            };
            return Err(SandboxError::CompilationFailed { stderr });
        }
        self.state = State::Compiled;
        Ok(())
    }

    /// Runs every test case in order, stopping at the first stderr or
    /// per-case timeout. Always reports averages over the cases that
    /// executed.
    #[tracing::instrument(skip(self, cases), fields(container = %self.container_id, cases = cases.len()))]
    pub async fn run(&mut self, cases: &[TestCase]) -> Result<RunReport, SandboxError> {
        debug_assert_eq!(self.state, State::Compiled, "run called before compile");
        self.state = State::Running;

        let deadline = Duration::from_millis(self.limits.execution_time_ms);
        let mut samples: Vec<CaseSample> = Vec::with_capacity(cases.len());
        let mut failed: Vec<TestCaseResult> = Vec::new();

        for case in cases {
            let baseline = memory::baseline(&self.docker, &self.container_id).await;
            memory::reset_peak(&self.docker, &self.container_id).await;

            let started = Instant::now();
            let exec_id = exec::create(
                &self.docker,
                &self.container_id,
                self.language.run_command(),
                true,
            )
            .await?;
            let collect =
                exec::attach_and_collect(&self.docker, &exec_id, Some(case.input.as_bytes()));
            let output = match tokio::time::timeout(deadline, collect).await {
                Ok(result) => result?,
                Err(_) => {
                    samples.push(CaseSample {
                        elapsed_ms: elapsed_ms(started),
                        memory_kb: self.case_memory_kb(baseline).await,
                    });
                    tracing::info!(case = case.id, "test case exceeded the deadline");
                    self.kill_runaway(&exec_id).await;
                    self.state = State::TimedOut;
                    return Ok(RunReport::from_cases(
                        &samples,
                        failed,
                        None,
                        Some(RunFailure::ExecutionTimeout),
                    ));
                }
            };
            samples.push(CaseSample {
                elapsed_ms: elapsed_ms(started),
                memory_kb: self.case_memory_kb(baseline).await,
            });

            if !output.stderr.is_empty() {
                tracing::info!(case = case.id, "solution wrote to stderr");
                self.state = State::Failed;
                return Ok(RunReport::from_cases(
                    &samples,
                    failed,
                    Some(output.stderr),
                    Some(RunFailure::ExecutionFailed),
                ));
            }
            if !report::outputs_match(&output.stdout, &case.output) {
                failed.push(TestCaseResult {
                    case: case.clone(),
                    actual_output: report::trim_ascii(&output.stdout).to_string(),
                });
            }
        }

        self.state = State::Done;
        Ok(RunReport::from_cases(&samples, failed, None, None))
    }

    /// Peak-minus-baseline in KB. When the peak counter was reset between
    /// samples the difference goes negative; report the raw peak instead.
    async fn case_memory_kb(&self, baseline: u64) -> f64 {
        let peak = memory::peak(&self.docker, &self.container_id).await;
        let bytes = if peak >= baseline {
            peak - baseline
        } else {
            peak
        };
        bytes as f64 / 1024.0
    }

    /// Kills the timed-out exec's process, then sweeps any orphaned children
    /// it may have forked. Every step is best effort.
    async fn kill_runaway(&self, exec_id: &str) {
        match self.docker.inspect_exec(exec_id).await {
            Ok(inspect) => {
                if let Some(pid) = inspect.pid {
                    let _ = exec::run(
                        &self.docker,
                        &self.container_id,
                        &format!("kill -9 {}", pid),
                        None,
                    )
                    .await;
                }
            }
            Err(err) => {
                tracing::warn!(container = %self.container_id, error = %err, "exec inspect failed during kill");
            }
        }
        let _ = exec::run(&self.docker, &self.container_id, "pkill -9 -f solution", None).await;
    }

    /// Force-removes the container. Removal failures are logged, never
    /// propagated.
    pub async fn dispose(mut self) {
        self.disposed = true;
        remove_container(self.docker.clone(), self.container_id.clone()).await;
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if self.disposed {
            return;
        }
        // Reached on panics and cancelled callers; removal has to outlive
        // this task.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let docker = self.docker.clone();
            let container_id = self.container_id.clone();
            handle.spawn(async move {
                remove_container(docker, container_id).await;
            });
        } else {
            tracing::warn!(container = %self.container_id, "no runtime to remove sandbox container");
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_micros() as f64 / 1000.0
}

async fn remove_container(docker: Docker, container_id: String) {
    let options = RemoveContainerOptions {
        force: true,
        ..Default::default()
    };
    if let Err(err) = docker.remove_container(&container_id, Some(options)).await {
        tracing::warn!(container = %container_id, error = %err, "failed to remove sandbox container");
    } else {
        tracing::debug!(container = %container_id, "sandbox container removed");
    }
}
