//! The evaluation pipeline: one call per submission, from problem lookup to
//! persisted attempt and verdict.

mod verdict;

use arbiter_apis::{SubmitRequest, SubmitResult};
use arbiter_config::RuntimeConfig;
use bollard::Docker;
use chrono::Utc;
use language_profile::{Language, UnsupportedLanguage};
use sandbox::{AdmissionError, AdmissionGate, Sandbox, SandboxError};
use store::{NewAttempt, Store, StoreError};

/// Failures that end an evaluation before it produces a verdict. Everything
/// verdict-shaped (compile errors, wrong answers, timeouts) comes back as a
/// successful [`SubmitResult`] instead.
#[derive(thiserror::Error, Debug)]
pub enum EvaluateError {
    #[error("problem not found")]
    ProblemNotFound,
    #[error("test cases not found")]
    TestCasesNotFound,
    #[error(transparent)]
    UnsupportedLanguage(#[from] UnsupportedLanguage),
    #[error("server is busy, try again later")]
    ServerBusy,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for EvaluateError {
    fn from(err: StoreError) -> EvaluateError {
        match err {
            StoreError::ProblemNotFound => EvaluateError::ProblemNotFound,
            StoreError::TestCasesNotFound => EvaluateError::TestCasesNotFound,
            other => EvaluateError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<AdmissionError> for EvaluateError {
    fn from(err: AdmissionError) -> EvaluateError {
        match err {
            AdmissionError::ServerBusy => EvaluateError::ServerBusy,
        }
    }
}

/// Evaluates submissions. Cheap to clone; clones share the admission gate.
#[derive(Clone)]
pub struct Evaluator {
    store: Store,
    docker: Docker,
    gate: AdmissionGate,
    runtime: RuntimeConfig,
}

impl Evaluator {
    pub fn new(store: Store, docker: Docker, runtime: RuntimeConfig) -> Evaluator {
        Evaluator::with_gate(store, docker, runtime, AdmissionGate::default())
    }

    pub fn with_gate(
        store: Store,
        docker: Docker,
        runtime: RuntimeConfig,
        gate: AdmissionGate,
    ) -> Evaluator {
        Evaluator {
            store,
            docker,
            gate,
            runtime,
        }
    }

    /// Runs one submission end to end.
    ///
    /// An attempt row is written for every run that completed (accepted or
    /// rejected, including runtime failures and timeouts); compile failures
    /// write nothing since there are no meaningful metrics.
    #[tracing::instrument(skip(self, req), fields(problem = problem_uuid, user = user_id, language = %req.language))]
    pub async fn evaluate(
        &self,
        problem_uuid: &str,
        req: &SubmitRequest,
        user_id: &str,
    ) -> Result<SubmitResult, EvaluateError> {
        let language: Language = req.language.parse()?;
        let problem = self.store.get_problem(problem_uuid, user_id).await?;
        let cases = self.store.get_test_cases(&problem.uuid).await?;

        let _permit = self.gate.admit().await?;

        tracing::info!("preparing sandbox");
        let mut sandbox = match Sandbox::create(
            self.docker.clone(),
            self.runtime,
            language,
            req.code.as_bytes(),
        )
        .await
        {
            Ok(sandbox) => sandbox,
            Err(SandboxError::CompilationFailed { stderr }) => {
                tracing::info!("compilation failed");
                return Ok(verdict::compilation_failed(stderr));
            }
            Err(err) => return Err(EvaluateError::Internal(err.into())),
        };

        tracing::info!(container = sandbox.container_id(), "running test cases");
        let outcome = sandbox.run(&cases).await;
        sandbox.dispose().await;
        let report = outcome.map_err(anyhow::Error::from)?;

        let attempt = NewAttempt {
            code: req.code.clone(),
            language: language.as_str().to_string(),
            average_time_ms: report.metrics.avg_time_ms,
            average_memory_kb: report.metrics.avg_memory_kb,
            created_at: Utc::now(),
            accepted: report.all_passed,
        };
        self.store
            .save_attempt(user_id, &problem.uuid, &attempt)
            .await?;

        let statistics = if report.all_passed {
            Some(
                self.store
                    .solution_statistics(
                        &problem.uuid,
                        user_id,
                        language.as_str(),
                        report.metrics.avg_time_ms,
                        report.metrics.avg_memory_kb,
                    )
                    .await?,
            )
        } else {
            None
        };

        Ok(verdict::build(&report, statistics))
    }
}
