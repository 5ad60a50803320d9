//! Pure mapping from a sandbox outcome to the external verdict shape.

use arbiter_apis::{messages, status, SolutionDetails, SubmitResult};
use sandbox::{RunFailure, RunMetrics, RunReport};
use store::SolutionStatistics;

pub(crate) fn compilation_failed(stderr: String) -> SubmitResult {
    SubmitResult {
        status: status::FAILED.to_string(),
        message: messages::COMPILATION_FAILED.to_string(),
        error_details: Some(stderr),
        failed_tests: None,
        details: None,
    }
}

pub(crate) fn build(report: &RunReport, statistics: Option<SolutionStatistics>) -> SubmitResult {
    match report.failure {
        Some(RunFailure::ExecutionFailed) => SubmitResult {
            status: status::FAILED.to_string(),
            message: messages::EXECUTION_FAILED.to_string(),
            error_details: report.error_details.clone(),
            failed_tests: None,
            details: None,
        },
        Some(RunFailure::ExecutionTimeout) => SubmitResult {
            status: status::FAILED.to_string(),
            message: messages::EXECUTION_FAILED.to_string(),
            error_details: Some("timeout".to_string()),
            failed_tests: None,
            details: None,
        },
        None if !report.all_passed => SubmitResult {
            status: status::FAILED.to_string(),
            message: messages::TEST_CASES_FAILED.to_string(),
            error_details: None,
            failed_tests: Some(report.failed.clone()),
            details: Some(details(report.metrics, None)),
        },
        None => SubmitResult {
            status: status::SUCCESS.to_string(),
            message: messages::ALL_TESTS_PASSED.to_string(),
            error_details: None,
            failed_tests: None,
            details: Some(details(report.metrics, statistics)),
        },
    }
}

fn details(metrics: RunMetrics, statistics: Option<SolutionStatistics>) -> SolutionDetails {
    SolutionDetails {
        average_time_ms: metrics.avg_time_ms,
        average_memory_kb: metrics.avg_memory_kb,
        avg_other_time_ms: statistics.map(|s| s.avg_other_time_ms),
        avg_other_memory_kb: statistics.map(|s| s.avg_other_memory_kb),
        time_beat_percent: statistics.map(|s| s.time_beat_percent),
        memory_beat_percent: statistics.map(|s| s.memory_beat_percent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_apis::{TestCase, TestCaseResult};

    fn report(
        all_passed: bool,
        failed: Vec<TestCaseResult>,
        error_details: Option<String>,
        failure: Option<RunFailure>,
    ) -> RunReport {
        RunReport {
            all_passed,
            failed,
            metrics: RunMetrics {
                avg_time_ms: 12.34,
                avg_memory_kb: 567.89,
            },
            error_details,
            failure,
        }
    }

    fn wrong_case() -> TestCaseResult {
        TestCaseResult {
            case: TestCase {
                id: 1,
                input: "1 2\n".to_string(),
                output: "3".to_string(),
            },
            actual_output: "0".to_string(),
        }
    }

    #[test]
    fn compilation_failure_carries_stderr() {
        let verdict = compilation_failed("solution.cpp:1: error".to_string());
        assert_eq!(verdict.status, status::FAILED);
        assert_eq!(verdict.message, messages::COMPILATION_FAILED);
        assert_eq!(verdict.error_details.as_deref(), Some("solution.cpp:1: error"));
        assert!(verdict.failed_tests.is_none());
        assert!(verdict.details.is_none());
    }

    #[test]
    fn execution_failure_carries_stderr() {
        let verdict = build(
            &report(
                false,
                Vec::new(),
                Some("Traceback".to_string()),
                Some(RunFailure::ExecutionFailed),
            ),
            None,
        );
        assert_eq!(verdict.message, messages::EXECUTION_FAILED);
        assert_eq!(verdict.error_details.as_deref(), Some("Traceback"));
    }

    #[test]
    fn timeout_reads_as_execution_failure() {
        let verdict = build(
            &report(false, Vec::new(), None, Some(RunFailure::ExecutionTimeout)),
            None,
        );
        assert_eq!(verdict.status, status::FAILED);
        assert_eq!(verdict.message, messages::EXECUTION_FAILED);
        assert_eq!(verdict.error_details.as_deref(), Some("timeout"));
    }

    #[test]
    fn wrong_answers_list_the_failed_cases() {
        let verdict = build(&report(false, vec![wrong_case()], None, None), None);
        assert_eq!(verdict.message, messages::TEST_CASES_FAILED);
        let failed = verdict.failed_tests.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].actual_output, "0");
        let details = verdict.details.unwrap();
        assert_eq!(details.average_time_ms, 12.34);
        assert!(details.avg_other_time_ms.is_none());
        assert!(details.time_beat_percent.is_none());
        assert!(details.memory_beat_percent.is_none());
    }

    #[test]
    fn success_includes_percentiles() {
        let stats = SolutionStatistics {
            avg_other_time_ms: 20.0,
            avg_other_memory_kb: 800.0,
            time_beat_percent: 75.0,
            memory_beat_percent: 50.0,
        };
        let verdict = build(&report(true, Vec::new(), None, None), Some(stats));
        assert_eq!(verdict.status, status::SUCCESS);
        assert_eq!(verdict.message, messages::ALL_TESTS_PASSED);
        assert!(verdict.failed_tests.is_none());
        let details = verdict.details.unwrap();
        assert_eq!(details.average_time_ms, 12.34);
        assert_eq!(details.avg_other_time_ms, Some(20.0));
        assert_eq!(details.time_beat_percent, Some(75.0));
        assert_eq!(details.memory_beat_percent, Some(50.0));
    }
}
