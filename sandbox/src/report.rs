//! Pure assembly of a run report from per-case measurements.

use arbiter_apis::TestCaseResult;

/// Why a run stopped before checking every test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunFailure {
    /// The solution wrote to stderr.
    ExecutionFailed,
    /// A test case exceeded the per-case deadline.
    ExecutionTimeout,
}

/// Averages over the test cases that actually executed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunMetrics {
    pub avg_time_ms: f64,
    pub avg_memory_kb: f64,
}

/// Outcome of running one submission against its test cases.
#[derive(Debug)]
pub struct RunReport {
    pub all_passed: bool,
    pub failed: Vec<TestCaseResult>,
    pub metrics: RunMetrics,
    /// stderr excerpt when `failure` is `ExecutionFailed`.
    pub error_details: Option<String>,
    pub failure: Option<RunFailure>,
}

/// Wall clock and memory cost of a single executed test case.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CaseSample {
    pub elapsed_ms: f64,
    pub memory_kb: f64,
}

impl RunReport {
    pub(crate) fn from_cases(
        samples: &[CaseSample],
        failed: Vec<TestCaseResult>,
        error_details: Option<String>,
        failure: Option<RunFailure>,
    ) -> RunReport {
        let metrics = RunMetrics {
            avg_time_ms: round2(mean(samples.iter().map(|s| s.elapsed_ms))),
            avg_memory_kb: round2(mean(samples.iter().map(|s| s.memory_kb))),
        };
        RunReport {
            all_passed: failure.is_none() && failed.is_empty(),
            failed,
            metrics,
            error_details,
            failure,
        }
    }
}

/// Outputs are compared after trimming ASCII whitespace on both sides, so a
/// trailing newline never fails a submission.
pub(crate) fn outputs_match(actual: &str, expected: &str) -> bool {
    trim_ascii(actual) == trim_ascii(expected)
}

pub(crate) fn trim_ascii(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_ascii_whitespace())
}

/// Half-away-from-zero rounding to two decimals.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_apis::TestCase;

    fn sample(elapsed_ms: f64, memory_kb: f64) -> CaseSample {
        CaseSample {
            elapsed_ms,
            memory_kb,
        }
    }

    #[test]
    fn trailing_newline_matches() {
        assert!(outputs_match("42\n", "42"));
        assert!(outputs_match("  42  ", "42"));
        assert!(!outputs_match("42", "43"));
    }

    #[test]
    fn comparison_is_not_substring_based() {
        assert!(!outputs_match("420", "42"));
        assert!(!outputs_match("4 2", "42"));
    }

    #[test]
    fn averages_are_two_decimal_means() {
        let samples = [sample(1.0, 100.0), sample(2.0, 200.0), sample(4.0, 100.0)];
        let report = RunReport::from_cases(&samples, Vec::new(), None, None);
        assert_eq!(report.metrics.avg_time_ms, 2.33);
        assert_eq!(report.metrics.avg_memory_kb, 133.33);
        assert!(report.all_passed);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(-0.125), -0.13);
        assert_eq!(round2(1.004), 1.0);
    }

    #[test]
    fn empty_sample_set_yields_zero_metrics() {
        let report = RunReport::from_cases(&[], Vec::new(), None, None);
        assert_eq!(report.metrics, RunMetrics::default());
    }

    #[test]
    fn failed_cases_reject_the_run() {
        let failed = vec![TestCaseResult {
            case: TestCase {
                id: 1,
                input: "1 2\n".to_string(),
                output: "3".to_string(),
            },
            actual_output: "0".to_string(),
        }];
        let report = RunReport::from_cases(&[sample(1.0, 1.0)], failed, None, None);
        assert!(!report.all_passed);
        assert_eq!(report.failed.len(), 1);
    }

    #[test]
    fn a_failure_rejects_even_with_no_mismatches() {
        let report = RunReport::from_cases(
            &[sample(1.0, 1.0)],
            Vec::new(),
            Some("boom".to_string()),
            Some(RunFailure::ExecutionFailed),
        );
        assert!(!report.all_passed);
        assert_eq!(report.failure, Some(RunFailure::ExecutionFailed));
    }
}
