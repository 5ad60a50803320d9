//! Data contracts of the judge REST API.
//!
//! Everything crossing the HTTP boundary lives here, so the server, the
//! evaluation pipeline and the command-line client agree on one shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Verdict status values.
pub mod status {
    pub const SUCCESS: &str = "success";
    pub const FAILED: &str = "failed";
}

/// Attempt status values as persisted.
pub mod attempt_status {
    pub const ACCEPTED: &str = "accepted";
    pub const REJECTED: &str = "rejected";
}

/// Human-readable verdict messages.
pub mod messages {
    pub const COMPILATION_FAILED: &str = "Code compilation failed";
    pub const EXECUTION_FAILED: &str = "Code execution failed";
    pub const TEST_CASES_FAILED: &str = "Test cases failed";
    pub const ALL_TESTS_PASSED: &str = "All test cases passed!";
}

/// A coding problem as served to clients.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Problem {
    pub id: i32,
    pub uuid: String,
    pub name: String,
    pub difficulty: String,
    pub description: String,
    /// Whether the requesting user has an accepted attempt for this problem.
    pub solved: bool,
    /// Latest accepted solution, present only when `solved` and requested
    /// through the single-problem endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<SolutionRecord>,
}

/// Input/output pair a submission is checked against.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub id: i32,
    pub input: String,
    pub output: String,
}

/// A test case the submission got wrong, with what it printed instead.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TestCaseResult {
    #[serde(flatten)]
    pub case: TestCase,
    pub actual_output: String,
}

/// Code submission body for `POST /api/problem/:uuid`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SubmitRequest {
    pub code: String,
    pub language: String,
}

/// Performance metrics attached to a verdict.
///
/// The comparison fields measure against other users' accepted attempts in
/// the same language. They are only present on accepted verdicts; the
/// `*_beat_percent` figures stay zero when no peers exist.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SolutionDetails {
    pub average_time_ms: f64,
    pub average_memory_kb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_other_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_other_memory_kb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_beat_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_beat_percent: Option<f64>,
}

/// The user-visible outcome of one evaluation.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SubmitResult {
    pub status: String,
    pub message: String,
    /// stderr excerpt for compile/runtime failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_tests: Option<Vec<TestCaseResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<SolutionDetails>,
}

impl SubmitResult {
    pub fn is_success(&self) -> bool {
        self.status == status::SUCCESS
    }
}

/// One persisted attempt, as returned by history and problem endpoints.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SolutionRecord {
    pub language: String,
    pub code: String,
    pub status: String,
    pub average_time_ms: f64,
    pub average_memory_kb: f64,
    pub created_at: DateTime<Utc>,
}

/// Body of `GET /api/solutions`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SolutionsResponse {
    pub solutions: Vec<SolutionRecord>,
}

/// Profile aggregate for `GET /api/profile`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProfileResponse {
    pub user_id: String,
    pub username: String,
    pub role: String,
    /// Consecutive calendar days (ending today or yesterday) with at least
    /// one attempt.
    pub current_streak: u32,
    pub longest_streak: u32,
    /// Accepted / total attempts, percent, two decimals.
    pub success_rate: f64,
    /// Full attempt history, newest first.
    pub solved: Vec<SolutionRecord>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateProblemRequest {
    pub name: String,
    pub difficulty: String,
    pub description: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreatedProblem {
    pub uuid: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateTestcaseRequest {
    pub input: String,
    pub output: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_omits_empty_extras() {
        let verdict = SubmitResult {
            status: status::SUCCESS.to_string(),
            message: messages::ALL_TESTS_PASSED.to_string(),
            error_details: None,
            failed_tests: None,
            details: None,
        };
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "success", "message": "All test cases passed!"})
        );
    }

    #[test]
    fn details_omit_absent_comparison_fields() {
        let details = SolutionDetails {
            average_time_ms: 1.23,
            average_memory_kb: 456.0,
            ..Default::default()
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"average_time_ms": 1.23, "average_memory_kb": 456.0})
        );
    }

    #[test]
    fn failed_test_flattens_case_fields() {
        let row = TestCaseResult {
            case: TestCase {
                id: 7,
                input: "1 2\n".to_string(),
                output: "3".to_string(),
            },
            actual_output: "0".to_string(),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["input"], "1 2\n");
        assert_eq!(json["actual_output"], "0");
    }
}
