//! Statistics read models: comparative percentiles for verdict enrichment
//! and the profile aggregates (streaks, success rate, history).

use arbiter_apis::SolutionRecord;
use chrono::NaiveDate;

use crate::{SolutionRow, Store, StoreError};

/// How a fresh accepted attempt compares to other users' accepted attempts
/// on the same problem in the same language.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolutionStatistics {
    pub avg_other_time_ms: f64,
    pub avg_other_memory_kb: f64,
    pub time_beat_percent: f64,
    pub memory_beat_percent: f64,
}

impl Store {
    /// Computes the peer averages and beat-percentages for one attempt.
    ///
    /// Peers are accepted attempts with `user_id != user_id` on the same
    /// `(problem, language)`. With no peers, averages fall back to the
    /// user's own figures and both percentages are zero.
    #[tracing::instrument(skip(self))]
    pub async fn solution_statistics(
        &self,
        problem_uuid: &str,
        user_id: &str,
        language: &str,
        user_time_ms: f64,
        user_memory_kb: f64,
    ) -> Result<SolutionStatistics, StoreError> {
        let (avg_time, avg_memory): (Option<f64>, Option<f64>) = sqlx::query_as(
            r#"
            SELECT AVG(execution_time_ms), AVG(memory_usage_kb)
            FROM solutions
            WHERE problem_uuid = $1
              AND status = 'accepted'
              AND user_id != $2
              AND language = $3
            "#,
        )
        .bind(problem_uuid)
        .bind(user_id)
        .bind(language)
        .fetch_one(self.pool())
        .await?;

        let time_beat_percent: f64 = sqlx::query_scalar(
            r#"
            SELECT CASE
                WHEN COUNT(*) = 0 THEN 0::float
                ELSE (COUNT(*) FILTER (WHERE execution_time_ms > $1)::float
                      / COUNT(*)::float) * 100
            END
            FROM solutions
            WHERE problem_uuid = $2
              AND status = 'accepted'
              AND user_id != $3
              AND language = $4
            "#,
        )
        .bind(user_time_ms)
        .bind(problem_uuid)
        .bind(user_id)
        .bind(language)
        .fetch_one(self.pool())
        .await?;

        let memory_beat_percent: f64 = sqlx::query_scalar(
            r#"
            SELECT CASE
                WHEN COUNT(*) = 0 THEN 0::float
                ELSE (COUNT(*) FILTER (WHERE memory_usage_kb > $1)::float
                      / COUNT(*)::float) * 100
            END
            FROM solutions
            WHERE problem_uuid = $2
              AND status = 'accepted'
              AND user_id != $3
              AND language = $4
            "#,
        )
        .bind(user_memory_kb)
        .bind(problem_uuid)
        .bind(user_id)
        .bind(language)
        .fetch_one(self.pool())
        .await?;

        Ok(SolutionStatistics {
            avg_other_time_ms: avg_time.unwrap_or(user_time_ms),
            avg_other_memory_kb: avg_memory.unwrap_or(user_memory_kb),
            time_beat_percent,
            memory_beat_percent,
        })
    }

    /// Current and longest streaks of consecutive calendar days with at
    /// least one attempt.
    pub async fn user_streaks(&self, user_id: &str) -> Result<(u32, u32), StoreError> {
        let dates: Vec<NaiveDate> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT DATE(created_at) AS solution_date
            FROM solutions
            WHERE user_id = $1
            ORDER BY solution_date DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(streaks_from_dates(&dates))
    }

    /// Accepted / total attempts as a percentage, truncated to two decimals.
    pub async fn success_rate(&self, user_id: &str) -> Result<f64, StoreError> {
        let rate: f64 = sqlx::query_scalar(
            r#"
            WITH solution_stats AS (
                SELECT
                    COUNT(*) FILTER (WHERE status = 'accepted') AS accepted_count,
                    COUNT(*) AS total_count
                FROM solutions
                WHERE user_id = $1
            )
            SELECT CASE
                WHEN total_count = 0 THEN 0::float
                ELSE (accepted_count::float / total_count::float) * 100
            END
            FROM solution_stats
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;
        Ok(truncate2(rate))
    }

    /// Attempt history, newest first. An empty `problem_uuid` means all
    /// problems.
    pub async fn user_solutions(
        &self,
        user_id: &str,
        problem_uuid: &str,
    ) -> Result<Vec<SolutionRecord>, StoreError> {
        let rows = sqlx::query_as::<_, SolutionRow>(
            r#"
            SELECT language, code, status, execution_time_ms, memory_usage_kb, created_at
            FROM solutions
            WHERE user_id = $1
              AND ($2 = '' OR problem_uuid = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(problem_uuid)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(SolutionRecord::from).collect())
    }
}

/// Streaks over a DESC-sorted list of distinct attempt dates: the run
/// containing the most recent date, and the longest run anywhere.
fn streaks_from_dates(dates_desc: &[NaiveDate]) -> (u32, u32) {
    if dates_desc.is_empty() {
        return (0, 0);
    }
    let mut current = 1u32;
    for pair in dates_desc.windows(2) {
        if pair[0].pred_opt() == Some(pair[1]) {
            current += 1;
        } else {
            break;
        }
    }
    let mut longest = 1u32;
    let mut run = 1u32;
    for pair in dates_desc.windows(2) {
        if pair[0].pred_opt() == Some(pair[1]) {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 1;
        }
    }
    (current, longest)
}

fn truncate2(value: f64) -> f64 {
    (value * 100.0).trunc() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn no_attempts_means_no_streaks() {
        assert_eq!(streaks_from_dates(&[]), (0, 0));
    }

    #[test]
    fn single_day_is_a_streak_of_one() {
        assert_eq!(streaks_from_dates(&[date(2026, 3, 1)]), (1, 1));
    }

    #[test]
    fn current_streak_stops_at_the_first_gap() {
        let dates = [
            date(2026, 3, 10),
            date(2026, 3, 9),
            date(2026, 3, 6),
            date(2026, 3, 5),
            date(2026, 3, 4),
        ];
        assert_eq!(streaks_from_dates(&dates), (2, 3));
    }

    #[test]
    fn streaks_cross_month_boundaries() {
        let dates = [date(2026, 3, 1), date(2026, 2, 28), date(2026, 2, 27)];
        assert_eq!(streaks_from_dates(&dates), (3, 3));
    }

    #[test]
    fn success_rate_is_truncated_not_rounded() {
        assert_eq!(truncate2(66.666666), 66.66);
        assert_eq!(truncate2(0.0), 0.0);
        assert_eq!(truncate2(100.0), 100.0);
    }
}
