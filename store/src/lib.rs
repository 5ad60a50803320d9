//! Postgres persistence for the judge.
//!
//! One [`Store`] wraps a connection pool and exposes focused async queries;
//! attempts are append-only (`save_attempt` always inserts) and test cases
//! are deleted together with their problem.

mod stats;

use std::time::Duration;

use anyhow::Context as _;
use arbiter_apis::{attempt_status, Problem, SolutionRecord, TestCase};
use arbiter_config::PostgresConfig;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor as _, FromRow, PgPool};

pub use stats::SolutionStatistics;

const SCHEMA: &str = include_str!("../schema.sql");

const CONNECT_ATTEMPTS: u32 = 10;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("problem not found")]
    ProblemNotFound,
    #[error("test cases not found")]
    TestCasesNotFound,
    #[error("test case not found")]
    TestcaseNotFound,
    #[error("username is already taken")]
    UserExists,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("password verification failed")]
    Password(#[from] bcrypt::BcryptError),
}

/// A new attempt row; `save_attempt` stamps the status from `accepted`.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub code: String,
    pub language: String,
    pub average_time_ms: f64,
    pub average_memory_kb: f64,
    pub created_at: DateTime<Utc>,
    pub accepted: bool,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub token: String,
}

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

#[derive(FromRow)]
struct ProblemRow {
    id: i32,
    uuid: String,
    name: String,
    difficulty: String,
    description: String,
    solved: bool,
}

impl From<ProblemRow> for Problem {
    fn from(row: ProblemRow) -> Problem {
        Problem {
            id: row.id,
            uuid: row.uuid,
            name: row.name,
            difficulty: row.difficulty,
            description: row.description,
            solved: row.solved,
            solution: None,
        }
    }
}

#[derive(FromRow)]
struct SolutionRow {
    language: String,
    code: String,
    status: String,
    execution_time_ms: f64,
    memory_usage_kb: f64,
    created_at: DateTime<Utc>,
}

impl From<SolutionRow> for SolutionRecord {
    fn from(row: SolutionRow) -> SolutionRecord {
        SolutionRecord {
            language: row.language,
            code: row.code,
            status: row.status,
            average_time_ms: row.execution_time_ms,
            average_memory_kb: row.memory_usage_kb,
            created_at: row.created_at,
        }
    }
}

impl Store {
    /// Connects with retries (the database usually starts alongside the
    /// server) and applies the idempotent schema.
    pub async fn connect(config: &PostgresConfig) -> anyhow::Result<Store> {
        let url = config.connection_url();
        let mut last_err = None;
        for attempt in 1..=CONNECT_ATTEMPTS {
            match PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
            {
                Ok(pool) => {
                    pool.execute(SCHEMA)
                        .await
                        .context("failed to apply database schema")?;
                    tracing::info!(host = %config.host, database = %config.database, "connected to postgres");
                    return Ok(Store { pool });
                }
                Err(err) => {
                    tracing::warn!(
                        attempt,
                        max = CONNECT_ATTEMPTS,
                        error = %err,
                        "postgres connection failed, retrying"
                    );
                    last_err = Some(err);
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
            }
        }
        Err(last_err.expect("at least one connect attempt was made"))
            .context("failed to connect to postgres")
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    // --- problems and test cases ---

    /// Loads a problem; `solved` reflects whether `user_id` has an accepted
    /// attempt for it.
    pub async fn get_problem(&self, uuid: &str, user_id: &str) -> Result<Problem, StoreError> {
        let row = sqlx::query_as::<_, ProblemRow>(
            r#"
            SELECT p.id, p.uuid, p.name, p.difficulty, p.description,
                   EXISTS (
                       SELECT 1 FROM solutions s
                       WHERE s.problem_uuid = p.uuid
                         AND s.user_id = $1
                         AND s.status = 'accepted'
                   ) AS solved
            FROM problems p
            WHERE p.uuid = $2
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Problem::from).ok_or(StoreError::ProblemNotFound)
    }

    pub async fn get_all_problems(&self, user_id: &str) -> Result<Vec<Problem>, StoreError> {
        let rows = sqlx::query_as::<_, ProblemRow>(
            r#"
            SELECT p.id, p.uuid, p.name, p.difficulty, p.description,
                   EXISTS (
                       SELECT 1 FROM solutions s
                       WHERE s.problem_uuid = p.uuid
                         AND s.user_id = $1
                         AND s.status = 'accepted'
                   ) AS solved
            FROM problems p
            ORDER BY p.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Problem::from).collect())
    }

    pub async fn add_problem(
        &self,
        uuid: &str,
        name: &str,
        difficulty: &str,
        description: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO problems (uuid, name, difficulty, description) VALUES ($1, $2, $3, $4)")
            .bind(uuid)
            .bind(name)
            .bind(difficulty)
            .bind(description)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Ordered test cases for a problem; an empty set is an error, never
    /// an "all passed" verdict.
    pub async fn get_test_cases(&self, problem_uuid: &str) -> Result<Vec<TestCase>, StoreError> {
        let cases = sqlx::query_as::<_, TestCaseRow>(
            "SELECT id, input, output FROM testcases WHERE problem_uuid = $1 ORDER BY id",
        )
        .bind(problem_uuid)
        .fetch_all(&self.pool)
        .await?;
        if cases.is_empty() {
            return Err(StoreError::TestCasesNotFound);
        }
        Ok(cases.into_iter().map(TestCase::from).collect())
    }

    pub async fn add_testcase(
        &self,
        problem_uuid: &str,
        input: &str,
        output: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO testcases (problem_uuid, input, output) VALUES ($1, $2, $3)")
            .bind(problem_uuid)
            .bind(input)
            .bind(output)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_testcase(&self, id: i32) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM testcases WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::TestcaseNotFound);
        }
        Ok(())
    }

    /// Deletes a problem and its test cases. Cases go first so a partial
    /// failure never leaves orphans behind the FK.
    pub async fn delete_problem(&self, uuid: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM testcases WHERE problem_uuid = $1")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        let result = sqlx::query("DELETE FROM problems WHERE uuid = $1")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ProblemNotFound);
        }
        Ok(())
    }

    // --- attempts ---

    /// Inserts a new attempt row. Never an upsert: history is preserved.
    pub async fn save_attempt(
        &self,
        user_id: &str,
        problem_uuid: &str,
        attempt: &NewAttempt,
    ) -> Result<i32, StoreError> {
        let status = if attempt.accepted {
            attempt_status::ACCEPTED
        } else {
            attempt_status::REJECTED
        };
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO solutions
                (user_id, problem_uuid, execution_time_ms, memory_usage_kb,
                 code, language, created_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(problem_uuid)
        .bind(attempt.average_time_ms)
        .bind(attempt.average_memory_kb)
        .bind(&attempt.code)
        .bind(&attempt.language)
        .bind(attempt.created_at)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Newest accepted attempt of `user_id` for a problem, if any.
    pub async fn latest_accepted_attempt(
        &self,
        user_id: &str,
        problem_uuid: &str,
    ) -> Result<Option<SolutionRecord>, StoreError> {
        let row = sqlx::query_as::<_, SolutionRow>(
            r#"
            SELECT language, code, status, execution_time_ms, memory_usage_kb, created_at
            FROM solutions
            WHERE user_id = $1 AND problem_uuid = $2 AND status = 'accepted'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(problem_uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SolutionRecord::from))
    }

    // --- users and sessions (auth collaborator) ---

    pub async fn user_exists(&self, username: &str) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = $1")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn add_user(
        &self,
        uuid: &str,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<(), StoreError> {
        if self.user_exists(username).await? {
            return Err(StoreError::UserExists);
        }
        sqlx::query("INSERT INTO users (uuid, username, password_hash, role) VALUES ($1, $2, $3, $4)")
            .bind(uuid)
            .bind(username)
            .bind(password_hash)
            .bind(role)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Checks a username/password pair against the stored bcrypt hash.
    /// Returns `(user_id, role)`; unknown users and mismatches are the same
    /// error so the response does not leak which usernames exist.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(String, String), StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT uuid, password_hash, role FROM users WHERE username = $1 LIMIT 1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        let Some(user) = row else {
            return Err(StoreError::InvalidCredentials);
        };
        if !bcrypt::verify(password, &user.password_hash)? {
            return Err(StoreError::InvalidCredentials);
        }
        Ok((user.uuid, user.role))
    }

    /// One session per username: inserting again replaces the token.
    pub async fn upsert_session(&self, username: &str, token: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (username, token, created_at)
            VALUES ($1, $2, CURRENT_TIMESTAMP)
            ON CONFLICT (username) DO UPDATE
                SET token = EXCLUDED.token,
                    created_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(username)
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_session(&self, token: &str) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT username, token FROM sessions WHERE token = $1 LIMIT 1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Session {
            username: r.username,
            token: r.token,
        }))
    }

    pub async fn delete_session(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(FromRow)]
struct TestCaseRow {
    id: i32,
    input: String,
    output: String,
}

impl From<TestCaseRow> for TestCase {
    fn from(row: TestCaseRow) -> TestCase {
        TestCase {
            id: row.id,
            input: row.input,
            output: row.output,
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    uuid: String,
    password_hash: String,
    role: String,
}

#[derive(FromRow)]
struct SessionRow {
    username: String,
    token: String,
}
