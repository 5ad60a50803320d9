use std::path::PathBuf;

use anyhow::Context as _;
use arbiter_apis::{LoginRequest, SubmitRequest, SubmitResult, TokenResponse};
use clap::Parser;

/// Command-line judge client
#[derive(Parser)]
struct Args {
    /// Judge API endpoint, e.g. http://localhost:8080
    #[clap(long, short = 'a', default_value = "http://localhost:8080")]
    api: String,
    /// Username to log in as
    #[clap(long, short = 'u')]
    username: String,
    /// Password
    #[clap(long, short = 'p')]
    password: String,
    /// UUID of the problem to submit to
    #[clap(long)]
    problem: String,
    /// Path to the source file
    #[clap(long, short = 's')]
    source: PathBuf,
    /// Submission language (python, cpp or java)
    #[clap(long, short = 'l')]
    language: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = reqwest::Client::new();

    let login: TokenResponse = client
        .post(format!("{}/api/auth/login", args.api))
        .json(&LoginRequest {
            username: args.username.clone(),
            password: args.password.clone(),
        })
        .send()
        .await?
        .error_for_status()
        .context("login failed")?
        .json()
        .await?;

    let code = tokio::fs::read_to_string(&args.source)
        .await
        .context("failed to read source file")?;
    let response = client
        .post(format!("{}/api/problem/{}", args.api, args.problem))
        .bearer_auth(&login.token)
        .json(&SubmitRequest {
            code,
            language: args.language.clone(),
        })
        .send()
        .await?;

    // Failed verdicts come back as 400 with the verdict in the body; only
    // bail on statuses that carry an error object instead.
    let status = response.status();
    if status.is_server_error()
        || status == reqwest::StatusCode::NOT_FOUND
        || status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::SERVICE_UNAVAILABLE
    {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("submission rejected ({}): {}", status, body);
    }
    let verdict: SubmitResult = response.json().await.context("invalid verdict body")?;

    print_verdict(&verdict);
    if !verdict.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_verdict(verdict: &SubmitResult) {
    println!("{}: {}", verdict.status, verdict.message);
    if let Some(details) = &verdict.error_details {
        println!("--- error details ---");
        println!("{}", details.trim_end());
    }
    if let Some(failed) = &verdict.failed_tests {
        for case in failed {
            println!("--- failed case {} ---", case.case.id);
            println!("input:    {:?}", case.case.input);
            println!("expected: {:?}", case.case.output);
            println!("actual:   {:?}", case.actual_output);
        }
    }
    if let Some(details) = &verdict.details {
        println!(
            "avg time {:.2} ms, avg memory {:.2} KB",
            details.average_time_ms, details.average_memory_kb
        );
        if let (Some(others), Some(beats)) =
            (details.avg_other_time_ms, details.time_beat_percent)
        {
            println!("time vs others: avg {:.2} ms, beats {:.0}%", others, beats);
        }
        if let (Some(others), Some(beats)) =
            (details.avg_other_memory_kb, details.memory_beat_percent)
        {
            println!("memory vs others: avg {:.2} KB, beats {:.0}%", others, beats);
        }
    }
}
