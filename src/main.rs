mod auth;
mod reject;
mod rest;

use anyhow::Context as _;
use arbiter_config::Config;
use bollard::Docker;
use clap::Parser;
use processor::Evaluator;
use std::path::PathBuf;
use store::Store;

/// Online judge backend
#[derive(Parser)]
struct Args {
    /// Port the judge API listens on
    #[clap(long, default_value_t = 8080)]
    port: u16,
    /// Explicit path to config.yaml; the standard locations are searched
    /// otherwise
    #[clap(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;

    let store = Store::connect(&config.postgres)
        .await
        .context("failed to initialize store")?;

    let docker = Docker::connect_with_local_defaults()
        .context("failed to connect to the container runtime")?
        .negotiate_version()
        .await
        .context("container runtime API version negotiation failed")?;

    let evaluator = Evaluator::new(store.clone(), docker, config.runtime);
    let app = rest::App {
        store,
        evaluator,
        secret_key: config.secret_key.clone(),
    };

    tracing::info!(port = args.port, "serving judge API");
    rest::serve(args.port, app).await
}
