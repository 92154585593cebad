use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use ytlearner_core::{Learner, LearnerConfig};

mod error;
mod routes;

#[derive(Parser)]
#[command(name = "ytlearner-server")]
#[command(about = "Serve video summaries, quizzes and learning reports over HTTP")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "YTLEARNER_BIND", default_value = "127.0.0.1:8000")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = LearnerConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        provider = config.provider.name(),
        backend = config.api_key.is_some(),
        youtube = config.youtube_api_key.is_some(),
        "Loaded configuration"
    );

    let learner = Learner::from_config(&config)
        .await
        .context("failed to open document store")?;
    tracing::info!(storage = ?learner.storage_mode(), "Services ready");

    let app = routes::router(Arc::new(learner));

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    tracing::info!("HTTP server listening on {}", args.bind);
    axum::serve(listener, app).await?;

    Ok(())
}
